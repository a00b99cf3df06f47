//! `favourites.xml` rendering.
//!
//! The document has the shape Kodi reads from `userdata/favourites.xml`:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <favourites>
//!     <favourite id="010-movies" name="Movies" thumb="/tmp/kodi-fav-gen.me/thumbs/2c26…">ActivateWindow(10025,&quot;videodb://movies/&quot;,return)</favourite>
//! </favourites>
//! ```
//!
//! Elements are produced with [maud](https://maud.lambda.xyz/), so every
//! attribute and text value is escaped. The finished text is read back with
//! `quick-xml` before it is returned; anything that does not parse as a
//! single-rooted XML document, or that carries characters XML 1.0 forbids
//! (C0 controls other than tab and line breaks), is a
//! [`RenderError::MalformedOutput`].

use crate::source::Favourite;
use maud::{Markup, html};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

/// Encoding of the generated text, as named in the XML declaration.
pub const ENCODING: &str = "UTF-8";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Malformed output at byte {position}: {message}")]
    MalformedOutput { position: u64, message: String },
}

fn render_favourite(favourite: &Favourite) -> Markup {
    html! {
        favourite id=(favourite.id) name=(favourite.name) thumb=[favourite.thumb.as_deref()] {
            (favourite.action)
        }
    }
}

/// Render favourites into a validated XML document.
///
/// Callers pass only the favourites to be shown; hidden ones are filtered
/// beforehand (see [`Listing::visible`](crate::source::Listing::visible)).
pub fn render<'a, I>(favourites: I) -> Result<String, RenderError>
where
    I: IntoIterator<Item = &'a Favourite>,
{
    let mut xml = format!("<?xml version=\"1.0\" encoding=\"{ENCODING}\"?>\n<favourites>\n");
    for favourite in favourites {
        xml.push_str("    ");
        xml.push_str(&render_favourite(favourite).into_string());
        xml.push('\n');
    }
    xml.push_str("</favourites>\n");

    validate(&xml)?;
    Ok(xml)
}

/// Check that `xml` is a well-formed document with exactly one root element.
pub fn validate(xml: &str) -> Result<(), RenderError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(&reader, e.to_string()))?;
        match event {
            Event::Start(start) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
                check_attributes(&reader, &start)?;
            }
            Event::Empty(empty) => {
                if depth == 0 {
                    roots += 1;
                }
                check_attributes(&reader, &empty)?;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| malformed(&reader, e.to_string()))?;
                check_chars(&reader, &text)?;
                if depth == 0 && !text.trim().is_empty() {
                    return Err(malformed(&reader, "text outside the root element".into()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(malformed(&reader, "unclosed element".into()));
    }
    if roots != 1 {
        return Err(malformed(
            &reader,
            format!("expected one root element, found {roots}"),
        ));
    }
    Ok(())
}

/// The XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}' | '\u{A}' | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

fn check_attributes(reader: &Reader<&[u8]>, element: &BytesStart) -> Result<(), RenderError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| malformed(reader, e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(reader, e.to_string()))?;
        check_chars(reader, &value)?;
    }
    Ok(())
}

fn check_chars(reader: &Reader<&[u8]>, text: &str) -> Result<(), RenderError> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(malformed(
            reader,
            format!("character U+{:04X} is not allowed in XML", c as u32),
        )),
        None => Ok(()),
    }
}

fn malformed(reader: &Reader<&[u8]>, message: String) -> RenderError {
    RenderError::MalformedOutput {
        position: reader.buffer_position() as u64,
        message,
    }
}
