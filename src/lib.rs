//! # Kodi Fav Gen
//!
//! Generates Kodi's `userdata/favourites.xml` from a directory of small YAML
//! declaration files, one favourite per file. The directory is the data
//! source: file names become ids, their sort order is the menu order, and
//! thumbnails are copied into a content-addressed cache so Kodi always sees a
//! stable path.
//!
//! # Pipeline
//!
//! ```text
//! config  →  favs/*.yml[.tmpl]  →  Favourites  →  favourites.xml
//!            (parse, resolve       (ordered,      (rendered, re-parsed,
//!             actions + thumbs)     hidden kept)   written)
//! ```
//!
//! A declaration that fails to parse is recorded and skipped; the rest of the
//! document is still written. The run then fails with the collected history,
//! so a broken file never silently disappears from the menu.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Layered key/value configuration with lazily derived defaults |
//! | [`actions`] | Closed registry of action types and their navigation strings |
//! | [`thumb`] | SHA-256 content-addressed thumbnail cache |
//! | [`interpolate`] | `{{ name }}` substitution for `.yml.tmpl` declarations |
//! | [`source`] | Declaration discovery, parsing, and per-file error history |
//! | [`render`] | XML rendering with Maud, validated by re-parsing with quick-xml |
//! | [`generate`] | The end-to-end pipeline and its run report |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Maud For XML
//!
//! `favourites.xml` is a flat element list, so the HTML macro from
//! [Maud](https://maud.lambda.xyz/) renders it directly. Every interpolated
//! value is escaped at emission, which means a declaration writes a literal
//! `"` and the document carries `&quot;`.
//!
//! ## Explicit Configuration Object
//!
//! The process environment is read once, in `main`, into a [`config::Config`]
//! that is passed down. Tests build a `Config` from an empty snapshot and
//! never touch the live environment.

pub mod actions;
pub mod config;
pub mod generate;
pub mod interpolate;
pub mod output;
pub mod render;
pub mod source;
pub mod thumb;

#[cfg(test)]
pub(crate) mod test_helpers;
