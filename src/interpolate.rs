//! Placeholder substitution for templated declaration files.
//!
//! A `.yml.tmpl` declaration may reference configuration variables as
//! `{{ name }}`; whitespace inside the braces is optional. Names come from the
//! `var_` sub-namespace of the configuration with the prefix stripped.
//!
//! ```yaml
//! name: Concerts
//! action: PlayMedia({{ media }}/concerts/)
//! ```
//!
//! There is no escaping and no expression syntax. An unknown name or an
//! unterminated placeholder is an error for that file.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InterpolateError {
    #[error("Undefined variable {0:?}")]
    Undefined(String),
    #[error("Unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub fn interpolate(
    template: &str,
    variables: &BTreeMap<String, String>,
) -> Result<String, InterpolateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(InterpolateError::Unterminated(offset + start))?;
        let name = after_open[..end].trim();
        let value = variables
            .get(name)
            .ok_or_else(|| InterpolateError::Undefined(name.to_string()))?;
        out.push_str(value);

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}
