//! CLI output formatting.
//!
//! Output is **favourite-centric**: each rendered entry is shown by its
//! position in the document and its display name, with the id as secondary
//! context. A run ends with a one-line summary.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! 001 Movies (010-movies)
//! 002 Concerts (020-concerts) [thumb]
//!
//! Wrote 2 favourites to /home/me/.kodi/userdata/favourites.xml
//!     Hidden: 1
//!     Thumbnails: 1 cached, 1 written (2 total)
//! ```
//!
//! ## Errors
//!
//! ```text
//! Failed favourites
//!     030-broken
//!         Missing file: no thumbnail matches /srv/thumbs/nope
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout or stderr.
//! Format functions are pure.

use crate::config::ConfigValue;
use crate::generate::Report;
use crate::source::ErrorHistory;
use std::collections::BTreeMap;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format the report of a generate run.
pub fn format_generate_output(report: &Report) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, item) in report.rendered.iter().enumerate() {
        let marker = if item.has_thumb { " [thumb]" } else { "" };
        lines.push(format!(
            "{} {} ({}){}",
            format_index(i + 1),
            item.name,
            item.id,
            marker
        ));
    }
    if !report.rendered.is_empty() {
        lines.push(String::new());
    }

    lines.push(format!(
        "Wrote {} to {}",
        plural(report.rendered.len(), "favourite"),
        report.output.display()
    ));
    if report.hidden > 0 {
        lines.push(format!("    Hidden: {}", report.hidden));
    }
    if report.cache.total() > 0 {
        lines.push(format!("    Thumbnails: {}", report.cache));
    }
    lines
}

pub fn print_generate_output(report: &Report) {
    for line in format_generate_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Error history
// ============================================================================

/// Format per-favourite failures, grouped by id.
pub fn format_error_history(errors: &ErrorHistory) -> Vec<String> {
    if errors.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Failed favourites".to_string()];
    for (id, failures) in errors.iter() {
        lines.push(format!("    {id}"));
        for failure in failures {
            lines.push(format!("        {failure}"));
        }
    }
    lines
}

pub fn print_error_history(errors: &ErrorHistory) {
    for line in format_error_history(errors) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// Config
// ============================================================================

/// Resolved configuration as pretty JSON, keys sorted.
pub fn format_config(values: &BTreeMap<String, ConfigValue>) -> String {
    serde_json::to_string_pretty(values).unwrap_or_default()
}

pub fn print_config(values: &BTreeMap<String, ConfigValue>) {
    println!("{}", format_config(values));
}

// ============================================================================
// Tests
// ============================================================================
