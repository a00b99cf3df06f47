//! The generation pipeline.
//!
//! ```text
//! config → list declarations → drop hidden → render + validate → write
//! ```
//!
//! Per-item failures do not stop the run. The document is written with the
//! favourites that did parse, and only then does [`generate`] return
//! [`GenerateError::Incomplete`] carrying the full [`ErrorHistory`]: partial
//! output is kept on disk, and the caller still sees a failure.
//!
//! Failures that are not about a single item (missing `path`, unreadable
//! input directory, output that does not parse as XML, failing write) abort
//! the run before anything is written.

use crate::config::{Config, ConfigError};
use crate::render::{self, RenderError};
use crate::source::{ErrorHistory, FavouriteSource, SourceError};
use crate::thumb::CacheStats;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Parameters that must resolve before the pipeline starts.
pub const MANDATORY_PARAMS: &[&str] = &["path", "thumbs_path"];

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("IO error writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Errors were encountered during generation ({} failed)", .report.errors.len())]
    Incomplete { report: Box<Report> },
}

/// What a run produced.
#[derive(Debug)]
pub struct Report {
    pub output: PathBuf,
    pub rendered: Vec<Rendered>,
    pub hidden: usize,
    pub cache: CacheStats,
    pub errors: ErrorHistory,
}

/// A favourite as it appears in the written document.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub id: String,
    pub name: String,
    pub has_thumb: bool,
}

/// Run the pipeline and write the favourites file.
pub fn generate(config: &Config) -> Result<Report, GenerateError> {
    for key in MANDATORY_PARAMS {
        config.require(key)?;
    }
    let input = config.require_path("path")?;
    let output = config.require_path("output")?;

    let mut source = FavouriteSource::from_config(config)?;
    let listing = source.list(&input)?;

    let xml = render::render(listing.visible())?;
    fs::write(&output, xml).map_err(|e| GenerateError::Write {
        path: output.clone(),
        source: e,
    })?;
    tracing::info!("Wrote {}", output.display());

    let rendered = listing
        .visible()
        .map(|f| Rendered {
            id: f.id.clone(),
            name: f.name.clone(),
            has_thumb: f.thumb.is_some(),
        })
        .collect();
    let report = Report {
        output,
        rendered,
        hidden: listing.hidden_count(),
        cache: source.cache_stats(),
        errors: listing.errors,
    };

    if report.errors.is_empty() {
        Ok(report)
    } else {
        Err(GenerateError::Incomplete {
            report: Box::new(report),
        })
    }
}
