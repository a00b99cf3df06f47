//! Declaration discovery and parsing.
//!
//! Each favourite is declared in its own YAML file. The file name (without
//! extension) is the favourite's id and fixes its position in the output.
//!
//! ```text
//! favs/
//! ├── 010-movies.yml
//! ├── 020-concerts.yml.tmpl        # templated: {{ var }} placeholders
//! ├── 030-channel.yml
//! └── 030-channel.yml.tmpl         # wins over 030-channel.yml
//! thumbs/
//! ├── movies.png
//! └── concerts.jpg
//! ```
//!
//! ## Declaration format
//!
//! ```yaml
//! name: Concerts                   # required
//! action:                          # required: string or mapping
//!   type: youtube_channel
//!   value: UCabc
//!   _path: videos                  # `_`-prefixed keys become action options
//! hidden: false                    # optional
//! thumb: concerts                  # optional: matches thumbs/concerts.*
//! # thumb_b64: iVBORw0KGgo...      # optional alternative: inline base64
//! ```
//!
//! A bare string action is a `base` action: the string is used as-is.
//!
//! ## Failure isolation
//!
//! A problem with one file (unreadable, bad YAML, unknown action type, missing
//! thumbnail) is recorded in the [`ErrorHistory`] under that file's id and the
//! file is skipped. Only failures that are not about a single file, such as an
//! unreadable input directory, abort the listing.

use crate::actions::{self, Action, ActionError, ActionOptions};
use crate::config::{Config, ConfigError};
use crate::interpolate::{InterpolateError, interpolate};
use crate::thumb::{self, CacheStats, ThumbCache};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of plain declaration files.
pub const PLAIN_EXTENSION: &str = ".yml";

/// Extension of templated declaration files.
pub const TEMPLATED_EXTENSION: &str = ".yml.tmpl";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Why a single declaration file was skipped.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Template error: {0}")]
    Template(#[from] InterpolateError),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("Missing file: no thumbnail matches {}", .0.display())]
    MissingFile(PathBuf),
    #[error("Invalid base64 thumbnail: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid declaration: {0}")]
    Invalid(String),
}

/// Failures collected during one listing, keyed by favourite id.
#[derive(Debug, Default)]
pub struct ErrorHistory {
    entries: BTreeMap<String, Vec<ItemError>>,
}

impl ErrorHistory {
    pub fn record(&mut self, id: &str, error: ItemError) {
        self.entries.entry(id.to_string()).or_default().push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of ids with at least one failure.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &str) -> Option<&[ItemError]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ItemError])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Pretty JSON object mapping each id to its error messages.
    pub fn to_json(&self) -> String {
        let map: BTreeMap<&str, Vec<String>> = self
            .iter()
            .map(|(id, errors)| (id, errors.iter().map(ToString::to_string).collect()))
            .collect();
        serde_json::to_string_pretty(&map).unwrap_or_default()
    }
}

impl fmt::Display for ErrorHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, errors) in self.iter() {
            for error in errors {
                writeln!(f, "{id}: {error}")?;
            }
        }
        Ok(())
    }
}

/// One entry of the favourites list.
#[derive(Debug, Clone, PartialEq)]
pub struct Favourite {
    pub id: String,
    pub name: String,
    /// Rendered action (navigation string).
    pub action: String,
    pub hidden: bool,
    /// Path of the cached thumbnail.
    pub thumb: Option<String>,
}

/// Output of [`FavouriteSource::list`].
#[derive(Debug, Default)]
pub struct Listing {
    /// Successfully parsed favourites in file name order, hidden ones included.
    pub favourites: Vec<Favourite>,
    pub errors: ErrorHistory,
}

impl Listing {
    /// Favourites that should be rendered.
    pub fn visible(&self) -> impl Iterator<Item = &Favourite> {
        self.favourites.iter().filter(|f| !f.hidden)
    }

    pub fn hidden_count(&self) -> usize {
        self.favourites.iter().filter(|f| f.hidden).count()
    }
}

/// A discovered declaration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationFile {
    pub id: String,
    pub path: PathBuf,
    pub templated: bool,
}

/// Raw declaration as written in YAML.
#[derive(Debug, Deserialize)]
struct Declaration {
    name: String,
    action: Value,
    #[serde(default)]
    hidden: bool,
    thumb: Option<String>,
    thumb_b64: Option<String>,
}

#[derive(Debug)]
pub struct FavouriteSource {
    thumbs_dir: PathBuf,
    variables: BTreeMap<String, String>,
    cache: ThumbCache,
}

impl FavouriteSource {
    pub fn new(
        thumbs_dir: impl Into<PathBuf>,
        cache: ThumbCache,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            thumbs_dir: thumbs_dir.into(),
            variables,
            cache,
        }
    }

    /// Build from configuration.
    ///
    /// An explicit relative `thumbs_directory` is taken relative to `path`.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let thumbs = config.require_path("thumbs_directory")?;
        let thumbs = if thumbs.is_relative() && config.is_explicit("thumbs_directory") {
            config.require_path("path")?.join(thumbs)
        } else {
            thumbs
        };
        let cache = ThumbCache::new(config.require_path("cache_path")?);
        Ok(Self::new(thumbs, cache, config.variables()?))
    }

    pub fn thumbs_dir(&self) -> &Path {
        &self.thumbs_dir
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Parse every declaration in `dir`.
    pub fn list(&mut self, dir: &Path) -> Result<Listing, SourceError> {
        let mut listing = Listing::default();
        for file in discover(dir)? {
            match self.parse(&file) {
                Ok(favourite) => {
                    tracing::debug!("Parsed {} ({})", file.id, file.path.display());
                    listing.favourites.push(favourite);
                }
                Err(error) => {
                    tracing::warn!("{error} for {:?}", file.id);
                    listing.errors.record(&file.id, error);
                }
            }
        }
        Ok(listing)
    }

    fn parse(&mut self, file: &DeclarationFile) -> Result<Favourite, ItemError> {
        let raw = fs::read_to_string(&file.path)?;
        let text = if file.templated {
            interpolate(&raw, &self.variables)?
        } else {
            raw
        };
        let declaration: Declaration = serde_yaml::from_str(&text)?;
        let action = resolve_action(&declaration.action)?;
        let thumb = self.resolve_thumb(&declaration)?;

        Ok(Favourite {
            id: file.id.clone(),
            name: declaration.name,
            action: action.render(),
            hidden: declaration.hidden,
            thumb: thumb.map(|p| p.to_string_lossy().into_owned()),
        })
    }

    fn resolve_thumb(&mut self, declaration: &Declaration) -> Result<Option<PathBuf>, ItemError> {
        let bytes = match (&declaration.thumb, &declaration.thumb_b64) {
            (None, None) => return Ok(None),
            (Some(_), Some(_)) => {
                return Err(ItemError::Invalid(
                    "thumb and thumb_b64 are mutually exclusive".into(),
                ));
            }
            (None, Some(b64)) => thumb::decode_base64(b64)?,
            (Some(pattern), None) => fs::read(find_thumb(&self.thumbs_dir, pattern)?)?,
        };
        Ok(Some(self.cache.store(&bytes)?.path))
    }
}

/// Find declaration files in `dir`, one per id, sorted by file name.
///
/// When both `<id>.yml` and `<id>.yml.tmpl` exist, the templated file is used.
/// Dotfiles are ignored.
pub fn discover(dir: &Path) -> io::Result<Vec<DeclarationFile>> {
    let mut by_id: BTreeMap<String, DeclarationFile> = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let (id, templated) = if let Some(id) = name.strip_suffix(TEMPLATED_EXTENSION) {
            (id.to_string(), true)
        } else if let Some(id) = name.strip_suffix(PLAIN_EXTENSION) {
            (id.to_string(), false)
        } else {
            continue;
        };

        if !templated && by_id.contains_key(&id) {
            continue;
        }
        by_id.insert(
            id.clone(),
            DeclarationFile {
                id,
                path,
                templated,
            },
        );
    }

    let mut files: Vec<DeclarationFile> = by_id.into_values().collect();
    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

/// Resolve a thumbnail pattern.
///
/// Absolute paths are used verbatim. Relative patterns are globbed as
/// `<thumbs_dir>/<pattern>.*`, so `post*` finds `poster.png`; the first match
/// in name order wins.
fn find_thumb(thumbs_dir: &Path, pattern: &str) -> Result<PathBuf, ItemError> {
    let path = Path::new(pattern);
    if path.is_absolute() {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ItemError::MissingFile(path.to_path_buf()))
        };
    }

    let dir = glob::Pattern::escape(&thumbs_dir.to_string_lossy());
    let expr = format!("{dir}/{pattern}.*");
    let entries = glob::glob(&expr)
        .map_err(|e| ItemError::Invalid(format!("bad thumb pattern {pattern:?}: {e}")))?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    matches.sort();
    matches
        .into_iter()
        .next()
        .ok_or_else(|| ItemError::MissingFile(thumbs_dir.join(pattern)))
}

/// Turn the `action` field into an [`Action`].
fn resolve_action(value: &Value) -> Result<Action, ItemError> {
    let map = match value {
        Value::String(s) => return Ok(actions::build("base", s, &ActionOptions::new())?),
        Value::Mapping(map) => map,
        _ => {
            return Err(ItemError::Invalid(
                "action must be a string or a mapping".into(),
            ));
        }
    };

    let mut tag = None;
    let mut action_value = None;
    let mut options = ActionOptions::new();
    for (key, value) in map {
        let Some(key) = key.as_str() else {
            continue;
        };
        match key {
            "type" => tag = Some(scalar(key, value)?),
            "value" => action_value = Some(scalar(key, value)?),
            _ => {
                if let Some(name) = option_name(key) {
                    options.insert(name.to_string(), scalar(key, value)?);
                }
            }
        }
    }

    let tag = tag.ok_or_else(|| ItemError::Invalid("action is missing \"type\"".into()))?;
    let action_value =
        action_value.ok_or_else(|| ItemError::Invalid("action is missing \"value\"".into()))?;
    Ok(actions::build(&tag, &action_value, &options)?)
}

/// `_path` → `path`. Only keys whose second character is a letter or space count.
fn option_name(key: &str) -> Option<&str> {
    let name = key.strip_prefix('_')?;
    name.chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
        .map(|_| name)
}

fn scalar(key: &str, value: &Value) -> Result<String, ItemError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ItemError::Invalid(format!(
            "action field {key:?} must be a scalar"
        ))),
    }
}
