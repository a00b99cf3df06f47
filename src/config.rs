//! Run configuration.
//!
//! Configuration is a flat namespace of named scalar values. Explicit values
//! come from three layers, later layers overriding earlier ones:
//!
//! ```text
//! KODI_FAVGEN__PATH=/srv/favs        # process environment (snapshot)
//! --settings settings.toml           # optional flat TOML table
//! kodi-fav-gen generate path=./favs  # key=value tokens on the command line
//! ```
//!
//! Keys that were never set explicitly fall back to the compiled-in defaults
//! table. Some defaults are constants, others are computed from other keys
//! (`thumbs_path` is derived from `path`, `cache_path` from `tmpdir`, ...).
//! Derived defaults are computed lazily on first read and memoized; an
//! explicit value is never replaced by a default.
//!
//! ## Defaults
//!
//! | key | default |
//! |-----|---------|
//! | `path` | none |
//! | `thumbs_dirname` | `"thumbs"` |
//! | `thumbs_path` | `<path>/../<thumbs_dirname>` |
//! | `thumbs_directory` | `<thumbs_path>` |
//! | `output` | `~/.kodi/userdata/favourites.xml` |
//! | `tmpdir` | `$TMPDIR/kodi-fav-gen.<user>` |
//! | `cache_path` | `<tmpdir>/thumbs` |
//!
//! ## Variables
//!
//! Keys under the `var_` prefix are handed to templated declaration files with
//! the prefix stripped: `var_media=/mnt/media` is available as `{{ media }}`.
//!
//! ## Storage encoding
//!
//! Values are stored as JSON scalar literals (see [`ConfigValue::encode`]).
//! Raw tokens are decoded with the same grammar and fall back to a plain
//! string, so `true` is a boolean, `"true"` is a string and `/srv` is a string.
//! Numbers only decode as numbers in canonical form; `1.10` stays `"1.10"`.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Namespace prefix for configuration keys in the process environment.
pub const ENV_PREFIX: &str = "KODI_FAVGEN__";

/// Prefix of keys exposed to templated declaration files.
pub const VARIABLE_PREFIX: &str = "var_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing parameter: {0:?}")]
    MissingParameter(String),
    #[error("Default for {0:?} depends on itself")]
    CyclicDefault(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Settings error: {0}")]
    Settings(String),
}

/// A decoded configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    /// Decode a raw token. JSON scalars keep their type, anything else is a string.
    ///
    /// A number is only kept as a number when it is written in its canonical
    /// form, so `1.10`, `1e3` and `-0` stay the strings they were typed as.
    pub fn decode(raw: &str) -> Self {
        let plain = || ConfigValue::String(raw.to_string());
        match serde_json::from_str::<ConfigValue>(raw.trim()) {
            Ok(number @ (ConfigValue::Integer(_) | ConfigValue::Float(_))) => {
                if number.encode() == raw {
                    number
                } else {
                    plain()
                }
            }
            Ok(value) => value,
            Err(_) => plain(),
        }
    }

    /// Encode as a JSON scalar literal; [`decode`](Self::decode) reverses it.
    pub fn encode(&self) -> String {
        match self {
            ConfigValue::Nil => "null".to_string(),
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Integer(n) => n.to_string(),
            ConfigValue::Float(f) => format!("{f:?}"),
            ConfigValue::String(s) => serde_json::Value::String(s.clone()).to_string(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ConfigValue::Nil)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Nil => Ok(()),
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Integer(n) => write!(f, "{n}"),
            ConfigValue::Float(x) => write!(f, "{x:?}"),
            ConfigValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<&Path> for ConfigValue {
    fn from(p: &Path) -> Self {
        ConfigValue::String(p.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for ConfigValue {
    fn from(p: PathBuf) -> Self {
        ConfigValue::from(p.as_path())
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Integer(n)
    }
}

type DeriveFn = fn(&Config) -> Result<Option<ConfigValue>, ConfigError>;

/// How a key is filled in when it was not set explicitly.
#[derive(Clone, Copy)]
pub enum Fallback {
    /// A constant, decoded like a raw token.
    Const(&'static str),
    /// Computed from the rest of the configuration on first read.
    Derived(DeriveFn),
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::Const(raw) => write!(f, "Const({raw:?})"),
            Fallback::Derived(_) => f.write_str("Derived"),
        }
    }
}

pub type DefaultsTable = &'static [(&'static str, Fallback)];

/// The compiled-in defaults table.
pub const DEFAULTS: DefaultsTable = &[
    ("thumbs_dirname", Fallback::Const("thumbs")),
    ("thumbs_path", Fallback::Derived(default_thumbs_path)),
    ("thumbs_directory", Fallback::Derived(default_thumbs_directory)),
    ("output", Fallback::Derived(default_output)),
    ("tmpdir", Fallback::Derived(default_tmpdir)),
    ("cache_path", Fallback::Derived(default_cache_path)),
];

/// Location of the favourites file relative to the user's home directory.
const KODI_FAVOURITES: &str = ".kodi/userdata/favourites.xml";

fn default_thumbs_path(config: &Config) -> Result<Option<ConfigValue>, ConfigError> {
    let Some(path) = config.get_path("path")? else {
        return Ok(None);
    };
    let dirname = config.require("thumbs_dirname")?.to_string();
    Ok(Some(sibling(&path, &dirname).into()))
}

fn default_thumbs_directory(config: &Config) -> Result<Option<ConfigValue>, ConfigError> {
    config.get("thumbs_path")
}

fn default_output(config: &Config) -> Result<Option<ConfigValue>, ConfigError> {
    let home = config.env("HOME").map(PathBuf::from).or_else(dirs::home_dir);
    Ok(home.map(|h| h.join(KODI_FAVOURITES).into()))
}

fn default_tmpdir(config: &Config) -> Result<Option<ConfigValue>, ConfigError> {
    let base = config
        .env("TMPDIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    let user = config
        .env("USER")
        .or_else(|| config.env("USERNAME"))
        .unwrap_or("default");
    let scoped = format!("{}.{}", env!("CARGO_PKG_NAME"), user);
    Ok(Some(base.join(scoped).into()))
}

fn default_cache_path(config: &Config) -> Result<Option<ConfigValue>, ConfigError> {
    Ok(config.get_path("tmpdir")?.map(|t| t.join("thumbs").into()))
}

/// `name` next to `path`: `/srv/favs` → `/srv/thumbs`.
fn sibling(path: &Path, name: &str) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(_)) => parent.join(name),
        _ => path.join("..").join(name),
    }
}

/// Normalize a key: lowercase, dashes become underscores.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

/// Parse a `key=value` token. Everything after the first `=` is the value.
///
/// Returns `None` for tokens without `=`, with an empty key, or with an empty value.
pub fn parse_token(token: &str) -> Option<(String, ConfigValue)> {
    let (key, value) = token.split_once('=')?;
    let key = normalize_key(key);
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, ConfigValue::decode(value)))
}

/// Resolved configuration for one run.
///
/// Built once, then read-only. Defaults are memoized behind interior
/// mutability, which is fine for the single-threaded pipeline.
#[derive(Debug)]
pub struct Config {
    explicit: BTreeMap<String, ConfigValue>,
    environment: BTreeMap<String, String>,
    defaults: DefaultsTable,
    resolved: RefCell<BTreeMap<String, Option<ConfigValue>>>,
    pending: RefCell<Vec<String>>,
}

impl Config {
    /// Build from an environment snapshot. `KODI_FAVGEN__*` variables become
    /// explicit values; the full snapshot stays available to defaults.
    pub fn new<I, K, V>(environment: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let environment: BTreeMap<String, String> = environment
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let explicit = environment
            .iter()
            .filter_map(|(k, v)| {
                let key = normalize_key(k.strip_prefix(ENV_PREFIX)?);
                (!key.is_empty() && !v.is_empty()).then(|| (key, ConfigValue::decode(v)))
            })
            .collect();
        Self {
            explicit,
            environment,
            defaults: DEFAULTS,
            resolved: RefCell::new(BTreeMap::new()),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Build from the current process environment.
    pub fn from_env() -> Self {
        Self::new(std::env::vars())
    }

    /// Apply `key=value` tokens. Malformed tokens are skipped.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            match parse_token(arg.as_ref()) {
                Some((key, value)) => {
                    self.explicit.insert(key, value);
                }
                None => tracing::debug!("Ignoring parameter {:?}", arg.as_ref()),
            }
        }
        self.resolved.get_mut().clear();
        self
    }

    /// Set a single explicit value.
    pub fn with_value(mut self, name: &str, value: impl Into<ConfigValue>) -> Self {
        self.explicit.insert(normalize_key(name), value.into());
        self.resolved.get_mut().clear();
        self
    }

    /// Layer a flat TOML table of scalars on top of the current explicit values.
    pub fn with_settings_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)?;
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => ConfigValue::String(s),
                toml::Value::Integer(n) => ConfigValue::Integer(n),
                toml::Value::Float(f) if f.is_finite() => ConfigValue::Float(f),
                toml::Value::Float(f) => {
                    return Err(ConfigError::Settings(format!(
                        "{key}: {f} cannot be stored as a value"
                    )));
                }
                toml::Value::Boolean(b) => ConfigValue::Bool(b),
                other => {
                    return Err(ConfigError::Settings(format!(
                        "{key}: expected a scalar value, got {}",
                        other.type_str()
                    )));
                }
            };
            self.explicit.insert(normalize_key(&key), value);
        }
        self.resolved.get_mut().clear();
        Ok(self)
    }

    /// Replace the defaults table.
    pub fn with_defaults(mut self, defaults: DefaultsTable) -> Self {
        self.defaults = defaults;
        self.resolved.get_mut().clear();
        self
    }

    /// Read a variable from the environment snapshot.
    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether `name` was set explicitly (as opposed to coming from a default).
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains_key(&normalize_key(name))
    }

    /// Look up a value: explicit, then memoized default, then `None`.
    pub fn get(&self, name: &str) -> Result<Option<ConfigValue>, ConfigError> {
        let key = normalize_key(name);
        if let Some(value) = self.explicit.get(&key) {
            return Ok(Some(value.clone()).filter(|v| !v.is_nil()));
        }
        if let Some(value) = self.resolved.borrow().get(&key) {
            return Ok(value.clone());
        }
        let Some(fallback) = self.fallback(&key) else {
            return Ok(None);
        };

        if self.pending.borrow().contains(&key) {
            return Err(ConfigError::CyclicDefault(key));
        }
        self.pending.borrow_mut().push(key.clone());
        let value = match fallback {
            Fallback::Const(raw) => Ok(Some(ConfigValue::decode(raw))),
            Fallback::Derived(derive) => derive(self),
        };
        self.pending.borrow_mut().retain(|k| *k != key);

        let value = value?.filter(|v| !v.is_nil());
        self.resolved.borrow_mut().insert(key, value.clone());
        Ok(value)
    }

    /// Look up a value and transform it.
    pub fn get_with<T>(
        &self,
        name: &str,
        decode: impl FnOnce(ConfigValue) -> T,
    ) -> Result<Option<T>, ConfigError> {
        Ok(self.get(name)?.map(decode))
    }

    pub fn get_path(&self, name: &str) -> Result<Option<PathBuf>, ConfigError> {
        self.get_with(name, |v| PathBuf::from(v.to_string()))
    }

    /// Look up a value that must be present after default resolution.
    pub fn require(&self, name: &str) -> Result<ConfigValue, ConfigError> {
        self.get(name)?
            .ok_or_else(|| ConfigError::MissingParameter(normalize_key(name)))
    }

    pub fn require_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        self.require(name).map(|v| PathBuf::from(v.to_string()))
    }

    /// Every known key: explicit ones plus those with a default.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .explicit
            .keys()
            .cloned()
            .chain(self.defaults.iter().map(|(k, _)| k.to_string()))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// All resolved values, sorted by key. Keys that resolve to nothing are left out.
    pub fn export(&self) -> Result<BTreeMap<String, ConfigValue>, ConfigError> {
        let mut out = BTreeMap::new();
        for key in self.keys() {
            if let Some(value) = self.get(&key)? {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    /// [`export`](Self::export) under the environment namespace with encoded values.
    pub fn to_env(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        Ok(self
            .export()?
            .into_iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{}", k.to_uppercase()), v.encode()))
            .collect())
    }

    /// Values of the `var_` sub-namespace, prefix stripped.
    pub fn variables(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        Ok(self
            .export()?
            .into_iter()
            .filter_map(|(k, v)| {
                let name = k.strip_prefix(VARIABLE_PREFIX)?;
                (!name.is_empty()).then(|| (name.to_string(), v.to_string()))
            })
            .collect())
    }

    fn fallback(&self, key: &str) -> Option<Fallback> {
        self.defaults
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, fallback)| *fallback)
    }
}
