//! Content-addressed thumbnail cache.
//!
//! Kodi shows a thumbnail for each favourite, referenced by path. Declarations
//! supply thumbnails either inline (base64) or as a file pattern; either way the
//! bytes are copied into a cache directory under a name derived from their
//! content, so the generated `favourites.xml` only ever points into the cache.
//!
//! # Design
//!
//! The cache file name is the SHA-256 hex digest of the decoded bytes:
//!
//! ```text
//! <cache_path>/
//! ├── 2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae
//! └── fcde2b2edba56bf408601fb721fe9b5c338d10ee429ea04fae5511b68fbf8fb9
//! ```
//!
//! - Identical content always maps to the same path, so two favourites sharing
//!   a thumbnail share one file.
//! - A file is written only if it does not exist yet; repeated runs do not
//!   touch the cache.
//! - The cache directory is created on first store.
//!
//! The existence check and the write are not atomic. The pipeline is
//! single-threaded; parallel callers would need a lock or an atomic rename.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// SHA-256 hex digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Decode inline base64 thumbnail data. Line breaks and other whitespace are ignored.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}

/// Summary of cache activity for a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub writes: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn write(&mut self) {
        self.writes += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.writes
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} written ({} total)",
                self.hits,
                self.writes,
                self.total()
            )
        } else {
            write!(f, "{} written", self.writes)
        }
    }
}

/// Result of a store: where the thumbnail lives and whether this call wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub path: PathBuf,
    pub written: bool,
}

#[derive(Debug)]
pub struct ThumbCache {
    dir: PathBuf,
    stats: CacheStats,
}

impl ThumbCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stats: CacheStats::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Store `bytes` under their content hash. Idempotent.
    pub fn store(&mut self, bytes: &[u8]) -> io::Result<Stored> {
        let path = self.dir.join(content_hash(bytes));
        if path.exists() {
            self.stats.hit();
            return Ok(Stored {
                path,
                written: false,
            });
        }

        fs::create_dir_all(&self.dir)?;
        fs::write(&path, bytes)?;
        self.stats.write();
        tracing::debug!("Cached thumbnail {}", path.display());
        Ok(Stored {
            path,
            written: true,
        })
    }
}
