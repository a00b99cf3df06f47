//! Shared test utilities.
//!
//! [`Workspace`] lays out an isolated directory tree per test:
//!
//! ```text
//! <tmp>/
//! ├── favs/             # declaration files (`path`)
//! ├── thumbs/           # thumbnail sources (derived `thumbs_path`)
//! ├── cache/            # thumbnail cache (`cache_path`), created on demand
//! └── out/              # holds favourites.xml (`output`)
//! ```
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let ws = Workspace::new();
//! ws.declare("movies.yml", "name: Movies\naction: x\n");
//! let listing = ws.source().list(&ws.favs()).unwrap();
//! assert_eq!(find_favourite(&listing.favourites, "movies").name, "Movies");
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Config;
use crate::source::{Favourite, FavouriteSource};
use crate::thumb::ThumbCache;

// =========================================================================
// Workspace setup
// =========================================================================

pub struct Workspace {
    tmp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        for dir in ["favs", "thumbs", "out"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        Self { tmp }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn favs(&self) -> PathBuf {
        self.root().join("favs")
    }

    pub fn thumbs(&self) -> PathBuf {
        self.root().join("thumbs")
    }

    pub fn cache(&self) -> PathBuf {
        self.root().join("cache")
    }

    pub fn output(&self) -> PathBuf {
        self.root().join("out/favourites.xml")
    }

    /// Write a declaration file into `favs/`.
    pub fn declare(&self, filename: &str, content: &str) {
        fs::write(self.favs().join(filename), content).unwrap();
    }

    /// Write a thumbnail source into `thumbs/`, creating subdirectories.
    pub fn thumb(&self, relative: &str, bytes: &[u8]) {
        let path = self.thumbs().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    /// Configuration pointing at this workspace. `thumbs_path` is left to its default.
    pub fn config(&self) -> Config {
        Config::new(Vec::<(String, String)>::new())
            .with_value("path", self.favs())
            .with_value("output", self.output())
            .with_value("cache_path", self.cache())
    }

    pub fn source(&self) -> FavouriteSource {
        self.source_with_variables(&[])
    }

    pub fn source_with_variables(&self, variables: &[(&str, &str)]) -> FavouriteSource {
        let variables: BTreeMap<String, String> = variables
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FavouriteSource::new(self.thumbs(), ThumbCache::new(self.cache()), variables)
    }
}

// =========================================================================
// Listing lookups (panic with the available ids on miss)
// =========================================================================

/// Find a favourite by id. Panics if not found.
pub fn find_favourite<'a>(favourites: &'a [Favourite], id: &str) -> &'a Favourite {
    favourites.iter().find(|f| f.id == id).unwrap_or_else(|| {
        let ids = favourite_ids(favourites);
        panic!("favourite '{id}' not found. Available: {ids:?}")
    })
}

/// All favourite ids in listing order.
pub fn favourite_ids(favourites: &[Favourite]) -> Vec<&str> {
    favourites.iter().map(|f| f.id.as_str()).collect()
}
