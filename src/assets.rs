//! Resource bundles and reloading them in place.
//!
//! A bundle is a TOML document of named text sprites:
//!
//! ```toml
//! [sprites]
//! ship = '''
//!  /\
//! /__\
//! '''
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::Deserialize;

use crate::engine::SharedEngine;
use crate::error::{EngineError, ReloadError};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BundleFile {
    #[serde(default)]
    sprites: BTreeMap<String, String>,
}

/// The contents of one resource bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStore {
    sprites: BTreeMap<String, Vec<String>>,
}

impl ResourceStore {
    /// Parse a bundle from its text.
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let file: BundleFile =
            toml::from_str(text).map_err(|e| EngineError::Bundle(e.to_string()))?;
        let sprites = file
            .sprites
            .into_iter()
            .map(|(name, art)| {
                let mut rows: Vec<String> = art.lines().map(str::to_string).collect();
                while rows.last().is_some_and(|r| r.trim().is_empty()) {
                    rows.pop();
                }
                (name, rows)
            })
            .collect();
        Ok(ResourceStore { sprites })
    }

    /// Read and parse the bundle at `path`.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Replace this store's contents with the bundle at `path`.
    ///
    /// The bundle is parsed completely first; on failure the current contents
    /// are untouched.
    pub fn replace_from(&mut self, path: &Path) -> Result<(), EngineError> {
        *self = Self::open(path)?;
        Ok(())
    }

    /// The rows of the sprite called `name`.
    pub fn sprite(&self, name: &str) -> Option<&[String]> {
        self.sprites.get(name).map(Vec::as_slice)
    }

    /// Number of sprites in the store.
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    /// Whether the store has no sprites.
    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

/// Load the bundle at `path` into the engine's resource store.
///
/// The window, frame loop and loaded callbacks are not touched. On failure
/// the engine keeps its previous resources.
pub fn reload_assets(engine: &SharedEngine, path: &Path) -> Result<(), ReloadError> {
    let failure = |message: String| ReloadError::AssetLoadFailure {
        path: path.to_path_buf(),
        message,
    };

    let mut engine = engine
        .try_borrow_mut()
        .map_err(|_| failure("engine is already in use".to_string()))?;
    match panic::catch_unwind(AssertUnwindSafe(|| engine.load_resources(path))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(failure(err.to_string())),
        Err(_) => Err(failure("engine panicked while loading resources".to_string())),
    }
}
