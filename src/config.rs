//! Supervisor configuration, read from an optional `reload.toml`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::debounce::Classifier;
use crate::error::ConfigError;
use crate::overlay::OverlayStyle;

/// Name of the configuration file looked up in the watch root.
pub const CONFIG_FILE: &str = "reload.toml";

/// Tunables for the supervisor and the terminal host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Quiet period that closes a batch of file events, in milliseconds.
    pub debounce_ms: u64,
    /// Frames per second of the terminal host.
    pub fps: u32,
    /// Extension of script files (code reloads).
    pub script_extension: String,
    /// Extension of resource bundles (asset reloads).
    pub asset_extension: String,
    /// Maximum characters per overlay line.
    pub overlay_width: usize,
    /// Maximum message lines shown on the overlay.
    pub overlay_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debounce_ms: 50,
            fps: 30,
            script_extension: "lua".to_string(),
            asset_extension: "fres".to_string(),
            overlay_width: 48,
            overlay_lines: 4,
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::debug!("no {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// A classifier for the configured extensions.
    pub fn classifier(&self) -> Classifier {
        Classifier::new(&self.script_extension, &self.asset_extension)
    }

    /// Overlay bounds derived from this configuration.
    pub fn overlay(&self) -> OverlayStyle {
        OverlayStyle {
            width: self.overlay_width,
            lines: self.overlay_lines,
            ..OverlayStyle::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce(), Duration::from_millis(50));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "fps = 60\nasset_extension = \"res\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fps, 60);
        assert_eq!(config.asset_extension, "res");
        assert_eq!(config.debounce_ms, 50);
        assert!(config.classifier().is_asset(Path::new("a.res")));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "fsp = 60\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
