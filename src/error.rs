//! Error types for loading, reloading and hosting a script.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Matches the `file.lua:12:` prefix Lua puts in front of error messages.
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^\s:\[\]]+\.lua):([0-9]+):").expect("location pattern is valid")
});

/// A position in a script, as reported by the Lua runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// The script file the error originated in.
    pub file: PathBuf,
    /// The 1-based line number.
    pub line: u32,
}

impl Location {
    /// Extract the first `file.lua:line:` location from a Lua error message.
    pub fn parse(message: &str) -> Option<Location> {
        let caps = LOCATION.captures(message)?;
        let line = caps.get(2)?.as_str().parse().ok()?;
        Some(Location {
            file: PathBuf::from(caps.get(1)?.as_str()),
            line,
        })
    }

    /// `line` with everything up to and including its first `file.lua:line:`
    /// removed.
    pub(crate) fn strip(line: &str) -> &str {
        match LOCATION.find(line) {
            Some(m) => line[m.end()..].trim_start(),
            None => line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// The errors a code or asset reload can produce.
///
/// None of these ever escape the supervisor after startup; they are turned into
/// a [`FailureRecord`](crate::FailureRecord) and shown on the overlay.
#[derive(Debug, Clone, Error)]
pub enum ReloadError {
    /// The script ran, but did not define one of the required entry points.
    #[error("{}: missing entry point `{name}`", .path.display())]
    MissingEntryPoint {
        /// The conventional name that could not be resolved.
        name: &'static str,
        /// The script that was executed.
        path: PathBuf,
    },
    /// Reading, parsing or running the script's top level failed.
    #[error("{message}")]
    ExecutionFailure {
        /// The full message, including any Lua traceback.
        message: String,
        /// Where the failure happened, when it could be derived.
        location: Option<Location>,
    },
    /// The resource bundle could not be loaded into the engine.
    #[error("{}: {message}", .path.display())]
    AssetLoadFailure {
        /// The bundle that failed to load.
        path: PathBuf,
        /// The engine's explanation.
        message: String,
    },
}

impl ReloadError {
    pub(crate) fn execution(err: &mlua::Error) -> Self {
        let message = err.to_string();
        ReloadError::ExecutionFailure {
            location: Location::parse(&message),
            message,
        }
    }

    pub(crate) fn unreadable(path: &Path, err: &std::io::Error) -> Self {
        ReloadError::ExecutionFailure {
            message: format!("cannot read {}: {}", path.display(), err),
            location: None,
        }
    }

    /// The source location of this error, if one is known.
    pub fn location(&self) -> Option<&Location> {
        match self {
            ReloadError::ExecutionFailure { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}

/// Errors reported by an [`Engine`](crate::Engine) or [`FrameLoop`](crate::FrameLoop).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading a file or talking to the terminal failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A resource bundle was read but is not well-formed.
    #[error("malformed resource bundle: {0}")]
    Bundle(String),
}

/// Errors reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or contains unknown keys.
    #[error("invalid configuration in {}: {source}", .path.display())]
    Parse {
        /// The configuration file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Unrecoverable errors: everything that can stop the supervisor from starting.
#[derive(Debug, Error)]
pub enum Error {
    /// The mandatory first load of the script failed, so there is nothing to fall back on.
    #[error("initial load failed: {0}")]
    InitialLoad(#[source] ReloadError),
    /// The filesystem watcher could not be set up.
    #[error("cannot watch {}: {source}", .path.display())]
    Watch {
        /// The root that was to be watched.
        path: PathBuf,
        /// The underlying watcher error.
        #[source]
        source: notify::Error,
    },
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The host engine failed outside of any script callback.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_location_from_syntax_error() {
        let message = "syntax error: game.lua:3: unexpected symbol near 'end'";
        let location = Location::parse(message).unwrap();
        assert_eq!(location.file, PathBuf::from("game.lua"));
        assert_eq!(location.line, 3);
    }

    #[test]
    fn parses_first_location_of_traceback() {
        let message = "runtime error: /tmp/x/player.lua:14: attempt to index a nil value\n\
                       stack traceback:\n\t/tmp/x/game.lua:5: in function 'update'";
        let location = Location::parse(message).unwrap();
        assert_eq!(location.file, PathBuf::from("/tmp/x/player.lua"));
        assert_eq!(location.line, 14);
        assert_eq!(location.to_string(), "/tmp/x/player.lua:14");
    }

    #[test]
    fn strips_location_prefix() {
        assert_eq!(
            Location::strip("syntax error: /tmp/x/game.lua:2: <name> expected near 'end'"),
            "<name> expected near 'end'"
        );
        assert_eq!(Location::strip("out of memory"), "out of memory");
    }

    #[test]
    fn no_location_in_plain_message() {
        assert_eq!(Location::parse("out of memory"), None);
    }
}
