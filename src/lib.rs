#![deny(missing_docs)]

//! A supervisor for live-reloading frame-based game scripts.
//!
//! The general idea is that the host program owns everything long-lived (the
//! window, the frame loop, loaded resources) while the game logic lives in a
//! Lua script that can be edited while the game is running. When the script
//! changes, the supervisor executes the new version from scratch in a fresh
//! Lua state and swaps it in. When a resource bundle changes, it is loaded
//! into the engine in place.
//!
//! The supervisor also stands between the frame loop and the script, so a
//! bad edit never takes the process down: syntax errors, missing entry points
//! and errors raised while running a frame are caught and written to the log.
//! The script is then paused, keeping its last working version loaded, and a
//! small overlay shows the error instead. Fixing the script is enough to
//! recover.
//!
//! # Script contract
//!
//! A script is executed top to bottom on every load and must define two
//! global functions, `update` and `draw`. It may also define `on_unload`,
//! which is called once before a newer version of the script replaces it, and
//! once at shutdown:
//!
//! ```lua
//! init(60, 20, "demo")      -- only the first call ever takes effect
//! load("art.fres")          -- resource bundles load relative to the script
//!
//! local x = 0
//!
//! function update()
//!     if btn("right") then x = x + 1 end
//! end
//!
//! function draw()
//!     cls(1)
//!     sprite(x, 5, "ship")
//!     text(1, 1, "frame " .. frame_count(), 7)
//! end
//!
//! function on_unload()
//!     log("reloading at x = " .. x)
//! end
//! ```
//!
//! Top-level state such as `x` above starts over on every reload; only state
//! the host manages (the canvas, resources, `frame_count()`) lives on.
//!
//! # Host Example
//!
//! A host creates a [`ScriptLoader`] for the script, a [`ChangeWatcher`] for
//! the directory it lives in, and hands both to a [`Supervisor`], which is
//! then registered with the frame loop:
//!
//! ```rust,no_run
//! use frame_reload::{ChangeWatcher, Config, FrameLoop, ScriptLoader, Supervisor, TerminalHost};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut host = TerminalHost::new(config.fps);
//!     let watcher = ChangeWatcher::spawn(".", config.classifier(), config.debounce())?;
//!     let loader = ScriptLoader::new("game.lua", host.engine());
//!     let mut supervisor = Supervisor::start(loader, watcher.triggers(), config.overlay())?;
//!     host.run(&mut supervisor)?;
//!     Ok(())
//! }
//! ```

mod api;
mod assets;
mod callbacks;
mod config;
mod debounce;
mod engine;
mod error;
mod overlay;
mod script;
mod supervisor;
mod term;
mod watch;

pub use assets::{reload_assets, ResourceStore};
pub use callbacks::{CallbackSet, RuntimeFailure};
pub use config::{Config, CONFIG_FILE};
pub use debounce::{coalesce, Classifier, Debouncer, ReloadTrigger};
pub use engine::{Color, Engine, FrameHandler, FrameLoop, SharedEngine};
pub use error::{ConfigError, EngineError, Error, Location, ReloadError};
pub use overlay::{compose as compose_overlay, render as render_overlay, OverlayStyle};
pub use script::{ScriptLoader, DRAW, TEARDOWN, UPDATE};
pub use supervisor::{FailureOrigin, FailureRecord, Supervisor, SupervisorState};
pub use term::{Canvas, TerminalHost};
pub use watch::ChangeWatcher;
