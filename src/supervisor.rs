//! The reload supervisor: owns the active callbacks and the failure state,
//! applies reload triggers, and stands between the frame loop and the script.

use std::fmt;
use std::path::Path;
use std::time::SystemTime;

use crossbeam_channel::Receiver;

use crate::assets;
use crate::callbacks::{CallbackSet, RuntimeFailure};
use crate::debounce::{coalesce, ReloadTrigger};
use crate::engine::FrameHandler;
use crate::error::{Error, Location, ReloadError};
use crate::overlay::{self, OverlayStyle};
use crate::script::ScriptLoader;

/// Whether the script is running normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// The active callbacks run every frame without fault.
    Running,
    /// The last code reload or frame failed. The script is not run and the
    /// overlay is shown until a code reload succeeds.
    Error,
}

/// What kind of operation produced a [`FailureRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// Loading new code or assets failed.
    Reload,
    /// An active callback failed while running a frame.
    Runtime,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOrigin::Reload => f.write_str("reload"),
            FailureOrigin::Runtime => f.write_str("runtime"),
        }
    }
}

/// The most recent failure.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// What failed.
    pub origin: FailureOrigin,
    /// The full message.
    pub message: String,
    /// Where in the script it failed, when known.
    pub location: Option<Location>,
    /// When it failed.
    pub timestamp: SystemTime,
}

impl FailureRecord {
    fn reload(err: &ReloadError) -> Self {
        FailureRecord {
            origin: FailureOrigin::Reload,
            message: err.to_string(),
            location: err.location().cloned(),
            timestamp: SystemTime::now(),
        }
    }

    fn runtime(failure: RuntimeFailure) -> Self {
        FailureRecord {
            origin: FailureOrigin::Runtime,
            message: failure.message,
            location: failure.location,
            timestamp: SystemTime::now(),
        }
    }

    /// Write this failure to the console log.
    fn report(&self) {
        match &self.location {
            Some(location) => {
                log::error!("{} error at {}:\n\t{}", self.origin, location, self.indented())
            }
            None => log::error!("{} error:\n\t{}", self.origin, self.indented()),
        }
    }

    fn indented(&self) -> String {
        self.message.replace('\n', "\n\t")
    }
}

/// Keeps a script running across edits.
///
/// The supervisor is registered with the frame loop in place of the script's
/// own callbacks (see its [`FrameHandler`] impl). Each frame it first applies
/// any pending reloads, then runs the active callbacks, catching whatever they
/// raise. Nothing raised by a reload or a callback ever reaches the frame
/// loop.
///
/// The active [`CallbackSet`] is always one that loaded successfully. A failed
/// reload leaves it in place, so it is also the last-good set. It is only run
/// while the state is [`SupervisorState::Running`].
pub struct Supervisor {
    loader: ScriptLoader,
    active: CallbackSet,
    state: SupervisorState,
    failure: Option<FailureRecord>,
    triggers: Receiver<ReloadTrigger>,
    overlay: OverlayStyle,
}

impl Supervisor {
    /// Perform the mandatory initial load and start in the running state.
    ///
    /// There is no earlier version to fall back on, so a failure here is fatal.
    pub fn start(
        mut loader: ScriptLoader,
        triggers: Receiver<ReloadTrigger>,
        overlay: OverlayStyle,
    ) -> Result<Self, Error> {
        let active = match loader.load() {
            Ok(active) => active,
            Err(err) => {
                FailureRecord::reload(&err).report();
                return Err(Error::InitialLoad(err));
            }
        };
        log::info!("loaded {}", loader.path().display());

        Ok(Supervisor {
            loader,
            active,
            state: SupervisorState::Running,
            failure: None,
            triggers,
            overlay,
        })
    }

    /// The current state.
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// The most recent failure, if it has not been cleared by a reload.
    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    /// The callbacks currently in force.
    pub fn active(&self) -> &CallbackSet {
        &self.active
    }

    /// Apply every trigger queued since the last frame.
    ///
    /// Only the latest trigger of each kind is applied.
    pub fn drain_triggers(&mut self) {
        let pending: Vec<ReloadTrigger> = self.triggers.try_iter().collect();
        for trigger in coalesce(pending) {
            self.apply(trigger);
        }
    }

    /// Perform the reload `trigger` asks for, synchronously.
    pub fn apply(&mut self, trigger: ReloadTrigger) {
        match trigger {
            ReloadTrigger::Code(path) => self.reload_code(&path),
            ReloadTrigger::Asset(path) => self.reload_assets(&path),
        }
    }

    /// Re-execute the script. `changed` is only used for reporting.
    pub fn reload_code(&mut self, changed: &Path) {
        match self.loader.reload(&mut self.active) {
            Ok(()) => {
                self.state = SupervisorState::Running;
                self.failure = None;
                log::info!(
                    "refresh successful ({}, generation {})",
                    changed.display(),
                    self.active.generation()
                );
            }
            Err(err) => {
                self.state = SupervisorState::Error;
                self.record(FailureRecord::reload(&err));
            }
        }
    }

    /// Load the resource bundle at `path` into the engine.
    ///
    /// Never changes the state: a broken bundle alone does not stop otherwise
    /// working code. The failure is still recorded, which only shows on the
    /// overlay if the state is already [`SupervisorState::Error`].
    pub fn reload_assets(&mut self, path: &Path) {
        match assets::reload_assets(self.loader.engine(), path) {
            Ok(()) => {
                log::info!("resources reloaded ({})", path.display());
                if self.state == SupervisorState::Running {
                    self.failure = None;
                }
            }
            Err(err) => self.record(FailureRecord::reload(&err)),
        }
    }

    /// Per-frame update: apply pending reloads, then run the script's `update`
    /// if the state is still running.
    pub fn frame_update(&mut self) {
        self.drain_triggers();

        if self.state == SupervisorState::Running {
            if let Err(failure) = self.active.update() {
                self.fail(failure);
            }
        }

        let frames = self.loader.frame_counter();
        frames.set(frames.get() + 1);
    }

    /// Per-frame draw: the script's `draw` while running, the overlay otherwise.
    pub fn frame_draw(&mut self) {
        if self.state == SupervisorState::Running {
            if let Err(failure) = self.active.draw() {
                self.fail(failure);
            }
        }

        if self.state == SupervisorState::Error {
            self.draw_overlay();
        }
    }

    /// Run the active set's teardown hook, if it has not run yet.
    ///
    /// Called automatically when the supervisor is dropped.
    pub fn shutdown(&mut self) {
        if let Some(Err(failure)) = self.active.teardown() {
            log::warn!("teardown failed during shutdown: {failure}");
        }
    }

    fn fail(&mut self, failure: RuntimeFailure) {
        self.state = SupervisorState::Error;
        self.record(FailureRecord::runtime(failure));
    }

    fn record(&mut self, record: FailureRecord) {
        record.report();
        self.failure = Some(record);
    }

    fn draw_overlay(&self) {
        let Some(record) = &self.failure else {
            return;
        };
        match self.loader.engine().try_borrow_mut() {
            Ok(mut engine) => overlay::render(&mut *engine, record, &self.overlay),
            Err(_) => log::error!("engine is in use, cannot draw the error overlay"),
        }
    }
}

impl FrameHandler for Supervisor {
    fn update(&mut self) {
        self.frame_update();
    }

    fn draw(&mut self) {
        self.frame_draw();
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
