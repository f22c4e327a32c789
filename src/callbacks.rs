//! The entry points of a loaded script and the guarded calls into them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use mlua::{Function, Lua};
use thiserror::Error;

use crate::error::Location;

/// A failure raised by one of the script's callbacks while it was running.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeFailure {
    /// The full message, including any Lua traceback.
    pub message: String,
    /// Where the failure happened, when it could be derived.
    pub location: Option<Location>,
}

impl RuntimeFailure {
    fn from_lua(err: &mlua::Error) -> Self {
        let message = err.to_string();
        RuntimeFailure {
            location: Location::parse(&message),
            message,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("host panicked: {s}")
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("host panicked: {s}")
        } else {
            "host panicked".to_string()
        };
        RuntimeFailure {
            message,
            location: None,
        }
    }
}

/// The entry points of one successfully executed script.
///
/// Each set owns the Lua state it was created in, so dropping the set drops
/// every value the script's top level created. A set is never modified after
/// it is built, except that its teardown hook can be taken and run once.
pub struct CallbackSet {
    update: Function,
    draw: Function,
    teardown: Option<Function>,
    generation: u64,
    // Declared last so the handles above are released first.
    _lua: Lua,
}

impl CallbackSet {
    pub(crate) fn new(
        lua: Lua,
        update: Function,
        draw: Function,
        teardown: Option<Function>,
        generation: u64,
    ) -> Self {
        CallbackSet {
            update,
            draw,
            teardown,
            generation,
            _lua: lua,
        }
    }

    /// Run the script's `update`.
    pub fn update(&self) -> Result<(), RuntimeFailure> {
        invoke(&self.update)
    }

    /// Run the script's `draw`.
    pub fn draw(&self) -> Result<(), RuntimeFailure> {
        invoke(&self.draw)
    }

    /// Whether the teardown hook is defined and has not run yet.
    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    /// Run the teardown hook, if there is one that has not run yet.
    ///
    /// Returns `None` when there was nothing to run.
    pub fn teardown(&mut self) -> Option<Result<(), RuntimeFailure>> {
        let hook = self.teardown.take()?;
        Some(invoke(&hook))
    }

    /// Counts successful loads: the initial load is generation 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Call a zero-argument Lua function, catching both Lua errors and host panics.
pub(crate) fn invoke(function: &Function) -> Result<(), RuntimeFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| function.call::<()>(()))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(RuntimeFailure::from_lua(&err)),
        Err(payload) => Err(RuntimeFailure::from_panic(payload)),
    }
}
