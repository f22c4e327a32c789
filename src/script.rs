//! Loading and reloading the edited script.

use std::cell::Cell;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::{Function, Lua, Table, Value};

use crate::api::HostApi;
use crate::callbacks::{CallbackSet, RuntimeFailure};
use crate::engine::SharedEngine;
use crate::error::ReloadError;

/// Name of the required per-frame update entry point.
pub const UPDATE: &str = "update";
/// Name of the required per-frame draw entry point.
pub const DRAW: &str = "draw";
/// Name of the optional teardown entry point.
pub const TEARDOWN: &str = "on_unload";

/// Executes a script from scratch and extracts its [`CallbackSet`].
///
/// Every load gets a brand new Lua state, so nothing a previous version of
/// the script left behind is visible to the next one.
pub struct ScriptLoader {
    path: PathBuf,
    api: HostApi,
    generation: u64,
}

impl ScriptLoader {
    /// Create a loader for the script at `path`. Nothing is executed yet.
    ///
    /// `require` and `load` inside the script resolve relative to the script's
    /// directory.
    pub fn new<P: AsRef<Path>>(path: P, engine: SharedEngine) -> Self {
        let path = path.as_ref().to_path_buf();
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ScriptLoader {
            api: HostApi::new(engine, root),
            path,
            generation: 0,
        }
    }

    /// The script this loader executes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The engine scripts draw to.
    pub fn engine(&self) -> &SharedEngine {
        self.api.engine()
    }

    /// The host-owned frame counter scripts read with `frame_count()`.
    pub fn frame_counter(&self) -> &Rc<Cell<u64>> {
        self.api.frames()
    }

    /// Execute the script in a fresh Lua state and resolve its entry points.
    pub fn load(&mut self) -> Result<CallbackSet, ReloadError> {
        let source =
            fs::read_to_string(&self.path).map_err(|e| ReloadError::unreadable(&self.path, &e))?;

        let lua = Lua::new();
        self.api
            .install(&lua)
            .map_err(|e| ReloadError::execution(&e))?;

        let chunk = lua
            .load(source.as_str())
            .set_name(format!("@{}", self.path.display()));
        match panic::catch_unwind(AssertUnwindSafe(|| chunk.exec())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(ReloadError::execution(&err)),
            Err(payload) => {
                let failure = RuntimeFailure::from_panic(payload);
                return Err(ReloadError::ExecutionFailure {
                    message: failure.message,
                    location: None,
                });
            }
        }

        let globals = lua.globals();
        let update = self.required(&globals, UPDATE)?;
        let draw = self.required(&globals, DRAW)?;
        let teardown = self.entry_point(&globals, TEARDOWN)?;
        drop(globals);

        self.generation += 1;
        Ok(CallbackSet::new(lua, update, draw, teardown, self.generation))
    }

    /// Load a new version of the script and make it `active`.
    ///
    /// The new script is fully executed before anything happens to `active`.
    /// If it fails, `active` is left exactly as it was. If it succeeds, the old
    /// set's teardown hook runs (its failure is logged and otherwise ignored)
    /// and then the new set replaces it.
    pub fn reload(&mut self, active: &mut CallbackSet) -> Result<(), ReloadError> {
        let next = self.load()?;
        if let Some(Err(failure)) = active.teardown() {
            log::warn!("{TEARDOWN} failed, continuing with reload: {failure}");
        }
        *active = next;
        Ok(())
    }

    fn required(&self, globals: &Table, name: &'static str) -> Result<Function, ReloadError> {
        self.entry_point(globals, name)?
            .ok_or_else(|| ReloadError::MissingEntryPoint {
                name,
                path: self.path.clone(),
            })
    }

    fn entry_point(&self, globals: &Table, name: &str) -> Result<Option<Function>, ReloadError> {
        match globals.get::<Value>(name) {
            Ok(Value::Function(function)) => Ok(Some(function)),
            Ok(Value::Nil) => Ok(None),
            Ok(other) => Err(ReloadError::ExecutionFailure {
                message: format!(
                    "{}: `{name}` must be a function, found {}",
                    self.path.display(),
                    other.type_name()
                ),
                location: None,
            }),
            Err(err) => Err(ReloadError::execution(&err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use tempfile::TempDir;

    use super::*;
    use crate::engine::{Color, Engine};
    use crate::error::EngineError;

    #[derive(Default)]
    struct Blank {
        inits: u32,
    }

    impl Engine for Blank {
        fn init(&mut self, _: u16, _: u16, _: &str) {
            self.inits += 1;
        }
        fn clear(&mut self, _: Color) {}
        fn fill_rect(&mut self, _: i32, _: i32, _: u16, _: u16, _: Color) {}
        fn draw_text(&mut self, _: i32, _: i32, _: &str, _: Color) {}
        fn draw_sprite(&mut self, _: i32, _: i32, _: &str, _: Color) -> bool {
            false
        }
        fn load_resources(&mut self, _: &Path) -> Result<(), EngineError> {
            Ok(())
        }
        fn is_key_down(&self, _: &str) -> bool {
            false
        }
        fn size(&self) -> (u16, u16) {
            (80, 24)
        }
    }

    fn loader(dir: &TempDir, source: &str) -> (ScriptLoader, Rc<RefCell<Blank>>) {
        let path = dir.path().join("game.lua");
        fs::write(&path, source).unwrap();
        let engine = Rc::new(RefCell::new(Blank::default()));
        (ScriptLoader::new(&path, engine.clone()), engine)
    }

    #[test]
    fn loads_entry_points() {
        let dir = TempDir::new().unwrap();
        let (mut loader, _) = loader(&dir, "function update() end\nfunction draw() end");
        let set = loader.load().unwrap();
        assert_eq!(set.generation(), 1);
        assert!(!set.has_teardown());
        assert!(set.update().is_ok());
    }

    #[test]
    fn missing_draw_is_reported() {
        let dir = TempDir::new().unwrap();
        let (mut loader, _) = loader(&dir, "function update() end");
        match loader.load() {
            Err(ReloadError::MissingEntryPoint { name, .. }) => assert_eq!(name, DRAW),
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn non_function_entry_point_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut loader, _) = loader(&dir, "update = 3\nfunction draw() end");
        let err = loader.load().err().unwrap();
        assert!(err.to_string().contains("must be a function, found integer"));
    }

    #[test]
    fn syntax_error_has_location() {
        let dir = TempDir::new().unwrap();
        let (mut loader, _) = loader(&dir, "function update()\nend\nlocal = 5\nfunction draw() end");
        let err = loader.load().err().unwrap();
        let location = err.location().unwrap();
        assert!(location.file.ends_with("game.lua"));
        assert_eq!(location.line, 3);
    }

    #[test]
    fn globals_do_not_survive_reload() {
        let dir = TempDir::new().unwrap();
        let (mut loader, _) = loader(
            &dir,
            "counter = (counter or 0) + 1\n\
             function update() if counter ~= 1 then error('stale') end end\n\
             function draw() end",
        );
        let mut set = loader.load().unwrap();
        loader.reload(&mut set).unwrap();
        assert_eq!(set.generation(), 2);
        assert!(set.update().is_ok());
    }

    #[test]
    fn init_only_applies_once() {
        let dir = TempDir::new().unwrap();
        let (mut loader, engine) = loader(
            &dir,
            "init(40, 20)\nfunction update() end\nfunction draw() end",
        );
        let mut set = loader.load().unwrap();
        loader.reload(&mut set).unwrap();
        assert_eq!(engine.borrow().inits, 1);
    }

    #[test]
    fn unreadable_script_fails() {
        let engine = Rc::new(RefCell::new(Blank::default()));
        let mut loader = ScriptLoader::new("/nonexistent/game.lua", engine);
        let err = loader.load().err().unwrap();
        assert!(err.to_string().contains("cannot read"));
    }
}
