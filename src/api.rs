//! The functions a script can call, installed into every fresh Lua state.
//!
//! | function                  | effect                                      |
//! |---------------------------|---------------------------------------------|
//! | `init(w, h, [title])`     | size the canvas; only the first call counts |
//! | `cls(col)`                | clear the canvas                            |
//! | `text(x, y, s, col)`      | draw text                                   |
//! | `rect(x, y, w, h, col)`   | fill a rectangle                            |
//! | `sprite(x, y, name, [col])` | draw a sprite from the loaded resources   |
//! | `load(path)`              | load a resource bundle                      |
//! | `btn(key)`                | whether `key` was pressed this frame        |
//! | `frame_count()`           | frames run since the supervisor started     |
//! | `log(msg)`                | write to the console log                    |

use std::cell::{Cell, RefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::{Lua, Table};

use crate::engine::{Color, Engine, SharedEngine};

/// Host state shared by every Lua state the loader creates.
///
/// This is the only state that lives across reloads.
#[derive(Clone)]
pub(crate) struct HostApi {
    engine: SharedEngine,
    root: PathBuf,
    initialized: Rc<Cell<bool>>,
    frames: Rc<Cell<u64>>,
}

impl HostApi {
    pub(crate) fn new(engine: SharedEngine, root: PathBuf) -> Self {
        HostApi {
            engine,
            root,
            initialized: Rc::new(Cell::new(false)),
            frames: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub(crate) fn frames(&self) -> &Rc<Cell<u64>> {
        &self.frames
    }

    fn borrow(&self) -> mlua::Result<RefMut<'_, dyn Engine + 'static>> {
        self.engine
            .try_borrow_mut()
            .map_err(|_| mlua::Error::RuntimeError("engine is already in use".into()))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Install the API into `lua` and make `require` search the script root.
    pub(crate) fn install(&self, lua: &Lua) -> mlua::Result<()> {
        let globals = lua.globals();

        let api = self.clone();
        globals.set(
            "init",
            lua.create_function(move |_, (w, h, title): (u16, u16, Option<String>)| {
                if api.initialized.replace(true) {
                    log::debug!("ignoring repeated init({w}, {h})");
                    return Ok(());
                }
                api.borrow()?
                    .init(w, h, title.as_deref().unwrap_or("frame-reload"));
                Ok(())
            })?,
        )?;

        let api = self.clone();
        globals.set(
            "cls",
            lua.create_function(move |_, col: i64| {
                api.borrow()?.clear(Color::wrapping(col));
                Ok(())
            })?,
        )?;

        let api = self.clone();
        globals.set(
            "text",
            lua.create_function(move |_, (x, y, s, col): (i32, i32, String, i64)| {
                api.borrow()?.draw_text(x, y, &s, Color::wrapping(col));
                Ok(())
            })?,
        )?;

        let api = self.clone();
        globals.set(
            "rect",
            lua.create_function(move |_, (x, y, w, h, col): (i32, i32, u16, u16, i64)| {
                api.borrow()?.fill_rect(x, y, w, h, Color::wrapping(col));
                Ok(())
            })?,
        )?;

        let api = self.clone();
        globals.set(
            "sprite",
            lua.create_function(move |_, (x, y, name, col): (i32, i32, String, Option<i64>)| {
                let color = col.map_or(Color::WHITE, Color::wrapping);
                Ok(api.borrow()?.draw_sprite(x, y, &name, color))
            })?,
        )?;

        let api = self.clone();
        globals.set(
            "load",
            lua.create_function(move |_, path: String| {
                let path = api.resolve(&path);
                api.borrow()?
                    .load_resources(&path)
                    .map_err(mlua::Error::external)
            })?,
        )?;

        let api = self.clone();
        globals.set(
            "btn",
            lua.create_function(move |_, key: String| Ok(api.borrow()?.is_key_down(&key)))?,
        )?;

        let frames = Rc::clone(&self.frames);
        globals.set(
            "frame_count",
            lua.create_function(move |_, ()| Ok(frames.get()))?,
        )?;

        globals.set(
            "log",
            lua.create_function(|_, msg: String| {
                log::info!(target: "script", "{msg}");
                Ok(())
            })?,
        )?;

        let package: Table = globals.get("package")?;
        let search: String = package.get("path")?;
        package.set(
            "path",
            format!("{}/?.lua;{}", self.root.display(), search),
        )?;

        Ok(())
    }
}
