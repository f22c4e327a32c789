//! A headless host for frame-reload: every frame, the text and sprites the
//! script draws are printed to stdout.
//!
//! Run it from the workspace root and edit `demo/game.lua` or `demo/art.fres`
//! while it runs:
//!
//! ```text
//! cargo run -p reload-demo -- demo/game.lua 100
//! ```

use std::cell::RefCell;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use frame_reload::{
    ChangeWatcher, Color, Config, Engine, EngineError, FrameHandler, FrameLoop, ResourceStore,
    ScriptLoader, Supervisor,
};

fn print(msg: &str) {
    print!("{}", msg);
    let _ = std::io::stdout().flush();
}

/// Records draw calls as lines of text instead of pixels.
#[derive(Default)]
struct Console {
    title: String,
    lines: Vec<String>,
    resources: ResourceStore,
}

impl Engine for Console {
    fn init(&mut self, width: u16, height: u16, title: &str) {
        self.title = title.to_string();
        log::info!("init {}x{} \"{}\"", width, height, title);
    }

    fn clear(&mut self, _color: Color) {
        self.lines.clear();
    }

    fn fill_rect(&mut self, _x: i32, _y: i32, _width: u16, _height: u16, _color: Color) {}

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Color) {
        let marker = if color == Color::ERROR { "!" } else { " " };
        self.lines.push(format!("{marker}({x:>2},{y:>2}) {text}"));
    }

    fn draw_sprite(&mut self, x: i32, y: i32, name: &str, _color: Color) -> bool {
        let Some(rows) = self.resources.sprite(name) else {
            return false;
        };
        let rows = rows.to_vec();
        for (dy, row) in rows.iter().enumerate() {
            self.lines.push(format!(" ({x:>2},{:>2}) {row}", y + dy as i32));
        }
        true
    }

    fn load_resources(&mut self, path: &Path) -> Result<(), EngineError> {
        self.resources.replace_from(path)?;
        log::info!("{} sprites loaded", self.resources.len());
        Ok(())
    }

    fn is_key_down(&self, _key: &str) -> bool {
        false
    }

    fn size(&self) -> (u16, u16) {
        (80, 24)
    }
}

/// Ticks the handler at a fixed rate, optionally for a limited number of frames.
struct Ticker {
    console: Rc<RefCell<Console>>,
    period: Duration,
    frames: Option<u64>,
}

impl FrameLoop for Ticker {
    fn run(&mut self, handler: &mut dyn FrameHandler) -> Result<(), EngineError> {
        let mut frame = 0;
        while self.frames.map_or(true, |n| frame < n) {
            frame += 1;
            handler.update();
            handler.draw();

            let console = self.console.borrow();
            print(&format!("-- {} frame {} --\n", console.title, frame));
            for line in &console.lines {
                print(&format!("{line}\n"));
            }
            drop(console);

            thread::sleep(self.period);
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let script = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demo/game.lua"));
    let frames = match args.next().map(|n| n.parse::<u64>()).transpose() {
        Ok(frames) => frames,
        Err(err) => {
            log::error!("frame count: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&script, frames) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(script: &Path, frames: Option<u64>) -> Result<(), frame_reload::Error> {
    let root = match script.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let config = Config::load(&root.join(frame_reload::CONFIG_FILE))?;
    let watcher = ChangeWatcher::spawn(&root, config.classifier(), config.debounce())?;

    let console = Rc::new(RefCell::new(Console::default()));
    let loader = ScriptLoader::new(script, console.clone());
    let mut supervisor = Supervisor::start(loader, watcher.triggers(), config.overlay())?;

    let mut ticker = Ticker {
        console,
        period: Duration::from_secs(1) / config.fps.clamp(1, 10),
        frames,
    };
    ticker.run(&mut supervisor)?;
    supervisor.shutdown();
    Ok(())
}
