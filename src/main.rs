//! `frame-reload`: run a Lua game script in the terminal and reload it on edit.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use frame_reload::{
    ChangeWatcher, Config, FrameLoop, ScriptLoader, Supervisor, TerminalHost, CONFIG_FILE,
};

/// Live-reloading supervisor for frame-based game scripts
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the log to this file instead of stderr
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a script module and reload it whenever it or its assets change
    #[command(visible_alias = "r")]
    Run {
        /// Script module name, without extension (e.g. `game` for game.lua)
        module: String,

        /// Directory containing the module; it is watched recursively
        #[arg(long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
        root: PathBuf,

        /// Config file path (default: <root>/reload.toml)
        #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
        config: Option<PathBuf>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Quiet period that closes a batch of file changes, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logger(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Run {
            module,
            root,
            config,
            fps,
            debounce_ms,
        } => run(&module, &root, config.as_deref(), fps, debounce_ms),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            if cli.log_file.is_some() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run(
    module: &str,
    root: &Path,
    config_path: Option<&Path>,
    fps: Option<u32>,
    debounce_ms: Option<u64>,
) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_FILE));
    let mut config = Config::load(&config_path)?;
    if let Some(fps) = fps {
        config.fps = fps;
    }
    if let Some(ms) = debounce_ms {
        config.debounce_ms = ms;
    }

    let script = root.join(format!("{module}.{}", config.script_extension));

    // Watch first so edits made during the initial load are not missed.
    let watcher = ChangeWatcher::spawn(root, config.classifier(), config.debounce())?;

    let mut host = TerminalHost::new(config.fps);
    let loader = ScriptLoader::new(&script, host.engine());
    let mut supervisor = Supervisor::start(loader, watcher.triggers(), config.overlay())
        .with_context(|| format!("cannot start {}", script.display()))?;

    log::info!("watching {} (press Esc to quit)", watcher.root().display());
    host.run(&mut supervisor).context("frame loop failed")?;

    supervisor.shutdown();
    Ok(())
}
