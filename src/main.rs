use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gazecal::engine::DynEngine;
use gazecal::startup::{bring_up, import_calibration, open_engine, EngineKind};
use gazecal::{run_session, AppConfig, AutopilotSurface, FramePacing, SessionController};

/// Eye tracking calibration session
#[derive(Debug, Parser)]
#[command(author, version, about = "Eye tracking calibration session")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the built-in simulated engine instead of the vendor library
    #[arg(long, global = true)]
    simulate: bool,

    /// Vendor library to load, overriding the configuration
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Previously exported calibration to load before the session starts
    #[arg(long, global = true)]
    calibration: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the session in a window (default)
    Run {
        /// Use a normal window instead of borderless fullscreen
        #[arg(long)]
        windowed: bool,
    },
    /// Run the session without a window, confirming every screen automatically
    Headless {
        /// Frames each screen stays up before it is confirmed
        #[arg(long, default_value_t = 30)]
        frames_per_phase: u32,
        /// Abort after this many frames
        #[arg(long, default_value_t = 100_000)]
        max_frames: u64,
    },
    /// Print the engine version and license status
    Version,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn engine_kind(cli: &Cli) -> EngineKind<'_> {
    if cli.simulate {
        EngineKind::Simulated
    } else {
        EngineKind::Native(cli.library.as_deref())
    }
}

fn prepare(cli: &Cli, config: &AppConfig) -> Result<DynEngine> {
    let mut engine = open_engine(config, engine_kind(cli))?;
    bring_up(&mut engine, config)?;
    if let Some(file) = &cli.calibration {
        import_calibration(&mut engine, file)?;
    }
    Ok(engine)
}

fn build_controller(engine: DynEngine, config: &AppConfig) -> Result<SessionController<DynEngine>> {
    SessionController::new(engine, config.session_options())
        .context("Session targets could not be generated")
}

fn run_windowed(cli: &Cli, config: &AppConfig, windowed: bool) -> Result<()> {
    let engine = prepare(cli, config)?;
    let controller = build_controller(engine, config)?;
    let exit = gazecal::ui::build_app(controller, config.screen.size(), !windowed).run();
    if exit.is_error() {
        bail!("Display closed with an error: {:?}", exit);
    }
    Ok(())
}

fn run_headless(cli: &Cli, config: &AppConfig, frames_per_phase: u32, max_frames: u64) -> Result<()> {
    let engine = prepare(cli, config)?;
    let mut controller = build_controller(engine, config)?;
    let mut surface = AutopilotSurface::new(frames_per_phase);
    let pacing = FramePacing::stepped(Duration::from_millis(16), max_frames);

    let frames = run_session(&mut controller, &mut surface, pacing);
    info!(
        "Headless session ended after {} frames, {} cues, {} calibration attempt(s)",
        frames,
        surface.cues_played(),
        controller.session().attempts()
    );

    match controller.validation_summary() {
        Some(summary) => println!("{}", serde_json::to_string_pretty(summary)?),
        None => warn!("Session ended before validation finished"),
    }
    Ok(())
}

fn print_version(cli: &Cli, config: &AppConfig) -> Result<()> {
    let mut engine = open_engine(config, engine_kind(cli))?;
    let status = bring_up(&mut engine, config)?;
    println!("gazecal {}", env!("CARGO_PKG_VERSION"));
    println!("engine {}", status.version);
    println!("license valid for {} days", status.license_days);
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    let outcome = match &cli.command {
        None => run_windowed(&cli, &config, false),
        Some(Command::Run { windowed }) => run_windowed(&cli, &config, *windowed),
        Some(Command::Headless {
            frames_per_phase,
            max_frames,
        }) => run_headless(&cli, &config, *frames_per_phase, *max_frames),
        Some(Command::Version) => print_version(&cli, &config),
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}
