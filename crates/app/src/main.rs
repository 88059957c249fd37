mod window;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use jawsync_core::{AppConfig, FrameLoop, MicrophoneSource, SpriteAssets};
use tracing_subscriber::EnvFilter;

use crate::window::WindowCanvas;

fn main() -> jawsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args)
            .inspect_err(|err| tracing::error!(%err, "jawsync terminated")),
        Commands::Defaults => print_defaults(),
    }
}

fn run(args: RunArgs) -> jawsync_core::Result<()> {
    let config = load_config(&args)?;
    tracing::info!(
        preset = ?args.preset,
        tick_rate = config.frame_loop.tick_rate,
        debug_overlay = config.frame_loop.debug_overlay,
        "starting animator"
    );

    // Released in reverse: the frame loop closes audio before the window.
    let canvas = WindowCanvas::open(&config.screen)?;
    let sprites = SpriteAssets::load(&config.assets, &config.screen)?;
    let microphone = MicrophoneSource::open(&config.audio)?;

    let mut frame_loop = FrameLoop::new(&config, microphone, canvas, sprites);
    let frames = frame_loop.run()?;
    tracing::info!(frames, "animator exited");
    Ok(())
}

fn load_config(args: &RunArgs) -> jawsync_core::Result<AppConfig> {
    let mut config = match &args.preset {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::live_defaults(),
    };

    if let Some(upper) = &args.upper {
        config.assets.upper = upper.clone();
    }
    if let Some(lower) = &args.lower {
        config.assets.lower = lower.clone();
    }
    if args.debug {
        config.frame_loop.debug_overlay = true;
    }

    config.validate()?;
    Ok(config)
}

fn print_defaults() -> jawsync_core::Result<()> {
    println!("{}", AppConfig::live_defaults().to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive talking mouth for streaming", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the window and animate the mouth from the default microphone.
    Run(RunArgs),
    /// Print the default configuration as JSON, a starting point for presets.
    Defaults,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Optional JSON preset file to load on startup.
    #[arg(short, long)]
    preset: Option<PathBuf>,
    /// Image for the upper mouth half.
    #[arg(long)]
    upper: Option<PathBuf>,
    /// Image for the lower mouth half.
    #[arg(long)]
    lower: Option<PathBuf>,
    /// Show frame diagnostics in the window title.
    #[arg(short, long)]
    debug: bool,
}
