//! # surface-sim - Render surface simulator
//!
//! Drives every configured display through its render surface against
//! simulated buffer queues, sinks and a shared composition backend, then
//! prints a per-display summary.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;

use render_surface::frame::{AbortOnFatal, EscalationHandler, EscalationLog};
use render_surface::observer::{LogObserver, SurfaceObserver};
use render_surface::sim::{SimCompositionBackend, SimDisplay};
use render_surface::SimConfig;

#[derive(Parser)]
#[command(name = "surface-sim")]
#[command(about = "Simulates per-display frame buffer handoff between GPU, buffer queue and HWC")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/axiom/surface-sim.toml")]
    config: String,

    /// Frames per display (overrides the configuration file)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    frames: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print each display's surface dump after the run
    #[arg(long)]
    dump: bool,

    /// Record fatal queue failures instead of aborting the process
    #[arg(long)]
    keep_going: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("🚀 Starting surface-sim");
    info!(
        "📄 Version: {} (built {})",
        render_surface::VERSION,
        render_surface::BUILD_DATE
    );

    // Load configuration
    let mut config = match SimConfig::load(&cli.config) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            warn!("⚠️ Failed to load configuration: {:#}", e);
            info!("🔧 Using default configuration");
            SimConfig::default()
        }
    };

    if let Some(frames) = cli.frames {
        config.general.frames = frames;
    }
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let backend = Arc::new(SimCompositionBackend::new());
    let observer: Arc<dyn SurfaceObserver> = Arc::new(LogObserver);
    let escalations = EscalationLog::new();

    info!(
        "🖥️ Driving {} display(s) for {} frame(s)",
        config.displays.len(),
        config.general.frames
    );

    // One producer per display, each on its own blocking thread
    let mut tasks = Vec::with_capacity(config.displays.len());
    for display in config.displays.clone() {
        let general = config.general.clone();
        let backend = backend.clone();
        let observer = observer.clone();
        let escalation: Box<dyn EscalationHandler> = if cli.keep_going {
            Box::new(escalations.clone())
        } else {
            Box::new(AbortOnFatal)
        };

        tasks.push(tokio::task::spawn_blocking(move || {
            let mut sim = SimDisplay::build(&display, &general, backend, observer, escalation);
            sim.run(general.frames)
        }));
    }

    let mut fatal = 0usize;
    for task in tasks {
        let summary = task.await.context("Display task panicked")?;
        println!("{}", summary);
        if cli.dump {
            print!("{}", summary.dump);
        }
        if summary.fatal.is_some() {
            fatal += 1;
        }
    }

    for err in escalations.errors() {
        error!("❌ {}", err);
    }

    if fatal > 0 {
        anyhow::bail!("{} display(s) stopped on a fatal queue failure", fatal);
    }

    info!("✅ All displays completed");
    Ok(())
}
