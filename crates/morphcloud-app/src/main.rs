use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use morphcloud_core::{
    spawn_gesture_source, EngineConfig, Formation, GestureFeed, GestureSignalProcessor, GestureState, LandmarkSlot,
    ParticleEngine, SignalSlot,
};
use morphcloud_platform::{DetectionFrame, GestureSource};
use morphcloud_ui::{run_control_panel, CanvasRenderer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod headless;
mod sources;

use crate::headless::LogRenderer;
use crate::sources::{ReplaySource, SyntheticHands};

#[derive(Parser)]
#[command(name = "morphcloud")]
#[command(about = "Gesture-controlled particle formations", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial formation, overriding the config
    #[arg(short, long)]
    formation: Option<Formation>,

    /// Particle count, overriding the config
    #[arg(short = 'n', long)]
    particles: Option<usize>,

    /// Run without a window for this many ticks
    #[arg(long, value_name = "TICKS")]
    headless: Option<u64>,

    /// Headless frame rate
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Headless: switch to the next formation every N seconds
    #[arg(long, value_name = "SECONDS")]
    cycle: Option<f32>,

    /// Replay recorded detection frames (JSON lines) instead of synthetic hands
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Restart the replay when it runs out
    #[arg(long, requires = "replay")]
    looped: bool,

    /// Run with no gesture input at all
    #[arg(long, conflicts_with = "replay")]
    no_hands: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let cli = Cli::parse();
    info!("Morphcloud starting");
    if let Err(e) = run(cli) {
        error!("Morphcloud error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(formation) = cli.formation {
        config.formation = formation;
    }
    if let Some(count) = cli.particles {
        config.particle_count = count;
    }

    let signal = SignalSlot::new(GestureState::neutral(&config.gesture));
    let landmarks = LandmarkSlot::new(DetectionFrame::empty());
    let feed = GestureFeed::new(GestureSignalProcessor::new(config.gesture.clone()), signal.clone())
        .with_landmarks(landmarks.clone());

    let interval = Duration::from_millis(33);
    let source: Option<Box<dyn GestureSource>> = match (&cli.replay, cli.no_hands) {
        (_, true) => None,
        (Some(path), false) => Some(Box::new(ReplaySource::new(path.clone(), interval, cli.looped))),
        (None, false) => Some(Box::new(SyntheticHands::new(interval))),
    };
    let source = source.map(|s| spawn_gesture_source(s, feed)).transpose()?;

    let result: Result<(), Box<dyn Error>> = match cli.headless {
        Some(ticks) => {
            let renderer = LogRenderer::new(u64::from(cli.fps.max(1)));
            let mut engine = ParticleEngine::new(config, Box::new(renderer), signal)?;
            let cycle = headless::cycle_period(cli.cycle);
            headless::run(&mut engine, ticks, cli.fps, cycle).map_err(Into::into)
        }
        None => {
            let (renderer, view) = CanvasRenderer::new();
            let engine = ParticleEngine::new(config, Box::new(renderer), signal)?;
            run_control_panel(engine, view, Some(landmarks)).map_err(Into::into)
        }
    };

    if let Some(source) = source {
        source.stop();
    }
    result
}
