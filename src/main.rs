#![warn(missing_docs)]

//! Brightness control for external displays

mod armaf;
mod config;
mod control;
mod external;
mod surface;

use anyhow::{Context, Result};
use clap::Parser;
use config::{BackendConfig, Config};
use control::display_synchronizer::DisplaySynchronizer;
use external::backend::{ddcutil::DdcutilBackend, mock::MockDisplayBackend, DisplayBackend};
use flexi_logger::{Logger, LoggerHandle};
use std::path::PathBuf;
use surface::console::{ConsoleSurface, Slider};
use tokio::io::BufReader;

/// Adjust the brightness of external displays
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Use made-up displays instead of talking to ddcutil
    #[clap(long)]
    mock: bool,

    /// Log more, repeat for even more
    #[clap(short, long, parse(from_occurrences))]
    verbose: usize,
}

// Everything runs on one thread, the synchronizer relies on its tasks being
// interleaved cooperatively.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    if args.mock && !matches!(config.backend, BackendConfig::Mock { .. }) {
        config.backend = BackendConfig::demo_mock();
    }

    let _logger = init_logging(&config.log_level, args.verbose)?;
    log_panics::init();
    log::debug!("Using configuration {:?}", config);

    let slider = Slider::new(config.surface.step);
    match config.backend {
        BackendConfig::Ddcutil {
            executable,
            extra_args,
        } => run(DdcutilBackend::new(&executable, &extra_args), slider).await,
        BackendConfig::Mock { displays } => run(MockDisplayBackend::new(displays), slider).await,
    }
}

/// Start the logger. Logs go to stderr, stdout belongs to the console.
///
/// `RUST_LOG` takes precedence over the configured specification.
fn init_logging(spec: &str, verbosity: usize) -> Result<LoggerHandle> {
    let spec = match verbosity {
        0 => spec,
        1 => "debug",
        _ => "trace",
    };
    Logger::try_with_env_or_str(spec)
        .and_then(|logger| logger.format(flexi_logger::opt_format).start())
        .with_context(|| format!("Invalid log specification {}", spec))
}

async fn run<B: DisplayBackend>(backend: B, slider: Slider) -> Result<()> {
    let (port, state) = DisplaySynchronizer::new(backend).spawn();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    ConsoleSurface::new(port, state, slider)
        .run(stdin, &mut stdout)
        .await
}
