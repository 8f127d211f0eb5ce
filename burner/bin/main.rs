#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use burner::{Burner, config};
use burner_common::{internal, logging};
use clap::Parser;

/// Disposable mailboxes: accept mail for any alias and show it to anyone who
/// asks, for a few hours.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (RON). Defaults to `BURNER_CONFIG`, then
    /// ./burner.config.ron, then /etc/burner/burner.config.ron.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init();

    let from_env = std::env::var_os("BURNER_CONFIG").map(PathBuf::from);
    let burner = match config::find_config_file(args.config, from_env)? {
        Some(path) => {
            internal!(level = INFO, "Using configuration {}", path.display());
            config::load(&path)?
        }
        None => {
            internal!(
                level = WARN,
                "No configuration file found, using defaults. Tried:\n  - BURNER_CONFIG environment variable\n  - {}",
                config::DEFAULT_PATHS.join("\n  - ")
            );
            Burner::default()
        }
    };

    burner.run().await
}
