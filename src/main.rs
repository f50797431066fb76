//! The `scangate` binary.
//!
//! Loads configuration, runs one scan, emits the outcome, and maps it to
//! a process exit code. Every error from the lower layers is caught here,
//! exactly once, and reported without retry.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scangate::{Cli, Gate, GateResult};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scangate=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(failed) => {
            if failed {
                tracing::error!("scan verdict is infected and fail-on-infected is set");
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "scan did not complete");
            std::process::exit(1);
        }
    }
}

async fn run() -> GateResult<bool> {
    let config = Cli::parse().into_config()?;
    let report = Gate::new(config)?.run().await?;
    report.emit()?;
    Ok(report.failed)
}
