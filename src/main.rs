use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use registry_watch::cli::run_from_config;
use registry_watch::config;

/// All behaviour comes from `registry-watch.toml` (optional) and the
/// environment, so the only flags are `--help` and `--version`.
#[derive(clap::Parser)]
#[command(
    name = "registry-watch",
    version,
    about = "Check container registries for newer service tags and cut a release"
)]
struct Args {}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let _args = Args::parse();
    init_tracing();

    tracing::info!("starting registry watcher");

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config = config::load_config(&cwd).context("failed to load configuration")?;

    let outcome = run_from_config(&config).context("registry watch failed")?;

    match &outcome.release_tag {
        Some(tag) => tracing::info!(
            release = %tag,
            services = outcome.updates.len(),
            warnings = outcome.warnings.len(),
            "release updated"
        ),
        None => tracing::info!(warnings = outcome.warnings.len(), "no release needed"),
    }

    Ok(())
}
