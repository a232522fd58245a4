mod cli;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use reposync_core::config::{ConfigManager, ConfigValidator, InstanceConfig};
use reposync_core::paths::PathResolver;
use reposync_core::{Config, Session, SessionOptions, SessionOutcome};
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn main() -> anyhow::Result<()> {
    // Set up Ctrl+C handler for graceful interruption
    ctrlc::set_handler(|| {
        eprintln!("\n\nInterrupted by user (Ctrl+C)");
        std::process::exit(130); // Standard exit code for SIGINT
    })
    .context("Failed to set Ctrl+C handler")?;

    let cli = Cli::parse();
    let filter = init_logging(cli.verbose)?;

    info!("reposync version {}", env!("CARGO_PKG_VERSION"));

    let resolver = PathResolver::from_current_dir()?;
    let config = load_config(&cli, resolver.base())?;

    let options = SessionOptions::new(resolver.base())
        .with_watch(config.watch.to_options())
        .with_production(cli.production);
    if cli.production {
        debug!("Production mode: exiting after the initial pass");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run_sessions(&config, &resolver, options, filter, cli.verbose))
}

/// Install the fmt subscriber behind a reloadable filter
fn init_logging(verbose: bool) -> anyhow::Result<FilterHandle> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(handle)
}

/// Config from `--source/--dest` or from the discovered config file
fn load_config(cli: &Cli, cwd: &Path) -> anyhow::Result<Config> {
    let mut config = if cli.sources.is_empty() {
        ConfigManager::load(cli.config.as_deref(), cwd)?
    } else {
        let mut config = match cli.config.as_deref() {
            Some(path) => ConfigManager::read(path)?,
            None => Config::default(),
        };
        config.instances = vec![InstanceConfig {
            sources: cli.sources.clone(),
            destinations: cli.destinations.clone(),
            ignore_exempt: Vec::new(),
            marker: cli.marker.clone(),
        }];
        ConfigValidator::validate(&config).context("Invalid command-line instance")?;
        config
    };

    if cli.watch {
        config.continuous = true;
    }
    Ok(config)
}

async fn run_sessions(
    config: &Config,
    resolver: &PathResolver,
    options: SessionOptions,
    filter: FilterHandle,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut sessions = JoinSet::new();

    for group in config.groups(resolver) {
        let name = group.name.clone();
        let filter = filter.clone();
        let session = Session::new(group, options.clone()).with_steady_state_hook(move || {
            if verbose {
                return;
            }
            // Per-event logging from here on
            if let Err(e) = filter.modify(|f| *f = EnvFilter::new("debug")) {
                eprintln!("Failed to raise log level: {e}");
            }
        });
        sessions.spawn(async move { (name, session.run().await) });
    }

    while let Some(joined) = sessions.join_next().await {
        let (name, outcome) = joined.context("Session task panicked")?;
        match outcome.with_context(|| format!("Sync failed for {name}"))? {
            SessionOutcome::Completed(result) => {
                debug!(group = %name, operations = result.total_operations(), "Session completed");
            }
            SessionOutcome::Stopped(_) => {
                info!(group = %name, "Session stopped");
            }
        }
    }

    Ok(())
}
