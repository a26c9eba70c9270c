//! Country Cache - cached country and exchange-rate service
//!
//! Serves merged country records over HTTP and refreshes them from the
//! upstream providers on demand or on a schedule.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use country_cache::{
    api::build_app,
    config::CountryCacheConfig,
    countries::{CountriesState, CountryStore},
    refresh::Refresher,
    summary::{FsSummaryCache, SummaryCache, SummaryGenerator},
    upstream::HttpUpstream,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "country-cache")]
#[command(version)]
#[command(about = "Cached country and exchange-rate REST service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "COUNTRY_CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Run one refresh cycle and exit
    Refresh,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("country_cache={},tower_http=debug", log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = CountryCacheConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { host, port } => {
            run_server(config, host, port).await?;
        }
        Commands::Refresh => {
            run_refresh_once(config).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

/// Shared components wired from configuration
struct Services {
    store: Arc<CountryStore>,
    refresher: Arc<Refresher>,
    cache: Arc<dyn SummaryCache>,
}

async fn build_services(config: &CountryCacheConfig) -> Result<Services> {
    let store = CountryStore::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    store.migrate().await.context("failed to create schema")?;
    let store = Arc::new(store);

    let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);
    let cache: Arc<dyn SummaryCache> = Arc::new(FsSummaryCache::new(&config.cache.dir));
    let summary = Arc::new(SummaryGenerator::new(store.clone(), cache.clone()));
    let refresher = Arc::new(Refresher::new(store.clone(), upstream, summary));

    Ok(Services {
        store,
        refresher,
        cache,
    })
}

async fn run_server(config: CountryCacheConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    tracing::info!("Starting Country Cache");

    let services = build_services(&config).await?;

    let scheduler = if config.refresh.interval_secs > 0 {
        Some(services.refresher.clone().spawn_periodic(
            Duration::from_secs(config.refresh.interval_secs),
            config.refresh.on_startup,
        ))
    } else {
        if config.refresh.on_startup {
            let refresher = services.refresher.clone();
            tokio::spawn(async move {
                if let Err(e) = refresher.refresh_countries().await {
                    tracing::warn!(error = %e, "Startup refresh failed");
                }
            });
        }
        None
    };

    let state = CountriesState {
        store: services.store,
        refresher: services.refresher,
        cache: services.cache,
    };
    let app = build_app(state, &config.server.cors_origins);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))?;

    tracing::info!(
        address = %listener.local_addr()?,
        "Country Cache is running. Press Ctrl+C to stop."
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    tracing::info!("Shutting down...");
    Ok(())
}

async fn run_refresh_once(config: CountryCacheConfig) -> Result<()> {
    let services = build_services(&config).await?;
    let outcome = services.refresher.refresh_countries().await?;
    println!(
        "Refreshed {} countries ({} inserted, {} updated)",
        outcome.total(),
        outcome.inserted,
        outcome.updated
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn show_config(config: Option<&CountryCacheConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
