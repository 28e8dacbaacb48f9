use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info};

use plughost::commands;
use plughost::config::{self, AppConfig};
use plughost::error::{AppError, Result, ShutdownError};
use plughost::plugin::PluginOptions;
use plughost::plugins::{ApiKeyPlugin, MetricsPlugin, RateLimitPlugin, RequestLogPlugin, StoragePlugin};
use plughost::server::{App, CheckOutcome};

#[derive(Parser, Debug)]
#[command(name = "plughost")]
#[command(about = "A plugin-composed HTTP application host", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (TOML/JSON/YAML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Run the application host (default)
    Run,
    /// Check the configuration without starting a listener
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            match config::load_from_path(path).await {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Failed to load configuration from {}: {}", path.display(), e);
                    return Err(e);
                }
            }
        }
        None => match config::load_from_env_or_file().await {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Err(e);
            }
        },
    };

    init_tracing(&config, args.debug);

    match args.command.unwrap_or(Command::Run) {
        Command::Check => commands::run_config_check(&config),
        Command::Run => run(config).await,
    }
}

fn init_tracing(config: &AppConfig, debug: bool) {
    let log_level = if debug {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("plughost={log_level}").parse().unwrap());

    if config.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(config: AppConfig) -> Result<()> {
    info!("Starting {} on {}", config.name, config.bind_addr());

    let mut app = App::new(config.clone());

    // Metrics first so its middleware counts every request, including the
    // ones auth or rate limiting reject.
    app.use_plugin(Box::new(MetricsPlugin::new()));
    app.use_plugin(Box::new(RequestLogPlugin::new()));

    if let Ok(key) = std::env::var("PLUGHOST_API_KEY") {
        app.use_plugin_with(
            Box::new(ApiKeyPlugin::new()),
            PluginOptions::with_config(serde_json::json!({ "key": key })).required(),
        );
    }

    if config.rate_limit.enabled {
        app.use_plugin(Box::new(RateLimitPlugin::new()));
    }

    // Storage stays optional: a database failure degrades /health instead
    // of blocking startup.
    let db_path = std::env::var("PLUGHOST_DB_PATH").unwrap_or_else(|_| "plughost.db".to_string());
    app.use_plugin_with(
        Box::new(StoragePlugin::new()),
        PluginOptions::with_config(serde_json::json!({ "path": db_path })),
    );

    let started_at = Instant::now();
    app.add_health_check("process", move || async move {
        Ok(CheckOutcome::healthy(serde_json::json!({
            "uptimeSeconds": started_at.elapsed().as_secs(),
        })))
    });

    app.start().await?;

    shutdown_signal().await;
    info!("Shutting down {}", app.config().name);

    match app.stop().await {
        Ok(()) => Ok(()),
        Err(e @ AppError::Shutdown(ShutdownError::Timeout { .. })) => {
            error!("{e}");
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
