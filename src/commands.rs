use crate::config::AppConfig;
use crate::error::Result;
use tracing::info;

/// Validate the configuration and print the effective composition without
/// binding a listener.
pub fn run_config_check(config: &AppConfig) -> Result<()> {
    info!("Checking configuration...");

    crate::config::validate(config)?;
    info!("✓ Configuration is valid");

    info!("Application: {} ({:?})", config.name, config.environment);
    info!("Listen address: {}", config.bind_addr());
    info!(
        "Health endpoint: /{} (timeout {}ms)",
        config.health.path.trim_start_matches('/'),
        config.health.timeout_ms
    );
    info!(
        "Graceful shutdown timeout: {}ms",
        config.graceful_shutdown.timeout_ms
    );

    if config.cors.enabled {
        info!("CORS enabled for origins: {}", config.cors.allowed_origins.join(", "));
    } else {
        info!("CORS disabled");
    }

    if config.rate_limit.enabled {
        info!(
            "Rate limit: {} requests per {}s window",
            config.rate_limit.max_requests, config.rate_limit.window_secs
        );
    } else {
        info!("Rate limiting disabled");
    }

    info!("✓ All checks passed");
    Ok(())
}
