//! Application host: the composition root that owns configuration, the
//! plugin manager, the health registry and the HTTP listener.

pub mod health;

pub use health::{CheckOutcome, CheckStatus, HealthRegistry, HealthReport, OverallStatus};

use crate::config::{AppConfig, CorsConfig, HealthConfig};
use crate::container::Container;
use crate::error::{PluginError, Result, ServerError, ShutdownError};
use crate::http::AppRouter;
use crate::plugin::{Plugin, PluginManager, PluginOptions, PluginStatus};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub struct App {
    config: Arc<AppConfig>,
    manager: PluginManager,
    health: HealthRegistry,
    resources: Container,
    shutdown_tx: broadcast::Sender<()>,
    server_handle: Option<JoinHandle<()>>,
    bound_addr: Option<SocketAddr>,
    registration_error: Option<PluginError>,
    started: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            config: Arc::new(config),
            manager: PluginManager::new(),
            health: HealthRegistry::new(),
            resources: Container::new(),
            shutdown_tx,
            server_handle: None,
            bound_addr: None,
            registration_error: None,
            started: false,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn resources(&self) -> &Container {
        &self.resources
    }

    /// Register a plugin with default options. Chainable; a registration
    /// failure (duplicate name) is remembered and surfaced by `start()`,
    /// aborting composition.
    pub fn use_plugin(&mut self, plugin: Box<dyn Plugin>) -> &mut Self {
        self.use_plugin_with(plugin, PluginOptions::default())
    }

    pub fn use_plugin_with(&mut self, plugin: Box<dyn Plugin>, opts: PluginOptions) -> &mut Self {
        if self.registration_error.is_none() {
            if let Err(e) = self.manager.register(plugin, opts) {
                self.registration_error = Some(e);
            }
        }
        self
    }

    /// Register a named health check. Duplicate names overwrite.
    pub fn add_health_check<F, Fut>(&self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CheckOutcome>> + Send + 'static,
    {
        self.health.add(name, check);
    }

    /// Snapshot of the plugin registry, in registration order.
    pub fn plugins(&self) -> Vec<PluginStatus> {
        self.manager.list()
    }

    /// Address the listener is bound to, once started. With a configured
    /// port of 0 the OS assigns one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound_addr
    }

    /// Initialize all plugins, compose the request pipeline and bind the
    /// listener. A bind failure is fatal and propagates to the caller.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(ServerError::AlreadyStarted.into());
        }
        if let Some(e) = self.registration_error.take() {
            return Err(e.into());
        }

        tracing::info!(
            name = %self.config.name,
            environment = ?self.config.environment,
            plugins = self.manager.len(),
            "Starting application"
        );

        let mut router = AppRouter::new();
        self.manager
            .initialize_all(
                self.config.clone(),
                self.resources.clone(),
                self.health.clone(),
                &mut router,
            )
            .await?;

        router.add_routes(health_route(self.health.clone(), self.config.health.clone()));

        let filter = apply_cors(router.into_filter(), &self.config.cors);

        let addr: SocketAddr = self
            .config
            .bind_addr()
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.config.bind_addr()))?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (bound_addr, server) = warp::serve(filter)
            .try_bind_with_graceful_shutdown(addr, async move {
                let _ = shutdown_rx.recv().await;
            })
            .map_err(|e| ServerError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        self.server_handle = Some(tokio::spawn(server));
        self.bound_addr = Some(bound_addr);
        self.started = true;

        tracing::info!(addr = %bound_addr, "Listening");
        Ok(())
    }

    /// Tear down plugins, then drain the listener within the configured
    /// graceful-shutdown timeout. Exceeding it forces the listener closed
    /// and reports `ShutdownError::Timeout`.
    ///
    /// Calling `stop` before `start` is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.started {
            tracing::debug!("Stop requested before start; nothing to do");
            return Ok(());
        }
        self.started = false;

        tracing::info!(name = %self.config.name, "Shutting down application");
        self.manager.destroy_all().await;

        let _ = self.shutdown_tx.send(());

        if let Some(mut handle) = self.server_handle.take() {
            let timeout_ms = self.config.graceful_shutdown.timeout_ms;
            match tokio::time::timeout(self.config.shutdown_timeout(), &mut handle).await {
                Ok(_) => {
                    tracing::info!("Graceful shutdown completed");
                }
                Err(_) => {
                    tracing::error!(timeout_ms, "Shutdown timeout exceeded, forcing close");
                    handle.abort();
                    return Err(ShutdownError::Timeout { timeout_ms }.into());
                }
            }
        }

        Ok(())
    }
}

/// `GET /<health.path>` reporting the aggregate of all registered checks.
/// 200 when everything is healthy, 503 otherwise.
fn health_route(registry: HealthRegistry, config: HealthConfig) -> BoxedFilter<(Response,)> {
    let segment = config.path.trim_start_matches('/').to_string();
    let timeout = std::time::Duration::from_millis(config.timeout_ms);

    warp::path(segment)
        .and(warp::path::end())
        .and(warp::get())
        .and_then(move || {
            let registry = registry.clone();
            async move {
                let report = registry.run_all(timeout).await;
                let status = if report.is_up() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                Ok::<_, Rejection>(
                    warp::reply::with_status(warp::reply::json(&report), status).into_response(),
                )
            }
        })
        .boxed()
}

fn apply_cors(filter: BoxedFilter<(Response,)>, config: &CorsConfig) -> BoxedFilter<(Response,)> {
    if !config.enabled {
        return filter;
    }

    let mut cors = warp::cors()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_headers(vec!["content-type", "authorization"]);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_any_origin();
    } else {
        for origin in &config.allowed_origins {
            cors = cors.allow_origin(origin.as_str());
        }
    }

    filter
        .with(cors)
        .map(|reply| warp::reply::Reply::into_response(reply))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_health_route_up_and_down() {
        let registry = HealthRegistry::new();
        registry.add("cache", || async {
            Ok(CheckOutcome::healthy(Value::Null))
        });

        let route = health_route(registry.clone(), HealthConfig::default());
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&route)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["status"], "UP");

        registry.add("database", || async {
            Ok(CheckOutcome::unhealthy(json!({ "error": "down" })))
        });
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&route)
            .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["status"], "DOWN");
        assert_eq!(body["checks"]["cache"]["status"], "healthy");
        assert_eq!(body["checks"]["database"]["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_health_route_custom_path() {
        let registry = HealthRegistry::new();
        let route = health_route(
            registry,
            HealthConfig {
                path: "/status".to_string(),
                timeout_ms: 1000,
            },
        );

        let resp = warp::test::request()
            .method("GET")
            .path("/status")
            .reply(&route)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
