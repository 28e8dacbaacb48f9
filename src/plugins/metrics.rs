//! Prometheus metrics plugin: request counters plus a text exposition
//! endpoint.

use crate::http::{error_response, AppRouter, Middleware, RequestInfo, Verdict};
use crate::plugin::{Plugin, PluginContext};
use async_trait::async_trait;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

pub struct HttpMetrics {
    registry: Registry,
    pub requests_total: IntCounter,
}

impl Default for HttpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total =
            IntCounter::new("plughost_requests_total", "Total number of HTTP requests")
                .expect("metric creation failed");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("metric registration failed");

        Self {
            registry,
            requests_total,
        }
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    fn render(&self) -> Response {
        let encoder = TextEncoder::new();
        let families = self.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Metrics unavailable");
        }

        match warp::http::Response::builder()
            .header("content-type", encoder.format_type())
            .body(warp::hyper::Body::from(buffer))
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build metrics response");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Metrics unavailable")
            }
        }
    }
}

/// Counts every request entering the pipeline and serves `GET /metrics`.
#[derive(Default)]
pub struct MetricsPlugin {
    metrics: Option<Arc<HttpMetrics>>,
}

impl MetricsPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for MetricsPlugin {
    fn name(&self) -> &str {
        "metrics"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn setup(&mut self, ctx: &PluginContext) -> anyhow::Result<()> {
        // Other plugins and route handlers record through the container.
        ctx.resources.put(HttpMetrics::new());
        let metrics = ctx
            .resources
            .get::<HttpMetrics>()
            .ok_or_else(|| anyhow::anyhow!("metrics missing from resource container"))?;
        self.metrics = Some(metrics);
        Ok(())
    }

    async fn register_middleware(&self, router: &mut AppRouter) {
        if let Some(metrics) = &self.metrics {
            router.add_middleware(Arc::new(CountingMiddleware {
                metrics: metrics.clone(),
            }));
        }
    }

    async fn register_routes(&self, router: &mut AppRouter) {
        let Some(metrics) = self.metrics.clone() else {
            return;
        };
        let route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let metrics = metrics.clone();
                async move { Ok::<_, Rejection>(metrics.render()) }
            })
            .boxed();
        router.add_routes(route);
    }
}

struct CountingMiddleware {
    metrics: Arc<HttpMetrics>,
}

#[async_trait]
impl Middleware for CountingMiddleware {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn handle(&self, _req: &RequestInfo) -> Verdict {
        self.metrics.requests_total.inc();
        Verdict::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::container::Container;
    use crate::server::health::HealthRegistry;

    fn context() -> PluginContext {
        PluginContext {
            app_config: Arc::new(AppConfig::default()),
            config: serde_json::Value::Null,
            resources: Container::new(),
            health: HealthRegistry::new(),
        }
    }

    #[test]
    fn test_counter_increments() {
        let metrics = HttpMetrics::new();
        metrics.requests_total.inc();
        metrics.requests_total.inc();
        assert_eq!(metrics.requests_total.get(), 2);
    }

    #[tokio::test]
    async fn test_setup_publishes_metrics_handle() {
        let ctx = context();
        let mut plugin = MetricsPlugin::new();
        plugin.setup(&ctx).await.unwrap();

        assert!(ctx.resources.contains::<HttpMetrics>());
    }

    #[tokio::test]
    async fn test_metrics_route_serves_exposition_format() {
        let ctx = context();
        let mut plugin = MetricsPlugin::new();
        plugin.setup(&ctx).await.unwrap();

        let mut router = AppRouter::new();
        plugin.register_middleware(&mut router).await;
        plugin.register_routes(&mut router).await;
        let filter = router.into_filter();

        // One request through the chain, then scrape.
        warp::test::request().path("/metrics").reply(&filter).await;
        let resp = warp::test::request().path("/metrics").reply(&filter).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = String::from_utf8(resp.body().to_vec()).unwrap();
        assert!(body.contains("plughost_requests_total"));
    }
}
