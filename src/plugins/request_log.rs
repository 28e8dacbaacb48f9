//! Request logging middleware plugin.

use crate::http::{AppRouter, Middleware, RequestInfo, Verdict};
use crate::plugin::{Plugin, PluginContext};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Default)]
pub struct RequestLogPlugin;

impl RequestLogPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for RequestLogPlugin {
    fn name(&self) -> &str {
        "request-log"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn setup(&mut self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn register_middleware(&self, router: &mut AppRouter) {
        router.add_middleware(Arc::new(RequestLogMiddleware));
    }
}

struct RequestLogMiddleware;

#[async_trait]
impl Middleware for RequestLogMiddleware {
    fn name(&self) -> &str {
        "request-log"
    }

    async fn handle(&self, req: &RequestInfo) -> Verdict {
        tracing::info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            remote = ?req.remote_addr,
            "Incoming request"
        );
        Verdict::Continue
    }
}
