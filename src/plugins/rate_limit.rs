//! Fixed-window per-client rate limiting.

use crate::http::{error_response, AppRouter, Middleware, RequestInfo, Verdict};
use crate::plugin::{Plugin, PluginContext};
use crate::validation::{validate, Field, Schema};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use warp::http::StatusCode;

pub struct RateLimiter {
    // client key -> (request count, window start)
    windows: DashMap<String, (u32, Instant)>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Count a request against `key` and report whether it is allowed.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) > self.window {
            *count = 1;
            *window_start = now;
            true
        } else {
            *count += 1;
            *count <= self.max_requests
        }
    }
}

/// Plugin wiring a [`RateLimiter`] into the middleware chain. Limits come
/// from the per-plugin config (`maxRequests`, `windowSecs`), falling back
/// to the application's `rateLimit` section.
#[derive(Default)]
pub struct RateLimitPlugin {
    limiter: Option<Arc<RateLimiter>>,
}

impl RateLimitPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn config_schema() -> Schema {
        Schema::new()
            .field(Field::integer("maxRequests").min(1))
            .field(Field::integer("windowSecs").min(1))
            .deny_unknown()
    }
}

#[async_trait]
impl Plugin for RateLimitPlugin {
    fn name(&self) -> &str {
        "rate-limit"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn setup(&mut self, ctx: &PluginContext) -> anyhow::Result<()> {
        if let Err(errors) = validate(&Self::config_schema(), &ctx.config) {
            anyhow::bail!(
                "invalid rate-limit config: {}",
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let defaults = &ctx.app_config.rate_limit;
        let max_requests = ctx.config["maxRequests"]
            .as_i64()
            .map(|n| n as u32)
            .unwrap_or(defaults.max_requests);
        let window_secs = ctx.config["windowSecs"]
            .as_i64()
            .map(|n| n as u64)
            .unwrap_or(defaults.window_secs);

        tracing::info!(max_requests, window_secs, "Rate limiter configured");
        self.limiter = Some(Arc::new(RateLimiter::new(
            max_requests,
            Duration::from_secs(window_secs),
        )));
        Ok(())
    }

    async fn register_middleware(&self, router: &mut AppRouter) {
        if let Some(limiter) = &self.limiter {
            router.add_middleware(Arc::new(RateLimitMiddleware {
                limiter: limiter.clone(),
            }));
        }
    }
}

struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &str {
        "rate-limit"
    }

    async fn handle(&self, req: &RequestInfo) -> Verdict {
        let key = req
            .remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if self.limiter.check(&key) {
            Verdict::Continue
        } else {
            tracing::warn!(client = %key, path = %req.path, "Rate limit exceeded");
            Verdict::Halt(error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
            ))
        }
    }
}
