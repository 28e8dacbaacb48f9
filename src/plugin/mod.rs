//! Plugin contract and lifecycle management.
//!
//! A plugin is a self-contained unit of server capability. The manager
//! drives every registered plugin through `setup`, middleware
//! registration, route registration and teardown; plugins never invoke
//! their own lifecycle hooks.

pub mod manager;

pub use manager::{PluginManager, PluginState, PluginStatus};

use crate::config::AppConfig;
use crate::container::Container;
use crate::http::AppRouter;
use crate::server::health::HealthRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Everything a plugin may touch during `setup`.
///
/// The application config is read-only; shared resources are published
/// through the container and must not be mutated after setup completes.
pub struct PluginContext {
    pub app_config: Arc<AppConfig>,
    /// Per-plugin configuration supplied at registration, `Value::Null`
    /// when absent.
    pub config: Value,
    pub resources: Container,
    pub health: HealthRegistry,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name; registering two plugins with the same name is
    /// an error.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// One-time initialization. Runs sequentially in registration order,
    /// so later plugins may rely on resources earlier plugins published.
    async fn setup(&mut self, ctx: &PluginContext) -> anyhow::Result<()>;

    /// Append middleware to the request pipeline. Must only add handlers;
    /// no blocking or long-running I/O.
    async fn register_middleware(&self, _router: &mut AppRouter) {}

    /// Append routes to the application. Must only add handlers; no
    /// blocking or long-running I/O.
    async fn register_routes(&self, _router: &mut AppRouter) {}

    /// Release resources acquired in `setup`. Invoked in reverse
    /// registration order; errors are logged, never propagated.
    async fn destroy(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    /// Per-plugin configuration handed to `setup`.
    pub config: Option<Value>,
    /// When true, a `setup` failure aborts startup instead of being
    /// tolerated.
    pub required: bool,
}

impl PluginOptions {
    pub fn with_config(config: Value) -> Self {
        Self {
            config: Some(config),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
