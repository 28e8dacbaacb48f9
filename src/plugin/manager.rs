//! Plugin registry and lifecycle driver.

use super::{Plugin, PluginContext, PluginOptions};
use crate::config::AppConfig;
use crate::container::Container;
use crate::error::PluginError;
use crate::http::AppRouter;
use crate::server::health::HealthRegistry;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Lifecycle state of a registered plugin. Transitions are strictly
/// monotonic and only the manager performs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginState {
    Registered,
    SetupComplete,
    MiddlewareRegistered,
    RoutesRegistered,
    Destroyed,
}

/// Read-only snapshot of one registry entry, for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStatus {
    pub name: String,
    pub version: String,
    pub state: PluginState,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct PluginEntry {
    plugin: Box<dyn Plugin>,
    config: Value,
    required: bool,
    state: PluginState,
    error: Option<String>,
}

/// Owns the registered plugins and drives their lifecycle phases.
#[derive(Default)]
pub struct PluginManager {
    entries: Vec<PluginEntry>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Fails if a plugin with the same name is already
    /// registered; the registry is left unchanged on failure.
    pub fn register(
        &mut self,
        plugin: Box<dyn Plugin>,
        opts: PluginOptions,
    ) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        if self.entries.iter().any(|e| e.plugin.name() == name) {
            return Err(PluginError::DuplicateName { name });
        }

        tracing::debug!(plugin = %name, version = %plugin.version(), "Plugin registered");
        self.entries.push(PluginEntry {
            plugin,
            config: opts.config.unwrap_or(Value::Null),
            required: opts.required,
            state: PluginState::Registered,
            error: None,
        });
        Ok(())
    }

    /// Drive all plugins through setup, middleware registration and route
    /// registration, in registration order.
    ///
    /// A failing `setup` is recorded against that plugin and iteration
    /// continues, so independent plugins still initialize; the failed
    /// plugin is skipped in the later phases. A plugin registered as
    /// required aborts startup instead.
    pub async fn initialize_all(
        &mut self,
        app_config: Arc<AppConfig>,
        resources: Container,
        health: HealthRegistry,
        router: &mut AppRouter,
    ) -> Result<(), PluginError> {
        for entry in self.entries.iter_mut() {
            let ctx = PluginContext {
                app_config: app_config.clone(),
                config: entry.config.clone(),
                resources: resources.clone(),
                health: health.clone(),
            };

            let name = entry.plugin.name().to_string();
            let version = entry.plugin.version().to_string();
            tracing::info!(plugin = %name, version = %version, "Setting up plugin");

            match entry.plugin.setup(&ctx).await {
                Ok(()) => {
                    entry.state = PluginState::SetupComplete;
                }
                Err(e) => {
                    let failure = PluginError::SetupFailed {
                        name: name.clone(),
                        version,
                        source: e.into(),
                    };
                    tracing::error!(plugin = %name, error = %failure, "Plugin setup failed");
                    entry.error = Some(failure.to_string());
                    if entry.required {
                        return Err(PluginError::RequiredPluginFailed { name });
                    }
                }
            }
        }

        // Middleware registered earlier runs earlier in the pipeline, so
        // this pass must preserve registration order.
        for entry in self.entries.iter_mut() {
            if entry.state != PluginState::SetupComplete {
                continue;
            }
            entry.plugin.register_middleware(router).await;
            entry.state = PluginState::MiddlewareRegistered;
        }

        for entry in self.entries.iter_mut() {
            if entry.state != PluginState::MiddlewareRegistered {
                continue;
            }
            entry.plugin.register_routes(router).await;
            entry.state = PluginState::RoutesRegistered;
        }

        tracing::info!(count = self.entries.len(), "Plugin initialization complete");
        Ok(())
    }

    /// Tear down plugins in reverse registration order. Teardown is
    /// best-effort: individual failures are logged and swallowed. Plugins
    /// whose setup never completed are skipped.
    pub async fn destroy_all(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            if matches!(entry.state, PluginState::Registered | PluginState::Destroyed) {
                continue;
            }
            let name = entry.plugin.name().to_string();
            tracing::info!(plugin = %name, "Destroying plugin");
            if let Err(e) = entry.plugin.destroy().await {
                tracing::warn!(plugin = %name, error = %e, "Plugin destroy failed");
            }
            entry.state = PluginState::Destroyed;
        }
    }

    /// Read-only snapshot of all entries, in registration order.
    pub fn list(&self) -> Vec<PluginStatus> {
        self.entries
            .iter()
            .map(|entry| PluginStatus {
                name: entry.plugin.name().to_string(),
                version: entry.plugin.version().to_string(),
                state: entry.state,
                enabled: entry.error.is_none(),
                error: entry.error.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
