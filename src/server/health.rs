//! Named health checks and their aggregation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub details: Value,
}

impl CheckOutcome {
    pub fn healthy(details: Value) -> Self {
        Self {
            status: CheckStatus::Healthy,
            details,
        }
    }

    pub fn unhealthy(details: Value) -> Self {
        Self {
            status: CheckStatus::Unhealthy,
            details,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == CheckStatus::Healthy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

/// Aggregate of one health sweep: `DOWN` iff any check is unhealthy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: OverallStatus,
    pub checks: BTreeMap<String, CheckOutcome>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_up(&self) -> bool {
        self.status == OverallStatus::Up
    }
}

type HealthFuture = Pin<Box<dyn Future<Output = anyhow::Result<CheckOutcome>> + Send>>;
type CheckFn = Arc<dyn Fn() -> HealthFuture + Send + Sync>;

/// Registry of named async health predicates. Clone-able handle; plugins
/// and the host share one instance. Adding a check under an existing name
/// overwrites it.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Arc<DashMap<String, CheckFn>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F, Fut>(&self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CheckOutcome>> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(check = %name, "Health check registered");
        self.checks
            .insert(name, Arc::new(move || Box::pin(check()) as HealthFuture));
    }

    pub fn remove(&self, name: &str) {
        self.checks.remove(name);
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check concurrently with a per-check timeout. A check
    /// that errors or times out is reported unhealthy for that check
    /// only; failures never propagate.
    pub async fn run_all(&self, per_check_timeout: Duration) -> HealthReport {
        let checks: Vec<(String, CheckFn)> = self
            .checks
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let results = join_all(checks.into_iter().map(|(name, check)| async move {
            let outcome = match timeout(per_check_timeout, check()).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    tracing::warn!(check = %name, error = %e, "Health check failed");
                    CheckOutcome::unhealthy(serde_json::json!({ "error": e.to_string() }))
                }
                Err(_) => {
                    tracing::warn!(check = %name, "Health check timed out");
                    CheckOutcome::unhealthy(serde_json::json!({
                        "error": format!("timed out after {}ms", per_check_timeout.as_millis())
                    }))
                }
            };
            (name, outcome)
        }))
        .await;

        let checks: BTreeMap<String, CheckOutcome> = results.into_iter().collect();
        let status = if checks.values().all(CheckOutcome::is_healthy) {
            OverallStatus::Up
        } else {
            OverallStatus::Down
        };

        HealthReport {
            status,
            checks,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
