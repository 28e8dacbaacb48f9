//! Embedded SQLite storage plugin.
//!
//! Opens the database during `setup`, publishes the handle through the
//! resource container and registers a `database` health check. Registered
//! non-required by the default binary, so a storage failure degrades the
//! health report instead of preventing startup.

use crate::plugin::{Plugin, PluginContext};
use crate::server::health::CheckOutcome;
use crate::validation::{validate, Field, Schema};
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Existence probe used by the health check.
    pub fn ping(&self) -> anyhow::Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Run a closure against the underlying connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> anyhow::Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        Ok(f(&conn)?)
    }
}

#[derive(Default)]
pub struct StoragePlugin {
    db: Option<Arc<Database>>,
}

impl StoragePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn config_schema() -> Schema {
        Schema::new()
            .field(Field::string("path").required().min_len(1))
            .deny_unknown()
    }
}

#[async_trait]
impl Plugin for StoragePlugin {
    fn name(&self) -> &str {
        "storage"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn setup(&mut self, ctx: &PluginContext) -> anyhow::Result<()> {
        if let Err(errors) = validate(&Self::config_schema(), &ctx.config) {
            anyhow::bail!(
                "invalid storage config: {}",
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let path = ctx.config["path"].as_str().unwrap_or(":memory:").to_string();
        let db = Database::open(&path)?;
        db.ping()?;
        tracing::info!(path = %path, "Database opened");

        ctx.resources.put(db);
        let db = ctx
            .resources
            .get::<Database>()
            .ok_or_else(|| anyhow::anyhow!("database missing from resource container"))?;
        self.db = Some(db.clone());

        ctx.health.add("database", move || {
            let db = db.clone();
            async move {
                db.ping()?;
                Ok(CheckOutcome::healthy(json!({ "path": db.path() })))
            }
        });

        Ok(())
    }

    async fn destroy(&mut self) -> anyhow::Result<()> {
        if let Some(db) = self.db.take() {
            tracing::info!(path = %db.path(), "Releasing database handle");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::container::Container;
    use crate::plugin::PluginContext;
    use crate::server::health::HealthRegistry;
    use tempfile::TempDir;

    fn context(config: serde_json::Value) -> PluginContext {
        PluginContext {
            app_config: Arc::new(AppConfig::default()),
            config,
            resources: Container::new(),
            health: HealthRegistry::new(),
        }
    }

    #[test]
    fn test_open_and_ping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.db");
        let db = Database::open(path.to_str().unwrap()).unwrap();
        db.ping().unwrap();
    }

    #[tokio::test]
    async fn test_setup_publishes_database_and_health_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.db");
        let ctx = context(json!({ "path": path.to_str().unwrap() }));

        let mut plugin = StoragePlugin::new();
        plugin.setup(&ctx).await.unwrap();

        assert!(ctx.resources.contains::<Database>());
        assert_eq!(ctx.health.len(), 1);

        let report = ctx
            .health
            .run_all(std::time::Duration::from_millis(500))
            .await;
        assert!(report.is_up());
        assert!(report.checks["database"].is_healthy());
    }

    #[tokio::test]
    async fn test_setup_fails_on_unopenable_path() {
        let ctx = context(json!({ "path": "/nonexistent-dir/sub/app.db" }));
        let mut plugin = StoragePlugin::new();
        assert!(plugin.setup(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_rejects_missing_path() {
        let ctx = context(serde_json::Value::Null);
        let mut plugin = StoragePlugin::new();
        assert!(plugin.setup(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_with_conn_runs_queries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.db");
        let ctx = context(json!({ "path": path.to_str().unwrap() }));

        let mut plugin = StoragePlugin::new();
        plugin.setup(&ctx).await.unwrap();

        let db = ctx.resources.get::<Database>().unwrap();
        let answer: i64 = db
            .with_conn(|conn| conn.query_row("SELECT 40 + 2", [], |row| row.get(0)))
            .unwrap();
        assert_eq!(answer, 42);
    }
}
