//! Bearer-token authentication middleware.

use crate::http::{error_response, AppRouter, Middleware, RequestInfo, Verdict};
use crate::plugin::{Plugin, PluginContext};
use crate::validation::{validate, Field, Schema};
use async_trait::async_trait;
use std::sync::Arc;
use warp::http::StatusCode;

/// Requires `Authorization: Bearer <key>` on every request except the
/// configured exempt path prefixes. The health endpoint is always exempt
/// so probes keep working without credentials.
#[derive(Default)]
pub struct ApiKeyPlugin {
    middleware: Option<Arc<ApiKeyMiddleware>>,
}

impl ApiKeyPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn config_schema() -> Schema {
        Schema::new()
            .field(Field::string("key").required().min_len(1))
            .field(Field::string_array("exempt"))
            .deny_unknown()
    }
}

#[async_trait]
impl Plugin for ApiKeyPlugin {
    fn name(&self) -> &str {
        "api-key"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn setup(&mut self, ctx: &PluginContext) -> anyhow::Result<()> {
        if let Err(errors) = validate(&Self::config_schema(), &ctx.config) {
            anyhow::bail!(
                "invalid api-key config: {}",
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let key = ctx.config["key"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_default();

        let mut exempt: Vec<String> = ctx.config["exempt"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let health_path = format!(
            "/{}",
            ctx.app_config.health.path.trim_start_matches('/')
        );
        if !exempt.contains(&health_path) {
            exempt.push(health_path);
        }

        tracing::info!(exempt = ?exempt, "API key authentication enabled");
        self.middleware = Some(Arc::new(ApiKeyMiddleware { key, exempt }));
        Ok(())
    }

    async fn register_middleware(&self, router: &mut AppRouter) {
        if let Some(middleware) = &self.middleware {
            router.add_middleware(middleware.clone());
        }
    }
}

struct ApiKeyMiddleware {
    key: String,
    exempt: Vec<String>,
}

#[async_trait]
impl Middleware for ApiKeyMiddleware {
    fn name(&self) -> &str {
        "api-key"
    }

    async fn handle(&self, req: &RequestInfo) -> Verdict {
        if self.exempt.iter().any(|prefix| req.path.starts_with(prefix)) {
            return Verdict::Continue;
        }

        let expected = format!("Bearer {}", self.key);
        let authorized = req
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(|value| value == expected)
            .unwrap_or(false);

        if authorized {
            Verdict::Continue
        } else {
            tracing::warn!(path = %req.path, "Rejected request without valid API key");
            Verdict::Halt(error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::{HeaderMap, HeaderValue, Method};

    fn request(path: &str, auth: Option<&str>) -> RequestInfo {
        let mut headers = HeaderMap::new();
        if let Some(value) = auth {
            headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        }
        RequestInfo {
            request_id: "test".to_string(),
            method: Method::GET,
            path: path.to_string(),
            headers,
            remote_addr: None,
        }
    }

    fn middleware() -> ApiKeyMiddleware {
        ApiKeyMiddleware {
            key: "sekrit".to_string(),
            exempt: vec!["/health".to_string()],
        }
    }

    #[tokio::test]
    async fn test_valid_key_passes() {
        let verdict = middleware()
            .handle(&request("/api/v1/things", Some("Bearer sekrit")))
            .await;
        assert!(matches!(verdict, Verdict::Continue));
    }

    #[tokio::test]
    async fn test_missing_key_halts_401() {
        match middleware().handle(&request("/api/v1/things", None)).await {
            Verdict::Halt(response) => assert_eq!(response.status(), StatusCode::UNAUTHORIZED),
            Verdict::Continue => panic!("expected halt"),
        }
    }

    #[tokio::test]
    async fn test_wrong_key_halts_401() {
        match middleware()
            .handle(&request("/api/v1/things", Some("Bearer nope")))
            .await
        {
            Verdict::Halt(response) => assert_eq!(response.status(), StatusCode::UNAUTHORIZED),
            Verdict::Continue => panic!("expected halt"),
        }
    }

    #[tokio::test]
    async fn test_exempt_path_passes_without_key() {
        let verdict = middleware().handle(&request("/health", None)).await;
        assert!(matches!(verdict, Verdict::Continue));
    }

    #[tokio::test]
    async fn test_setup_requires_key() {
        let ctx = PluginContext {
            app_config: Arc::new(crate::config::AppConfig::default()),
            config: serde_json::json!({}),
            resources: crate::container::Container::new(),
            health: crate::server::health::HealthRegistry::new(),
        };

        let mut plugin = ApiKeyPlugin::new();
        assert!(plugin.setup(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_always_exempts_health_path() {
        let ctx = PluginContext {
            app_config: Arc::new(crate::config::AppConfig::default()),
            config: serde_json::json!({ "key": "sekrit" }),
            resources: crate::container::Container::new(),
            health: crate::server::health::HealthRegistry::new(),
        };

        let mut plugin = ApiKeyPlugin::new();
        plugin.setup(&ctx).await.unwrap();

        let verdict = plugin
            .middleware
            .as_ref()
            .unwrap()
            .handle(&request("/health", None))
            .await;
        assert!(matches!(verdict, Verdict::Continue));
    }
}
