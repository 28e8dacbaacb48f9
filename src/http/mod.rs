//! Request pipeline composition.
//!
//! warp has no Express-style mutable middleware stack, so the host models
//! one explicitly: plugins append `Middleware` implementations and boxed
//! route filters to an [`AppRouter`] during their registration phases, and
//! `into_filter` freezes the result into a single warp filter. Middleware
//! run strictly in registration order before route dispatch; a middleware
//! may short-circuit the request with a response of its own.

use async_trait::async_trait;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Request metadata visible to middleware.
///
/// Middleware only observe the request envelope; bodies are consumed by
/// route handlers.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
}

pub enum Verdict {
    /// Pass the request to the next middleware (or to route dispatch).
    Continue,
    /// Short-circuit with this response; later middleware and routes never
    /// see the request.
    Halt(Response),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, req: &RequestInfo) -> Verdict;
}

/// Marker rejection used by the middleware chain entry to fall through to
/// route dispatch.
#[derive(Debug)]
struct Forward;

impl warp::reject::Reject for Forward {}

#[derive(Default)]
pub struct AppRouter {
    middleware: Vec<Arc<dyn Middleware>>,
    routes: Option<BoxedFilter<(Response,)>>,
}

impl AppRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        tracing::debug!(middleware = %middleware.name(), "Middleware registered");
        self.middleware.push(middleware);
    }

    pub fn add_routes(&mut self, filter: BoxedFilter<(Response,)>) {
        self.routes = Some(match self.routes.take() {
            Some(existing) => existing.or(filter).unify().boxed(),
            None => filter,
        });
    }

    pub fn middleware_names(&self) -> Vec<String> {
        self.middleware
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Freeze the pipeline into a single filter: middleware chain first,
    /// then route dispatch, then structured rejection recovery.
    pub fn into_filter(self) -> BoxedFilter<(Response,)> {
        let middleware = Arc::new(self.middleware);

        let chain = warp::method()
            .and(warp::path::full())
            .and(warp::header::headers_cloned())
            .and(warp::addr::remote())
            .and_then(
                move |method: Method,
                      path: FullPath,
                      headers: HeaderMap,
                      remote_addr: Option<SocketAddr>| {
                    let middleware = middleware.clone();
                    async move {
                        let info = RequestInfo {
                            request_id: Uuid::new_v4().to_string(),
                            method,
                            path: path.as_str().to_string(),
                            headers,
                            remote_addr,
                        };
                        for mw in middleware.iter() {
                            if let Verdict::Halt(response) = mw.handle(&info).await {
                                tracing::debug!(
                                    middleware = %mw.name(),
                                    request_id = %info.request_id,
                                    path = %info.path,
                                    "Request halted by middleware"
                                );
                                return Ok(response);
                            }
                        }
                        Err::<Response, Rejection>(warp::reject::custom(Forward))
                    }
                },
            );

        let routes = self.routes.unwrap_or_else(|| {
            warp::any()
                .and_then(|| async { Err::<Response, Rejection>(warp::reject::not_found()) })
                .boxed()
        });

        chain
            .or(routes)
            .unify()
            .recover(handle_rejection)
            .map(|reply| warp::reply::Reply::into_response(reply))
            .boxed()
    }
}

async fn handle_rejection(err: Rejection) -> Result<Response, std::convert::Infallible> {
    let (status, message) = if err.is_not_found() || err.find::<Forward>().is_some() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "Invalid request body")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        tracing::error!(rejection = ?err, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(error_response(status, message))
}

/// Structured error body: `{success, message, statusCode}`.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({
        "success": false,
        "message": message,
        "statusCode": status.as_u16(),
    });
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

pub fn json_response<T: Serialize>(value: &T) -> Response {
    warp::reply::json(value).into_response()
}
