//! Built-in plugins composed by the default binary.

pub mod api_key;
pub mod metrics;
pub mod rate_limit;
pub mod request_log;
pub mod storage;

pub use api_key::ApiKeyPlugin;
pub use metrics::MetricsPlugin;
pub use rate_limit::RateLimitPlugin;
pub use request_log::RequestLogPlugin;
pub use storage::{Database, StoragePlugin};
