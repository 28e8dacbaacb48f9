use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Shutdown error: {0}")]
    Shutdown(#[from] ShutdownError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Environment variable error: {0}")]
    EnvVar(String),
}

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin already registered: {name}")]
    DuplicateName { name: String },

    #[error("Plugin setup failed: {name}@{version}: {source}")]
    SetupFailed {
        name: String,
        version: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Required plugin failed during startup: {name}")]
    RequiredPluginFailed { name: String },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind listener on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Server already started")]
    AlreadyStarted,
}

#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("Graceful shutdown exceeded {timeout_ms}ms, forcing close")]
    Timeout { timeout_ms: u64 },
}

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Health check timed out")]
    Timeout,

    #[error("Health check failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl warp::reject::Reject for AppError {}
