use intela_http::client::ClientError;
use thiserror::Error;

/// Daemon error types
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Upstream client error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracing initialization failed: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),
}

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
