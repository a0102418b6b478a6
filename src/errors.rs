//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Subprocess proxy transport or protocol failure.
    Proxy(String),
    /// Error reported by the proxied server for a single request.
    Remote {
        /// JSON-RPC error code from the response envelope.
        code: i64,
        /// Human-readable message from the response envelope.
        message: String,
    },
    /// `rwx` CLI invocation failure.
    Cli(String),
    /// Cloud API request failure.
    Api(String),
    /// Workflow parsing or validation failure.
    Workflow(String),
    /// MCP tool dispatch failure.
    Mcp(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Proxy(msg) => write!(f, "proxy: {msg}"),
            Self::Remote { code, message } => write!(f, "remote error {code}: {message}"),
            Self::Cli(msg) => write!(f, "cli: {msg}"),
            Self::Api(msg) => write!(f, "api: {msg}"),
            Self::Workflow(msg) => write!(f, "workflow: {msg}"),
            Self::Mcp(msg) => write!(f, "mcp: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Api(err.to_string())
    }
}
