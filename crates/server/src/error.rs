//! Error types for the MCP server.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors (missing spec location, unreadable or invalid config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// MCP transport failures (handshake, service loop)
    #[error("MCP transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
