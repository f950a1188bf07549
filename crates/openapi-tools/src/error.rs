//! Error types for `swagger-mcp-openapi-tools`.

use thiserror::Error;

/// Main error type for `OpenAPI` tooling.
///
/// Every variant surfaced by [`crate::loader::SpecLoader::load`] is fatal at startup: the server
/// never serves tools without a fully built catalog.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (missing spec location, invalid hash format).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (spec loading timed out).
    #[error("Startup error: {0}")]
    Startup(String),

    /// `OpenAPI` errors (bad locations, unresolved references).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    OpenApiSpecFetch { url: String, message: String },

    #[error("OpenAPI error: failed to read spec body from '{url}': {message}")]
    OpenApiSpecReadBody { url: String, message: String },

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    OpenApiSpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {source}")]
    OpenApiSpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("OpenAPI error: invalid OpenAPI spec '{location}': {message}")]
    OpenApiSpecInvalid { location: String, message: String },

    #[error("OpenAPI error: spec hash mismatch for '{location}' (expected {expected}, got {actual})")]
    SpecHashMismatch {
        location: String,
        expected: String,
        actual: String,
    },
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
