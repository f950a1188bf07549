//! MCP tool server over one `OpenAPI` document.
//!
//! Exposes three tools over stdio:
//! - `list_operations` lists the operation catalog
//! - `find_operations` looks an operation up by summary
//! - `call_api` performs an arbitrary HTTP request
//!
//! The catalog is built once at startup (see [`swagger_mcp_openapi_tools`]) and shared read-only;
//! outbound calls go through [`swagger_mcp_http_tools`].

pub mod config;
pub mod error;
pub mod service;

pub use config::{Args, LogFormat, ServerConfig};
pub use error::{Result, ServerError};
pub use service::SwaggerMcpServer;
