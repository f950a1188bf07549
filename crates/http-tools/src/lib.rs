//! Outbound HTTP execution for the `call_api` tool.
//!
//! [`runtime::HttpInvoker`] issues one request per call against an arbitrary absolute URL and
//! returns the decoded JSON body or a typed [`runtime::HttpToolsError`]. [`safety`] holds the
//! optional outbound policy (scheme check, host allowlist, private-network blocking, limits).
//!
//! It intentionally contains **no** MCP protocol code and knows nothing about the operation
//! catalog.

pub mod config;
pub mod runtime;
pub mod safety;
