//! OpenAPI -> operation catalog tooling.
//!
//! Used by `swagger-mcp-server` to turn one OpenAPI document into a flat, searchable list of
//! invocable operations:
//! - [`loader`] fetches/reads, verifies, parses and validates the document
//! - [`resolver`] expands every `$ref` (local, file and URL references)
//! - [`catalog`] flattens the resolved document into [`catalog::OperationDescriptor`]s
//! - [`search`] looks operations up by summary
//!
//! It intentionally contains **no** MCP protocol code and **no** outbound call execution.

pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod search;
