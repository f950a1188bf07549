//! Process configuration: CLI flags and environment, plus an optional YAML file.
//!
//! Precedence: CLI flag / environment variable > config file > built-in default.

use crate::error::{Result, ServerError};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use swagger_mcp_http_tools::config::InvokerConfig;
use swagger_mcp_openapi_tools::config::{HashPolicy, SpecSourceConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "swagger-mcp-server", version, about)]
pub struct Args {
    /// Path to a YAML config file.
    #[arg(long, env = "SWAGGER_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// `OpenAPI` document location (http(s) URL, file:// URL or path).
    #[arg(long, env = "OPEN_API_URL")]
    pub spec: Option<String>,

    /// Replaces the spec's first `servers[].url` when composing operation URLs.
    #[arg(long, env = "OPEN_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// On-disk config file (camelCase keys).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub spec: Option<String>,
    #[serde(default)]
    pub spec_hash: Option<String>,
    #[serde(default)]
    pub spec_hash_policy: HashPolicy,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub startup_timeout_secs: Option<u64>,
    #[serde(default)]
    pub http: InvokerConfig,
}

impl FileConfig {
    /// Read and parse a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        Self::parse(&raw).map_err(|e| match e {
            ServerError::Config(msg) => {
                ServerError::Config(format!("{msg} (in '{}')", path.display()))
            }
            other => other,
        })
    }

    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if `raw` is not a valid config document.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| ServerError::Config(format!("invalid config: {e}")))
    }
}

/// Fully resolved configuration the server starts with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub source: SpecSourceConfig,
    pub http: InvokerConfig,
}

impl ServerConfig {
    /// Merge the optional config file with CLI/env values.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the config file is invalid or no spec location is set.
    pub fn from_args(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if neither `args` nor `file` names a spec location.
    pub fn merge(args: &Args, file: FileConfig) -> Result<Self> {
        let spec = non_empty(args.spec.clone())
            .or_else(|| non_empty(file.spec))
            .ok_or_else(|| {
                ServerError::Config(
                    "missing OpenAPI spec location: set OPEN_API_URL, pass --spec, or set `spec` in the config file"
                        .to_string(),
                )
            })?;

        let source = SpecSourceConfig {
            spec,
            spec_hash: non_empty(file.spec_hash),
            spec_hash_policy: file.spec_hash_policy,
            base_url: non_empty(args.base_url.clone()).or_else(|| non_empty(file.base_url)),
            startup_timeout_secs: file.startup_timeout_secs,
        };

        Ok(Self {
            source,
            http: file.http,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
