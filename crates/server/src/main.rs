use anyhow::Context as _;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use swagger_mcp_http_tools::runtime::HttpInvoker;
use swagger_mcp_openapi_tools::catalog::Catalog;
use swagger_mcp_openapi_tools::loader::SpecLoader;
use swagger_mcp_server::{Args, LogFormat, ServerConfig, SwaggerMcpServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = ServerConfig::from_args(&args).context("invalid configuration")?;

    let spec = SpecLoader::new()
        .load(&config.source)
        .await
        .with_context(|| format!("failed to load OpenAPI spec from '{}'", config.source.spec))?;
    let catalog = Catalog::from_spec(&spec, config.source.base_url.as_deref());
    if catalog.is_empty() {
        info!(location = %spec.location(), "Spec declares no callable operations");
    }

    SwaggerMcpServer::new(Arc::new(catalog), HttpInvoker::new(config.http))
        .with_api_title(spec.title())
        .serve_stdio()
        .await
        .context("MCP server failed")?;

    Ok(())
}

/// Logs always go to stderr; stdout carries the MCP stream.
fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match args.log_format {
        LogFormat::Text => builder.with_ansi(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}
