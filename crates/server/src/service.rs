//! The MCP tool surface: `list_operations`, `find_operations` and `call_api`.

use crate::error::ServerError;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData, ServerHandler, ServiceExt as _, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use swagger_mcp_http_tools::runtime::{ApiRequest, HttpInvoker};
use swagger_mcp_openapi_tools::catalog::Catalog;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListOperationsArgs {
    /// Return full operation descriptors instead of summaries only.
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindOperationsArgs {
    /// Case-insensitive text to look for in operation summaries.
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CallApiArgs {
    /// Absolute URL to call, typically an operation `url` from the catalog.
    pub url: String,
    /// HTTP method, e.g. GET or POST.
    pub method: String,
    /// Query string parameters. Arrays repeat the key.
    #[serde(default)]
    pub query_params: Option<Map<String, Value>>,
    /// JSON request body.
    #[serde(default)]
    pub body: Option<Map<String, Value>>,
    /// Extra request headers.
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
}

impl From<CallApiArgs> for ApiRequest {
    fn from(args: CallApiArgs) -> Self {
        Self {
            method: args.method,
            url: args.url,
            query_params: args.query_params,
            body: args.body.map(Value::Object),
            headers: args.headers,
        }
    }
}

#[derive(Clone)]
pub struct SwaggerMcpServer {
    catalog: Arc<Catalog>,
    invoker: HttpInvoker,
    api_title: Option<String>,
    tool_router: ToolRouter<Self>,
}

impl SwaggerMcpServer {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, invoker: HttpInvoker) -> Self {
        Self {
            catalog,
            invoker,
            api_title: None,
            tool_router: Self::tool_router(),
        }
    }

    /// Name the API in the server instructions.
    #[must_use]
    pub fn with_api_title(mut self, title: Option<&str>) -> Self {
        self.api_title = title.map(str::to_string);
        self
    }

    /// Serve MCP over stdin/stdout until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the MCP handshake or service loop fails.
    pub async fn serve_stdio(self) -> crate::error::Result<()> {
        info!(
            operations = self.catalog.len(),
            tools = self.tool_router.list_all().len(),
            "Serving MCP on stdio"
        );
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;
        let reason = service
            .waiting()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;
        info!(?reason, "MCP session ended");
        Ok(())
    }

    fn instructions(&self) -> String {
        let api = self
            .api_title
            .as_deref()
            .map_or_else(|| "the configured API".to_string(), |t| format!("'{t}'"));
        format!(
            "Tools for calling {api} ({} operations at {}). Use list_operations or \
             find_operations to discover an operation, then call_api with its url and method.",
            self.catalog.len(),
            if self.catalog.base_url().is_empty() {
                "a relative base URL"
            } else {
                self.catalog.base_url()
            }
        )
    }
}

#[tool_router]
impl SwaggerMcpServer {
    #[tool(
        description = "List the API's operations. By default returns only summaries as [{\"Function\": summary}]; set verbose=true for full descriptors (url, method, summary, operationId, parameters, requestBody)."
    )]
    async fn list_operations(
        &self,
        Parameters(args): Parameters<ListOperationsArgs>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        debug!(verbose = args.verbose, "list_operations");
        let payload =
            list_operations_payload(&self.catalog, args.verbose).map_err(|e| encode_error(&e))?;
        Ok(json_result(&payload))
    }

    #[tool(
        description = "Find the first operation whose summary contains the given text (case-insensitive). Returns the full descriptor, or null when nothing matches."
    )]
    async fn find_operations(
        &self,
        Parameters(args): Parameters<FindOperationsArgs>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let payload =
            find_operations_payload(&self.catalog, &args.summary).map_err(|e| encode_error(&e))?;
        debug!(query = %args.summary, matched = !payload.is_null(), "find_operations");
        Ok(json_result(&payload))
    }

    #[tool(
        description = "Call an HTTP endpoint and return its JSON response. Works for any absolute URL, not only catalog operations. Failures come back as an error result with a message."
    )]
    async fn call_api(
        &self,
        Parameters(args): Parameters<CallApiArgs>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let request = ApiRequest::from(args);
        match self.invoker.invoke(&request).await {
            Ok(value) => Ok(json_result(&value)),
            Err(e) => {
                warn!(method = %request.method, error = %e, "call_api failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for SwaggerMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }
}

/// `[{"Function": summary}]`, or the full descriptors when `verbose`.
///
/// # Errors
///
/// Returns the serializer error if a descriptor cannot be encoded.
pub fn list_operations_payload(
    catalog: &Catalog,
    verbose: bool,
) -> std::result::Result<Value, serde_json::Error> {
    if verbose {
        serde_json::to_value(catalog.operations())
    } else {
        serde_json::to_value(catalog.summaries())
    }
}

/// First descriptor whose summary matches, or `null`.
///
/// # Errors
///
/// Returns the serializer error if the matching descriptor cannot be encoded.
pub fn find_operations_payload(
    catalog: &Catalog,
    query: &str,
) -> std::result::Result<Value, serde_json::Error> {
    Ok(catalog
        .find_first(query)
        .map(serde_json::to_value)
        .transpose()?
        .unwrap_or(Value::Null))
}

fn encode_error(e: &serde_json::Error) -> ErrorData {
    ErrorData::internal_error(format!("failed to encode operations: {e}"), None)
}

fn json_result(value: &Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(value.to_string())])
}
