//! Flattening a dereferenced `OpenAPI` document into an operation catalog.
//!
//! One [`OperationDescriptor`] is produced per `(path, method)` pair whose method is one of
//! GET/POST/PUT/DELETE/PATCH. Each descriptor carries a pre-composed absolute `url`:
//!
//! ```text
//! origin of the spec location + first servers[].url + operation path
//! ```
//!
//! joined with exactly one `/` between segments. When `servers[0].url` is itself an absolute
//! `http(s)` URL it replaces the origin entirely.
//!
//! Building is pure: no I/O, and the same document always yields the same catalog in document
//! order.

use crate::loader::SpecDocument;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Summary used when an operation declares none.
pub const NO_SUMMARY: &str = "No summary";

/// Methods exposed in the catalog; anything else (`trace`, `options`, extensions) is skipped.
const SUPPORTED_METHODS: [&str; 5] = ["get", "post", "put", "delete", "patch"];

/// One invocable operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub url: String,
    /// Uppercase HTTP method.
    pub method: String,
    pub summary: String,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    /// Parameter objects exactly as declared by the operation. Never `Some(vec![])`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Value>>,
    #[serde(
        rename = "requestBody",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_body: Option<RequestBodyInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBodyInfo {
    pub required: bool,
    /// Media type (e.g. `application/json`) -> schema of that media type.
    pub content: Map<String, Value>,
}

/// The flattened, immutable list of operations built from one spec.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    base_url: String,
    operations: Vec<OperationDescriptor>,
}

impl Catalog {
    /// Build a catalog from a dereferenced document and the location it was loaded from.
    #[must_use]
    pub fn build(document: &Value, source_location: &str) -> Self {
        Self::build_with_base_url(document, source_location, None)
    }

    /// Like [`Self::build`], but `base_url_override` (when set) replaces the document's
    /// `servers[0].url`.
    #[must_use]
    pub fn build_with_base_url(
        document: &Value,
        source_location: &str,
        base_url_override: Option<&str>,
    ) -> Self {
        let origin = origin_of(source_location);
        let server_base =
            base_url_override.map_or_else(|| first_server_url(document), str::to_string);
        let base_url = compose_base_url(&origin, &server_base);

        let mut operations = Vec::new();
        if let Some(paths) = document.get("paths").and_then(Value::as_object) {
            for (path, path_item) in paths {
                let Some(methods) = path_item.as_object() else {
                    continue;
                };
                for (method, details) in methods {
                    let method = method.to_ascii_lowercase();
                    if !SUPPORTED_METHODS.contains(&method.as_str()) {
                        continue;
                    }
                    let Some(details) = details.as_object() else {
                        continue;
                    };
                    operations.push(describe_operation(&base_url, path, &method, details));
                }
            }
        }

        Self {
            base_url,
            operations,
        }
    }

    /// Build from a loaded [`SpecDocument`].
    #[must_use]
    pub fn from_spec(spec: &SpecDocument, base_url_override: Option<&str>) -> Self {
        let catalog =
            Self::build_with_base_url(spec.document(), spec.location(), base_url_override);
        tracing::info!(
            operations = catalog.len(),
            base_url = %catalog.base_url(),
            "Built operation catalog"
        );
        catalog
    }

    /// Composed base URL (origin + server base), without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OperationDescriptor> {
        self.operations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a OperationDescriptor;
    type IntoIter = std::slice::Iter<'a, OperationDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn describe_operation(
    base_url: &str,
    path: &str,
    method: &str,
    details: &Map<String, Value>,
) -> OperationDescriptor {
    let summary = match details.get("summary") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => NO_SUMMARY.to_string(),
        Some(other) => other.to_string(),
    };
    let operation_id = details
        .get("operationId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let parameters = details
        .get("parameters")
        .and_then(Value::as_array)
        .filter(|params| !params.is_empty())
        .cloned();

    let request_body = details
        .get("requestBody")
        .and_then(Value::as_object)
        .filter(|body| !body.is_empty())
        .map(request_body_info);

    OperationDescriptor {
        url: join_url(base_url, path),
        method: method.to_ascii_uppercase(),
        summary,
        operation_id,
        parameters,
        request_body,
    }
}

fn request_body_info(body: &Map<String, Value>) -> RequestBodyInfo {
    let required = body
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let content = body
        .get("content")
        .and_then(Value::as_object)
        .map(|media_types| {
            media_types
                .iter()
                .map(|(media_type, media)| {
                    let schema = media
                        .get("schema")
                        .cloned()
                        .unwrap_or_else(|| Value::Object(Map::new()));
                    (media_type.clone(), schema)
                })
                .collect()
        })
        .unwrap_or_default();

    RequestBodyInfo { required, content }
}

/// `scheme://host[:port]` of an `http(s)` location; empty for file paths and anything else.
#[must_use]
pub fn origin_of(source_location: &str) -> String {
    match Url::parse(source_location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            url.origin().ascii_serialization()
        }
        _ => String::new(),
    }
}

/// `servers[0].url` with server variables substituted by their defaults; empty if absent.
fn first_server_url(document: &Value) -> String {
    let Some(server) = document
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
    else {
        return String::new();
    };

    let mut url = server
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(variables) = server.get("variables").and_then(Value::as_object) {
        for (name, var) in variables {
            if let Some(default) = var.get("default").and_then(Value::as_str) {
                url = url.replace(&format!("{{{name}}}"), default);
            }
        }
    }

    url
}

fn is_absolute_http_url(s: &str) -> bool {
    Url::parse(s).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

/// Combine the spec origin with the server base path.
#[must_use]
pub fn compose_base_url(origin: &str, server_base: &str) -> String {
    if is_absolute_http_url(server_base) {
        return server_base.trim_end_matches('/').to_string();
    }
    join_url(origin, server_base).trim_end_matches('/').to_string()
}

/// Join two URL segments with exactly one `/` between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
