//! Generic request executor behind the `call_api` tool.
//!
//! The caller supplies method, absolute URL and optional query/body/headers; nothing here is
//! checked against the operation catalog.

use crate::config::{InvokerConfig, RedirectPolicy};
use crate::safety::{OutboundHttpSafety, redact_url, sanitize_reqwest_error};
use reqwest::header::{
    AUTHORIZATION, COOKIE, HeaderMap, HeaderName, HeaderValue, LOCATION, PROXY_AUTHORIZATION,
};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Error bodies longer than this are truncated in the error message.
const MAX_ERROR_BODY_CHARS: usize = 2048;

#[derive(Debug, Error)]
pub enum HttpToolsError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("outbound HTTP blocked: {0}")]
    Blocked(String),
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("API returned {status} {reason} for {url}: {body}")]
    Status {
        status: u16,
        reason: String,
        url: String,
        body: String,
    },
    #[error("failed to decode JSON response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("response too large: {0}")]
    TooLarge(String),
}

pub type Result<T> = std::result::Result<T, HttpToolsError>;

impl From<reqwest::Error> for HttpToolsError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(sanitize_reqwest_error(&value))
    }
}

/// One outbound call as requested by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<Map<String, Value>>,
    /// JSON-encoded as the request body when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Executes [`ApiRequest`]s.
///
/// Holds only immutable policy; every call builds and drops its own [`reqwest::Client`], so
/// concurrent calls share no connection state.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    config: InvokerConfig,
    safety: OutboundHttpSafety,
}

impl Default for HttpInvoker {
    fn default() -> Self {
        Self::new(InvokerConfig::default())
    }
}

impl HttpInvoker {
    #[must_use]
    pub fn new(config: InvokerConfig) -> Self {
        let safety = OutboundHttpSafety::from_config(&config);
        Self { config, safety }
    }

    /// Issue the request and decode the response body as JSON.
    ///
    /// An empty success body decodes to `null`. With [`RedirectPolicy::Checked`], redirects are
    /// followed here and every hop passes the full outbound check, including DNS resolution when
    /// private networks are disallowed.
    ///
    /// # Errors
    ///
    /// - [`HttpToolsError::InvalidRequest`] for a bad method, URL or header
    /// - [`HttpToolsError::Blocked`] when the outbound policy rejects the URL or a redirect hop
    /// - [`HttpToolsError::Transport`] for connection failures and timeouts
    /// - [`HttpToolsError::Status`] for 4xx/5xx responses
    /// - [`HttpToolsError::TooLarge`] when the body exceeds the configured limit
    /// - [`HttpToolsError::Decode`] when the body is not JSON
    pub async fn invoke(&self, request: &ApiRequest) -> Result<Value> {
        let mut method = parse_method(&request.method)?;
        let mut url = build_url(&request.url, request.query_params.as_ref())?;
        let mut headers = build_headers(request.headers.as_ref())?;
        let mut body = request.body.as_ref();

        self.safety.check_url(&url).await?;
        let client = self.client()?;

        let mut hops = 0;
        let response = loop {
            debug!(method = %method, url = %redact_url(&url), "Calling API");

            let mut builder = client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(body) = body {
                builder = builder.json(body);
            }
            let response = builder.send().await?;

            let Some(next) = redirect_location(
                self.safety.redirects,
                &url,
                response.status(),
                response.headers(),
            )?
            else {
                break response;
            };

            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(HttpToolsError::Blocked(format!(
                    "more than {MAX_REDIRECTS} redirects"
                )));
            }
            self.safety.check_url(&next).await?;

            if redirect_switches_to_get(response.status(), &method) {
                method = Method::GET;
                body = None;
            }
            if url.origin() != next.origin() {
                for name in [AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION] {
                    headers.remove(name);
                }
            }
            debug!(
                from = %redact_url(&url),
                to = %redact_url(&next),
                status = response.status().as_u16(),
                "Following redirect"
            );
            url = next;
        };

        let display_url = redact_url(&url);
        let status = response.status();
        let bytes = read_response_body_limited(response, self.safety.max_response_bytes).await?;

        debug!(
            method = %method,
            url = %display_url,
            status = status.as_u16(),
            bytes = bytes.len(),
            "API responded"
        );

        if status.is_client_error() || status.is_server_error() {
            return Err(status_error(status, display_url, &bytes));
        }

        decode_body(&bytes, &display_url)
    }

    fn client(&self) -> Result<Client> {
        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = self.config.timeout() {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(HttpToolsError::from)
    }
}

/// The next hop for a redirect response, or `None` when the response is final.
fn redirect_location(
    policy: RedirectPolicy,
    current: &Url,
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<Option<Url>> {
    if policy == RedirectPolicy::None
        || !matches!(
            status,
            StatusCode::MOVED_PERMANENTLY
                | StatusCode::FOUND
                | StatusCode::SEE_OTHER
                | StatusCode::TEMPORARY_REDIRECT
                | StatusCode::PERMANENT_REDIRECT
        )
    {
        return Ok(None);
    }

    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };
    let location = location.to_str().map_err(|e| {
        HttpToolsError::Transport(format!("invalid redirect location header: {e}"))
    })?;
    current.join(location).map(Some).map_err(|e| {
        HttpToolsError::Transport(format!("invalid redirect location '{location}': {e}"))
    })
}

/// 301/302/303 turn anything but GET/HEAD into a body-less GET; 307/308 keep the request.
fn redirect_switches_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => *method != Method::HEAD && *method != Method::GET,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::POST,
        _ => false,
    }
}

fn parse_method(raw: &str) -> Result<Method> {
    let normalized = raw.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(HttpToolsError::InvalidRequest(
            "HTTP method must not be empty".to_string(),
        ));
    }
    Method::from_bytes(normalized.as_bytes())
        .map_err(|e| HttpToolsError::InvalidRequest(format!("Invalid HTTP method '{raw}': {e}")))
}

fn build_url(raw: &str, query_params: Option<&Map<String, Value>>) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| HttpToolsError::InvalidRequest(format!("Invalid URL '{raw}': {e}")))?;

    let pairs = query_pairs(query_params);
    if !pairs.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(url)
}

/// Flatten a JSON mapping into query pairs: arrays repeat the key, nulls are skipped, objects
/// are JSON-encoded.
fn query_pairs(query_params: Option<&Map<String, Value>>) -> Vec<(String, String)> {
    let Some(params) = query_params else {
        return Vec::new();
    };

    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push((key.clone(), value_to_string(item)));
                }
            }
            other => pairs.push((key.clone(), value_to_string(other))),
        }
    }
    pairs
}

fn build_headers(headers: Option<&Map<String, Value>>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    let Some(headers) = headers else {
        return Ok(map);
    };

    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            HttpToolsError::InvalidRequest(format!("Invalid header name '{key}': {e}"))
        })?;
        let value = HeaderValue::from_str(&value_to_string(value)).map_err(|e| {
            HttpToolsError::InvalidRequest(format!("Invalid value for header '{key}': {e}"))
        })?;
        map.append(name, value);
    }

    Ok(map)
}

async fn read_response_body_limited(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> Result<Vec<u8>> {
    let Some(max) = max_bytes else {
        let bytes = response.bytes().await.map_err(HttpToolsError::from)?;
        return Ok(bytes.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(HttpToolsError::TooLarge(format!(
            "{len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(HttpToolsError::from)? {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(HttpToolsError::TooLarge(format!("exceeded {max} bytes")));
        }
        out.extend_from_slice(&chunk);
    }

    Ok(out)
}

fn status_error(status: StatusCode, url: String, bytes: &[u8]) -> HttpToolsError {
    let text = String::from_utf8_lossy(bytes);
    let mut body: String = text.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    if text.trim().chars().count() > MAX_ERROR_BODY_CHARS {
        body.push_str("...");
    }

    HttpToolsError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        url,
        body,
    }
}

fn decode_body(bytes: &[u8], url: &str) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| HttpToolsError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
