//! Spec loading: fetch/read, hash verification, parsing, validation and `$ref` resolution.
//!
//! The output is a [`SpecDocument`]: a self-contained JSON value with every reference expanded,
//! ready for [`crate::catalog::Catalog::build`].

use crate::config::{HashPolicy, SpecSourceConfig};
use crate::error::{OpenApiToolsError, Result};
use crate::resolver::{DocId, OpenApiResolver, is_http_url};
use openapiv3::OpenAPI;
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A fully dereferenced `OpenAPI` document plus where it came from.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    location: String,
    title: Option<String>,
    document: Value,
}

impl SpecDocument {
    /// Wrap an already dereferenced document (no `$ref` expansion is performed).
    #[must_use]
    pub fn new(location: impl Into<String>, document: Value) -> Self {
        let title = document
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            location: location.into(),
            title,
            document,
        }
    }

    /// The URL or path the document was loaded from.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The `info.title` of the document, if present.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }
}

/// Loads one `OpenAPI` document according to a [`SpecSourceConfig`].
#[derive(Debug, Clone)]
pub struct SpecLoader {
    client: Client,
}

impl Default for SpecLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Load, verify, validate and fully dereference the configured spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be fetched or read, fails hash verification (with
    /// [`HashPolicy::Fail`]), is not a valid `OpenAPI` document, contains unresolvable references,
    /// or if the whole operation exceeds the startup timeout.
    pub async fn load(&self, config: &SpecSourceConfig) -> Result<SpecDocument> {
        if config.spec.trim().is_empty() {
            return Err(OpenApiToolsError::Config(
                "OpenAPI spec location is empty".to_string(),
            ));
        }

        let startup_timeout = config.startup_timeout();
        match tokio::time::timeout(startup_timeout, self.load_inner(config)).await {
            Ok(res) => res,
            Err(_) => Err(OpenApiToolsError::Startup(format!(
                "Timed out after {}s loading OpenAPI spec '{}'",
                startup_timeout.as_secs(),
                config.spec
            ))),
        }
    }

    async fn load_inner(&self, config: &SpecSourceConfig) -> Result<SpecDocument> {
        let content = self.read_spec(&config.spec).await?;
        verify_hash(config, &content)?;

        // Parse spec (JSON is a valid subset of YAML, so serde_yaml alone is enough)
        let raw: Value = serde_yaml::from_str(&content).map_err(|e| {
            OpenApiToolsError::OpenApiSpecParse {
                location: config.spec.clone(),
                source: e,
            }
        })?;

        validate_document(&config.spec, &raw)?;

        let root_doc = DocId::parse(&config.spec)?;
        let resolver = OpenApiResolver::new(root_doc, raw, &self.client);
        let document = resolver.resolve_document().await?;

        let spec = SpecDocument::new(config.spec.clone(), document);
        tracing::info!(
            location = %spec.location(),
            title = spec.title().unwrap_or("<untitled>"),
            "Loaded OpenAPI spec"
        );
        Ok(spec)
    }

    async fn read_spec(&self, location: &str) -> Result<String> {
        if is_http_url(location) {
            tracing::info!("Fetching OpenAPI spec from {location}");
            let resp = self
                .client
                .get(location)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| OpenApiToolsError::OpenApiSpecFetch {
                    url: location.to_string(),
                    message: e.to_string(),
                })?;

            resp.text()
                .await
                .map_err(|e| OpenApiToolsError::OpenApiSpecReadBody {
                    url: location.to_string(),
                    message: e.to_string(),
                })
        } else {
            tracing::info!("Loading OpenAPI spec from {location}");
            let path = match DocId::parse(location)? {
                DocId::File(path) => path,
                DocId::Url(url) => {
                    return Err(OpenApiToolsError::OpenApi(format!(
                        "Unsupported spec location: {url}"
                    )));
                }
            };
            std::fs::read_to_string(&path).map_err(|e| OpenApiToolsError::OpenApiSpecReadFile {
                path: location.to_string(),
                source: e,
            })
        }
    }
}

fn verify_hash(config: &SpecSourceConfig, content: &str) -> Result<()> {
    let Some(expected_hash) = &config.spec_hash else {
        return Ok(());
    };
    if config.spec_hash_policy == HashPolicy::Ignore {
        return Ok(());
    }

    let actual_hash = format!("sha256:{}", hex::encode(Sha256::digest(content)));
    if actual_hash.eq_ignore_ascii_case(expected_hash) {
        return Ok(());
    }

    match config.spec_hash_policy {
        HashPolicy::Fail => Err(OpenApiToolsError::SpecHashMismatch {
            location: config.spec.clone(),
            expected: expected_hash.clone(),
            actual: actual_hash,
        }),
        HashPolicy::Warn => {
            tracing::warn!(
                location = %config.spec,
                expected = %expected_hash,
                actual = %actual_hash,
                "Spec hash mismatch"
            );
            Ok(())
        }
        HashPolicy::Ignore => Ok(()),
    }
}

/// Structural validation of the raw (not yet dereferenced) document.
fn validate_document(location: &str, doc: &Value) -> Result<()> {
    let invalid = |message: String| OpenApiToolsError::OpenApiSpecInvalid {
        location: location.to_string(),
        message,
    };

    let Some(root) = doc.as_object() else {
        return Err(invalid("top-level value must be a mapping".to_string()));
    };

    let version = root
        .get("openapi")
        .or_else(|| root.get("swagger"))
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing 'openapi' (or 'swagger') version field".to_string()))?;

    if let Some(paths) = root.get("paths")
        && !paths.is_object()
    {
        return Err(invalid("'paths' must be a mapping".to_string()));
    }
    if let Some(servers) = root.get("servers")
        && !servers.is_array()
    {
        return Err(invalid("'servers' must be a sequence".to_string()));
    }

    // The typed model only covers 3.0.x; 3.1 and Swagger 2.0 get the structural checks above.
    if version.starts_with("3.0") {
        serde_json::from_value::<OpenAPI>(doc.clone())
            .map_err(|e| invalid(format!("not a valid OpenAPI {version} document: {e}")))?;
    }

    Ok(())
}
