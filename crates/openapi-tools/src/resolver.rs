//! `OpenAPI` `$ref` resolver.
//!
//! The catalog builder works on a fully dereferenced document, so every `$ref` object is replaced
//! by the value it points at before the catalog is built.
//!
//! This resolver supports:
//! - Local refs (`#/...`)
//! - File refs (`./common.yaml#/...`, `/abs/path/spec.yaml#/...`, `file:///...#/...`)
//! - URL refs (`https://example.com/common.yaml#/...`)
//!
//! Key detail: `$ref` resolution is **relative to the document that contains the `$ref`**.
//! Nested references are tracked with their own `DocId` while expanding.
//!
//! Resolution runs in two passes. The first loads every reachable reference target once and
//! finds the targets that sit on a cycle (recursive schemas). The second inlines targets. A
//! cyclic target is inlined once where it is used, and refs to cyclic targets inside that copy
//! are kept as `$ref` objects.

use crate::error::{OpenApiToolsError, Result};
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocId {
    Url(Url),
    File(PathBuf),
}

impl DocId {
    /// Parse a root spec location into a document identifier (URL or file path).
    ///
    /// # Errors
    ///
    /// Returns an error if the location is an invalid URL or invalid file URL.
    pub fn parse(spec_location: &str) -> Result<Self> {
        if is_http_url(spec_location) {
            let url = Url::parse(spec_location).map_err(|e| {
                OpenApiToolsError::OpenApi(format!(
                    "Invalid OpenAPI spec URL '{spec_location}': {e}",
                ))
            })?;
            Ok(DocId::Url(strip_fragment(url)))
        } else if spec_location.starts_with("file://") {
            let url = Url::parse(spec_location).map_err(|e| {
                OpenApiToolsError::OpenApi(format!(
                    "Invalid OpenAPI spec file URL '{spec_location}': {e}",
                ))
            })?;
            let path = url.to_file_path().map_err(|()| {
                OpenApiToolsError::OpenApi(format!(
                    "Invalid file URL (cannot convert to path): {spec_location}",
                ))
            })?;
            Ok(DocId::File(canonicalize_best_effort(path)))
        } else {
            Ok(DocId::File(canonicalize_best_effort(PathBuf::from(
                spec_location,
            ))))
        }
    }

    #[must_use]
    pub fn display(&self) -> String {
        match self {
            DocId::Url(u) => u.to_string(),
            DocId::File(p) => p.display().to_string(),
        }
    }
}

pub(crate) fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

fn canonicalize_best_effort(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

#[derive(Debug)]
pub struct OpenApiResolver<'a> {
    root_doc: DocId,
    client: &'a Client,
    docs: RwLock<HashMap<DocId, Arc<Value>>>,
}

/// One distinct `$ref` target, keyed by its canonical ref key.
#[derive(Debug)]
struct RefNode {
    /// The reference as first written, relative to the document that contained it.
    reference: String,
    /// Document the target value lives in; nested refs resolve against it.
    doc: DocId,
    value: Value,
    edges: Vec<usize>,
    /// True if the target can reach itself through other refs.
    cyclic: bool,
}

/// Every `$ref` reachable from the root document, with its target loaded.
#[derive(Debug, Default)]
struct RefGraph {
    index: HashMap<String, usize>,
    nodes: Vec<RefNode>,
}

impl RefGraph {
    fn node_for(&mut self, key: String, source: &DocId, reference: &str) -> usize {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(RefNode {
            reference: reference.to_string(),
            doc: source.clone(),
            value: Value::Null,
            edges: Vec::new(),
            cyclic: false,
        });
        self.index.insert(key, id);
        id
    }

    /// Tarjan's strongly connected components, iteratively; flags every node on a cycle.
    fn mark_cycles(&mut self) {
        const UNVISITED: usize = usize::MAX;

        let n = self.nodes.len();
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut next_index = 0;

        for start in 0..n {
            if index[start] != UNVISITED {
                continue;
            }

            index[start] = next_index;
            low[start] = next_index;
            next_index += 1;
            stack.push(start);
            on_stack[start] = true;

            // (node, position of the next edge to visit)
            let mut work = vec![(start, 0usize)];
            while let Some(frame) = work.last_mut() {
                let (v, pos) = *frame;
                if let Some(&w) = self.nodes[v].edges.get(pos) {
                    frame.1 += 1;
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        low[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        work.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                    continue;
                }

                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] != index[v] {
                    continue;
                }

                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                if component.len() > 1 || self.nodes[v].edges.contains(&v) {
                    for w in component {
                        self.nodes[w].cyclic = true;
                    }
                }
            }
        }
    }
}

/// Second pass: inline targets from a fully loaded [`RefGraph`].
///
/// A cyclic target is inlined where it is first reached; inside that copy, refs to cyclic
/// targets stay as `$ref` objects. Each `(target, inside_cycle)` pair is expanded once.
struct Expander<'g> {
    graph: &'g RefGraph,
    cache: HashMap<(usize, bool), Value>,
}

impl Expander<'_> {
    fn expand(&mut self, doc: &DocId, value: &Value, inside_cycle: bool) -> Result<Value> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.expand_reference(doc, reference, map, inside_cycle);
                }

                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    out.insert(key.clone(), self.expand(doc, child, inside_cycle)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(doc, item, inside_cycle))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn expand_reference(
        &mut self,
        doc: &DocId,
        reference: &str,
        original: &Map<String, Value>,
        inside_cycle: bool,
    ) -> Result<Value> {
        let graph = self.graph;
        let key = OpenApiResolver::canonical_ref_key(doc, reference)?;
        let id = *graph.index.get(&key).ok_or_else(|| {
            OpenApiToolsError::OpenApi(format!(
                "Unresolved $ref '{reference}' (doc {})",
                doc.display()
            ))
        })?;
        let node = &graph.nodes[id];

        if node.cyclic && inside_cycle {
            return Ok(Value::Object(original.clone()));
        }

        let inside_cycle = inside_cycle || node.cyclic;
        if let Some(v) = self.cache.get(&(id, inside_cycle)) {
            return Ok(v.clone());
        }

        let expanded = self.expand(&node.doc, &node.value, inside_cycle)?;
        self.cache.insert((id, inside_cycle), expanded.clone());
        Ok(expanded)
    }
}

/// `$ref` strings directly reachable from `value`, without descending into ref objects.
fn refs_in(value: &Value) -> Vec<&str> {
    let mut out = Vec::new();
    let mut pending = vec![value];
    while let Some(v) = pending.pop() {
        match v {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    out.push(reference.as_str());
                } else {
                    pending.extend(map.values());
                }
            }
            Value::Array(items) => pending.extend(items),
            _ => {}
        }
    }
    out
}

impl<'a> OpenApiResolver<'a> {
    /// Create a new resolver for an already parsed root `OpenAPI` document.
    #[must_use]
    pub fn new(root_doc: DocId, root: Value, client: &'a Client) -> Self {
        let mut docs = HashMap::new();
        docs.insert(root_doc.clone(), Arc::new(root));
        Self {
            root_doc,
            client,
            docs: RwLock::new(docs),
        }
    }

    /// Expand every `$ref` in the root document.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference cannot be resolved, or if a referenced document cannot be
    /// loaded/parsed.
    pub async fn resolve_document(&self) -> Result<Value> {
        let root = self.load_doc(&self.root_doc).await?;
        let graph = self.collect_refs(&root).await?;

        let cyclic: Vec<&str> = graph
            .nodes
            .iter()
            .filter(|n| n.cyclic)
            .map(|n| n.reference.as_str())
            .collect();
        if !cyclic.is_empty() {
            tracing::warn!(
                count = cyclic.len(),
                refs = %cyclic.join(", "),
                "cyclic $refs left unexpanded inside their own expansion"
            );
        }

        let mut expander = Expander {
            graph: &graph,
            cache: HashMap::new(),
        };
        expander.expand(&self.root_doc, &root, false)
    }

    /// Load the target of every reachable `$ref` once and record which targets form cycles.
    async fn collect_refs(&self, root: &Value) -> Result<RefGraph> {
        let mut graph = RefGraph::default();
        for reference in refs_in(root) {
            let key = Self::canonical_ref_key(&self.root_doc, reference)?;
            graph.node_for(key, &self.root_doc, reference);
        }

        let mut next = 0;
        while next < graph.nodes.len() {
            let source = graph.nodes[next].doc.clone();
            let reference = graph.nodes[next].reference.clone();
            let (target_doc, value) = self.resolve_ref_value(&source, &reference).await?;

            let mut edges = Vec::new();
            for nested in refs_in(&value) {
                let key = Self::canonical_ref_key(&target_doc, nested)?;
                edges.push(graph.node_for(key, &target_doc, nested));
            }

            let node = &mut graph.nodes[next];
            node.doc = target_doc;
            node.value = value;
            node.edges = edges;
            next += 1;
        }

        graph.mark_cycles();
        Ok(graph)
    }

    async fn resolve_ref_value(
        &self,
        current_doc: &DocId,
        reference: &str,
    ) -> Result<(DocId, Value)> {
        let (target_doc, pointer) = Self::parse_ref(current_doc, reference)?;
        let doc_value = self.load_doc(&target_doc).await?;

        let selected = if let Some(ptr) = pointer {
            doc_value.pointer(&ptr).cloned().ok_or_else(|| {
                OpenApiToolsError::OpenApi(format!(
                    "Unresolved $ref '{}' (doc {}, missing pointer '{}')",
                    reference,
                    target_doc.display(),
                    ptr
                ))
            })?
        } else {
            (*doc_value).clone()
        };

        Ok((target_doc, selected))
    }

    fn parse_ref(current_doc: &DocId, reference: &str) -> Result<(DocId, Option<String>)> {
        let (doc_part, frag_part) = match reference.split_once('#') {
            Some((d, f)) => (d, Some(f)),
            None => (reference, None),
        };

        let target_doc = Self::resolve_doc(current_doc, doc_part)?;

        let ptr = match frag_part {
            Some("") | None => None,
            Some(frag) if frag.starts_with('/') => Some(frag.to_string()),
            Some(_) => {
                return Err(OpenApiToolsError::OpenApi(format!(
                    "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}",
                )));
            }
        };

        Ok((target_doc, ptr))
    }

    fn resolve_doc(current_doc: &DocId, doc_part: &str) -> Result<DocId> {
        if doc_part.is_empty() {
            return Ok(current_doc.clone());
        }

        if is_http_url(doc_part) {
            let url = Url::parse(doc_part).map_err(|e| {
                OpenApiToolsError::OpenApi(format!("Bad $ref URL '{doc_part}': {e}"))
            })?;
            return Ok(DocId::Url(strip_fragment(url)));
        }

        if doc_part.starts_with("file://") {
            let url = Url::parse(doc_part).map_err(|e| {
                OpenApiToolsError::OpenApi(format!("Bad $ref file URL '{doc_part}': {e}"))
            })?;
            let path = url.to_file_path().map_err(|()| {
                OpenApiToolsError::OpenApi(format!("Bad $ref file URL (not a path): {doc_part}"))
            })?;
            return Ok(DocId::File(canonicalize_best_effort(path)));
        }

        match current_doc {
            DocId::Url(base) => {
                let joined = base.join(doc_part).map_err(|e| {
                    OpenApiToolsError::OpenApi(format!(
                        "Failed to resolve relative $ref '{doc_part}' against base {base}: {e}",
                    ))
                })?;
                Ok(DocId::Url(strip_fragment(joined)))
            }
            DocId::File(base) => {
                let resolved = if Path::new(doc_part).is_absolute() {
                    PathBuf::from(doc_part)
                } else {
                    base.parent()
                        .unwrap_or_else(|| Path::new("."))
                        .join(doc_part)
                };
                Ok(DocId::File(canonicalize_best_effort(resolved)))
            }
        }
    }

    fn canonical_ref_key(current_doc: &DocId, reference: &str) -> Result<String> {
        let (target_doc, pointer) = Self::parse_ref(current_doc, reference)?;
        let mut key = match &target_doc {
            DocId::Url(u) => format!("url:{u}"),
            DocId::File(p) => format!("file:{}", p.display()),
        };
        if let Some(ptr) = pointer {
            key.push('#');
            key.push_str(&ptr);
        }
        Ok(key)
    }

    async fn load_doc(&self, doc: &DocId) -> Result<Arc<Value>> {
        // Fast path: cache hit.
        if let Some(v) = self.docs.read().get(doc).cloned() {
            return Ok(v);
        }

        tracing::debug!(doc = %doc.display(), "loading referenced document");
        let content = match doc {
            DocId::File(path) => std::fs::read_to_string(path).map_err(|e| {
                OpenApiToolsError::OpenApi(format!(
                    "Failed to read referenced file {}: {e}",
                    path.display(),
                ))
            })?,
            DocId::Url(url) => self
                .client
                .get(url.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| {
                    OpenApiToolsError::OpenApi(format!("Failed to fetch referenced URL {url}: {e}"))
                })?
                .text()
                .await
                .map_err(|e| {
                    OpenApiToolsError::OpenApi(format!("Failed to read referenced URL body: {e}"))
                })?,
        };

        let parsed: Value = serde_yaml::from_str(&content).map_err(|e| {
            OpenApiToolsError::OpenApi(format!(
                "Failed to parse referenced document {}: {e}",
                doc.display(),
            ))
        })?;

        let parsed = Arc::new(parsed);
        self.docs.write().insert(doc.clone(), Arc::clone(&parsed));
        Ok(parsed)
    }
}
