//! Free-text lookup over a [`Catalog`] by operation summary.

use crate::catalog::{Catalog, OperationDescriptor};
use serde::{Deserialize, Serialize};

/// Non-verbose listing entry: just the operation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSummary {
    #[serde(rename = "Function")]
    pub function: String,
}

impl Catalog {
    /// All operations whose summary contains `query`, ignoring case, in catalog order.
    ///
    /// An empty query matches every operation.
    #[must_use]
    pub fn find(&self, query: &str) -> Vec<&OperationDescriptor> {
        let needle = query.to_lowercase();
        self.iter()
            .filter(|op| matches_summary(op, &needle))
            .collect()
    }

    /// First operation whose summary contains `query`, ignoring case.
    #[must_use]
    pub fn find_first(&self, query: &str) -> Option<&OperationDescriptor> {
        let needle = query.to_lowercase();
        self.iter().find(|op| matches_summary(op, &needle))
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<OperationSummary> {
        self.iter()
            .map(|op| OperationSummary {
                function: op.summary.clone(),
            })
            .collect()
    }
}

fn matches_summary(op: &OperationDescriptor, needle: &str) -> bool {
    op.summary.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::build(
            &json!({
                "paths": {
                    "/pets": {
                        "get": { "summary": "List pets" },
                        "post": { "summary": "Add a new PET to the store" }
                    },
                    "/pets/{petId}": {
                        "get": { "summary": "Get Pet by ID" }
                    },
                    "/store/inventory": {
                        "get": {}
                    }
                }
            }),
            "https://example.com/openapi.json",
        )
    }

    #[test]
    fn empty_query_matches_everything() {
        let catalog = catalog();
        assert_eq!(catalog.find("").len(), catalog.len());
        assert_eq!(catalog.find_first(""), catalog.operations().first());
    }

    #[test]
    fn matching_ignores_case_and_keeps_catalog_order() {
        let catalog = catalog();
        let hits: Vec<&str> = catalog
            .find("pet")
            .into_iter()
            .map(|op| op.summary.as_str())
            .collect();
        assert_eq!(
            hits,
            vec!["List pets", "Add a new PET to the store", "Get Pet by ID"]
        );

        let first = catalog.find_first("BY id").unwrap();
        assert_eq!(first.url, "https://example.com/pets/{petId}");
        assert_eq!(first.method, "GET");
    }

    #[test]
    fn default_summary_is_searchable() {
        let catalog = catalog();
        let hit = catalog.find_first("no summary").unwrap();
        assert_eq!(hit.url, "https://example.com/store/inventory");
    }

    #[test]
    fn no_match_is_empty_not_an_error() {
        let catalog = catalog();
        assert!(catalog.find("orders").is_empty());
        assert!(catalog.find_first("orders").is_none());
    }

    #[test]
    fn summaries_serialize_under_function_key() {
        let summaries = catalog().summaries();
        assert_eq!(summaries.len(), 4);
        assert_eq!(
            serde_json::to_value(&summaries[0]).unwrap(),
            json!({ "Function": "List pets" })
        );
        assert_eq!(summaries[3].function, "No summary");
    }
}
