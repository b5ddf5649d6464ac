//! cache_keys tool implementation.
//!
//! Lists cache namespaces with the request identities stored in each.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pwa_core::CacheStore;

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceListing {
    pub name: String,
    /// Stored identities as `METHOD url`, oldest first.
    pub entries: Vec<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub namespaces: Vec<NamespaceListing>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(store: &dyn CacheStore) -> Result<CallToolResult, McpError> {
    let mut namespaces = Vec::new();
    for name in store.keys().await? {
        let entries = store.entries(&name).await?.iter().map(ToString::to_string).collect();
        namespaces.push(NamespaceListing { name, entries });
    }

    json_result(&CacheKeysOutput { namespaces })
}

#[cfg(test)]
mod tests {
    use crate::tools::testing::{base_config, fixture, output_json};
    use super::*;

    #[tokio::test]
    async fn test_keys_empty() {
        let (store, _transport, _registration) = fixture().await;

        let output = output_json(&keys_impl(&*store).await.unwrap());
        assert_eq!(output["namespaces"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_keys_after_install() {
        let (store, _transport, registration) = fixture().await;
        registration.update(base_config()).await.unwrap();

        let output = output_json(&keys_impl(&*store).await.unwrap());
        let namespaces = output["namespaces"].as_array().unwrap();

        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[0]["name"], "v1");
        let entries = namespaces[0]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), base_config().manifest().len());
        assert!(entries.iter().any(|e| e == "GET https://app.test/offline.html"));
    }
}
