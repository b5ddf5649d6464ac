//! cache_get tool implementation.
//!
//! Retrieves a stored response by namespace and request URL.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use pwa_client::canonicalize;
use pwa_core::{CacheStore, Error, Method, RequestKey, ResponseType};

use crate::tools::{body_text, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Cache namespace (version tag) to look in.
    pub namespace: String,
    /// Absolute URL or root-relative path of the cached GET request.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub namespace: String,
    /// Stored identity as `METHOD url`.
    pub key: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
    pub body: Option<String>,
    pub body_len: usize,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(store: &dyn CacheStore, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.namespace.trim().is_empty() {
        return Err(Error::InvalidInput("namespace cannot be empty".into()).into());
    }

    let url = canonicalize(&params.url, Some(origin)).map_err(Error::from)?;
    let key = RequestKey::new(Method::Get, &url);

    let entry = store
        .match_entry(&params.namespace, &key)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} in {}", key, params.namespace)))?;

    let response = entry.response;
    let output = CacheGetOutput {
        namespace: entry.namespace,
        key: entry.key.to_string(),
        status: response.status,
        status_text: response.status_text,
        response_type: response.kind,
        stored_at: entry.stored_at,
        body: body_text(&response.body),
        body_len: response.body.len(),
        headers: response.headers,
    };

    json_result(&output)
}
