//! sw_fetch tool implementation.
//!
//! Sends a request through the registration, so it is answered by the
//! controlling worker's cache policy when one is active and by the network
//! otherwise.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use pwa_client::canonicalize;
use pwa_core::{Error, Method, Registration, Request, RequestMode, ResponseSource, ResponseType};

use super::{body_text, json_result};

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a root-relative path resolved against the app origin.
    pub url: String,

    /// Request method (default: GET). Only GET requests are intercepted.
    #[serde(default)]
    pub method: Option<String>,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: Option<String>,
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Canonical request URL.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// Where the response came from.
    pub source: ResponseSource,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    /// Body as text, absent when the body is not UTF-8.
    pub body: Option<String>,
    pub body_len: usize,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, origin: &Url, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url, Some(origin)).map_err(Error::from)?;
    let method: Method = match params.method.as_deref() {
        Some(m) => m.parse()?,
        None => Method::Get,
    };
    let mode: RequestMode = match params.mode.as_deref() {
        Some(m) => m.parse()?,
        None => RequestMode::default(),
    };

    let resolved = registration.fetch(Request::new(method, url.clone(), mode)).await;
    tracing::debug!(url = %url, source = ?resolved.source, "sw_fetch answered");

    let response = resolved.response;
    let output = SwFetchOutput {
        url: url.to_string(),
        status: response.status,
        status_text: response.status_text,
        source: resolved.source,
        response_type: response.kind,
        body: body_text(&response.body),
        body_len: response.body.len(),
        headers: response.headers,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use crate::tools::testing::{base_config, fixture, origin, output_json};
    use super::*;

    fn params(url: &str, method: Option<&str>, mode: Option<&str>) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: method.map(Into::into), mode: mode.map(Into::into) }
    }

    #[tokio::test]
    async fn test_fetch_without_worker_uses_network() {
        let (_store, _transport, registration) = fixture().await;

        let result = fetch_impl(&registration, &origin(), params("/index.html", None, None)).await.unwrap();
        let output = output_json(&result);

        assert_eq!(output["source"], "network");
        assert_eq!(output["status"], 200);
        assert_eq!(output["body"], "ok /index.html");
    }

    #[tokio::test]
    async fn test_fetch_served_from_cache_when_offline() {
        let (_store, transport, registration) = fixture().await;
        registration.update(base_config()).await.unwrap();
        transport.go_offline();

        let hit = output_json(&fetch_impl(&registration, &origin(), params("/js/app.js", None, None)).await.unwrap());
        assert_eq!(hit["source"], "cache");
        assert_eq!(hit["body"], "ok /js/app.js");

        let page = params("/articles/7#top", None, Some("navigate"));
        let fallback = output_json(&fetch_impl(&registration, &origin(), page).await.unwrap());
        assert_eq!(fallback["source"], "offline-fallback");
        assert_eq!(fallback["body"], "ok /offline.html");

        let image = output_json(&fetch_impl(&registration, &origin(), params("/img/a.png", None, None)).await.unwrap());
        assert_eq!(image["source"], "synthetic");
        assert_eq!(image["status"], 408);
    }

    #[tokio::test]
    async fn test_fetch_post_is_not_intercepted() {
        let (store, _transport, registration) = fixture().await;
        registration.update(base_config()).await.unwrap();

        let result = fetch_impl(&registration, &origin(), params("/api/send", Some("post"), None)).await.unwrap();
        registration.settle().await;

        assert_eq!(output_json(&result)["source"], "network");
        let key = Request::new(Method::Post, origin().join("/api/send").unwrap(), RequestMode::Cors).key();
        assert!(store.get_entry("v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_input() {
        let (_store, _transport, registration) = fixture().await;

        let scheme = fetch_impl(&registration, &origin(), params("ftp://app.test/x", None, None)).await;
        assert_eq!(scheme.unwrap_err().code.0, -32003);

        let mode = fetch_impl(&registration, &origin(), params("/", None, Some("sideways"))).await;
        assert_eq!(mode.unwrap_err().code.0, -32602);
    }
}
