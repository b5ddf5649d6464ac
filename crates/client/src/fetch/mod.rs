//! HTTP transport for the cache engine.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve root-relative paths against the app origin
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Response classification
//! - Final URL on the app origin: `basic`
//! - Cross-origin `no-cors` request: `opaque`, with status, headers and body hidden
//! - Any other cross-origin response: `cors`

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize};

use ::url::Url;
use pwa_core::{AppConfig, Error, Request, RequestMode, Response, ResponseType, Transport};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pwa-sw/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "pwa-sw/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Decide the response type the engine sees for a fetched response.
pub fn classify(origin: &Url, final_url: &Url, mode: RequestMode) -> ResponseType {
    if final_url.origin() == origin.origin() {
        ResponseType::Basic
    } else if mode == RequestMode::NoCors {
        ResponseType::Opaque
    } else {
        ResponseType::Cors
    }
}

/// `reqwest`-backed [`Transport`].
pub struct HttpTransport {
    http: Client,
    config: FetchConfig,
    origin: Url,
}

impl HttpTransport {
    /// Create a transport for the application served at `origin`.
    pub fn new(config: FetchConfig, origin: Url) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, origin })
    }

    fn too_large(&self, len: u64) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

fn send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::Network(format!("network error: {}", err))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(send_error)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let kind = classify(&self.origin, &final_url, request.mode);
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(bytes.len() as u64));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes, {})",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len(),
            kind.as_str()
        );

        if kind == ResponseType::Opaque {
            return Ok(Response::opaque());
        }

        let mut captured = Response::new(status.as_u16(), bytes)
            .with_status_text(status_text(status))
            .with_kind(kind)
            .with_url(final_url);
        captured.headers = headers;
        Ok(captured)
    }
}

fn status_text(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwa_core::Method;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP/1.1 response on a local port.
    async fn serve_once(raw: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(raw.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "pwa-sw/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { timeout_ms: 1500, max_bytes: 1024, ..AppConfig::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_bytes, 1024);
    }

    #[test]
    fn test_classify() {
        let origin = url("https://app.example");
        assert_eq!(classify(&origin, &url("https://app.example/a.js"), RequestMode::NoCors), ResponseType::Basic);
        assert_eq!(classify(&origin, &url("https://cdn.example/a.js"), RequestMode::NoCors), ResponseType::Opaque);
        assert_eq!(classify(&origin, &url("https://cdn.example/a.js"), RequestMode::Cors), ResponseType::Cors);
        assert_eq!(classify(&origin, &url("http://app.example/a.js"), RequestMode::Cors), ResponseType::Cors);
    }

    #[tokio::test]
    async fn test_http_transport_new() {
        let transport = HttpTransport::new(FetchConfig::default(), url("https://app.example"));
        assert!(transport.is_ok());
    }

    #[tokio::test]
    async fn test_non_ok_status_is_a_response() {
        let base = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope").await;
        let transport = HttpTransport::new(FetchConfig::default(), base.clone()).unwrap();

        let response = transport.fetch(&Request::get(base.join("/missing").unwrap())).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
        assert_eq!(response.kind, ResponseType::Basic);
        assert_eq!(response.text(), Some("nope"));
        assert_eq!(response.header("content-length"), Some("4"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let base = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 32\r\nConnection: close\r\n\r\n0123456789abcdef0123456789abcdef")
            .await;
        let config = FetchConfig { max_bytes: 8, ..FetchConfig::default() };
        let transport = HttpTransport::new(config, base.clone()).unwrap();

        let result = transport.fetch(&Request::get(base)).await;

        assert!(matches!(result, Err(Error::FetchTooLarge(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let target = url(&format!("http://{addr}/"));
        let transport = HttpTransport::new(FetchConfig::default(), target.clone()).unwrap();

        let result = transport.fetch(&Request::new(Method::Get, target, RequestMode::Navigate)).await;

        assert!(result.unwrap_err().is_network());
    }
}
