//! Deploy-time configuration of a single worker version.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::http::{Request, RequestKey};

/// Cache namespace used when none is configured.
pub const DEFAULT_CACHE_NAME: &str = "pwa-test-cache-v1";

/// Page served to navigations that fail on both cache and network.
pub const DEFAULT_OFFLINE_PATH: &str = "/offline.html";

/// Resources pre-cached at install.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/offline.html",
    "/css/style.css",
    "/js/app.js",
    "/js/install.js",
    "/js/push.js",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

/// Ordered list of root-relative paths to pre-populate at install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest(Vec<String>);

impl ResourceManifest {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check every path is root-relative and appears once.
    pub fn validate(&self) -> Result<(), Error> {
        if self.0.is_empty() {
            return Err(Error::InvalidInput("manifest must list at least one path".into()));
        }
        for (i, path) in self.0.iter().enumerate() {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(Error::InvalidInput(format!("manifest path must be root-relative: {path}")));
            }
            if self.0[..i].contains(path) {
                return Err(Error::InvalidInput(format!("duplicate manifest path: {path}")));
            }
        }
        Ok(())
    }
}

impl Default for ResourceManifest {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST.iter().copied())
    }
}

/// Immutable configuration handed to a worker at construction.
///
/// Paths are resolved against the origin once, up front, so the engine
/// never has to handle a malformed manifest at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    origin: Url,
    cache_name: String,
    manifest: ResourceManifest,
    manifest_urls: Vec<Url>,
    offline_path: String,
    offline_url: Url,
    skip_waiting: bool,
}

impl WorkerConfig {
    /// Build a worker configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the cache name is empty, the manifest
    /// is invalid, or the offline path is not part of the manifest, and
    /// `Error::InvalidUrl` if a path cannot be resolved against the origin.
    pub fn new(
        origin: Url, cache_name: impl Into<String>, manifest: ResourceManifest, offline_path: impl Into<String>,
    ) -> Result<Self, Error> {
        let cache_name = cache_name.into();
        let offline_path = offline_path.into();

        if cache_name.trim().is_empty() {
            return Err(Error::InvalidInput("cache name cannot be empty".into()));
        }
        manifest.validate()?;
        if !manifest.contains(&offline_path) {
            return Err(Error::InvalidInput(format!("offline path {offline_path} is not in the manifest")));
        }

        let resolve = |path: &str| origin.join(path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")));
        let manifest_urls = manifest.paths().iter().map(|p| resolve(p.as_str())).collect::<Result<Vec<_>, _>>()?;
        let offline_url = resolve(&offline_path)?;

        Ok(Self { origin, cache_name, manifest, manifest_urls, offline_path, offline_url, skip_waiting: true })
    }

    /// The same deployment under another namespace, as produced by a version bump.
    pub fn with_cache_name(&self, cache_name: impl Into<String>) -> Result<Self, Error> {
        let cache_name = cache_name.into();
        if cache_name.trim().is_empty() {
            return Err(Error::InvalidInput("cache name cannot be empty".into()));
        }
        Ok(Self { cache_name, ..self.clone() })
    }

    /// Whether a freshly installed worker asks to activate without waiting
    /// for pages controlled by the previous version to close. On by default.
    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    pub fn offline_path(&self) -> &str {
        &self.offline_path
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }

    /// One `GET` request per manifest path, in manifest order.
    pub fn manifest_requests(&self) -> Vec<Request> {
        self.manifest_urls.iter().cloned().map(Request::get).collect()
    }

    /// Identity the offline page is cached under.
    pub fn offline_key(&self) -> RequestKey {
        Request::get(self.offline_url.clone()).key()
    }
}
