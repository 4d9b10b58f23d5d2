//! Byte sources for resolved asset URLs.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use percent_encoding::percent_decode_str;

use crate::error::AssetLoadError;
use crate::reference::AssetConfig;

/// Fetches the bytes behind a resolved URL.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError>;
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

// ── DirSource ─────────────────────────────────────────────────────────────

/// Serves the application base path from a local directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
    base: String,
}

impl DirSource {
    pub fn new(config: &AssetConfig) -> Self {
        Self {
            root: config.root.clone(),
            base: config.base.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a resolved URL onto a path under the root.
    ///
    /// The base path prefix is stripped first. Paths that would leave the
    /// root are rejected.
    pub fn map_path(&self, url: &str) -> Option<PathBuf> {
        let url = url.split(['?', '#']).next().unwrap_or_default();
        let rel = if self.base != "/" && url.starts_with(self.base.as_str()) {
            &url[self.base.len()..]
        } else {
            url
        };
        let rel = rel.trim_start_matches("./").trim_start_matches('/');
        let rel = percent_decode_str(rel).decode_utf8_lossy();

        let mut path = self.root.clone();
        for component in Path::new(rel.as_ref()).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }
}

#[async_trait]
impl AssetSource for DirSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        let path = self
            .map_path(url)
            .ok_or_else(|| AssetLoadError::fetch(url, "path escapes the asset root"))?;
        log::trace!("reading {} for {url}", path.display());
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetLoadError::NotFound(url.to_owned()),
            _ => AssetLoadError::fetch(url, e),
        })
    }
}

// ── HttpSource ────────────────────────────────────────────────────────────

/// Fetches absolute `http(s)` URLs.
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        log::trace!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AssetLoadError::fetch(url, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AssetLoadError::NotFound(url.to_owned()));
        }
        if !status.is_success() {
            return Err(AssetLoadError::fetch(url, format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssetLoadError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }
}

// ── DefaultSource ─────────────────────────────────────────────────────────

/// Remote URLs go over HTTP, everything else to the local directory.
#[derive(Debug, Clone)]
pub struct DefaultSource {
    dir: DirSource,
    http: HttpSource,
}

impl DefaultSource {
    pub fn new(config: &AssetConfig) -> Self {
        Self {
            dir: DirSource::new(config),
            http: HttpSource::default(),
        }
    }
}

#[async_trait]
impl AssetSource for DefaultSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        if is_remote(url) {
            self.http.fetch(url).await
        } else {
            self.dir.fetch(url).await
        }
    }
}

// ── MemorySource ──────────────────────────────────────────────────────────

/// In-memory map of URL to bytes.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(url.into(), bytes.into());
    }

    /// Number of `fetch` calls so far, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AssetSource for MemorySource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| AssetLoadError::NotFound(url.to_owned()))
    }
}
