//! Shared resource pack: fetch once, read many.
//!
//! Every scene renders with the same note skins and hit effects. The pack is
//! downloaded once per monitor, frozen into an [`Arc<ResourcePack>`], and
//! handed by reference to each scene's engine-side load.
//!
//! # Fetching
//!
//! [`ResourceFetcher`] abstracts where the bytes come from.
//! [`HttpResourceFetcher`] downloads each configured file from a base URL
//! with `reqwest` (native and wasm32 alike).

use std::cell::{Cell, OnceCell};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;

use crate::constants::DEFAULT_RESOURCE_FILES;
use crate::error::ResourceLoadError;

/// Immutable asset-name → bytes mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePack {
    assets: HashMap<String, Vec<u8>>,
}

impl ResourcePack {
    /// Freeze a set of assets into a pack.
    #[must_use]
    pub fn new(assets: HashMap<String, Vec<u8>>) -> Self {
        Self { assets }
    }

    /// Bytes of one asset.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.assets.get(name).map(Vec::as_slice)
    }

    /// Asset names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.assets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterate `(name, bytes)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.assets
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    /// Number of assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// True if the pack holds no assets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Sum of all asset sizes in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.assets.values().map(Vec::len).sum()
    }

    /// Check that every name in `required` is present.
    pub fn ensure_contains(&self, required: &[&str]) -> Result<(), ResourceLoadError> {
        match required.iter().find(|name| !self.assets.contains_key(**name)) {
            Some(missing) => Err(ResourceLoadError::Decode {
                asset: (*missing).to_string(),
                detail: "missing from resource pack".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Populate-once holder of the shared pack.
#[derive(Debug, Default)]
pub struct ResourcePackCache {
    pack: OnceCell<Arc<ResourcePack>>,
    fetching: Cell<bool>,
}

impl ResourcePackCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the pack. Returns `false` (and drops `pack`) if already populated.
    pub fn populate(&self, pack: ResourcePack) -> bool {
        self.fetching.set(false);
        self.pack.set(Arc::new(pack)).is_ok()
    }

    /// Shared handle to the pack, if populated.
    #[must_use]
    pub fn get(&self) -> Option<Arc<ResourcePack>> {
        self.pack.get().map(Arc::clone)
    }

    /// True once populated.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.pack.get().is_some()
    }

    /// Claim the right to fetch.
    ///
    /// Returns `false` if the cache is already populated or another fetch is
    /// in flight. The claimant must call [`populate`](Self::populate) or
    /// [`abandon_fetch`](Self::abandon_fetch).
    pub fn begin_fetch(&self) -> bool {
        if self.is_populated() || self.fetching.get() {
            return false;
        }
        self.fetching.set(true);
        true
    }

    /// Release a fetch claim after a failure so a later call can retry.
    pub fn abandon_fetch(&self) {
        self.fetching.set(false);
    }

    /// True while a fetch claim is outstanding.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.fetching.get()
    }
}

/// Source of resource pack bytes.
#[async_trait(?Send)]
pub trait ResourceFetcher {
    /// Download the complete pack.
    async fn fetch(&self) -> Result<ResourcePack, ResourceLoadError>;
}

/// Downloads each pack file from `<base_url>/<name>`.
#[derive(Debug, Clone)]
pub struct HttpResourceFetcher {
    client: reqwest::Client,
    base_url: String,
    files: Vec<String>,
}

impl HttpResourceFetcher {
    /// Fetch the [`DEFAULT_RESOURCE_FILES`] from `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_files(
            base_url,
            DEFAULT_RESOURCE_FILES.iter().map(|f| (*f).to_string()).collect(),
        )
    }

    /// Fetch an explicit file list from `base_url`.
    pub fn with_files(base_url: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            files,
        }
    }

    /// URL of one pack file.
    #[must_use]
    pub fn file_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }

    async fn fetch_file(&self, name: &str) -> Result<(String, Vec<u8>), ResourceLoadError> {
        let fetch_err = |detail: String| ResourceLoadError::Fetch {
            asset: name.to_string(),
            detail,
        };

        let response = self
            .client
            .get(self.file_url(name))
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ResourceLoadError::Decode {
                asset: name.to_string(),
                detail: "empty body".to_string(),
            });
        }

        log::debug!("Fetched resource {name} ({} bytes)", bytes.len());
        Ok((name.to_string(), bytes.to_vec()))
    }
}

#[async_trait(?Send)]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self) -> Result<ResourcePack, ResourceLoadError> {
        let files = try_join_all(self.files.iter().map(|name| self.fetch_file(name))).await?;
        Ok(ResourcePack::new(files.into_iter().collect()))
    }
}
