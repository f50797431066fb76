//! Mock hosting API for tests.
//!
//! Configurable with canned metadata and a canned resolved URL, and it
//! counts calls so tests can assert that credential checks happen before
//! any hosting-API traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{GateError, GateResult};
use crate::hosting::{ArtifactHost, ArtifactMetadata, ReleaseAssetMetadata, TargetKind};

/// A mock [`ArtifactHost`] for tests.
#[derive(Debug, Default)]
pub struct MockHost {
    artifacts: RwLock<HashMap<u64, ArtifactMetadata>>,
    assets: RwLock<HashMap<u64, ReleaseAssetMetadata>>,
    resolved_url: RwLock<Option<String>>,
    fail_status: Option<u16>,
    artifact_calls: AtomicU64,
    asset_calls: AtomicU64,
    redirect_calls: AtomicU64,
    last_redirect: RwLock<Option<(String, TargetKind)>>,
}

impl MockHost {
    /// Creates an empty mock host; lookups fail with a 404 until
    /// metadata is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers artifact metadata for `id`.
    pub fn with_artifact(self, id: u64, size_bytes: u64, archive_url: impl Into<String>) -> Self {
        self.artifacts.write().unwrap().insert(
            id,
            ArtifactMetadata {
                size_bytes,
                archive_url: archive_url.into(),
            },
        );
        self
    }

    /// Registers release-asset metadata for `id`.
    pub fn with_release_asset(self, id: u64, size_bytes: u64, asset_url: impl Into<String>) -> Self {
        self.assets.write().unwrap().insert(
            id,
            ReleaseAssetMetadata {
                size_bytes,
                asset_url: asset_url.into(),
                browser_download_url: None,
            },
        );
        self
    }

    /// Sets the URL every redirect resolution returns.
    pub fn with_resolved_url(self, url: impl Into<String>) -> Self {
        *self.resolved_url.write().unwrap() = Some(url.into());
        self
    }

    /// Makes every call fail with the given hosting-API status.
    pub fn with_failure(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    /// Number of artifact metadata lookups made.
    pub fn artifact_calls(&self) -> u64 {
        self.artifact_calls.load(Ordering::SeqCst)
    }

    /// Number of release-asset metadata lookups made.
    pub fn asset_calls(&self) -> u64 {
        self.asset_calls.load(Ordering::SeqCst)
    }

    /// Number of redirect resolutions made.
    pub fn redirect_calls(&self) -> u64 {
        self.redirect_calls.load(Ordering::SeqCst)
    }

    /// The URL and kind of the most recent redirect resolution.
    pub fn last_redirect(&self) -> Option<(String, TargetKind)> {
        self.last_redirect.read().unwrap().clone()
    }

    fn check_failure(&self) -> GateResult<()> {
        match self.fail_status {
            Some(status) => Err(GateError::HostingApi { status }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ArtifactHost for MockHost {
    async fn fetch_artifact_metadata(&self, id: u64) -> GateResult<ArtifactMetadata> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.artifacts
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(GateError::HostingApi { status: 404 })
    }

    async fn fetch_release_asset_metadata(&self, id: u64) -> GateResult<ReleaseAssetMetadata> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.assets
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(GateError::HostingApi { status: 404 })
    }

    async fn resolve_download_url(&self, url: &str, kind: TargetKind) -> GateResult<String> {
        self.redirect_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        *self.last_redirect.write().unwrap() = Some((url.to_string(), kind));
        self.resolved_url
            .read()
            .unwrap()
            .clone()
            .ok_or(GateError::MissingRedirectTarget)
    }
}
