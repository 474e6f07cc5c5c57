use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Scheme prefix of locally minted object URLs.
pub const OBJECT_URL_PREFIX: &str = "blob:walkthrough/";

/// Revocable reference to a registered blob.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable bytes tagged with a MIME type.
#[derive(Debug)]
pub struct Blob {
    bytes: Vec<u8>,
    mime: String,
}

impl Blob {
    /// Concatenate `chunks` in order into one blob.
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime: impl Into<String>) -> Self {
        let bytes = if chunks.len() == 1 {
            chunks.into_iter().next().unwrap_or_default()
        } else {
            chunks.concat()
        };
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<ObjectUrl, Arc<Blob>>,
    revocations: HashMap<ObjectUrl, usize>,
}

/// Table of live object URLs.
///
/// A URL resolves while its [`VideoResource`] is alive; releasing the resource revokes it. The
/// registry also counts revocations per URL so tests can verify nothing is revoked twice.
#[derive(Clone, Default)]
pub struct BlobRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return the owning resource.
    pub fn create_object_url(&self, blob: Blob) -> VideoResource {
        let blob = Arc::new(blob);
        let url = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let url = ObjectUrl(format!("{OBJECT_URL_PREFIX}{}", inner.next_id));
            inner.live.insert(url.clone(), Arc::clone(&blob));
            url
        };
        tracing::debug!(%url, bytes = blob.len(), "object url created");
        VideoResource {
            url,
            blob,
            registry: self.clone(),
            released: false,
        }
    }

    /// Revoke `url`. Returns `false` if it was not live.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let mut inner = self.lock();
        *inner.revocations.entry(url.clone()).or_default() += 1;
        let was_live = inner.live.remove(url).is_some();
        if was_live {
            tracing::debug!(%url, "object url revoked");
        } else {
            tracing::warn!(%url, "revoke of an object url that is not live");
        }
        was_live
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<Arc<Blob>> {
        self.lock().live.get(url).cloned()
    }

    pub fn is_live(&self, url: &ObjectUrl) -> bool {
        self.lock().live.contains_key(url)
    }

    /// Number of URLs currently resolvable.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// How many times `url` has been revoked.
    pub fn revocation_count(&self, url: &ObjectUrl) -> usize {
        self.lock().revocations.get(url).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for BlobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

/// A finished encode: the blob plus its object URL.
///
/// The URL is revoked exactly once, by [`VideoResource::release`] or on drop.
#[derive(Debug)]
pub struct VideoResource {
    url: ObjectUrl,
    blob: Arc<Blob>,
    registry: BlobRegistry,
    released: bool,
}

impl VideoResource {
    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }

    pub fn mime(&self) -> &str {
        self.blob.mime()
    }

    pub fn len(&self) -> usize {
        self.blob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }

    /// Write the encoded bytes to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> WalkthroughResult<()> {
        if let Some(parent) = path.parent() {
            use anyhow::Context as _;
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }
        std::fs::write(path, self.bytes()).map_err(|e| {
            WalkthroughError::Other(anyhow::anyhow!(
                "failed to write video to '{}': {e}",
                path.display()
            ))
        })
    }

    /// Revoke the URL now.
    pub fn release(mut self) {
        self.revoke_once();
    }

    fn revoke_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.revoke(&self.url);
        }
    }
}

impl Drop for VideoResource {
    fn drop(&mut self) {
        self.revoke_once();
    }
}

/// The video a session currently exposes.
#[derive(Debug)]
pub enum VideoSource {
    /// Encoded locally and owned by this session.
    Local(VideoResource),
    /// Pre-rendered by the backend.
    Remote(String),
}

impl VideoSource {
    pub fn url(&self) -> &str {
        match self {
            Self::Local(r) => r.url().as_str(),
            Self::Remote(u) => u,
        }
    }

    pub fn as_local(&self) -> Option<&VideoResource> {
        match self {
            Self::Local(r) => Some(r),
            Self::Remote(_) => None,
        }
    }

    /// Release local resources; remote URLs need nothing.
    pub fn release(self) {
        if let Self::Local(r) = self {
            r.release();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/resource.rs"]
mod tests;
