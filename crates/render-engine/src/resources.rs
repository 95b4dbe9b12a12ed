//! Readiness tracking for background images and late-loaded fonts.
//!
//! Every load goes `Pending -> Ready | Failed` exactly once. A watch
//! channel carries a generation counter bumped on each settle, so an
//! export waiting on a set of keys wakes whenever any of them may have
//! changed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use image::RgbaImage;
use quoteme_common::error::{QuotemeError, QuotemeResult};
use quoteme_scene_model::style::{ImageSource, ResourceKey};
use rusttype::Font;
use tokio::sync::watch;

/// A loaded resource.
#[derive(Clone)]
pub enum Resource {
    Image(Arc<RgbaImage>),
    Font(Arc<Font<'static>>),
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Image(img) => write!(f, "Image({}x{})", img.width(), img.height()),
            Resource::Font(_) => f.write_str("Font"),
        }
    }
}

/// Load state of one resource.
#[derive(Debug, Clone)]
pub enum ResourceState {
    Pending,
    Ready(Resource),
    Failed(String),
}

impl ResourceState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ResourceState::Pending)
    }
}

/// Result of waiting on a set of resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readiness {
    pub ready: Vec<ResourceKey>,
    /// Failed, timed out, or never requested, with a reason.
    pub failed: Vec<(ResourceKey, String)>,
}

impl Readiness {
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }

    /// Reason a key did not become ready, if it did not.
    pub fn failure(&self, key: &ResourceKey) -> Option<&str> {
        self.failed
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, reason)| reason.as_str())
    }
}

/// Shared resource table.
pub struct ResourceCache {
    entries: RwLock<HashMap<ResourceKey, ResourceState>>,
    generation: watch::Sender<u64>,
}

impl ResourceCache {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            entries: RwLock::new(HashMap::new()),
            generation,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Mark a key as loading. Returns `false` if the key is already known.
    pub fn insert_pending(&self, key: &ResourceKey) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.clone(), ResourceState::Pending);
        tracing::debug!(resource = %key, "Resource pending");
        true
    }

    /// Settle a key as ready.
    pub fn complete(&self, key: &ResourceKey, resource: Resource) {
        tracing::debug!(resource = %key, kind = ?resource, "Resource ready");
        self.settle(key, ResourceState::Ready(resource));
    }

    /// Settle a key as failed.
    pub fn fail(&self, key: &ResourceKey, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(resource = %key, %reason, "Resource failed to load");
        self.settle(key, ResourceState::Failed(reason));
    }

    /// A key evicted while loading stays evicted.
    fn settle(&self, key: &ResourceKey, state: ResourceState) {
        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            match entries.get_mut(key) {
                Some(entry) => *entry = state,
                None => {
                    tracing::debug!(resource = %key, "Evicted resource settled, dropping it");
                    return;
                }
            }
        }
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Forget a resource so its decoded data can be freed.
    ///
    /// Returns whether the key was known. A later request loads it again.
    pub fn evict(&self, key: &ResourceKey) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        if removed {
            tracing::debug!(resource = %key, "Resource evicted");
        }
        removed
    }

    /// Number of known resources, in any state.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self, key: &ResourceKey) -> Option<ResourceState> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Decoded image for a key, if ready.
    pub fn image(&self, key: &ResourceKey) -> Option<Arc<RgbaImage>> {
        match self.state(key) {
            Some(ResourceState::Ready(Resource::Image(image))) => Some(image),
            _ => None,
        }
    }

    /// Number of settle events so far.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Start decoding an image unless it is already known.
    ///
    /// Decoding runs on the blocking pool when a tokio runtime is
    /// available and inline otherwise.
    pub fn request_image(self: &Arc<Self>, source: &ImageSource) -> ResourceKey {
        let key = source.key();
        if !self.insert_pending(&key) {
            return key;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = Arc::clone(self);
                let task_key = key.clone();
                let source = source.clone();
                handle.spawn(async move {
                    match decode_image(source).await {
                        Ok(image) => cache.complete(&task_key, Resource::Image(Arc::new(image))),
                        Err(e) => cache.fail(&task_key, e.to_string()),
                    }
                });
            }
            Err(_) => match read_source_blocking(source).and_then(|bytes| decode_bytes(&bytes)) {
                Ok(image) => self.complete(&key, Resource::Image(Arc::new(image))),
                Err(e) => self.fail(&key, e.to_string()),
            },
        }
        key
    }

    /// Wait until every key is settled or `timeout` expires.
    ///
    /// Keys still pending at the deadline and keys the cache has never
    /// seen are reported as failed.
    pub async fn wait_settled(&self, keys: &[ResourceKey], timeout: Duration) -> Readiness {
        let deadline = tokio::time::Instant::now() + timeout;
        // Subscribe before checking so a settle between the check and the
        // wait is not missed.
        let mut changes = self.generation.subscribe();

        loop {
            if keys
                .iter()
                .all(|key| self.state(key).map_or(true, |state| state.is_settled()))
            {
                break;
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => break,
            }
        }

        let mut readiness = Readiness::default();
        for key in keys {
            if readiness.ready.contains(key) || readiness.failure(key).is_some() {
                continue;
            }
            match self.state(key) {
                Some(ResourceState::Ready(_)) => readiness.ready.push(key.clone()),
                Some(ResourceState::Failed(reason)) => readiness.failed.push((key.clone(), reason)),
                Some(ResourceState::Pending) => readiness.failed.push((
                    key.clone(),
                    format!("not ready after {} ms", timeout.as_millis()),
                )),
                None => readiness
                    .failed
                    .push((key.clone(), "never requested".to_string())),
            }
        }
        readiness
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ResourceCache")
            .field("entries", &entries.len())
            .field("generation", &self.generation())
            .finish()
    }
}

async fn decode_image(source: ImageSource) -> QuotemeResult<RgbaImage> {
    let bytes = match source {
        ImageSource::Bytes { data } => data,
        ImageSource::Path { path } => tokio::fs::read(&path)
            .await
            .map_err(|e| QuotemeError::read(&path, e))?,
    };
    tokio::task::spawn_blocking(move || decode_bytes(&bytes))
        .await
        .map_err(|e| QuotemeError::resource(format!("decoder task failed: {e}")))?
}

fn read_source_blocking(source: &ImageSource) -> QuotemeResult<Vec<u8>> {
    match source {
        ImageSource::Bytes { data } => Ok(data.clone()),
        ImageSource::Path { path } => std::fs::read(path).map_err(|e| QuotemeError::read(path, e)),
    }
}

fn decode_bytes(bytes: &[u8]) -> QuotemeResult<RgbaImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| QuotemeError::resource(format!("cannot decode image: {e}")))?;
    Ok(image.to_rgba8())
}
