//! Lazily populated emote and badge cache.
//!
//! Every [`AssetKey`] owns at most one entry. The first [`AssetCache::request`]
//! inserts a `Pending` entry and hands the fetch to an [`AssetLoader`]; every
//! later request sees the same entry until the loader reports back through a
//! [`FetchCompletion`]. Failed loads stay failed until [`AssetCache::invalidate`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tracing::{debug, warn};

use crate::asset::{AssetFrameSet, AssetKey, AssetKind};

/// Observable state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Pending { generation: u64 },
    Ready(Arc<AssetFrameSet>),
    Failed,
}

impl CacheEntry {
    fn state(&self) -> CacheState {
        match self {
            Self::Pending { .. } => CacheState::Pending,
            Self::Ready(_) => CacheState::Ready,
            Self::Failed => CacheState::Failed,
        }
    }
}

/// One fetch the cache wants performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub key: AssetKey,
    pub kind: AssetKind,
}

/// External image-loading collaborator.
///
/// `fetch` must not block on the network; it schedules the work and reports
/// the outcome through the completion, from any thread.
pub trait AssetLoader: Send + Sync {
    fn fetch(&self, request: FetchRequest, completion: FetchCompletion);
}

/// Callback handle bound to the entry that scheduled the fetch.
///
/// Completing a fetch whose entry was invalidated or replaced since is a no-op.
pub struct FetchCompletion {
    cache: AssetCache,
    key: AssetKey,
    generation: u64,
}

impl FetchCompletion {
    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    pub fn loaded(self, frames: AssetFrameSet) {
        self.cache
            .complete(&self.key, Some(self.generation), Some(frames));
    }

    pub fn failed(self) {
        self.cache.complete(&self.key, Some(self.generation), None);
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<AssetKey, CacheEntry>,
    next_generation: u64,
}

/// Shared handle to one connection session's asset cache.
#[derive(Clone)]
pub struct AssetCache {
    inner: Arc<Mutex<CacheInner>>,
    loader: Arc<dyn AssetLoader>,
}

impl AssetCache {
    pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            loader,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // Entries are only ever replaced whole, so a poisoned map is still consistent.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the current state, scheduling a fetch if the key is unknown.
    pub fn request(&self, key: &AssetKey, kind: AssetKind) -> CacheState {
        let generation = {
            let mut inner = self.lock();
            if let Some(entry) = inner.entries.get(key) {
                return entry.state();
            }
            inner.next_generation += 1;
            let generation = inner.next_generation;
            inner
                .entries
                .insert(key.clone(), CacheEntry::Pending { generation });
            generation
        };

        debug!(key = %key, ?kind, "scheduling asset fetch");
        self.loader.fetch(
            FetchRequest {
                key: key.clone(),
                kind,
            },
            FetchCompletion {
                cache: self.clone(),
                key: key.clone(),
                generation,
            },
        );
        CacheState::Pending
    }

    pub fn state(&self, key: &AssetKey) -> Option<CacheState> {
        self.lock().entries.get(key).map(CacheEntry::state)
    }

    /// The frame set, only once the entry is `Ready`.
    pub fn resolve(&self, key: &AssetKey) -> Option<Arc<AssetFrameSet>> {
        match self.lock().entries.get(key) {
            Some(CacheEntry::Ready(frames)) => Some(Arc::clone(frames)),
            _ => None,
        }
    }

    /// Drops the entry so the next `request` fetches again.
    pub fn invalidate(&self, key: &AssetKey) {
        if self.lock().entries.remove(key).is_some() {
            debug!(key = %key, "asset invalidated");
        }
    }

    /// Active frame of a `Ready` asset after `elapsed` of playback.
    pub fn current_frame(&self, key: &AssetKey, elapsed: Duration) -> Option<usize> {
        match self.lock().entries.get(key) {
            Some(CacheEntry::Ready(frames)) => Some(frames.frame_at(elapsed)),
            _ => None,
        }
    }

    /// Moves a `Pending` entry to `Ready`, whichever fetch produced it.
    pub fn on_loaded(&self, key: &AssetKey, frames: AssetFrameSet) {
        self.complete(key, None, Some(frames));
    }

    /// Moves a `Pending` entry to `Failed`.
    pub fn on_failed(&self, key: &AssetKey) {
        self.complete(key, None, None);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Forgets every entry. In-flight fetches complete into nothing.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn complete(&self, key: &AssetKey, generation: Option<u64>, frames: Option<AssetFrameSet>) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(key) else {
            debug!(key = %key, "dropping completion for evicted asset");
            return;
        };
        let CacheEntry::Pending {
            generation: pending,
        } = entry
        else {
            debug!(key = %key, "dropping completion for settled asset");
            return;
        };
        if generation.is_some_and(|generation| generation != *pending) {
            debug!(key = %key, "dropping stale completion");
            return;
        }
        *entry = match frames {
            Some(frames) => CacheEntry::Ready(Arc::new(frames)),
            None => {
                warn!(key = %key, "asset load failed");
                CacheEntry::Failed
            }
        };
    }
}
