//! Scoped registration of document-level drag listeners.
//!
//! A drag must keep receiving move/end events after the pointer outruns
//! the overlay, so the listeners live on the document, not the element.
//! [`ListenerGuard`] pairs every registration with exactly one removal,
//! whether the drag ends normally, the overlay unmounts, or the owner is
//! dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerScope {
    /// The whole document/window.
    Document,
    /// The overlay element only.
    Overlay,
}

/// Event type a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PointerMove,
    PointerUp,
    PointerLeave,
    TouchMove,
    TouchEnd,
    TouchCancel,
}

/// Handle returned by a hub registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Something that can attach and detach event listeners.
pub trait ListenerHub: Send + Sync {
    /// Attach a listener and return its handle.
    fn add_listener(&self, scope: ListenerScope, kind: ListenerKind) -> ListenerId;

    /// Detach a listener previously returned by `add_listener`.
    fn remove_listener(&self, id: ListenerId);
}

/// Owns a set of registrations and removes them once.
pub struct ListenerGuard {
    hub: Arc<dyn ListenerHub>,
    ids: Vec<ListenerId>,
}

impl ListenerGuard {
    /// Register `kinds` on `scope` and hold them until released.
    pub fn acquire(hub: Arc<dyn ListenerHub>, scope: ListenerScope, kinds: &[ListenerKind]) -> Self {
        let ids = kinds
            .iter()
            .map(|kind| hub.add_listener(scope, *kind))
            .collect();
        Self { hub, ids }
    }

    /// Remove every held registration. Later calls do nothing.
    pub fn release(&mut self) {
        for id in self.ids.drain(..) {
            self.hub.remove_listener(id);
        }
    }

    /// Whether registrations are still held.
    pub fn is_active(&self) -> bool {
        !self.ids.is_empty()
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard").field("ids", &self.ids).finish()
    }
}

/// In-process listener table.
///
/// Used when there is no platform event target (CLI replay, tests). It
/// keeps counters so callers can check that registrations are balanced.
#[derive(Debug, Default)]
pub struct DocumentListeners {
    next_id: AtomicU64,
    active: Mutex<BTreeMap<ListenerId, (ListenerScope, ListenerKind)>>,
    added: AtomicU64,
    removed: AtomicU64,
    stale_removals: AtomicU64,
}

impl DocumentListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle usable as a `ListenerHub`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Listeners currently attached.
    pub fn active_count(&self) -> usize {
        self.active.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Attached listeners of one scope.
    pub fn active_in(&self, scope: ListenerScope) -> Vec<ListenerKind> {
        self.active
            .lock()
            .map(|map| {
                map.values()
                    .filter(|(s, _)| *s == scope)
                    .map(|(_, kind)| *kind)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total registrations since creation.
    pub fn added(&self) -> u64 {
        self.added.load(Ordering::SeqCst)
    }

    /// Total successful removals since creation.
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::SeqCst)
    }

    /// Removals of handles that were not attached.
    pub fn stale_removals(&self) -> u64 {
        self.stale_removals.load(Ordering::SeqCst)
    }
}

impl ListenerHub for DocumentListeners {
    fn add_listener(&self, scope: ListenerScope, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut map) = self.active.lock() {
            map.insert(id, (scope, kind));
        }
        self.added.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(?id, ?scope, ?kind, "Listener attached");
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let removed = self
            .active
            .lock()
            .map(|mut map| map.remove(&id).is_some())
            .unwrap_or(false);
        if removed {
            self.removed.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(?id, "Listener detached");
        } else {
            self.stale_removals.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(?id, "Removal of a listener that is not attached");
        }
    }
}
