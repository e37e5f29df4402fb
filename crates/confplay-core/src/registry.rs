//! Observer registry
//!
//! Every callback or monitor the controller installs is recorded here as an
//! [`ObserverHandle`] and released from exactly one place, the teardown
//! path. Releasing is delegated to a [`ReleaseObserver`] that knows how to
//! undo each kind of registration.

use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Kinds of releasable registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObserverKind {
    PeriodicTime,
    BoundaryTime,
    KeyMonitorLocal,
    KeyMonitorGlobal,
    Notification,
    TrackingRegion,
    /// Float-on-top playback-state sampler
    PlaybackState,
}

impl ObserverKind {
    /// Kinds of which at most one handle may be live at a time
    pub fn is_singleton(&self) -> bool {
        !matches!(self, ObserverKind::Notification)
    }
}

/// Opaque token for one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverHandle {
    pub kind: ObserverKind,
    pub token: u64,
}

impl ObserverHandle {
    pub fn new(kind: ObserverKind, token: u64) -> Self {
        Self { kind, token }
    }
}

/// Undoes a registration of any kind
pub trait ReleaseObserver {
    fn release(&mut self, handle: ObserverHandle);
}

/// Arena of live observer handles
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    handles: BTreeSet<ObserverHandle>,
    released: u64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle.
    ///
    /// For singleton kinds a previously tracked handle of the same kind is
    /// displaced and returned; the caller must release it. Tracking the same
    /// handle twice is a no-op.
    #[must_use = "a displaced handle must be released"]
    pub fn track(&mut self, handle: ObserverHandle) -> Option<ObserverHandle> {
        if self.handles.contains(&handle) {
            warn!(?handle, "Observer already tracked");
            return None;
        }

        let displaced = if handle.kind.is_singleton() {
            let previous = self.handles.iter().find(|h| h.kind == handle.kind).copied();
            if let Some(previous) = previous {
                self.handles.remove(&previous);
            }
            previous
        } else {
            None
        };

        debug!(?handle, replaced = displaced.is_some(), "Observer tracked");
        self.handles.insert(handle);
        displaced
    }

    /// Release every tracked handle and clear the record.
    ///
    /// Returns the number of handles released; a second call releases none.
    pub fn release_all<R: ReleaseObserver + ?Sized>(&mut self, releaser: &mut R) -> usize {
        let handles = std::mem::take(&mut self.handles);
        let count = handles.len();
        for handle in handles {
            releaser.release(handle);
        }
        self.released += count as u64;
        if count > 0 {
            debug!(count, "Released observers");
        }
        count
    }

    pub fn contains(&self, handle: &ObserverHandle) -> bool {
        self.handles.contains(handle)
    }

    pub fn count_of(&self, kind: ObserverKind) -> usize {
        self.handles.iter().filter(|h| h.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Total handles released over the registry's lifetime
    pub fn released_total(&self) -> u64 {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<ObserverHandle>);

    impl ReleaseObserver for Recorder {
        fn release(&mut self, handle: ObserverHandle) {
            self.0.push(handle);
        }
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let mut registry = ObserverRegistry::new();
        assert!(registry.track(ObserverHandle::new(ObserverKind::PeriodicTime, 1)).is_none());
        assert!(registry.track(ObserverHandle::new(ObserverKind::Notification, 2)).is_none());
        assert!(registry.track(ObserverHandle::new(ObserverKind::Notification, 3)).is_none());

        let mut recorder = Recorder::default();
        assert_eq!(registry.release_all(&mut recorder), 3);
        assert_eq!(registry.release_all(&mut recorder), 0);
        assert_eq!(recorder.0.len(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.released_total(), 3);
    }

    #[test]
    fn test_singleton_kinds_displace() {
        let mut registry = ObserverRegistry::new();
        let first = ObserverHandle::new(ObserverKind::BoundaryTime, 1);
        let second = ObserverHandle::new(ObserverKind::BoundaryTime, 2);

        assert!(registry.track(first).is_none());
        assert_eq!(registry.track(second), Some(first));
        assert_eq!(registry.count_of(ObserverKind::BoundaryTime), 1);
        assert!(registry.contains(&second));
    }

    #[test]
    fn test_duplicate_track_is_ignored() {
        let mut registry = ObserverRegistry::new();
        let handle = ObserverHandle::new(ObserverKind::KeyMonitorGlobal, 7);
        assert!(registry.track(handle).is_none());
        assert!(registry.track(handle).is_none());

        let mut recorder = Recorder::default();
        registry.release_all(&mut recorder);
        assert_eq!(recorder.0, vec![handle]);
    }
}
