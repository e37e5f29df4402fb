//! Process-wide notification center
//!
//! Collaborators (the live-event feed, the app shell) post [`Notification`]s
//! here. A controller subscribes with its [`MainContext`] so deliveries land
//! on its main queue; each subscription is a releasable observer.

use crate::{
    context::{MainContext, MainEvent},
    registry::{ObserverHandle, ObserverKind},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Notification kinds, used as subscription keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    LiveEventTitleAvailable,
    LiveEventWillStartPlaying,
}

/// Posted notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A live event published its title
    LiveEventTitleAvailable(String),
    /// A live broadcast is about to start
    LiveEventWillStartPlaying,
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::LiveEventTitleAvailable(_) => NotificationKind::LiveEventTitleAvailable,
            Notification::LiveEventWillStartPlaying => NotificationKind::LiveEventWillStartPlaying,
        }
    }
}

struct Subscription {
    kind: NotificationKind,
    ctx: MainContext,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscriptions: HashMap<u64, Subscription>,
}

/// Cloneable pub/sub hub
#[derive(Clone, Default)]
pub struct NotificationCenter {
    inner: Arc<Mutex<Inner>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `kind` notifications to `ctx`
    pub fn subscribe(&self, kind: NotificationKind, ctx: &MainContext) -> ObserverHandle {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscriptions.insert(
            id,
            Subscription {
                kind,
                ctx: ctx.clone(),
            },
        );
        debug!(id, ?kind, "Notification subscription added");
        ObserverHandle::new(ObserverKind::Notification, id)
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn unsubscribe(&self, handle: ObserverHandle) -> bool {
        let removed = self.lock().subscriptions.remove(&handle.token).is_some();
        if removed {
            debug!(id = handle.token, "Notification subscription removed");
        }
        removed
    }

    /// Post to every subscriber of the notification's kind
    pub fn post(&self, notification: Notification) -> usize {
        let kind = notification.kind();
        let targets: Vec<MainContext> = self
            .lock()
            .subscriptions
            .values()
            .filter(|s| s.kind == kind)
            .map(|s| s.ctx.clone())
            .collect();

        trace!(?kind, subscribers = targets.len(), "Posting notification");
        for ctx in &targets {
            ctx.post(MainEvent::Notification(notification.clone()));
        }
        targets.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::main_context;

    #[test]
    fn test_delivery_by_kind() {
        let center = NotificationCenter::new();
        let (ctx, mut queue) = main_context();

        center.subscribe(NotificationKind::LiveEventTitleAvailable, &ctx);
        assert_eq!(center.post(Notification::LiveEventWillStartPlaying), 0);
        assert_eq!(
            center.post(Notification::LiveEventTitleAvailable("Keynote".to_string())),
            1
        );

        assert_eq!(
            queue.try_recv(),
            Some(MainEvent::Notification(Notification::LiveEventTitleAvailable(
                "Keynote".to_string()
            )))
        );
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let center = NotificationCenter::new();
        let (ctx, mut queue) = main_context();

        let handle = center.subscribe(NotificationKind::LiveEventWillStartPlaying, &ctx);
        assert!(center.unsubscribe(handle));
        assert!(!center.unsubscribe(handle));
        assert_eq!(center.subscriber_count(), 0);

        center.post(Notification::LiveEventWillStartPlaying);
        assert_eq!(queue.try_recv(), None);
    }
}
