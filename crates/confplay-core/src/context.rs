//! Main scheduling context
//!
//! All controller state lives on one logical context. Background work (asset
//! key loading, status watching, timers, global input) never touches that
//! state directly: it posts a [`MainEvent`] through a [`MainContext`] and the
//! controller applies it when it drains its [`MainQueue`].

use crate::{
    notify::Notification, transcript::TranscriptEvent, AssetReadiness, FloatOnTopStyle,
    ItemStatus, MediaTime,
};
use tokio::sync::mpsc;
use tracing::trace;

/// Scope an input monitor was installed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorScope {
    /// Events delivered while the application has focus
    Local,
    /// Events delivered regardless of focus
    Global,
}

/// Key-down or modifier-change event from an input monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub scope: MonitorScope,
    pub key: Key,
}

/// Keys the controller reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    LeftArrow,
    RightArrow,
    /// Modifier flags changed
    Modifiers,
    Other(u16),
}

impl Key {
    /// Map a hardware key code
    pub fn from_code(code: u16) -> Self {
        match code {
            123 => Key::LeftArrow,
            124 => Key::RightArrow,
            other => Key::Other(other),
        }
    }
}

/// User-initiated actions (menu items, shortcuts)
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    SetRate(f32),
    SetFloatOnTop(FloatOnTopStyle),
    JumpBy(f64),
    SizeToFill,
    SizeToHalf,
    SizeToQuarter,
    ShowTranscript,
}

/// Everything the controller reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum MainEvent {
    /// Asset key loading finished (or failed, or timed out)
    AssetLoaded(AssetReadiness),
    /// Live player item status changed
    ItemStatus(ItemStatus),
    /// Engine clock sample is due
    ClockTick,
    /// Periodic time observer fired
    PeriodicTick(MediaTime),
    /// Boundary time observer fired at the crossing time
    BoundaryCrossed(MediaTime),
    /// Playback-state sample is due
    PlaybackSample,
    Key(KeyEvent),
    PointerMoved,
    WindowResized,
    Notification(Notification),
    Transcript(TranscriptEvent),
    Command(Command),
    WindowWillClose,
}

/// Cloneable handle for posting work onto the main context
#[derive(Debug, Clone)]
pub struct MainContext {
    tx: mpsc::UnboundedSender<MainEvent>,
}

impl MainContext {
    /// Post an event; silently dropped once the controller is gone
    pub fn post(&self, event: MainEvent) {
        if self.tx.send(event).is_err() {
            trace!("Main queue closed, event dropped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of the main context, owned by the controller
#[derive(Debug)]
pub struct MainQueue {
    rx: mpsc::UnboundedReceiver<MainEvent>,
}

impl MainQueue {
    pub async fn recv(&mut self) -> Option<MainEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<MainEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected context/queue pair
pub fn main_context() -> (MainContext, MainQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainContext { tx }, MainQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_post_order() {
        let (ctx, mut queue) = main_context();
        ctx.post(MainEvent::ClockTick);
        ctx.post(MainEvent::PointerMoved);

        assert_eq!(queue.try_recv(), Some(MainEvent::ClockTick));
        assert_eq!(queue.try_recv(), Some(MainEvent::PointerMoved));
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn test_post_after_queue_dropped_is_harmless() {
        let (ctx, queue) = main_context();
        drop(queue);
        assert!(ctx.is_closed());
        ctx.post(MainEvent::ClockTick);
    }

    #[test]
    fn test_arrow_key_codes() {
        assert_eq!(Key::from_code(123), Key::LeftArrow);
        assert_eq!(Key::from_code(124), Key::RightArrow);
        assert_eq!(Key::from_code(49), Key::Other(49));
    }
}
