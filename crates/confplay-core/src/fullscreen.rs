//! Quick fullscreen
//!
//! Holding the zoom modifier with the pointer over the video window blows the
//! window up to the primary screen; releasing it restores the exact previous
//! frame. The input is level-triggered: every key, modifier or pointer event
//! re-evaluates "held and inside" and the monitor converges on that state.

use crate::{
    context::{MainContext, MonitorScope},
    window::VideoWindow,
    Rect,
};
use tracing::debug;

/// Input state queried on every key/modifier/pointer event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    /// Pointer is over the video window's screen region
    pub pointer_over_video: bool,
    /// Zoom modifier (control) is held
    pub zoom_modifier_held: bool,
}

impl InputSnapshot {
    pub fn wants_quick_fullscreen(&self) -> bool {
        self.pointer_over_video && self.zoom_modifier_held
    }
}

/// Host input monitoring. Monitors deliver events by posting to the context.
pub trait InputMonitors: Send {
    /// Install a key-down/modifier-change monitor; returns its token
    fn add_key_monitor(&mut self, scope: MonitorScope, ctx: &MainContext) -> u64;

    fn remove_key_monitor(&mut self, token: u64) -> bool;

    /// Track pointer movement over `region` of the video view
    fn add_tracking_region(&mut self, region: Rect, ctx: &MainContext) -> u64;

    fn remove_tracking_region(&mut self, token: u64) -> bool;

    fn snapshot(&self) -> InputSnapshot;
}

/// What an update did to the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuickFullscreenTransition {
    Entered { saved: Rect, screen: Rect },
    Restored { frame: Rect },
}

/// Two-state machine: normal ⇄ quick fullscreen
#[derive(Debug, Default)]
pub struct QuickFullscreenMonitor {
    saved_frame: Option<Rect>,
}

impl QuickFullscreenMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_engaged(&self) -> bool {
        self.saved_frame.is_some()
    }

    pub fn saved_frame(&self) -> Option<Rect> {
        self.saved_frame
    }

    /// Converge the window on the requested state
    pub fn update(
        &mut self,
        input: InputSnapshot,
        window: &mut dyn VideoWindow,
    ) -> Option<QuickFullscreenTransition> {
        let wanted = input.wants_quick_fullscreen();
        match (wanted, self.saved_frame) {
            (true, None) => {
                let screen = window.primary_screen_frame()?;
                let saved = window.frame();
                self.saved_frame = Some(saved);
                window.set_frame(screen, false);
                debug!(%saved, %screen, "Quick fullscreen entered");
                Some(QuickFullscreenTransition::Entered { saved, screen })
            }
            (false, Some(frame)) => {
                window.set_frame(frame, false);
                self.saved_frame = None;
                debug!(%frame, "Quick fullscreen restored");
                Some(QuickFullscreenTransition::Restored { frame })
            }
            _ => None,
        }
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::SimWindow;

    const HELD_INSIDE: InputSnapshot = InputSnapshot {
        pointer_over_video: true,
        zoom_modifier_held: true,
    };

    #[test]
    fn test_hold_then_release_restores_exact_frame() {
        let original = Rect::new(120.0, 80.0, 853.0, 480.0);
        let window = SimWindow::new(original);
        let probe = window.probe();
        let mut window: Box<dyn VideoWindow> = Box::new(window);
        let mut monitor = QuickFullscreenMonitor::new();

        let entered = monitor.update(HELD_INSIDE, window.as_mut());
        assert!(matches!(entered, Some(QuickFullscreenTransition::Entered { saved, .. }) if saved == original));
        assert_eq!(window.frame(), probe.snapshot().screen);

        // Level-triggered: repeated held events do nothing
        assert_eq!(monitor.update(HELD_INSIDE, window.as_mut()), None);

        let released = InputSnapshot {
            pointer_over_video: true,
            zoom_modifier_held: false,
        };
        assert_eq!(
            monitor.update(released, window.as_mut()),
            Some(QuickFullscreenTransition::Restored { frame: original })
        );
        assert_eq!(window.frame(), original);
        assert!(!monitor.is_engaged());
        assert!(probe.snapshot().frame_changes.iter().all(|(_, animate)| !animate));
    }

    #[test]
    fn test_pointer_leaving_restores() {
        let original = Rect::new(0.0, 0.0, 640.0, 360.0);
        let mut window: Box<dyn VideoWindow> = Box::new(SimWindow::new(original));
        let mut monitor = QuickFullscreenMonitor::new();

        monitor.update(HELD_INSIDE, window.as_mut());
        let outside = InputSnapshot {
            pointer_over_video: false,
            zoom_modifier_held: true,
        };
        monitor.update(outside, window.as_mut());
        assert_eq!(window.frame(), original);
    }

    #[test]
    fn test_modifier_outside_window_is_ignored() {
        let original = Rect::new(0.0, 0.0, 640.0, 360.0);
        let mut window: Box<dyn VideoWindow> = Box::new(SimWindow::new(original));
        let mut monitor = QuickFullscreenMonitor::new();

        let outside = InputSnapshot {
            pointer_over_video: false,
            zoom_modifier_held: true,
        };
        assert_eq!(monitor.update(outside, window.as_mut()), None);
        assert_eq!(window.frame(), original);
    }
}
