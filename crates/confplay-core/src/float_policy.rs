//! Float-on-top policy
//!
//! | Preference   | Playing | Level   |
//! |--------------|---------|---------|
//! | Never        | any     | normal  |
//! | Always       | any     | topmost |
//! | WhilePlaying | false   | normal  |
//! | WhilePlaying | true    | topmost |
//!
//! While the preference is `WhilePlaying` a sampler posts
//! [`MainEvent::PlaybackSample`] at a fixed period so the level follows the
//! player's rate. The sampler runs exactly while the preference is
//! `WhilePlaying`.

use crate::{
    config::SharedPreferences,
    context::{MainContext, MainEvent},
    registry::{ObserverHandle, ObserverKind},
    window::VideoWindow,
    FloatOnTopStyle, WindowLevel,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Resolve the window level; `None` when it depends on a player that does
/// not exist yet
pub fn window_level(style: FloatOnTopStyle, is_playing: Option<bool>) -> Option<WindowLevel> {
    match (style, is_playing) {
        (FloatOnTopStyle::Never, _) => Some(WindowLevel::Normal),
        (FloatOnTopStyle::Always, _) => Some(WindowLevel::TopMost),
        (FloatOnTopStyle::WhilePlaying, Some(true)) => Some(WindowLevel::TopMost),
        (FloatOnTopStyle::WhilePlaying, Some(false)) => Some(WindowLevel::Normal),
        (FloatOnTopStyle::WhilePlaying, None) => None,
    }
}

/// Periodic "is playing" sampler with edge detection
#[derive(Debug)]
pub struct PlaybackStateSampler {
    period: Duration,
    task: Option<JoinHandle<()>>,
    last_playing: Option<bool>,
    disposed: bool,
}

impl PlaybackStateSampler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            task: None,
            last_playing: None,
            disposed: false,
        }
    }

    /// Start sampling; no-op when running or disposed
    pub fn start(&mut self, ctx: &MainContext) {
        if self.task.is_some() || self.disposed {
            return;
        }
        let ctx = ctx.clone();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if ctx.is_closed() {
                    break;
                }
                ctx.post(MainEvent::PlaybackSample);
            }
        }));
        debug!(?period, "Playback state sampling started");
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Playback state sampling stopped");
        }
    }

    pub fn is_observing(&self) -> bool {
        self.task.is_some()
    }

    /// Record a sample; returns the new state when it changed
    pub fn observe(&mut self, is_playing: bool) -> Option<bool> {
        if self.last_playing == Some(is_playing) {
            return None;
        }
        self.last_playing = Some(is_playing);
        Some(is_playing)
    }

    /// Stop for good; later `start` calls are ignored
    pub fn dispose(&mut self) {
        self.stop();
        self.disposed = true;
    }
}

impl Drop for PlaybackStateSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Derives the window level from the preference and the playing signal
#[derive(Debug)]
pub struct FloatPolicyEngine {
    prefs: SharedPreferences,
    sampler: PlaybackStateSampler,
}

impl FloatPolicyEngine {
    pub fn new(prefs: SharedPreferences, sample_period: Duration) -> Self {
        Self {
            prefs,
            sampler: PlaybackStateSampler::new(sample_period),
        }
    }

    pub fn style(&self) -> FloatOnTopStyle {
        self.prefs.float_on_top_style()
    }

    /// Handle under which the sampler is tracked
    pub fn sampler_handle(&self) -> ObserverHandle {
        ObserverHandle::new(ObserverKind::PlaybackState, 0)
    }

    /// Set the window level for the current preference
    pub fn apply(&self, window: &mut dyn VideoWindow, is_playing: Option<bool>) {
        if let Some(level) = window_level(self.style(), is_playing) {
            window.set_level(level);
        }
    }

    /// Change the preference and start/stop the sampler to match
    pub fn set_style(&mut self, style: FloatOnTopStyle, ctx: &MainContext) {
        info!(style = %style, "Float-on-top preference changed");
        self.prefs.set_float_on_top_style(style);
        self.sync_sampler(ctx);
    }

    /// Start the sampler if the preference wants it (periodic refresh)
    pub fn refresh(&mut self, ctx: &MainContext) {
        if self.style() == FloatOnTopStyle::WhilePlaying {
            self.sampler.start(ctx);
        }
    }

    fn sync_sampler(&mut self, ctx: &MainContext) {
        if self.style() == FloatOnTopStyle::WhilePlaying {
            self.sampler.start(ctx);
        } else {
            self.sampler.stop();
        }
    }

    /// Feed a playing sample; returns the new state on a transition
    pub fn observe(&mut self, is_playing: bool) -> Option<bool> {
        self.sampler.observe(is_playing)
    }

    pub fn is_observing(&self) -> bool {
        self.sampler.is_observing()
    }

    pub fn dispose(&mut self) {
        self.sampler.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::main_context;

    #[test]
    fn test_policy_table() {
        use FloatOnTopStyle::*;
        use WindowLevel::*;

        let cases = [
            (Never, Some(false), Some(Normal)),
            (Never, Some(true), Some(Normal)),
            (Always, Some(false), Some(TopMost)),
            (Always, Some(true), Some(TopMost)),
            (WhilePlaying, Some(false), Some(Normal)),
            (WhilePlaying, Some(true), Some(TopMost)),
            (WhilePlaying, None, None),
            (Always, None, Some(TopMost)),
        ];
        for (style, playing, expected) in cases {
            assert_eq!(window_level(style, playing), expected, "{style} / {playing:?}");
        }
    }

    #[tokio::test]
    async fn test_sampler_follows_preference() {
        let (ctx, _queue) = main_context();
        let prefs = SharedPreferences::default();
        let mut engine = FloatPolicyEngine::new(prefs.clone(), Duration::from_millis(10));

        engine.refresh(&ctx);
        assert!(!engine.is_observing());

        engine.set_style(FloatOnTopStyle::WhilePlaying, &ctx);
        assert!(engine.is_observing());
        assert_eq!(prefs.float_on_top_style(), FloatOnTopStyle::WhilePlaying);

        engine.set_style(FloatOnTopStyle::Always, &ctx);
        assert!(!engine.is_observing());

        engine.set_style(FloatOnTopStyle::WhilePlaying, &ctx);
        engine.dispose();
        assert!(!engine.is_observing());
        engine.refresh(&ctx);
        assert!(!engine.is_observing());
    }

    #[tokio::test]
    async fn test_sampler_posts_samples() {
        let (ctx, mut queue) = main_context();
        let mut sampler = PlaybackStateSampler::new(Duration::from_millis(5));
        sampler.start(&ctx);
        assert_eq!(queue.recv().await, Some(MainEvent::PlaybackSample));
    }

    #[test]
    fn test_observe_reports_transitions_only() {
        let mut sampler = PlaybackStateSampler::new(Duration::from_secs(1));
        assert_eq!(sampler.observe(false), Some(false));
        assert_eq!(sampler.observe(false), None);
        assert_eq!(sampler.observe(true), Some(true));
        assert_eq!(sampler.observe(true), None);
    }
}
