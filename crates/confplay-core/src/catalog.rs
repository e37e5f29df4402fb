//! Catalog collaborators: recorded sessions and live events

use crate::PlatformVersion;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A recorded session's resumable state, owned by the session catalog.
///
/// The controller reads the position once at load and writes progress and
/// position on every periodic tick.
pub trait ResumableSession: Send {
    fn title(&self) -> String;

    fn year(&self) -> u32;

    /// Last persisted playback position (seconds)
    fn current_position(&self) -> f64;

    /// Persist progress (fraction of duration) and position (seconds)
    fn record_progress(&mut self, progress: f64, position: f64);
}

/// Plain catalog record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    pub year: u32,
    pub title: String,
    /// Fraction of the session watched, in [0, 1]
    pub progress: f64,
    /// Resume point in seconds
    pub current_position: f64,
}

impl SessionRecord {
    pub fn new(year: u32, title: impl Into<String>) -> Self {
        Self {
            year,
            title: title.into(),
            ..Default::default()
        }
    }
}

impl ResumableSession for SessionRecord {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn year(&self) -> u32 {
        self.year
    }

    fn current_position(&self) -> f64 {
        self.current_position
    }

    fn record_progress(&mut self, progress: f64, position: f64) {
        self.progress = progress.clamp(0.0, 1.0);
        self.current_position = position.max(0.0);
    }
}

/// A live broadcast with up to two candidate stream URLs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiveEvent {
    pub title: String,
    /// Primary stream
    pub stream: Option<String>,
    /// Enhanced stream for newer platforms
    pub stream2: Option<String>,
}

impl LiveEvent {
    /// Pick the stream for this platform: the enhanced one when available
    /// and the platform is at least `threshold`, the primary otherwise
    pub fn appropriate_url(&self, platform: PlatformVersion, threshold: PlatformVersion) -> Option<&str> {
        let chosen = match (&self.stream2, platform >= threshold) {
            (Some(enhanced), true) => Some(enhanced.as_str()),
            _ => self.stream.as_deref(),
        };
        debug!(%platform, %threshold, url = ?chosen, "Live stream selected");
        chosen
    }
}

/// What a window controller plays
pub enum PlaybackContent {
    Recording {
        session: Box<dyn ResumableSession>,
        url: String,
    },
    Live(LiveEvent),
}

impl PlaybackContent {
    pub fn is_live(&self) -> bool {
        matches!(self, PlaybackContent::Live(_))
    }
}

impl std::fmt::Debug for PlaybackContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackContent::Recording { session, url } => f
                .debug_struct("Recording")
                .field("title", &session.title())
                .field("url", url)
                .finish(),
            PlaybackContent::Live(event) => f.debug_tuple("Live").field(event).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(stream2: Option<&str>) -> LiveEvent {
        LiveEvent {
            title: "Keynote".to_string(),
            stream: Some("https://live.example.com/hls.m3u8".to_string()),
            stream2: stream2.map(str::to_string),
        }
    }

    #[test]
    fn test_enhanced_stream_on_new_platform() {
        let threshold = PlatformVersion::new(10, 11, 0);
        let e = event(Some("https://live.example.com/hls2.m3u8"));
        assert_eq!(
            e.appropriate_url(PlatformVersion::new(10, 11, 0), threshold),
            Some("https://live.example.com/hls2.m3u8")
        );
        assert_eq!(
            e.appropriate_url(PlatformVersion::new(10, 10, 5), threshold),
            Some("https://live.example.com/hls.m3u8")
        );
    }

    #[test]
    fn test_primary_when_no_enhanced_stream() {
        let threshold = PlatformVersion::new(10, 11, 0);
        let e = event(None);
        assert_eq!(
            e.appropriate_url(PlatformVersion::new(12, 0, 0), threshold),
            Some("https://live.example.com/hls.m3u8")
        );
    }

    #[test]
    fn test_record_progress_clamps() {
        let mut record = SessionRecord::new(2015, "What's New in Swift");
        record.record_progress(1.2, -4.0);
        assert_eq!(record.progress, 1.0);
        assert_eq!(record.current_position, 0.0);
    }
}
