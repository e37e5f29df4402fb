//! Video window seam and video-driven window sizing

use crate::{config::SharedPreferences, Rect, RenderSurface, Size, WindowLevel};
use tracing::{debug, info};

/// Scale values closer than this to 1.0 mean "fill the screen"
const FILL_SCALE_EPSILON: f64 = 1e-3;

/// The window hosting the video. Only called from the main context.
pub trait VideoWindow: Send {
    fn set_title(&mut self, title: &str);

    fn set_level(&mut self, level: WindowLevel);

    fn frame(&self) -> Rect;

    fn set_frame(&mut self, frame: Rect, animate: bool);

    /// Frame of the primary screen, if any screen is attached
    fn primary_screen_frame(&self) -> Option<Rect>;

    fn set_aspect_ratio(&mut self, ratio: Size);

    /// Resize around a video size, optionally clamped to the screen
    fn size_to_fit_video(&mut self, size: Size, ignoring_screen_size: bool, animate: bool);

    /// Show or hide the loading indicator
    fn set_loading(&mut self, loading: bool);

    fn attach_surface(&mut self, surface: RenderSurface);

    /// Bounds of the video view, in window coordinates
    fn video_bounds(&self) -> Rect;
}

/// Sizes the window from the video's natural size and the saved scale
#[derive(Debug, Clone)]
pub struct WindowSizer {
    prefs: SharedPreferences,
    natural_size: Option<Size>,
}

impl WindowSizer {
    pub fn new(prefs: SharedPreferences) -> Self {
        Self {
            prefs,
            natural_size: None,
        }
    }

    pub fn natural_size(&self) -> Option<Size> {
        self.natural_size
    }

    /// Apply aspect ratio and saved scale from the first video track.
    ///
    /// Returns false (and leaves the window alone) without a usable track.
    pub fn setup(&mut self, window: &mut dyn VideoWindow, video_tracks: &[Size]) -> bool {
        let Some(size) = video_tracks.first().copied().filter(|s| !s.is_empty()) else {
            debug!(tracks = video_tracks.len(), "No video track, skipping window sizing");
            return false;
        };

        self.natural_size = Some(size);
        window.set_aspect_ratio(size);

        let scale = self.prefs.last_video_window_scale();
        if (scale - 1.0).abs() > FILL_SCALE_EPSILON {
            self.size_to(window, scale);
        } else {
            self.size_to_fill(window);
        }
        info!(width = size.width, height = size.height, scale, "Window sized to video");
        true
    }

    /// Fill the screen without cropping; resets the saved scale
    pub fn size_to_fill(&mut self, window: &mut dyn VideoWindow) {
        let Some(size) = self.natural_size else {
            return;
        };
        self.prefs.set_last_video_window_scale(1.0);
        window.size_to_fit_video(size, false, false);
    }

    /// Resize to a fraction of the video size; saves the fraction
    pub fn size_to(&mut self, window: &mut dyn VideoWindow, fraction: f64) {
        let Some(size) = self.natural_size else {
            return;
        };
        self.prefs.set_last_video_window_scale(fraction);
        window.size_to_fit_video(size.scaled(fraction), true, true);
    }
}
