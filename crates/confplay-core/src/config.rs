//! Controller configuration, user preferences and launch arguments
//!
//! `PlayerConfig` is fixed for the lifetime of a controller. `Preferences`
//! is process-wide user state; it is handed to components explicitly as a
//! [`SharedPreferences`] handle instead of being looked up globally.

use crate::{Error, FloatOnTopStyle, PlatformVersion, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Window controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Cadence of the resume-point writer (seconds of playback)
    pub periodic_interval_secs: f64,
    /// Playback-state sampling period for float-on-top (milliseconds)
    pub playback_sample_ms: u64,
    /// How often the engine clock is sampled for time observers (milliseconds)
    pub clock_resolution_ms: u64,
    /// Upper bound on asset key loading; `None` waits forever
    pub asset_load_timeout_ms: Option<u64>,
    /// First platform version offering the enhanced surface and stream
    pub enhanced_min_version: PlatformVersion,
    /// Prefix used in recording window titles
    pub catalog_title_prefix: String,
    /// Step for relative jumps from arrow keys (seconds)
    pub jump_step_secs: f64,
    /// Timescale used when seeking to the resume point
    pub resume_timescale: i32,
    /// Timescale used for transcript-driven seeks
    pub transcript_timescale: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            periodic_interval_secs: 5.0,
            playback_sample_ms: 1000,
            clock_resolution_ms: 250,
            asset_load_timeout_ms: Some(30_000),
            enhanced_min_version: PlatformVersion::new(10, 11, 0),
            catalog_title_prefix: "WWDC".to_string(),
            jump_step_secs: 5.0,
            resume_timescale: 1,
            transcript_timescale: 30,
        }
    }
}

impl PlayerConfig {
    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs_f64(self.periodic_interval_secs)
    }

    pub fn playback_sample_period(&self) -> Duration {
        Duration::from_millis(self.playback_sample_ms)
    }

    pub fn clock_resolution(&self) -> Duration {
        Duration::from_millis(self.clock_resolution_ms)
    }

    pub fn asset_load_timeout(&self) -> Option<Duration> {
        self.asset_load_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values the time observers cannot work with
    pub fn validate(&self) -> Result<()> {
        let interval = self.periodic_interval_secs;
        if !(interval > 0.0 && Duration::try_from_secs_f64(interval).is_ok()) {
            return Err(Error::InvalidConfig(format!(
                "periodic_interval_secs must be a positive duration, got {}",
                self.periodic_interval_secs
            )));
        }
        if self.playback_sample_ms == 0 || self.clock_resolution_ms == 0 {
            return Err(Error::InvalidConfig(
                "sampling periods must be non-zero".to_string(),
            ));
        }
        if self.resume_timescale <= 0 || self.transcript_timescale <= 0 {
            return Err(Error::InvalidConfig("timescales must be positive".to_string()));
        }
        Ok(())
    }
}

/// Persisted user preferences consumed by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub float_on_top_style: FloatOnTopStyle,
    /// Last chosen window scale as a fraction of the video size; 1.0 means
    /// "fill the screen"
    pub last_video_window_scale: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            float_on_top_style: FloatOnTopStyle::Never,
            last_video_window_scale: 1.0,
        }
    }
}

/// Cloneable handle to process-wide preferences, optionally file-backed
#[derive(Debug, Clone, Default)]
pub struct SharedPreferences {
    inner: Arc<RwLock<Preferences>>,
    path: Option<Arc<PathBuf>>,
}

impl SharedPreferences {
    /// In-memory preferences
    pub fn new(prefs: Preferences) -> Self {
        Self {
            inner: Arc::new(RwLock::new(prefs)),
            path: None,
        }
    }

    /// Load preferences from a JSON file; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let prefs = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No preferences file, using defaults");
                Preferences::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(prefs)),
            path: Some(Arc::new(path.to_path_buf())),
        })
    }

    /// Write preferences back to their file, if any
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Preferences {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn float_on_top_style(&self) -> FloatOnTopStyle {
        self.snapshot().float_on_top_style
    }

    pub fn set_float_on_top_style(&self, style: FloatOnTopStyle) {
        self.update(|p| p.float_on_top_style = style);
    }

    pub fn last_video_window_scale(&self) -> f64 {
        self.snapshot().last_video_window_scale
    }

    pub fn set_last_video_window_scale(&self, scale: f64) {
        self.update(|p| p.last_video_window_scale = scale);
    }

    fn update(&self, f: impl FnOnce(&mut Preferences)) {
        match self.inner.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
        if let Err(e) = self.save() {
            warn!(error = %e, "Failed to persist preferences");
        }
    }
}

/// Switches read from the process launch arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchArgs {
    /// Start every player muted (automation hook)
    pub zero_volume: bool,
}

impl LaunchArgs {
    pub const ZERO_VOLUME: &'static str = "zerovolume";

    pub fn from_env() -> Self {
        Self::from_args(std::env::args())
    }

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            zero_volume: args.into_iter().any(|a| a.as_ref() == Self::ZERO_VOLUME),
        }
    }
}
