//! Core types for Confplay

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a video window controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub Uuid);

impl WindowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rational media timestamp: `value / timescale` seconds.
///
/// The timescale is preserved across relative jumps so a seek lands on the
/// same grid the engine reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime { value: 0, timescale: 1 };

    /// Build a time from seconds on the given timescale, rounding to the
    /// nearest tick. Non-positive timescales fall back to 1.
    pub fn from_seconds(seconds: f64, timescale: i32) -> Self {
        let timescale = timescale.max(1);
        let value = if seconds.is_finite() {
            (seconds * f64::from(timescale)).round() as i64
        } else {
            0
        };
        Self { value, timescale }
    }

    /// Time in seconds
    pub fn seconds(&self) -> f64 {
        self.value as f64 / f64::from(self.timescale.max(1))
    }

    /// Shift by `delta` seconds, keeping this time's timescale
    pub fn offset_by(&self, delta: f64) -> Self {
        Self::from_seconds(self.seconds() + delta, self.timescale)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for MediaTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.seconds())
    }
}

/// Width/height pair in points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

/// Window or screen rectangle in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Window z-order level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowLevel {
    /// Regular application window level
    Normal,
    /// Above other windows (main menu level)
    TopMost,
}

/// Float-on-top preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatOnTopStyle {
    #[default]
    Never,
    Always,
    WhilePlaying,
}

impl std::fmt::Display for FloatOnTopStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FloatOnTopStyle::Never => write!(f, "never"),
            FloatOnTopStyle::Always => write!(f, "always"),
            FloatOnTopStyle::WhilePlaying => write!(f, "while_playing"),
        }
    }
}

impl std::str::FromStr for FloatOnTopStyle {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "never" => Ok(FloatOnTopStyle::Never),
            "always" => Ok(FloatOnTopStyle::Always),
            "while_playing" | "whileplaying" => Ok(FloatOnTopStyle::WhilePlaying),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown float-on-top style: {other}"
            ))),
        }
    }
}

/// Host platform version, compared lexicographically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PlatformVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl std::fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for PlatformVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.trim().split('.').map(|p| p.parse::<u32>());
        let invalid = || crate::Error::InvalidConfig(format!("invalid platform version: {s}"));
        let major = parts.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
        let minor = parts.next().transpose().map_err(|_| invalid())?.unwrap_or(0);
        let patch = parts.next().transpose().map_err(|_| invalid())?.unwrap_or(0);
        Ok(Self::new(major, minor, patch))
    }
}

/// Rendering surface the player is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderSurface {
    /// Stock player view
    Basic,
    /// Custom view, only available on newer platform versions
    Enhanced,
}

/// Asset capability keys that must be loaded before playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKey {
    Tracks,
    Playable,
}

impl AssetKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKey::Tracks => "tracks",
            AssetKey::Playable => "playable",
        }
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load status reported for one asset key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    Loaded,
    Failed(String),
    Cancelled,
}

/// Outcome of loading an asset's required keys
#[derive(Debug, Clone, PartialEq)]
pub enum AssetReadiness {
    Loading,
    Ready,
    Failed { code: String, message: String },
}

impl AssetReadiness {
    pub fn failed(error: &crate::Error) -> Self {
        AssetReadiness::Failed {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Status of a constructed player item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed(String),
}

/// Externally observable session phase
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed { code: String, message: String },
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Loading => write!(f, "loading"),
            SessionPhase::Ready => write!(f, "ready"),
            SessionPhase::Failed { code, .. } => write!(f, "failed({code})"),
            SessionPhase::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_time_rounding() {
        let t = MediaTime::from_seconds(12.34, 30);
        assert_eq!(t.timescale, 30);
        assert_eq!(t.value, 370);

        let t = MediaTime::from_seconds(1500.6, 1);
        assert_eq!(t.value, 1501);
        assert_eq!(t.seconds(), 1501.0);
    }

    #[test]
    fn test_offset_keeps_timescale() {
        let t = MediaTime { value: 600, timescale: 600 };
        let jumped = t.offset_by(5.0);
        assert_eq!(jumped.timescale, 600);
        assert_eq!(jumped.seconds(), 6.0);
    }

    #[test]
    fn test_platform_version_ordering() {
        let threshold = PlatformVersion::new(10, 11, 0);
        assert!("10.11".parse::<PlatformVersion>().unwrap() >= threshold);
        assert!("10.12.3".parse::<PlatformVersion>().unwrap() >= threshold);
        assert!("10.10.5".parse::<PlatformVersion>().unwrap() < threshold);
        assert!("11".parse::<PlatformVersion>().unwrap() >= threshold);
        assert!("ten".parse::<PlatformVersion>().is_err());
    }

    #[test]
    fn test_float_style_parse() {
        assert_eq!("while-playing".parse::<FloatOnTopStyle>().unwrap(), FloatOnTopStyle::WhilePlaying);
        assert_eq!("Always".parse::<FloatOnTopStyle>().unwrap(), FloatOnTopStyle::Always);
        assert!("sometimes".parse::<FloatOnTopStyle>().is_err());
    }
}
