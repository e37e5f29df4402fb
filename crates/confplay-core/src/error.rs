//! Error types for Confplay Core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Controller error types
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Malformed media URL {url:?}: {source}")]
    MalformedUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("No stream URL available for live event {title:?}")]
    NoLiveStream { title: String },

    // Asset errors
    #[error("Failed to load asset key {key:?}: {reason}")]
    AssetKeyFailed { key: String, reason: String },

    #[error("Asset load timed out after {timeout:?}")]
    AssetLoadTimeout { timeout: Duration },

    #[error("Asset load cancelled")]
    AssetLoadCancelled,

    // Playback errors
    #[error("Player item failed: {0}")]
    ItemFailed(String),

    // Preference errors
    #[error("Preferences I/O error: {0}")]
    PreferencesIo(#[from] std::io::Error),

    #[error("Preferences format error: {0}")]
    PreferencesFormat(#[from] serde_json::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an asset key failure
    pub fn key_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::AssetKeyFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same operation could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AssetLoadTimeout { .. } | Error::AssetLoadCancelled | Error::PreferencesIo(_)
        )
    }

    /// Returns the error code reported through the session phase channel
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MalformedUrl { .. } => "MALFORMED_URL",
            Error::NoLiveStream { .. } => "NO_LIVE_STREAM",
            Error::AssetKeyFailed { .. } => "ASSET_KEY_FAILED",
            Error::AssetLoadTimeout { .. } => "ASSET_TIMEOUT",
            Error::AssetLoadCancelled => "ASSET_CANCELLED",
            Error::ItemFailed(_) => "ITEM_FAILED",
            Error::PreferencesIo(_) => "PREFS_IO",
            Error::PreferencesFormat(_) => "PREFS_FORMAT",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = Error::key_failed("playable", "unsupported codec");
        assert_eq!(err.error_code(), "ASSET_KEY_FAILED");
        assert_eq!(
            err.to_string(),
            "Failed to load asset key \"playable\": unsupported codec"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_timeout_is_recoverable() {
        let err = Error::AssetLoadTimeout {
            timeout: Duration::from_secs(30),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "ASSET_TIMEOUT");
    }
}
