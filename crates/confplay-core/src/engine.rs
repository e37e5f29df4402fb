//! Playback engine seam
//!
//! The controller never talks to a concrete media framework. It opens assets
//! and constructs players through a [`MediaBackend`], loads asset keys through
//! [`MediaAsset`], and drives playback through [`PlaybackEngine`].

use crate::{AssetKey, Error, ItemStatus, KeyStatus, MediaTime, PlatformVersion, Result, Size};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error};
use url::Url;

/// A loadable media resource with per-key readiness
#[async_trait]
pub trait MediaAsset: Send + Sync {
    fn url(&self) -> &Url;

    /// Load the given keys, reporting one status per key
    async fn load_values(&self, keys: &[AssetKey]) -> Vec<(AssetKey, KeyStatus)>;

    /// Natural sizes of the asset's video tracks, in track order
    fn video_track_sizes(&self) -> Vec<Size>;
}

/// A player bound to one asset. Only called from the main context.
pub trait PlaybackEngine: Send {
    fn play(&mut self);

    fn pause(&mut self);

    /// Current rate; 0.0 means paused
    fn rate(&self) -> f32;

    fn set_rate(&mut self, rate: f32);

    fn seek(&mut self, to: MediaTime);

    fn current_time(&self) -> MediaTime;

    fn duration(&self) -> Option<MediaTime>;

    fn set_volume(&mut self, volume: f32);

    /// Typed item status channel (initial value plus every change)
    fn status(&self) -> watch::Receiver<ItemStatus>;

    fn is_playing(&self) -> bool {
        self.rate() != 0.0
    }
}

/// Factory for assets and players on the host platform
pub trait MediaBackend: Send + Sync {
    fn open_asset(&self, url: &Url) -> Arc<dyn MediaAsset>;

    fn create_player(&self, asset: Arc<dyn MediaAsset>) -> Box<dyn PlaybackEngine>;

    fn platform_version(&self) -> PlatformVersion;
}

/// Load `keys` on `asset`, failing on the first key that did not load.
///
/// A `timeout` of `None` waits indefinitely.
pub async fn load_required_keys(
    asset: &dyn MediaAsset,
    keys: &[AssetKey],
    timeout: Option<Duration>,
) -> Result<()> {
    let statuses = match timeout {
        Some(limit) => tokio::time::timeout(limit, asset.load_values(keys))
            .await
            .map_err(|_| Error::AssetLoadTimeout { timeout: limit })?,
        None => asset.load_values(keys).await,
    };

    for key in keys {
        let status = statuses
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, s)| s.clone())
            .unwrap_or_else(|| KeyStatus::Failed("no status reported".to_string()));

        match status {
            KeyStatus::Loaded => debug!(key = %key, "Asset key loaded"),
            KeyStatus::Failed(reason) => {
                error!(key = %key, reason = %reason, url = %asset.url(), "Failed to load status for asset key");
                return Err(Error::key_failed(key.as_str(), reason));
            }
            KeyStatus::Cancelled => {
                error!(key = %key, url = %asset.url(), "Asset key load cancelled");
                return Err(Error::AssetLoadCancelled);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticAsset {
        url: Url,
        statuses: Vec<(AssetKey, KeyStatus)>,
        hang: bool,
    }

    #[async_trait]
    impl MediaAsset for StaticAsset {
        fn url(&self) -> &Url {
            &self.url
        }

        async fn load_values(&self, _keys: &[AssetKey]) -> Vec<(AssetKey, KeyStatus)> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.statuses.clone()
        }

        fn video_track_sizes(&self) -> Vec<Size> {
            Vec::new()
        }
    }

    fn asset(statuses: Vec<(AssetKey, KeyStatus)>, hang: bool) -> StaticAsset {
        StaticAsset {
            url: Url::parse("https://devstreaming.example.com/live.m3u8").unwrap(),
            statuses,
            hang,
        }
    }

    #[tokio::test]
    async fn test_all_keys_loaded() {
        let asset = asset(
            vec![
                (AssetKey::Playable, KeyStatus::Loaded),
                (AssetKey::Tracks, KeyStatus::Loaded),
            ],
            false,
        );
        let keys = [AssetKey::Playable, AssetKey::Tracks];
        assert!(load_required_keys(&asset, &keys, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_first_failed_key_is_reported() {
        let asset = asset(
            vec![
                (AssetKey::Playable, KeyStatus::Failed("not playable".to_string())),
                (AssetKey::Tracks, KeyStatus::Loaded),
            ],
            false,
        );
        let keys = [AssetKey::Playable, AssetKey::Tracks];
        match load_required_keys(&asset, &keys, None).await {
            Err(Error::AssetKeyFailed { key, reason }) => {
                assert_eq!(key, "playable");
                assert_eq!(reason, "not playable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_status_counts_as_failure() {
        let asset = asset(vec![(AssetKey::Tracks, KeyStatus::Loaded)], false);
        let keys = [AssetKey::Playable, AssetKey::Tracks];
        assert!(load_required_keys(&asset, &keys, None).await.is_err());
    }

    #[tokio::test]
    async fn test_hanging_load_times_out() {
        let asset = asset(Vec::new(), true);
        let result =
            load_required_keys(&asset, &[AssetKey::Tracks], Some(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(Error::AssetLoadTimeout { .. })));
    }
}
