//! Playback Session - asset, player and rate state for one window
//!
//! Coordinates:
//! - Asynchronous loading of the asset's required keys
//! - Player construction once every key reports loaded
//! - Live item status watching
//! - Play/pause/seek/rate forwarding (all no-ops without a player)
//! - Session phase broadcasting

use crate::{
    config::{LaunchArgs, PlayerConfig},
    context::{MainContext, MainEvent},
    engine::{load_required_keys, MediaAsset, MediaBackend, PlaybackEngine},
    AssetKey, AssetReadiness, Error, ItemStatus, MediaTime, PlatformVersion, RenderSurface,
    Result, SessionPhase,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const RECORDING_KEYS: &[AssetKey] = &[AssetKey::Tracks];
const LIVE_KEYS: &[AssetKey] = &[AssetKey::Playable, AssetKey::Tracks];

/// Playback session owned by one window controller
pub struct PlaybackSession {
    is_live: bool,
    config: PlayerConfig,
    launch: LaunchArgs,
    url: Option<Url>,
    asset: Option<Arc<dyn MediaAsset>>,
    /// Only set once every required key loaded
    player: Option<Box<dyn PlaybackEngine>>,
    readiness: AssetReadiness,
    selected_rate: f32,
    load_task: Option<JoinHandle<()>>,
    status_observer: Option<JoinHandle<()>>,
    live_started: bool,
    phase_tx: watch::Sender<SessionPhase>,
}

impl PlaybackSession {
    pub fn new(is_live: bool, config: PlayerConfig, launch: LaunchArgs) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            is_live,
            config,
            launch,
            url: None,
            asset: None,
            player: None,
            readiness: AssetReadiness::Loading,
            selected_rate: 1.0,
            load_task: None,
            status_observer: None,
            live_started: false,
            phase_tx,
        }
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Keys that must load before a player is constructed
    pub fn required_keys(&self) -> &'static [AssetKey] {
        if self.is_live {
            LIVE_KEYS
        } else {
            RECORDING_KEYS
        }
    }

    pub fn readiness(&self) -> &AssetReadiness {
        &self.readiness
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase_tx.borrow().clone()
    }

    /// Subscribe to phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&self, phase: SessionPhase) {
        debug!(phase = %phase, "Session phase");
        self.phase_tx.send_replace(phase);
    }

    /// Begin loading the asset's required keys in the background.
    ///
    /// Completion is posted to `ctx` as [`MainEvent::AssetLoaded`]. A URL
    /// that does not parse is reported and nothing is started.
    #[instrument(skip(self, backend, ctx), fields(live = self.is_live))]
    pub fn load(&mut self, url: &str, backend: &dyn MediaBackend, ctx: &MainContext) -> Result<()> {
        let url = Url::parse(url).map_err(|source| Error::MalformedUrl {
            url: url.to_string(),
            source,
        })?;

        info!(url = %url, "Loading asset");
        let asset = backend.open_asset(&url);
        self.url = Some(url);
        self.asset = Some(Arc::clone(&asset));
        self.readiness = AssetReadiness::Loading;
        self.set_phase(SessionPhase::Loading);

        let keys = self.required_keys();
        let timeout = self.config.asset_load_timeout();
        let ctx = ctx.clone();
        self.load_task = Some(tokio::spawn(async move {
            let readiness = match load_required_keys(asset.as_ref(), keys, timeout).await {
                Ok(()) => AssetReadiness::Ready,
                Err(e) => AssetReadiness::failed(&e),
            };
            ctx.post(MainEvent::AssetLoaded(readiness));
        }));
        Ok(())
    }

    /// Apply a load outcome on the main context.
    ///
    /// On success the player is constructed and true is returned. A failure
    /// leaves the session without a player.
    pub fn finish_load(&mut self, readiness: AssetReadiness, backend: &dyn MediaBackend) -> bool {
        self.load_task = None;
        self.readiness = readiness.clone();

        match readiness {
            AssetReadiness::Ready => {}
            AssetReadiness::Failed { code, message } => {
                error!(code = %code, message = %message, live = self.is_live, "Asset load failed, playback will not start");
                self.set_phase(SessionPhase::Failed { code, message });
                return false;
            }
            AssetReadiness::Loading => return false,
        }

        let Some(asset) = self.asset.clone() else {
            warn!("Asset loaded but no asset is attached");
            return false;
        };
        if self.player.is_some() {
            warn!("Player already constructed, ignoring duplicate load completion");
            return false;
        }

        let mut player = backend.create_player(asset);
        if self.launch.zero_volume {
            player.set_volume(0.0);
        }
        self.player = Some(player);
        self.set_phase(SessionPhase::Ready);
        info!(live = self.is_live, "Player constructed");
        true
    }

    /// Surface to render on; the enhanced surface is only used for live
    /// playback on new enough platforms
    pub fn surface_for(&self, platform: PlatformVersion) -> RenderSurface {
        if self.is_live && platform >= self.config.enhanced_min_version {
            RenderSurface::Enhanced
        } else {
            RenderSurface::Basic
        }
    }

    /// Forward the player's item status onto the main context
    pub fn observe_status(&mut self, ctx: &MainContext) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        if self.status_observer.is_some() {
            return;
        }
        let mut rx = player.status();
        let ctx = ctx.clone();
        self.status_observer = Some(tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            ctx.post(MainEvent::ItemStatus(initial));
            while rx.changed().await.is_ok() {
                let status = rx.borrow_and_update().clone();
                ctx.post(MainEvent::ItemStatus(status));
            }
        }));
        debug!("Item status observer attached");
    }

    pub fn has_status_observer(&self) -> bool {
        self.status_observer.is_some()
    }

    pub fn detach_status_observer(&mut self) {
        if let Some(observer) = self.status_observer.take() {
            observer.abort();
            debug!("Item status observer detached");
        }
    }

    /// Handle an item status; true exactly once, on the first ready-to-play
    pub fn on_item_status(&mut self, status: ItemStatus) -> bool {
        match status {
            ItemStatus::ReadyToPlay if !self.live_started && self.player.is_some() => {
                self.live_started = true;
                true
            }
            ItemStatus::Failed(reason) => {
                let err = Error::ItemFailed(reason);
                error!(error = %err, "Player item failed");
                self.set_phase(SessionPhase::Failed {
                    code: err.error_code().to_string(),
                    message: err.to_string(),
                });
                false
            }
            _ => false,
        }
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn engine(&self) -> Option<&dyn PlaybackEngine> {
        self.player.as_deref()
    }

    pub fn asset(&self) -> Option<&Arc<dyn MediaAsset>> {
        self.asset.as_ref()
    }

    /// Start playback at the selected rate
    pub fn play(&mut self) {
        let rate = self.selected_rate;
        if let Some(player) = self.player.as_mut() {
            player.play();
            if player.rate() != rate {
                player.set_rate(rate);
            }
        }
    }

    pub fn pause(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.pause();
        }
    }

    pub fn selected_rate(&self) -> f32 {
        self.selected_rate
    }

    /// Select a rate; applied immediately only while playing
    pub fn set_rate(&mut self, rate: f32) {
        self.selected_rate = rate;
        if let Some(player) = self.player.as_mut() {
            if player.is_playing() {
                player.set_rate(rate);
            }
        }
        debug!(rate, "Playback rate selected");
    }

    /// Re-apply the selected rate after playback (re)started
    pub fn apply_selected_rate(&mut self) {
        let rate = self.selected_rate;
        if let Some(player) = self.player.as_mut() {
            if player.is_playing() && player.rate() != rate {
                player.set_rate(rate);
            }
        }
    }

    /// Seek to `seconds` on the given timescale
    pub fn seek_seconds(&mut self, seconds: f64, timescale: i32) -> Option<MediaTime> {
        let player = self.player.as_mut()?;
        let target = MediaTime::from_seconds(seconds, timescale);
        player.seek(target);
        debug!(target = %target, timescale, "Seek");
        Some(target)
    }

    /// Seek relative to the current time, keeping its timescale
    pub fn jump_by(&mut self, delta: f64) -> Option<MediaTime> {
        let player = self.player.as_mut()?;
        let target = player.current_time().offset_by(delta);
        player.seek(target);
        debug!(delta, target = %target, "Relative jump");
        Some(target)
    }

    pub fn current_time(&self) -> Option<MediaTime> {
        self.player.as_ref().map(|p| p.current_time())
    }

    pub fn duration(&self) -> Option<MediaTime> {
        self.player.as_ref().and_then(|p| p.duration())
    }

    /// `None` without a player
    pub fn is_playing(&self) -> Option<bool> {
        self.player.as_ref().map(|p| p.is_playing())
    }

    /// Fraction of the duration reached at `at`
    pub fn progress_at(&self, at: MediaTime) -> Option<f64> {
        let duration = self.duration()?.seconds();
        if !(duration.is_finite() && duration > 0.0) {
            return None;
        }
        Some((at.seconds() / duration).clamp(0.0, 1.0))
    }

    /// Cancel loading, drop the player and mark the session closed
    pub fn shutdown(&mut self) {
        if let Some(task) = self.load_task.take() {
            task.abort();
            debug!("Pending asset load cancelled");
        }
        self.detach_status_observer();
        self.player = None;
        self.asset = None;
        if self.phase() != SessionPhase::Closed {
            self.set_phase(SessionPhase::Closed);
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        self.detach_status_observer();
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::context::main_context;
    use crate::sim::{SimAsset, SimBackend, SimCall};

    fn recording() -> PlaybackSession {
        PlaybackSession::new(false, PlayerConfig::default(), LaunchArgs::default())
    }

    #[test]
    fn test_required_keys() {
        assert_eq!(recording().required_keys(), &[AssetKey::Tracks]);
        let live = PlaybackSession::new(true, PlayerConfig::default(), LaunchArgs::default());
        assert_eq!(live.required_keys(), &[AssetKey::Playable, AssetKey::Tracks]);
    }

    #[test]
    fn test_controls_without_player_are_noops() {
        let mut session = recording();
        session.play();
        session.pause();
        session.set_rate(1.5);
        assert_eq!(session.seek_seconds(10.0, 1), None);
        assert_eq!(session.jump_by(5.0), None);
        assert_eq!(session.is_playing(), None);
        assert_eq!(session.selected_rate(), 1.5);
        session.shutdown();
        session.shutdown();
        assert_eq!(session.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_malformed_url_is_rejected() {
        let (ctx, _queue) = main_context();
        let backend = SimBackend::new(SimAsset::recording(60.0));
        let mut session = recording();
        let err = session.load("not a url", &backend, &ctx).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_URL");
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_load_posts_readiness() {
        let (ctx, mut queue) = main_context();
        let backend = SimBackend::new(SimAsset::recording(60.0));
        let mut session = recording();

        session.load("https://devstreaming.example.com/101_hd.mp4", &backend, &ctx).unwrap();
        assert_eq!(session.phase(), SessionPhase::Loading);

        let event = queue.recv().await.unwrap();
        assert_eq!(event, MainEvent::AssetLoaded(AssetReadiness::Ready));
        if let MainEvent::AssetLoaded(readiness) = event {
            assert!(session.finish_load(readiness, &backend));
        }
        assert!(session.has_player());
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[tokio::test]
    async fn test_rate_applies_on_next_play() {
        let backend = SimBackend::new(SimAsset::recording(60.0));
        let probe = backend.player_probe();
        let mut session = recording();
        session.asset = Some(backend.open_asset(&Url::parse("https://x.example.com/a.mp4").unwrap()));
        assert!(session.finish_load(AssetReadiness::Ready, &backend));

        session.set_rate(1.5);
        assert_eq!(session.engine().unwrap().rate(), 0.0);
        assert!(!probe.calls().contains(&SimCall::SetRate(1.5)));

        session.play();
        assert_eq!(session.engine().unwrap().rate(), 1.5);

        session.set_rate(2.0);
        assert_eq!(session.engine().unwrap().rate(), 2.0);
    }

    #[tokio::test]
    async fn test_zero_volume_launch_flag() {
        let backend = SimBackend::new(SimAsset::recording(60.0));
        let probe = backend.player_probe();
        let launch = LaunchArgs { zero_volume: true };
        let mut session = PlaybackSession::new(false, PlayerConfig::default(), launch);
        session.asset = Some(backend.open_asset(&Url::parse("https://x.example.com/a.mp4").unwrap()));
        session.finish_load(AssetReadiness::Ready, &backend);
        assert_eq!(probe.snapshot().volume, 0.0);
    }

    #[test]
    fn test_surface_selection() {
        let live = PlaybackSession::new(true, PlayerConfig::default(), LaunchArgs::default());
        assert_eq!(live.surface_for(PlatformVersion::new(10, 11, 0)), RenderSurface::Enhanced);
        assert_eq!(live.surface_for(PlatformVersion::new(10, 10, 0)), RenderSurface::Basic);
        assert_eq!(recording().surface_for(PlatformVersion::new(13, 0, 0)), RenderSurface::Basic);
    }

    #[test]
    fn test_failed_load_sets_phase() {
        let backend = SimBackend::new(SimAsset::recording(60.0));
        let mut session = recording();
        let readiness = AssetReadiness::failed(&Error::key_failed("tracks", "boom"));
        assert!(!session.finish_load(readiness, &backend));
        assert!(!session.has_player());
        assert!(matches!(session.phase(), SessionPhase::Failed { code, .. } if code == "ASSET_KEY_FAILED"));
    }
}
