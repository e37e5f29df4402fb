//! Deterministic in-process collaborators
//!
//! Every simulated collaborator keeps its state behind an
//! `Arc<Mutex<..>>` and hands out a probe sharing that state, so the
//! controller can own the collaborator while a driver (the CLI, a test)
//! steers and inspects it.

use crate::{
    catalog::{ResumableSession, SessionRecord},
    context::{Key, KeyEvent, MainContext, MainEvent, MonitorScope},
    controller::SleepSuppressor,
    engine::{MediaAsset, MediaBackend, PlaybackEngine},
    fullscreen::{InputMonitors, InputSnapshot},
    transcript::{TranscriptEvent, TranscriptPanel, TranscriptPanelFactory, TranscriptTimecodes},
    AssetKey, ItemStatus, KeyStatus, MediaTime, PlatformVersion, Rect, RenderSurface, Size,
    WindowLevel,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;
use url::Url;

/// Timescale the simulated player reports its clock on
const SIM_TIMESCALE: i32 = 600;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// Media
// ============================================================================

/// Template for the assets a [`SimBackend`] opens
#[derive(Debug, Clone)]
pub struct SimAsset {
    pub statuses: Vec<(AssetKey, KeyStatus)>,
    pub video_tracks: Vec<Size>,
    /// `None` for live streams
    pub duration: Option<f64>,
    pub load_delay: Duration,
    /// Never complete key loading
    pub hang: bool,
}

impl SimAsset {
    /// A 720p recording of `duration` seconds
    pub fn recording(duration: f64) -> Self {
        Self {
            statuses: vec![(AssetKey::Tracks, KeyStatus::Loaded)],
            video_tracks: vec![Size::new(1280.0, 720.0)],
            duration: Some(duration),
            load_delay: Duration::ZERO,
            hang: false,
        }
    }

    /// A playable 1080p live stream
    pub fn live() -> Self {
        Self {
            statuses: vec![
                (AssetKey::Playable, KeyStatus::Loaded),
                (AssetKey::Tracks, KeyStatus::Loaded),
            ],
            video_tracks: vec![Size::new(1920.0, 1080.0)],
            duration: None,
            load_delay: Duration::ZERO,
            hang: false,
        }
    }

    pub fn with_failed_key(mut self, key: AssetKey, reason: &str) -> Self {
        for (k, status) in &mut self.statuses {
            if *k == key {
                *status = KeyStatus::Failed(reason.to_string());
            }
        }
        self
    }

    pub fn without_video(mut self) -> Self {
        self.video_tracks.clear();
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

struct OpenedSimAsset {
    url: Url,
    spec: SimAsset,
}

#[async_trait]
impl MediaAsset for OpenedSimAsset {
    fn url(&self) -> &Url {
        &self.url
    }

    async fn load_values(&self, keys: &[AssetKey]) -> Vec<(AssetKey, KeyStatus)> {
        if self.spec.hang {
            std::future::pending::<()>().await;
        }
        if !self.spec.load_delay.is_zero() {
            tokio::time::sleep(self.spec.load_delay).await;
        }
        keys.iter()
            .filter_map(|key| self.spec.statuses.iter().find(|(k, _)| k == key).cloned())
            .collect()
    }

    fn video_track_sizes(&self) -> Vec<Size> {
        self.spec.video_tracks.clone()
    }
}

/// Calls made on the simulated player
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Play,
    Pause,
    SetRate(f32),
    Seek(MediaTime),
    SetVolume(f32),
}

#[derive(Debug)]
struct SimPlayerState {
    created: usize,
    rate: f32,
    position: f64,
    duration: Option<f64>,
    volume: f32,
    calls: Vec<SimCall>,
    status_tx: watch::Sender<ItemStatus>,
}

impl Default for SimPlayerState {
    fn default() -> Self {
        Self {
            created: 0,
            rate: 0.0,
            position: 0.0,
            duration: None,
            volume: 1.0,
            calls: Vec::new(),
            status_tx: watch::channel(ItemStatus::Unknown).0,
        }
    }
}

/// Point-in-time view of the simulated player
#[derive(Debug, Clone, PartialEq)]
pub struct SimPlayerSnapshot {
    pub created: usize,
    pub rate: f32,
    pub position: f64,
    pub volume: f32,
}

/// Simulated player; time only moves through [`SimPlayerProbe::advance`]
pub struct SimPlayer {
    state: Arc<Mutex<SimPlayerState>>,
}

impl PlaybackEngine for SimPlayer {
    fn play(&mut self) {
        let mut s = lock(&self.state);
        s.calls.push(SimCall::Play);
        if s.rate == 0.0 {
            s.rate = 1.0;
        }
    }

    fn pause(&mut self) {
        let mut s = lock(&self.state);
        s.calls.push(SimCall::Pause);
        s.rate = 0.0;
    }

    fn rate(&self) -> f32 {
        lock(&self.state).rate
    }

    fn set_rate(&mut self, rate: f32) {
        let mut s = lock(&self.state);
        s.calls.push(SimCall::SetRate(rate));
        s.rate = rate;
    }

    fn seek(&mut self, to: MediaTime) {
        let mut s = lock(&self.state);
        s.calls.push(SimCall::Seek(to));
        let end = s.duration.unwrap_or(f64::MAX);
        s.position = to.seconds().clamp(0.0, end);
    }

    fn current_time(&self) -> MediaTime {
        MediaTime::from_seconds(lock(&self.state).position, SIM_TIMESCALE)
    }

    fn duration(&self) -> Option<MediaTime> {
        lock(&self.state)
            .duration
            .map(|d| MediaTime::from_seconds(d, SIM_TIMESCALE))
    }

    fn set_volume(&mut self, volume: f32) {
        let mut s = lock(&self.state);
        s.calls.push(SimCall::SetVolume(volume));
        s.volume = volume;
    }

    fn status(&self) -> watch::Receiver<ItemStatus> {
        lock(&self.state).status_tx.subscribe()
    }
}

/// Driver handle for the backend's player
#[derive(Clone)]
pub struct SimPlayerProbe {
    state: Arc<Mutex<SimPlayerState>>,
}

impl SimPlayerProbe {
    pub fn snapshot(&self) -> SimPlayerSnapshot {
        let s = lock(&self.state);
        SimPlayerSnapshot {
            created: s.created,
            rate: s.rate,
            position: s.position,
            volume: s.volume,
        }
    }

    pub fn calls(&self) -> Vec<SimCall> {
        lock(&self.state).calls.clone()
    }

    /// Let `seconds` of wall time pass; media time moves by `seconds * rate`
    pub fn advance(&self, seconds: f64) {
        let mut s = lock(&self.state);
        let end = s.duration.unwrap_or(f64::MAX);
        s.position = (s.position + seconds * f64::from(s.rate)).clamp(0.0, end);
        if s.position >= end {
            s.rate = 0.0;
        }
    }

    /// Change the rate as the player's own controls would (not logged)
    pub fn set_rate_externally(&self, rate: f32) {
        lock(&self.state).rate = rate;
    }

    pub fn set_status(&self, status: ItemStatus) {
        lock(&self.state).status_tx.send_replace(status);
    }
}

/// Backend handing out [`SimAsset`]s and one shared [`SimPlayer`] state
pub struct SimBackend {
    asset: SimAsset,
    platform: PlatformVersion,
    auto_ready: bool,
    player: Arc<Mutex<SimPlayerState>>,
}

impl SimBackend {
    pub fn new(asset: SimAsset) -> Self {
        Self {
            asset,
            platform: PlatformVersion::new(10, 11, 0),
            auto_ready: false,
            player: Arc::new(Mutex::new(SimPlayerState::default())),
        }
    }

    pub fn with_platform(mut self, platform: PlatformVersion) -> Self {
        self.platform = platform;
        self
    }

    /// Report ready-to-play as soon as a player is constructed
    pub fn auto_ready(mut self) -> Self {
        self.auto_ready = true;
        self
    }

    pub fn player_probe(&self) -> SimPlayerProbe {
        SimPlayerProbe {
            state: Arc::clone(&self.player),
        }
    }
}

impl MediaBackend for SimBackend {
    fn open_asset(&self, url: &Url) -> Arc<dyn MediaAsset> {
        Arc::new(OpenedSimAsset {
            url: url.clone(),
            spec: self.asset.clone(),
        })
    }

    fn create_player(&self, _asset: Arc<dyn MediaAsset>) -> Box<dyn PlaybackEngine> {
        {
            let mut s = lock(&self.player);
            s.created += 1;
            s.duration = self.asset.duration;
            if self.auto_ready {
                s.status_tx.send_replace(ItemStatus::ReadyToPlay);
            }
        }
        debug!(platform = %self.platform, "Simulated player created");
        Box::new(SimPlayer {
            state: Arc::clone(&self.player),
        })
    }

    fn platform_version(&self) -> PlatformVersion {
        self.platform
    }
}

// ============================================================================
// Window
// ============================================================================

/// Recorded state of a [`SimWindow`]
#[derive(Debug, Clone, PartialEq)]
pub struct SimWindowState {
    pub title: String,
    pub level: Option<WindowLevel>,
    pub levels: Vec<WindowLevel>,
    pub frame: Rect,
    pub screen: Rect,
    pub frame_changes: Vec<(Rect, bool)>,
    pub aspect_ratio: Option<Size>,
    pub fit_requests: Vec<(Size, bool, bool)>,
    pub loading: bool,
    pub surface: Option<RenderSurface>,
}

/// Simulated window on a 1920x1080 primary screen
pub struct SimWindow {
    state: Arc<Mutex<SimWindowState>>,
}

impl SimWindow {
    pub fn new(frame: Rect) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimWindowState {
                title: String::new(),
                level: None,
                levels: Vec::new(),
                frame,
                screen: Rect::new(0.0, 0.0, 1920.0, 1080.0),
                frame_changes: Vec::new(),
                aspect_ratio: None,
                fit_requests: Vec::new(),
                loading: false,
                surface: None,
            })),
        }
    }

    pub fn probe(&self) -> SimWindowProbe {
        SimWindowProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl crate::window::VideoWindow for SimWindow {
    fn set_title(&mut self, title: &str) {
        lock(&self.state).title = title.to_string();
    }

    fn set_level(&mut self, level: WindowLevel) {
        let mut s = lock(&self.state);
        s.level = Some(level);
        s.levels.push(level);
    }

    fn frame(&self) -> Rect {
        lock(&self.state).frame
    }

    fn set_frame(&mut self, frame: Rect, animate: bool) {
        let mut s = lock(&self.state);
        s.frame = frame;
        s.frame_changes.push((frame, animate));
    }

    fn primary_screen_frame(&self) -> Option<Rect> {
        Some(lock(&self.state).screen)
    }

    fn set_aspect_ratio(&mut self, ratio: Size) {
        lock(&self.state).aspect_ratio = Some(ratio);
    }

    fn size_to_fit_video(&mut self, size: Size, ignoring_screen_size: bool, animate: bool) {
        let mut s = lock(&self.state);
        s.fit_requests.push((size, ignoring_screen_size, animate));
        let mut fitted = size;
        if !ignoring_screen_size && !size.is_empty() {
            let factor = (s.screen.width / size.width).min(s.screen.height / size.height);
            fitted = size.scaled(factor);
        }
        s.frame = Rect::new(s.frame.x, s.frame.y, fitted.width, fitted.height);
    }

    fn set_loading(&mut self, loading: bool) {
        lock(&self.state).loading = loading;
    }

    fn attach_surface(&mut self, surface: RenderSurface) {
        lock(&self.state).surface = Some(surface);
    }

    fn video_bounds(&self) -> Rect {
        let frame = lock(&self.state).frame;
        Rect::new(0.0, 0.0, frame.width, frame.height)
    }
}

#[derive(Clone)]
pub struct SimWindowProbe {
    state: Arc<Mutex<SimWindowState>>,
}

impl SimWindowProbe {
    pub fn snapshot(&self) -> SimWindowState {
        lock(&self.state).clone()
    }

    /// Resize as the user would by dragging
    pub fn user_resize(&self, width: f64, height: f64) {
        let mut s = lock(&self.state);
        s.frame = Rect::new(s.frame.x, s.frame.y, width, height);
    }
}

// ============================================================================
// Input
// ============================================================================

#[derive(Default)]
struct SimInputState {
    next_token: u64,
    key_monitors: BTreeMap<u64, (MonitorScope, MainContext)>,
    regions: BTreeMap<u64, (Rect, MainContext)>,
    removed: Vec<u64>,
    input: InputSnapshot,
}

/// Simulated key monitors and tracking regions
#[derive(Default)]
pub struct SimInput {
    state: Arc<Mutex<SimInputState>>,
}

impl SimInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> SimInputProbe {
        SimInputProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl InputMonitors for SimInput {
    fn add_key_monitor(&mut self, scope: MonitorScope, ctx: &MainContext) -> u64 {
        let mut s = lock(&self.state);
        s.next_token += 1;
        let token = s.next_token;
        s.key_monitors.insert(token, (scope, ctx.clone()));
        token
    }

    fn remove_key_monitor(&mut self, token: u64) -> bool {
        let mut s = lock(&self.state);
        let removed = s.key_monitors.remove(&token).is_some();
        if removed {
            s.removed.push(token);
        }
        removed
    }

    fn add_tracking_region(&mut self, region: Rect, ctx: &MainContext) -> u64 {
        let mut s = lock(&self.state);
        s.next_token += 1;
        let token = s.next_token;
        s.regions.insert(token, (region, ctx.clone()));
        token
    }

    fn remove_tracking_region(&mut self, token: u64) -> bool {
        let mut s = lock(&self.state);
        let removed = s.regions.remove(&token).is_some();
        if removed {
            s.removed.push(token);
        }
        removed
    }

    fn snapshot(&self) -> InputSnapshot {
        lock(&self.state).input
    }
}

#[derive(Clone)]
pub struct SimInputProbe {
    state: Arc<Mutex<SimInputState>>,
}

impl SimInputProbe {
    pub fn set_input(&self, pointer_over_video: bool, zoom_modifier_held: bool) {
        lock(&self.state).input = InputSnapshot {
            pointer_over_video,
            zoom_modifier_held,
        };
    }

    /// Deliver a key event to every monitor of `scope`
    pub fn press(&self, scope: MonitorScope, key: Key) -> usize {
        let targets: Vec<MainContext> = lock(&self.state)
            .key_monitors
            .values()
            .filter(|(s, _)| *s == scope)
            .map(|(_, ctx)| ctx.clone())
            .collect();
        for ctx in &targets {
            ctx.post(MainEvent::Key(KeyEvent { scope, key }));
        }
        targets.len()
    }

    /// Deliver pointer movement to every tracking region
    pub fn move_pointer(&self) -> usize {
        let targets: Vec<MainContext> = lock(&self.state)
            .regions
            .values()
            .map(|(_, ctx)| ctx.clone())
            .collect();
        for ctx in &targets {
            ctx.post(MainEvent::PointerMoved);
        }
        targets.len()
    }

    pub fn active_key_monitors(&self) -> usize {
        lock(&self.state).key_monitors.len()
    }

    pub fn active_regions(&self) -> Vec<Rect> {
        lock(&self.state).regions.values().map(|(r, _)| *r).collect()
    }

    /// Tokens removed so far, in removal order
    pub fn removed(&self) -> Vec<u64> {
        lock(&self.state).removed.clone()
    }
}

// ============================================================================
// Transcript panel
// ============================================================================

/// Recorded state of the simulated transcript panels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimPanelState {
    pub opened: usize,
    pub brought_to_front: usize,
    pub highlights: Vec<String>,
    pub closed: bool,
}

#[derive(Default)]
struct SimPanelShared {
    state: SimPanelState,
    ctx: Option<MainContext>,
}

/// Factory for simulated transcript panels
#[derive(Default)]
pub struct SimPanelFactory {
    shared: Arc<Mutex<SimPanelShared>>,
}

impl SimPanelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> SimPanelProbe {
        SimPanelProbe {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl TranscriptPanelFactory for SimPanelFactory {
    fn open(&mut self, _session_title: &str, ctx: &MainContext) -> Box<dyn TranscriptPanel> {
        let mut shared = lock(&self.shared);
        shared.state.opened += 1;
        shared.state.closed = false;
        shared.ctx = Some(ctx.clone());
        Box::new(SimPanel {
            shared: Arc::clone(&self.shared),
        })
    }
}

struct SimPanel {
    shared: Arc<Mutex<SimPanelShared>>,
}

impl TranscriptPanel for SimPanel {
    fn highlight_line_at(&mut self, rounded_timecode: &str) {
        lock(&self.shared).state.highlights.push(rounded_timecode.to_string());
    }

    fn bring_to_front(&mut self) {
        lock(&self.shared).state.brought_to_front += 1;
    }

    fn close(&mut self) {
        lock(&self.shared).state.closed = true;
    }
}

#[derive(Clone)]
pub struct SimPanelProbe {
    shared: Arc<Mutex<SimPanelShared>>,
}

impl SimPanelProbe {
    pub fn snapshot(&self) -> SimPanelState {
        lock(&self.shared).state.clone()
    }

    fn post(&self, event: TranscriptEvent) -> bool {
        match lock(&self.shared).ctx.clone() {
            Some(ctx) => {
                ctx.post(MainEvent::Transcript(event));
                true
            }
            None => false,
        }
    }

    /// The transcript finished loading with these line timecodes
    pub fn transcript_ready(&self, timecodes: Vec<f64>) -> bool {
        self.post(TranscriptEvent::Ready(TranscriptTimecodes::new(timecodes)))
    }

    /// The user clicked the line at `seconds`
    pub fn click_line(&self, seconds: f64) -> bool {
        self.post(TranscriptEvent::JumpToTime(seconds))
    }

    /// The user closed the panel window
    pub fn user_closed(&self) -> bool {
        lock(&self.shared).state.closed = true;
        self.post(TranscriptEvent::Closed)
    }
}

// ============================================================================
// Sleep suppression and catalog
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimActivityState {
    pub active: Option<u64>,
    pub begun: usize,
    pub ended: usize,
}

#[derive(Default)]
pub struct SimSuppressor {
    state: Arc<Mutex<SimActivityState>>,
}

impl SimSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> SimSuppressorProbe {
        SimSuppressorProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl SleepSuppressor for SimSuppressor {
    fn begin(&mut self, reason: &str) -> u64 {
        let mut s = lock(&self.state);
        s.begun += 1;
        let token = s.begun as u64;
        s.active = Some(token);
        debug!(reason, token, "Sleep suppression begun");
        token
    }

    fn end(&mut self, token: u64) {
        let mut s = lock(&self.state);
        if s.active == Some(token) {
            s.active = None;
        }
        s.ended += 1;
    }
}

#[derive(Clone)]
pub struct SimSuppressorProbe {
    state: Arc<Mutex<SimActivityState>>,
}

impl SimSuppressorProbe {
    pub fn snapshot(&self) -> SimActivityState {
        lock(&self.state).clone()
    }
}

/// Catalog record shared between the controller and a driver
#[derive(Debug, Clone, Default)]
pub struct SharedSession(Arc<Mutex<SessionRecord>>);

impl SharedSession {
    pub fn new(record: SessionRecord) -> Self {
        Self(Arc::new(Mutex::new(record)))
    }

    pub fn record(&self) -> SessionRecord {
        lock(&self.0).clone()
    }
}

impl ResumableSession for SharedSession {
    fn title(&self) -> String {
        lock(&self.0).title.clone()
    }

    fn year(&self) -> u32 {
        lock(&self.0).year
    }

    fn current_position(&self) -> f64 {
        lock(&self.0).current_position
    }

    fn record_progress(&mut self, progress: f64, position: f64) {
        lock(&self.0).record_progress(progress, position);
    }
}
