//! Video Window Controller - one window playing one recording or live event
//!
//! Owns the playback session, the time source, the float policy, quick
//! fullscreen and transcript sync, and releases everything it installed
//! when the window closes. All state changes happen while draining the
//! controller's main queue.

use crate::{
    catalog::PlaybackContent,
    config::{LaunchArgs, PlayerConfig, SharedPreferences},
    context::{main_context, Command, Key, KeyEvent, MainContext, MainEvent, MainQueue, MonitorScope},
    engine::MediaBackend,
    float_policy::FloatPolicyEngine,
    fullscreen::{InputMonitors, QuickFullscreenMonitor},
    notify::{Notification, NotificationCenter, NotificationKind},
    registry::{ObserverHandle, ObserverKind, ObserverRegistry, ReleaseObserver},
    session::PlaybackSession,
    time_source::TimeSource,
    transcript::{TranscriptEvent, TranscriptPanelFactory, TranscriptSync},
    window::{VideoWindow, WindowSizer},
    AssetReadiness, Error, ItemStatus, MediaTime, RenderSurface, Result, SessionPhase, WindowId,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

const ACTIVITY_REASON: &str = "Playing conference session video";

/// Keeps the system awake while a video window is open
pub trait SleepSuppressor: Send {
    /// Begin an activity; returns its token
    fn begin(&mut self, reason: &str) -> u64;

    fn end(&mut self, token: u64);
}

/// Host services a controller is wired to
pub struct Collaborators {
    pub backend: Arc<dyn MediaBackend>,
    pub window: Box<dyn VideoWindow>,
    pub input: Box<dyn InputMonitors>,
    pub transcripts: Box<dyn TranscriptPanelFactory>,
    pub activity: Box<dyn SleepSuppressor>,
    pub notifications: NotificationCenter,
}

/// Dispatches each tracked handle to the collaborator that installed it
struct ObserverReleaser<'a> {
    time_source: &'a mut TimeSource,
    float: &'a mut FloatPolicyEngine,
    input: &'a mut dyn InputMonitors,
    notifications: &'a NotificationCenter,
}

impl ReleaseObserver for ObserverReleaser<'_> {
    fn release(&mut self, handle: ObserverHandle) {
        let removed = match handle.kind {
            ObserverKind::PeriodicTime | ObserverKind::BoundaryTime => self.time_source.remove(handle),
            ObserverKind::KeyMonitorLocal | ObserverKind::KeyMonitorGlobal => {
                self.input.remove_key_monitor(handle.token)
            }
            ObserverKind::TrackingRegion => self.input.remove_tracking_region(handle.token),
            ObserverKind::Notification => self.notifications.unsubscribe(handle),
            ObserverKind::PlaybackState => {
                self.float.dispose();
                true
            }
        };
        trace!(?handle, removed, "Observer released");
    }
}

/// Controller for one video window
pub struct VideoWindowController {
    id: WindowId,
    config: PlayerConfig,
    content: PlaybackContent,
    backend: Arc<dyn MediaBackend>,
    window: Box<dyn VideoWindow>,
    input: Box<dyn InputMonitors>,
    transcripts: Box<dyn TranscriptPanelFactory>,
    activity: Box<dyn SleepSuppressor>,
    notifications: NotificationCenter,
    ctx: MainContext,
    queue: MainQueue,
    session: PlaybackSession,
    time_source: TimeSource,
    registry: ObserverRegistry,
    float: FloatPolicyEngine,
    sizer: WindowSizer,
    quick_fullscreen: QuickFullscreenMonitor,
    transcript: TranscriptSync,
    activity_token: Option<u64>,
    loaded: bool,
    closed: bool,
}

impl VideoWindowController {
    pub fn new(
        content: PlaybackContent,
        collaborators: Collaborators,
        config: PlayerConfig,
        prefs: SharedPreferences,
        launch: LaunchArgs,
    ) -> Result<Self> {
        config.validate()?;
        let (ctx, queue) = main_context();
        let session = PlaybackSession::new(content.is_live(), config.clone(), launch);
        let float = FloatPolicyEngine::new(prefs.clone(), config.playback_sample_period());

        Ok(Self {
            id: WindowId::new(),
            config,
            content,
            backend: collaborators.backend,
            window: collaborators.window,
            input: collaborators.input,
            transcripts: collaborators.transcripts,
            activity: collaborators.activity,
            notifications: collaborators.notifications,
            ctx,
            queue,
            session,
            time_source: TimeSource::new(),
            registry: ObserverRegistry::new(),
            float,
            sizer: WindowSizer::new(prefs),
            quick_fullscreen: QuickFullscreenMonitor::new(),
            transcript: TranscriptSync::new(),
            activity_token: None,
            loaded: false,
            closed: false,
        })
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Handle for posting events to this controller
    pub fn context(&self) -> MainContext {
        self.ctx.clone()
    }

    pub fn content(&self) -> &PlaybackContent {
        &self.content
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    pub fn time_source(&self) -> &TimeSource {
        &self.time_source
    }

    pub fn float_policy(&self) -> &FloatPolicyEngine {
        &self.float
    }

    pub fn quick_fullscreen(&self) -> &QuickFullscreenMonitor {
        &self.quick_fullscreen
    }

    pub fn transcript(&self) -> &TranscriptSync {
        &self.transcript
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn window_title(&self) -> String {
        match &self.content {
            PlaybackContent::Recording { session, .. } => format!(
                "{} {} | {}",
                self.config.catalog_title_prefix,
                session.year(),
                session.title()
            ),
            PlaybackContent::Live(event) => live_title(&event.title),
        }
    }

    /// The window finished loading: start playback and install observers
    #[instrument(skip(self), fields(window = %self.id, live = self.content.is_live()))]
    pub fn window_did_load(&mut self) {
        if self.loaded || self.closed {
            return;
        }
        self.loaded = true;

        self.activity_token = Some(self.activity.begin(ACTIVITY_REASON));
        self.window.set_loading(true);
        self.float.apply(self.window.as_mut(), self.session.is_playing());

        let title = self.window_title();
        self.window.set_title(&title);

        let (kind, url) = match &self.content {
            PlaybackContent::Recording { url, .. } => {
                (NotificationKind::LiveEventWillStartPlaying, Some(url.clone()))
            }
            PlaybackContent::Live(event) => {
                let url = event
                    .appropriate_url(self.backend.platform_version(), self.config.enhanced_min_version)
                    .map(str::to_string);
                (NotificationKind::LiveEventTitleAvailable, url)
            }
        };

        let subscription = self.notifications.subscribe(kind, &self.ctx);
        self.track(subscription);

        match url {
            Some(url) => {
                if let Err(e) = self.session.load(&url, self.backend.as_ref(), &self.ctx) {
                    warn!(error = %e, code = e.error_code(), "Skipping playback setup");
                }
            }
            None => {
                let title = match &self.content {
                    PlaybackContent::Live(event) => event.title.clone(),
                    PlaybackContent::Recording { session, .. } => session.title(),
                };
                let err = Error::NoLiveStream { title };
                warn!(error = %err, code = err.error_code(), "Skipping playback setup");
            }
        }

        self.install_input_monitors();
        info!(title = %title, "Video window loaded");
    }

    fn install_input_monitors(&mut self) {
        let local = self.input.add_key_monitor(MonitorScope::Local, &self.ctx);
        self.track(ObserverHandle::new(ObserverKind::KeyMonitorLocal, local));
        let global = self.input.add_key_monitor(MonitorScope::Global, &self.ctx);
        self.track(ObserverHandle::new(ObserverKind::KeyMonitorGlobal, global));
        self.install_tracking_region();
    }

    /// (Re)install pointer tracking over the video's current bounds
    fn install_tracking_region(&mut self) {
        let bounds = self.window.video_bounds();
        let token = self.input.add_tracking_region(bounds, &self.ctx);
        self.track(ObserverHandle::new(ObserverKind::TrackingRegion, token));
        debug!(%bounds, "Tracking region installed");
    }

    /// Track a handle; a displaced singleton is released right away
    fn track(&mut self, handle: ObserverHandle) {
        let Some(displaced) = self.registry.track(handle) else {
            return;
        };
        let mut releaser = ObserverReleaser {
            time_source: &mut self.time_source,
            float: &mut self.float,
            input: self.input.as_mut(),
            notifications: &self.notifications,
        };
        releaser.release(displaced);
    }

    /// The sampler's handle stays tracked from its first start until teardown
    fn track_float_sampler(&mut self) {
        let handle = self.float.sampler_handle();
        if self.float.is_observing() && !self.registry.contains(&handle) {
            self.track(handle);
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: MainEvent) {
        if self.closed {
            trace!(?event, "Controller closed, event ignored");
            return;
        }
        match event {
            MainEvent::AssetLoaded(readiness) => self.on_asset_loaded(readiness),
            MainEvent::ItemStatus(status) => self.on_item_status(status),
            MainEvent::ClockTick => {
                if let Some(engine) = self.session.engine() {
                    self.time_source.sample(engine);
                }
            }
            MainEvent::PeriodicTick(at) => self.on_periodic_tick(at),
            MainEvent::BoundaryCrossed(at) => {
                if let Some(rounded) = self.transcript.on_boundary(at) {
                    trace!(line = %rounded, "Transcript line highlighted");
                }
            }
            MainEvent::PlaybackSample => self.on_playback_sample(),
            MainEvent::Key(key) => self.on_key(key),
            MainEvent::PointerMoved => self.check_quick_fullscreen(),
            MainEvent::WindowResized => self.install_tracking_region(),
            MainEvent::Notification(notification) => self.on_notification(notification),
            MainEvent::Transcript(event) => self.on_transcript(event),
            MainEvent::Command(command) => self.on_command(command),
            MainEvent::WindowWillClose => {
                self.teardown();
            }
        }
    }

    fn on_asset_loaded(&mut self, readiness: AssetReadiness) {
        if !self.session.finish_load(readiness, self.backend.as_ref()) {
            self.window.set_loading(false);
            return;
        }

        if self.session.is_live() {
            let surface = self.session.surface_for(self.backend.platform_version());
            self.window.attach_surface(surface);
            self.session.observe_status(&self.ctx);
        } else {
            self.window.attach_surface(RenderSurface::Basic);
            let tracks = self
                .session
                .asset()
                .map(|asset| asset.video_track_sizes())
                .unwrap_or_default();
            self.sizer.setup(self.window.as_mut(), &tracks);

            let ctx = self.ctx.clone();
            let periodic = self.time_source.register_periodic(
                self.config.periodic_interval(),
                Box::new(move |at| ctx.post(MainEvent::PeriodicTick(at))),
            );
            self.track(periodic);
            self.time_source.start_clock(&self.ctx, self.config.clock_resolution());

            let resume_at = match &self.content {
                PlaybackContent::Recording { session, .. } => session.current_position(),
                PlaybackContent::Live(_) => 0.0,
            };
            if resume_at > 0.0 {
                self.session.seek_seconds(resume_at, self.config.resume_timescale);
                self.time_source.note_jump();
                info!(position = resume_at, "Resuming from saved position");
            }
            self.session.play();
            self.window.set_loading(false);

            if let Some(handle) = self.transcript.activate_pending(&mut self.time_source, &self.ctx) {
                self.track(handle);
            }
        }

        self.float.apply(self.window.as_mut(), self.session.is_playing());
        self.float.refresh(&self.ctx);
        self.track_float_sampler();
    }

    fn on_item_status(&mut self, status: ItemStatus) {
        let failed = matches!(status, ItemStatus::Failed(_));
        if self.session.on_item_status(status) {
            info!("Live stream ready, starting playback");
            self.window.set_loading(false);
            self.session.play();
            self.float.apply(self.window.as_mut(), self.session.is_playing());
        } else if failed {
            self.window.set_loading(false);
        }
    }

    fn on_periodic_tick(&mut self, at: MediaTime) {
        let progress = self.session.progress_at(at);
        if let PlaybackContent::Recording { session, .. } = &mut self.content {
            match progress {
                Some(progress) => session.record_progress(progress, at.seconds()),
                None => debug!(%at, "Duration unknown, progress not recorded"),
            }
        }
        self.float.refresh(&self.ctx);
        self.track_float_sampler();
    }

    fn on_playback_sample(&mut self) {
        let Some(playing) = self.session.is_playing() else {
            return;
        };
        if let Some(now_playing) = self.float.observe(playing) {
            self.float.apply(self.window.as_mut(), Some(now_playing));
            if now_playing {
                self.session.apply_selected_rate();
            }
        }
    }

    fn on_key(&mut self, event: KeyEvent) {
        if event.scope == MonitorScope::Global && self.input.snapshot().pointer_over_video {
            let step = self.config.jump_step_secs;
            match event.key {
                Key::LeftArrow => return self.jump_by(-step),
                Key::RightArrow => return self.jump_by(step),
                _ => {}
            }
        }
        self.check_quick_fullscreen();
    }

    fn check_quick_fullscreen(&mut self) {
        let input = self.input.snapshot();
        if let Some(transition) = self.quick_fullscreen.update(input, self.window.as_mut()) {
            trace!(?transition, "Quick fullscreen transition");
        }
    }

    fn jump_by(&mut self, delta: f64) {
        if self.session.jump_by(delta).is_some() {
            self.time_source.note_jump();
        }
    }

    fn on_notification(&mut self, notification: Notification) {
        match (notification, self.content.is_live()) {
            (Notification::LiveEventTitleAvailable(title), true) => {
                self.window.set_title(&live_title(&title));
                info!(title = %title, "Live event title updated");
            }
            (Notification::LiveEventWillStartPlaying, false) => {
                info!("Live event starting, pausing recording");
                self.session.pause();
            }
            (other, _) => trace!(?other, "Notification not relevant to this window"),
        }
    }

    fn on_transcript(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Ready(timecodes) => {
                let has_player = self.session.has_player();
                if let Some(handle) =
                    self.transcript
                        .activate(timecodes, has_player, &mut self.time_source, &self.ctx)
                {
                    self.track(handle);
                }
            }
            TranscriptEvent::JumpToTime(seconds) => {
                if self
                    .session
                    .seek_seconds(seconds, self.config.transcript_timescale)
                    .is_some()
                {
                    self.time_source.note_jump();
                }
            }
            TranscriptEvent::Closed => self.transcript.forget_panel(),
        }
    }

    fn on_command(&mut self, command: Command) {
        debug!(?command, "Command");
        match command {
            Command::Play => self.session.play(),
            Command::Pause => self.session.pause(),
            Command::SetRate(rate) => self.session.set_rate(rate),
            Command::SetFloatOnTop(style) => {
                self.float.set_style(style, &self.ctx);
                self.track_float_sampler();
                self.float.apply(self.window.as_mut(), self.session.is_playing());
            }
            Command::JumpBy(delta) => self.jump_by(delta),
            Command::SizeToFill => self.sizer.size_to_fill(self.window.as_mut()),
            Command::SizeToHalf => self.sizer.size_to(self.window.as_mut(), 0.5),
            Command::SizeToQuarter => self.sizer.size_to(self.window.as_mut(), 0.25),
            Command::ShowTranscript => {
                if self.content.is_live() {
                    debug!("Live events have no transcript");
                    return;
                }
                let title = self.window_title();
                self.transcript.show(self.transcripts.as_mut(), &title, &self.ctx);
            }
        }
    }

    /// Release everything this window installed. Safe to call repeatedly.
    ///
    /// Order: end the sleep-suppression activity, detach the item status
    /// observer, close the transcript panel, pause, release every tracked
    /// observer, then stop the clock and drop the player.
    #[instrument(skip(self), fields(window = %self.id))]
    pub fn teardown(&mut self) -> usize {
        if let Some(token) = self.activity_token.take() {
            self.activity.end(token);
        }
        self.session.detach_status_observer();
        self.transcript.close();
        self.session.pause();

        let mut releaser = ObserverReleaser {
            time_source: &mut self.time_source,
            float: &mut self.float,
            input: self.input.as_mut(),
            notifications: &self.notifications,
        };
        let released = self.registry.release_all(&mut releaser);

        self.time_source.shutdown();
        self.session.shutdown();

        if !self.closed {
            self.closed = true;
            info!(released, "Video window closed");
        }
        released
    }

    /// Apply the next queued event, waiting for one
    pub async fn step(&mut self) -> bool {
        match self.queue.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    /// Apply events until `matches` accepts one (which is applied too)
    pub async fn process_until<F>(&mut self, mut matches: F) -> Option<MainEvent>
    where
        F: FnMut(&MainEvent) -> bool,
    {
        while let Some(event) = self.queue.recv().await {
            let hit = matches(&event);
            self.handle(event.clone());
            if hit {
                return Some(event);
            }
        }
        None
    }

    /// Apply every event already queued; returns how many
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.queue.try_recv() {
            self.handle(event);
            applied += 1;
        }
        applied
    }

    /// Process events until the window closes
    pub async fn run(&mut self) {
        while !self.closed {
            if !self.step().await {
                break;
            }
        }
    }
}

impl Drop for VideoWindowController {
    fn drop(&mut self) {
        if !self.closed {
            self.teardown();
        }
    }
}

fn live_title(title: &str) -> String {
    format!("{title} (Live)")
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::catalog::{LiveEvent, SessionRecord};
    use crate::sim::{SimAsset, SimBackend, SimInput, SimPanelFactory, SimSuppressor, SimWindow};
    use crate::Rect;

    fn controller(content: PlaybackContent, backend: SimBackend) -> VideoWindowController {
        let collaborators = Collaborators {
            backend: Arc::new(backend),
            window: Box::new(SimWindow::new(Rect::new(0.0, 0.0, 640.0, 360.0))),
            input: Box::new(SimInput::new()),
            transcripts: Box::new(SimPanelFactory::new()),
            activity: Box::new(SimSuppressor::new()),
            notifications: NotificationCenter::new(),
        };
        VideoWindowController::new(
            content,
            collaborators,
            PlayerConfig::default(),
            SharedPreferences::default(),
            LaunchArgs::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_live_title() {
        assert_eq!(live_title("Keynote"), "Keynote (Live)");
    }

    #[tokio::test]
    async fn test_recording_title_uses_catalog_prefix() {
        let content = PlaybackContent::Recording {
            session: Box::new(SessionRecord::new(2015, "What's New in Cocoa")),
            url: "https://devstreaming.example.com/202_hd.mp4".to_string(),
        };
        let c = controller(content, SimBackend::new(SimAsset::recording(60.0)));
        assert_eq!(c.window_title(), "WWDC 2015 | What's New in Cocoa");
    }

    #[tokio::test]
    async fn test_live_without_stream_skips_setup() {
        let content = PlaybackContent::Live(LiveEvent {
            title: "Keynote".to_string(),
            stream: None,
            stream2: None,
        });
        let mut c = controller(content, SimBackend::new(SimAsset::live()));
        c.window_did_load();
        assert_eq!(c.phase(), SessionPhase::Idle);
        // notification subscription, two key monitors, tracking region
        assert_eq!(c.registry().len(), 4);
    }

    #[tokio::test]
    async fn test_events_after_teardown_are_ignored() {
        let content = PlaybackContent::Recording {
            session: Box::new(SessionRecord::new(2016, "Swift API Design")),
            url: "https://devstreaming.example.com/403_hd.mp4".to_string(),
        };
        let mut c = controller(content, SimBackend::new(SimAsset::recording(60.0)));
        c.window_did_load();
        c.teardown();
        c.handle(MainEvent::AssetLoaded(AssetReadiness::Ready));
        assert!(!c.session().has_player());
        assert!(c.registry().is_empty());
    }
}
