//! CLI command implementations

use crate::RunOptions;
use anyhow::Context;
use confplay_core::{
    sim::{
        SharedSession, SimAsset, SimBackend, SimInput, SimPanelFactory, SimPanelProbe,
        SimPlayerProbe, SimSuppressor, SimSuppressorProbe, SimWindow, SimWindowProbe,
    },
    AssetKey, Collaborators, Command, LaunchArgs, LiveEvent, MainEvent, NotificationCenter,
    PlaybackContent, PlayerConfig, Rect, SessionRecord, SharedPreferences, VideoWindowController,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Wall-clock step of the simulated player
const DRIVE_STEP: Duration = Duration::from_millis(250);

pub struct RecordingArgs {
    pub url: String,
    pub title: String,
    pub year: u32,
    pub position: f64,
    pub duration: f64,
    pub transcript_every: Option<f64>,
}

/// What the window looked like when it closed
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub window: String,
    pub title: String,
    pub phase: String,
    pub level: Option<String>,
    pub surface: Option<String>,
    pub players_created: usize,
    pub player_calls: usize,
    pub position: f64,
    pub volume: f32,
    pub highlights: Vec<String>,
    pub observers_released: u64,
    pub sleep_activities_ended: usize,
    pub record: Option<SessionRecord>,
}

struct Probes {
    player: SimPlayerProbe,
    window: SimWindowProbe,
    panel: SimPanelProbe,
    activity: SimSuppressorProbe,
}

fn load_prefs(run: &RunOptions) -> anyhow::Result<SharedPreferences> {
    let prefs = match &run.prefs {
        Some(path) => SharedPreferences::load(path)
            .with_context(|| format!("Failed to load preferences from {}", path.display()))?,
        None => SharedPreferences::default(),
    };
    if let Some(style) = run.float {
        prefs.set_float_on_top_style(style);
    }
    Ok(prefs)
}

fn load_config(run: &RunOptions) -> anyhow::Result<PlayerConfig> {
    let Some(path) = &run.config else {
        return Ok(PlayerConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: PlayerConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

fn build(
    content: PlaybackContent,
    backend: SimBackend,
    run: &RunOptions,
) -> anyhow::Result<(VideoWindowController, Probes)> {
    let window = SimWindow::new(Rect::new(200.0, 150.0, 960.0, 540.0));
    let panels = SimPanelFactory::new();
    let activity = SimSuppressor::new();
    let probes = Probes {
        player: backend.player_probe(),
        window: window.probe(),
        panel: panels.probe(),
        activity: activity.probe(),
    };

    let collaborators = Collaborators {
        backend: Arc::new(backend),
        window: Box::new(window),
        input: Box::new(SimInput::new()),
        transcripts: Box::new(panels),
        activity: Box::new(activity),
        notifications: NotificationCenter::new(),
    };
    let controller = VideoWindowController::new(
        content,
        collaborators,
        load_config(run)?,
        load_prefs(run)?,
        LaunchArgs::from_args(&run.launch),
    )?;
    Ok((controller, probes))
}

/// Run the window until the driver closes it
async fn drive(
    mut controller: VideoWindowController,
    probes: Probes,
    run: &RunOptions,
    transcript: Option<Vec<f64>>,
    record: Option<SharedSession>,
) -> anyhow::Result<RunSummary> {
    controller.window_did_load();

    let ctx = controller.context();
    let player = probes.player.clone();
    let panel = probes.panel.clone();
    let play_for = run.play_for.max(0.0);
    let media_step = DRIVE_STEP.as_secs_f64() * run.speed;

    let driver = tokio::spawn(async move {
        if let Some(timecodes) = transcript {
            ctx.post(MainEvent::Command(Command::ShowTranscript));
            tokio::time::sleep(Duration::from_millis(100)).await;
            if !panel.transcript_ready(timecodes) {
                warn!("Transcript panel did not open");
            }
        }

        let mut elapsed = 0.0;
        while elapsed < play_for {
            tokio::time::sleep(DRIVE_STEP).await;
            player.advance(media_step);
            elapsed += DRIVE_STEP.as_secs_f64();
        }
        ctx.post(MainEvent::WindowWillClose);
    });

    controller.run().await;
    driver.await.context("Driver task failed")?;

    let window = probes.window.snapshot();
    let player = probes.player.snapshot();
    let summary = RunSummary {
        window: controller.id().to_string(),
        title: window.title,
        phase: controller.phase().to_string(),
        level: window.level.map(|l| format!("{l:?}")),
        surface: window.surface.map(|s| format!("{s:?}")),
        players_created: player.created,
        player_calls: probes.player.calls().len(),
        position: player.position,
        volume: player.volume,
        highlights: probes.panel.snapshot().highlights,
        observers_released: controller.registry().released_total(),
        sleep_activities_ended: probes.activity.snapshot().ended,
        record: record.map(|r| r.record()),
    };
    info!(phase = %summary.phase, released = summary.observers_released, "Window run finished");
    Ok(summary)
}

/// Play a recorded session
pub async fn play_recording(args: RecordingArgs, run: &RunOptions) -> anyhow::Result<RunSummary> {
    let mut record = SessionRecord::new(args.year, args.title);
    record.current_position = args.position;
    let shared = SharedSession::new(record);

    let transcript = match args.transcript_every {
        Some(every) => {
            anyhow::ensure!(every > 0.0, "--transcript-every must be positive");
            let lines = (args.duration / every).floor() as usize;
            Some((1..=lines).map(|i| i as f64 * every).collect())
        }
        None => None,
    };

    let content = PlaybackContent::Recording {
        session: Box::new(shared.clone()),
        url: args.url,
    };
    let backend = SimBackend::new(SimAsset::recording(args.duration)).with_platform(run.platform);
    let (controller, probes) = build(content, backend, run)?;
    drive(controller, probes, run, transcript, Some(shared)).await
}

/// Play a live event
pub async fn play_live(
    title: String,
    stream: Option<String>,
    stream2: Option<String>,
    fail_playable: Option<String>,
    run: &RunOptions,
) -> anyhow::Result<RunSummary> {
    let mut asset = SimAsset::live();
    if let Some(reason) = &fail_playable {
        asset = asset.with_failed_key(AssetKey::Playable, reason);
    }
    let backend = SimBackend::new(asset).with_platform(run.platform).auto_ready();
    let content = PlaybackContent::Live(LiveEvent {
        title,
        stream,
        stream2,
    });
    let (controller, probes) = build(content, backend, run)?;
    drive(controller, probes, run, None, None).await
}
