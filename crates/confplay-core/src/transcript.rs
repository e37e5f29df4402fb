//! Transcript panel synchronization
//!
//! Once the panel reports its transcript, a boundary observer is registered
//! for every line's timecode. Each crossing highlights the line whose
//! rounded timecode matches the crossing time.

use crate::{
    context::{MainContext, MainEvent},
    registry::ObserverHandle,
    time_source::TimeSource,
    MediaTime,
};
use tracing::{debug, info};

/// Ordered, immutable set of transcript line timecodes (seconds)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptTimecodes(Vec<f64>);

impl TranscriptTimecodes {
    pub fn new(mut timecodes: Vec<f64>) -> Self {
        timecodes.retain(|t| t.is_finite() && *t >= 0.0);
        timecodes.sort_by(f64::total_cmp);
        timecodes.dedup();
        Self(timecodes)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Callbacks from the transcript panel
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// The transcript finished loading
    Ready(TranscriptTimecodes),
    /// The user clicked a line
    JumpToTime(f64),
    /// The user closed the panel
    Closed,
}

/// The transcript panel window
pub trait TranscriptPanel: Send {
    fn highlight_line_at(&mut self, rounded_timecode: &str);

    fn bring_to_front(&mut self);

    fn close(&mut self);
}

/// Opens transcript panels; panels report back by posting
/// [`MainEvent::Transcript`] to the given context
pub trait TranscriptPanelFactory: Send {
    fn open(&mut self, session_title: &str, ctx: &MainContext) -> Box<dyn TranscriptPanel>;
}

/// Format a time the way transcript lines key their timecodes: rounded to
/// one decimal, without a trailing `.0`
pub fn format_timecode(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    if tenths % 10 == 0 {
        format!("{}", tenths / 10)
    } else {
        format!("{}.{}", tenths / 10, tenths % 10)
    }
}

/// Drives transcript highlighting from boundary crossings
#[derive(Default)]
pub struct TranscriptSync {
    panel: Option<Box<dyn TranscriptPanel>>,
    timecodes: Option<TranscriptTimecodes>,
    pending: Option<TranscriptTimecodes>,
}

impl TranscriptSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.panel.is_some()
    }

    pub fn timecodes(&self) -> Option<&TranscriptTimecodes> {
        self.timecodes.as_ref()
    }

    /// Open the panel, or bring the open one to the front
    pub fn show(&mut self, factory: &mut dyn TranscriptPanelFactory, title: &str, ctx: &MainContext) {
        match self.panel.as_mut() {
            Some(panel) => panel.bring_to_front(),
            None => {
                info!(title, "Opening transcript panel");
                self.panel = Some(factory.open(title, ctx));
            }
        }
    }

    /// Register boundary observation for the transcript's timecodes.
    ///
    /// Returns `None` when the panel has been closed in the meantime. Without
    /// a player the timecodes are held until [`Self::activate_pending`].
    pub fn activate(
        &mut self,
        timecodes: TranscriptTimecodes,
        has_player: bool,
        time_source: &mut TimeSource,
        ctx: &MainContext,
    ) -> Option<ObserverHandle> {
        if self.panel.is_none() {
            debug!("Transcript ready after panel closed, ignoring");
            return None;
        }
        if !has_player {
            debug!(lines = timecodes.len(), "No player yet, transcript sync deferred");
            self.pending = Some(timecodes);
            return None;
        }

        let ctx = ctx.clone();
        let handle = time_source.register_boundary(
            timecodes.as_slice(),
            Box::new(move |at| ctx.post(MainEvent::BoundaryCrossed(at))),
        );
        info!(lines = timecodes.len(), "Transcript sync active");
        self.timecodes = Some(timecodes);
        Some(handle)
    }

    /// Activate a transcript that arrived before the player existed
    pub fn activate_pending(
        &mut self,
        time_source: &mut TimeSource,
        ctx: &MainContext,
    ) -> Option<ObserverHandle> {
        let timecodes = self.pending.take()?;
        self.activate(timecodes, true, time_source, ctx)
    }

    /// Highlight the line for a boundary crossing; returns the rounded key
    pub fn on_boundary(&mut self, at: MediaTime) -> Option<String> {
        let panel = self.panel.as_mut()?;
        let rounded = format_timecode(at.seconds());
        panel.highlight_line_at(&rounded);
        Some(rounded)
    }

    /// The panel closed itself
    pub fn forget_panel(&mut self) {
        self.panel = None;
        self.pending = None;
    }

    /// Close the panel if open
    pub fn close(&mut self) {
        self.pending = None;
        if let Some(mut panel) = self.panel.take() {
            panel.close();
            debug!("Transcript panel closed");
        }
    }
}
