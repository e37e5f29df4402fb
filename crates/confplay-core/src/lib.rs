//! Confplay Core - Video Window Playback Core
//!
//! This crate provides the playback side of a conference video window:
//! - Asynchronous asset key loading and player construction
//! - Periodic progress persistence and resume
//! - Transcript line highlighting from boundary crossings
//! - Float-on-top window level policy
//! - Quick fullscreen while the zoom modifier is held
//! - Deterministic observer teardown on window close
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Video Window Controller                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Playback   │  │     Time     │  │  Transcript  │           │
//! │  │   Session    │  │    Source    │  │     Sync     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │ Main Queue  │ ◄── asset loads, timers,     │
//! │                    │  (context)  │     input, notifications     │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │ Float Policy │  │  Observer   │  │    Quick     │           │
//! │  │    Engine    │  │  Registry   │  │  Fullscreen  │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod context;
pub mod registry;
pub mod engine;
pub mod time_source;
pub mod notify;
pub mod window;
pub mod float_policy;
pub mod fullscreen;
pub mod transcript;
pub mod catalog;
pub mod session;
pub mod controller;
#[cfg(feature = "sim")]
pub mod sim;

pub use error::{Error, Result};
pub use types::*;
pub use config::{LaunchArgs, PlayerConfig, Preferences, SharedPreferences};
pub use context::{main_context, Command, MainContext, MainEvent, MainQueue};
pub use registry::{ObserverHandle, ObserverKind, ObserverRegistry};
pub use engine::{MediaAsset, MediaBackend, PlaybackEngine};
pub use time_source::TimeSource;
pub use notify::{Notification, NotificationCenter};
pub use float_policy::FloatPolicyEngine;
pub use fullscreen::QuickFullscreenMonitor;
pub use transcript::{format_timecode, TranscriptSync, TranscriptTimecodes};
pub use catalog::{LiveEvent, PlaybackContent, ResumableSession, SessionRecord};
pub use session::PlaybackSession;
pub use controller::{Collaborators, SleepSuppressor, VideoWindowController};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Confplay Core initialized");
}
