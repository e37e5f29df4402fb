//! Time observation over the playback engine's clock
//!
//! The engine clock is sampled on a fixed resolution (see
//! [`TimeSource::start_clock`]). Each sample is fed to [`TimeSource::advance`],
//! which fires:
//! - the periodic observer once per `interval` of media time while playing,
//!   and on every discontinuity (seek, first sample);
//! - the boundary observer once for every listed timecode crossed by
//!   continuous playback, in timecode order, reporting the crossing time.
//!
//! At most one observer of each kind is registered; registering again
//! replaces the previous one.

use crate::{
    context::{MainContext, MainEvent},
    engine::PlaybackEngine,
    registry::{ObserverHandle, ObserverKind},
    MediaTime,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Timescale used to report boundary crossings
const BOUNDARY_TIMESCALE: i32 = 600;

/// Tolerance for interval comparisons on sampled clocks
const EPSILON: f64 = 1e-6;

/// Callback invoked with the observed time
pub type TimeCallback = Box<dyn FnMut(MediaTime) + Send>;

struct PeriodicObserver {
    token: u64,
    interval: f64,
    last_fired: Option<f64>,
    callback: TimeCallback,
}

struct BoundaryObserver {
    token: u64,
    timecodes: Vec<f64>,
    callback: TimeCallback,
}

/// Periodic and boundary notifications derived from engine time
#[derive(Default)]
pub struct TimeSource {
    next_token: u64,
    periodic: Option<PeriodicObserver>,
    boundary: Option<BoundaryObserver>,
    last_time: Option<f64>,
    jumped: bool,
    clock: Option<JoinHandle<()>>,
}

impl TimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Register the periodic observer, replacing any existing one
    pub fn register_periodic(&mut self, interval: Duration, callback: TimeCallback) -> ObserverHandle {
        let token = self.allocate_token();
        if let Some(old) = self.periodic.take() {
            debug!(token = old.token, "Replacing periodic time observer");
        }
        self.periodic = Some(PeriodicObserver {
            token,
            interval: interval.as_secs_f64(),
            last_fired: None,
            callback,
        });
        ObserverHandle::new(ObserverKind::PeriodicTime, token)
    }

    /// Register the boundary observer, replacing any existing one.
    ///
    /// Non-finite timecodes are dropped; duplicates collapse to one crossing.
    pub fn register_boundary(&mut self, timecodes: &[f64], callback: TimeCallback) -> ObserverHandle {
        let token = self.allocate_token();
        let mut timecodes: Vec<f64> = timecodes.iter().copied().filter(|t| t.is_finite()).collect();
        timecodes.sort_by(f64::total_cmp);
        timecodes.dedup();

        if let Some(old) = self.boundary.take() {
            debug!(token = old.token, "Replacing boundary time observer");
        }
        debug!(count = timecodes.len(), "Boundary time observer registered");
        self.boundary = Some(BoundaryObserver {
            token,
            timecodes,
            callback,
        });
        ObserverHandle::new(ObserverKind::BoundaryTime, token)
    }

    /// Remove an observer; returns false if it is no longer registered
    pub fn remove(&mut self, handle: ObserverHandle) -> bool {
        let slot_token = match handle.kind {
            ObserverKind::PeriodicTime => self.periodic.as_ref().map(|p| p.token),
            ObserverKind::BoundaryTime => self.boundary.as_ref().map(|b| b.token),
            _ => None,
        };
        if slot_token != Some(handle.token) {
            return false;
        }
        match handle.kind {
            ObserverKind::PeriodicTime => self.periodic = None,
            _ => self.boundary = None,
        }
        debug!(?handle, "Time observer removed");
        true
    }

    pub fn has_periodic(&self) -> bool {
        self.periodic.is_some()
    }

    pub fn has_boundary(&self) -> bool {
        self.boundary.is_some()
    }

    /// Mark the next sample as a discontinuity (the engine just seeked)
    pub fn note_jump(&mut self) {
        self.jumped = true;
    }

    /// Sample the engine clock
    pub fn sample(&mut self, engine: &dyn PlaybackEngine) {
        self.advance(engine.current_time(), engine.is_playing());
    }

    /// Feed one clock sample
    pub fn advance(&mut self, now: MediaTime, playing: bool) {
        let now_s = now.seconds();
        let previous = self.last_time.replace(now_s);
        let discontinuity = self.jumped || previous.map_or(true, |p| now_s < p);
        self.jumped = false;

        if let (false, Some(prev), Some(boundary)) = (discontinuity, previous, self.boundary.as_mut()) {
            let start = boundary.timecodes.partition_point(|&t| t <= prev);
            let end = boundary.timecodes.partition_point(|&t| t <= now_s);
            for &timecode in &boundary.timecodes[start..end] {
                trace!(timecode, "Boundary crossed");
                (boundary.callback)(MediaTime::from_seconds(timecode, BOUNDARY_TIMESCALE));
            }
        }

        if let Some(periodic) = self.periodic.as_mut() {
            let due = match periodic.last_fired {
                None => true,
                Some(last) => discontinuity || now_s - last + EPSILON >= periodic.interval,
            };
            if due && (playing || discontinuity) {
                periodic.last_fired = Some(now_s);
                (periodic.callback)(now);
            }
        }
    }

    /// Start posting [`MainEvent::ClockTick`] every `resolution`
    pub fn start_clock(&mut self, ctx: &MainContext, resolution: Duration) {
        if self.clock.is_some() {
            return;
        }
        let ctx = ctx.clone();
        self.clock = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(resolution);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if ctx.is_closed() {
                    break;
                }
                ctx.post(MainEvent::ClockTick);
            }
        }));
        debug!(?resolution, "Engine clock sampling started");
    }

    pub fn is_clock_running(&self) -> bool {
        self.clock.is_some()
    }

    /// Stop the clock and drop every observer
    pub fn shutdown(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
        self.periodic = None;
        self.boundary = None;
        self.last_time = None;
    }
}

impl Drop for TimeSource {
    fn drop(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, TimeCallback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, Box::new(move |t: MediaTime| sink.lock().unwrap().push(t.seconds())))
    }

    fn at(seconds: f64) -> MediaTime {
        MediaTime::from_seconds(seconds, 600)
    }

    #[test]
    fn test_boundary_crossings_fire_once_in_order() {
        let mut source = TimeSource::new();
        let (log, callback) = recorder();
        source.register_boundary(&[30.0, 10.0, 20.0], callback);

        source.advance(at(0.0), true);
        source.advance(at(9.5), true);
        source.advance(at(10.2), true);
        source.advance(at(10.4), true);
        source.advance(at(31.0), true);
        source.advance(at(31.0), true);

        assert_eq!(*log.lock().unwrap(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_jump_skips_boundaries() {
        let mut source = TimeSource::new();
        let (log, callback) = recorder();
        source.register_boundary(&[10.0, 20.0], callback);

        source.advance(at(0.0), true);
        source.note_jump();
        source.advance(at(15.0), true);
        source.advance(at(21.0), true);

        assert_eq!(*log.lock().unwrap(), vec![20.0]);
    }

    #[test]
    fn test_backwards_time_is_a_discontinuity() {
        let mut source = TimeSource::new();
        let (log, callback) = recorder();
        source.register_boundary(&[10.0], callback);

        source.advance(at(9.0), true);
        source.advance(at(11.0), true);
        source.advance(at(5.0), true);
        source.advance(at(12.0), true);

        assert_eq!(*log.lock().unwrap(), vec![10.0, 10.0]);
    }

    #[test]
    fn test_periodic_cadence() {
        let mut source = TimeSource::new();
        let (log, callback) = recorder();
        source.register_periodic(Duration::from_secs(5), callback);

        for step in 0..=12 {
            source.advance(at(f64::from(step)), true);
        }

        assert_eq!(*log.lock().unwrap(), vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_periodic_silent_while_paused() {
        let mut source = TimeSource::new();
        let (log, callback) = recorder();
        source.register_periodic(Duration::from_secs(5), callback);

        source.advance(at(0.0), true);
        source.advance(at(6.0), false);
        assert_eq!(log.lock().unwrap().len(), 1);

        source.note_jump();
        source.advance(at(100.0), false);
        assert_eq!(*log.lock().unwrap(), vec![0.0, 100.0]);
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut source = TimeSource::new();
        let (first_log, first) = recorder();
        let (second_log, second) = recorder();

        let old = source.register_boundary(&[1.0], first);
        let new = source.register_boundary(&[1.0], second);
        assert_ne!(old, new);
        assert!(!source.remove(old));

        source.advance(at(0.0), true);
        source.advance(at(2.0), true);
        assert!(first_log.lock().unwrap().is_empty());
        assert_eq!(second_log.lock().unwrap().len(), 1);

        assert!(source.remove(new));
        assert!(!source.remove(new));
        assert!(!source.has_boundary());
    }

    #[tokio::test]
    async fn test_clock_posts_ticks() {
        let (ctx, mut queue) = crate::context::main_context();
        let mut source = TimeSource::new();
        source.start_clock(&ctx, Duration::from_millis(5));
        assert!(source.is_clock_running());

        assert_eq!(queue.recv().await, Some(MainEvent::ClockTick));
        source.shutdown();
        assert!(!source.is_clock_running());
    }
}
