//! Heater session: one timed heating run at one target temperature.
//!
//! ```text
//!            start                 pause
//!  STOPPED ─────────▶ PROCESSING ─────────▶ PAUSED
//!     ▲                 │   ▲                 │
//!     │   stop / done   │   └──── resume ─────┘
//!     └─────────────────┴──────── stop ───────┘
//! ```
//!
//! The session completes once `now >= start + duration + paused_total`.
//! Completion is reported through the callback registered with
//! [`HeaterSession::on_complete`]; it runs after the session lock is
//! released, so it may call back into the session.
//!
//! The heater task drives [`HeaterSession::tick`] with an unbounded lock.
//! Every other operation waits at most `lock_wait_ms`; if the lock is busy
//! the request is dropped, a fault is counted and a warning logged.

use core::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::control::relay::RelayController;
use crate::sync::TimedLock;

/// Session run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterState {
    Stopped,
    Processing,
    Paused,
}

/// Point-in-time view of the session for display and telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterSnapshot {
    pub state: HeaterState,
    pub target_c: u16,
    pub duration_ms: u32,
    pub elapsed_ms: u32,
    pub remaining_ms: u32,
    pub duty_percent: u8,
    pub energized: bool,
}

type CompletionFn = Box<dyn Fn() + Send + Sync>;

#[derive(Debug)]
struct Session {
    state: HeaterState,
    target_c: u16,
    duration_ms: u32,
    start_ms: u32,
    pause_start_ms: u32,
    paused_total_ms: u32,
    relay: RelayController,
}

impl Session {
    /// Heating time consumed so far, excluding pauses.
    fn elapsed_ms(&self, now_ms: u32) -> u32 {
        let until = match self.state {
            HeaterState::Paused => self.pause_start_ms,
            HeaterState::Processing => now_ms,
            HeaterState::Stopped => return 0,
        };
        until
            .wrapping_sub(self.start_ms)
            .saturating_sub(self.paused_total_ms)
    }

    fn remaining_ms(&self, now_ms: u32) -> u32 {
        match self.state {
            HeaterState::Stopped => 0,
            _ => self.duration_ms.saturating_sub(self.elapsed_ms(now_ms)),
        }
    }
}

/// Shared heater session.  Wrap in `Arc` to share between tasks.
pub struct HeaterSession {
    inner: TimedLock<Session>,
    wait: Duration,
    max_target_c: u16,
    current_c: AtomicU32,
    faults: AtomicU32,
    on_complete: Option<CompletionFn>,
}

impl HeaterSession {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            inner: TimedLock::new(
                "heater",
                Session {
                    state: HeaterState::Stopped,
                    target_c: 0,
                    duration_ms: 0,
                    start_ms: 0,
                    pause_start_ms: 0,
                    paused_total_ms: 0,
                    relay: RelayController::new(config),
                },
            ),
            wait: Duration::from_millis(u64::from(config.lock_wait_ms)),
            max_target_c: config.target_temp_max_c,
            current_c: AtomicU32::new(0f32.to_bits()),
            faults: AtomicU32::new(0),
            on_complete: None,
        }
    }

    /// Register the completion callback.  Called from the heater task.
    #[must_use]
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    // ── Setpoint ──────────────────────────────────────────────────

    /// Change the target temperature; takes effect on the next compute.
    pub fn set_temperature(&self, temp_c: u16) {
        let temp_c = temp_c.min(self.max_target_c);
        self.with("set_temperature", |s| {
            s.target_c = temp_c;
            s.relay.set_point(f32::from(temp_c));
        });
    }

    /// Change the session duration.
    pub fn set_time(&self, secs: u32) {
        self.with("set_time", |s| s.duration_ms = secs.saturating_mul(1000));
    }

    /// Set temperature and duration atomically.
    pub fn set_temp_time(&self, temp_c: u16, secs: u32) {
        let temp_c = temp_c.min(self.max_target_c);
        self.with("set_temp_time", |s| {
            s.target_c = temp_c;
            s.relay.set_point(f32::from(temp_c));
            s.duration_ms = secs.saturating_mul(1000);
        });
    }

    /// Lengthen or shorten the running session by `delta_secs`.  The new
    /// duration never drops below the heating time already spent.
    pub fn adjust_time(&self, delta_secs: i32, now_ms: u32) {
        self.with("adjust_time", |s| {
            let delta_ms = i64::from(delta_secs) * 1000;
            let wanted = (i64::from(s.duration_ms) + delta_ms).clamp(0, i64::from(u32::MAX));
            let floor = i64::from(s.elapsed_ms(now_ms));
            s.duration_ms = wanted.max(floor) as u32;
            debug!("Heater: duration now {} ms", s.duration_ms);
        });
    }

    // ── Run control ───────────────────────────────────────────────

    /// Stopped → Processing.
    pub fn start(&self, now_ms: u32) {
        self.with("start", |s| {
            if s.state != HeaterState::Stopped {
                debug!("Heater: start ignored in {:?}", s.state);
                return;
            }
            s.state = HeaterState::Processing;
            s.start_ms = now_ms;
            s.paused_total_ms = 0;
            s.relay.on();
            info!(
                "Heater: started {}\u{00b0}C for {} s",
                s.target_c,
                s.duration_ms / 1000
            );
        });
    }

    /// Processing → Paused.  The relay is forced off.
    pub fn pause(&self, now_ms: u32) {
        self.with("pause", |s| {
            if s.state != HeaterState::Processing {
                return;
            }
            s.state = HeaterState::Paused;
            s.pause_start_ms = now_ms;
            s.relay.off();
            info!("Heater: paused");
        });
    }

    /// Paused → Processing.  Pause time is excluded from the duration.
    pub fn resume(&self, now_ms: u32) {
        self.with("resume", |s| {
            if s.state != HeaterState::Paused {
                return;
            }
            let paused = now_ms.wrapping_sub(s.pause_start_ms);
            s.paused_total_ms = s.paused_total_ms.saturating_add(paused);
            s.state = HeaterState::Processing;
            s.relay.on();
            info!("Heater: resumed after {} ms", paused);
        });
    }

    /// Any state → Stopped.  The relay is forced off.
    pub fn stop(&self) {
        self.with("stop", |s| {
            if s.state != HeaterState::Stopped {
                info!("Heater: stopped");
            }
            s.state = HeaterState::Stopped;
            s.relay.off();
        });
    }

    // ── Heater task ───────────────────────────────────────────────

    /// Feed the supervised temperature, check for completion and return the
    /// relay level to drive.
    pub fn tick(&self, now_ms: u32, temp_c: f32) -> bool {
        self.current_c.store(temp_c.to_bits(), Ordering::Relaxed);

        let (relay_on, completed) = {
            let mut s = self.inner.lock();
            match s.state {
                HeaterState::Processing if s.elapsed_ms(now_ms) >= s.duration_ms => {
                    s.state = HeaterState::Stopped;
                    s.relay.off();
                    info!("Heater: session complete");
                    (false, true)
                }
                // Disarmed unless processing, so this reads back OFF.
                _ => (s.relay.update(now_ms, temp_c), false),
            }
        };

        if completed {
            if let Some(cb) = &self.on_complete {
                cb();
            }
        }
        relay_on
    }

    // ── Queries ───────────────────────────────────────────────────

    /// Last temperature fed by the heater task.  Lock-free.
    pub fn current_temperature(&self) -> f32 {
        f32::from_bits(self.current_c.load(Ordering::Relaxed))
    }

    /// Session state, or `None` if the lock was busy.
    pub fn state(&self) -> Option<HeaterState> {
        self.with("state", |s| s.state)
    }

    /// Heating time left, clamped at zero.  `None` if the lock was busy.
    pub fn time_remaining_ms(&self, now_ms: u32) -> Option<u32> {
        self.with("time_remaining", |s| s.remaining_ms(now_ms))
    }

    pub fn snapshot(&self, now_ms: u32) -> Option<HeaterSnapshot> {
        self.with("snapshot", |s| HeaterSnapshot {
            state: s.state,
            target_c: s.target_c,
            duration_ms: s.duration_ms,
            elapsed_ms: s.elapsed_ms(now_ms),
            remaining_ms: s.remaining_ms(now_ms),
            duty_percent: s.relay.duty_percent(),
            energized: s.relay.is_energized(),
        })
    }

    /// Lock acquisitions that timed out since boot.
    pub fn fault_count(&self) -> u32 {
        self.faults.load(Ordering::Relaxed)
    }

    // ── Internal ──────────────────────────────────────────────────

    fn with<R>(&self, op: &'static str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        match self.inner.lock_within(self.wait) {
            Ok(mut guard) => Some(f(&mut guard)),
            Err(e) => {
                let n = self.faults.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Heater: {e}, {op} dropped (faults={n})");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn session() -> HeaterSession {
        let s = HeaterSession::new(&SystemConfig::default());
        s.set_temp_time(180, 10);
        s
    }

    /// Drive the heater task at 10 ms over `[from, to)`.
    fn run(s: &HeaterSession, from: u32, to: u32, temp: f32) {
        for t in (from..to).step_by(10) {
            s.tick(t, temp);
        }
    }

    #[test]
    fn completes_after_duration() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let s = HeaterSession::new(&SystemConfig::default())
            .on_complete(move || flag.store(true, Ordering::SeqCst));
        s.set_temp_time(180, 10);
        s.start(0);

        run(&s, 0, 10_000, 20.0);
        assert!(!done.load(Ordering::SeqCst));
        assert_eq!(s.state(), Some(HeaterState::Processing));

        assert!(!s.tick(10_000, 20.0));
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(s.state(), Some(HeaterState::Stopped));
    }

    #[test]
    fn callback_may_reenter_session() {
        let slot: Arc<std::sync::OnceLock<Arc<HeaterSession>>> = Arc::new(std::sync::OnceLock::new());
        let inner = Arc::clone(&slot);
        let s = Arc::new(
            HeaterSession::new(&SystemConfig::default()).on_complete(move || {
                if let Some(h) = inner.get() {
                    // Must not deadlock: the session lock is already released.
                    assert_eq!(h.state(), Some(HeaterState::Stopped));
                }
            }),
        );
        let _ = slot.set(Arc::clone(&s));
        s.set_temp_time(100, 1);
        s.start(0);
        run(&s, 0, 1010, 20.0);
        assert_eq!(s.fault_count(), 0);
    }

    #[test]
    fn pause_resume_preserves_remaining_time() {
        let s = session();
        s.start(0);
        run(&s, 0, 3000, 20.0);
        let before = s.time_remaining_ms(3000).unwrap();
        s.pause(3000);
        run(&s, 3000, 33_000, 20.0);
        s.resume(33_000);
        let after = s.time_remaining_ms(33_000).unwrap();
        assert_eq!(before, after);
        assert_eq!(before, 7000);
    }

    #[test]
    fn paused_session_does_not_complete_and_relay_is_off() {
        let s = session();
        s.start(0);
        s.pause(1000);
        for t in (1000..60_000).step_by(10) {
            assert!(!s.tick(t, 20.0));
        }
        assert_eq!(s.state(), Some(HeaterState::Paused));
        assert_eq!(s.time_remaining_ms(60_000), Some(9000));
    }

    #[test]
    fn completion_accounts_for_pause() {
        let s = session();
        s.start(0);
        run(&s, 0, 3000, 20.0);
        s.pause(3000);
        s.resume(8000);
        run(&s, 8000, 15_000, 20.0);
        assert_eq!(s.state(), Some(HeaterState::Processing));
        s.tick(15_000, 20.0);
        assert_eq!(s.state(), Some(HeaterState::Stopped));
    }

    #[test]
    fn cold_oven_energizes_relay() {
        let s = session();
        s.start(0);
        assert!(s.tick(0, 20.0));
        let snap = s.snapshot(0).unwrap();
        assert!(snap.energized);
        assert_eq!(snap.target_c, 180);
    }

    #[test]
    fn stop_is_valid_from_any_state() {
        let s = session();
        s.stop();
        assert_eq!(s.state(), Some(HeaterState::Stopped));
        s.start(0);
        s.pause(10);
        s.stop();
        assert_eq!(s.state(), Some(HeaterState::Stopped));
        assert!(!s.tick(20, 20.0));
    }

    #[test]
    fn start_only_from_stopped() {
        let s = session();
        s.start(0);
        s.start(5000);
        assert_eq!(s.time_remaining_ms(5000), Some(5000));
    }

    #[test]
    fn remaining_time_never_negative() {
        let s = session();
        s.start(0);
        assert_eq!(s.time_remaining_ms(50_000), Some(0));
    }

    #[test]
    fn temperature_is_clamped_to_device_limit() {
        let s = HeaterSession::new(&SystemConfig::default());
        s.set_temperature(2000);
        assert_eq!(s.snapshot(0).unwrap().target_c, SystemConfig::default().target_temp_max_c);
    }

    #[test]
    fn adjust_time_never_below_elapsed() {
        let s = session();
        s.start(0);
        s.adjust_time(-60, 4000);
        assert_eq!(s.time_remaining_ms(4000), Some(0));
        s.adjust_time(120, 4000);
        assert_eq!(s.time_remaining_ms(4000), Some(120_000));
    }

    #[test]
    fn busy_lock_drops_request_and_counts_fault() {
        let s = Arc::new(session());
        let guard = s.inner.lock();
        let other = Arc::clone(&s);
        std::thread::spawn(move || other.start(0)).join().unwrap();
        drop(guard);
        assert_eq!(s.fault_count(), 1);
        assert_eq!(s.state(), Some(HeaterState::Stopped));
    }
}
