//! Audible alert scheduler.
//!
//! Up to [`ALERT_SLOTS`] independent on/off patterns share one buzzer.
//! Each pattern is a window of `period` ms that fires after `start_delay`
//! and then repeats after a further `repeat_delay`, `repeat_count` times
//! in total:
//!
//! ```text
//!  now+start_delay
//!  │◀ period ▶│◀ repeat_delay ▶│◀ period ▶│◀ repeat_delay ▶│◀ period ▶│
//!  ┌──────────┐                ┌──────────┐                ┌──────────┐
//! ─┘          └────────────────┘          └────────────────┘          └──
//! ```
//!
//! The buzzer output is the OR of every slot currently inside its window,
//! gated by a global mute that applies to every pattern.  [`AlertScheduler`] is the plain data
//! structure; [`SharedAlerts`] wraps it behind its own bounded-wait lock
//! for use from the controller, heater and alert tasks.

use core::num::NonZeroU32;
use core::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use crate::sync::TimedLock;

/// Maximum number of concurrently scheduled patterns.
pub const ALERT_SLOTS: usize = 10;

/// Opaque handle returned by [`AlertScheduler::add`].  Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertHandle(NonZeroU32);

impl AlertHandle {
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Patterns
// ═══════════════════════════════════════════════════════════════

/// A buzzer on/off pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPattern {
    pub start_delay_ms: u32,
    pub period_ms: u32,
    pub repeat_delay_ms: u32,
    /// Total number of windows; 0 and 1 both mean a single window.
    pub repeat_count: u32,
}

impl AlertPattern {
    /// One window starting immediately.
    pub const fn once(period_ms: u32) -> Self {
        Self {
            start_delay_ms: 0,
            period_ms,
            repeat_delay_ms: 0,
            repeat_count: 1,
        }
    }

    /// `count` windows separated by `gap_ms`, starting immediately.
    pub const fn repeating(period_ms: u32, gap_ms: u32, count: u32) -> Self {
        Self {
            start_delay_ms: 0,
            period_ms,
            repeat_delay_ms: gap_ms,
            repeat_count: count,
        }
    }

    /// Same pattern, shifted by `delay_ms`.
    #[must_use]
    pub const fn delayed(mut self, delay_ms: u32) -> Self {
        self.start_delay_ms = delay_ms;
        self
    }
}

/// Short confirmation chirp for UI feedback.
pub const CLICK: AlertPattern = AlertPattern::once(40);
/// Sensor failsafe: keeps sounding until the sensor recovers.
///
/// The global mute silences this like any other pattern.  The failsafe
/// itself (relay held off, `SensorFault` event, remote-log line) never
/// depends on the buzzer.
pub const SENSOR_FAULT: AlertPattern = AlertPattern::repeating(200, 100, u32::MAX);
/// A recipe could not be started.
pub const RECIPE_REJECTED: AlertPattern = AlertPattern::repeating(100, 100, 5);
/// Waiting for the user (PAUSE / PREHEATING ramp).
pub const HOLD: AlertPattern = AlertPattern::repeating(150, 2850, u32::MAX);
/// PREHEATING target reached.
pub const PREHEAT_REACHED: AlertPattern = AlertPattern::repeating(400, 600, u32::MAX);
/// SOUND event.
pub const CHIME: AlertPattern = AlertPattern::repeating(300, 200, 3);
/// One burst of the END alarm.
pub const END_ALARM: AlertPattern = AlertPattern::repeating(500, 250, 4);
/// A heat step (or whole manual session) finished.
pub const STEP_DONE: AlertPattern = AlertPattern::repeating(250, 250, 2);

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default)]
struct AlertSlot {
    handle: u32,
    active: bool,
    start: u32,
    period: u32,
    repeat_delay: u32,
    /// Windows still to come after the current one.
    remaining: u32,
}

/// Fixed-capacity pattern table.
#[derive(Debug)]
pub struct AlertScheduler {
    slots: [AlertSlot; ALERT_SLOTS],
    last_handle: u32,
    enabled: bool,
}

impl Default for AlertScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertScheduler {
    pub fn new() -> Self {
        Self {
            slots: [AlertSlot::default(); ALERT_SLOTS],
            last_handle: 0,
            enabled: true,
        }
    }

    /// Schedule `pattern` relative to `now_ms`.
    ///
    /// Returns `None` when the period is zero, every slot is busy, or the
    /// handle space is exhausted.
    pub fn add(&mut self, now_ms: u32, pattern: AlertPattern) -> Option<AlertHandle> {
        if pattern.period_ms == 0 {
            warn!("Alerts: rejected pattern with zero period");
            return None;
        }
        let Some(slot) = self.slots.iter_mut().find(|s| !s.active) else {
            warn!("Alerts: all {} slots busy", ALERT_SLOTS);
            return None;
        };
        let handle = NonZeroU32::new(self.last_handle.checked_add(1)?)?;
        self.last_handle = handle.get();

        *slot = AlertSlot {
            handle: handle.get(),
            active: true,
            start: now_ms.wrapping_add(pattern.start_delay_ms),
            period: pattern.period_ms,
            repeat_delay: pattern.repeat_delay_ms,
            remaining: pattern.repeat_count.saturating_sub(1),
        };
        debug!("Alerts: added #{} {:?}", handle, pattern);
        Some(AlertHandle(handle))
    }

    /// Cancel a pattern.  Returns `false` for unknown or finished handles.
    pub fn delete(&mut self, handle: AlertHandle) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|s| s.active && s.handle == handle.get())
        {
            Some(slot) => {
                *slot = AlertSlot::default();
                debug!("Alerts: deleted #{}", handle.get());
                true
            }
            None => false,
        }
    }

    /// Global mute.  Patterns keep advancing while muted.
    pub fn activate(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!("Alerts: {}", if enabled { "unmuted" } else { "muted" });
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `handle` is still scheduled.
    pub fn is_scheduled(&self, handle: AlertHandle) -> bool {
        self.slots
            .iter()
            .any(|s| s.active && s.handle == handle.get())
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// Advance every slot to `now_ms` and return the buzzer level.
    pub fn evaluate(&mut self, now_ms: u32) -> bool {
        let mut on = false;
        for slot in self.slots.iter_mut().filter(|s| s.active) {
            loop {
                let since = now_ms.wrapping_sub(slot.start) as i32;
                if since < 0 {
                    break;
                }
                if (since as u32) < slot.period {
                    on = true;
                    break;
                }
                if slot.remaining == 0 {
                    slot.active = false;
                    break;
                }
                slot.start = slot
                    .start
                    .wrapping_add(slot.period)
                    .wrapping_add(slot.repeat_delay);
                slot.remaining -= 1;
            }
        }
        on && self.enabled
    }
}

// ═══════════════════════════════════════════════════════════════
//  Shared handle
// ═══════════════════════════════════════════════════════════════

/// [`AlertScheduler`] behind its own bounded-wait lock.
///
/// Every operation gives up after `wait`; a dropped operation counts as a
/// fault and reports failure to the caller (`None` / `false`).
pub struct SharedAlerts {
    inner: TimedLock<AlertScheduler>,
    wait: Duration,
    faults: AtomicU32,
}

impl SharedAlerts {
    pub fn new(wait: Duration) -> Self {
        Self {
            inner: TimedLock::new("alerts", AlertScheduler::new()),
            wait,
            faults: AtomicU32::new(0),
        }
    }

    pub fn add(&self, now_ms: u32, pattern: AlertPattern) -> Option<AlertHandle> {
        self.with(|s| s.add(now_ms, pattern)).flatten()
    }

    pub fn delete(&self, handle: AlertHandle) -> bool {
        self.with(|s| s.delete(handle)).unwrap_or(false)
    }

    pub fn activate(&self, enabled: bool) {
        let _ = self.with(|s| s.activate(enabled));
    }

    pub fn is_scheduled(&self, handle: AlertHandle) -> bool {
        self.with(|s| s.is_scheduled(handle)).unwrap_or(false)
    }

    /// Occupied slots, 0 if the table was busy.
    pub fn active_count(&self) -> usize {
        self.with(|s| s.active_count()).unwrap_or(0)
    }

    /// Buzzer level at `now_ms`, or `None` if the table was busy.
    pub fn evaluate(&self, now_ms: u32) -> Option<bool> {
        self.with(|s| s.evaluate(now_ms))
    }

    /// Lock acquisitions that timed out since boot.
    pub fn fault_count(&self) -> u32 {
        self.faults.load(Ordering::Relaxed)
    }

    fn with<R>(&self, f: impl FnOnce(&mut AlertScheduler) -> R) -> Option<R> {
        match self.inner.lock_within(self.wait) {
            Ok(mut guard) => Some(f(&mut guard)),
            Err(e) => {
                self.faults.fetch_add(1, Ordering::Relaxed);
                warn!("Alerts: {e}, request dropped");
                None
            }
        }
    }
}
