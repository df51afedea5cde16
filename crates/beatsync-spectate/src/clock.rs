//! Per-player playback clocks.
//!
//! A `SpectatorPlayerClock` is a cheap-to-clone handle over shared
//! atomic state: the frame loop advances it through the master clock,
//! while the owning simulation reads the time and flips
//! `waiting_on_frames` from whatever thread buffers replay data. No
//! locks anywhere on that path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::SyncConfig;

/// Counter for generating unique clock IDs.
static NEXT_CLOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one player clock within a master clock's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockId(u64);

impl std::fmt::Display for ClockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

struct ClockShared {
    id: ClockId,
    /// Playback position in milliseconds, stored as `f64` bits.
    current_time: AtomicU64,
    /// Set by the simulation side when it has consumed every buffered
    /// frame: the clock must hold rather than run ahead of data.
    waiting_on_frames: AtomicBool,
    /// Whether the most recent tick advanced the clock.
    is_running: AtomicBool,
    /// In catch-up mode since the last tick (hysteresis state).
    catching_up: AtomicBool,
    /// Effective playback rate applied on the last tick, as `f64` bits.
    rate: AtomicU64,
}

/// One spectated participant's adjustable playback clock.
#[derive(Clone)]
pub struct SpectatorPlayerClock {
    shared: Arc<ClockShared>,
}

impl SpectatorPlayerClock {
    /// A clock positioned at gameplay time zero.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ClockShared {
                id: ClockId(NEXT_CLOCK_ID.fetch_add(1, Ordering::Relaxed)),
                current_time: AtomicU64::new(0f64.to_bits()),
                waiting_on_frames: AtomicBool::new(false),
                is_running: AtomicBool::new(false),
                catching_up: AtomicBool::new(false),
                rate: AtomicU64::new(1f64.to_bits()),
            }),
        }
    }

    pub fn id(&self) -> ClockId {
        self.shared.id
    }

    /// Current playback position in milliseconds.
    pub fn current_time(&self) -> f64 {
        f64::from_bits(self.shared.current_time.load(Ordering::Relaxed))
    }

    /// Whether the most recent tick advanced this clock.
    pub fn is_running(&self) -> bool {
        self.shared.is_running.load(Ordering::Relaxed)
    }

    pub fn waiting_on_frames(&self) -> bool {
        self.shared.waiting_on_frames.load(Ordering::Relaxed)
    }

    /// Flipped by the simulation when it runs out of (or receives new)
    /// buffered frames. A persistent `true` is the "buffering" steady
    /// state, not an error.
    pub fn set_waiting_on_frames(&self, waiting: bool) {
        self.shared.waiting_on_frames.store(waiting, Ordering::Relaxed);
    }

    /// The playback rate applied on the last tick: `1.0` in lockstep,
    /// the configured catch-up rate while closing a gap.
    pub fn rate(&self) -> f64 {
        f64::from_bits(self.shared.rate.load(Ordering::Relaxed))
    }

    /// Advances the clock toward `target_time`.
    ///
    /// - Waiting on frames: no advance, whatever the target says.
    /// - Ahead of the target: hold until the target passes us.
    /// - Behind by more than the catch-up threshold: run at the
    ///   catch-up rate until within the caught-up epsilon.
    /// - Otherwise: advance at 1×, never overshooting the target.
    pub fn tick(&self, target_time: f64, elapsed: Duration, config: &SyncConfig) {
        if self.waiting_on_frames() {
            self.shared.is_running.store(false, Ordering::Relaxed);
            self.set_rate(1.0, false);
            return;
        }

        let current = self.current_time();
        let lag = target_time - current;
        if lag <= 0.0 {
            self.shared.is_running.store(false, Ordering::Relaxed);
            self.set_rate(1.0, false);
            return;
        }

        // Hysteresis: engage past the threshold, release only once the
        // gap left *after* this advance is inside the epsilon. (The
        // pre-advance lag is one frame even in lockstep, so releasing
        // on it would flap every tick.)
        let catching_up = self.shared.catching_up.load(Ordering::Relaxed)
            || lag > config.catch_up_threshold_ms;
        let rate = if catching_up { config.catch_up_rate } else { 1.0 };

        let advance = elapsed.as_secs_f64() * 1000.0 * rate;
        let next = (current + advance).min(target_time);
        let remaining = target_time - next;
        self.set_rate(rate, catching_up && remaining > config.caught_up_epsilon_ms);
        self.shared
            .current_time
            .store(next.to_bits(), Ordering::Relaxed);
        self.shared.is_running.store(true, Ordering::Relaxed);
    }

    fn set_rate(&self, rate: f64, catching_up: bool) {
        self.shared.rate.store(rate.to_bits(), Ordering::Relaxed);
        self.shared
            .catching_up
            .store(catching_up, Ordering::Relaxed);
    }
}

impl Default for SpectatorPlayerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpectatorPlayerClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectatorPlayerClock")
            .field("id", &self.shared.id)
            .field("current_time", &self.current_time())
            .field("waiting_on_frames", &self.waiting_on_frames())
            .field("rate", &self.rate())
            .finish()
    }
}
