//! Synchronization tuning.

use tracing::warn;

/// Tuning for how player clocks chase the master's pacing target.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Playback-rate multiplier applied while a clock is catching up.
    /// Must be > 1 to make any progress on the gap.
    pub catch_up_rate: f64,

    /// How far (in ms) a clock may fall behind the pacing target
    /// before catch-up engages.
    pub catch_up_threshold_ms: f64,

    /// Once catching up, the lag (in ms) below which the clock is
    /// considered caught up again. Kept well under the threshold so
    /// the rate doesn't flap right at the boundary.
    pub caught_up_epsilon_ms: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            catch_up_rate: 2.0,
            catch_up_threshold_ms: 200.0,
            caught_up_epsilon_ms: 10.0,
        }
    }
}

impl SyncConfig {
    /// Clamp and fix any out-of-range values so the config is safe to
    /// use. Called automatically by the master clock's constructor.
    pub fn validated(mut self) -> Self {
        if !self.catch_up_rate.is_finite() || self.catch_up_rate < 1.0 {
            warn!(rate = self.catch_up_rate, "catch_up_rate below 1.0 — clamping");
            self.catch_up_rate = 1.0;
        }
        if !self.caught_up_epsilon_ms.is_finite() || self.caught_up_epsilon_ms < 0.0 {
            self.caught_up_epsilon_ms = 0.0;
        }
        if !self.catch_up_threshold_ms.is_finite()
            || self.catch_up_threshold_ms < self.caught_up_epsilon_ms
        {
            warn!(
                threshold_ms = self.catch_up_threshold_ms,
                epsilon_ms = self.caught_up_epsilon_ms,
                "catch_up_threshold_ms below caught_up_epsilon_ms — clamping"
            );
            self.catch_up_threshold_ms = self.caught_up_epsilon_ms;
        }
        self
    }
}
