//! The simulation seam: what the spectator engine needs from a
//! ruleset's gameplay implementation.
//!
//! Hit judging, scoring, rendering — none of that is this crate's
//! business. A player area only ever starts a simulation against a
//! clock, polls where it is in its lifecycle, and stops it at teardown.

use crate::SpectatorPlayerClock;

/// Lifecycle of a spectated gameplay simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    /// Still loading beatmap/replay resources.
    Loading,
    /// Actively running gameplay.
    Gameplay,
    /// Finished the map.
    Completed,
    /// Failed out (or the replay ended early).
    Failed,
}

impl SimulationStatus {
    pub fn is_loaded(self) -> bool {
        !matches!(self, Self::Loading)
    }

    /// Terminal states: the player no longer holds the group back.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One participant's gameplay simulation, driven by a spectator clock.
///
/// Object-safe on purpose: areas own simulations as boxed trait
/// objects, one per spectated player, with no shared state between
/// them.
pub trait Simulation: Send + 'static {
    /// Begins (or begins loading toward) playback, paced by `clock`.
    /// Called exactly once, by the owning area's `load`.
    ///
    /// The simulation keeps the clock handle: it reads playback time
    /// from it and flips its `waiting_on_frames` flag as replay data
    /// buffers run dry or refill.
    fn start(&mut self, clock: SpectatorPlayerClock);

    /// Where the simulation is in its lifecycle. Polled every frame by
    /// the owning area.
    fn status(&self) -> SimulationStatus;

    /// Stops playback and releases resources. Must be safe to call on
    /// a simulation that never finished loading, and more than once.
    fn stop(&mut self);
}
