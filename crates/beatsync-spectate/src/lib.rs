//! Synchronized multi-player spectating for Beatsync.
//!
//! Watching N participants at once means running N independently
//! loaded gameplay simulations against one shared virtual timeline,
//! where any member may stall, lag, or finish loading late.
//!
//! # Key types
//!
//! - [`SpectatorPlayerClock`] — one participant's adjustable playback
//!   clock, with catch-up/hold behavior
//! - [`MasterSpectatorClock`] — derives the group reference time from
//!   the slowest non-waiting member; ticked by the host frame loop
//! - [`PlayerArea`] — owns one participant's simulation lifecycle,
//!   clock registration, and audio gain
//! - [`Simulation`] — the seam to the (external) ruleset gameplay
//!   implementation
//! - [`SyncConfig`] — catch-up tuning

mod area;
mod clock;
mod config;
mod error;
mod master;
mod simulation;

pub use area::{PlayerArea, ReplayHandle};
pub use clock::{ClockId, SpectatorPlayerClock};
pub use config::SyncConfig;
pub use error::AreaError;
pub use master::{MasterClockHandle, MasterSpectatorClock};
pub use simulation::{Simulation, SimulationStatus};
