//! Error types for the spectator layer.
//!
//! Everything here is a caller invariant violation, not a network
//! condition — these fail fast and loud. Buffering ("waiting on
//! frames") is deliberately *not* an error; it is a steady state.

use beatsync_protocol::UserId;

/// Errors from player-area lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AreaError {
    /// `load` was called twice on the same area.
    #[error("player area for {0} already has a simulation loaded")]
    AlreadyLoaded(UserId),

    /// The replay handle belongs to a different user than the area.
    #[error("replay handle for {handle} given to the player area for {area}")]
    HandleMismatch { area: UserId, handle: UserId },

    /// The operation needs a loaded simulation.
    #[error("no simulation loaded for {0}")]
    NotLoaded(UserId),
}
