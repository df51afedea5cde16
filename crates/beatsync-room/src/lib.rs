//! Room mirroring for Beatsync.
//!
//! The client keeps a locally consistent copy of a server-authoritative
//! multiplayer room under an asynchronous event stream.
//!
//! # Key types
//!
//! - [`RoomModel`] — the aggregate room entity (users, playlist, host)
//! - [`RoomStateMirror`] — applies server events, exposes coalesced
//!   change notifications and the derived playing-user set
//! - [`RoomUpdate`] — the one-per-batch notification payload
//!
//! The mirror exclusively owns its model: consumers get `&RoomModel`
//! or clones, never mutable access. All mutation happens from a single
//! event-delivery context, which is what makes the "no intermediate
//! state observed" guarantee possible without locks.

mod mirror;
mod model;

pub use mirror::{RoomStateMirror, RoomUpdate};
pub use model::RoomModel;
