//! Room coordination for Beatsync.
//!
//! This crate is the client's connection between the server and the
//! local room mirror:
//!
//! 1. **Transport seam** — the [`RoomTransport`] trait plus an inbound
//!    event channel; the actual hub is an external collaborator.
//! 2. **Coordination** — a single actor task ([`spawn_coordinator`])
//!    that owns the mirror, pumps events into it in arrival order, and
//!    correlates requests with acknowledgements.
//! 3. **Access** — the cloneable [`RoomClient`] handle used by the UI
//!    and the spectator screen.
//!
//! # How it fits in the stack
//!
//! ```text
//! Spectator screen / UI  ← RoomClient (snapshots, updates, requests)
//!     ↕
//! Coordinator (this crate)  ← owns the RoomStateMirror
//!     ↕
//! Transport (external)  ← ServerEvent in, ClientRequest out
//! ```

#![allow(async_fn_in_trait)]

mod config;
mod coordinator;
mod error;
mod transport;

pub use config::ClientConfig;
pub use coordinator::{spawn_coordinator, RoomClient};
pub use error::{JoinError, RequestError, TransportError};
pub use transport::RoomTransport;
