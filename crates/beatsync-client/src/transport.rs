//! The transport seam: how the coordinator talks to the server.
//!
//! The actual hub (WebSocket, SignalR, an in-memory fake in tests) is
//! an external collaborator. The coordinator only needs three calls,
//! each fire-and-await-ack — the ack correlates to the request itself,
//! never to the state-change events the request may cause, which can
//! arrive on a different channel and in either order.
//!
//! Inbound events are not part of this trait: the transport delivers
//! them on an `mpsc::UnboundedReceiver<ServerEvent>` handed to
//! [`spawn_coordinator`](crate::spawn_coordinator). Arrival order on
//! that channel is the only ordering signal the client gets.

use beatsync_protocol::{ClientRequest, RoomId, RoomSnapshot};

use crate::TransportError;

/// Outbound half of the server connection.
///
/// Implementations must be cheap to call concurrently; the coordinator
/// issues overlapping requests of different kinds.
pub trait RoomTransport: Send + Sync + 'static {
    /// Asks the server to add this client to `room`. Resolves with the
    /// full state snapshot the mirror is seeded from.
    fn join_room(
        &self,
        room: RoomId,
    ) -> impl std::future::Future<Output = Result<RoomSnapshot, TransportError>> + Send;

    /// Tells the server we're gone. Best-effort: the caller has already
    /// torn down local state by the time this runs.
    fn leave_room(&self) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Sends one mutating request and awaits its acknowledgement.
    fn send(
        &self,
        request: ClientRequest,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}

impl<T: RoomTransport> RoomTransport for std::sync::Arc<T> {
    fn join_room(
        &self,
        room: RoomId,
    ) -> impl std::future::Future<Output = Result<RoomSnapshot, TransportError>> + Send {
        (**self).join_room(room)
    }

    fn leave_room(&self) -> impl std::future::Future<Output = Result<(), TransportError>> + Send {
        (**self).leave_room()
    }

    fn send(
        &self,
        request: ClientRequest,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send {
        (**self).send(request)
    }
}
