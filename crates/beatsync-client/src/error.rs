//! Error types for the client layer.
//!
//! The split mirrors the failure taxonomy: transport faults are what
//! the network reports, join/request errors are what callers of the
//! coordinator see. Protocol anomalies never surface here — the mirror
//! absorbs those.

use beatsync_protocol::RoomId;

/// Errors reported by the transport collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The server refused the operation (room full, banned, bad
    /// password, room gone...). The reason is server-provided text.
    #[error("rejected by server: {reason}")]
    Rejected { reason: String },

    /// The underlying connection is gone.
    #[error("connection lost")]
    ConnectionLost,
}

/// Failures of a [`join_room`](crate::RoomClient::join_room) call.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// The room no longer exists or rejected the user.
    #[error("join rejected: {reason}")]
    Rejected { reason: String },

    /// A newer join attempt replaced this one before it completed.
    /// The stale attempt's snapshot, if it ever arrives, is discarded.
    #[error("join superseded by a newer join attempt")]
    Superseded,

    /// The coordinator was torn down (or the room left) while the join
    /// was still awaiting its snapshot.
    #[error("join cancelled")]
    Cancelled,

    /// Already in a room. Leave first — joining twice is a caller bug,
    /// not a network condition.
    #[error("already joined room {0}")]
    AlreadyJoined(RoomId),

    /// No acknowledgement within the configured request timeout.
    #[error("join timed out")]
    TimedOut,

    /// The transport failed outright.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The coordinator task is gone.
    #[error("client closed")]
    ClientClosed,
}

impl JoinError {
    /// Maps a transport fault onto the join taxonomy: server rejections
    /// become [`JoinError::Rejected`], everything else stays transport.
    pub(crate) fn from_transport(error: TransportError) -> Self {
        match error {
            TransportError::Rejected { reason } => Self::Rejected { reason },
            other => Self::Transport(other),
        }
    }
}

/// Failures of a mutating request (state change, settings, match).
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// No room is joined. Fail-fast: issuing requests against a
    /// torn-down room is a caller invariant violation.
    #[error("not in a room")]
    NotJoined,

    /// A newer request of the same kind replaced this one before it
    /// was sent.
    #[error("request superseded by a newer request of the same kind")]
    Superseded,

    /// The room was left while the request was still pending.
    #[error("room closed before the request completed")]
    RoomClosed,

    /// No acknowledgement within the configured request timeout.
    #[error("request timed out")]
    TimedOut,

    /// The transport failed outright.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The coordinator task is gone.
    #[error("client closed")]
    ClientClosed,
}
