//! Inbound server events and outbound client requests.
//!
//! Events are the only thing that may mutate the room mirror; requests
//! are fire-and-await-ack and never touch local state themselves. The
//! ack of a request is correlated to the request, not to whatever state
//! change it eventually causes — those may arrive on different channels
//! and in either order.

use serde::{Deserialize, Serialize};

use crate::types::{
    MatchRoomState, MatchUserState, PlaylistItem, PlaylistItemId, RoomId, RoomSettings,
    RoomSnapshot, RoomStatus, RoomUser, UserId, UserState,
};

// ---------------------------------------------------------------------------
// ServerEvent — pushed by the server at any time
// ---------------------------------------------------------------------------

/// A notification pushed from the server.
///
/// Arrival order is the only ordering signal there is: events carry no
/// sequence numbers, so consumers must be correct under plain
/// apply-in-delivery-order semantics.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "UserJoined", "user": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full room state, sent on join and on server-initiated resyncs.
    /// Applying it replaces the local model wholesale.
    RoomJoined { snapshot: RoomSnapshot },

    /// A user entered the room.
    UserJoined { user: RoomUser },

    /// A user left (or was kicked). Terminal for that user; there is no
    /// "Left" state on the user object.
    UserLeft { user_id: UserId },

    /// A user's status changed.
    UserStateChanged { user_id: UserId, state: UserState },

    /// A user's match-type-specific payload changed (e.g. team swap).
    MatchUserStateChanged {
        user_id: UserId,
        state: Option<MatchUserState>,
    },

    /// The host changed the room settings.
    SettingsChanged { settings: RoomSettings },

    /// The room's own lifecycle state changed.
    RoomStateChanged { status: RoomStatus },

    /// Host privileges were transferred.
    HostChanged { user_id: Option<UserId> },

    /// The room's match sub-state changed wholesale.
    MatchRoomStateChanged { state: Option<MatchRoomState> },

    /// A playlist item was appended.
    PlaylistItemAdded { item: PlaylistItem },

    /// An existing playlist item was edited or re-ordered.
    PlaylistItemChanged { item: PlaylistItem },

    /// A playlist item was removed.
    PlaylistItemRemoved { item_id: PlaylistItemId },

    /// A match-type-specific event (countdowns and the like). Opaque to
    /// the mirror; forwarded to whoever cares.
    MatchEvent { payload: serde_json::Value },
}

// ---------------------------------------------------------------------------
// ClientRequest — sent by the client, acked by the server
// ---------------------------------------------------------------------------

/// A match-type-specific request with a typed fast path for the shapes
/// we know and a verbatim fallback for the ones we don't.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "ChangeTeam")]
pub struct ChangeTeamRequest {
    pub team_id: u32,
}

/// Payload of [`ClientRequest::Match`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchRequest {
    ChangeTeam(ChangeTeamRequest),
    Other(serde_json::Value),
}

/// A mutating request issued to the server.
///
/// Requests never mutate the mirror directly; the mirror only changes
/// when the resulting [`ServerEvent`] comes back. A rejected request
/// therefore needs no rollback — it simply never produces an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRequest {
    JoinRoom { room_id: RoomId },
    LeaveRoom,
    ChangeState { state: UserState },
    ChangeSettings { settings: RoomSettings },
    Match { request: MatchRequest },
}

impl ClientRequest {
    /// The coalescing key: at most one request of each kind may be in
    /// flight at a time.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::JoinRoom { .. } => RequestKind::Join,
            Self::LeaveRoom => RequestKind::Leave,
            Self::ChangeState { .. } => RequestKind::ChangeState,
            Self::ChangeSettings { .. } => RequestKind::ChangeSettings,
            Self::Match { .. } => RequestKind::Match,
        }
    }
}

/// Kinds of mutating requests, used to enforce one-outstanding-per-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Join,
    Leave,
    ChangeState,
    ChangeSettings,
    Match,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_json_is_internally_tagged() {
        let ev = ServerEvent::UserStateChanged {
            user_id: UserId(4),
            state: UserState::Playing,
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "UserStateChanged");
        assert_eq!(json["user_id"], 4);
        assert_eq!(json["state"], "Playing");
    }

    #[test]
    fn test_user_left_parses() {
        let json = r#"{"type": "UserLeft", "user_id": 9}"#;
        let ev: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            ev,
            ServerEvent::UserLeft {
                user_id: UserId(9)
            }
        );
    }

    #[test]
    fn test_unknown_event_type_is_an_error() {
        // Unknown *event kinds* fail loudly — only match sub-state gets
        // the opaque-fallback treatment.
        let json = r#"{"type": "FlyToMoon", "speed": 9000}"#;
        let result: Result<ServerEvent, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_match_request_known_and_unknown() {
        let known: MatchRequest =
            serde_json::from_str(r#"{"type":"ChangeTeam","team_id":2}"#).unwrap();
        assert!(matches!(
            known,
            MatchRequest::ChangeTeam(ChangeTeamRequest { team_id: 2 })
        ));

        let raw = r#"{"type":"PickRelic","relic":7}"#;
        let unknown: MatchRequest = serde_json::from_str(raw).unwrap();
        assert!(matches!(unknown, MatchRequest::Other(_)));
        let back = serde_json::to_value(&unknown).unwrap();
        let original: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_request_kinds_coalesce_by_variant() {
        let a = ClientRequest::ChangeState {
            state: UserState::Ready,
        };
        let b = ClientRequest::ChangeState {
            state: UserState::Idle,
        };
        assert_eq!(a.kind(), b.kind());
        assert_ne!(a.kind(), ClientRequest::LeaveRoom.kind());
    }
}
