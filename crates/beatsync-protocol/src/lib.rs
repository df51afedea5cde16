//! Server event and request shapes for Beatsync.
//!
//! This crate defines the "language" spoken between the client engine
//! and the multiplayer server, as seen from the client side:
//!
//! - **Types** ([`RoomSnapshot`], [`RoomUser`], [`UserState`], etc.) —
//!   the structures carried inside events and requests.
//! - **Events** ([`ServerEvent`]) — notifications pushed by the server.
//! - **Requests** ([`ClientRequest`]) — mutations the client asks for.
//!
//! It deliberately knows nothing about sockets or framing: the actual
//! transport is an external collaborator behind a trait in
//! `beatsync-client`. This crate only fixes the shapes.
//!
//! ```text
//! Transport (external) → ServerEvent → Mirror (beatsync-room)
//!                      ← ClientRequest ← Coordinator (beatsync-client)
//! ```

mod events;
mod types;

pub use events::{
    ChangeTeamRequest, ClientRequest, MatchRequest, RequestKind, ServerEvent,
};
pub use types::{
    MatchRoomState, MatchTeam, MatchType, MatchUserState, PlaylistItem, PlaylistItemId,
    RoomId, RoomSettings, RoomSnapshot, RoomStatus, RoomUser, TeamVersusRoomState,
    TeamVersusUserState, UserId, UserState,
};
