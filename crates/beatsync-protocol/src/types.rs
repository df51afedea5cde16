//! Core types shared by every layer of the client.
//!
//! Everything in this module mirrors a server-side shape: these are the
//! structures that arrive inside server events and leave inside client
//! requests. The room mirror and the spectator engine both consume them,
//! so they live in their own crate at the bottom of the dependency graph.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user, unique within a room.
///
/// Newtype over `u64` so a `UserId` can't be confused with a `RoomId`
/// even though both are plain integers on the wire.
/// `#[serde(transparent)]` keeps the JSON representation a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a multiplayer room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A unique identifier for a playlist item within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistItemId(pub u64);

impl fmt::Display for PlaylistItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PL-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// UserState — per-user state machine
// ---------------------------------------------------------------------------

/// A participant's status within a room.
///
/// The ordinary gameplay round trip is:
///
/// ```text
/// Idle → Ready → WaitingForLoad → Loaded → Playing → {Results | Idle}
/// ```
///
/// `Spectating` is a parallel branch entered from (and left back to)
/// `Idle`. Removal from the room is an event, not a state.
///
/// Transitions are server-driven. [`UserState::can_transition_to`]
/// encodes which hops the client *expects*, but the check is advisory
/// only: network reordering can deliver a newer state before an
/// intermediate one, so the mirror logs unexpected hops and stores the
/// server's value verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserState {
    /// In the room, not readied up.
    Idle,
    /// Readied up, waiting for the host to start.
    Ready,
    /// Gameplay was started; the client is loading the beatmap.
    WaitingForLoad,
    /// Load finished, waiting for everyone else before play begins.
    Loaded,
    /// Actively playing.
    Playing,
    /// Finished playing, viewing results.
    Results,
    /// Watching other participants instead of playing.
    Spectating,
}

impl UserState {
    /// Whether this state counts the user as "currently playing" for
    /// derived aggregates (the set the spectator screen is built from).
    pub fn is_playing(self) -> bool {
        matches!(self, Self::WaitingForLoad | Self::Playing)
    }

    /// Returns `true` if moving to `target` is an expected hop.
    ///
    /// Re-applying the current state is always expected (events can be
    /// re-delivered). Everything else follows the diagram above.
    pub fn can_transition_to(self, target: Self) -> bool {
        if self == target {
            return true;
        }
        matches!(
            (self, target),
            (Self::Idle, Self::Ready)
                | (Self::Idle, Self::Spectating)
                | (Self::Ready, Self::Idle)
                | (Self::Ready, Self::WaitingForLoad)
                | (Self::WaitingForLoad, Self::Loaded)
                | (Self::Loaded, Self::Playing)
                | (Self::Playing, Self::Results)
                | (Self::Playing, Self::Idle)
                | (Self::Results, Self::Idle)
                | (Self::Spectating, Self::Idle)
        )
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::Ready => "Ready",
            Self::WaitingForLoad => "WaitingForLoad",
            Self::Loaded => "Loaded",
            Self::Playing => "Playing",
            Self::Results => "Results",
            Self::Spectating => "Spectating",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus — room-level state machine
// ---------------------------------------------------------------------------

/// The lifecycle state of the room itself, as distinct from any one
/// user's state.
///
/// The server historically calls the open state `Idle`; the serde alias
/// keeps old payloads parseable while we emit the canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    /// Accepting players, nothing in progress.
    #[serde(alias = "Idle")]
    Open,
    /// Gameplay was started; participants are loading.
    WaitingForLoad,
    /// A round is in progress.
    Playing,
    /// The round ended; results are being shown.
    Results,
}

impl RoomStatus {
    /// Whether the room currently has a round underway.
    pub fn is_active(self) -> bool {
        matches!(self, Self::WaitingForLoad | Self::Playing)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "Open",
            Self::WaitingForLoad => "WaitingForLoad",
            Self::Playing => "Playing",
            Self::Results => "Results",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Match-type-specific sub-state
// ---------------------------------------------------------------------------

/// Per-user sub-state for the team-versus match type.
///
/// `#[serde(tag = "type")]` on the struct stamps/expects a
/// `"type": "TeamVersus"` discriminator, which is what lets the untagged
/// wrapper below tell known shapes from unknown ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "TeamVersus")]
pub struct TeamVersusUserState {
    /// Which team the user is assigned to.
    pub team_id: u32,
}

/// Match-type-specific per-user payload.
///
/// Known match types get a typed variant; anything else round-trips
/// verbatim as raw JSON so a newer server can ship match types this
/// client has never heard of without breaking the mirror. Serde tries
/// the typed variants first (they demand their `"type"` tag), then
/// falls back to `Unknown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchUserState {
    TeamVersus(TeamVersusUserState),
    Unknown(serde_json::Value),
}

impl MatchUserState {
    /// The user's team, when the match type has teams.
    pub fn team_id(&self) -> Option<u32> {
        match self {
            Self::TeamVersus(s) => Some(s.team_id),
            Self::Unknown(_) => None,
        }
    }
}

/// A team as described by the room's match sub-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTeam {
    pub id: u32,
    pub name: String,
}

/// Room-level sub-state for the team-versus match type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "TeamVersus")]
pub struct TeamVersusRoomState {
    pub teams: Vec<MatchTeam>,
}

/// Match-type-specific room payload, with the same opaque fallback as
/// [`MatchUserState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchRoomState {
    TeamVersus(TeamVersusRoomState),
    Unknown(serde_json::Value),
}

// ---------------------------------------------------------------------------
// Room contents
// ---------------------------------------------------------------------------

/// A participant as tracked by the room mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomUser {
    pub id: UserId,
    pub state: UserState,
    /// Match-type-specific payload (e.g. team assignment). `None` for
    /// match types that carry no per-user data.
    #[serde(default)]
    pub match_state: Option<MatchUserState>,
}

impl RoomUser {
    /// A user as they appear immediately after joining.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            state: UserState::Idle,
            match_state: None,
        }
    }
}

/// One entry in the room's playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: PlaylistItemId,
    pub beatmap_id: u64,
    pub ruleset_id: u32,
    /// Set once the item has been played; expired items stay in the list
    /// for history but are skipped by queue ordering.
    pub expired: bool,
    /// Position in the queue. Drives ordering, not the vec index —
    /// the server may renumber items.
    pub playlist_order: u16,
}

/// How gameplay rounds are organised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchType {
    #[default]
    HeadToHead,
    TeamVersus,
}

/// Room-level settings controlled by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub name: String,
    pub match_type: MatchType,
    /// When set, participants pick their own beatmap/ruleset/mods per
    /// round instead of playing the host's selection.
    #[serde(default)]
    pub freestyle: bool,
}

/// A full-state picture of a room, as delivered when joining (and on
/// server-initiated resyncs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub host: Option<UserId>,
    pub settings: RoomSettings,
    pub users: Vec<RoomUser>,
    pub playlist: Vec<PlaylistItem>,
    #[serde(default)]
    pub match_state: Option<MatchRoomState>,
}

// =========================================================================
// Tests
// =========================================================================
