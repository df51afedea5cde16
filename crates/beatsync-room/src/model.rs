//! The room model: the client's local copy of one multiplayer room.
//!
//! A `RoomModel` is built from a full [`RoomSnapshot`] when a room is
//! joined, mutated incrementally by the mirror until the room is left,
//! and then discarded — rejoining always constructs a fresh instance
//! from a fresh snapshot. Nothing outside the mirror mutates it; every
//! other component sees it through `&RoomModel` or a clone.

use beatsync_protocol::{
    MatchRoomState, PlaylistItem, PlaylistItemId, RoomId, RoomSettings, RoomSnapshot,
    RoomStatus, RoomUser, UserId,
};
use serde::Serialize;

/// The aggregate room entity: metadata, ordered user list, playlist,
/// and match-type-specific sub-state.
#[derive(Debug, Clone, Serialize)]
pub struct RoomModel {
    pub(crate) room_id: RoomId,
    pub(crate) status: RoomStatus,
    pub(crate) host: Option<UserId>,
    pub(crate) settings: RoomSettings,
    /// Users in join order. Removal is arbitrary-position, so lookups
    /// scan — room sizes are tens of users, not thousands.
    pub(crate) users: Vec<RoomUser>,
    pub(crate) playlist: Vec<PlaylistItem>,
    pub(crate) match_state: Option<MatchRoomState>,
}

impl RoomModel {
    /// Builds a model from a full server snapshot.
    pub fn from_snapshot(snapshot: RoomSnapshot) -> Self {
        Self {
            room_id: snapshot.room_id,
            status: snapshot.status,
            host: snapshot.host,
            settings: snapshot.settings,
            users: snapshot.users,
            playlist: snapshot.playlist,
            match_state: snapshot.match_state,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn host(&self) -> Option<UserId> {
        self.host
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn match_state(&self) -> Option<&MatchRoomState> {
        self.match_state.as_ref()
    }

    /// All users, in join order.
    pub fn users(&self) -> &[RoomUser] {
        &self.users
    }

    pub fn contains_user(&self, id: UserId) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    pub fn user(&self, id: UserId) -> Option<&RoomUser> {
        self.users.iter().find(|u| u.id == id)
    }

    pub(crate) fn user_mut(&mut self, id: UserId) -> Option<&mut RoomUser> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// The raw playlist, including expired items, in server order.
    pub fn playlist(&self) -> &[PlaylistItem] {
        &self.playlist
    }

    pub fn playlist_item(&self, id: PlaylistItemId) -> Option<&PlaylistItem> {
        self.playlist.iter().find(|i| i.id == id)
    }

    /// Unexpired playlist items ordered by their queue position.
    pub fn queue(&self) -> Vec<&PlaylistItem> {
        let mut items: Vec<&PlaylistItem> =
            self.playlist.iter().filter(|i| !i.expired).collect();
        items.sort_by_key(|i| i.playlist_order);
        items
    }

    /// The item up next, if the queue is non-empty.
    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.queue().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatsync_protocol::{MatchType, UserState};

    fn item(id: u64, order: u16, expired: bool) -> PlaylistItem {
        PlaylistItem {
            id: PlaylistItemId(id),
            beatmap_id: 100 + id,
            ruleset_id: 0,
            expired,
            playlist_order: order,
        }
    }

    fn snapshot() -> RoomSnapshot {
        RoomSnapshot {
            room_id: RoomId(1),
            status: RoomStatus::Open,
            host: Some(UserId(10)),
            settings: RoomSettings {
                name: "test room".into(),
                match_type: MatchType::HeadToHead,
                freestyle: false,
            },
            users: vec![RoomUser::new(UserId(10)), RoomUser::new(UserId(11))],
            playlist: vec![item(3, 1, false), item(1, 0, true), item(2, 2, false)],
            match_state: None,
        }
    }

    #[test]
    fn test_from_snapshot_preserves_join_order() {
        let model = RoomModel::from_snapshot(snapshot());
        let ids: Vec<UserId> = model.users().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![UserId(10), UserId(11)]);
        assert_eq!(model.host(), Some(UserId(10)));
    }

    #[test]
    fn test_queue_skips_expired_and_sorts_by_order() {
        let model = RoomModel::from_snapshot(snapshot());
        let ids: Vec<PlaylistItemId> = model.queue().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![PlaylistItemId(3), PlaylistItemId(2)]);
        assert_eq!(model.current_item().unwrap().id, PlaylistItemId(3));
    }

    #[test]
    fn test_user_lookup() {
        let model = RoomModel::from_snapshot(snapshot());
        assert!(model.contains_user(UserId(11)));
        assert!(!model.contains_user(UserId(99)));
        assert_eq!(model.user(UserId(10)).unwrap().state, UserState::Idle);
    }
}
