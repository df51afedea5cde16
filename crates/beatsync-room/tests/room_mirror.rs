//! Integration tests for the room mirror.
//!
//! The mirror is synchronous by design (single event-delivery context),
//! so these tests drive it directly and observe notifications through
//! `try_recv` on the broadcast channel.

use std::collections::HashSet;

use beatsync_protocol::{
    MatchType, MatchUserState, PlaylistItem, PlaylistItemId, RoomId, RoomSettings,
    RoomSnapshot, RoomStatus, RoomUser, ServerEvent, TeamVersusUserState, UserId, UserState,
};
use beatsync_room::RoomStateMirror;

// =========================================================================
// Helpers
// =========================================================================

fn uid(id: u64) -> UserId {
    UserId(id)
}

fn user(id: u64) -> RoomUser {
    RoomUser::new(uid(id))
}

fn item(id: u64, order: u16) -> PlaylistItem {
    PlaylistItem {
        id: PlaylistItemId(id),
        beatmap_id: 1000 + id,
        ruleset_id: 0,
        expired: false,
        playlist_order: order,
    }
}

fn empty_snapshot() -> RoomSnapshot {
    RoomSnapshot {
        room_id: RoomId(1),
        status: RoomStatus::Open,
        host: None,
        settings: RoomSettings {
            name: "test".into(),
            match_type: MatchType::HeadToHead,
            freestyle: false,
        },
        users: vec![],
        playlist: vec![],
        match_state: None,
    }
}

fn snapshot_with_users(ids: &[u64]) -> RoomSnapshot {
    let mut s = empty_snapshot();
    s.users = ids.iter().map(|&id| user(id)).collect();
    s.host = ids.first().map(|&id| uid(id));
    s
}

/// The ground truth the derived set must always match: a fresh scan
/// over the model.
fn scan_playing(mirror: &RoomStateMirror) -> HashSet<UserId> {
    mirror
        .model()
        .users()
        .iter()
        .filter(|u| u.state.is_playing())
        .map(|u| u.id)
        .collect()
}

// =========================================================================
// PlayingUserSet invariants
// =========================================================================

#[test]
fn test_playing_set_is_pure_function_of_current_state() {
    let mut mirror = RoomStateMirror::new(empty_snapshot());

    let events = vec![
        ServerEvent::UserJoined { user: user(1) },
        ServerEvent::UserJoined { user: user(2) },
        ServerEvent::UserStateChanged {
            user_id: uid(1),
            state: UserState::WaitingForLoad,
        },
        ServerEvent::UserJoined { user: user(3) },
        ServerEvent::UserStateChanged {
            user_id: uid(2),
            state: UserState::Playing,
        },
        ServerEvent::UserLeft { user_id: uid(1) },
        ServerEvent::UserStateChanged {
            user_id: uid(3),
            state: UserState::Spectating,
        },
        ServerEvent::UserLeft { user_id: uid(2) },
        // Anomalies mixed in: none of these may corrupt the set.
        ServerEvent::UserLeft { user_id: uid(99) },
        ServerEvent::UserJoined { user: user(3) },
    ];

    for event in events {
        mirror.apply(event);
        assert_eq!(
            *mirror.playing_users(),
            scan_playing(&mirror),
            "derived set diverged from model scan"
        );
    }
}

#[test]
fn test_five_user_gameplay_round() {
    let mut mirror = RoomStateMirror::new(empty_snapshot());
    for id in 1..=5 {
        mirror.apply_user_joined(user(id));
    }

    // Three users load in, then start playing: the set counts each user
    // once, never twice across the two transitions.
    for id in 1..=3 {
        mirror.apply_user_state_changed(uid(id), UserState::WaitingForLoad);
    }
    assert_eq!(mirror.playing_users().len(), 3);

    for id in 1..=3 {
        mirror.apply_user_state_changed(uid(id), UserState::Playing);
        assert_eq!(mirror.playing_users().len(), 3);
    }

    // One leaves mid-play: reflected immediately, not on the next
    // unrelated event.
    mirror.apply_user_left(uid(2));
    assert_eq!(mirror.playing_users().len(), 2);
    assert!(!mirror.playing_users().contains(&uid(2)));

    // The rest finish.
    mirror.apply_user_state_changed(uid(1), UserState::Results);
    mirror.apply_user_state_changed(uid(3), UserState::Results);
    assert!(mirror.playing_users().is_empty());
}

#[test]
fn test_match_state_change_does_not_affect_playing_set() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1, 2]));
    mirror.apply_user_state_changed(uid(1), UserState::WaitingForLoad);
    let before = mirror.playing_users().clone();

    mirror.apply_match_user_state_changed(
        uid(1),
        Some(MatchUserState::TeamVersus(TeamVersusUserState { team_id: 1 })),
    );
    assert_eq!(*mirror.playing_users(), before);
}

// =========================================================================
// Idempotent re-delivery
// =========================================================================

#[test]
fn test_duplicate_user_joined_is_noop() {
    let mut mirror = RoomStateMirror::new(empty_snapshot());
    mirror.apply_user_joined(user(1));
    mirror.flush();

    let mut rx = mirror.subscribe();
    mirror.apply_user_joined(user(1));
    assert_eq!(mirror.model().users().len(), 1);
    // A no-op must not dirty the mirror: no notification on flush.
    assert!(!mirror.flush());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_unknown_user_left_is_noop() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1]));
    mirror.flush();

    mirror.apply_user_left(uid(42));
    assert_eq!(mirror.model().users().len(), 1);
    assert!(!mirror.flush());
}

#[test]
fn test_same_state_redelivery_is_noop() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1]));
    mirror.apply_user_state_changed(uid(1), UserState::Ready);
    mirror.flush();

    mirror.apply_user_state_changed(uid(1), UserState::Ready);
    assert!(!mirror.flush());
}

// =========================================================================
// Server authority over transitions
// =========================================================================

#[test]
fn test_out_of_range_transition_accepted_verbatim() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1]));

    // Idle → Playing skips Ready/WaitingForLoad/Loaded. The server is
    // authoritative, so the value sticks anyway.
    mirror.apply_user_state_changed(uid(1), UserState::Playing);
    assert_eq!(mirror.model().user(uid(1)).unwrap().state, UserState::Playing);
    assert!(mirror.playing_users().contains(&uid(1)));
}

#[test]
fn test_state_change_for_unknown_user_is_absorbed() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1]));
    mirror.flush();

    mirror.apply_user_state_changed(uid(7), UserState::Playing);
    assert!(mirror.playing_users().is_empty());
    assert!(!mirror.flush());
}

// =========================================================================
// Host tracking
// =========================================================================

#[test]
fn test_departing_host_clears_host() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1, 2]));
    assert_eq!(mirror.model().host(), Some(uid(1)));

    mirror.apply_user_left(uid(1));
    assert_eq!(mirror.model().host(), None);

    mirror.apply_host_changed(Some(uid(2)));
    assert_eq!(mirror.model().host(), Some(uid(2)));
}

#[test]
fn test_host_change_naming_absent_user_stays_cleared() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1]));
    mirror.apply_host_changed(Some(uid(50)));
    assert_eq!(mirror.model().host(), None);
}

// =========================================================================
// Coalesced notifications
// =========================================================================

#[test]
fn test_batched_join_storm_emits_one_notification() {
    let snapshot = snapshot_with_users(&[1]);
    let mut mirror = RoomStateMirror::new(snapshot);
    let mut rx = mirror.subscribe();

    // One snapshot-sized room plus 99 individual joins delivered in the
    // same pump drain.
    for id in 2..=100 {
        mirror.apply(ServerEvent::UserJoined { user: user(id) });
    }
    assert!(mirror.flush());

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err(), "expected exactly one notification");
    assert_eq!(mirror.model().users().len(), 100);
}

#[test]
fn test_generation_increments_per_flush_not_per_event() {
    let mut mirror = RoomStateMirror::new(empty_snapshot());
    mirror.flush();
    let start = mirror.generation();

    mirror.apply_user_joined(user(1));
    mirror.apply_user_joined(user(2));
    mirror.flush();
    assert_eq!(mirror.generation(), start + 1);
}

#[test]
fn test_match_event_forwards_without_room_update() {
    let mut mirror = RoomStateMirror::new(empty_snapshot());
    mirror.flush();
    let mut events = mirror.subscribe_match_events();

    mirror.apply_match_event(serde_json::json!({"countdown": 5}));
    assert_eq!(
        events.try_recv().unwrap(),
        serde_json::json!({"countdown": 5})
    );
    assert!(!mirror.flush(), "match events must not dirty the model");
}

// =========================================================================
// Snapshots and playlist
// =========================================================================

#[test]
fn test_resync_snapshot_replaces_model_wholesale() {
    let mut mirror = RoomStateMirror::new(snapshot_with_users(&[1, 2, 3]));
    mirror.apply_user_state_changed(uid(1), UserState::Playing);

    mirror.apply_room_snapshot(snapshot_with_users(&[7]));

    assert_eq!(mirror.model().users().len(), 1);
    assert!(mirror.model().contains_user(uid(7)));
    assert!(mirror.playing_users().is_empty());
}

#[test]
fn test_playlist_add_change_remove() {
    let mut mirror = RoomStateMirror::new(empty_snapshot());

    mirror.apply_playlist_item_added(item(1, 0));
    mirror.apply_playlist_item_added(item(2, 1));
    assert_eq!(mirror.model().playlist().len(), 2);

    let mut edited = item(2, 0);
    edited.expired = true;
    mirror.apply_playlist_item_changed(edited);
    assert!(mirror.model().playlist_item(PlaylistItemId(2)).unwrap().expired);

    mirror.apply_playlist_item_removed(PlaylistItemId(1));
    assert!(mirror.model().playlist_item(PlaylistItemId(1)).is_none());

    // Removing an unknown item is absorbed.
    mirror.flush();
    mirror.apply_playlist_item_removed(PlaylistItemId(9));
    assert!(!mirror.flush());
}

#[test]
fn test_room_status_change() {
    let mut mirror = RoomStateMirror::new(empty_snapshot());
    mirror.apply_room_state_changed(RoomStatus::WaitingForLoad);
    assert_eq!(mirror.model().status(), RoomStatus::WaitingForLoad);
    assert!(mirror.model().status().is_active());
}
