//! The room mirror: applies server events to the local model.
//!
//! The mirror is mutated from a single event-delivery context — the
//! coordinator's pump loop — so it needs no locks, only ordering. Every
//! `apply_*` call leaves the model fully consistent before returning;
//! listeners never observe an intermediate state because notification
//! happens only at [`RoomStateMirror::flush`], once per batch of events.
//!
//! The server is the source of truth. Anomalies (duplicate joins,
//! unknown-user leaves, out-of-range state hops) are logged and
//! absorbed, never fatal: the local model may simply be lagging reality.

use std::collections::HashSet;

use beatsync_protocol::{
    MatchRoomState, MatchUserState, PlaylistItem, PlaylistItemId, RoomSettings,
    RoomSnapshot, RoomStatus, RoomUser, ServerEvent, UserId, UserState,
};
use tokio::sync::broadcast;

use crate::RoomModel;

/// Capacity of the update/match-event broadcast channels. Listeners
/// that fall further behind than this see `Lagged` and resync from a
/// fresh snapshot.
const CHANNEL_CAPACITY: usize = 64;

/// A coalesced "room updated" notification.
///
/// Carries only a generation counter: listeners are expected to pull
/// the state they need (`model`, `playing_users`) rather than diff
/// event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomUpdate {
    pub generation: u64,
}

/// Applies inbound server events to a [`RoomModel`] and exposes change
/// notifications plus derived aggregates.
pub struct RoomStateMirror {
    model: RoomModel,
    /// Users whose state currently counts as playing. Derived, never
    /// authoritative — see [`Self::recompute_playing`].
    playing: HashSet<UserId>,
    dirty: bool,
    generation: u64,
    updates: broadcast::Sender<RoomUpdate>,
    match_events: broadcast::Sender<serde_json::Value>,
}

impl RoomStateMirror {
    /// Creates a mirror over a freshly joined room, with its own
    /// notification channels.
    pub fn new(snapshot: RoomSnapshot) -> Self {
        Self::with_channels(
            snapshot,
            broadcast::channel(CHANNEL_CAPACITY).0,
            broadcast::channel(CHANNEL_CAPACITY).0,
            0,
        )
    }

    /// Creates a mirror that notifies on caller-owned channels.
    ///
    /// The coordinator uses this so UI subscriptions survive across
    /// leave/rejoin cycles; `first_generation` continues the previous
    /// mirror's counter.
    pub fn with_channels(
        snapshot: RoomSnapshot,
        updates: broadcast::Sender<RoomUpdate>,
        match_events: broadcast::Sender<serde_json::Value>,
        first_generation: u64,
    ) -> Self {
        let mut mirror = Self {
            model: RoomModel::from_snapshot(snapshot),
            playing: HashSet::new(),
            // A freshly populated mirror is itself a change worth
            // announcing on the first flush.
            dirty: true,
            generation: first_generation,
            updates,
            match_events,
        };
        mirror.recompute_playing();
        mirror
    }

    // -----------------------------------------------------------------------
    // Event application
    // -----------------------------------------------------------------------

    /// Dispatches one inbound event to the matching `apply_*` method.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::RoomJoined { snapshot } => self.apply_room_snapshot(snapshot),
            ServerEvent::UserJoined { user } => self.apply_user_joined(user),
            ServerEvent::UserLeft { user_id } => self.apply_user_left(user_id),
            ServerEvent::UserStateChanged { user_id, state } => {
                self.apply_user_state_changed(user_id, state)
            }
            ServerEvent::MatchUserStateChanged { user_id, state } => {
                self.apply_match_user_state_changed(user_id, state)
            }
            ServerEvent::SettingsChanged { settings } => self.apply_settings_changed(settings),
            ServerEvent::RoomStateChanged { status } => self.apply_room_state_changed(status),
            ServerEvent::HostChanged { user_id } => self.apply_host_changed(user_id),
            ServerEvent::MatchRoomStateChanged { state } => {
                self.apply_match_room_state_changed(state)
            }
            ServerEvent::PlaylistItemAdded { item } => self.apply_playlist_item_added(item),
            ServerEvent::PlaylistItemChanged { item } => self.apply_playlist_item_changed(item),
            ServerEvent::PlaylistItemRemoved { item_id } => {
                self.apply_playlist_item_removed(item_id)
            }
            ServerEvent::MatchEvent { payload } => self.apply_match_event(payload),
        }
    }

    /// Replaces the model wholesale from a full snapshot (join catch-up
    /// or server-initiated resync).
    pub fn apply_room_snapshot(&mut self, snapshot: RoomSnapshot) {
        tracing::info!(room_id = %snapshot.room_id, users = snapshot.users.len(), "room snapshot applied");
        self.model = RoomModel::from_snapshot(snapshot);
        self.mark_mutated();
    }

    /// Adds a user. A duplicate id is a no-op: joins can race catch-up
    /// snapshots and events can be re-delivered.
    pub fn apply_user_joined(&mut self, user: RoomUser) {
        if self.model.contains_user(user.id) {
            tracing::debug!(user_id = %user.id, "duplicate join event, ignoring");
            return;
        }
        tracing::info!(user_id = %user.id, users = self.model.users.len() + 1, "user joined");
        self.model.users.push(user);
        self.mark_mutated();
    }

    /// Removes a user. Unknown ids are a no-op (re-delivery tolerance).
    pub fn apply_user_left(&mut self, user_id: UserId) {
        let Some(index) = self.model.users.iter().position(|u| u.id == user_id) else {
            tracing::debug!(%user_id, "leave event for unknown user, ignoring");
            return;
        };
        self.model.users.remove(index);
        // No aggregate may reference a departed user: clear the host
        // slot until the server's authoritative HostChanged arrives.
        if self.model.host == Some(user_id) {
            self.model.host = None;
        }
        tracing::info!(%user_id, users = self.model.users.len(), "user left");
        self.mark_mutated();
    }

    /// Applies a server-driven state change.
    ///
    /// The validity check is advisory: an out-of-range hop is logged
    /// and the server's value stored verbatim, because reordered
    /// delivery can legitimately skip intermediate states.
    pub fn apply_user_state_changed(&mut self, user_id: UserId, state: UserState) {
        let Some(user) = self.model.user_mut(user_id) else {
            tracing::warn!(%user_id, %state, "state change for unknown user, ignoring");
            return;
        };
        if user.state == state {
            return;
        }
        if !user.state.can_transition_to(state) {
            tracing::warn!(
                %user_id,
                from = %user.state,
                to = %state,
                "unexpected state transition, accepting server value"
            );
        }
        user.state = state;
        self.mark_mutated();
    }

    /// Applies a match-type-specific per-user change (e.g. team swap).
    /// Orthogonal to the playing/not-playing computation.
    pub fn apply_match_user_state_changed(
        &mut self,
        user_id: UserId,
        state: Option<MatchUserState>,
    ) {
        let Some(user) = self.model.user_mut(user_id) else {
            tracing::warn!(%user_id, "match state change for unknown user, ignoring");
            return;
        };
        if user.match_state == state {
            return;
        }
        user.match_state = state;
        self.mark_mutated();
    }

    pub fn apply_settings_changed(&mut self, settings: RoomSettings) {
        if self.model.settings == settings {
            return;
        }
        tracing::info!(name = %settings.name, "room settings changed");
        self.model.settings = settings;
        self.mark_mutated();
    }

    pub fn apply_room_state_changed(&mut self, status: RoomStatus) {
        if self.model.status == status {
            return;
        }
        tracing::info!(from = %self.model.status, to = %status, "room state changed");
        self.model.status = status;
        self.mark_mutated();
    }

    /// Transfers (or clears) host privileges.
    ///
    /// A host id naming a user not currently in the room is stored as
    /// `None` instead: reordered delivery may announce a host before
    /// their join event, and aggregates must never point at an absent
    /// user. The server's next HostChanged restores the real value.
    pub fn apply_host_changed(&mut self, user_id: Option<UserId>) {
        let host = match user_id {
            Some(id) if !self.model.contains_user(id) => {
                tracing::warn!(user_id = %id, "host change names a user not in the room");
                None
            }
            other => other,
        };
        if self.model.host == host {
            return;
        }
        self.model.host = host;
        self.mark_mutated();
    }

    pub fn apply_match_room_state_changed(&mut self, state: Option<MatchRoomState>) {
        if self.model.match_state == state {
            return;
        }
        self.model.match_state = state;
        self.mark_mutated();
    }

    pub fn apply_playlist_item_added(&mut self, item: PlaylistItem) {
        if let Some(existing) = self.model.playlist.iter_mut().find(|i| i.id == item.id) {
            tracing::warn!(item_id = %item.id, "added playlist item already present, replacing");
            *existing = item;
        } else {
            self.model.playlist.push(item);
        }
        self.mark_mutated();
    }

    pub fn apply_playlist_item_changed(&mut self, item: PlaylistItem) {
        if let Some(existing) = self.model.playlist.iter_mut().find(|i| i.id == item.id) {
            if *existing == item {
                return;
            }
            *existing = item;
        } else {
            tracing::warn!(item_id = %item.id, "change for unknown playlist item, inserting");
            self.model.playlist.push(item);
        }
        self.mark_mutated();
    }

    pub fn apply_playlist_item_removed(&mut self, item_id: PlaylistItemId) {
        let before = self.model.playlist.len();
        self.model.playlist.retain(|i| i.id != item_id);
        if self.model.playlist.len() == before {
            tracing::debug!(%item_id, "remove event for unknown playlist item, ignoring");
            return;
        }
        self.mark_mutated();
    }

    /// Forwards an opaque match event to subscribers. The model is not
    /// touched and no room-updated notification is produced.
    pub fn apply_match_event(&mut self, payload: serde_json::Value) {
        tracing::trace!("match event received");
        let _ = self.match_events.send(payload);
    }

    // -----------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------

    /// Emits at most one [`RoomUpdate`] covering every mutation since
    /// the previous flush. Returns whether a notification was sent.
    ///
    /// The pump drains all immediately available events before calling
    /// this, so a burst of N events costs listeners one rebuild, not N.
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.generation += 1;
        let _ = self.updates.send(RoomUpdate {
            generation: self.generation,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn model(&self) -> &RoomModel {
        &self.model
    }

    /// Users whose state is currently a playing state. Always a pure
    /// function of the model — never of event history.
    pub fn playing_users(&self) -> &HashSet<UserId> {
        &self.playing
    }

    /// Generation of the last emitted update.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomUpdate> {
        self.updates.subscribe()
    }

    pub fn subscribe_match_events(&self) -> broadcast::Receiver<serde_json::Value> {
        self.match_events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn mark_mutated(&mut self) {
        self.recompute_playing();
        self.dirty = true;
    }

    /// Full rescan of the user list.
    ///
    /// Incremental add/remove bookkeeping desynchronizes when a state
    /// change and a leave for the same user land in one tick; a rescan
    /// cannot drift. O(n) per mutation, with n in the tens.
    fn recompute_playing(&mut self) {
        self.playing.clear();
        self.playing.extend(
            self.model
                .users
                .iter()
                .filter(|u| u.state.is_playing())
                .map(|u| u.id),
        );
    }
}
