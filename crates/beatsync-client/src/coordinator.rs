//! The coordinator actor: one task that owns the room mirror, pumps
//! server events into it, and correlates outbound requests with their
//! acknowledgements.
//!
//! Everything room-shaped funnels through this task's `select!` loop,
//! which is what gives the mirror its single-context guarantee: there
//! is no concurrent mutation to guard against, only the order in which
//! this loop processes things. The outside world talks to the actor
//! through a cloneable [`RoomClient`] handle.
//!
//! Two rules shape the request path:
//!
//! - **No optimistic mutation.** Requests never touch the mirror; only
//!   server events do. The mirror is therefore always a strict function
//!   of the event stream, and a rejected request needs no rollback.
//! - **One outstanding request per kind.** A second request of a kind
//!   already in flight replaces any queued successor of that kind
//!   (supersede, never double-send).

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use beatsync_protocol::{
    ChangeTeamRequest, ClientRequest, MatchRequest, RequestKind, RoomId, RoomSettings,
    RoomSnapshot, ServerEvent, UserId, UserState,
};
use beatsync_room::{RoomModel, RoomStateMirror, RoomUpdate};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{ClientConfig, JoinError, RequestError, RoomTransport};

/// Capacity of the coordinator-owned broadcast channels. These outlive
/// individual joins so UI subscriptions survive leave/rejoin cycles.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands sent from [`RoomClient`] handles to the coordinator task.
enum Command {
    Join {
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    Request {
        request: ClientRequest,
        reply: oneshot::Sender<Result<(), RequestError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<RoomModel>>,
    },
    PlayingUsers {
        reply: oneshot::Sender<HashSet<UserId>>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<RoomUpdate>>,
    },
    SubscribeMatchEvents {
        reply: oneshot::Sender<broadcast::Receiver<serde_json::Value>>,
    },
}

// ---------------------------------------------------------------------------
// RoomClient — the public handle
// ---------------------------------------------------------------------------

/// Handle to a running coordinator. Cheap to clone; all methods marshal
/// through the coordinator's single-threaded loop.
#[derive(Clone)]
pub struct RoomClient {
    sender: mpsc::Sender<Command>,
}

impl RoomClient {
    /// Joins a room and seeds the mirror from the server's snapshot.
    ///
    /// Cancellable: a second `join_room` issued while this one is still
    /// awaiting its snapshot supersedes it. Joining while already in a
    /// room fails fast with [`JoinError::AlreadyJoined`].
    pub async fn join_room(&self, room_id: RoomId) -> Result<(), JoinError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Join { room_id, reply })
            .await
            .map_err(|_| JoinError::ClientClosed)?;
        rx.await.map_err(|_| JoinError::ClientClosed)?
    }

    /// Leaves the current room.
    ///
    /// Always succeeds locally: the mirror is torn down and pending
    /// requests failed before the network call is even issued, and a
    /// failing network leave is only logged. Leaving while not in a
    /// room is a no-op.
    pub async fn leave_room(&self) {
        let (reply, rx) = oneshot::channel();
        // If the coordinator is gone there is nothing left to leave.
        if self.sender.send(Command::Leave { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Requests a change to our own state. Resolves when the server
    /// acknowledges the request — the resulting state change, if any,
    /// arrives separately through the event stream.
    pub async fn change_user_state(&self, state: UserState) -> Result<(), RequestError> {
        self.request(ClientRequest::ChangeState { state }).await
    }

    /// Requests a change to the room settings (host only, server
    /// enforced).
    pub async fn change_settings(&self, settings: RoomSettings) -> Result<(), RequestError> {
        self.request(ClientRequest::ChangeSettings { settings }).await
    }

    /// Requests a team change (team-versus rooms).
    pub async fn change_team(&self, team_id: u32) -> Result<(), RequestError> {
        self.send_match_request(MatchRequest::ChangeTeam(ChangeTeamRequest { team_id }))
            .await
    }

    /// Sends a match-type-specific request (team change and the like).
    pub async fn send_match_request(&self, request: MatchRequest) -> Result<(), RequestError> {
        self.request(ClientRequest::Match { request }).await
    }

    async fn request(&self, request: ClientRequest) -> Result<(), RequestError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Request { request, reply })
            .await
            .map_err(|_| RequestError::ClientClosed)?;
        rx.await.map_err(|_| RequestError::ClientClosed)?
    }

    /// A clone of the current room model, or `None` when not joined.
    pub async fn snapshot(&self) -> Option<RoomModel> {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(Command::Snapshot { reply }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// The ids of users currently in a playing state. Empty when not
    /// joined.
    pub async fn playing_users(&self) -> HashSet<UserId> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(Command::PlayingUsers { reply })
            .await
            .is_err()
        {
            return HashSet::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Subscribes to coalesced room-updated notifications. The
    /// subscription survives leave/rejoin cycles.
    pub async fn updates(&self) -> broadcast::Receiver<RoomUpdate> {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(Command::Subscribe { reply }).await.is_ok() {
            if let Ok(receiver) = rx.await {
                return receiver;
            }
        }
        // Coordinator gone: hand back a channel that will only ever
        // report closure.
        broadcast::channel(1).1
    }

    /// Subscribes to opaque match events.
    pub async fn match_events(&self) -> broadcast::Receiver<serde_json::Value> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(Command::SubscribeMatchEvents { reply })
            .await
            .is_ok()
        {
            if let Ok(receiver) = rx.await {
                return receiver;
            }
        }
        broadcast::channel(1).1
    }
}

// ---------------------------------------------------------------------------
// Coordinator actor
// ---------------------------------------------------------------------------

struct QueuedRequest {
    request: ClientRequest,
    reply: oneshot::Sender<Result<(), RequestError>>,
}

struct PendingJoin {
    token: u64,
    room_id: RoomId,
    reply: oneshot::Sender<Result<(), JoinError>>,
}

struct Coordinator<T: RoomTransport> {
    transport: Arc<T>,
    config: ClientConfig,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    events_closed: bool,

    /// Stable notification channels; mirrors created per join write
    /// into these so subscribers never need to resubscribe.
    updates: broadcast::Sender<RoomUpdate>,
    match_events: broadcast::Sender<serde_json::Value>,
    /// Update generation carried across mirrors.
    generation: u64,

    room: Option<RoomStateMirror>,

    /// Monotonic join-attempt token. A snapshot response is applied
    /// only if its token still matches the pending attempt; everything
    /// else is stale and discarded.
    join_attempt: u64,
    pending_join: Option<PendingJoin>,
    joins: FuturesUnordered<BoxedFuture<(u64, Result<RoomSnapshot, JoinError>)>>,

    /// Kinds with a send currently on the wire.
    in_flight: HashSet<RequestKind>,
    in_flight_replies: HashMap<RequestKind, oneshot::Sender<Result<(), RequestError>>>,
    sends: FuturesUnordered<BoxedFuture<(RequestKind, Result<(), RequestError>)>>,
    /// At most one queued successor per kind; a newer request of the
    /// same kind replaces (and fails) the queued one.
    queued: HashMap<RequestKind, QueuedRequest>,
}

/// Spawns the coordinator task and returns a handle to it.
///
/// `events` is the inbound half of the transport: one logical queue of
/// server pushes, consumed in arrival order.
pub fn spawn_coordinator<T: RoomTransport>(
    transport: T,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    config: ClientConfig,
) -> RoomClient {
    let config = config.validated();
    let (tx, rx) = mpsc::channel(config.command_buffer);

    let actor = Coordinator {
        transport: Arc::new(transport),
        config,
        commands: rx,
        events,
        events_closed: false,
        updates: broadcast::channel(UPDATE_CHANNEL_CAPACITY).0,
        match_events: broadcast::channel(UPDATE_CHANNEL_CAPACITY).0,
        generation: 0,
        room: None,
        join_attempt: 0,
        pending_join: None,
        joins: FuturesUnordered::new(),
        in_flight: HashSet::new(),
        in_flight_replies: HashMap::new(),
        sends: FuturesUnordered::new(),
        queued: HashMap::new(),
    };

    tokio::spawn(actor.run());

    RoomClient { sender: tx }
}

impl<T: RoomTransport> Coordinator<T> {
    async fn run(mut self) {
        tracing::debug!("room coordinator started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // Every handle dropped: nobody can talk to us again.
                    None => break,
                },
                event = self.events.recv(), if !self.events_closed => match event {
                    Some(event) => self.pump_events(event),
                    None => {
                        tracing::debug!("server event stream closed");
                        self.events_closed = true;
                    }
                },
                Some((token, result)) = self.joins.next(), if !self.joins.is_empty() => {
                    self.complete_join(token, result);
                }
                Some((kind, result)) = self.sends.next(), if !self.sends.is_empty() => {
                    self.complete_request(kind, result);
                }
            }
        }

        self.teardown(JoinError::Cancelled, RequestError::ClientClosed);
        tracing::debug!("room coordinator stopped");
    }

    // -----------------------------------------------------------------------
    // Event pump
    // -----------------------------------------------------------------------

    /// Applies one event plus every event already sitting in the queue,
    /// then flushes once. A burst of N events therefore costs listeners
    /// a single coalesced notification.
    fn pump_events(&mut self, first: ServerEvent) {
        let Some(mirror) = self.room.as_mut() else {
            // Events can race a leave; with no room there is nothing to
            // apply them to.
            tracing::debug!("server event with no joined room, dropping");
            return;
        };

        mirror.apply(first);
        while let Ok(event) = self.events.try_recv() {
            mirror.apply(event);
        }
        mirror.flush();
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Join { room_id, reply } => self.handle_join(room_id, reply),
            Command::Leave { reply } => {
                self.handle_leave();
                let _ = reply.send(());
            }
            Command::Request { request, reply } => self.handle_request(request, reply),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.room.as_ref().map(|m| m.model().clone()));
            }
            Command::PlayingUsers { reply } => {
                let set = self
                    .room
                    .as_ref()
                    .map(|m| m.playing_users().clone())
                    .unwrap_or_default();
                let _ = reply.send(set);
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(self.updates.subscribe());
            }
            Command::SubscribeMatchEvents { reply } => {
                let _ = reply.send(self.match_events.subscribe());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Join / leave
    // -----------------------------------------------------------------------

    fn handle_join(&mut self, room_id: RoomId, reply: oneshot::Sender<Result<(), JoinError>>) {
        if let Some(mirror) = &self.room {
            let _ = reply.send(Err(JoinError::AlreadyJoined(mirror.model().room_id())));
            return;
        }

        // A join racing an unfinished join supersedes it; the stale
        // attempt's snapshot will be discarded by token mismatch.
        if let Some(stale) = self.pending_join.take() {
            tracing::info!(room_id = %stale.room_id, "join attempt superseded");
            let _ = stale.reply.send(Err(JoinError::Superseded));
        }

        self.join_attempt += 1;
        let token = self.join_attempt;
        self.pending_join = Some(PendingJoin {
            token,
            room_id,
            reply,
        });

        tracing::info!(%room_id, "joining room");
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.request_timeout;
        self.joins.push(Box::pin(async move {
            let result = match tokio::time::timeout(timeout, transport.join_room(room_id)).await {
                Ok(Ok(snapshot)) => Ok(snapshot),
                Ok(Err(error)) => Err(JoinError::from_transport(error)),
                Err(_) => Err(JoinError::TimedOut),
            };
            (token, result)
        }));
    }

    fn complete_join(&mut self, token: u64, result: Result<RoomSnapshot, JoinError>) {
        let current = self.pending_join.as_ref().map(|p| p.token);
        if current != Some(token) {
            tracing::debug!(token, "stale join response discarded");
            return;
        }
        let pending = self.pending_join.take().expect("checked above");

        match result {
            Ok(snapshot) => {
                tracing::info!(
                    room_id = %snapshot.room_id,
                    users = snapshot.users.len(),
                    "room joined"
                );
                let mut mirror = RoomStateMirror::with_channels(
                    snapshot,
                    self.updates.clone(),
                    self.match_events.clone(),
                    self.generation,
                );
                // Announce the freshly populated room.
                mirror.flush();
                self.room = Some(mirror);
                let _ = pending.reply.send(Ok(()));
            }
            Err(error) => {
                tracing::warn!(room_id = %pending.room_id, %error, "join failed");
                let _ = pending.reply.send(Err(error));
            }
        }
    }

    /// Tears down local room state. Cannot fail and is never partial:
    /// by the time the network leave is even issued, the room is gone
    /// locally.
    fn handle_leave(&mut self) {
        self.teardown(JoinError::Cancelled, RequestError::RoomClosed);

        if let Some(mirror) = self.room.take() {
            let room_id = mirror.model().room_id();
            // Carry the generation forward and announce the teardown so
            // listeners re-query and observe the room is gone.
            self.generation = mirror.generation() + 1;
            let _ = self.updates.send(RoomUpdate {
                generation: self.generation,
            });
            tracing::info!(%room_id, "room left");

            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                if let Err(error) = transport.leave_room().await {
                    tracing::warn!(%error, "leave request failed; room already torn down locally");
                }
            });
        }
    }

    /// Fails the pending join and all outstanding request replies.
    /// In-flight network sends keep running; their completions are
    /// logged and dropped.
    fn teardown(&mut self, join_error: JoinError, request_error: RequestError) {
        if let Some(stale) = self.pending_join.take() {
            let _ = stale.reply.send(Err(join_error));
        }
        for (_, reply) in self.in_flight_replies.drain() {
            let _ = reply.send(Err(clone_request_error(&request_error)));
        }
        for (_, queued) in self.queued.drain() {
            let _ = queued.reply.send(Err(clone_request_error(&request_error)));
        }
    }

    // -----------------------------------------------------------------------
    // Mutating requests
    // -----------------------------------------------------------------------

    fn handle_request(
        &mut self,
        request: ClientRequest,
        reply: oneshot::Sender<Result<(), RequestError>>,
    ) {
        if self.room.is_none() {
            let _ = reply.send(Err(RequestError::NotJoined));
            return;
        }

        let kind = request.kind();
        if self.in_flight.contains(&kind) {
            // One on the wire already: queue this one, superseding any
            // queued predecessor of the same kind.
            if let Some(prev) = self.queued.insert(kind, QueuedRequest { request, reply }) {
                tracing::debug!(?kind, "queued request superseded");
                let _ = prev.reply.send(Err(RequestError::Superseded));
            }
            return;
        }

        self.send_request(kind, request, reply);
    }

    fn send_request(
        &mut self,
        kind: RequestKind,
        request: ClientRequest,
        reply: oneshot::Sender<Result<(), RequestError>>,
    ) {
        self.in_flight.insert(kind);
        self.in_flight_replies.insert(kind, reply);

        let transport = Arc::clone(&self.transport);
        let timeout = self.config.request_timeout;
        self.sends.push(Box::pin(async move {
            let result = match tokio::time::timeout(timeout, transport.send(request)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(RequestError::Transport(error)),
                Err(_) => Err(RequestError::TimedOut),
            };
            (kind, result)
        }));
    }

    fn complete_request(&mut self, kind: RequestKind, result: Result<(), RequestError>) {
        self.in_flight.remove(&kind);

        match self.in_flight_replies.remove(&kind) {
            Some(reply) => {
                if let Err(error) = &result {
                    tracing::warn!(?kind, %error, "request failed");
                }
                let _ = reply.send(result);
            }
            // Reply was failed at teardown; nothing to tell.
            None => {
                if let Err(error) = result {
                    tracing::debug!(?kind, %error, "request failed after room teardown");
                }
            }
        }

        // Promote the queued successor, if the room still exists.
        if let Some(next) = self.queued.remove(&kind) {
            if self.room.is_some() {
                self.send_request(kind, next.request, next.reply);
            } else {
                let _ = next.reply.send(Err(RequestError::RoomClosed));
            }
        }
    }
}

/// Teardown fans a single failure out to several waiters, and
/// `RequestError` has no `Clone` derive; duplicate by hand.
fn clone_request_error(error: &RequestError) -> RequestError {
    match error {
        RequestError::NotJoined => RequestError::NotJoined,
        RequestError::Superseded => RequestError::Superseded,
        RequestError::RoomClosed => RequestError::RoomClosed,
        RequestError::TimedOut => RequestError::TimedOut,
        RequestError::Transport(e) => RequestError::Transport(e.clone()),
        RequestError::ClientClosed => RequestError::ClientClosed,
    }
}
