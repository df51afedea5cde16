//! Spectator wall demo: join an in-memory room, watch three players at
//! once, and let one of them stall and catch back up.
//!
//! Everything network-shaped is faked locally — the point is to show
//! the engine end to end: coordinator → mirror → playing set → player
//! areas → master clock.
//!
//! Run with `cargo run -p spectator-wall` (RUST_LOG=debug for the
//! internals).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use beatsync_client::{spawn_coordinator, ClientConfig, RoomTransport, TransportError};
use beatsync_protocol::{
    ClientRequest, MatchType, RoomId, RoomSettings, RoomSnapshot, RoomStatus, RoomUser,
    ServerEvent, UserId, UserState,
};
use beatsync_spectate::{
    MasterSpectatorClock, PlayerArea, ReplayHandle, Simulation, SimulationStatus,
    SpectatorPlayerClock, SyncConfig,
};
use tokio::sync::mpsc;

const FRAME: Duration = Duration::from_millis(16);
const MAP_LENGTH_MS: f64 = 8_000.0;

// ---------------------------------------------------------------------------
// Fake server
// ---------------------------------------------------------------------------

/// A transport that answers joins with a canned four-player room and
/// acks everything else.
struct WallTransport;

fn wall_snapshot(room: RoomId) -> RoomSnapshot {
    RoomSnapshot {
        room_id: room,
        status: RoomStatus::Open,
        host: Some(UserId(1)),
        settings: RoomSettings {
            name: "spectator wall".into(),
            match_type: MatchType::HeadToHead,
            freestyle: true,
        },
        users: (1..=4).map(|id| RoomUser::new(UserId(id))).collect(),
        playlist: vec![],
        match_state: None,
    }
}

impl RoomTransport for WallTransport {
    async fn join_room(&self, room: RoomId) -> Result<RoomSnapshot, TransportError> {
        Ok(wall_snapshot(room))
    }

    async fn leave_room(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, request: ClientRequest) -> Result<(), TransportError> {
        tracing::debug!(?request, "request acked by fake server");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake gameplay simulation
// ---------------------------------------------------------------------------

/// Plays a fixed-length "map" paced entirely by its spectator clock.
struct DemoSimulation {
    user_id: UserId,
    started: AtomicBool,
    clock: Mutex<Option<SpectatorPlayerClock>>,
}

impl DemoSimulation {
    fn new(user_id: UserId) -> Box<Self> {
        Box::new(Self {
            user_id,
            started: AtomicBool::new(false),
            clock: Mutex::new(None),
        })
    }
}

impl Simulation for DemoSimulation {
    fn start(&mut self, clock: SpectatorPlayerClock) {
        tracing::info!(user_id = %self.user_id, "simulation started");
        *self.clock.lock().unwrap() = Some(clock);
        self.started.store(true, Ordering::Relaxed);
    }

    fn status(&self) -> SimulationStatus {
        if !self.started.load(Ordering::Relaxed) {
            return SimulationStatus::Loading;
        }
        let clock = self.clock.lock().unwrap();
        match clock.as_ref() {
            Some(c) if c.current_time() >= MAP_LENGTH_MS => SimulationStatus::Completed,
            Some(_) => SimulationStatus::Gameplay,
            None => SimulationStatus::Loading,
        }
    }

    fn stop(&mut self) {
        self.started.store(false, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Wire the coordinator to the fake server.
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let client = spawn_coordinator(WallTransport, events_rx, ClientConfig::default());

    client.join_room(RoomId(1)).await.expect("demo join");

    // The "server" starts a round for users 2, 3 and 4.
    for id in 2..=4 {
        events_tx
            .send(ServerEvent::UserStateChanged {
                user_id: UserId(id),
                state: UserState::WaitingForLoad,
            })
            .unwrap();
        events_tx
            .send(ServerEvent::UserStateChanged {
                user_id: UserId(id),
                state: UserState::Playing,
            })
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut playing: Vec<UserId> = client.playing_users().await.into_iter().collect();
    playing.sort();
    tracing::info!(?playing, "spectating everyone currently playing");

    // One area per playing user, each with its own isolated selection
    // (freestyle: three different beatmaps side by side).
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let mut areas: Vec<PlayerArea> = playing
        .iter()
        .map(|&user_id| {
            let mut area = PlayerArea::new(user_id, master.handle());
            area.load(
                ReplayHandle {
                    user_id,
                    score_id: 9000 + user_id.0,
                    beatmap_id: 100 + user_id.0,
                    ruleset_id: 0,
                    mods: vec![],
                },
                DemoSimulation::new(user_id),
            )
            .expect("fresh area");
            area
        })
        .collect();

    // Frame loop. Around the 2s mark the first player's replay buffer
    // "runs dry" for a second, stalling their clock; when data returns
    // they catch back up at the configured rate.
    let mut frame: u32 = 0;
    loop {
        frame += 1;
        tokio::time::sleep(FRAME).await;

        let reference = master.tick(FRAME);
        for area in &mut areas {
            area.update();
        }

        match frame {
            125 => {
                tracing::info!("player 2's buffer ran dry");
                areas[0].clock().set_waiting_on_frames(true);
            }
            188 => {
                tracing::info!("player 2's buffer refilled");
                areas[0].clock().set_waiting_on_frames(false);
            }
            _ => {}
        }

        if frame % 62 == 0 {
            for area in &areas {
                tracing::info!(
                    user_id = %area.user_id(),
                    time_ms = area.clock().current_time() as u64,
                    rate = area.clock().rate(),
                    status = ?area.status(),
                    reference_ms = reference as u64,
                    "wall"
                );
            }
        }

        let all_done = areas
            .iter()
            .all(|a| a.status().is_some_and(SimulationStatus::is_finished));
        if all_done {
            tracing::info!(frames = frame, "every spectated player finished");
            break;
        }
    }

    drop(areas);
    client.leave_room().await;
    tracing::info!("left the room, demo over");
}
