//! Integration tests for the spectator sync engine: master/player
//! clock behavior and player-area lifecycle, driven with a fake
//! simulation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beatsync_protocol::UserId;
use beatsync_spectate::{
    AreaError, MasterSpectatorClock, PlayerArea, ReplayHandle, Simulation, SimulationStatus,
    SpectatorPlayerClock, SyncConfig,
};

const FRAME: Duration = Duration::from_millis(16);

// =========================================================================
// Fake simulation
// =========================================================================

#[derive(Clone)]
struct SimControls {
    status: Arc<Mutex<SimulationStatus>>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl SimControls {
    fn set_status(&self, status: SimulationStatus) {
        *self.status.lock().unwrap() = status;
    }
}

struct FakeSimulation {
    controls: SimControls,
    clock: Option<SpectatorPlayerClock>,
}

fn fake_simulation() -> (Box<FakeSimulation>, SimControls) {
    let controls = SimControls {
        status: Arc::new(Mutex::new(SimulationStatus::Loading)),
        started: Arc::new(AtomicBool::new(false)),
        stopped: Arc::new(AtomicBool::new(false)),
    };
    let sim = Box::new(FakeSimulation {
        controls: controls.clone(),
        clock: None,
    });
    (sim, controls)
}

impl Simulation for FakeSimulation {
    fn start(&mut self, clock: SpectatorPlayerClock) {
        self.controls.started.store(true, Ordering::Relaxed);
        self.clock = Some(clock);
    }

    fn status(&self) -> SimulationStatus {
        *self.controls.status.lock().unwrap()
    }

    fn stop(&mut self) {
        self.controls.stopped.store(true, Ordering::Relaxed);
    }
}

fn handle_for(user: u64) -> ReplayHandle {
    ReplayHandle {
        user_id: UserId(user),
        score_id: 9000 + user,
        beatmap_id: 100 + user,
        ruleset_id: 0,
        mods: vec!["HD".into()],
    }
}

// =========================================================================
// Master clock
// =========================================================================

#[test]
fn test_reference_is_min_of_non_waiting_clocks() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let a = SpectatorPlayerClock::new();
    let b = SpectatorPlayerClock::new();
    master.register(a.clone());
    master.register(b.clone());

    for _ in 0..10 {
        master.tick(FRAME);
    }
    assert_eq!(a.current_time(), 160.0);
    assert_eq!(b.current_time(), 160.0);
    assert_eq!(master.current_time(), 160.0);

    // b runs out of buffered frames: it freezes, the group reference
    // moves on with a.
    b.set_waiting_on_frames(true);
    for _ in 0..20 {
        master.tick(FRAME);
    }
    assert_eq!(b.current_time(), 160.0);
    assert_eq!(master.current_time(), a.current_time());
    assert_eq!(a.current_time(), 480.0);
}

#[test]
fn test_reference_never_exceeds_any_non_waiting_clock() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let clocks: Vec<SpectatorPlayerClock> =
        (0..4).map(|_| SpectatorPlayerClock::new()).collect();
    for c in &clocks {
        master.register(c.clone());
    }

    // Drive a scenario with waiting flips and check the invariant
    // after every frame.
    for frame in 0..200 {
        match frame {
            30 => clocks[1].set_waiting_on_frames(true),
            60 => clocks[3].set_waiting_on_frames(true),
            90 => clocks[1].set_waiting_on_frames(false),
            150 => clocks[3].set_waiting_on_frames(false),
            _ => {}
        }
        let reference = master.tick(FRAME);
        for c in &clocks {
            if !c.waiting_on_frames() {
                assert!(
                    reference <= c.current_time() + 1e-9,
                    "reference {reference} ran ahead of a non-waiting clock at {}",
                    c.current_time()
                );
            }
        }
    }
}

#[test]
fn test_returning_clock_catches_up_then_settles() {
    let config = SyncConfig::default();
    let mut master = MasterSpectatorClock::new(config.clone());
    let a = SpectatorPlayerClock::new();
    let b = SpectatorPlayerClock::new();
    master.register(a.clone());
    master.register(b.clone());

    for _ in 0..10 {
        master.tick(FRAME);
    }
    b.set_waiting_on_frames(true);
    for _ in 0..25 {
        master.tick(FRAME);
    }
    // b is now 400ms behind the pacing target — well past the catch-up
    // threshold.
    b.set_waiting_on_frames(false);
    let reference = master.tick(FRAME);

    assert_eq!(b.rate(), config.catch_up_rate);
    // The group reference follows the slowest member again.
    assert_eq!(reference, b.current_time());

    for _ in 0..200 {
        master.tick(FRAME);
    }
    // Caught up: back to 1× and within the epsilon of the pack.
    assert_eq!(b.rate(), 1.0);
    assert!(
        (a.current_time() - b.current_time()).abs() <= config.caught_up_epsilon_ms + 1e-9,
        "b should have closed the gap, still {}ms behind",
        a.current_time() - b.current_time()
    );
}

#[test]
fn test_all_waiting_freezes_the_master() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let a = SpectatorPlayerClock::new();
    let b = SpectatorPlayerClock::new();
    master.register(a.clone());
    master.register(b.clone());

    for _ in 0..5 {
        master.tick(FRAME);
    }
    let frozen_at = master.current_time();

    a.set_waiting_on_frames(true);
    b.set_waiting_on_frames(true);
    for _ in 0..100 {
        master.tick(FRAME);
    }
    assert!(master.is_stalled());
    assert_eq!(master.current_time(), frozen_at);
    assert_eq!(a.current_time(), frozen_at);

    // Data arrives for one member: the group resumes from where it
    // stalled, no burst of banked time.
    a.set_waiting_on_frames(false);
    master.tick(FRAME);
    assert!(!master.is_stalled());
    assert_eq!(master.current_time(), frozen_at + 16.0);
}

#[test]
fn test_empty_master_is_frozen() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    for _ in 0..10 {
        assert_eq!(master.tick(FRAME), 0.0);
    }
}

#[test]
fn test_unregistration_between_ticks() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let handle = master.handle();
    let a = SpectatorPlayerClock::new();
    let b = SpectatorPlayerClock::new();
    master.register(a.clone());
    master.register(b.clone());

    master.tick(FRAME);
    assert_eq!(master.clock_count(), 2);

    // b's area is torn down from another task; the tick loop just sees
    // it gone at the next boundary.
    b.set_waiting_on_frames(true);
    handle.unregister(b.id());

    let reference = master.tick(FRAME);
    assert_eq!(master.clock_count(), 1);
    // With b gone, it no longer holds the reference back.
    assert_eq!(reference, a.current_time());

    // Double unregistration is harmless.
    handle.unregister(b.id());
    master.tick(FRAME);
    assert_eq!(master.clock_count(), 1);
}

#[test]
fn test_duplicate_registration_is_ignored() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let a = SpectatorPlayerClock::new();
    master.register(a.clone());
    master.register(a.clone());
    assert_eq!(master.clock_count(), 1);
}

// =========================================================================
// Player areas
// =========================================================================

#[test]
fn test_area_load_twice_fails() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let mut area = PlayerArea::new(UserId(1), master.handle());

    let (sim, _) = fake_simulation();
    area.load(handle_for(1), sim).unwrap();

    let (sim2, _) = fake_simulation();
    let result = area.load(handle_for(1), sim2);
    assert!(matches!(result, Err(AreaError::AlreadyLoaded(UserId(1)))));
    assert_eq!(master.clock_count(), 1);
}

#[test]
fn test_area_rejects_wrong_users_replay() {
    let master = MasterSpectatorClock::new(SyncConfig::default());
    let mut area = PlayerArea::new(UserId(1), master.handle());

    let (sim, _) = fake_simulation();
    let result = area.load(handle_for(2), sim);
    assert!(matches!(
        result,
        Err(AreaError::HandleMismatch {
            area: UserId(1),
            handle: UserId(2)
        })
    ));
    assert!(!area.is_loaded());
}

#[test]
fn test_gameplay_started_fires_exactly_once() {
    let master = MasterSpectatorClock::new(SyncConfig::default());
    let mut area = PlayerArea::new(UserId(1), master.handle());
    let (sim, controls) = fake_simulation();
    area.load(handle_for(1), sim).unwrap();

    let mut started = area.gameplay_started();
    assert!(!*started.borrow());

    // Still loading: polling must not fire anything.
    area.update();
    assert!(!started.has_changed().unwrap());

    controls.set_status(SimulationStatus::Gameplay);
    area.update();
    assert!(started.has_changed().unwrap());
    assert!(*started.borrow_and_update());
    assert!(area.has_gameplay_started());

    // Further polls see the same state; the signal does not re-fire.
    area.update();
    area.update();
    assert!(!started.has_changed().unwrap());
}

#[test]
fn test_finished_simulation_unregisters_its_clock() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let mut area = PlayerArea::new(UserId(1), master.handle());
    let (sim, controls) = fake_simulation();
    area.load(handle_for(1), sim).unwrap();
    assert_eq!(master.clock_count(), 1);

    controls.set_status(SimulationStatus::Gameplay);
    area.update();
    controls.set_status(SimulationStatus::Completed);
    area.update();

    // A finished player is not a perpetual zero holding the group back.
    assert_eq!(master.clock_count(), 0);
}

#[test]
fn test_failed_simulation_also_unregisters() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let mut area = PlayerArea::new(UserId(1), master.handle());
    let (sim, controls) = fake_simulation();
    area.load(handle_for(1), sim).unwrap();

    controls.set_status(SimulationStatus::Failed);
    area.update();
    assert_eq!(master.clock_count(), 0);
}

#[test]
fn test_teardown_before_load_is_safe() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    {
        let _area = PlayerArea::new(UserId(1), master.handle());
        // Never loaded; dropping must not unregister anything or panic.
    }
    assert_eq!(master.clock_count(), 0);
}

#[test]
fn test_teardown_stops_simulation_and_unregisters() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let (sim, controls) = fake_simulation();
    {
        let mut area = PlayerArea::new(UserId(1), master.handle());
        area.load(handle_for(1), sim).unwrap();
        assert_eq!(master.clock_count(), 1);
        assert!(controls.started.load(Ordering::Relaxed));
    }
    assert!(controls.stopped.load(Ordering::Relaxed));
    assert_eq!(master.clock_count(), 0);
}

#[test]
fn test_mute_adjusts_gain_but_never_the_clock() {
    let mut master = MasterSpectatorClock::new(SyncConfig::default());
    let mut area = PlayerArea::new(UserId(1), master.handle());
    let (sim, _) = fake_simulation();
    area.load(handle_for(1), sim).unwrap();

    area.set_muted(true);
    assert_eq!(area.effective_volume(), 0.0);

    for _ in 0..5 {
        master.tick(FRAME);
    }
    // Muted is silent, not paused.
    assert_eq!(area.clock().current_time(), 80.0);

    area.set_muted(false);
    assert_eq!(area.effective_volume(), 1.0);
}

#[test]
fn test_freestyle_areas_keep_independent_selections() {
    let master = MasterSpectatorClock::new(SyncConfig::default());
    let mut left = PlayerArea::new(UserId(1), master.handle());
    let mut right = PlayerArea::new(UserId(2), master.handle());

    let (sim_l, _) = fake_simulation();
    let (sim_r, _) = fake_simulation();
    let mut right_handle = handle_for(2);
    right_handle.beatmap_id = 777;
    right_handle.mods = vec!["DT".into()];

    left.load(handle_for(1), sim_l).unwrap();
    right.load(right_handle, sim_r).unwrap();

    // Different beatmaps side by side, and changing one player's mods
    // is invisible to the other.
    left.set_mods(vec!["HR".into()]).unwrap();
    assert_eq!(left.replay_handle().unwrap().mods, vec!["HR".to_string()]);
    assert_eq!(right.replay_handle().unwrap().mods, vec!["DT".to_string()]);
    assert_eq!(left.replay_handle().unwrap().beatmap_id, 101);
    assert_eq!(right.replay_handle().unwrap().beatmap_id, 777);
}
