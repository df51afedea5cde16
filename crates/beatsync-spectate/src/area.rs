//! Player areas: one per spectated participant.
//!
//! An area owns the full lifecycle of one participant's simulation —
//! its clock, its replay selection, its audio gain — and shares nothing
//! mutable with its siblings. That isolation is what makes freestyle
//! rooms work: two simultaneously rendered players with different
//! beatmap/ruleset/mod selections must not observe each other's state.
//! The only shared resource is registration with the master clock, and
//! that goes through its command channel.

use beatsync_protocol::UserId;
use tokio::sync::watch;

use crate::{
    AreaError, MasterClockHandle, Simulation, SimulationStatus, SpectatorPlayerClock,
};

/// What a participant is playing: the score/replay identity plus the
/// selection it was recorded under. Owned by value per area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayHandle {
    pub user_id: UserId,
    pub score_id: u64,
    pub beatmap_id: u64,
    pub ruleset_id: u32,
    /// Mod acronyms, as selected by this participant.
    pub mods: Vec<String>,
}

struct LoadedPlayer {
    handle: ReplayHandle,
    simulation: Box<dyn Simulation>,
}

/// Owns the lifecycle of one spectated participant's gameplay
/// simulation.
pub struct PlayerArea {
    user_id: UserId,
    clock: SpectatorPlayerClock,
    master: MasterClockHandle,
    loaded: Option<LoadedPlayer>,
    registered: bool,
    finished: bool,
    muted: bool,
    volume: f64,
    gameplay_started: watch::Sender<bool>,
}

impl PlayerArea {
    /// Creates an empty area for `user_id`. The simulation arrives
    /// later via [`PlayerArea::load`]; tearing down an area that never
    /// loaded is fine.
    pub fn new(user_id: UserId, master: MasterClockHandle) -> Self {
        Self {
            user_id,
            clock: SpectatorPlayerClock::new(),
            master,
            loaded: None,
            registered: false,
            finished: false,
            muted: false,
            volume: 1.0,
            gameplay_started: watch::Sender::new(false),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// This area's clock. The handle is cheap to clone; the master
    /// clock and the simulation both hold one.
    pub fn clock(&self) -> &SpectatorPlayerClock {
        &self.clock
    }

    /// Loads this participant's simulation and registers the area's
    /// clock with the master clock.
    ///
    /// At most once per area: a second call is a caller bug and fails
    /// with [`AreaError::AlreadyLoaded`].
    pub fn load(
        &mut self,
        handle: ReplayHandle,
        mut simulation: Box<dyn Simulation>,
    ) -> Result<(), AreaError> {
        if self.loaded.is_some() {
            return Err(AreaError::AlreadyLoaded(self.user_id));
        }
        if handle.user_id != self.user_id {
            return Err(AreaError::HandleMismatch {
                area: self.user_id,
                handle: handle.user_id,
            });
        }

        tracing::info!(
            user_id = %self.user_id,
            beatmap_id = handle.beatmap_id,
            ruleset_id = handle.ruleset_id,
            "loading player simulation"
        );
        self.master.register(self.clock.clone());
        self.registered = true;
        simulation.start(self.clock.clone());
        self.loaded = Some(LoadedPlayer { handle, simulation });
        Ok(())
    }

    /// Polls the simulation and propagates lifecycle edges. Call once
    /// per update frame.
    pub fn update(&mut self) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let status = loaded.simulation.status();

        // Loading → Gameplay edge: announced exactly once.
        if status == SimulationStatus::Gameplay && !*self.gameplay_started.borrow() {
            tracing::debug!(user_id = %self.user_id, "gameplay started");
            self.gameplay_started.send_replace(true);
        }

        // A finished or failed player must not hold the group back as a
        // perpetual zero: drop out of the master clock's registry.
        if status.is_finished() && !self.finished {
            tracing::info!(user_id = %self.user_id, ?status, "player simulation finished");
            self.finished = true;
            self.unregister();
        }
    }

    /// Simulation lifecycle state, or `None` before `load`.
    pub fn status(&self) -> Option<SimulationStatus> {
        self.loaded.as_ref().map(|l| l.simulation.status())
    }

    pub fn is_loaded(&self) -> bool {
        self.status().is_some_and(SimulationStatus::is_loaded)
    }

    /// Observes the one-shot gameplay-started signal. The value flips
    /// `false → true` exactly once in an area's life.
    pub fn gameplay_started(&self) -> watch::Receiver<bool> {
        self.gameplay_started.subscribe()
    }

    pub fn has_gameplay_started(&self) -> bool {
        *self.gameplay_started.borrow()
    }

    /// The replay selection this area plays, once loaded.
    pub fn replay_handle(&self) -> Option<&ReplayHandle> {
        self.loaded.as_ref().map(|l| &l.handle)
    }

    /// Replaces this area's mod selection (freestyle rooms let each
    /// participant change their own). Touches nothing outside the area.
    pub fn set_mods(&mut self, mods: Vec<String>) -> Result<(), AreaError> {
        match &mut self.loaded {
            Some(loaded) => {
                loaded.handle.mods = mods;
                Ok(())
            }
            None => Err(AreaError::NotLoaded(self.user_id)),
        }
    }

    /// Mutes or unmutes this area's audio. Gain only — the clock keeps
    /// running; a muted player must stay in sync.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// The gain the host mixer should apply for this area.
    pub fn effective_volume(&self) -> f64 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn unregister(&mut self) {
        if self.registered {
            self.master.unregister(self.clock.id());
            self.registered = false;
        }
    }
}

impl Drop for PlayerArea {
    fn drop(&mut self) {
        if let Some(loaded) = &mut self.loaded {
            loaded.simulation.stop();
        }
        self.unregister();
        tracing::debug!(user_id = %self.user_id, "player area torn down");
    }
}
