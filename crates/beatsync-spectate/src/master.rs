//! The master spectator clock: one shared virtual timeline for every
//! simultaneously spectated player.
//!
//! `tick` runs once per rendering frame on the host's pacing loop and
//! must never block: membership changes arrive over an mpsc channel
//! from cloneable [`MasterClockHandle`]s and are folded in at tick
//! boundaries, so areas on other tasks can register and tear down
//! freely while the frame loop runs. A clock removed mid-computation is
//! simply absent from the next drain.
//!
//! Two times live here:
//!
//! - the **pacing target** — advances monotonically with wall elapsed
//!   time while at least one member has data, and is what member clocks
//!   chase (at catch-up rate when they've fallen behind);
//! - the **reference time** — the minimum `current_time` across
//!   registered, non-waiting members. This is what consumers display
//!   and seek by, and it never exceeds the least-ready participant.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::{ClockId, SpectatorPlayerClock, SyncConfig};

enum ClockCommand {
    Register(SpectatorPlayerClock),
    Unregister(ClockId),
}

/// Cheap-to-clone registrar for the master clock. Held by player areas
/// so teardown can unregister from any task.
#[derive(Clone)]
pub struct MasterClockHandle {
    sender: mpsc::UnboundedSender<ClockCommand>,
}

impl MasterClockHandle {
    /// Adds a clock to the registry at the next tick boundary.
    pub fn register(&self, clock: SpectatorPlayerClock) {
        let _ = self.sender.send(ClockCommand::Register(clock));
    }

    /// Removes a clock at the next tick boundary. Unknown ids are a
    /// no-op, so double-unregistration is harmless.
    pub fn unregister(&self, id: ClockId) {
        let _ = self.sender.send(ClockCommand::Unregister(id));
    }
}

/// Aggregates player clocks and derives the group's reference time
/// from the slowest non-waiting member.
pub struct MasterSpectatorClock {
    config: SyncConfig,
    clocks: Vec<SpectatorPlayerClock>,
    commands: mpsc::UnboundedReceiver<ClockCommand>,
    handle: MasterClockHandle,
    target_time: f64,
    reference_time: f64,
    stalled: bool,
}

impl MasterSpectatorClock {
    pub fn new(config: SyncConfig) -> Self {
        let (sender, commands) = mpsc::unbounded_channel();
        Self {
            config: config.validated(),
            clocks: Vec::new(),
            commands,
            handle: MasterClockHandle { sender },
            target_time: 0.0,
            reference_time: 0.0,
            stalled: false,
        }
    }

    /// A registrar usable from other tasks.
    pub fn handle(&self) -> MasterClockHandle {
        self.handle.clone()
    }

    /// Registers a clock directly (same-thread convenience).
    pub fn register(&mut self, clock: SpectatorPlayerClock) {
        self.insert(clock);
    }

    /// The group reference time: minimum across non-waiting members,
    /// frozen while stalled or empty.
    pub fn current_time(&self) -> f64 {
        self.reference_time
    }

    /// Whether the last tick found every member waiting on frames.
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Number of registered clocks, after folding in pending
    /// registrations.
    pub fn clock_count(&mut self) -> usize {
        self.drain_commands();
        self.clocks.len()
    }

    /// Advances the group by one frame and returns the new reference
    /// time.
    ///
    /// Runs at display frame rate for a dozen or more clocks: nothing
    /// here blocks, and the steady state allocates nothing.
    pub fn tick(&mut self, elapsed: Duration) -> f64 {
        self.drain_commands();

        if self.clocks.is_empty() {
            return self.reference_time;
        }

        if self.clocks.iter().all(|c| c.waiting_on_frames()) {
            // Every member is buffering: freeze rather than running the
            // target ahead of data nobody has.
            if !self.stalled {
                self.stalled = true;
                tracing::debug!(clocks = self.clocks.len(), "all player clocks waiting, master stalled");
            }
            return self.reference_time;
        }
        if self.stalled {
            self.stalled = false;
            tracing::debug!("master clock resumed");
        }

        self.target_time += elapsed.as_secs_f64() * 1000.0;
        for clock in &self.clocks {
            clock.tick(self.target_time, elapsed, &self.config);
        }

        let mut reference = f64::INFINITY;
        for clock in &self.clocks {
            if !clock.waiting_on_frames() {
                reference = reference.min(clock.current_time());
            }
        }
        if reference.is_finite() {
            self.reference_time = reference;
        }
        self.reference_time
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                ClockCommand::Register(clock) => self.insert(clock),
                ClockCommand::Unregister(id) => {
                    let before = self.clocks.len();
                    self.clocks.retain(|c| c.id() != id);
                    if self.clocks.len() < before {
                        tracing::debug!(clock = %id, clocks = self.clocks.len(), "player clock unregistered");
                    }
                }
            }
        }
    }

    fn insert(&mut self, clock: SpectatorPlayerClock) {
        if self.clocks.iter().any(|c| c.id() == clock.id()) {
            tracing::debug!(clock = %clock.id(), "clock already registered, ignoring");
            return;
        }
        tracing::debug!(clock = %clock.id(), clocks = self.clocks.len() + 1, "player clock registered");
        self.clocks.push(clock);
    }
}
