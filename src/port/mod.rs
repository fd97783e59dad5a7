//! Abstraction of a network port and its protocol state machine

mod state;

pub use state::{transition, InvalidTransition, PortEvent, PortState};

use core::iter::Fuse;

use arrayvec::ArrayVec;
use rand::Rng;

use crate::{config::PortConfig, datastructures::common::PortIdentity};

/// An action the [`Port`] needs the host to perform.
///
/// The port schedules nothing itself; cyclic transmission and timers are the
/// host's job and these actions tell it what to start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum PortAction {
    /// Begin cyclic Announce transmission at the configured interval
    StartAnnounce,
    /// Stop cyclic Announce transmission
    StopAnnounce,
    /// Begin cyclic Sync transmission at the configured interval
    StartSync,
    /// Stop cyclic Sync transmission
    StopSync,
    /// Restart the announce receipt timeout, expiring in `duration` from now
    ResetAnnounceReceiptTimer { duration: core::time::Duration },
}

const MAX_ACTIONS: usize = 2;

/// An Iterator over [`PortAction`]s
///
/// These are returned whenever the library needs the host to act on the
/// system.
#[derive(Debug)]
#[must_use]
pub struct PortActionIterator {
    internal: Fuse<<ArrayVec<PortAction, MAX_ACTIONS> as IntoIterator>::IntoIter>,
}

impl PortActionIterator {
    /// Get an empty Iterator
    ///
    /// This can for example be used to have a default value in chained `if`
    /// statements.
    pub fn empty() -> Self {
        Self {
            internal: ArrayVec::new().into_iter().fuse(),
        }
    }

    pub(crate) fn from(list: ArrayVec<PortAction, MAX_ACTIONS>) -> Self {
        Self {
            internal: list.into_iter().fuse(),
        }
    }
}

impl Iterator for PortActionIterator {
    type Item = PortAction;

    fn next(&mut self) -> Option<Self::Item> {
        self.internal.next()
    }
}

/// Event counters of a single port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStatistics {
    /// State transitions taken
    pub transitions: u64,
    /// Events rejected as invalid for the current state
    pub rejected_events: u64,
}

/// A single port of a gPTP instance: its identity, configuration and
/// protocol state.
///
/// The port maps applied [`PortEvent`]s onto the actions the host has to
/// take. It is driven entirely from the outside; see [`transition`] for the
/// underlying state machine.
#[derive(Debug)]
pub struct Port<R> {
    port_identity: PortIdentity,
    config: PortConfig,
    state: PortState,
    statistics: PortStatistics,
    rng: R,
}

impl<R: Rng> Port<R> {
    pub fn new(config: PortConfig, port_identity: PortIdentity, rng: R) -> Self {
        Self {
            port_identity,
            config,
            state: PortState::Initializing,
            statistics: PortStatistics::default(),
            rng,
        }
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn port_identity(&self) -> PortIdentity {
        self.port_identity
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn statistics(&self) -> PortStatistics {
        self.statistics
    }

    /// Apply an event to the state machine and report what the host has to
    /// do about it.
    ///
    /// Invalid combinations leave the state untouched and return the error;
    /// the caller decides whether that is a protocol violation or a stale
    /// timer firing late.
    pub fn handle_event(
        &mut self,
        event: PortEvent,
    ) -> Result<PortActionIterator, InvalidTransition> {
        let mut next = match transition(self.state, event) {
            Ok(next) => next,
            Err(error) => {
                self.statistics.rejected_events += 1;
                log::debug!("port event rejected: {:?} in {:?}", event, self.state);
                return Err(error);
            }
        };

        // a master-only port never calibrates towards a remote master
        if self.config.master_only && next == PortState::Uncalibrated {
            next = PortState::Passive;
        }

        let previous = self.state;
        self.state = next;
        if previous != next {
            self.statistics.transitions += 1;
            log::info!("port state {:?} -> {:?} on {:?}", previous, next, event);
        }

        Ok(self.actions_for(previous, next, event))
    }

    fn actions_for(
        &mut self,
        previous: PortState,
        next: PortState,
        event: PortEvent,
    ) -> PortActionIterator {
        use PortState::*;

        if next == Master && previous != Master {
            actions![PortAction::StartAnnounce, PortAction::StartSync]
        } else if previous == Master && next != Master {
            actions![PortAction::StopAnnounce, PortAction::StopSync]
        } else if event == PortEvent::SuperiorAnnounce || next == Listening {
            let duration = self.config.announce_duration(&mut self.rng);
            actions![PortAction::ResetAnnounceReceiptTimer { duration }]
        } else {
            actions![]
        }
    }
}
