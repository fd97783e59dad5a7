//! Read-only snapshots of the engine state for telemetry and management
//!
//! Everything here is a plain `Copy` value produced on request; holding a
//! snapshot never blocks or mutates the engines.

use crate::{
    pdelay::PathDelayStatistics,
    port::{PortState, PortStatistics},
    sync::{SyncState, SyncStatistics},
    time::Duration,
    validation::ValidationReport,
};

/// The observable state of a [`GptpPort`](`crate::GptpPort`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GptpPortSnapshot {
    /// Protocol state of the port state machine
    pub port_state: PortState,
    /// State of the time synchronization engine
    pub sync_state: SyncState,
    /// Median filtered offset to the master, when one has been measured
    pub current_offset: Option<Duration>,
    /// Path delay of the link, `None` while the measurement is stale
    pub mean_path_delay: Option<Duration>,
    pub path_delay_valid: bool,
    pub port_statistics: PortStatistics,
    pub sync_statistics: SyncStatistics,
    pub path_delay_statistics: PathDelayStatistics,
    /// Frames dropped by the validator since startup
    pub invalid_messages: u64,
}

/// The outcome of receiving one frame: what the validator said, and whether
/// the frame reached an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOutcome {
    pub report: ValidationReport,
    pub accepted: bool,
}
