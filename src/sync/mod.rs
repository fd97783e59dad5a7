//! The time synchronization engine: offset measurement and clock steering
//!
//! The engine consumes Sync/Follow_Up data handed to it by the instance
//! layer, estimates the offset to the current master and steers the local
//! clock through the [`HardwareClock`] interface. It performs no I/O and
//! keeps no timers; Sync receipt timeouts are delivered by the host.

mod servo;

use arrayvec::ArrayVec;

use crate::{
    hardware::HardwareClock,
    time::{Duration, Time},
};
use servo::PiServo;

/// Number of offset samples the median filter looks at
const OFFSET_WINDOW: usize = 8;

/// Offsets below this need no correction at all
const DEFAULT_MIN_OFFSET: Duration = Duration::from_nanos(100);

/// Offsets above this get a step correction instead of a slew
const DEFAULT_MAX_OFFSET: Duration = Duration::from_millis(1);

/// Consecutive hardware failures after which the engine gives up on its
/// synchronization state
const DEFAULT_HARDWARE_ERROR_THRESHOLD: u32 = 5;

/// The synchronization state of the local clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// No usable master, or steering has failed repeatedly
    Unsynchronized,
    /// Offset samples are coming in and the servo is converging
    Synchronizing,
    /// The offset is below the minimum threshold
    Synchronized,
    /// The master went quiet after synchronization; the clock free-runs on
    /// its last known rate
    Holdover,
}

/// Tuning knobs of the synchronization engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Offsets below this threshold are left uncorrected
    pub min_offset_threshold: Duration,
    /// Offsets above this threshold are stepped rather than slewed
    pub max_offset_threshold: Duration,
    /// Consecutive hardware errors tolerated before desynchronizing
    pub hardware_error_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_offset_threshold: DEFAULT_MIN_OFFSET,
            max_offset_threshold: DEFAULT_MAX_OFFSET,
            hardware_error_threshold: DEFAULT_HARDWARE_ERROR_THRESHOLD,
        }
    }
}

/// Counters and gauges of the engine, snapshotted by value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncStatistics {
    pub syncs_processed: u64,
    pub follow_ups_processed: u64,
    pub follow_ups_rejected: u64,
    pub frequency_adjustments: u64,
    pub step_corrections: u64,
    pub hardware_errors: u64,
    /// The median filtered offset of the last accepted sample
    pub current_offset: Option<Duration>,
    /// The most recent rate correction handed to the hardware
    pub last_adjustment_ppb: f64,
}

#[derive(Debug, Clone, Copy)]
struct PendingSync {
    sequence_id: u16,
    rx_timestamp: Time,
}

/// See the [module documentation](`crate::sync`).
#[derive(Debug)]
pub struct TimeSyncEngine<H> {
    clock: H,
    config: SyncConfig,
    state: SyncState,
    pending: Option<PendingSync>,
    offset_window: ArrayVec<Duration, OFFSET_WINDOW>,
    servo: PiServo,
    hardware_error_streak: u32,
    statistics: SyncStatistics,
}

impl<H: HardwareClock> TimeSyncEngine<H> {
    pub fn new(clock: H, config: SyncConfig) -> Self {
        Self {
            clock,
            config,
            state: SyncState::Unsynchronized,
            pending: None,
            offset_window: ArrayVec::new(),
            servo: PiServo::default(),
            hardware_error_streak: 0,
            statistics: SyncStatistics::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn statistics(&self) -> SyncStatistics {
        self.statistics
    }

    pub(crate) fn clock_mut(&mut self) -> &mut H {
        &mut self.clock
    }

    /// Handle a received Sync message.
    ///
    /// Two-step Syncs only record the pairing state for the Follow_Up; a
    /// one-step Sync (when the hardware supports one-step operation) carries
    /// its own origin timestamp and is processed on the spot.
    pub fn handle_sync(
        &mut self,
        two_step: bool,
        sequence_id: u16,
        origin_timestamp: Time,
        rx_timestamp: Time,
        mean_path_delay: Duration,
    ) {
        self.statistics.syncs_processed += 1;

        if two_step || !self.clock.supports_one_step() {
            if let Some(stale) = self.pending.replace(PendingSync {
                sequence_id,
                rx_timestamp,
            }) {
                log::debug!(
                    "sync {} replaced unanswered sync {}",
                    sequence_id,
                    stale.sequence_id
                );
            }
        } else {
            self.process_sample(rx_timestamp, origin_timestamp, mean_path_delay);
        }
    }

    /// Handle the Follow_Up belonging to an earlier two-step Sync.
    ///
    /// The pairing is strict: without a pending Sync of the same sequence id
    /// the message is counted as rejected and changes nothing.
    pub fn handle_follow_up(
        &mut self,
        sequence_id: u16,
        precise_origin_timestamp: Time,
        mean_path_delay: Duration,
    ) {
        let matched = match self.pending {
            Some(pending) if pending.sequence_id == sequence_id => pending,
            _ => {
                self.statistics.follow_ups_rejected += 1;
                log::debug!("follow up {} does not match pending sync", sequence_id);
                return;
            }
        };

        self.pending = None;
        self.statistics.follow_ups_processed += 1;
        self.process_sample(
            matched.rx_timestamp,
            precise_origin_timestamp,
            mean_path_delay,
        );
    }

    /// The master stopped sending Syncs.
    ///
    /// A synchronized clock keeps running at its last known rate (holdover)
    /// rather than immediately being declared unsynchronized.
    pub fn handle_sync_timeout(&mut self) {
        self.pending = None;
        self.state = match self.state {
            SyncState::Synchronized | SyncState::Holdover => SyncState::Holdover,
            _ => SyncState::Unsynchronized,
        };
    }

    /// Stop synchronizing. Equivalent to [`reset`](`Self::reset`); the name
    /// exists so hosts can speak in lifecycle terms.
    pub fn stop(&mut self) {
        self.reset();
    }

    /// Drop all pairing state, filter history and servo memory.
    ///
    /// Idempotent; a stopped engine can be fed again and will never pair a
    /// pre-stop Sync with a post-stop Follow_Up.
    pub fn reset(&mut self) {
        self.pending = None;
        self.offset_window.clear();
        self.servo.reset();
        self.hardware_error_streak = 0;
        self.state = SyncState::Unsynchronized;
        self.statistics.current_offset = None;
    }

    /// Positive when the local clock is ahead of the master
    fn calculate_offset(
        rx_timestamp: Time,
        origin_timestamp: Time,
        mean_path_delay: Duration,
    ) -> Duration {
        (rx_timestamp - origin_timestamp) - mean_path_delay
    }

    fn process_sample(
        &mut self,
        rx_timestamp: Time,
        origin_timestamp: Time,
        mean_path_delay: Duration,
    ) {
        let raw_offset = Self::calculate_offset(rx_timestamp, origin_timestamp, mean_path_delay);

        if self.offset_window.is_full() {
            self.offset_window.remove(0);
        }
        self.offset_window.push(raw_offset);

        let offset = median(&self.offset_window);
        self.statistics.current_offset = Some(offset);

        if self.state == SyncState::Unsynchronized {
            self.state = SyncState::Synchronizing;
        }

        if offset.abs() < self.config.min_offset_threshold {
            self.state = SyncState::Synchronized;
        } else if offset.abs() > self.config.max_offset_threshold {
            self.step_clock(offset);
        } else {
            self.slew_clock(offset);
        }
    }

    /// Gross error: hard-set the clock and restart the filter, a servo would
    /// take unbounded time to slew this away
    fn step_clock(&mut self, offset: Duration) {
        let stepped = self
            .clock
            .get_clock_time()
            .and_then(|now| self.clock.set_clock_time(now - offset));

        match stepped {
            Ok(()) => {
                log::warn!("offset {} too large, stepping clock", offset);
                self.statistics.step_corrections += 1;
                self.hardware_error_streak = 0;
                self.offset_window.clear();
                self.servo.reset();
                self.state = SyncState::Synchronizing;
            }
            Err(error) => self.hardware_failure("step", &error),
        }
    }

    fn slew_clock(&mut self, offset: Duration) {
        // the error to correct is the negated offset
        let ppb = self.servo.update(-offset.nanos() as f64);
        let clamped = ppb.clamp(i32::MIN as f64, i32::MAX as f64) as i32;

        match self.clock.adjust_clock_frequency(clamped) {
            Ok(()) => {
                log::trace!("offset {}, adjusting frequency by {} ppb", offset, clamped);
                self.statistics.frequency_adjustments += 1;
                self.statistics.last_adjustment_ppb = ppb;
                self.hardware_error_streak = 0;
                self.state = SyncState::Synchronizing;
            }
            Err(error) => self.hardware_failure("frequency adjustment", &error),
        }
    }

    fn hardware_failure(&mut self, operation: &str, error: &H::Error) {
        log::error!("hardware {} failed: {:?}", operation, error);
        self.statistics.hardware_errors += 1;
        self.hardware_error_streak += 1;

        if self.hardware_error_streak >= self.config.hardware_error_threshold {
            log::error!("giving up on synchronization after repeated hardware errors");
            self.state = SyncState::Unsynchronized;
        }
    }
}

/// The median of a non-empty window, averaging the central pair for windows
/// of even length
fn median(window: &[Duration]) -> Duration {
    let mut sorted: ArrayVec<Duration, OFFSET_WINDOW> = window.iter().copied().collect();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        let pair_sum = sorted[mid - 1].nanos() as i128 + sorted[mid].nanos() as i128;
        Duration::from_nanos((pair_sum / 2) as i64)
    }
}
