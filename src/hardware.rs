//! Abstraction over hardware timestamping units and adjustable clocks
//!
//! All timestamp capture and clock steering goes through the
//! [`HardwareClock`] trait; the engines never touch a platform API. Hosts
//! provide an implementation for their NIC or PHC, and
//! [`SimulatedHardwareClock`] offers a software implementation for tests and
//! loopback setups.

use arrayvec::ArrayVec;

use crate::time::{Duration, Time};

/// Access to a hardware clock with packet timestamping.
///
/// All calls are expected to be fast and non-blocking; an implementation
/// that blocks on I/O violates the real time contract of the engines. Every
/// method may fail, and the engines treat a failure as "this sample is lost",
/// never as fatal.
pub trait HardwareClock {
    /// Error type of the clock, must implement [`core::fmt::Debug`]
    type Error: core::fmt::Debug;

    /// The departure timestamp of a recently sent event message
    fn capture_tx_timestamp(&mut self, sequence_id: u16) -> Result<Time, Self::Error>;

    /// The arrival timestamp of a recently received event message
    fn capture_rx_timestamp(&mut self, sequence_id: u16) -> Result<Time, Self::Error>;

    /// Adjust the clock rate by `ppb` parts per billion, replacing any
    /// previous rate adjustment
    fn adjust_clock_frequency(&mut self, ppb: i32) -> Result<(), Self::Error>;

    /// Shift the clock by a signed offset without changing its rate
    fn adjust_clock_phase(&mut self, offset: Duration) -> Result<(), Self::Error>;

    /// Hard-set the clock, used for step corrections
    fn set_clock_time(&mut self, time: Time) -> Result<(), Self::Error>;

    /// The current time of the clock
    fn get_clock_time(&mut self) -> Result<Time, Self::Error>;

    /// Whether transmit hardware can insert origin timestamps on the fly,
    /// making Follow_Up messages unnecessary
    fn supports_one_step(&self) -> bool;

    /// The expected error of captured timestamps
    fn timestamp_accuracy(&self) -> Duration;
}

/// The error of the simulated clock, raised only when scripted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "std", error("simulated hardware failure"))]
pub struct SimulatedClockError;

#[cfg(not(feature = "std"))]
impl core::fmt::Display for SimulatedClockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("simulated hardware failure")
    }
}

/// A recorded steering action on the simulated clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAdjustment {
    Frequency { ppb: i32 },
    Phase { offset: Duration },
    Step { time: Time },
}

const MAX_RECORDED_ADJUSTMENTS: usize = 32;

/// A software clock for tests and loopback hosts.
///
/// Timestamp capture returns the current simulated time. The clock records
/// every steering action and can be scripted to fail its next calls, which
/// is how the hardware error paths of the engines are exercised.
#[derive(Debug)]
pub struct SimulatedHardwareClock {
    now: Time,
    frequency_ppb: i32,
    one_step: bool,
    failures_remaining: u32,
    adjustments: ArrayVec<ClockAdjustment, MAX_RECORDED_ADJUSTMENTS>,
}

impl Default for SimulatedHardwareClock {
    fn default() -> Self {
        Self::new(Time::ZERO)
    }
}

impl SimulatedHardwareClock {
    pub fn new(now: Time) -> Self {
        Self {
            now,
            frequency_ppb: 0,
            one_step: false,
            failures_remaining: 0,
            adjustments: ArrayVec::new(),
        }
    }

    /// Let the simulated time pass
    pub fn advance(&mut self, duration: Duration) {
        self.now = self.now + duration;
    }

    /// Make the next `count` hardware calls fail
    pub fn fail_next_calls(&mut self, count: u32) {
        self.failures_remaining = count;
    }

    pub fn set_one_step_support(&mut self, one_step: bool) {
        self.one_step = one_step;
    }

    /// The steering actions applied so far, oldest first
    pub fn adjustments(&self) -> &[ClockAdjustment] {
        &self.adjustments
    }

    pub fn frequency_ppb(&self) -> i32 {
        self.frequency_ppb
    }

    fn check_scripted_failure(&mut self) -> Result<(), SimulatedClockError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            Err(SimulatedClockError)
        } else {
            Ok(())
        }
    }

    fn record(&mut self, adjustment: ClockAdjustment) {
        if self.adjustments.is_full() {
            self.adjustments.remove(0);
        }
        self.adjustments.push(adjustment);
    }
}

impl HardwareClock for SimulatedHardwareClock {
    type Error = SimulatedClockError;

    fn capture_tx_timestamp(&mut self, _sequence_id: u16) -> Result<Time, Self::Error> {
        self.check_scripted_failure()?;
        Ok(self.now)
    }

    fn capture_rx_timestamp(&mut self, _sequence_id: u16) -> Result<Time, Self::Error> {
        self.check_scripted_failure()?;
        Ok(self.now)
    }

    fn adjust_clock_frequency(&mut self, ppb: i32) -> Result<(), Self::Error> {
        self.check_scripted_failure()?;
        self.frequency_ppb = ppb;
        self.record(ClockAdjustment::Frequency { ppb });
        Ok(())
    }

    fn adjust_clock_phase(&mut self, offset: Duration) -> Result<(), Self::Error> {
        self.check_scripted_failure()?;
        self.now = self.now + offset;
        self.record(ClockAdjustment::Phase { offset });
        Ok(())
    }

    fn set_clock_time(&mut self, time: Time) -> Result<(), Self::Error> {
        self.check_scripted_failure()?;
        self.now = time;
        self.record(ClockAdjustment::Step { time });
        Ok(())
    }

    fn get_clock_time(&mut self) -> Result<Time, Self::Error> {
        self.check_scripted_failure()?;
        Ok(self.now)
    }

    fn supports_one_step(&self) -> bool {
        self.one_step
    }

    fn timestamp_accuracy(&self) -> Duration {
        Duration::from_nanos(1)
    }
}
