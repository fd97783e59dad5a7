use core::ops::{Add, Sub};

use super::Duration;

/// The number of seconds a PTP timestamp can represent (a 48 bit field)
const MAX_SECONDS: u64 = (1 << 48) - 1;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// A point in time on the PTP timescale.
///
/// Timestamps on the wire consist of a 48 bit seconds field and a 32 bit
/// nanoseconds field (*IEEE 802.1AS-2021 clause 6.4.3.4*). [`Time`] upholds
/// the same invariants: the nanoseconds are always below 10^9 and the
/// seconds never exceed the 48 bit range. Arithmetic that would leave that
/// range saturates instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    secs: u64,
    nanos: u32,
}

impl Time {
    /// The zero point of the timescale
    pub const ZERO: Self = Time { secs: 0, nanos: 0 };

    /// The latest representable instant
    pub const MAX: Self = Time {
        secs: MAX_SECONDS,
        nanos: NANOS_PER_SECOND as u32 - 1,
    };

    /// Create a [`Time`] from split seconds and nanoseconds fields.
    ///
    /// Nanoseconds of a second or more carry into the seconds field; the
    /// seconds field saturates at the 48 bit maximum.
    pub fn from_secs_nanos(secs: u64, nanos: u32) -> Self {
        let secs = secs.saturating_add(nanos as u64 / NANOS_PER_SECOND);
        if secs > MAX_SECONDS {
            return Self::MAX;
        }

        Time {
            secs,
            nanos: nanos % NANOS_PER_SECOND as u32,
        }
    }

    /// Create a [`Time`] from a flat nanosecond count.
    ///
    /// # Example
    /// ```
    /// # use gptp::time::Time;
    /// let t = Time::from_nanos(2_500_000_000);
    /// assert_eq!(t.secs(), 2);
    /// assert_eq!(t.subsec_nanos(), 500_000_000);
    /// ```
    pub const fn from_nanos(nanos: u64) -> Self {
        // u64 nanoseconds top out below 2^35 seconds, well within 48 bits
        Time {
            secs: nanos / NANOS_PER_SECOND,
            nanos: (nanos % NANOS_PER_SECOND) as u32,
        }
    }

    /// The whole seconds of this instant
    pub const fn secs(&self) -> u64 {
        self.secs
    }

    /// The nanoseconds within the current second, always below 10^9
    pub const fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// This instant as a flat nanosecond count, saturating for instants too
    /// far in the future to fit a [`u64`]
    pub fn as_nanos(&self) -> u64 {
        self.secs
            .saturating_mul(NANOS_PER_SECOND)
            .saturating_add(self.nanos as u64)
    }

    fn as_nanos_i128(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SECOND as i128 + self.nanos as i128
    }

    fn from_nanos_i128(nanos: i128) -> Self {
        if nanos <= 0 {
            return Self::ZERO;
        }

        let secs = nanos / NANOS_PER_SECOND as i128;
        if secs > MAX_SECONDS as i128 {
            return Self::MAX;
        }

        Time {
            secs: secs as u64,
            nanos: (nanos % NANOS_PER_SECOND as i128) as u32,
        }
    }
}

impl Sub for Time {
    type Output = Duration;

    /// The signed duration between two instants.
    ///
    /// Subtracting a later instant from an earlier one gives a negative
    /// [`Duration`]; offsets are signed throughout this crate.
    fn sub(self, rhs: Self) -> Self::Output {
        let diff = self.as_nanos_i128() - rhs.as_nanos_i128();
        Duration::from_nanos(diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Self::Output {
        Self::from_nanos_i128(self.as_nanos_i128() + rhs.nanos() as i128)
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self::from_nanos_i128(self.as_nanos_i128() - rhs.nanos() as i128)
    }
}

impl core::fmt::Display for Time {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}
