use core::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A signed duration with nanosecond resolution.
///
/// Offsets from the master are expressed as [`Duration`]s: a positive value
/// means the local clock is ahead of the master, a negative value that it is
/// behind. This is a deliberate departure from implementations that clamp
/// negative timestamp differences to zero and thereby hide legitimate
/// negative offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    nanos: i64,
}

impl Duration {
    /// A duration of zero length
    pub const ZERO: Self = Duration { nanos: 0 };

    /// Create a duration from a number of nanoseconds
    pub const fn from_nanos(nanos: i64) -> Self {
        Duration { nanos }
    }

    /// Create a duration from a number of microseconds
    pub const fn from_micros(micros: i64) -> Self {
        Duration {
            nanos: micros * 1_000,
        }
    }

    /// Create a duration from a number of milliseconds
    pub const fn from_millis(millis: i64) -> Self {
        Duration {
            nanos: millis * 1_000_000,
        }
    }

    /// Create a duration from a number of seconds
    pub const fn from_secs(secs: i64) -> Self {
        Duration {
            nanos: secs * 1_000_000_000,
        }
    }

    /// The number of nanoseconds in this duration
    pub const fn nanos(&self) -> i64 {
        self.nanos
    }

    /// The absolute value of this duration
    pub const fn abs(self) -> Self {
        Duration {
            nanos: self.nanos.saturating_abs(),
        }
    }

    /// Whether this duration is negative
    pub const fn is_negative(&self) -> bool {
        self.nanos < 0
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Self) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_add(rhs.nanos),
        }
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_sub(rhs.nanos),
        }
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_neg(),
        }
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_mul(rhs),
        }
    }
}

impl core::fmt::Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ns", self.nanos)
    }
}
