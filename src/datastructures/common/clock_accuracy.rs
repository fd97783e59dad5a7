/// The estimated accuracy of a clock, in coarse nanosecond buckets.
///
/// For more details, see *IEEE1588-2019 table 5*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockAccuracy {
    /// Accurate within 25ns
    NS25,
    /// Accurate within 100ns
    NS100,
    /// Accurate within 250ns
    NS250,
    /// Accurate within 1µs
    US1,
    /// Accurate within 2.5µs
    US2_5,
    /// Accurate within 10µs
    US10,
    /// Accurate within 25µs
    US25,
    /// Accurate within 100µs
    US100,
    /// Accurate within 250µs
    US250,
    /// Accurate within 1ms
    MS1,
    /// Accurate within 2.5ms
    MS2_5,
    /// Accurate within 10ms
    MS10,
    /// Accurate within 25ms
    MS25,
    /// Accurate within 100ms
    MS100,
    /// Accurate within 250ms
    MS250,
    /// Accurate within 1s
    S1,
    /// Accurate within 10s
    S10,
    /// Accurate within >10s
    SGT10,
    /// Accuracy is unknown
    Unknown,
    /// Reserved or profile specific value
    Reserved(u8),
}

impl Default for ClockAccuracy {
    fn default() -> Self {
        Self::Unknown
    }
}

impl ClockAccuracy {
    /// Converts the enum to its wire value as specified in
    /// *IEEE1588-2019 table 5*
    pub fn to_primitive(self) -> u8 {
        match self {
            Self::NS25 => 0x20,
            Self::NS100 => 0x21,
            Self::NS250 => 0x22,
            Self::US1 => 0x23,
            Self::US2_5 => 0x24,
            Self::US10 => 0x25,
            Self::US25 => 0x26,
            Self::US100 => 0x27,
            Self::US250 => 0x28,
            Self::MS1 => 0x29,
            Self::MS2_5 => 0x2a,
            Self::MS10 => 0x2b,
            Self::MS25 => 0x2c,
            Self::MS100 => 0x2d,
            Self::MS250 => 0x2e,
            Self::S1 => 0x2f,
            Self::S10 => 0x30,
            Self::SGT10 => 0x31,
            Self::Unknown => 0xfe,
            Self::Reserved(v) => v,
        }
    }

    pub(crate) fn from_primitive(value: u8) -> Self {
        match value {
            0x20 => Self::NS25,
            0x21 => Self::NS100,
            0x22 => Self::NS250,
            0x23 => Self::US1,
            0x24 => Self::US2_5,
            0x25 => Self::US10,
            0x26 => Self::US25,
            0x27 => Self::US100,
            0x28 => Self::US250,
            0x29 => Self::MS1,
            0x2a => Self::MS2_5,
            0x2b => Self::MS10,
            0x2c => Self::MS25,
            0x2d => Self::MS100,
            0x2e => Self::MS250,
            0x2f => Self::S1,
            0x30 => Self::S10,
            0x31 => Self::SGT10,
            0xfe => Self::Unknown,
            v => Self::Reserved(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        for value in 0u8..=255 {
            assert_eq!(ClockAccuracy::from_primitive(value).to_primitive(), value);
        }
    }
}
