use crate::config::{ClockIdentity, ClockQuality};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct InstanceConfig {
    pub clock_identity: ClockIdentity,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
}

impl InstanceConfig {
    /// A configuration with the gPTP defaults for an ordinary time-aware
    /// system: priorities 248, default clock quality, domain 0.
    pub fn new(clock_identity: ClockIdentity) -> Self {
        Self {
            clock_identity,
            clock_quality: ClockQuality::default(),
            priority_1: 248,
            priority_2: 248,
            domain_number: 0,
            slave_only: false,
        }
    }
}
