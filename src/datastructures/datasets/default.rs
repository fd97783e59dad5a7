use crate::{
    config::InstanceConfig,
    datastructures::common::{ClockIdentity, ClockQuality},
};

/// Static description of the local clock, *IEEE1588-2019 section 8.2.1*
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDS {
    pub(crate) clock_identity: ClockIdentity,
    pub(crate) clock_quality: ClockQuality,
    pub(crate) priority_1: u8,
    pub(crate) priority_2: u8,
    pub(crate) domain_number: u8,
    pub(crate) slave_only: bool,
}

impl DefaultDS {
    pub(crate) fn new(config: InstanceConfig) -> Self {
        DefaultDS {
            clock_identity: config.clock_identity,
            clock_quality: config.clock_quality,
            priority_1: config.priority_1,
            priority_2: config.priority_2,
            domain_number: config.domain_number,
            slave_only: config.slave_only,
        }
    }
}
