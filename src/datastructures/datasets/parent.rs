use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, PortIdentity, TimeSource},
    datasets::DefaultDS,
};

/// Description of the current grandmaster and the port it is reached
/// through, *IEEE1588-2019 section 8.2.3*
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentDS {
    pub(crate) parent_port_identity: PortIdentity,
    pub(crate) grandmaster_identity: ClockIdentity,
    pub(crate) grandmaster_clock_quality: ClockQuality,
    pub(crate) grandmaster_priority_1: u8,
    pub(crate) grandmaster_priority_2: u8,
    pub(crate) time_source: TimeSource,
}

impl ParentDS {
    /// A parent dataset for a clock that is its own grandmaster
    pub(crate) fn new(default_ds: &DefaultDS) -> Self {
        ParentDS {
            parent_port_identity: PortIdentity {
                clock_identity: default_ds.clock_identity,
                port_number: 0,
            },
            grandmaster_identity: default_ds.clock_identity,
            grandmaster_clock_quality: default_ds.clock_quality,
            grandmaster_priority_1: default_ds.priority_1,
            grandmaster_priority_2: default_ds.priority_2,
            time_source: TimeSource::InternalOscillator,
        }
    }
}
