//! Best master clock algorithm, *IEEE 802.1AS-2021 section 10.3*

pub(crate) mod foreign_master;

pub(crate) use foreign_master::ForeignMasterList;

use core::cmp::Ordering;

use crate::datastructures::{
    common::{ClockIdentity, ClockQuality},
    datasets::DefaultDS,
    messages::AnnounceMessage,
};

/// The attributes of a clock that take part in the best master election.
///
/// Extracted from the grandmaster fields of a received Announce, or from the
/// local [`DefaultDS`] when the local clock is a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignClockDS {
    pub priority_1: u8,
    pub clock_quality: ClockQuality,
    pub priority_2: u8,
    pub identity: ClockIdentity,
}

impl ForeignClockDS {
    pub(crate) fn from_announce(message: &AnnounceMessage) -> Self {
        Self {
            priority_1: message.grandmaster_priority_1,
            clock_quality: message.grandmaster_clock_quality,
            priority_2: message.grandmaster_priority_2,
            identity: message.grandmaster_identity,
        }
    }

    pub(crate) fn from_default_ds(default_ds: &DefaultDS) -> Self {
        Self {
            priority_1: default_ds.priority_1,
            clock_quality: default_ds.clock_quality,
            priority_2: default_ds.priority_2,
            identity: default_ds.clock_identity,
        }
    }

    /// Whether this clock wins the election against `other`
    pub fn is_better_than(&self, other: &ForeignClockDS) -> bool {
        compare_clocks(self, other) == Ordering::Less
    }
}

/// Total order over election candidates, `Less` meaning the better clock.
///
/// The precedence is fixed by the protocol: priority1, clock class, clock
/// accuracy, variance, priority2 and finally the clock identity as a
/// guaranteed tie breaker. Every field prefers the smaller value.
pub fn compare_clocks(a: &ForeignClockDS, b: &ForeignClockDS) -> Ordering {
    a.priority_1
        .cmp(&b.priority_1)
        .then_with(|| a.clock_quality.clock_class.cmp(&b.clock_quality.clock_class))
        .then_with(|| {
            a.clock_quality
                .clock_accuracy
                .to_primitive()
                .cmp(&b.clock_quality.clock_accuracy.to_primitive())
        })
        .then_with(|| {
            a.clock_quality
                .offset_scaled_log_variance
                .cmp(&b.clock_quality.offset_scaled_log_variance)
        })
        .then_with(|| a.priority_2.cmp(&b.priority_2))
        .then_with(|| a.identity.0.cmp(&b.identity.0))
}
