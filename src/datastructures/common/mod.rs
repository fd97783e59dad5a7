//! Common datastructures that are used throughout the protocol

mod clock_accuracy;
mod clock_identity;
mod clock_quality;
mod port_identity;
mod time_interval;
mod time_source;
mod tlv;
mod wire_timestamp;

pub use clock_accuracy::ClockAccuracy;
pub use clock_identity::ClockIdentity;
pub use clock_quality::ClockQuality;
pub use port_identity::PortIdentity;
pub use time_interval::TimeInterval;
pub use time_source::TimeSource;
pub use tlv::{Tlv, TlvSet, TlvType};
pub use wire_timestamp::WireTimestamp;
