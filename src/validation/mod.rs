//! Stateless checking of raw message buffers against the 802.1AS wire rules.
//!
//! Validation happens before any message reaches a state machine. It never
//! panics and never mutates its input; malformed buffers produce a report
//! listing every rule the buffer breaks.

use arrayvec::ArrayVec;

use crate::datastructures::messages::{MessageType, PTP_VERSION, TRANSPORT_SPECIFIC_GPTP};

/// Upper bound on reported violations per message
pub const MAX_VIOLATIONS: usize = 16;

const MAX_ALLOWED_DOMAINS: usize = 8;

/// The correction field may not exceed one second, in 2^-16 ns units
const MAX_CORRECTION: i64 = 1_000_000_000 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Buffer is shorter than the 34 byte common header
    BufferTooShort,
    /// Buffer is shorter than the minimum for its message type
    MessageTooShort,
    /// The transportSpecific nibble is not the 802.1AS marker
    WrongTransportSpecific,
    /// The versionPTP nibble is not 2
    WrongVersion,
    /// The message type nibble is not assigned
    UnknownMessageType,
    /// The messageLength field disagrees with the buffer length
    LengthFieldMismatch,
    /// The domain number is not in the allowed set
    DisallowedDomain,
    /// A reserved field contains a non-zero bit
    ReservedFieldNotZero,
    /// Announce without the PTP-timescale flag
    MissingPtpTimescale,
    /// Sync or Follow_Up asserting a leap second flag
    UnexpectedLeapFlags,
    /// |correctionField| exceeds one second
    CorrectionOutOfRange,
    /// Source clock identity is all-zero
    InvalidSourceClockIdentity,
    /// Source port number is zero
    InvalidSourcePortNumber,
    /// A timestamp nanoseconds field is not below 10^9
    InvalidTimestampNanos,
}

/// The outcome of validating one raw buffer.
///
/// The violation list preserves check order, so the first entry is the
/// earliest rule the buffer breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    violations: ArrayVec<Violation, MAX_VIOLATIONS>,
    message_type: Option<MessageType>,
    declared_length: Option<u16>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// The message type from the header, if the type nibble was assigned
    pub fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    /// The length the header claims, if the header was readable
    pub fn declared_length(&self) -> Option<u16> {
        self.declared_length
    }

    fn flag(&mut self, violation: Violation) {
        // the report is best effort once full
        let _ = self.violations.try_push(violation);
    }
}

#[derive(Debug, Clone)]
pub struct MessageValidator {
    allowed_domains: ArrayVec<u8, MAX_ALLOWED_DOMAINS>,
}

impl Default for MessageValidator {
    fn default() -> Self {
        let mut allowed_domains = ArrayVec::new();
        allowed_domains.push(0);
        Self { allowed_domains }
    }
}

impl MessageValidator {
    /// A validator accepting the given domain numbers. At most
    /// [`MAX_ALLOWED_DOMAINS`] entries are kept.
    pub fn new(domains: &[u8]) -> Self {
        Self {
            allowed_domains: domains
                .iter()
                .copied()
                .take(MAX_ALLOWED_DOMAINS)
                .collect(),
        }
    }

    /// The minimum wire length for a message type. Fixed-size types have an
    /// exact length, Signaling and Management grow with their TLVs.
    fn minimum_length(message_type: MessageType) -> u16 {
        use MessageType::*;
        match message_type {
            Sync | FollowUp | DelayReq | DelayResp | Signaling => 44,
            PDelayReq | PDelayResp | PDelayRespFollowUp => 54,
            Announce => 64,
            Management => 48,
        }
    }

    /// Whether the body starts with a wire timestamp whose nanoseconds field
    /// can be range checked.
    fn has_leading_timestamp(message_type: MessageType) -> bool {
        use MessageType::*;
        !matches!(message_type, Signaling | Management)
    }

    pub fn validate(&self, buffer: &[u8]) -> ValidationReport {
        let mut report = ValidationReport {
            violations: ArrayVec::new(),
            message_type: None,
            declared_length: None,
        };

        // Nothing beyond the length check may touch a short buffer
        if buffer.len() < 34 {
            report.flag(Violation::BufferTooShort);
            return report;
        }

        if buffer[0] >> 4 != TRANSPORT_SPECIFIC_GPTP {
            report.flag(Violation::WrongTransportSpecific);
        }
        if buffer[1] & 0x0f != PTP_VERSION {
            report.flag(Violation::WrongVersion);
        }

        let declared_length = u16::from_be_bytes([buffer[2], buffer[3]]);
        report.declared_length = Some(declared_length);
        if usize::from(declared_length) != buffer.len() {
            report.flag(Violation::LengthFieldMismatch);
        }

        if !self.allowed_domains.contains(&buffer[4]) {
            report.flag(Violation::DisallowedDomain);
        }

        // reserved1, reserved2 and the 32 bit reserved3 field
        if buffer[1] & 0xf0 != 0 || buffer[5] != 0 || buffer[16..20] != [0, 0, 0, 0] {
            report.flag(Violation::ReservedFieldNotZero);
        }

        let correction = i64::from_be_bytes(buffer[8..16].try_into().unwrap());
        if correction.saturating_abs() > MAX_CORRECTION {
            report.flag(Violation::CorrectionOutOfRange);
        }

        if buffer[20..28] == [0; 8] {
            report.flag(Violation::InvalidSourceClockIdentity);
        }
        if buffer[28..30] == [0, 0] {
            report.flag(Violation::InvalidSourcePortNumber);
        }

        let Ok(message_type) = MessageType::try_from(buffer[0] & 0x0f) else {
            report.flag(Violation::UnknownMessageType);
            log::trace!("message rejected: {:?}", report.violations());
            return report;
        };
        report.message_type = Some(message_type);

        if buffer.len() < usize::from(Self::minimum_length(message_type)) {
            report.flag(Violation::MessageTooShort);
            log::trace!("message rejected: {:?}", report.violations());
            return report;
        }

        let flags = buffer[7];
        match message_type {
            MessageType::Announce => {
                if flags & 0x08 == 0 {
                    report.flag(Violation::MissingPtpTimescale);
                }
            }
            MessageType::Sync | MessageType::FollowUp => {
                if flags & 0x03 != 0 {
                    report.flag(Violation::UnexpectedLeapFlags);
                }
            }
            _ => {}
        }

        if Self::has_leading_timestamp(message_type) {
            let nanos = u32::from_be_bytes(buffer[40..44].try_into().unwrap());
            if nanos >= 1_000_000_000 {
                report.flag(Violation::InvalidTimestampNanos);
            }
        }

        if !report.is_valid() {
            log::trace!("message rejected: {:?}", report.violations());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::InstanceConfig,
        datastructures::{
            common::{ClockIdentity, PortIdentity, TlvSet},
            datasets::{CurrentDS, DefaultDS, ParentDS},
            messages::{Message, MAX_DATA_LEN},
        },
        time::Time,
    };

    fn serialized_sync() -> ([u8; MAX_DATA_LEN], usize) {
        let default_ds = DefaultDS::new(InstanceConfig {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            clock_quality: Default::default(),
            priority_1: 248,
            priority_2: 248,
            domain_number: 0,
            slave_only: false,
        });
        let port_identity = PortIdentity {
            clock_identity: default_ds.clock_identity,
            port_number: 1,
        };

        let mut buffer = [0; MAX_DATA_LEN];
        let len = Message::sync(&default_ds, port_identity, 1, 0)
            .serialize(&mut buffer)
            .unwrap();
        (buffer, len)
    }

    #[test]
    fn builder_output_is_clean() {
        let validator = MessageValidator::default();
        let (buffer, len) = serialized_sync();

        let report = validator.validate(&buffer[..len]);
        assert!(report.is_valid(), "{:?}", report.violations());
        assert_eq!(report.message_type(), Some(MessageType::Sync));
        assert_eq!(report.declared_length(), Some(44));

        let default_ds = DefaultDS::new(InstanceConfig {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            clock_quality: Default::default(),
            priority_1: 248,
            priority_2: 248,
            domain_number: 0,
            slave_only: false,
        });
        let parent_ds = ParentDS::new(&default_ds);
        let port_identity = PortIdentity {
            clock_identity: default_ds.clock_identity,
            port_number: 1,
        };
        let announce = Message::announce(
            &default_ds,
            &parent_ds,
            &CurrentDS::default(),
            port_identity,
            3,
            0,
        );
        let mut buffer = [0; MAX_DATA_LEN];
        let len = announce.serialize(&mut buffer).unwrap();
        let report = validator.validate(&buffer[..len]);
        assert!(report.is_valid(), "{:?}", report.violations());

        let request = Message::pdelay_req(&default_ds, port_identity, 7);
        let others = [
            Message::follow_up(&default_ds, port_identity, 1, 0, Time::from_secs_nanos(1, 0)),
            request.clone(),
            Message::pdelay_resp(
                *request.header(),
                port_identity,
                Time::from_secs_nanos(1, 100),
            ),
            Message::pdelay_resp_follow_up(
                *request.header(),
                port_identity,
                Time::from_secs_nanos(1, 200),
            ),
            Message::signaling(&default_ds, port_identity, 9, port_identity, TlvSet::default()),
            Message::management(&default_ds, port_identity, 10, port_identity, 1, 0x2),
        ];
        for message in others {
            let len = message.serialize(&mut buffer).unwrap();
            let report = validator.validate(&buffer[..len]);
            assert!(report.is_valid(), "{:?}", report.violations());
        }
    }

    #[test]
    fn short_buffer_reports_only_length() {
        let validator = MessageValidator::default();
        for len in 0..34 {
            let buffer = [0u8; 34];
            let report = validator.validate(&buffer[..len]);
            assert_eq!(report.violations(), &[Violation::BufferTooShort]);
            assert_eq!(report.message_type(), None);
        }
    }

    #[test]
    fn reserved_bit_is_flagged() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        // a single bit in reserved3
        buffer[17] = 0x04;
        let report = validator.validate(&buffer[..len]);
        assert!(report
            .violations()
            .contains(&Violation::ReservedFieldNotZero));
    }

    #[test]
    fn wrong_marker_nibbles() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        buffer[0] &= 0x0f; // clear transportSpecific
        buffer[1] = (buffer[1] & 0xf0) | 0x1; // versionPTP 1
        let report = validator.validate(&buffer[..len]);
        assert!(report
            .violations()
            .contains(&Violation::WrongTransportSpecific));
        assert!(report.violations().contains(&Violation::WrongVersion));
    }

    #[test]
    fn length_field_mismatch() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        buffer[3] = 60;
        let report = validator.validate(&buffer[..len]);
        assert!(report.violations().contains(&Violation::LengthFieldMismatch));
    }

    #[test]
    fn domain_must_be_allowed() {
        let (mut buffer, len) = serialized_sync();
        buffer[4] = 5;

        let report = MessageValidator::default().validate(&buffer[..len]);
        assert!(report.violations().contains(&Violation::DisallowedDomain));

        let report = MessageValidator::new(&[0, 5]).validate(&buffer[..len]);
        assert!(report.is_valid(), "{:?}", report.violations());
    }

    #[test]
    fn leap_flags_rejected_on_sync() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        buffer[7] |= 0x01; // leap61
        let report = validator.validate(&buffer[..len]);
        assert!(report.violations().contains(&Violation::UnexpectedLeapFlags));
    }

    #[test]
    fn announce_requires_ptp_timescale() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        // turn the sync into a truncated announce claim
        buffer[0] = (buffer[0] & 0xf0) | 0xb;
        let report = validator.validate(&buffer[..len]);
        assert!(report.violations().contains(&Violation::MessageTooShort));

        // a full length announce without the timescale flag
        let mut announce = [0u8; 64];
        announce[..len].copy_from_slice(&buffer[..len]);
        announce[0] = (announce[0] & 0xf0) | 0xb;
        announce[2..4].copy_from_slice(&64u16.to_be_bytes());
        let report = validator.validate(&announce);
        assert!(report.violations().contains(&Violation::MissingPtpTimescale));
    }

    #[test]
    fn correction_bound() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        let excessive: i64 = (1_000_000_000 << 16) + 1;
        buffer[8..16].copy_from_slice(&excessive.to_be_bytes());
        let report = validator.validate(&buffer[..len]);
        assert!(report
            .violations()
            .contains(&Violation::CorrectionOutOfRange));
    }

    #[test]
    fn null_source_identity() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        buffer[20..28].fill(0);
        buffer[28..30].fill(0);
        let report = validator.validate(&buffer[..len]);
        assert!(report
            .violations()
            .contains(&Violation::InvalidSourceClockIdentity));
        assert!(report
            .violations()
            .contains(&Violation::InvalidSourcePortNumber));
    }

    #[test]
    fn timestamp_nanos_range() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        buffer[40..44].copy_from_slice(&1_000_000_000u32.to_be_bytes());
        let report = validator.validate(&buffer[..len]);
        assert_eq!(report.violations(), &[Violation::InvalidTimestampNanos]);
    }

    #[test]
    fn unknown_type_skips_body_checks() {
        let validator = MessageValidator::default();
        let (mut buffer, len) = serialized_sync();

        buffer[0] = (buffer[0] & 0xf0) | 0x4;
        buffer[40..44].copy_from_slice(&2_000_000_000u32.to_be_bytes());
        let report = validator.validate(&buffer[..len]);
        assert_eq!(report.violations(), &[Violation::UnknownMessageType]);
    }
}
