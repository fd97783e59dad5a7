use super::Header;
use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, TimeSource, WireTimestamp},
    WireFormat, WireFormatError,
};

/// The body of an Announce message, along with a copy of its header.
///
/// The header is kept because the best master clock algorithm needs the
/// announcing port identity alongside the grandmaster fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AnnounceMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: WireTimestamp,
    pub(crate) current_utc_offset: i16,
    pub(crate) grandmaster_priority_1: u8,
    pub(crate) grandmaster_clock_quality: ClockQuality,
    pub(crate) grandmaster_priority_2: u8,
    pub(crate) grandmaster_identity: ClockIdentity,
    pub(crate) steps_removed: u16,
    pub(crate) time_source: TimeSource,
}

impl AnnounceMessage {
    pub(crate) fn content_size(&self) -> usize {
        30
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 30 {
            return Err(WireFormatError::BufferTooShort);
        }

        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..12].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[12] = 0;
        buffer[13] = self.grandmaster_priority_1;
        self.grandmaster_clock_quality
            .serialize(&mut buffer[14..18])?;
        buffer[18] = self.grandmaster_priority_2;
        self.grandmaster_identity.serialize(&mut buffer[19..27])?;
        buffer[27..29].copy_from_slice(&self.steps_removed.to_be_bytes());
        buffer[29] = self.time_source.to_primitive();

        Ok(())
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 30 {
            return Err(WireFormatError::BufferTooShort);
        }

        Ok(Self {
            header,
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            current_utc_offset: i16::from_be_bytes(buffer[10..12].try_into().unwrap()),
            grandmaster_priority_1: buffer[13],
            grandmaster_clock_quality: ClockQuality::deserialize(&buffer[14..18])?,
            grandmaster_priority_2: buffer[18],
            grandmaster_identity: ClockIdentity::deserialize(&buffer[19..27])?,
            steps_removed: u16::from_be_bytes(buffer[27..29].try_into().unwrap()),
            time_source: TimeSource::from_primitive(buffer[29]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockAccuracy;

    #[test]
    fn announce_wireformat() {
        let representation = [
            0x00, 0x00, 0x45, 0xb1, 0x11, 0x5a, 0x0a, 0x64, 0xfa, 0xb0, 0x00, 0x25, 0x00, 0x60,
            0x00, 0x80, 0xf8, 0x21, 0x5a, 0x00, 0x80, 0x30, 0x57, 0xe3, 0x91, 0xe7, 0xfe, 0x00,
            0x00, 0xa0,
        ];

        let body = AnnounceMessage {
            header: Header::default(),
            origin_timestamp: WireTimestamp {
                seconds: 1169232218,
                nanos: 174454448,
            },
            current_utc_offset: 37,
            grandmaster_priority_1: 96,
            grandmaster_clock_quality: ClockQuality {
                clock_class: 0,
                clock_accuracy: ClockAccuracy::Reserved(0x80),
                offset_scaled_log_variance: 0xf821,
            },
            grandmaster_priority_2: 90,
            grandmaster_identity: ClockIdentity([
                0x00, 0x80, 0x30, 0x57, 0xe3, 0x91, 0xe7, 0xfe,
            ]),
            steps_removed: 0,
            time_source: TimeSource::InternalOscillator,
        };

        let mut buffer = [0; 30];
        body.serialize_content(&mut buffer).unwrap();
        assert_eq!(buffer, representation);

        let decoded = AnnounceMessage::deserialize_content(Header::default(), &buffer).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn announce_too_short() {
        let buffer = [0; 29];
        assert!(AnnounceMessage::deserialize_content(Header::default(), &buffer).is_err());
    }
}
