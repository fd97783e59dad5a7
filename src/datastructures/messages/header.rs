use super::MessageType;
use crate::datastructures::{
    common::{PortIdentity, TimeInterval},
    WireFormat, WireFormatError,
};

/// The transport specific nibble marking a message as 802.1AS
pub(crate) const TRANSPORT_SPECIFIC_GPTP: u8 = 0x1;

/// The PTP major version implemented by this crate
pub(crate) const PTP_VERSION: u8 = 2;

/// The common header of all PTP messages, *IEEE 802.1AS-2021 table 10-7*
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub(crate) two_step_flag: bool,
    pub(crate) leap61: bool,
    pub(crate) leap59: bool,
    pub(crate) current_utc_offset_valid: bool,
    pub(crate) ptp_timescale: bool,
    pub(crate) time_traceable: bool,
    pub(crate) frequency_traceable: bool,
    pub(crate) domain_number: u8,
    pub(crate) correction_field: TimeInterval,
    pub(crate) source_port_identity: PortIdentity,
    pub(crate) sequence_id: u16,
    pub(crate) log_message_interval: i8,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            two_step_flag: false,
            leap61: false,
            leap59: false,
            current_utc_offset_valid: false,
            ptp_timescale: false,
            time_traceable: false,
            frequency_traceable: false,
            domain_number: 0,
            correction_field: TimeInterval::default(),
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            log_message_interval: 0x7f,
        }
    }
}

/// The raw fields of a parsed header that are not part of [`Header`] itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeserializedHeader {
    pub(crate) header: Header,
    pub(crate) message_type: MessageType,
    pub(crate) message_length: u16,
}

impl Header {
    pub(crate) fn wire_size(&self) -> usize {
        34
    }

    /// The control field value for a message type, a legacy field that is
    /// still prescribed by the wire format
    fn control_field(message_type: MessageType) -> u8 {
        match message_type {
            MessageType::Sync => 0x00,
            MessageType::DelayReq => 0x01,
            MessageType::FollowUp => 0x02,
            MessageType::DelayResp => 0x03,
            MessageType::Management => 0x04,
            _ => 0x05,
        }
    }

    pub(crate) fn serialize_header(
        &self,
        content_type: MessageType,
        content_length: usize,
        buffer: &mut [u8],
    ) -> Result<(), WireFormatError> {
        if buffer.len() < 34 {
            return Err(WireFormatError::BufferTooShort);
        }

        buffer[0] = (TRANSPORT_SPECIFIC_GPTP << 4) | (content_type as u8);
        // the upper nibble of byte 1 is reserved and must be zero
        buffer[1] = PTP_VERSION;
        buffer[2..4].copy_from_slice(&(34 + content_length as u16).to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = 0;
        buffer[6] = 0;
        buffer[6] |= (self.two_step_flag as u8) << 1;
        buffer[7] = 0;
        buffer[7] |= self.leap61 as u8;
        buffer[7] |= (self.leap59 as u8) << 1;
        buffer[7] |= (self.current_utc_offset_valid as u8) << 2;
        buffer[7] |= (self.ptp_timescale as u8) << 3;
        buffer[7] |= (self.time_traceable as u8) << 4;
        buffer[7] |= (self.frequency_traceable as u8) << 5;
        self.correction_field.serialize(&mut buffer[8..16])?;
        buffer[16..20].copy_from_slice(&[0, 0, 0, 0]);
        self.source_port_identity.serialize(&mut buffer[20..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[32] = Self::control_field(content_type);
        buffer[33] = self.log_message_interval as u8;

        Ok(())
    }

    pub(crate) fn deserialize_header(buffer: &[u8]) -> Result<DeserializedHeader, WireFormatError> {
        if buffer.len() < 34 {
            return Err(WireFormatError::BufferTooShort);
        }

        let message_type = MessageType::try_from(buffer[0] & 0x0f)
            .map_err(|_| WireFormatError::EnumConversionError)?;

        if buffer[1] & 0x0f != PTP_VERSION {
            return Err(WireFormatError::Invalid);
        }

        Ok(DeserializedHeader {
            header: Self {
                two_step_flag: (buffer[6] & (1 << 1)) > 0,
                leap61: (buffer[7] & (1 << 0)) > 0,
                leap59: (buffer[7] & (1 << 1)) > 0,
                current_utc_offset_valid: (buffer[7] & (1 << 2)) > 0,
                ptp_timescale: (buffer[7] & (1 << 3)) > 0,
                time_traceable: (buffer[7] & (1 << 4)) > 0,
                frequency_traceable: (buffer[7] & (1 << 5)) > 0,
                domain_number: buffer[4],
                correction_field: TimeInterval::deserialize(&buffer[8..16])?,
                source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
                sequence_id: u16::from_be_bytes(buffer[30..32].try_into().unwrap()),
                log_message_interval: buffer[33] as i8,
            },
            message_type,
            message_length: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
        })
    }
}
