//! gPTP network messages

pub(crate) use announce::*;
pub(crate) use follow_up::*;
pub use header::*;
pub(crate) use management::ManagementMessage;
pub(crate) use p_delay_req::*;
pub(crate) use p_delay_resp::*;
pub(crate) use p_delay_resp_follow_up::*;
pub(crate) use signaling::SignalingMessage;
pub(crate) use sync::*;

use super::{
    common::{PortIdentity, TlvSet},
    datasets::{CurrentDS, DefaultDS, ParentDS},
    WireFormatError,
};
use crate::time::Time;

mod announce;
mod follow_up;
mod header;
mod management;
mod p_delay_req;
mod p_delay_resp;
mod p_delay_resp_follow_up;
mod signaling;
mod sync;

/// Maximum length of a packet
///
/// This can be used to preallocate buffers that can always fit packets
/// produced or accepted by this crate.
pub const MAX_DATA_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xa,
    Announce = 0xb,
    Signaling = 0xc,
    Management = 0xd,
}

pub struct EnumConversionError;

impl TryFrom<u8> for MessageType {
    type Error = EnumConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;

        match value {
            0x0 => Ok(Sync),
            0x1 => Ok(DelayReq),
            0x2 => Ok(PDelayReq),
            0x3 => Ok(PDelayResp),
            0x8 => Ok(FollowUp),
            0x9 => Ok(DelayResp),
            0xa => Ok(PDelayRespFollowUp),
            0xb => Ok(Announce),
            0xc => Ok(Signaling),
            0xd => Ok(Management),
            _ => Err(EnumConversionError),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message<'a> {
    pub(crate) header: Header,
    pub(crate) body: MessageBody,
    pub(crate) suffix: TlvSet<'a>,
}

impl<'a> Message<'a> {
    /// Whether the message is timestamped at the hardware on rx/tx
    pub(crate) fn is_event(&self) -> bool {
        use MessageBody::*;
        match self.body {
            Sync(_) | PDelayReq(_) | PDelayResp(_) => true,
            FollowUp(_) | PDelayRespFollowUp(_) | Announce(_) | Signaling(_) | Management(_) => {
                false
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MessageBody {
    Sync(SyncMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    FollowUp(FollowUpMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
    Signaling(SignalingMessage),
    Management(ManagementMessage),
}

impl MessageBody {
    fn wire_size(&self) -> usize {
        match &self {
            MessageBody::Sync(m) => m.content_size(),
            MessageBody::PDelayReq(m) => m.content_size(),
            MessageBody::PDelayResp(m) => m.content_size(),
            MessageBody::FollowUp(m) => m.content_size(),
            MessageBody::PDelayRespFollowUp(m) => m.content_size(),
            MessageBody::Announce(m) => m.content_size(),
            MessageBody::Signaling(m) => m.content_size(),
            MessageBody::Management(m) => m.content_size(),
        }
    }

    fn content_type(&self) -> MessageType {
        match self {
            MessageBody::Sync(_) => MessageType::Sync,
            MessageBody::PDelayReq(_) => MessageType::PDelayReq,
            MessageBody::PDelayResp(_) => MessageType::PDelayResp,
            MessageBody::FollowUp(_) => MessageType::FollowUp,
            MessageBody::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            MessageBody::Announce(_) => MessageType::Announce,
            MessageBody::Signaling(_) => MessageType::Signaling,
            MessageBody::Management(_) => MessageType::Management,
        }
    }

    pub(crate) fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        match &self {
            MessageBody::Sync(m) => m.serialize_content(buffer)?,
            MessageBody::PDelayReq(m) => m.serialize_content(buffer)?,
            MessageBody::PDelayResp(m) => m.serialize_content(buffer)?,
            MessageBody::FollowUp(m) => m.serialize_content(buffer)?,
            MessageBody::PDelayRespFollowUp(m) => m.serialize_content(buffer)?,
            MessageBody::Announce(m) => m.serialize_content(buffer)?,
            MessageBody::Signaling(m) => m.serialize_content(buffer)?,
            MessageBody::Management(m) => m.serialize_content(buffer)?,
        }

        Ok(self.wire_size())
    }

    pub(crate) fn deserialize(
        message_type: MessageType,
        header: &Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        let body = match message_type {
            MessageType::Sync => MessageBody::Sync(SyncMessage::deserialize_content(buffer)?),
            MessageType::PDelayReq => {
                MessageBody::PDelayReq(PDelayReqMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayResp => {
                MessageBody::PDelayResp(PDelayRespMessage::deserialize_content(buffer)?)
            }
            MessageType::FollowUp => {
                MessageBody::FollowUp(FollowUpMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayRespFollowUp => MessageBody::PDelayRespFollowUp(
                PDelayRespFollowUpMessage::deserialize_content(buffer)?,
            ),
            MessageType::Announce => {
                MessageBody::Announce(AnnounceMessage::deserialize_content(*header, buffer)?)
            }
            MessageType::Signaling => {
                MessageBody::Signaling(SignalingMessage::deserialize_content(buffer)?)
            }
            MessageType::Management => {
                MessageBody::Management(ManagementMessage::deserialize_content(buffer)?)
            }
            // the end-to-end delay mechanism is not part of this profile
            MessageType::DelayReq | MessageType::DelayResp => {
                return Err(WireFormatError::Invalid)
            }
        };

        Ok(body)
    }
}

fn base_header(default_ds: &DefaultDS, port_identity: PortIdentity, sequence_id: u16) -> Header {
    Header {
        domain_number: default_ds.domain_number,
        source_port_identity: port_identity,
        sequence_id,
        ..Default::default()
    }
}

impl Message<'_> {
    pub(crate) fn sync(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
        log_sync_interval: i8,
    ) -> Self {
        let header = Header {
            two_step_flag: true,
            log_message_interval: log_sync_interval,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::Sync(SyncMessage {
                origin_timestamp: Default::default(),
            }),
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn follow_up(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
        log_sync_interval: i8,
        timestamp: Time,
    ) -> Self {
        let header = Header {
            log_message_interval: log_sync_interval,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::FollowUp(FollowUpMessage {
                precise_origin_timestamp: timestamp.into(),
            }),
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn announce(
        default_ds: &DefaultDS,
        parent_ds: &ParentDS,
        current_ds: &CurrentDS,
        port_identity: PortIdentity,
        sequence_id: u16,
        log_announce_interval: i8,
    ) -> Self {
        let header = Header {
            ptp_timescale: true,
            log_message_interval: log_announce_interval,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        let body = MessageBody::Announce(AnnounceMessage {
            header,
            origin_timestamp: Default::default(),
            current_utc_offset: 0,
            grandmaster_priority_1: parent_ds.grandmaster_priority_1,
            grandmaster_clock_quality: parent_ds.grandmaster_clock_quality,
            grandmaster_priority_2: parent_ds.grandmaster_priority_2,
            grandmaster_identity: parent_ds.grandmaster_identity,
            steps_removed: current_ds.steps_removed,
            time_source: parent_ds.time_source,
        });

        Message {
            header,
            body,
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn pdelay_req(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
    ) -> Self {
        Message {
            header: base_header(default_ds, port_identity, sequence_id),
            body: MessageBody::PDelayReq(PDelayReqMessage {
                origin_timestamp: Default::default(),
            }),
            suffix: TlvSet::default(),
        }
    }

    /// A response to `request_header`, carrying the request receipt time t2
    pub(crate) fn pdelay_resp(
        request_header: Header,
        port_identity: PortIdentity,
        timestamp: Time,
    ) -> Self {
        let header = Header {
            two_step_flag: true,
            source_port_identity: port_identity,
            log_message_interval: 0x7f,
            ..request_header
        };

        Message {
            header,
            body: MessageBody::PDelayResp(PDelayRespMessage {
                request_receipt_timestamp: timestamp.into(),
                requesting_port_identity: request_header.source_port_identity,
            }),
            suffix: TlvSet::default(),
        }
    }

    /// The follow up to a response, carrying the response departure time t3
    pub(crate) fn pdelay_resp_follow_up(
        request_header: Header,
        port_identity: PortIdentity,
        timestamp: Time,
    ) -> Self {
        let header = Header {
            two_step_flag: false,
            source_port_identity: port_identity,
            log_message_interval: 0x7f,
            ..request_header
        };

        Message {
            header,
            body: MessageBody::PDelayRespFollowUp(PDelayRespFollowUpMessage {
                response_origin_timestamp: timestamp.into(),
                requesting_port_identity: request_header.source_port_identity,
            }),
            suffix: TlvSet::default(),
        }
    }

    /// A Signaling message addressed to `target_port_identity`, its payload
    /// carried as TLVs in `suffix`
    pub(crate) fn signaling<'a>(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
        target_port_identity: PortIdentity,
        suffix: TlvSet<'a>,
    ) -> Message<'a> {
        Message {
            header: base_header(default_ds, port_identity, sequence_id),
            body: MessageBody::Signaling(SignalingMessage {
                target_port_identity,
            }),
            suffix,
        }
    }

    pub(crate) fn management(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
        target_port_identity: PortIdentity,
        boundary_hops: u8,
        action: u8,
    ) -> Self {
        Message {
            header: base_header(default_ds, port_identity, sequence_id),
            body: MessageBody::Management(ManagementMessage {
                target_port_identity,
                starting_boundary_hops: boundary_hops,
                boundary_hops,
                action,
            }),
            suffix: TlvSet::default(),
        }
    }
}

impl<'a> Message<'a> {
    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    /// The byte size on the wire of this message
    pub(crate) fn wire_size(&self) -> usize {
        self.header.wire_size() + self.body.wire_size() + self.suffix.wire_size()
    }

    /// Serializes the object into the PTP wire format.
    ///
    /// Returns the used buffer size that contains the message or an error.
    pub(crate) fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }

        let (header, rest) = buffer.split_at_mut(34);
        let (body, tlv) = rest.split_at_mut(self.body.wire_size());

        self.header.serialize_header(
            self.body.content_type(),
            self.body.wire_size() + self.suffix.wire_size(),
            header,
        )?;
        self.body.serialize(body)?;
        self.suffix.serialize(tlv)?;

        Ok(self.wire_size())
    }

    /// Deserializes a message from the PTP wire format.
    ///
    /// Returns the message or an error.
    pub(crate) fn deserialize(buffer: &'a [u8]) -> Result<Self, WireFormatError> {
        let header_data = Header::deserialize_header(buffer)?;

        if header_data.message_length < 34 {
            return Err(WireFormatError::Invalid);
        }

        // Ensure we have the entire message and ignore potential padding
        // Skip the header bytes and only keep the content
        let content_buffer = buffer
            .get(34..(header_data.message_length as usize))
            .ok_or(WireFormatError::BufferTooShort)?;

        let body = MessageBody::deserialize(
            header_data.message_type,
            &header_data.header,
            content_buffer,
        )?;

        let tlv_buffer = content_buffer
            .get(body.wire_size()..)
            .ok_or(WireFormatError::BufferTooShort)?;
        let suffix = TlvSet::deserialize(tlv_buffer)?;

        Ok(Message {
            header: header_data.header,
            body,
            suffix,
        })
    }
}
