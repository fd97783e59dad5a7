use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// The body of a Pdelay_Req: an origin timestamp (sent as zero in gPTP)
/// followed by ten reserved bytes that pad the message to the size of the
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayReqMessage {
    pub(crate) origin_timestamp: WireTimestamp,
}

impl PDelayReqMessage {
    pub(crate) fn content_size(&self) -> usize {
        20
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..20].fill(0);
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
        })
    }
}
