use crate::datastructures::{common::PortIdentity, WireFormat, WireFormatError};

/// Signaling carries its payload as TLVs in the message suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SignalingMessage {
    pub(crate) target_port_identity: PortIdentity,
}

impl SignalingMessage {
    pub(crate) fn content_size(&self) -> usize {
        10
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.target_port_identity.serialize(&mut buffer[0..10])?;
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            target_port_identity: PortIdentity::deserialize(&buffer[0..10])?,
        })
    }
}
