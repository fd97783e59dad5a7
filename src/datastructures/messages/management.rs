use getset::CopyGetters;

use crate::datastructures::{common::PortIdentity, WireFormat, WireFormatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ManagementMessage {
    pub(crate) target_port_identity: PortIdentity,
    pub(crate) starting_boundary_hops: u8,
    pub(crate) boundary_hops: u8,
    pub(crate) action: u8,
}

impl ManagementMessage {
    pub(crate) fn content_size(&self) -> usize {
        14
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 14 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.target_port_identity.serialize(&mut buffer[0..10])?;
        buffer[10] = self.starting_boundary_hops;
        buffer[11] = self.boundary_hops;
        buffer[12] = self.action & 0x0f;
        buffer[13] = 0;
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 14 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            target_port_identity: PortIdentity::deserialize(&buffer[0..10])?,
            starting_boundary_hops: buffer[10],
            boundary_hops: buffer[11],
            action: buffer[12] & 0x0f,
        })
    }
}
