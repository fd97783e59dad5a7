//! General datastructures and their representation on the wire

pub mod common;
pub mod datasets;
pub mod messages;

/// An error that occured while parsing or writing the PTP wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum WireFormatError {
    #[cfg_attr(feature = "std", error("a field contained an invalid enum value"))]
    EnumConversionError,
    #[cfg_attr(feature = "std", error("the buffer is too short for the message"))]
    BufferTooShort,
    #[cfg_attr(feature = "std", error("a bounded container overflowed"))]
    CapacityError,
    #[cfg_attr(feature = "std", error("the message is invalid"))]
    Invalid,
}

#[cfg(not(feature = "std"))]
impl core::fmt::Display for WireFormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WireFormatError::EnumConversionError => {
                f.write_str("a field contained an invalid enum value")
            }
            WireFormatError::BufferTooShort => {
                f.write_str("the buffer is too short for the message")
            }
            WireFormatError::CapacityError => f.write_str("a bounded container overflowed"),
            WireFormatError::Invalid => f.write_str("the message is invalid"),
        }
    }
}

impl From<arrayvec::CapacityError> for WireFormatError {
    fn from(_: arrayvec::CapacityError) -> Self {
        WireFormatError::CapacityError
    }
}

/// Types that have a fixed-size representation in the PTP wire format.
///
/// `serialize` may assume the buffer is at least `wire_size` bytes long;
/// `deserialize` must check.
pub(crate) trait WireFormat: core::fmt::Debug + Clone + Eq {
    /// The byte size on the wire of this object
    fn wire_size(&self) -> usize;

    /// Serializes the object into the PTP wire format
    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError>;

    /// Deserializes the object from the PTP wire format
    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError>;
}
