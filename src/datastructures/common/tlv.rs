use crate::datastructures::WireFormatError;

/// Type of a TLV suffix, see *IEEE1588-2019 table 52*.
///
/// Only the types relevant to 802.1AS are named; everything else maps onto
/// [`Reserved`](`Self::Reserved`) or [`Experimental`](`Self::Experimental`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    Reserved(u16),
    Management,
    ManagementErrorStatus,
    OrganizationExtension,
    PathTrace,
    AlternateTimeOffsetIndicator,
    Experimental(u16),
}

impl TlvType {
    pub fn to_primitive(self) -> u16 {
        match self {
            Self::Reserved(v) => v,
            Self::Management => 0x0001,
            Self::ManagementErrorStatus => 0x0002,
            Self::OrganizationExtension => 0x0003,
            Self::PathTrace => 0x0008,
            Self::AlternateTimeOffsetIndicator => 0x0009,
            Self::Experimental(v) => v,
        }
    }

    pub fn from_primitive(value: u16) -> Self {
        match value {
            0x0001 => Self::Management,
            0x0002 => Self::ManagementErrorStatus,
            0x0003 => Self::OrganizationExtension,
            0x0008 => Self::PathTrace,
            0x0009 => Self::AlternateTimeOffsetIndicator,
            0x2004..=0x202f | 0x7f00..=0x7fff => Self::Experimental(value),
            v => Self::Reserved(v),
        }
    }
}

/// A single type-length-value extension of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tlv_type: TlvType,
    pub value: &'a [u8],
}

impl Tlv<'_> {
    pub(crate) fn wire_size(&self) -> usize {
        4 + self.value.len()
    }
}

/// The suffix of a message: zero or more TLVs, stored unparsed.
///
/// Construction through [`deserialize`](`Self::deserialize`) checks that the
/// type/length structure is consistent, so iteration never runs out of
/// bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlvSet<'a> {
    bytes: &'a [u8],
}

impl<'a> TlvSet<'a> {
    pub(crate) fn wire_size(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        if buffer.len() < self.bytes.len() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[..self.bytes.len()].copy_from_slice(self.bytes);
        Ok(self.bytes.len())
    }

    pub(crate) fn deserialize(mut buffer: &'a [u8]) -> Result<Self, WireFormatError> {
        let original = buffer;

        while !buffer.is_empty() {
            if buffer.len() < 4 {
                return Err(WireFormatError::BufferTooShort);
            }

            let length = u16::from_be_bytes(buffer[2..4].try_into().unwrap()) as usize;
            buffer = buffer
                .get(4 + length..)
                .ok_or(WireFormatError::BufferTooShort)?;
        }

        Ok(Self { bytes: original })
    }

    /// Iterate over the TLVs in this set
    pub fn tlv(&self) -> impl Iterator<Item = Tlv<'a>> + 'a {
        let mut buffer = self.bytes;

        core::iter::from_fn(move || {
            if buffer.len() < 4 {
                return None;
            }

            let tlv_type = TlvType::from_primitive(u16::from_be_bytes(
                buffer[0..2].try_into().unwrap(),
            ));
            let length = u16::from_be_bytes(buffer[2..4].try_into().unwrap()) as usize;

            // deserialize checked the structure up front
            let value = &buffer[4..4 + length];
            buffer = &buffer[4 + length..];

            Some(Tlv { tlv_type, value })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_tlvs() {
        let bytes = [
            0x00, 0x08, 0x00, 0x08, 1, 2, 3, 4, 5, 6, 7, 8, // path trace
            0x00, 0x01, 0x00, 0x02, 0xaa, 0xbb, // management
        ];

        let set = TlvSet::deserialize(&bytes).unwrap();
        let mut iter = set.tlv();

        let first = iter.next().unwrap();
        assert_eq!(first.tlv_type, TlvType::PathTrace);
        assert_eq!(first.value, &[1, 2, 3, 4, 5, 6, 7, 8]);

        let second = iter.next().unwrap();
        assert_eq!(second.tlv_type, TlvType::Management);
        assert_eq!(second.value, &[0xaa, 0xbb]);

        assert!(iter.next().is_none());
    }

    #[test]
    fn rejects_truncated_tlv() {
        let bytes = [0x00, 0x08, 0x00, 0x08, 1, 2];
        assert_eq!(
            TlvSet::deserialize(&bytes),
            Err(WireFormatError::BufferTooShort)
        );
    }

    #[test]
    fn empty_set() {
        let set = TlvSet::deserialize(&[]).unwrap();
        assert_eq!(set.wire_size(), 0);
        assert!(set.tlv().next().is_none());
    }
}
