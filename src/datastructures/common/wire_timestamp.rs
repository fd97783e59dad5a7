use crate::{
    datastructures::{WireFormat, WireFormatError},
    time::Time,
};

/// A timestamp as it appears on the wire: a 48 bit seconds field followed by
/// a 32 bit nanoseconds field.
///
/// For more details, see *IEEE1588-2019 section 5.3.3*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct WireTimestamp {
    /// The seconds field of the timestamp, at most 48 bits
    pub seconds: u64,
    /// The nanoseconds field of the timestamp.
    /// Must be less than 10^9
    pub nanos: u32,
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer[0..6].copy_from_slice(&self.seconds.to_be_bytes()[2..8]);
        buffer[6..10].copy_from_slice(&self.nanos.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }

        let mut seconds = [0; 8];
        seconds[2..8].copy_from_slice(&buffer[0..6]);

        Ok(Self {
            seconds: u64::from_be_bytes(seconds),
            nanos: u32::from_be_bytes(buffer[6..10].try_into().unwrap()),
        })
    }
}

impl From<Time> for WireTimestamp {
    fn from(instant: Time) -> Self {
        WireTimestamp {
            seconds: instant.secs(),
            nanos: instant.subsec_nanos(),
        }
    }
}

impl From<WireTimestamp> for Time {
    fn from(ts: WireTimestamp) -> Self {
        Time::from_secs_nanos(ts.seconds, ts.nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let representations = [
            (
                [0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x64u8],
                WireTimestamp {
                    seconds: 5,
                    nanos: 100,
                },
            ),
            (
                [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0x3b, 0x9a, 0xc9, 0xffu8],
                WireTimestamp {
                    seconds: 0x1234_5678_9abc,
                    nanos: 999_999_999,
                },
            ),
        ];

        for (byte_representation, object_representation) in representations {
            let mut serialization_buffer = [0; 10];
            object_representation
                .serialize(&mut serialization_buffer)
                .unwrap();
            assert_eq!(serialization_buffer, byte_representation);

            let deserialized_data = WireTimestamp::deserialize(&byte_representation).unwrap();
            assert_eq!(deserialized_data, object_representation);
        }
    }
}
