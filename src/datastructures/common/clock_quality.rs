use super::ClockAccuracy;
use crate::datastructures::{WireFormat, WireFormatError};

/// A description of the accuracy and stability of a clock.
///
/// The defaults are the gPTP defaults for a clock that is not synchronized to
/// a primary reference: class 248, unknown accuracy and the variance given in
/// *IEEE 802.1AS-2021 section 8.6.2*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockQuality {
    /// The class of the clock, lower values are generally better. 255 means
    /// the clock can only ever be a slave.
    pub clock_class: u8,
    /// The accuracy of the clock
    pub clock_accuracy: ClockAccuracy,
    /// 2-log of the variance (in seconds^2) of the clock when not
    /// synchronized
    pub offset_scaled_log_variance: u16,
}

impl Default for ClockQuality {
    fn default() -> Self {
        Self {
            clock_class: 248,
            clock_accuracy: ClockAccuracy::Unknown,
            offset_scaled_log_variance: 0x4e5d,
        }
    }
}

impl WireFormat for ClockQuality {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer[0] = self.clock_class;
        buffer[1] = self.clock_accuracy.to_primitive();
        buffer[2..4].copy_from_slice(&self.offset_scaled_log_variance.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            clock_class: buffer[0],
            clock_accuracy: ClockAccuracy::from_primitive(buffer[1]),
            offset_scaled_log_variance: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let representations = [(
            [248u8, 0xfe, 0x4e, 0x5d],
            ClockQuality {
                clock_class: 248,
                clock_accuracy: ClockAccuracy::Unknown,
                offset_scaled_log_variance: 0x4e5d,
            },
        )];

        for (byte_representation, object_representation) in representations {
            let mut serialization_buffer = [0; 4];
            object_representation
                .serialize(&mut serialization_buffer)
                .unwrap();
            assert_eq!(serialization_buffer, byte_representation);

            let deserialized_data = ClockQuality::deserialize(&byte_representation).unwrap();
            assert_eq!(deserialized_data, object_representation);
        }
    }
}
