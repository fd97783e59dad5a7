use core::ops::{Deref, DerefMut};

use az::Cast;
use fixed::types::I48F16;

use crate::{
    datastructures::{WireFormat, WireFormatError},
    time::Duration,
};

/// Represents time intervals in nanoseconds with a 16 bit fractional part,
/// the format of the correction field on the wire.
///
/// For more details, see *IEEE1588-2019 section 7.7.2.1*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInterval(pub I48F16);

impl Deref for TimeInterval {
    type Target = I48F16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for TimeInterval {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl WireFormat for TimeInterval {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer[0..8].copy_from_slice(&self.0.to_bits().to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 8 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self(I48F16::from_bits(i64::from_be_bytes(
            buffer[0..8].try_into().unwrap(),
        ))))
    }
}

impl From<Duration> for TimeInterval {
    fn from(duration: Duration) -> Self {
        TimeInterval(I48F16::saturating_from_num(duration.nanos()))
    }
}

impl TimeInterval {
    /// The number of whole nanoseconds in this interval
    pub fn to_nanos(self) -> f64 {
        self.0.cast()
    }

    /// The nearest [`Duration`], discarding the subnanosecond part
    pub fn as_duration(self) -> Duration {
        Duration::from_nanos(self.0.to_num())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let representations = [
            (
                [0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x80, 0x00u8],
                TimeInterval(I48F16::from_num(2.5f64)),
            ),
            (
                [0xff, 0xff, 0xff, 0xff, 0xff, 0xfd, 0x80, 0x00u8],
                TimeInterval(I48F16::from_num(-2.5f64)),
            ),
        ];

        for (byte_representation, object_representation) in representations {
            let mut serialization_buffer = [0; 8];
            object_representation
                .serialize(&mut serialization_buffer)
                .unwrap();
            assert_eq!(serialization_buffer, byte_representation);

            let deserialized_data = TimeInterval::deserialize(&byte_representation).unwrap();
            assert_eq!(deserialized_data, object_representation);
        }
    }

    #[test]
    fn duration_conversion() {
        let interval = TimeInterval::from(Duration::from_micros(3));
        assert_eq!(interval.as_duration(), Duration::from_nanos(3_000));
    }
}
