use crate::datastructures::{WireFormat, WireFormatError};

/// The identity of a PTP node.
///
/// All ptp clocks in a network need a unique clock identity. A common approach
/// is to use a mac address of the device to generate a unique identifier (see
/// [`from_mac_address`](`Self::from_mac_address`)).
///
/// The all-zero and all-one values are reserved by the protocol and are not
/// valid identities of a real clock.
///
/// For more details, see *IEEE1588-2019 section 7.5.2.2.2*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// Create a [`ClockIdentity`] from a mac address.
    ///
    /// Fills the first six bytes with the mac address and the rest with zeroes.
    ///
    /// # Example
    /// ```
    /// # use gptp::config::ClockIdentity;
    /// let id = ClockIdentity::from_mac_address([0xA, 0xB, 0xC, 0xD, 0xE, 0xF]);
    /// assert_eq!(id.0, [0xA, 0xB, 0xC, 0xD, 0xE, 0xF, 0x0, 0x0]);
    /// ```
    pub fn from_mac_address(addr: [u8; 6]) -> Self {
        let mut this = Self([0; 8]);

        this.0[0..6].copy_from_slice(&addr);

        this
    }

    /// Whether this is a usable clock identity.
    ///
    /// The all-zero and all-one identities are reserved.
    pub fn is_valid(&self) -> bool {
        self.0 != [0; 8] && self.0 != [0xff; 8]
    }
}

impl WireFormat for ClockIdentity {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer[0..8].copy_from_slice(&self.0);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 8 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self(buffer[0..8].try_into().unwrap()))
    }
}

impl core::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, val) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ":")?;
            }

            write!(f, "{:02x}", val)?;
        }

        Ok(())
    }
}
