//! Ethernet addresses as flow keys and masks.

use std::fmt;

/// A 48-bit Ethernet address, used both as a key and as a mask.
///
/// As a mask, [`MacAddress::ZERO`] wildcards the field and
/// [`MacAddress::BROADCAST`] matches it exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    /// Wire order, as carried in `TCA_FLOWER_KEY_ETH_*`.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn masked(&self, mask: &MacAddress) -> MacAddress {
        MacAddress(std::array::from_fn(|i| self.0[i] & mask.0[i]))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
