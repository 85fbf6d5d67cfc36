//! Unique flow identifiers.

use crate::ParseError;
use std::fmt;
use std::str::FromStr;

/// Opaque 128-bit caller-assigned flow identity, stable across updates.
///
/// The cookie form embedded in classifier entries is the 16 big-endian
/// bytes of the value.
///
/// ```
/// use flow_types::Ufid;
///
/// let ufid: Ufid = "ufid:0a0b0c0d-0000-0000-0000-000000000001".parse().unwrap();
/// assert_eq!(Ufid::from_bytes(&ufid.to_bytes()), Some(ufid));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Ufid(u128);

impl Ufid {
    /// Length of the cookie form.
    pub const LEN: usize = 16;

    pub const fn new(value: u128) -> Self {
        Ufid(value)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    pub const fn to_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    /// Rebuilds a UFID from its cookie form. Any length other than 16 is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 16] = bytes.try_into().ok()?;
        Some(Ufid(u128::from_be_bytes(raw)))
    }
}

impl fmt::Display for Ufid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

impl FromStr for Ufid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("ufid:").unwrap_or(s);
        let groups: Vec<&str> = body.split('-').collect();
        let widths = [8usize, 4, 4, 4, 12];

        if groups.len() != widths.len()
            || groups.iter().zip(widths).any(|(g, w)| g.len() != w)
        {
            return Err(ParseError::InvalidUfid(s.to_string()));
        }

        let hex: String = groups.concat();
        u128::from_str_radix(&hex, 16)
            .map(Ufid)
            .map_err(|_| ParseError::InvalidUfid(s.to_string()))
    }
}

impl From<u128> for Ufid {
    fn from(value: u128) -> Self {
        Ufid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_groups() {
        let ufid = Ufid::new(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10);
        assert_eq!(ufid.to_string(), "01020304-0506-0708-090a-0b0c0d0e0f10");
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        let a: Ufid = "ufid:01020304-0506-0708-090a-0b0c0d0e0f10".parse().unwrap();
        let b: Ufid = "01020304-0506-0708-090a-0b0c0d0e0f10".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_u128(), 0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!("".parse::<Ufid>().is_err());
        assert!("0102030405060708090a0b0c0d0e0f10".parse::<Ufid>().is_err());
        assert!("zz020304-0506-0708-090a-0b0c0d0e0f10".parse::<Ufid>().is_err());
    }

    #[test]
    fn test_cookie_bytes() {
        let ufid = Ufid::new(7);
        let bytes = ufid.to_bytes();
        assert_eq!(bytes[15], 7);
        assert_eq!(Ufid::from_bytes(&bytes), Some(ufid));
        assert_eq!(Ufid::from_bytes(&bytes[..8]), None);
    }
}
