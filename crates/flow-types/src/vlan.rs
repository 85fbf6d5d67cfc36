//! IEEE 802.1Q tag control information (TCI) helpers.
//!
//! A TCI is `PCP(3) | CFI(1) | VID(12)`. Flows use the CFI bit to mean
//! "a tag is present", so a tagged key always has it set.

pub const VLAN_VID_MASK: u16 = 0x0fff;
pub const VLAN_CFI: u16 = 0x1000;
pub const VLAN_PCP_MASK: u16 = 0xe000;
pub const VLAN_PCP_SHIFT: u16 = 13;

/// Builds a tagged TCI from a VLAN id and priority code point.
pub const fn tci(vid: u16, pcp: u8) -> u16 {
    (vid & VLAN_VID_MASK) | (((pcp as u16) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK) | VLAN_CFI
}

pub const fn tci_to_vid(tci: u16) -> u16 {
    tci & VLAN_VID_MASK
}

pub const fn tci_to_pcp(tci: u16) -> u8 {
    ((tci & VLAN_PCP_MASK) >> VLAN_PCP_SHIFT) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tci_roundtrip() {
        let t = tci(100, 5);
        assert_eq!(t, 0xa000 | 0x1000 | 100);
        assert_eq!(tci_to_vid(t), 100);
        assert_eq!(tci_to_pcp(t), 5);
    }

    #[test]
    fn test_tci_truncates_out_of_range() {
        assert_eq!(tci_to_vid(tci(0x1fff, 0)), 0x0fff);
        assert_eq!(tci_to_pcp(tci(0, 9)), 1);
    }
}
