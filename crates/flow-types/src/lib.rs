//! Generic flow vocabulary for datapath offload.
//!
//! This crate holds the protocol-independent side of flow offload: the
//! identity a switch assigns to a rule and the match/action language the
//! rule is written in.
//!
//! - [`Ufid`]: 128-bit caller-assigned flow identifier
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses (maskable)
//! - [`OdpPort`]: switch-local datapath port numbers
//! - [`Flow`] / [`Match`]: fixed-layout flow key plus a same-layout mask
//! - [`Action`]: the datapath action list attached to a rule
//!
//! Key and mask share the [`Flow`] layout. A zero mask bit means "don't care".

mod action;
mod flow;
mod mac;
mod port;
mod ufid;
pub mod vlan;

pub use action::{Action, PushVlan, TunnelSet};
pub use flow::{Flow, FlowTunnel, Match, FLOW_N_REGS};
pub use mac::MacAddress;
pub use port::OdpPort;
pub use ufid::Ufid;

/// EtherType values the offload path cares about.
pub mod ethertype {
    pub const ETH_TYPE_IP: u16 = 0x0800;
    pub const ETH_TYPE_ARP: u16 = 0x0806;
    pub const ETH_TYPE_VLAN: u16 = 0x8100;
    pub const ETH_TYPE_IPV6: u16 = 0x86dd;
}

/// IP protocol numbers.
pub mod ip_proto {
    pub const IPPROTO_ICMP: u8 = 1;
    pub const IPPROTO_IGMP: u8 = 2;
    pub const IPPROTO_TCP: u8 = 6;
    pub const IPPROTO_UDP: u8 = 17;
    pub const IPPROTO_ICMPV6: u8 = 58;
    pub const IPPROTO_SCTP: u8 = 132;
}

/// Bit masks for sub-byte fields of [`Flow`].
pub mod field_mask {
    pub const IP_DSCP_MASK: u8 = 0xfc;
    pub const IP_ECN_MASK: u8 = 0x03;

    pub const MPLS_LABEL_MASK: u32 = 0xffff_f000;
    pub const MPLS_TC_MASK: u32 = 0x0000_0e00;
    pub const MPLS_BOS_MASK: u32 = 0x0000_0100;
    pub const MPLS_TTL_MASK: u32 = 0x0000_00ff;

    /// The 12 TCP flag bits carried in `tcp_flags`.
    pub const TCP_FLAGS_MASK: u16 = 0x0fff;
}

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid UFID format: {0}")]
    InvalidUfid(String),

    #[error("invalid datapath port: {0}")]
    InvalidPort(String),
}
