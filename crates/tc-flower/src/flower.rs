//! In-memory model of one flower classifier entry.

use crate::consts::{TCA_CLS_FLAGS_SKIP_HW, TCA_CLS_FLAGS_SKIP_SW};
use flow_types::MacAddress;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Outer-header (tunnel) part of a flower key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowerTunnelKey {
    pub id: u32,
    pub ipv4_src: Ipv4Addr,
    pub ipv4_dst: Ipv4Addr,
    pub ipv6_src: Ipv6Addr,
    pub ipv6_dst: Ipv6Addr,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Default for FlowerTunnelKey {
    fn default() -> Self {
        Self {
            id: 0,
            ipv4_src: Ipv4Addr::UNSPECIFIED,
            ipv4_dst: Ipv4Addr::UNSPECIFIED,
            ipv6_src: Ipv6Addr::UNSPECIFIED,
            ipv6_dst: Ipv6Addr::UNSPECIFIED,
            tp_src: 0,
            tp_dst: 0,
        }
    }
}

impl FlowerTunnelKey {
    pub fn is_zero(&self) -> bool {
        *self == FlowerTunnelKey::default()
    }
}

/// Flower match key. The same layout is used for the mask.
///
/// `eth_type` is the outer EtherType (0x8100 for tagged packets); the
/// EtherType after the tag is `encap_eth_type`. Multi-byte values are kept
/// in host order and converted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowerKey {
    pub eth_type: u16,
    pub ip_proto: u8,

    pub dst_mac: MacAddress,
    pub src_mac: MacAddress,

    pub src_port: u16,
    pub dst_port: u16,

    pub vlan_id: u16,
    pub vlan_prio: u8,
    pub encap_eth_type: u16,

    pub ipv4_src: Ipv4Addr,
    pub ipv4_dst: Ipv4Addr,
    pub ipv6_src: Ipv6Addr,
    pub ipv6_dst: Ipv6Addr,

    pub tunnel: FlowerTunnelKey,
}

impl Default for FlowerKey {
    fn default() -> Self {
        Self {
            eth_type: 0,
            ip_proto: 0,
            dst_mac: MacAddress::ZERO,
            src_mac: MacAddress::ZERO,
            src_port: 0,
            dst_port: 0,
            vlan_id: 0,
            vlan_prio: 0,
            encap_eth_type: 0,
            ipv4_src: Ipv4Addr::UNSPECIFIED,
            ipv4_dst: Ipv4Addr::UNSPECIFIED,
            ipv6_src: Ipv6Addr::UNSPECIFIED,
            ipv6_dst: Ipv6Addr::UNSPECIFIED,
            tunnel: FlowerTunnelKey::default(),
        }
    }
}

/// Tunnel metadata set by a `tunnel_key set` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TunnelKeySet {
    pub id: u32,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub ipv6_src: Option<Ipv6Addr>,
    pub ipv6_dst: Option<Ipv6Addr>,
    pub tp_dst: u16,
}

/// One action of a flower entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcAction {
    VlanPop,
    VlanPush { vid: u16, prio: u8 },
    TunnelSet(TunnelKeySet),
    /// Decapsulation, emitted first for tunnel matches.
    TunnelRelease,
    /// mirred egress redirect.
    Redirect { ifindex: i32 },
    /// gact shot.
    Drop,
}

impl TcAction {
    pub fn kind(&self) -> &'static str {
        use crate::consts::*;
        match self {
            TcAction::VlanPop | TcAction::VlanPush { .. } => ACT_KIND_VLAN,
            TcAction::TunnelSet(_) | TcAction::TunnelRelease => ACT_KIND_TUNNEL_KEY,
            TcAction::Redirect { .. } => ACT_KIND_MIRRED,
            TcAction::Drop => ACT_KIND_GACT,
        }
    }
}

/// Pass-through counters of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlowerStats {
    pub n_packets: u64,
    pub n_bytes: u64,
}

/// Where the classifier should run an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffloadPolicy {
    /// Hardware if possible, software otherwise.
    #[default]
    None,
    /// Hardware only.
    SkipSw,
    /// Software only.
    SkipHw,
}

impl OffloadPolicy {
    /// Value of `TCA_FLOWER_FLAGS`.
    pub fn flags(&self) -> u32 {
        match self {
            OffloadPolicy::None => 0,
            OffloadPolicy::SkipSw => TCA_CLS_FLAGS_SKIP_SW,
            OffloadPolicy::SkipHw => TCA_CLS_FLAGS_SKIP_HW,
        }
    }
}

/// A complete flower entry: identity triple plus key, mask and actions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TcFlower {
    pub ifindex: i32,
    pub prio: u16,
    pub handle: u32,
    /// Filter protocol (host order EtherType, 0 for all).
    pub protocol: u16,

    pub key: FlowerKey,
    pub mask: FlowerKey,
    pub actions: Vec<TcAction>,

    /// Opaque cookie attached to the last action.
    pub cookie: Option<Vec<u8>>,
    pub flags: u32,
    pub stats: FlowerStats,
}

impl TcFlower {
    /// True when the entry matches on tunnel metadata.
    pub fn has_tunnel_match(&self) -> bool {
        !self.mask.tunnel.is_zero()
    }
}
