//! Fixed-layout flow key and the key/mask pair used to describe a match.

use crate::vlan::{VLAN_CFI, VLAN_PCP_MASK, VLAN_PCP_SHIFT, VLAN_VID_MASK};
use crate::{MacAddress, OdpPort};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Number of general purpose registers carried in a flow.
pub const FLOW_N_REGS: usize = 16;

/// Tunnel metadata of a flow (the outer header of a decapsulated packet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowTunnel {
    pub tun_id: u64,
    pub ip_src: Ipv4Addr,
    pub ip_dst: Ipv4Addr,
    pub ipv6_src: Ipv6Addr,
    pub ipv6_dst: Ipv6Addr,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Default for FlowTunnel {
    fn default() -> Self {
        Self {
            tun_id: 0,
            ip_src: Ipv4Addr::UNSPECIFIED,
            ip_dst: Ipv4Addr::UNSPECIFIED,
            ipv6_src: Ipv6Addr::UNSPECIFIED,
            ipv6_dst: Ipv6Addr::UNSPECIFIED,
            tp_src: 0,
            tp_dst: 0,
        }
    }
}

impl FlowTunnel {
    /// True when no tunnel field is set. On a mask this means "no tunnel match".
    pub fn is_zero(&self) -> bool {
        *self == FlowTunnel::default()
    }
}

/// One packet header summary. Used both as a key and, with the same layout,
/// as a wildcard mask where a zero bit means "don't care".
///
/// `dl_type` is the innermost EtherType. An 802.1Q tag, if any, is described
/// by `vlan_tci` with the CFI bit meaning "tag present".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flow {
    pub tunnel: FlowTunnel,

    // Metadata
    pub metadata: u64,
    pub regs: [u32; FLOW_N_REGS],
    pub skb_priority: u32,
    pub pkt_mark: u32,
    pub dp_hash: u32,
    pub in_port: OdpPort,
    pub recirc_id: u32,
    pub conj_id: u32,
    pub actset_output: u32,

    // Connection tracking
    pub ct_state: u8,
    pub ct_zone: u16,
    pub ct_mark: u32,
    pub ct_label: u128,

    // L2
    pub dl_dst: MacAddress,
    pub dl_src: MacAddress,
    pub dl_type: u16,
    pub vlan_tci: u16,
    pub mpls_lse: [u32; 3],

    // L3
    pub nw_src: Ipv4Addr,
    pub nw_dst: Ipv4Addr,
    pub ipv6_src: Ipv6Addr,
    pub ipv6_dst: Ipv6Addr,
    pub nw_frag: u8,
    pub nw_tos: u8,
    pub nw_ttl: u8,
    pub nw_proto: u8,

    // L4
    pub tp_src: u16,
    pub tp_dst: u16,
    pub tcp_flags: u16,
}

impl Default for Flow {
    fn default() -> Self {
        Self {
            tunnel: FlowTunnel::default(),
            metadata: 0,
            regs: [0; FLOW_N_REGS],
            skb_priority: 0,
            pkt_mark: 0,
            dp_hash: 0,
            in_port: OdpPort::default(),
            recirc_id: 0,
            conj_id: 0,
            actset_output: 0,
            ct_state: 0,
            ct_zone: 0,
            ct_mark: 0,
            ct_label: 0,
            dl_dst: MacAddress::ZERO,
            dl_src: MacAddress::ZERO,
            dl_type: 0,
            vlan_tci: 0,
            mpls_lse: [0; 3],
            nw_src: Ipv4Addr::UNSPECIFIED,
            nw_dst: Ipv4Addr::UNSPECIFIED,
            ipv6_src: Ipv6Addr::UNSPECIFIED,
            ipv6_dst: Ipv6Addr::UNSPECIFIED,
            nw_frag: 0,
            nw_tos: 0,
            nw_ttl: 0,
            nw_proto: 0,
            tp_src: 0,
            tp_dst: 0,
            tcp_flags: 0,
        }
    }
}

fn and_v4(a: Ipv4Addr, b: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(a) & u32::from(b))
}

fn and_v6(a: Ipv6Addr, b: Ipv6Addr) -> Ipv6Addr {
    Ipv6Addr::from(u128::from(a) & u128::from(b))
}

const V4_EXACT: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

/// A flow key with its wildcard mask.
///
/// The setters always store `value & mask` in the key, so two matches that
/// constrain the same bits to the same values compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Match {
    pub flow: Flow,
    pub mask: Flow,
}

impl Match {
    /// A match that wildcards everything.
    pub fn catchall() -> Self {
        Self::default()
    }

    pub fn set_in_port(&mut self, port: OdpPort) {
        self.flow.in_port = port;
        self.mask.in_port = OdpPort::EXACT;
    }

    pub fn set_dl_type(&mut self, dl_type: u16) {
        self.flow.dl_type = dl_type;
        self.mask.dl_type = u16::MAX;
    }

    pub fn set_dl_src(&mut self, mac: MacAddress) {
        self.set_dl_src_masked(mac, MacAddress::BROADCAST);
    }

    pub fn set_dl_src_masked(&mut self, mac: MacAddress, mask: MacAddress) {
        self.flow.dl_src = mac.masked(&mask);
        self.mask.dl_src = mask;
    }

    pub fn set_dl_dst(&mut self, mac: MacAddress) {
        self.set_dl_dst_masked(mac, MacAddress::BROADCAST);
    }

    pub fn set_dl_dst_masked(&mut self, mac: MacAddress, mask: MacAddress) {
        self.flow.dl_dst = mac.masked(&mask);
        self.mask.dl_dst = mask;
    }

    pub fn set_vlan_tci_masked(&mut self, tci: u16, mask: u16) {
        self.flow.vlan_tci = tci & mask;
        self.mask.vlan_tci = mask;
    }

    /// Requires a tag with the given VLAN id. Leaves the PCP as it was.
    pub fn set_vlan_vid(&mut self, vid: u16) {
        self.flow.vlan_tci = (self.flow.vlan_tci & !VLAN_VID_MASK) | (vid & VLAN_VID_MASK) | VLAN_CFI;
        self.mask.vlan_tci |= VLAN_VID_MASK | VLAN_CFI;
    }

    /// Requires a tag with the given priority code point. Leaves the VID as it was.
    pub fn set_vlan_pcp(&mut self, pcp: u8) {
        let bits = ((pcp as u16) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK;
        self.flow.vlan_tci = (self.flow.vlan_tci & !VLAN_PCP_MASK) | bits | VLAN_CFI;
        self.mask.vlan_tci |= VLAN_PCP_MASK | VLAN_CFI;
    }

    /// Requires the packet to carry no 802.1Q tag.
    pub fn set_no_vlan(&mut self) {
        self.set_vlan_tci_masked(0, u16::MAX);
    }

    pub fn set_nw_proto(&mut self, proto: u8) {
        self.flow.nw_proto = proto;
        self.mask.nw_proto = u8::MAX;
    }

    pub fn set_nw_src(&mut self, addr: Ipv4Addr) {
        self.set_nw_src_masked(addr, V4_EXACT);
    }

    pub fn set_nw_src_masked(&mut self, addr: Ipv4Addr, mask: Ipv4Addr) {
        self.flow.nw_src = and_v4(addr, mask);
        self.mask.nw_src = mask;
    }

    pub fn set_nw_dst(&mut self, addr: Ipv4Addr) {
        self.set_nw_dst_masked(addr, V4_EXACT);
    }

    pub fn set_nw_dst_masked(&mut self, addr: Ipv4Addr, mask: Ipv4Addr) {
        self.flow.nw_dst = and_v4(addr, mask);
        self.mask.nw_dst = mask;
    }

    pub fn set_ipv6_src_masked(&mut self, addr: Ipv6Addr, mask: Ipv6Addr) {
        self.flow.ipv6_src = and_v6(addr, mask);
        self.mask.ipv6_src = mask;
    }

    pub fn set_ipv6_dst_masked(&mut self, addr: Ipv6Addr, mask: Ipv6Addr) {
        self.flow.ipv6_dst = and_v6(addr, mask);
        self.mask.ipv6_dst = mask;
    }

    pub fn set_nw_tos_masked(&mut self, tos: u8, mask: u8) {
        self.flow.nw_tos = tos & mask;
        self.mask.nw_tos = mask;
    }

    pub fn set_nw_ttl(&mut self, ttl: u8) {
        self.flow.nw_ttl = ttl;
        self.mask.nw_ttl = u8::MAX;
    }

    pub fn set_nw_frag_masked(&mut self, frag: u8, mask: u8) {
        self.flow.nw_frag = frag & mask;
        self.mask.nw_frag = mask;
    }

    pub fn set_tp_src(&mut self, port: u16) {
        self.set_tp_src_masked(port, u16::MAX);
    }

    pub fn set_tp_src_masked(&mut self, port: u16, mask: u16) {
        self.flow.tp_src = port & mask;
        self.mask.tp_src = mask;
    }

    pub fn set_tp_dst(&mut self, port: u16) {
        self.set_tp_dst_masked(port, u16::MAX);
    }

    pub fn set_tp_dst_masked(&mut self, port: u16, mask: u16) {
        self.flow.tp_dst = port & mask;
        self.mask.tp_dst = mask;
    }

    pub fn set_tcp_flags_masked(&mut self, flags: u16, mask: u16) {
        self.flow.tcp_flags = flags & mask;
        self.mask.tcp_flags = mask;
    }

    pub fn set_pkt_mark_masked(&mut self, mark: u32, mask: u32) {
        self.flow.pkt_mark = mark & mask;
        self.mask.pkt_mark = mask;
    }

    pub fn set_recirc_id(&mut self, id: u32) {
        self.flow.recirc_id = id;
        self.mask.recirc_id = u32::MAX;
    }

    /// Constrains register `idx`. Out of range indexes are ignored.
    pub fn set_reg_masked(&mut self, idx: usize, value: u32, mask: u32) {
        if idx < FLOW_N_REGS {
            self.flow.regs[idx] = value & mask;
            self.mask.regs[idx] = mask;
        }
    }

    pub fn set_ct_state_masked(&mut self, state: u8, mask: u8) {
        self.flow.ct_state = state & mask;
        self.mask.ct_state = mask;
    }

    pub fn set_ct_zone(&mut self, zone: u16) {
        self.flow.ct_zone = zone;
        self.mask.ct_zone = u16::MAX;
    }

    pub fn set_mpls_lse_masked(&mut self, idx: usize, lse: u32, mask: u32) {
        if idx < self.flow.mpls_lse.len() {
            self.flow.mpls_lse[idx] = lse & mask;
            self.mask.mpls_lse[idx] = mask;
        }
    }

    pub fn set_tun_id(&mut self, id: u64) {
        self.set_tun_id_masked(id, u64::MAX);
    }

    pub fn set_tun_id_masked(&mut self, id: u64, mask: u64) {
        self.flow.tunnel.tun_id = id & mask;
        self.mask.tunnel.tun_id = mask;
    }

    pub fn set_tun_src(&mut self, addr: Ipv4Addr) {
        self.set_tun_src_masked(addr, V4_EXACT);
    }

    pub fn set_tun_src_masked(&mut self, addr: Ipv4Addr, mask: Ipv4Addr) {
        self.flow.tunnel.ip_src = and_v4(addr, mask);
        self.mask.tunnel.ip_src = mask;
    }

    pub fn set_tun_dst(&mut self, addr: Ipv4Addr) {
        self.set_tun_dst_masked(addr, V4_EXACT);
    }

    pub fn set_tun_dst_masked(&mut self, addr: Ipv4Addr, mask: Ipv4Addr) {
        self.flow.tunnel.ip_dst = and_v4(addr, mask);
        self.mask.tunnel.ip_dst = mask;
    }

    pub fn set_tun_ipv6_src_masked(&mut self, addr: Ipv6Addr, mask: Ipv6Addr) {
        self.flow.tunnel.ipv6_src = and_v6(addr, mask);
        self.mask.tunnel.ipv6_src = mask;
    }

    pub fn set_tun_ipv6_dst_masked(&mut self, addr: Ipv6Addr, mask: Ipv6Addr) {
        self.flow.tunnel.ipv6_dst = and_v6(addr, mask);
        self.mask.tunnel.ipv6_dst = mask;
    }

    pub fn set_tun_tp_src_masked(&mut self, port: u16, mask: u16) {
        self.flow.tunnel.tp_src = port & mask;
        self.mask.tunnel.tp_src = mask;
    }

    pub fn set_tun_tp_dst_masked(&mut self, port: u16, mask: u16) {
        self.flow.tunnel.tp_dst = port & mask;
        self.mask.tunnel.tp_dst = mask;
    }
}
