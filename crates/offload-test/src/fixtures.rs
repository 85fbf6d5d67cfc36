//! Test fixtures for common offload patterns
//!
//! A small, fixed topology: two ingress devices and a few output ports,
//! each with a known ifindex.

use flow_types::ethertype::{ETH_TYPE_IP, ETH_TYPE_IPV6};
use flow_types::ip_proto::{IPPROTO_TCP, IPPROTO_UDP};
use flow_types::{Action, Match, OdpPort, PushVlan, TunnelSet, Ufid};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Ingress device `eth0`.
pub const ETH0: &str = "eth0";
pub const ETH0_IFINDEX: i32 = 2;
pub const ETH0_PORT: OdpPort = OdpPort::new(1);

/// Ingress device `eth1`.
pub const ETH1: &str = "eth1";
pub const ETH1_IFINDEX: i32 = 3;
pub const ETH1_PORT: OdpPort = OdpPort::new(2);

/// Egress port 7.
pub const PORT7: OdpPort = OdpPort::new(7);
pub const PORT7_IFINDEX: i32 = 17;

/// Egress tunnel port.
pub const VXLAN_PORT: OdpPort = OdpPort::new(9);
pub const VXLAN_IFINDEX: i32 = 19;

/// Every `(port, ifindex)` binding of the fixture topology.
pub const PORT_BINDINGS: &[(OdpPort, i32)] = &[
    (ETH0_PORT, ETH0_IFINDEX),
    (ETH1_PORT, ETH1_IFINDEX),
    (PORT7, PORT7_IFINDEX),
    (VXLAN_PORT, VXLAN_IFINDEX),
];

pub fn ufid(n: u128) -> Ufid {
    Ufid::new(0x5eed_0000_0000_0000_0000_0000_0000_0000 | n)
}

/// IPv4 packets to exactly `dst`.
pub fn ipv4_dst_match(dst: Ipv4Addr) -> Match {
    let mut m = Match::catchall();
    m.set_dl_type(ETH_TYPE_IP);
    m.set_nw_dst(dst);
    m
}

/// IPv4 packets into `dst/prefix_len`.
pub fn ipv4_subnet_match(dst: Ipv4Addr, prefix_len: u8) -> Match {
    let bits = u32::MAX
        .checked_shl(32 - u32::from(prefix_len.min(32)))
        .unwrap_or(0);
    let mut m = Match::catchall();
    m.set_dl_type(ETH_TYPE_IP);
    m.set_nw_dst_masked(dst, Ipv4Addr::from(bits));
    m
}

/// TCP to `dst:port`.
pub fn tcp_match(dst: Ipv4Addr, port: u16) -> Match {
    let mut m = ipv4_dst_match(dst);
    m.set_nw_proto(IPPROTO_TCP);
    m.set_tp_dst(port);
    m
}

/// UDP over IPv6 to `dst:port`.
pub fn udp6_match(dst: Ipv6Addr, port: u16) -> Match {
    let mut m = Match::catchall();
    m.set_dl_type(ETH_TYPE_IPV6);
    m.set_ipv6_dst_masked(dst, Ipv6Addr::from(u128::MAX));
    m.set_nw_proto(IPPROTO_UDP);
    m.set_tp_dst(port);
    m
}

/// IPv4 in VLAN `vid`.
pub fn vlan_match(vid: u16) -> Match {
    let mut m = Match::catchall();
    m.set_dl_type(ETH_TYPE_IP);
    m.set_vlan_vid(vid);
    m
}

/// Decapsulated packets from tunnel `id` sent to `dst`.
pub fn tunnel_match(id: u64, dst: Ipv4Addr) -> Match {
    let mut m = Match::catchall();
    m.set_tun_id(id);
    m.set_tun_dst(dst);
    m.set_dl_type(ETH_TYPE_IP);
    m
}

pub fn output(port: OdpPort) -> Vec<Action> {
    vec![Action::Output(port)]
}

pub fn retag_and_output(vid: u16, port: OdpPort) -> Vec<Action> {
    vec![
        Action::PopVlan,
        Action::PushVlan(PushVlan { vid, pcp: 0 }),
        Action::Output(port),
    ]
}

/// Encapsulate with VNI `id` towards `remote` and send out the tunnel port.
pub fn encap_and_output(id: u64, remote: Ipv4Addr) -> Vec<Action> {
    vec![
        Action::SetTunnel(TunnelSet {
            id,
            ipv4_dst: Some(remote),
            tp_dst: 4789,
            ..Default::default()
        }),
        Action::Output(VXLAN_PORT),
    ]
}
