//! Generic match/actions -> flower entry.

use super::degraded::{icmp_like, unsupported_fields, IgnoredField};
use crate::error::{OffloadError, OffloadResult};
use crate::port::PortResolver;
use flow_types::ethertype::{ETH_TYPE_IP, ETH_TYPE_IPV6, ETH_TYPE_VLAN};
use flow_types::ip_proto::{IPPROTO_SCTP, IPPROTO_TCP, IPPROTO_UDP};
use flow_types::vlan::{tci_to_pcp, tci_to_vid, VLAN_CFI, VLAN_PCP_MASK, VLAN_VID_MASK};
use flow_types::{Action, Flow, Match, TunnelSet, Ufid};
use std::net::{Ipv4Addr, Ipv6Addr};
use tc_flower::{FlowerKey, TcAction, TcFlower, TunnelKeySet};
use tracing::debug;

/// Per-request encoding parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeContext {
    /// `TCA_FLOWER_FLAGS` for the entry.
    pub flags: u32,
    /// Destination port for tunnel-set actions that leave it unset.
    pub tunnel_dst_port: Option<u16>,
}

/// An encoded entry, not yet placed (no ifindex, priority or handle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub flower: TcFlower,
    /// Constrained fields left out of the mask.
    pub ignored: Vec<IgnoredField>,
}

fn and_v4(a: Ipv4Addr, b: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(a) & u32::from(b))
}

fn and_v6(a: Ipv6Addr, b: Ipv6Addr) -> Ipv6Addr {
    Ipv6Addr::from(u128::from(a) & u128::from(b))
}

pub(super) fn encode(
    ports: &dyn PortResolver,
    m: &Match,
    actions: &[Action],
    ufid: Ufid,
    ctx: &EncodeContext,
) -> OffloadResult<Encoded> {
    let ignored = unsupported_fields(m);
    for field in &ignored {
        debug!(ufid = %ufid, field = %field, "match field not offloadable, ignoring");
    }

    let (key, mask) = encode_match(m)?;
    let mut flower = TcFlower {
        protocol: key.eth_type,
        key,
        mask,
        flags: ctx.flags,
        cookie: Some(ufid.to_bytes().to_vec()),
        ..Default::default()
    };
    flower.actions = encode_actions(ports, actions, flower.has_tunnel_match(), ctx)?;

    Ok(Encoded { flower, ignored })
}

fn encode_match(m: &Match) -> OffloadResult<(FlowerKey, FlowerKey)> {
    let (flow, wc) = (&m.flow, &m.mask);
    let mut key = FlowerKey::default();
    let mut mask = FlowerKey::default();

    key.dst_mac = flow.dl_dst.masked(&wc.dl_dst);
    mask.dst_mac = wc.dl_dst;
    key.src_mac = flow.dl_src.masked(&wc.dl_src);
    mask.src_mac = wc.dl_src;

    let dl_type = match wc.dl_type {
        0 => None,
        u16::MAX => Some(flow.dl_type),
        partial => {
            return Err(OffloadError::unsupported(format!(
                "partial dl_type mask {:#06x}",
                partial
            )))
        }
    };
    if let Some(dl_type) = dl_type {
        key.eth_type = dl_type;
        mask.eth_type = u16::MAX;
    }
    let is_ipv4 = dl_type == Some(ETH_TYPE_IP);
    let is_ipv6 = dl_type == Some(ETH_TYPE_IPV6);

    match wc.nw_proto {
        0 => {}
        u8::MAX if is_ipv4 || is_ipv6 => {
            key.ip_proto = flow.nw_proto;
            mask.ip_proto = u8::MAX;
        }
        u8::MAX => return Err(OffloadError::unsupported("nw_proto on a non-IP dl_type")),
        partial => {
            return Err(OffloadError::unsupported(format!(
                "partial nw_proto mask {:#04x}",
                partial
            )))
        }
    }

    if !wc.nw_src.is_unspecified() || !wc.nw_dst.is_unspecified() {
        if !is_ipv4 {
            return Err(OffloadError::unsupported("IPv4 addresses on a non-IPv4 dl_type"));
        }
        key.ipv4_src = and_v4(flow.nw_src, wc.nw_src);
        mask.ipv4_src = wc.nw_src;
        key.ipv4_dst = and_v4(flow.nw_dst, wc.nw_dst);
        mask.ipv4_dst = wc.nw_dst;
    }

    if !wc.ipv6_src.is_unspecified() || !wc.ipv6_dst.is_unspecified() {
        if !is_ipv6 {
            return Err(OffloadError::unsupported("IPv6 addresses on a non-IPv6 dl_type"));
        }
        key.ipv6_src = and_v6(flow.ipv6_src, wc.ipv6_src);
        mask.ipv6_src = wc.ipv6_src;
        key.ipv6_dst = and_v6(flow.ipv6_dst, wc.ipv6_dst);
        mask.ipv6_dst = wc.ipv6_dst;
    }

    if wc.tp_src != 0 || wc.tp_dst != 0 {
        let proto = (wc.nw_proto == u8::MAX).then_some(flow.nw_proto);
        match proto {
            Some(IPPROTO_TCP | IPPROTO_UDP | IPPROTO_SCTP) => {
                key.src_port = flow.tp_src & wc.tp_src;
                mask.src_port = wc.tp_src;
                key.dst_port = flow.tp_dst & wc.tp_dst;
                mask.dst_port = wc.tp_dst;
            }
            // type/code, already reported as ignored
            _ if icmp_like(m).is_some() => {}
            _ => {
                return Err(OffloadError::unsupported(
                    "transport ports without a TCP, UDP or SCTP protocol",
                ))
            }
        }
    }

    encode_vlan(flow, wc, &mut key, &mut mask)?;
    encode_tunnel_match(flow, wc, &mut key, &mut mask)?;

    Ok((key, mask))
}

/// Flower can only say "tagged, with this VID and/or this PCP" or, by
/// leaving the tag out, nothing at all. Partial VID/PCP masks and matches
/// on the CFI bit alone are rejected.
fn encode_vlan(flow: &Flow, wc: &Flow, key: &mut FlowerKey, mask: &mut FlowerKey) -> OffloadResult<()> {
    let tci_mask = wc.vlan_tci;
    if tci_mask == 0 {
        return Ok(());
    }
    // exact "no tag"
    if tci_mask == u16::MAX && flow.vlan_tci == 0 {
        return Ok(());
    }

    let vid_mask = tci_mask & VLAN_VID_MASK;
    let pcp_mask = tci_mask & VLAN_PCP_MASK;
    let tagged = tci_mask & VLAN_CFI != 0 && flow.vlan_tci & VLAN_CFI != 0;
    let whole_fields = matches!(vid_mask, 0 | VLAN_VID_MASK) && matches!(pcp_mask, 0 | VLAN_PCP_MASK);

    if !tagged || !whole_fields || vid_mask | pcp_mask == 0 {
        return Err(OffloadError::unsupported(format!(
            "VLAN TCI mask {:#06x}",
            tci_mask
        )));
    }

    key.encap_eth_type = key.eth_type;
    mask.encap_eth_type = mask.eth_type;
    key.eth_type = ETH_TYPE_VLAN;
    mask.eth_type = u16::MAX;

    if vid_mask != 0 {
        key.vlan_id = tci_to_vid(flow.vlan_tci);
        mask.vlan_id = VLAN_VID_MASK;
    }
    if pcp_mask != 0 {
        key.vlan_prio = tci_to_pcp(flow.vlan_tci);
        mask.vlan_prio = 0x07;
    }
    Ok(())
}

fn encode_tunnel_match(flow: &Flow, wc: &Flow, key: &mut FlowerKey, mask: &mut FlowerKey) -> OffloadResult<()> {
    let (tf, tw) = (&flow.tunnel, &wc.tunnel);
    if tw.is_zero() {
        return Ok(());
    }

    match tw.tun_id {
        0 => {}
        u64::MAX => {
            key.tunnel.id = u32::try_from(tf.tun_id).map_err(|_| {
                OffloadError::unsupported(format!("tunnel id {:#x} wider than 32 bits", tf.tun_id))
            })?;
            mask.tunnel.id = u32::MAX;
        }
        partial => {
            return Err(OffloadError::unsupported(format!(
                "partial tunnel id mask {:#x}",
                partial
            )))
        }
    }

    key.tunnel.ipv4_src = and_v4(tf.ip_src, tw.ip_src);
    mask.tunnel.ipv4_src = tw.ip_src;
    key.tunnel.ipv4_dst = and_v4(tf.ip_dst, tw.ip_dst);
    mask.tunnel.ipv4_dst = tw.ip_dst;
    key.tunnel.ipv6_src = and_v6(tf.ipv6_src, tw.ipv6_src);
    mask.tunnel.ipv6_src = tw.ipv6_src;
    key.tunnel.ipv6_dst = and_v6(tf.ipv6_dst, tw.ipv6_dst);
    mask.tunnel.ipv6_dst = tw.ipv6_dst;
    key.tunnel.tp_src = tf.tp_src & tw.tp_src;
    mask.tunnel.tp_src = tw.tp_src;
    key.tunnel.tp_dst = tf.tp_dst & tw.tp_dst;
    mask.tunnel.tp_dst = tw.tp_dst;
    Ok(())
}

fn once(seen: &mut bool, action: &Action) -> OffloadResult<()> {
    if std::mem::replace(seen, true) {
        return Err(OffloadError::unsupported(format!("repeated {} action", action.name())));
    }
    Ok(())
}

fn encode_actions(
    ports: &dyn PortResolver,
    actions: &[Action],
    tunnel_match: bool,
    ctx: &EncodeContext,
) -> OffloadResult<Vec<TcAction>> {
    let mut out = Vec::with_capacity(actions.len() + 1);
    if tunnel_match {
        out.push(TcAction::TunnelRelease);
    }

    let (mut output, mut tunnel, mut push, mut pop) = (false, false, false, false);
    for action in actions {
        if output {
            return Err(OffloadError::unsupported(format!(
                "{} after output",
                action.name()
            )));
        }

        let encoded = match action {
            Action::Output(port) => {
                once(&mut output, action)?;
                let ifindex = ports
                    .port_to_ifindex(*port)
                    .ok_or_else(|| OffloadError::not_found(format!("interface for port {}", port)))?;
                TcAction::Redirect { ifindex }
            }
            Action::PushVlan(vlan) => {
                once(&mut push, action)?;
                if vlan.vid > VLAN_VID_MASK || vlan.pcp > 7 {
                    return Err(OffloadError::unsupported(format!("{}", action)));
                }
                TcAction::VlanPush {
                    vid: vlan.vid,
                    prio: vlan.pcp,
                }
            }
            Action::PopVlan => {
                once(&mut pop, action)?;
                TcAction::VlanPop
            }
            Action::SetTunnel(set) => {
                once(&mut tunnel, action)?;
                TcAction::TunnelSet(encode_tunnel_set(set, ctx)?)
            }
            Action::SetField(_) | Action::Other(_) => {
                return Err(OffloadError::unsupported(format!("action {}", action)));
            }
        };
        out.push(encoded);
    }

    if actions.is_empty() {
        out.push(TcAction::Drop);
    }
    Ok(out)
}

fn encode_tunnel_set(set: &TunnelSet, ctx: &EncodeContext) -> OffloadResult<TunnelKeySet> {
    let id = u32::try_from(set.id)
        .map_err(|_| OffloadError::unsupported(format!("tunnel id {:#x} wider than 32 bits", set.id)))?;
    if set.tp_src != 0 {
        return Err(OffloadError::unsupported("tunnel source port"));
    }

    let tp_dst = match set.tp_dst {
        0 => ctx.tunnel_dst_port.unwrap_or(0),
        port => port,
    };
    Ok(TunnelKeySet {
        id,
        ipv4_src: set.ipv4_src,
        ipv4_dst: set.ipv4_dst,
        ipv6_src: set.ipv6_src,
        ipv6_dst: set.ipv6_dst,
        tp_dst,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortTable;
    use flow_types::ip_proto::IPPROTO_ICMP;
    use flow_types::{MacAddress, OdpPort, PushVlan};
    use pretty_assertions::assert_eq;

    fn ports() -> PortTable {
        let table = PortTable::new();
        table.add(OdpPort::new(7), 12);
        table
    }

    fn run(m: &Match, actions: &[Action]) -> OffloadResult<Encoded> {
        encode(&ports(), m, actions, Ufid::new(0xab), &EncodeContext::default())
    }

    fn ipv4_dst(addr: Ipv4Addr) -> Match {
        let mut m = Match::catchall();
        m.set_dl_type(ETH_TYPE_IP);
        m.set_nw_dst(addr);
        m
    }

    #[test]
    fn test_ipv4_dst_output() {
        let m = ipv4_dst(Ipv4Addr::new(10, 0, 0, 5));
        let encoded = run(&m, &[Action::Output(OdpPort::new(7))]).unwrap();
        let flower = encoded.flower;

        assert_eq!(flower.protocol, ETH_TYPE_IP);
        assert_eq!(flower.key.eth_type, ETH_TYPE_IP);
        assert_eq!(flower.key.ipv4_dst, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(flower.mask.ipv4_dst, Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(flower.actions, vec![TcAction::Redirect { ifindex: 12 }]);
        assert_eq!(flower.cookie, Some(Ufid::new(0xab).to_bytes().to_vec()));
        assert_eq!((flower.ifindex, flower.prio, flower.handle), (0, 0, 0));
        assert!(encoded.ignored.is_empty());
    }

    #[test]
    fn test_partial_dst_mac_mask_kept() {
        let mut m = Match::catchall();
        m.set_dl_dst_masked(
            MacAddress::new([0x01, 0, 0x5e, 0, 0, 1]),
            MacAddress::new([0xff, 0xff, 0xff, 0, 0, 0]),
        );
        let flower = run(&m, &[]).unwrap().flower;
        assert_eq!(flower.mask.dst_mac, MacAddress::new([0xff, 0xff, 0xff, 0, 0, 0]));
        assert_eq!(flower.key.dst_mac, MacAddress::new([0x01, 0, 0x5e, 0, 0, 0]));
        assert_eq!(flower.protocol, 0);
    }

    #[test]
    fn test_empty_actions_drop() {
        let flower = run(&Match::catchall(), &[]).unwrap().flower;
        assert_eq!(flower.actions, vec![TcAction::Drop]);
    }

    #[test]
    fn test_partial_dl_type_rejected() {
        let mut m = Match::catchall();
        m.flow.dl_type = 0x0800;
        m.mask.dl_type = 0xff00;
        assert!(matches!(run(&m, &[]), Err(OffloadError::Unsupported { .. })));
    }

    #[test]
    fn test_l3_on_arp_rejected() {
        let mut m = Match::catchall();
        m.set_dl_type(flow_types::ethertype::ETH_TYPE_ARP);
        m.set_nw_src(Ipv4Addr::new(10, 0, 0, 1));
        assert!(matches!(run(&m, &[]), Err(OffloadError::Unsupported { .. })));

        let mut m = Match::catchall();
        m.set_dl_type(ETH_TYPE_IP);
        m.set_ipv6_dst_masked(Ipv6Addr::LOCALHOST, Ipv6Addr::from(u128::MAX));
        assert!(matches!(run(&m, &[]), Err(OffloadError::Unsupported { .. })));

        let mut m = Match::catchall();
        m.set_nw_proto(IPPROTO_TCP);
        assert!(matches!(run(&m, &[]), Err(OffloadError::Unsupported { .. })));
    }

    #[test]
    fn test_ports_follow_protocol() {
        let mut m = ipv4_dst(Ipv4Addr::new(10, 0, 0, 5));
        m.set_nw_proto(IPPROTO_UDP);
        m.set_tp_dst_masked(4000, 0xff00);
        let flower = run(&m, &[]).unwrap().flower;
        assert_eq!(flower.key.ip_proto, IPPROTO_UDP);
        assert_eq!(flower.key.dst_port, 4000 & 0xff00);
        assert_eq!(flower.mask.dst_port, 0xff00);
        assert_eq!(flower.mask.src_port, 0);
    }

    #[test]
    fn test_ports_without_protocol_rejected() {
        let mut m = ipv4_dst(Ipv4Addr::new(10, 0, 0, 5));
        m.set_tp_dst(80);
        assert!(matches!(run(&m, &[]), Err(OffloadError::Unsupported { .. })));
    }

    #[test]
    fn test_icmp_type_degraded_not_emitted() {
        let mut m = ipv4_dst(Ipv4Addr::new(10, 0, 0, 5));
        m.set_nw_proto(IPPROTO_ICMP);
        m.set_tp_src(8);
        let encoded = run(&m, &[]).unwrap();
        assert_eq!(encoded.ignored, vec![IgnoredField::IcmpType]);
        assert_eq!(encoded.flower.mask.src_port, 0);
    }

    #[test]
    fn test_vlan_tagged_match() {
        let mut m = ipv4_dst(Ipv4Addr::new(10, 0, 0, 5));
        m.set_vlan_vid(100);
        let flower = run(&m, &[]).unwrap().flower;

        assert_eq!(flower.protocol, ETH_TYPE_VLAN);
        assert_eq!(flower.key.eth_type, ETH_TYPE_VLAN);
        assert_eq!(flower.key.encap_eth_type, ETH_TYPE_IP);
        assert_eq!(flower.mask.encap_eth_type, u16::MAX);
        assert_eq!((flower.key.vlan_id, flower.mask.vlan_id), (100, 0x0fff));
        assert_eq!(flower.mask.vlan_prio, 0);
    }

    #[test]
    fn test_vlan_no_tag_accepted() {
        let mut m = Match::catchall();
        m.set_no_vlan();
        let flower = run(&m, &[]).unwrap().flower;
        assert_eq!(flower.mask, FlowerKey::default());
    }

    #[test]
    fn test_vlan_partial_masks_rejected() {
        for (tci, mask) in [(0x1000 | 5, 0x100f), (0x1000, 0x1000), (0x0064, 0x0fff), (0x2000, 0x3000)] {
            let mut m = Match::catchall();
            m.set_vlan_tci_masked(tci, mask);
            assert!(
                matches!(run(&m, &[]), Err(OffloadError::Unsupported { .. })),
                "tci {:#x}/{:#x}",
                tci,
                mask
            );
        }
    }

    #[test]
    fn test_tunnel_match_prepends_release() {
        let mut m = Match::catchall();
        m.set_tun_id(42);
        m.set_tun_dst(Ipv4Addr::new(192, 0, 2, 1));
        let flower = run(&m, &[Action::Output(OdpPort::new(7))]).unwrap().flower;

        assert_eq!(flower.key.tunnel.id, 42);
        assert_eq!(flower.mask.tunnel.id, u32::MAX);
        assert_eq!(flower.key.tunnel.ipv4_dst, Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(
            flower.actions,
            vec![TcAction::TunnelRelease, TcAction::Redirect { ifindex: 12 }]
        );
    }

    #[test]
    fn test_wide_tunnel_id_rejected() {
        let mut m = Match::catchall();
        m.set_tun_id(1 << 40);
        assert!(matches!(run(&m, &[]), Err(OffloadError::Unsupported { .. })));

        let set = TunnelSet {
            id: 1 << 33,
            ..Default::default()
        };
        assert!(matches!(
            run(&Match::catchall(), &[Action::SetTunnel(set)]),
            Err(OffloadError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_action_rules() {
        let out = Action::Output(OdpPort::new(7));
        let pop = Action::PopVlan;

        assert!(matches!(run(&Match::catchall(), &[out.clone(), pop.clone()]), Err(OffloadError::Unsupported { .. })));
        assert!(matches!(run(&Match::catchall(), &[out.clone(), out.clone()]), Err(OffloadError::Unsupported { .. })));
        assert!(matches!(run(&Match::catchall(), &[pop.clone(), pop.clone()]), Err(OffloadError::Unsupported { .. })));
        assert!(matches!(
            run(&Match::catchall(), &[Action::Other("recirc".into())]),
            Err(OffloadError::Unsupported { .. })
        ));
        assert!(matches!(
            run(&Match::catchall(), &[Action::SetField("ipv4_dst".into())]),
            Err(OffloadError::Unsupported { .. })
        ));
        assert!(matches!(
            run(&Match::catchall(), &[Action::Output(OdpPort::new(99))]),
            Err(OffloadError::NotFound { .. })
        ));

        let flower = run(
            &Match::catchall(),
            &[pop, Action::PushVlan(PushVlan { vid: 20, pcp: 3 }), out],
        )
        .unwrap()
        .flower;
        assert_eq!(
            flower.actions,
            vec![
                TcAction::VlanPop,
                TcAction::VlanPush { vid: 20, prio: 3 },
                TcAction::Redirect { ifindex: 12 },
            ]
        );
    }

    #[test]
    fn test_tunnel_set_default_port() {
        let set = TunnelSet {
            id: 7,
            ipv4_dst: Some(Ipv4Addr::new(192, 0, 2, 9)),
            ..Default::default()
        };
        let ctx = EncodeContext {
            flags: 2,
            tunnel_dst_port: Some(4789),
        };
        let flower = encode(&ports(), &Match::catchall(), &[Action::SetTunnel(set)], Ufid::new(1), &ctx)
            .unwrap()
            .flower;

        assert_eq!(flower.flags, 2);
        assert_eq!(
            flower.actions,
            vec![TcAction::TunnelSet(TunnelKeySet {
                id: 7,
                ipv4_dst: Some(Ipv4Addr::new(192, 0, 2, 9)),
                tp_dst: 4789,
                ..Default::default()
            })]
        );

        let with_src = TunnelSet { tp_src: 1, ..set };
        assert!(matches!(
            encode(&ports(), &Match::catchall(), &[Action::SetTunnel(with_src)], Ufid::new(1), &ctx),
            Err(OffloadError::Unsupported { .. })
        ));
    }
}
