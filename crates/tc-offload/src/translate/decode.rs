//! Flower entry -> generic match/actions.

use crate::error::{OffloadError, OffloadResult};
use crate::port::PortResolver;
use flow_types::ethertype::ETH_TYPE_VLAN;
use flow_types::vlan::{VLAN_CFI, VLAN_PCP_MASK, VLAN_PCP_SHIFT, VLAN_VID_MASK};
use flow_types::{Action, Match, PushVlan, TunnelSet, Ufid};
use tc_flower::{FlowerStats, TcAction, TcFlower};

/// How the UFID of a dumped entry is to be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowIdentity {
    /// The entry carried its UFID as a cookie.
    Cookie(Ufid),
    /// No usable cookie; ask the identifier index.
    NeedsIndexLookup,
}

impl FlowIdentity {
    /// A cookie that is not exactly one UFID long counts as absent.
    pub fn from_cookie(cookie: Option<&[u8]>) -> Self {
        cookie
            .and_then(Ufid::from_bytes)
            .map_or(FlowIdentity::NeedsIndexLookup, FlowIdentity::Cookie)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFlow {
    pub matched: Match,
    pub actions: Vec<Action>,
    pub stats: FlowerStats,
    pub identity: FlowIdentity,
}

pub(super) fn decode(ports: &dyn PortResolver, flower: &TcFlower) -> OffloadResult<DecodedFlow> {
    Ok(DecodedFlow {
        matched: decode_match(flower),
        actions: decode_actions(ports, &flower.actions)?,
        stats: flower.stats,
        identity: FlowIdentity::from_cookie(flower.cookie.as_deref()),
    })
}

fn decode_match(flower: &TcFlower) -> Match {
    let (key, mask) = (&flower.key, &flower.mask);
    let mut m = Match::catchall();

    m.set_dl_dst_masked(key.dst_mac, mask.dst_mac);
    m.set_dl_src_masked(key.src_mac, mask.src_mac);

    if mask.eth_type == u16::MAX && key.eth_type == ETH_TYPE_VLAN {
        let (mut tci, mut tci_mask) = (VLAN_CFI, VLAN_CFI);
        if mask.vlan_id != 0 {
            tci |= key.vlan_id & VLAN_VID_MASK;
            tci_mask |= VLAN_VID_MASK;
        }
        if mask.vlan_prio != 0 {
            tci |= (u16::from(key.vlan_prio) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK;
            tci_mask |= VLAN_PCP_MASK;
        }
        m.set_vlan_tci_masked(tci, tci_mask);
        if mask.encap_eth_type != 0 {
            m.set_dl_type(key.encap_eth_type);
        }
    } else if mask.eth_type != 0 {
        m.set_dl_type(key.eth_type);
    }

    if mask.ip_proto != 0 {
        m.set_nw_proto(key.ip_proto);
    }
    m.set_nw_src_masked(key.ipv4_src, mask.ipv4_src);
    m.set_nw_dst_masked(key.ipv4_dst, mask.ipv4_dst);
    m.set_ipv6_src_masked(key.ipv6_src, mask.ipv6_src);
    m.set_ipv6_dst_masked(key.ipv6_dst, mask.ipv6_dst);
    m.set_tp_src_masked(key.src_port, mask.src_port);
    m.set_tp_dst_masked(key.dst_port, mask.dst_port);

    if flower.has_tunnel_match() {
        let (tk, tm) = (&key.tunnel, &mask.tunnel);
        if tm.id != 0 {
            m.set_tun_id(u64::from(tk.id));
        }
        m.set_tun_src_masked(tk.ipv4_src, tm.ipv4_src);
        m.set_tun_dst_masked(tk.ipv4_dst, tm.ipv4_dst);
        m.set_tun_ipv6_src_masked(tk.ipv6_src, tm.ipv6_src);
        m.set_tun_ipv6_dst_masked(tk.ipv6_dst, tm.ipv6_dst);
        m.set_tun_tp_src_masked(tk.tp_src, tm.tp_src);
        m.set_tun_tp_dst_masked(tk.tp_dst, tm.tp_dst);
    }

    m
}

fn decode_actions(ports: &dyn PortResolver, actions: &[TcAction]) -> OffloadResult<Vec<Action>> {
    let mut out = Vec::with_capacity(actions.len());
    for action in actions {
        match action {
            TcAction::VlanPop => out.push(Action::PopVlan),
            TcAction::VlanPush { vid, prio } => out.push(Action::PushVlan(PushVlan { vid: *vid, pcp: *prio })),
            TcAction::TunnelSet(set) => out.push(Action::SetTunnel(TunnelSet {
                id: u64::from(set.id),
                ipv4_src: set.ipv4_src,
                ipv4_dst: set.ipv4_dst,
                ipv6_src: set.ipv6_src,
                ipv6_dst: set.ipv6_dst,
                tp_src: 0,
                tp_dst: set.tp_dst,
            })),
            TcAction::Redirect { ifindex } => {
                let port = ports
                    .ifindex_to_port(*ifindex)
                    .ok_or_else(|| OffloadError::not_found(format!("port for ifindex {}", ifindex)))?;
                out.push(Action::Output(port));
            }
            // decap and the empty-list marker have no generic counterpart
            TcAction::TunnelRelease | TcAction::Drop => {}
        }
    }
    Ok(out)
}
