//! `TCA_OPTIONS` encoding and decoding for flower entries.
//!
//! The codec is mechanical: it turns a [`TcFlower`] into flower and action
//! attributes and back. Deciding *what* may be expressed is the job of the
//! translator above it; here every masked field is emitted as-is.

use crate::consts::*;
use crate::error::{TcError, TcResult};
use crate::flower::{FlowerKey, FlowerStats, TcAction, TcFlower, TunnelKeySet};
use byteorder::{ByteOrder, NativeEndian};
use flow_types::ip_proto::{IPPROTO_SCTP, IPPROTO_TCP, IPPROTO_UDP};
use flow_types::{ethertype::ETH_TYPE_VLAN, MacAddress};
use netlink_packet_core::{parse_ipv6, parse_mac, parse_string, parse_u16, parse_u16_be, parse_u32, parse_u32_be, parse_u8, DecodeError};
use offload_common::attr::{emit_attrs, iter_attrs};
use offload_common::NlAttr;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Size of `struct gnet_stats_basic` as emitted by the kernel.
const GNET_STATS_BASIC_LEN: usize = 16;

fn decode_err(e: DecodeError) -> TcError {
    TcError::Decode(e.to_string())
}

/// Attribute ids for (src, dst, src mask, dst mask) of an L4 protocol.
fn port_attrs(ip_proto: u8) -> Option<(u16, u16, u16, u16)> {
    match ip_proto {
        IPPROTO_TCP => Some((
            TCA_FLOWER_KEY_TCP_SRC,
            TCA_FLOWER_KEY_TCP_DST,
            TCA_FLOWER_KEY_TCP_SRC_MASK,
            TCA_FLOWER_KEY_TCP_DST_MASK,
        )),
        IPPROTO_UDP => Some((
            TCA_FLOWER_KEY_UDP_SRC,
            TCA_FLOWER_KEY_UDP_DST,
            TCA_FLOWER_KEY_UDP_SRC_MASK,
            TCA_FLOWER_KEY_UDP_DST_MASK,
        )),
        IPPROTO_SCTP => Some((
            TCA_FLOWER_KEY_SCTP_SRC,
            TCA_FLOWER_KEY_SCTP_DST,
            TCA_FLOWER_KEY_SCTP_SRC_MASK,
            TCA_FLOWER_KEY_SCTP_DST_MASK,
        )),
        _ => None,
    }
}

fn put_mac(attrs: &mut Vec<NlAttr>, kinds: (u16, u16), key: MacAddress, mask: MacAddress) {
    if !mask.is_zero() {
        attrs.push(NlAttr::bytes(kinds.0, key.as_bytes()));
        attrs.push(NlAttr::bytes(kinds.1, mask.as_bytes()));
    }
}

fn put_v4(attrs: &mut Vec<NlAttr>, kinds: (u16, u16), key: Ipv4Addr, mask: Ipv4Addr) {
    if !mask.is_unspecified() {
        attrs.push(NlAttr::Be32(kinds.0, u32::from(key)));
        attrs.push(NlAttr::Be32(kinds.1, u32::from(mask)));
    }
}

fn put_v6(attrs: &mut Vec<NlAttr>, kinds: (u16, u16), key: Ipv6Addr, mask: Ipv6Addr) {
    if !mask.is_unspecified() {
        attrs.push(NlAttr::bytes(kinds.0, key.octets()));
        attrs.push(NlAttr::bytes(kinds.1, mask.octets()));
    }
}

fn put_port(attrs: &mut Vec<NlAttr>, kinds: (u16, u16), key: u16, mask: u16) {
    if mask != 0 {
        attrs.push(NlAttr::Be16(kinds.0, key));
        attrs.push(NlAttr::Be16(kinds.1, mask));
    }
}

fn encode_key(attrs: &mut Vec<NlAttr>, key: &FlowerKey, mask: &FlowerKey) {
    if mask.eth_type != 0 {
        attrs.push(NlAttr::Be16(TCA_FLOWER_KEY_ETH_TYPE, key.eth_type));
    }
    if mask.ip_proto != 0 {
        attrs.push(NlAttr::U8(TCA_FLOWER_KEY_IP_PROTO, key.ip_proto));
    }

    put_mac(attrs, (TCA_FLOWER_KEY_ETH_DST, TCA_FLOWER_KEY_ETH_DST_MASK), key.dst_mac, mask.dst_mac);
    put_mac(attrs, (TCA_FLOWER_KEY_ETH_SRC, TCA_FLOWER_KEY_ETH_SRC_MASK), key.src_mac, mask.src_mac);

    if mask.vlan_id != 0 {
        attrs.push(NlAttr::U16(TCA_FLOWER_KEY_VLAN_ID, key.vlan_id));
    }
    if mask.vlan_prio != 0 {
        attrs.push(NlAttr::U8(TCA_FLOWER_KEY_VLAN_PRIO, key.vlan_prio));
    }
    if key.eth_type == ETH_TYPE_VLAN && mask.encap_eth_type != 0 {
        attrs.push(NlAttr::Be16(TCA_FLOWER_KEY_VLAN_ETH_TYPE, key.encap_eth_type));
    }

    put_v4(attrs, (TCA_FLOWER_KEY_IPV4_SRC, TCA_FLOWER_KEY_IPV4_SRC_MASK), key.ipv4_src, mask.ipv4_src);
    put_v4(attrs, (TCA_FLOWER_KEY_IPV4_DST, TCA_FLOWER_KEY_IPV4_DST_MASK), key.ipv4_dst, mask.ipv4_dst);
    put_v6(attrs, (TCA_FLOWER_KEY_IPV6_SRC, TCA_FLOWER_KEY_IPV6_SRC_MASK), key.ipv6_src, mask.ipv6_src);
    put_v6(attrs, (TCA_FLOWER_KEY_IPV6_DST, TCA_FLOWER_KEY_IPV6_DST_MASK), key.ipv6_dst, mask.ipv6_dst);

    if let Some((src, dst, src_mask, dst_mask)) = port_attrs(key.ip_proto) {
        put_port(attrs, (src, src_mask), key.src_port, mask.src_port);
        put_port(attrs, (dst, dst_mask), key.dst_port, mask.dst_port);
    }

    let (tk, tm) = (&key.tunnel, &mask.tunnel);
    if tm.id != 0 {
        attrs.push(NlAttr::Be32(TCA_FLOWER_KEY_ENC_KEY_ID, tk.id));
    }
    put_v4(attrs, (TCA_FLOWER_KEY_ENC_IPV4_SRC, TCA_FLOWER_KEY_ENC_IPV4_SRC_MASK), tk.ipv4_src, tm.ipv4_src);
    put_v4(attrs, (TCA_FLOWER_KEY_ENC_IPV4_DST, TCA_FLOWER_KEY_ENC_IPV4_DST_MASK), tk.ipv4_dst, tm.ipv4_dst);
    put_v6(attrs, (TCA_FLOWER_KEY_ENC_IPV6_SRC, TCA_FLOWER_KEY_ENC_IPV6_SRC_MASK), tk.ipv6_src, tm.ipv6_src);
    put_v6(attrs, (TCA_FLOWER_KEY_ENC_IPV6_DST, TCA_FLOWER_KEY_ENC_IPV6_DST_MASK), tk.ipv6_dst, tm.ipv6_dst);
    put_port(attrs, (TCA_FLOWER_KEY_ENC_UDP_SRC_PORT, TCA_FLOWER_KEY_ENC_UDP_SRC_PORT_MASK), tk.tp_src, tm.tp_src);
    put_port(attrs, (TCA_FLOWER_KEY_ENC_UDP_DST_PORT, TCA_FLOWER_KEY_ENC_UDP_DST_PORT_MASK), tk.tp_dst, tm.tp_dst);
}

/// `struct tc_gen` with the given verdict, followed by `extra` i32 fields.
fn action_parms(verdict: i32, extra: &[i32]) -> Vec<u8> {
    let mut buf = vec![0u8; TC_GEN_LEN + 4 * extra.len()];
    NativeEndian::write_i32(&mut buf[8..12], verdict);
    for (i, value) in extra.iter().enumerate() {
        let at = TC_GEN_LEN + 4 * i;
        NativeEndian::write_i32(&mut buf[at..at + 4], *value);
    }
    buf
}

fn encode_action_options(action: &TcAction) -> Vec<NlAttr> {
    match action {
        TcAction::Drop => vec![NlAttr::Bytes(TCA_GACT_PARMS, action_parms(TC_ACT_SHOT, &[]))],
        TcAction::Redirect { ifindex } => vec![NlAttr::Bytes(
            TCA_MIRRED_PARMS,
            action_parms(TC_ACT_STOLEN, &[TCA_EGRESS_REDIR, *ifindex]),
        )],
        TcAction::VlanPop => vec![NlAttr::Bytes(
            TCA_VLAN_PARMS,
            action_parms(TC_ACT_PIPE, &[TCA_VLAN_ACT_POP]),
        )],
        TcAction::VlanPush { vid, prio } => vec![
            NlAttr::Bytes(TCA_VLAN_PARMS, action_parms(TC_ACT_PIPE, &[TCA_VLAN_ACT_PUSH])),
            NlAttr::U16(TCA_VLAN_PUSH_VLAN_ID, *vid),
            NlAttr::Be16(TCA_VLAN_PUSH_VLAN_PROTOCOL, ETH_TYPE_VLAN),
            NlAttr::U8(TCA_VLAN_PUSH_VLAN_PRIORITY, *prio),
        ],
        TcAction::TunnelRelease => vec![NlAttr::Bytes(
            TCA_TUNNEL_KEY_PARMS,
            action_parms(TC_ACT_PIPE, &[TCA_TUNNEL_KEY_ACT_RELEASE]),
        )],
        TcAction::TunnelSet(set) => {
            let mut opts = vec![
                NlAttr::Bytes(
                    TCA_TUNNEL_KEY_PARMS,
                    action_parms(TC_ACT_PIPE, &[TCA_TUNNEL_KEY_ACT_SET]),
                ),
                NlAttr::Be32(TCA_TUNNEL_KEY_ENC_KEY_ID, set.id),
            ];
            if let Some(addr) = set.ipv4_src {
                opts.push(NlAttr::Be32(TCA_TUNNEL_KEY_ENC_IPV4_SRC, u32::from(addr)));
            }
            if let Some(addr) = set.ipv4_dst {
                opts.push(NlAttr::Be32(TCA_TUNNEL_KEY_ENC_IPV4_DST, u32::from(addr)));
            }
            if let Some(addr) = set.ipv6_src {
                opts.push(NlAttr::bytes(TCA_TUNNEL_KEY_ENC_IPV6_SRC, addr.octets()));
            }
            if let Some(addr) = set.ipv6_dst {
                opts.push(NlAttr::bytes(TCA_TUNNEL_KEY_ENC_IPV6_DST, addr.octets()));
            }
            if set.tp_dst != 0 {
                opts.push(NlAttr::Be16(TCA_TUNNEL_KEY_ENC_DST_PORT, set.tp_dst));
            }
            opts
        }
    }
}

fn encode_stats(stats: &FlowerStats) -> NlAttr {
    let mut basic = vec![0u8; GNET_STATS_BASIC_LEN];
    NativeEndian::write_u64(&mut basic[0..8], stats.n_bytes);
    NativeEndian::write_u32(&mut basic[8..12], stats.n_packets.min(u64::from(u32::MAX)) as u32);
    NlAttr::Nested(TCA_ACT_STATS, vec![NlAttr::Bytes(TCA_STATS_BASIC, basic)])
}

fn encode_actions(flower: &TcFlower) -> NlAttr {
    let last = flower.actions.len().saturating_sub(1);
    let mut list = Vec::with_capacity(flower.actions.len());

    for (i, action) in flower.actions.iter().enumerate() {
        let mut attrs = vec![
            NlAttr::str(TCA_ACT_KIND, action.kind()),
            NlAttr::Nested(TCA_ACT_OPTIONS, encode_action_options(action)),
        ];
        if i == last {
            if let Some(cookie) = &flower.cookie {
                attrs.push(NlAttr::bytes(TCA_ACT_COOKIE, cookie));
            }
        }
        if i == 0 && flower.stats != FlowerStats::default() {
            attrs.push(encode_stats(&flower.stats));
        }
        // Action slots are numbered from 1.
        list.push(NlAttr::Nested(i as u16 + 1, attrs));
    }

    NlAttr::Nested(TCA_FLOWER_ACT, list)
}

/// Builds the flower attributes nested under `TCA_OPTIONS`.
pub fn encode_options(flower: &TcFlower) -> Vec<NlAttr> {
    let mut attrs = Vec::new();
    encode_key(&mut attrs, &flower.key, &flower.mask);
    if flower.flags != 0 {
        attrs.push(NlAttr::U32(TCA_FLOWER_FLAGS, flower.flags));
    }
    attrs.push(encode_actions(flower));
    attrs
}

/// Serialized form of [`encode_options`].
pub fn encode_options_bytes(flower: &TcFlower) -> Vec<u8> {
    emit_attrs(&encode_options(flower))
}

fn ipv4(value: &[u8]) -> TcResult<Ipv4Addr> {
    parse_u32_be(value).map(Ipv4Addr::from).map_err(decode_err)
}

fn ipv6(value: &[u8]) -> TcResult<Ipv6Addr> {
    parse_ipv6(value).map(Ipv6Addr::from).map_err(decode_err)
}

fn mac(value: &[u8]) -> TcResult<MacAddress> {
    parse_mac(value).map(MacAddress::new).map_err(decode_err)
}

fn be16(value: &[u8]) -> TcResult<u16> {
    parse_u16_be(value).map_err(decode_err)
}

fn parms_field(parms: &[u8], index: usize) -> TcResult<i32> {
    let at = TC_GEN_LEN + 4 * index;
    if parms.len() < at + 4 {
        return Err(TcError::Decode(format!(
            "action parameters too short: {} bytes",
            parms.len()
        )));
    }
    Ok(NativeEndian::read_i32(&parms[at..at + 4]))
}

fn decode_action_options(kind: &str, options: &[u8]) -> TcResult<TcAction> {
    let mut parms: &[u8] = &[];
    let mut vid = 0u16;
    let mut prio = 0u8;
    let mut set = TunnelKeySet::default();

    for attr in iter_attrs(options) {
        let (k, value) = attr.map_err(decode_err)?;
        match (kind, k) {
            // Every action kind used here keeps its parameters at id 2.
            (_, TCA_GACT_PARMS) => parms = value,
            (ACT_KIND_VLAN, TCA_VLAN_PUSH_VLAN_ID) => vid = parse_u16(value).map_err(decode_err)?,
            (ACT_KIND_VLAN, TCA_VLAN_PUSH_VLAN_PRIORITY) => prio = parse_u8(value).map_err(decode_err)?,
            (ACT_KIND_TUNNEL_KEY, TCA_TUNNEL_KEY_ENC_KEY_ID) => {
                set.id = parse_u32_be(value).map_err(decode_err)?
            }
            (ACT_KIND_TUNNEL_KEY, TCA_TUNNEL_KEY_ENC_IPV4_SRC) => set.ipv4_src = Some(ipv4(value)?),
            (ACT_KIND_TUNNEL_KEY, TCA_TUNNEL_KEY_ENC_IPV4_DST) => set.ipv4_dst = Some(ipv4(value)?),
            (ACT_KIND_TUNNEL_KEY, TCA_TUNNEL_KEY_ENC_IPV6_SRC) => set.ipv6_src = Some(ipv6(value)?),
            (ACT_KIND_TUNNEL_KEY, TCA_TUNNEL_KEY_ENC_IPV6_DST) => set.ipv6_dst = Some(ipv6(value)?),
            (ACT_KIND_TUNNEL_KEY, TCA_TUNNEL_KEY_ENC_DST_PORT) => set.tp_dst = be16(value)?,
            _ => {}
        }
    }

    if parms.len() < TC_GEN_LEN {
        return Err(TcError::Decode(format!("{} action without parameters", kind)));
    }

    match kind {
        ACT_KIND_GACT => {
            let verdict = NativeEndian::read_i32(&parms[8..12]);
            if verdict == TC_ACT_SHOT {
                Ok(TcAction::Drop)
            } else {
                Err(TcError::Unsupported(format!("gact verdict {}", verdict)))
            }
        }
        ACT_KIND_MIRRED => {
            let eaction = parms_field(parms, 0)?;
            if eaction != TCA_EGRESS_REDIR {
                return Err(TcError::Unsupported(format!("mirred action {}", eaction)));
            }
            Ok(TcAction::Redirect {
                ifindex: parms_field(parms, 1)?,
            })
        }
        ACT_KIND_VLAN => match parms_field(parms, 0)? {
            TCA_VLAN_ACT_POP => Ok(TcAction::VlanPop),
            TCA_VLAN_ACT_PUSH => Ok(TcAction::VlanPush { vid, prio }),
            other => Err(TcError::Unsupported(format!("vlan action {}", other))),
        },
        ACT_KIND_TUNNEL_KEY => match parms_field(parms, 0)? {
            TCA_TUNNEL_KEY_ACT_SET => Ok(TcAction::TunnelSet(set)),
            TCA_TUNNEL_KEY_ACT_RELEASE => Ok(TcAction::TunnelRelease),
            other => Err(TcError::Unsupported(format!("tunnel_key action {}", other))),
        },
        other => Err(TcError::Unsupported(format!("action kind {:?}", other))),
    }
}

fn decode_stats(bytes: &[u8]) -> TcResult<Option<FlowerStats>> {
    for attr in iter_attrs(bytes) {
        let (kind, value) = attr.map_err(decode_err)?;
        if kind == TCA_STATS_BASIC && value.len() >= 12 {
            return Ok(Some(FlowerStats {
                n_bytes: NativeEndian::read_u64(&value[0..8]),
                n_packets: u64::from(NativeEndian::read_u32(&value[8..12])),
            }));
        }
    }
    Ok(None)
}

fn decode_actions(bytes: &[u8], flower: &mut TcFlower) -> TcResult<()> {
    flower.actions.clear();

    for slot in iter_attrs(bytes) {
        let (_, slot) = slot.map_err(decode_err)?;
        let mut kind = None;
        let mut options: &[u8] = &[];

        for attr in iter_attrs(slot) {
            let (k, value) = attr.map_err(decode_err)?;
            match k {
                TCA_ACT_KIND => kind = Some(parse_string(value).map_err(decode_err)?),
                TCA_ACT_OPTIONS => options = value,
                TCA_ACT_COOKIE => flower.cookie = Some(value.to_vec()),
                TCA_ACT_STATS => {
                    // The busiest action carries the entry's counters.
                    if let Some(stats) = decode_stats(value)? {
                        if stats.n_packets > flower.stats.n_packets {
                            flower.stats = stats;
                        }
                    }
                }
                _ => {}
            }
        }

        let kind = kind.ok_or_else(|| TcError::Decode("action without kind".into()))?;
        flower.actions.push(decode_action_options(&kind, options)?);
    }
    Ok(())
}

/// Parses flower `TCA_OPTIONS` into `flower`'s key, mask, actions, cookie,
/// flags and stats. The identity fields are left untouched.
pub fn decode_options(bytes: &[u8], flower: &mut TcFlower) -> TcResult<()> {
    let (key, mask) = (&mut flower.key, &mut flower.mask);
    let mut actions: &[u8] = &[];
    let mut src_port = None;
    let mut dst_port = None;
    let mut src_port_mask = None;
    let mut dst_port_mask = None;

    for attr in iter_attrs(bytes) {
        let (kind, value) = attr.map_err(decode_err)?;
        match kind {
            TCA_FLOWER_KEY_ETH_TYPE => {
                key.eth_type = be16(value)?;
                mask.eth_type = u16::MAX;
            }
            TCA_FLOWER_KEY_IP_PROTO => {
                key.ip_proto = parse_u8(value).map_err(decode_err)?;
                mask.ip_proto = u8::MAX;
            }
            TCA_FLOWER_KEY_ETH_DST => key.dst_mac = mac(value)?,
            TCA_FLOWER_KEY_ETH_DST_MASK => mask.dst_mac = mac(value)?,
            TCA_FLOWER_KEY_ETH_SRC => key.src_mac = mac(value)?,
            TCA_FLOWER_KEY_ETH_SRC_MASK => mask.src_mac = mac(value)?,
            TCA_FLOWER_KEY_VLAN_ID => {
                key.vlan_id = parse_u16(value).map_err(decode_err)?;
                mask.vlan_id = flow_types::vlan::VLAN_VID_MASK;
            }
            TCA_FLOWER_KEY_VLAN_PRIO => {
                key.vlan_prio = parse_u8(value).map_err(decode_err)?;
                mask.vlan_prio = 0x07;
            }
            TCA_FLOWER_KEY_VLAN_ETH_TYPE => {
                key.encap_eth_type = be16(value)?;
                mask.encap_eth_type = u16::MAX;
            }
            TCA_FLOWER_KEY_IPV4_SRC => key.ipv4_src = ipv4(value)?,
            TCA_FLOWER_KEY_IPV4_SRC_MASK => mask.ipv4_src = ipv4(value)?,
            TCA_FLOWER_KEY_IPV4_DST => key.ipv4_dst = ipv4(value)?,
            TCA_FLOWER_KEY_IPV4_DST_MASK => mask.ipv4_dst = ipv4(value)?,
            TCA_FLOWER_KEY_IPV6_SRC => key.ipv6_src = ipv6(value)?,
            TCA_FLOWER_KEY_IPV6_SRC_MASK => mask.ipv6_src = ipv6(value)?,
            TCA_FLOWER_KEY_IPV6_DST => key.ipv6_dst = ipv6(value)?,
            TCA_FLOWER_KEY_IPV6_DST_MASK => mask.ipv6_dst = ipv6(value)?,
            TCA_FLOWER_KEY_TCP_SRC | TCA_FLOWER_KEY_UDP_SRC | TCA_FLOWER_KEY_SCTP_SRC => {
                src_port = Some(be16(value)?)
            }
            TCA_FLOWER_KEY_TCP_DST | TCA_FLOWER_KEY_UDP_DST | TCA_FLOWER_KEY_SCTP_DST => {
                dst_port = Some(be16(value)?)
            }
            TCA_FLOWER_KEY_TCP_SRC_MASK | TCA_FLOWER_KEY_UDP_SRC_MASK | TCA_FLOWER_KEY_SCTP_SRC_MASK => {
                src_port_mask = Some(be16(value)?)
            }
            TCA_FLOWER_KEY_TCP_DST_MASK | TCA_FLOWER_KEY_UDP_DST_MASK | TCA_FLOWER_KEY_SCTP_DST_MASK => {
                dst_port_mask = Some(be16(value)?)
            }
            TCA_FLOWER_KEY_ENC_KEY_ID => {
                key.tunnel.id = parse_u32_be(value).map_err(decode_err)?;
                mask.tunnel.id = u32::MAX;
            }
            TCA_FLOWER_KEY_ENC_IPV4_SRC => key.tunnel.ipv4_src = ipv4(value)?,
            TCA_FLOWER_KEY_ENC_IPV4_SRC_MASK => mask.tunnel.ipv4_src = ipv4(value)?,
            TCA_FLOWER_KEY_ENC_IPV4_DST => key.tunnel.ipv4_dst = ipv4(value)?,
            TCA_FLOWER_KEY_ENC_IPV4_DST_MASK => mask.tunnel.ipv4_dst = ipv4(value)?,
            TCA_FLOWER_KEY_ENC_IPV6_SRC => key.tunnel.ipv6_src = ipv6(value)?,
            TCA_FLOWER_KEY_ENC_IPV6_SRC_MASK => mask.tunnel.ipv6_src = ipv6(value)?,
            TCA_FLOWER_KEY_ENC_IPV6_DST => key.tunnel.ipv6_dst = ipv6(value)?,
            TCA_FLOWER_KEY_ENC_IPV6_DST_MASK => mask.tunnel.ipv6_dst = ipv6(value)?,
            TCA_FLOWER_KEY_ENC_UDP_SRC_PORT => key.tunnel.tp_src = be16(value)?,
            TCA_FLOWER_KEY_ENC_UDP_SRC_PORT_MASK => mask.tunnel.tp_src = be16(value)?,
            TCA_FLOWER_KEY_ENC_UDP_DST_PORT => key.tunnel.tp_dst = be16(value)?,
            TCA_FLOWER_KEY_ENC_UDP_DST_PORT_MASK => mask.tunnel.tp_dst = be16(value)?,
            TCA_FLOWER_FLAGS => flower.flags = parse_u32(value).map_err(decode_err)?,
            TCA_FLOWER_ACT => actions = value,
            _ => {}
        }
    }

    // Older kernels omit port masks for exact matches.
    if let Some(port) = src_port {
        key.src_port = port;
        mask.src_port = src_port_mask.unwrap_or(u16::MAX);
    }
    if let Some(port) = dst_port {
        key.dst_port = port;
        mask.dst_port = dst_port_mask.unwrap_or(u16::MAX);
    }

    decode_actions(actions, flower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tcp_flower() -> TcFlower {
        let mut flower = TcFlower {
            protocol: 0x0800,
            flags: TCA_CLS_FLAGS_SKIP_SW,
            ..Default::default()
        };
        flower.key.eth_type = 0x0800;
        flower.mask.eth_type = u16::MAX;
        flower.key.ip_proto = IPPROTO_TCP;
        flower.mask.ip_proto = u8::MAX;
        flower.key.ipv4_dst = Ipv4Addr::new(10, 0, 0, 5);
        flower.mask.ipv4_dst = Ipv4Addr::new(255, 255, 255, 255);
        flower.key.dst_port = 80;
        flower.mask.dst_port = u16::MAX;
        flower.actions = vec![TcAction::Redirect { ifindex: 7 }];
        flower.cookie = Some(vec![0xab; 16]);
        flower
    }

    fn decode(bytes: &[u8]) -> TcFlower {
        let mut flower = TcFlower::default();
        decode_options(bytes, &mut flower).unwrap();
        flower
    }

    #[test]
    fn test_tcp_entry_decodes_back() {
        let flower = tcp_flower();
        let decoded = decode(&encode_options_bytes(&flower));

        assert_eq!(decoded.key, flower.key);
        assert_eq!(decoded.mask, flower.mask);
        assert_eq!(decoded.actions, flower.actions);
        assert_eq!(decoded.cookie, flower.cookie);
        assert_eq!(decoded.flags, TCA_CLS_FLAGS_SKIP_SW);
    }

    #[test]
    fn test_ports_use_protocol_attributes() {
        let mut flower = tcp_flower();
        flower.key.ip_proto = IPPROTO_UDP;
        let attrs = encode_options(&flower);
        let kinds: Vec<u16> = attrs.iter().map(netlink_packet_core::Nla::kind).collect();

        assert!(kinds.contains(&TCA_FLOWER_KEY_UDP_DST));
        assert!(kinds.contains(&TCA_FLOWER_KEY_UDP_DST_MASK));
        assert!(!kinds.contains(&TCA_FLOWER_KEY_TCP_DST));
        assert!(!kinds.contains(&TCA_FLOWER_KEY_UDP_SRC));
    }

    #[test]
    fn test_unmasked_fields_not_emitted() {
        let mut flower = TcFlower::default();
        flower.key.ipv4_src = Ipv4Addr::new(1, 2, 3, 4);
        flower.actions = vec![TcAction::Drop];
        let attrs = encode_options(&flower);
        assert_eq!(attrs.len(), 1);

        let decoded = decode(&emit_attrs(&attrs));
        assert_eq!(decoded.key, FlowerKey::default());
        assert_eq!(decoded.actions, vec![TcAction::Drop]);
    }

    #[test]
    fn test_vlan_and_tunnel_actions() {
        let mut flower = TcFlower::default();
        flower.key.eth_type = ETH_TYPE_VLAN;
        flower.mask.eth_type = u16::MAX;
        flower.key.vlan_id = 100;
        flower.mask.vlan_id = 0x0fff;
        flower.key.encap_eth_type = 0x86dd;
        flower.mask.encap_eth_type = u16::MAX;
        flower.key.tunnel.id = 5;
        flower.mask.tunnel.id = u32::MAX;
        flower.key.tunnel.tp_dst = 4789;
        flower.mask.tunnel.tp_dst = u16::MAX;
        flower.actions = vec![
            TcAction::TunnelRelease,
            TcAction::VlanPop,
            TcAction::VlanPush { vid: 20, prio: 3 },
            TcAction::TunnelSet(TunnelKeySet {
                id: 9,
                ipv4_dst: Some(Ipv4Addr::new(192, 168, 0, 1)),
                ipv6_src: Some(Ipv6Addr::LOCALHOST),
                tp_dst: 6081,
                ..Default::default()
            }),
            TcAction::Redirect { ifindex: 3 },
        ];

        let decoded = decode(&encode_options_bytes(&flower));
        assert_eq!(decoded.key, flower.key);
        assert_eq!(decoded.mask, flower.mask);
        assert_eq!(decoded.actions, flower.actions);
        assert_eq!(decoded.cookie, None);
    }

    #[test]
    fn test_stats_passthrough() {
        let mut flower = tcp_flower();
        flower.stats = FlowerStats {
            n_packets: 12,
            n_bytes: 3400,
        };
        let decoded = decode(&encode_options_bytes(&flower));
        assert_eq!(decoded.stats, flower.stats);
    }

    #[test]
    fn test_unknown_action_kind_is_unsupported() {
        let attrs = vec![NlAttr::Nested(
            TCA_FLOWER_ACT,
            vec![NlAttr::Nested(
                1,
                vec![
                    NlAttr::str(TCA_ACT_KIND, "pedit"),
                    NlAttr::Nested(TCA_ACT_OPTIONS, vec![NlAttr::Bytes(2, vec![0; TC_GEN_LEN])]),
                ],
            )],
        )];
        let mut flower = TcFlower::default();
        let err = decode_options(&emit_attrs(&attrs), &mut flower).unwrap_err();
        assert!(matches!(err, TcError::Unsupported(_)));
    }

    #[test]
    fn test_truncated_parms_is_decode_error() {
        let attrs = vec![NlAttr::Nested(
            TCA_FLOWER_ACT,
            vec![NlAttr::Nested(
                1,
                vec![
                    NlAttr::str(TCA_ACT_KIND, ACT_KIND_MIRRED),
                    NlAttr::Nested(TCA_ACT_OPTIONS, vec![NlAttr::Bytes(TCA_MIRRED_PARMS, vec![0; TC_GEN_LEN])]),
                ],
            )],
        )];
        let mut flower = TcFlower::default();
        let err = decode_options(&emit_attrs(&attrs), &mut flower).unwrap_err();
        assert!(matches!(err, TcError::Decode(_)));
    }
}
