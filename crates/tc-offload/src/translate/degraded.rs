//! Match dimensions flower cannot express.
//!
//! A match that constrains any of these still installs, but over-matches:
//! the field is left out of the classifier mask and reported back to the
//! caller, which re-validates such packets on the software path.

use flow_types::ethertype::{ETH_TYPE_IP, ETH_TYPE_IPV6};
use flow_types::field_mask::*;
use flow_types::ip_proto::{IPPROTO_ICMP, IPPROTO_ICMPV6, IPPROTO_IGMP, IPPROTO_TCP};
use flow_types::Match;
use std::fmt;

/// One constrained dimension left out of an installed mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoredField {
    PktMark,
    RecircId,
    DpHash,
    ConjId,
    SkbPriority,
    ActsetOutput,
    CtState,
    CtZone,
    CtMark,
    CtLabel,
    Reg(usize),
    Metadata,
    IpDscp,
    IpEcn,
    NwTtl,
    MplsLabel,
    MplsTc,
    MplsTtl,
    MplsBos,
    /// Label stack entry below the top one.
    MplsLse(usize),
    NwFrag,
    IcmpType,
    IcmpCode,
    IgmpType,
    IgmpCode,
    Icmpv6Type,
    Icmpv6Code,
    TcpFlags,
}

impl fmt::Display for IgnoredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoredField::PktMark => write!(f, "pkt_mark"),
            IgnoredField::RecircId => write!(f, "recirc_id"),
            IgnoredField::DpHash => write!(f, "dp_hash"),
            IgnoredField::ConjId => write!(f, "conj_id"),
            IgnoredField::SkbPriority => write!(f, "skb_priority"),
            IgnoredField::ActsetOutput => write!(f, "actset_output"),
            IgnoredField::CtState => write!(f, "ct_state"),
            IgnoredField::CtZone => write!(f, "ct_zone"),
            IgnoredField::CtMark => write!(f, "ct_mark"),
            IgnoredField::CtLabel => write!(f, "ct_label"),
            IgnoredField::Reg(i) => write!(f, "reg{}", i),
            IgnoredField::Metadata => write!(f, "metadata"),
            IgnoredField::IpDscp => write!(f, "ip_dscp"),
            IgnoredField::IpEcn => write!(f, "nw_ecn"),
            IgnoredField::NwTtl => write!(f, "nw_ttl"),
            IgnoredField::MplsLabel => write!(f, "mpls_label"),
            IgnoredField::MplsTc => write!(f, "mpls_tc"),
            IgnoredField::MplsTtl => write!(f, "mpls_ttl"),
            IgnoredField::MplsBos => write!(f, "mpls_bos"),
            IgnoredField::MplsLse(i) => write!(f, "mpls_lse{}", i),
            IgnoredField::NwFrag => write!(f, "nw_frag"),
            IgnoredField::IcmpType => write!(f, "icmp_type"),
            IgnoredField::IcmpCode => write!(f, "icmp_code"),
            IgnoredField::IgmpType => write!(f, "igmp_type"),
            IgnoredField::IgmpCode => write!(f, "igmp_code"),
            IgnoredField::Icmpv6Type => write!(f, "icmpv6_type"),
            IgnoredField::Icmpv6Code => write!(f, "icmpv6_code"),
            IgnoredField::TcpFlags => write!(f, "tcp_flags"),
        }
    }
}

/// Exact L3 protocol of the match, if both EtherType and IP protocol are
/// pinned.
fn exact_l3_l4(m: &Match) -> Option<(u16, u8)> {
    (m.mask.dl_type == u16::MAX && m.mask.nw_proto == u8::MAX).then_some((m.flow.dl_type, m.flow.nw_proto))
}

/// ICMP, IGMP and ICMPv6 reuse `tp_src`/`tp_dst` for type and code. Returns
/// the field pair when they do for this match.
pub(crate) fn icmp_like(m: &Match) -> Option<(IgnoredField, IgnoredField)> {
    match exact_l3_l4(m)? {
        (ETH_TYPE_IP, IPPROTO_ICMP) => Some((IgnoredField::IcmpType, IgnoredField::IcmpCode)),
        (ETH_TYPE_IP, IPPROTO_IGMP) => Some((IgnoredField::IgmpType, IgnoredField::IgmpCode)),
        (ETH_TYPE_IPV6, IPPROTO_ICMPV6) => Some((IgnoredField::Icmpv6Type, IgnoredField::Icmpv6Code)),
        _ => None,
    }
}

/// Lists every constrained field the classifier cannot express.
pub fn unsupported_fields(m: &Match) -> Vec<IgnoredField> {
    let mask = &m.mask;
    let mut ignored = Vec::new();
    let mut check = |hit: bool, field: IgnoredField| {
        if hit {
            ignored.push(field);
        }
    };

    check(mask.pkt_mark != 0, IgnoredField::PktMark);
    check(mask.recirc_id != 0, IgnoredField::RecircId);
    check(mask.dp_hash != 0, IgnoredField::DpHash);
    check(mask.conj_id != 0, IgnoredField::ConjId);
    check(mask.skb_priority != 0, IgnoredField::SkbPriority);
    check(mask.actset_output != 0, IgnoredField::ActsetOutput);

    check(mask.ct_state != 0, IgnoredField::CtState);
    check(mask.ct_zone != 0, IgnoredField::CtZone);
    check(mask.ct_mark != 0, IgnoredField::CtMark);
    check(mask.ct_label != 0, IgnoredField::CtLabel);

    for (i, reg) in mask.regs.iter().enumerate() {
        check(*reg != 0, IgnoredField::Reg(i));
    }
    check(mask.metadata != 0, IgnoredField::Metadata);

    check(mask.nw_tos & IP_DSCP_MASK != 0, IgnoredField::IpDscp);
    check(mask.nw_tos & IP_ECN_MASK != 0, IgnoredField::IpEcn);
    check(mask.nw_ttl != 0, IgnoredField::NwTtl);

    let top = mask.mpls_lse[0];
    check(top & MPLS_LABEL_MASK != 0, IgnoredField::MplsLabel);
    check(top & MPLS_TC_MASK != 0, IgnoredField::MplsTc);
    check(top & MPLS_TTL_MASK != 0, IgnoredField::MplsTtl);
    check(top & MPLS_BOS_MASK != 0, IgnoredField::MplsBos);
    check(mask.mpls_lse[1] != 0, IgnoredField::MplsLse(1));
    check(mask.mpls_lse[2] != 0, IgnoredField::MplsLse(2));

    check(mask.nw_frag != 0, IgnoredField::NwFrag);

    if let Some((type_field, code_field)) = icmp_like(m) {
        check(mask.tp_src != 0, type_field);
        check(mask.tp_dst != 0, code_field);
    }

    let is_tcp = matches!(exact_l3_l4(m), Some((ETH_TYPE_IP | ETH_TYPE_IPV6, IPPROTO_TCP)));
    check(is_tcp && mask.tcp_flags & TCP_FLAGS_MASK != 0, IgnoredField::TcpFlags);

    ignored
}
