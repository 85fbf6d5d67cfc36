//! Kernel uapi numbers for tc filters, the flower classifier and the actions
//! the offload path uses.

// rtnetlink message types
pub const RTM_NEWTFILTER: u16 = 44;
pub const RTM_DELTFILTER: u16 = 45;
pub const RTM_GETTFILTER: u16 = 46;

/// Size of `struct tcmsg`.
pub const TCMSG_LEN: usize = 20;

/// Parent handle of the classic ingress qdisc.
pub const TC_H_INGRESS: u32 = 0xffff_0000;

pub const ETH_P_ALL: u16 = 0x0003;

// Top level filter attributes
pub const TCA_KIND: u16 = 1;
pub const TCA_OPTIONS: u16 = 2;

pub const FLOWER_KIND: &str = "flower";

// Flower attributes
pub const TCA_FLOWER_ACT: u16 = 3;
pub const TCA_FLOWER_KEY_ETH_DST: u16 = 4;
pub const TCA_FLOWER_KEY_ETH_DST_MASK: u16 = 5;
pub const TCA_FLOWER_KEY_ETH_SRC: u16 = 6;
pub const TCA_FLOWER_KEY_ETH_SRC_MASK: u16 = 7;
pub const TCA_FLOWER_KEY_ETH_TYPE: u16 = 8;
pub const TCA_FLOWER_KEY_IP_PROTO: u16 = 9;
pub const TCA_FLOWER_KEY_IPV4_SRC: u16 = 10;
pub const TCA_FLOWER_KEY_IPV4_SRC_MASK: u16 = 11;
pub const TCA_FLOWER_KEY_IPV4_DST: u16 = 12;
pub const TCA_FLOWER_KEY_IPV4_DST_MASK: u16 = 13;
pub const TCA_FLOWER_KEY_IPV6_SRC: u16 = 14;
pub const TCA_FLOWER_KEY_IPV6_SRC_MASK: u16 = 15;
pub const TCA_FLOWER_KEY_IPV6_DST: u16 = 16;
pub const TCA_FLOWER_KEY_IPV6_DST_MASK: u16 = 17;
pub const TCA_FLOWER_KEY_TCP_SRC: u16 = 18;
pub const TCA_FLOWER_KEY_TCP_DST: u16 = 19;
pub const TCA_FLOWER_KEY_UDP_SRC: u16 = 20;
pub const TCA_FLOWER_KEY_UDP_DST: u16 = 21;
pub const TCA_FLOWER_FLAGS: u16 = 22;
pub const TCA_FLOWER_KEY_VLAN_ID: u16 = 23;
pub const TCA_FLOWER_KEY_VLAN_PRIO: u16 = 24;
pub const TCA_FLOWER_KEY_VLAN_ETH_TYPE: u16 = 25;
pub const TCA_FLOWER_KEY_ENC_KEY_ID: u16 = 26;
pub const TCA_FLOWER_KEY_ENC_IPV4_SRC: u16 = 27;
pub const TCA_FLOWER_KEY_ENC_IPV4_SRC_MASK: u16 = 28;
pub const TCA_FLOWER_KEY_ENC_IPV4_DST: u16 = 29;
pub const TCA_FLOWER_KEY_ENC_IPV4_DST_MASK: u16 = 30;
pub const TCA_FLOWER_KEY_ENC_IPV6_SRC: u16 = 31;
pub const TCA_FLOWER_KEY_ENC_IPV6_SRC_MASK: u16 = 32;
pub const TCA_FLOWER_KEY_ENC_IPV6_DST: u16 = 33;
pub const TCA_FLOWER_KEY_ENC_IPV6_DST_MASK: u16 = 34;
pub const TCA_FLOWER_KEY_TCP_SRC_MASK: u16 = 35;
pub const TCA_FLOWER_KEY_TCP_DST_MASK: u16 = 36;
pub const TCA_FLOWER_KEY_UDP_SRC_MASK: u16 = 37;
pub const TCA_FLOWER_KEY_UDP_DST_MASK: u16 = 38;
pub const TCA_FLOWER_KEY_SCTP_SRC_MASK: u16 = 39;
pub const TCA_FLOWER_KEY_SCTP_DST_MASK: u16 = 40;
pub const TCA_FLOWER_KEY_SCTP_SRC: u16 = 41;
pub const TCA_FLOWER_KEY_SCTP_DST: u16 = 42;
pub const TCA_FLOWER_KEY_ENC_UDP_SRC_PORT: u16 = 43;
pub const TCA_FLOWER_KEY_ENC_UDP_SRC_PORT_MASK: u16 = 44;
pub const TCA_FLOWER_KEY_ENC_UDP_DST_PORT: u16 = 45;
pub const TCA_FLOWER_KEY_ENC_UDP_DST_PORT_MASK: u16 = 46;

// TCA_FLOWER_FLAGS bits
pub const TCA_CLS_FLAGS_SKIP_HW: u32 = 1 << 0;
pub const TCA_CLS_FLAGS_SKIP_SW: u32 = 1 << 1;

// Generic action attributes
pub const TCA_ACT_KIND: u16 = 1;
pub const TCA_ACT_OPTIONS: u16 = 2;
pub const TCA_ACT_STATS: u16 = 4;
pub const TCA_ACT_COOKIE: u16 = 6;

pub const TCA_STATS_BASIC: u16 = 1;

// Verdicts
pub const TC_ACT_SHOT: i32 = 2;
pub const TC_ACT_STOLEN: i32 = 4;
pub const TC_ACT_PIPE: i32 = 3;

/// Size of `struct tc_gen`, the common prefix of every action's parameters.
pub const TC_GEN_LEN: usize = 20;

pub const ACT_KIND_GACT: &str = "gact";
pub const TCA_GACT_PARMS: u16 = 2;

pub const ACT_KIND_MIRRED: &str = "mirred";
pub const TCA_MIRRED_PARMS: u16 = 2;
pub const TCA_EGRESS_REDIR: i32 = 1;

pub const ACT_KIND_VLAN: &str = "vlan";
pub const TCA_VLAN_PARMS: u16 = 2;
pub const TCA_VLAN_PUSH_VLAN_ID: u16 = 3;
pub const TCA_VLAN_PUSH_VLAN_PROTOCOL: u16 = 4;
pub const TCA_VLAN_PUSH_VLAN_PRIORITY: u16 = 6;
pub const TCA_VLAN_ACT_POP: i32 = 1;
pub const TCA_VLAN_ACT_PUSH: i32 = 2;

pub const ACT_KIND_TUNNEL_KEY: &str = "tunnel_key";
pub const TCA_TUNNEL_KEY_PARMS: u16 = 2;
pub const TCA_TUNNEL_KEY_ENC_IPV4_SRC: u16 = 3;
pub const TCA_TUNNEL_KEY_ENC_IPV4_DST: u16 = 4;
pub const TCA_TUNNEL_KEY_ENC_IPV6_SRC: u16 = 5;
pub const TCA_TUNNEL_KEY_ENC_IPV6_DST: u16 = 6;
pub const TCA_TUNNEL_KEY_ENC_KEY_ID: u16 = 7;
pub const TCA_TUNNEL_KEY_ENC_DST_PORT: u16 = 9;
pub const TCA_TUNNEL_KEY_ACT_SET: i32 = 1;
pub const TCA_TUNNEL_KEY_ACT_RELEASE: i32 = 2;
