//! Datapath actions attached to a flow.

use crate::OdpPort;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// 802.1Q tag to push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PushVlan {
    pub vid: u16,
    pub pcp: u8,
}

/// Tunnel metadata to attach before output to a tunnel port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TunnelSet {
    pub id: u64,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub ipv6_src: Option<Ipv6Addr>,
    pub ipv6_dst: Option<Ipv6Addr>,
    pub tp_src: u16,
    pub tp_dst: u16,
}

/// A single datapath action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Output(OdpPort),
    PushVlan(PushVlan),
    PopVlan,
    SetTunnel(TunnelSet),
    /// A set on something other than tunnel metadata, named by field.
    SetField(String),
    /// Any other datapath action (`recirc`, `ct`, `sample`...).
    Other(String),
}

impl Action {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &str {
        match self {
            Action::Output(_) => "output",
            Action::PushVlan(_) => "push_vlan",
            Action::PopVlan => "pop_vlan",
            Action::SetTunnel(_) => "set(tunnel)",
            Action::SetField(_) => "set",
            Action::Other(name) => name,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Output(port) => write!(f, "output:{}", port),
            Action::PushVlan(v) => write!(f, "push_vlan(vid={},pcp={})", v.vid, v.pcp),
            Action::PopVlan => write!(f, "pop_vlan"),
            Action::SetTunnel(t) => write!(f, "set(tunnel(tun_id={:#x},tp_dst={}))", t.id, t.tp_dst),
            Action::SetField(field) => write!(f, "set({})", field),
            Action::Other(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(Action::Output(OdpPort::new(7)).to_string(), "output:7");
        assert_eq!(
            Action::PushVlan(PushVlan { vid: 10, pcp: 2 }).to_string(),
            "push_vlan(vid=10,pcp=2)"
        );
        assert_eq!(Action::Other("recirc".into()).name(), "recirc");
    }
}
