//! Vport types and their link naming.

use crate::error::VportError;
use std::fmt;
use std::str::FromStr;

/// Default UDP destination port for vxlan links.
pub const VXLAN_DST_PORT: u16 = 4789;

/// Default UDP destination port for geneve links.
pub const GENEVE_DST_PORT: u16 = 6081;

/// Switch port types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VportType {
    Netdev,
    Internal,
    Gre,
    Vxlan,
    Geneve,
    Lisp,
    Stt,
}

impl VportType {
    /// rtnetlink `IFLA_INFO_KIND`, for the types provisioned as links.
    pub fn link_kind(&self) -> Option<&'static str> {
        match self {
            VportType::Vxlan => Some("vxlan"),
            VportType::Gre => Some("gretap"),
            VportType::Geneve => Some("geneve"),
            VportType::Netdev | VportType::Internal | VportType::Lisp | VportType::Stt => None,
        }
    }

    /// UDP destination port used when none is configured.
    pub fn default_dst_port(&self) -> Option<u16> {
        match self {
            VportType::Vxlan => Some(VXLAN_DST_PORT),
            VportType::Geneve => Some(GENEVE_DST_PORT),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VportType::Netdev => "netdev",
            VportType::Internal => "internal",
            VportType::Gre => "gre",
            VportType::Vxlan => "vxlan",
            VportType::Geneve => "geneve",
            VportType::Lisp => "lisp",
            VportType::Stt => "stt",
        }
    }
}

impl fmt::Display for VportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VportType {
    type Err = VportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "netdev" | "system" => Ok(VportType::Netdev),
            "internal" => Ok(VportType::Internal),
            "gre" => Ok(VportType::Gre),
            "vxlan" => Ok(VportType::Vxlan),
            "geneve" => Ok(VportType::Geneve),
            "lisp" => Ok(VportType::Lisp),
            "stt" => Ok(VportType::Stt),
            other => Err(VportError::UnknownType(other.to_string())),
        }
    }
}

/// Per-port tunnel settings that end up in the link's info data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunnelConfig {
    pub dst_port: u16,
    /// vxlan group based policy extension.
    pub gbp: bool,
}

/// A switch port that may be backed by a tunnel link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vport {
    pub name: String,
    pub vport_type: VportType,
    pub tunnel: TunnelConfig,
}

impl Vport {
    /// A port of `vport_type` with the type's default destination port.
    pub fn new(name: impl Into<String>, vport_type: VportType) -> Self {
        Self {
            name: name.into(),
            vport_type,
            tunnel: TunnelConfig {
                dst_port: vport_type.default_dst_port().unwrap_or(0),
                gbp: false,
            },
        }
    }

    pub fn with_dst_port(mut self, dst_port: u16) -> Self {
        self.tunnel.dst_port = dst_port;
        self
    }

    pub fn with_gbp(mut self, gbp: bool) -> Self {
        self.tunnel.gbp = gbp;
        self
    }

    /// Name of the kernel link that carries this port's traffic. UDP
    /// tunnels share one link per destination port.
    pub fn dpif_port_name(&self) -> String {
        match self.vport_type {
            VportType::Vxlan => format!("vxlan_sys_{}", self.tunnel.dst_port),
            VportType::Geneve => format!("genev_sys_{}", self.tunnel.dst_port),
            VportType::Lisp => format!("lisp_sys_{}", self.tunnel.dst_port),
            VportType::Stt => format!("stt_sys_{}", self.tunnel.dst_port),
            VportType::Gre => "gre_sys".to_string(),
            VportType::Netdev | VportType::Internal => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_link_kinds() {
        assert_eq!(VportType::Vxlan.link_kind(), Some("vxlan"));
        assert_eq!(VportType::Gre.link_kind(), Some("gretap"));
        assert_eq!(VportType::Geneve.link_kind(), Some("geneve"));
        assert_eq!(VportType::Stt.link_kind(), None);
        assert_eq!(VportType::Internal.link_kind(), None);
    }

    #[test]
    fn test_dpif_port_names() {
        assert_eq!(Vport::new("vx0", VportType::Vxlan).dpif_port_name(), "vxlan_sys_4789");
        assert_eq!(
            Vport::new("vx1", VportType::Vxlan).with_dst_port(8472).dpif_port_name(),
            "vxlan_sys_8472"
        );
        assert_eq!(Vport::new("gnv0", VportType::Geneve).dpif_port_name(), "genev_sys_6081");
        assert_eq!(Vport::new("gre0", VportType::Gre).dpif_port_name(), "gre_sys");
        assert_eq!(Vport::new("eth0", VportType::Netdev).dpif_port_name(), "eth0");
    }

    #[test]
    fn test_parse_type() {
        assert_eq!("geneve".parse::<VportType>().unwrap(), VportType::Geneve);
        assert_eq!("system".parse::<VportType>().unwrap(), VportType::Netdev);
        assert!("ipip".parse::<VportType>().is_err());
        assert_eq!(VportType::Gre.to_string(), "gre");
    }
}
