//! rtnetlink link messages (`struct ifinfomsg` plus attributes).

use byteorder::{ByteOrder, NativeEndian};
use netlink_packet_core::{
    parse_string, parse_u32, DecodeError, Emitable, NetlinkDeserializable, NetlinkHeader, NetlinkSerializable,
    NLA_F_NESTED,
};
use offload_common::attr::{emit_attrs, iter_attrs};
use offload_common::NlAttr;
use std::collections::BTreeMap;

pub const RTM_NEWLINK: u16 = 16;
pub const RTM_DELLINK: u16 = 17;
pub const RTM_GETLINK: u16 = 18;

/// Size of `struct ifinfomsg`.
pub const IFINFOMSG_LEN: usize = 16;

pub const IFLA_IFNAME: u16 = 3;
pub const IFLA_MTU: u16 = 4;
pub const IFLA_LINKINFO: u16 = 18;

pub const IFLA_INFO_KIND: u16 = 1;
pub const IFLA_INFO_DATA: u16 = 2;

pub const IFLA_VXLAN_LEARNING: u16 = 7;
pub const IFLA_VXLAN_PORT: u16 = 15;
pub const IFLA_VXLAN_UDP_ZERO_CSUM6_RX: u16 = 20;
pub const IFLA_VXLAN_GBP: u16 = 23;
pub const IFLA_VXLAN_COLLECT_METADATA: u16 = 25;

pub const IFLA_GRE_COLLECT_METADATA: u16 = 18;

pub const IFLA_GENEVE_PORT: u16 = 5;
pub const IFLA_GENEVE_COLLECT_METADATA: u16 = 6;
pub const IFLA_GENEVE_UDP_ZERO_CSUM6_RX: u16 = 10;

pub const IFF_UP: u32 = libc::IFF_UP as u32;

/// MTU requested for tunnel links.
pub const TUNNEL_LINK_MTU: u32 = u16::MAX as u32;

/// One link request or reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkMessage {
    pub message_type: u16,
    pub family: u8,
    pub link_type: u16,
    pub index: i32,
    pub flags: u32,
    pub change: u32,
    pub name: Option<String>,
    pub mtu: Option<u32>,
    pub kind: Option<String>,
    /// Serialized attributes nested under `IFLA_INFO_DATA`.
    pub info_data: Option<Vec<u8>>,
}

impl LinkMessage {
    fn named(message_type: u16, name: &str) -> Self {
        Self {
            message_type,
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// RTM_NEWLINK bringing up a link of `kind` named `name`.
    pub fn new_link(name: &str, kind: &str, info_data: &[NlAttr]) -> Self {
        Self {
            flags: IFF_UP,
            change: IFF_UP,
            mtu: Some(TUNNEL_LINK_MTU),
            kind: Some(kind.to_string()),
            info_data: Some(emit_attrs(info_data)),
            ..Self::named(RTM_NEWLINK, name)
        }
    }

    pub fn get_link(name: &str) -> Self {
        Self::named(RTM_GETLINK, name)
    }

    pub fn del_link(name: &str) -> Self {
        Self::named(RTM_DELLINK, name)
    }

    /// The `IFLA_INFO_DATA` attributes keyed by type. Empty if the message
    /// carries no info data.
    pub fn info_attrs(&self) -> Result<BTreeMap<u16, Vec<u8>>, DecodeError> {
        let mut attrs = BTreeMap::new();
        if let Some(data) = &self.info_data {
            for attr in iter_attrs(data) {
                let (kind, value) = attr?;
                attrs.insert(kind, value.to_vec());
            }
        }
        Ok(attrs)
    }

    fn attrs(&self) -> Vec<NlAttr> {
        let mut attrs = Vec::new();
        if let Some(name) = &self.name {
            attrs.push(NlAttr::str(IFLA_IFNAME, name.as_str()));
        }
        if let Some(mtu) = self.mtu {
            attrs.push(NlAttr::U32(IFLA_MTU, mtu));
        }
        if let Some(kind) = &self.kind {
            let mut info = vec![NlAttr::str(IFLA_INFO_KIND, kind.as_str())];
            if let Some(data) = &self.info_data {
                info.push(NlAttr::Bytes(IFLA_INFO_DATA | NLA_F_NESTED, data.clone()));
            }
            attrs.push(NlAttr::Nested(IFLA_LINKINFO, info));
        }
        attrs
    }

    fn parse_link_info(&mut self, value: &[u8]) -> Result<(), DecodeError> {
        for attr in iter_attrs(value) {
            let (kind, value) = attr?;
            match kind {
                IFLA_INFO_KIND => self.kind = Some(parse_string(value)?),
                IFLA_INFO_DATA => self.info_data = Some(value.to_vec()),
                _ => {}
            }
        }
        Ok(())
    }
}

impl NetlinkSerializable for LinkMessage {
    fn message_type(&self) -> u16 {
        self.message_type
    }

    fn buffer_len(&self) -> usize {
        IFINFOMSG_LEN + self.attrs().as_slice().buffer_len()
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.family;
        buffer[1] = 0;
        NativeEndian::write_u16(&mut buffer[2..4], self.link_type);
        NativeEndian::write_i32(&mut buffer[4..8], self.index);
        NativeEndian::write_u32(&mut buffer[8..12], self.flags);
        NativeEndian::write_u32(&mut buffer[12..16], self.change);
        self.attrs().as_slice().emit(&mut buffer[IFINFOMSG_LEN..]);
    }
}

impl NetlinkDeserializable for LinkMessage {
    type Error = DecodeError;

    fn deserialize(header: &NetlinkHeader, payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < IFINFOMSG_LEN {
            return Err(DecodeError::from(format!(
                "ifinfomsg too short: {} bytes",
                payload.len()
            )));
        }

        let mut msg = LinkMessage {
            message_type: header.message_type,
            family: payload[0],
            link_type: NativeEndian::read_u16(&payload[2..4]),
            index: NativeEndian::read_i32(&payload[4..8]),
            flags: NativeEndian::read_u32(&payload[8..12]),
            change: NativeEndian::read_u32(&payload[12..16]),
            ..Default::default()
        };

        for attr in iter_attrs(&payload[IFINFOMSG_LEN..]) {
            let (kind, value) = attr?;
            match kind {
                IFLA_IFNAME => msg.name = Some(parse_string(value)?),
                IFLA_MTU => msg.mtu = Some(parse_u32(value)?),
                IFLA_LINKINFO => msg.parse_link_info(value)?,
                _ => {}
            }
        }
        Ok(msg)
    }
}
