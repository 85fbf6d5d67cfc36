//! rtnetlink tc filter messages (`struct tcmsg` plus attributes).

use crate::codec;
use crate::consts::*;
use crate::error::{TcError, TcResult};
use crate::flower::TcFlower;
use byteorder::{ByteOrder, NativeEndian};
use netlink_packet_core::{
    parse_string, DecodeError, Emitable, NetlinkDeserializable, NetlinkHeader, NetlinkSerializable,
    NLA_F_NESTED,
};
use offload_common::attr::iter_attrs;
use offload_common::NlAttr;

/// `tcm_info` for a filter: priority in the upper half, protocol in network
/// order in the lower half.
pub fn make_info(prio: u16, protocol: u16) -> u32 {
    (u32::from(prio) << 16) | u32::from(protocol.to_be())
}

/// Splits `tcm_info` into `(prio, protocol)`. ETH_P_ALL reads back as 0.
pub fn split_info(info: u32) -> (u16, u16) {
    let prio = (info >> 16) as u16;
    let protocol = u16::from_be((info & 0xffff) as u16);
    (prio, if protocol == ETH_P_ALL { 0 } else { protocol })
}

/// One tc filter request or reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TcMessage {
    pub message_type: u16,
    pub family: u8,
    pub ifindex: i32,
    pub handle: u32,
    pub parent: u32,
    pub info: u32,
    pub kind: Option<String>,
    /// Serialized attributes nested under `TCA_OPTIONS`.
    pub options: Option<Vec<u8>>,
}

impl TcMessage {
    fn request(message_type: u16, ifindex: i32, prio: u16, handle: u32, protocol: u16) -> Self {
        Self {
            message_type,
            ifindex,
            handle,
            parent: TC_H_INGRESS,
            info: make_info(prio, protocol),
            ..Default::default()
        }
    }

    /// RTM_NEWTFILTER carrying a complete flower entry.
    pub fn new_filter(flower: &TcFlower) -> Self {
        let protocol = if flower.protocol == 0 { ETH_P_ALL } else { flower.protocol };
        let mut msg = Self::request(RTM_NEWTFILTER, flower.ifindex, flower.prio, flower.handle, protocol);
        msg.kind = Some(FLOWER_KIND.to_string());
        msg.options = Some(codec::encode_options_bytes(flower));
        msg
    }

    pub fn del_filter(ifindex: i32, prio: u16, handle: u32) -> Self {
        Self::request(RTM_DELTFILTER, ifindex, prio, handle, 0)
    }

    pub fn get_filter(ifindex: i32, prio: u16, handle: u32) -> Self {
        Self::request(RTM_GETTFILTER, ifindex, prio, handle, 0)
    }

    /// Dump request for every filter on the ingress hook of `ifindex`.
    pub fn dump_filters(ifindex: i32) -> Self {
        Self::request(RTM_GETTFILTER, ifindex, 0, 0, 0)
    }

    /// Delete request for every filter on the ingress hook of `ifindex`.
    pub fn flush(ifindex: i32) -> Self {
        Self::request(RTM_DELTFILTER, ifindex, 0, 0, 0)
    }

    pub fn prio(&self) -> u16 {
        split_info(self.info).0
    }

    /// Rebuilds the flower entry carried by a reply.
    pub fn to_flower(&self) -> TcResult<TcFlower> {
        match self.kind.as_deref() {
            Some(FLOWER_KIND) => {}
            other => {
                return Err(TcError::Unsupported(format!(
                    "classifier kind {:?}",
                    other.unwrap_or("")
                )))
            }
        }

        let (prio, protocol) = split_info(self.info);
        let mut flower = TcFlower {
            ifindex: self.ifindex,
            prio,
            handle: self.handle,
            protocol,
            ..Default::default()
        };
        if let Some(options) = &self.options {
            codec::decode_options(options, &mut flower)?;
        }
        Ok(flower)
    }

    fn attrs(&self) -> Vec<NlAttr> {
        let mut attrs = Vec::new();
        if let Some(kind) = &self.kind {
            attrs.push(NlAttr::str(TCA_KIND, kind.as_str()));
        }
        if let Some(options) = &self.options {
            attrs.push(NlAttr::Bytes(TCA_OPTIONS | NLA_F_NESTED, options.clone()));
        }
        attrs
    }
}

impl NetlinkSerializable for TcMessage {
    fn message_type(&self) -> u16 {
        self.message_type
    }

    fn buffer_len(&self) -> usize {
        TCMSG_LEN + self.attrs().as_slice().buffer_len()
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.family;
        buffer[1..4].fill(0);
        NativeEndian::write_i32(&mut buffer[4..8], self.ifindex);
        NativeEndian::write_u32(&mut buffer[8..12], self.handle);
        NativeEndian::write_u32(&mut buffer[12..16], self.parent);
        NativeEndian::write_u32(&mut buffer[16..20], self.info);
        self.attrs().as_slice().emit(&mut buffer[TCMSG_LEN..]);
    }
}

impl NetlinkDeserializable for TcMessage {
    type Error = DecodeError;

    fn deserialize(header: &NetlinkHeader, payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < TCMSG_LEN {
            return Err(DecodeError::from(format!(
                "tcmsg too short: {} bytes",
                payload.len()
            )));
        }

        let mut msg = TcMessage {
            message_type: header.message_type,
            family: payload[0],
            ifindex: NativeEndian::read_i32(&payload[4..8]),
            handle: NativeEndian::read_u32(&payload[8..12]),
            parent: NativeEndian::read_u32(&payload[12..16]),
            info: NativeEndian::read_u32(&payload[16..20]),
            ..Default::default()
        };

        for attr in iter_attrs(&payload[TCMSG_LEN..]) {
            let (kind, value) = attr?;
            match kind {
                TCA_KIND => msg.kind = Some(parse_string(value)?),
                TCA_OPTIONS => msg.options = Some(value.to_vec()),
                _ => {}
            }
        }
        Ok(msg)
    }
}
