//! Typed netlink attributes.
//!
//! Requests are built as a tree of [`NlAttr`] values and emitted through
//! `netlink_packet_core`'s `Emitable` machinery. Replies are walked with
//! [`iter_attrs`], which yields `(kind, value)` pairs with the nested and
//! byte-order flags already stripped from `kind`.

use netlink_packet_core::{DecodeError, Emitable, Nla, NlasIterator, NLA_F_NESTED, NLA_HEADER_SIZE};

/// One netlink attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NlAttr {
    /// Zero-length attribute whose presence is the value.
    Flag(u16),
    U8(u16, u8),
    /// Host byte order.
    U16(u16, u16),
    /// Network byte order.
    Be16(u16, u16),
    /// Host byte order.
    U32(u16, u32),
    /// Network byte order.
    Be32(u16, u32),
    /// Host byte order.
    U64(u16, u64),
    /// NUL-terminated string.
    Str(u16, String),
    Bytes(u16, Vec<u8>),
    Nested(u16, Vec<NlAttr>),
}

impl NlAttr {
    pub fn str(kind: u16, value: impl Into<String>) -> Self {
        NlAttr::Str(kind, value.into())
    }

    pub fn bytes(kind: u16, value: impl AsRef<[u8]>) -> Self {
        NlAttr::Bytes(kind, value.as_ref().to_vec())
    }
}

impl Nla for NlAttr {
    fn value_len(&self) -> usize {
        match self {
            NlAttr::Flag(_) => 0,
            NlAttr::U8(..) => 1,
            NlAttr::U16(..) | NlAttr::Be16(..) => 2,
            NlAttr::U32(..) | NlAttr::Be32(..) => 4,
            NlAttr::U64(..) => 8,
            NlAttr::Str(_, s) => s.len() + 1,
            NlAttr::Bytes(_, b) => b.len(),
            NlAttr::Nested(_, attrs) => attrs.as_slice().buffer_len(),
        }
    }

    fn kind(&self) -> u16 {
        match self {
            NlAttr::Flag(k)
            | NlAttr::U8(k, _)
            | NlAttr::U16(k, _)
            | NlAttr::Be16(k, _)
            | NlAttr::U32(k, _)
            | NlAttr::Be32(k, _)
            | NlAttr::U64(k, _)
            | NlAttr::Str(k, _)
            | NlAttr::Bytes(k, _)
            | NlAttr::Nested(k, _) => *k,
        }
    }

    fn is_nested(&self) -> bool {
        matches!(self, NlAttr::Nested(..)) || self.kind() & NLA_F_NESTED != 0
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            NlAttr::Flag(_) => {}
            NlAttr::U8(_, v) => buffer[0] = *v,
            NlAttr::U16(_, v) => buffer[..2].copy_from_slice(&v.to_ne_bytes()),
            NlAttr::Be16(_, v) => buffer[..2].copy_from_slice(&v.to_be_bytes()),
            NlAttr::U32(_, v) => buffer[..4].copy_from_slice(&v.to_ne_bytes()),
            NlAttr::Be32(_, v) => buffer[..4].copy_from_slice(&v.to_be_bytes()),
            NlAttr::U64(_, v) => buffer[..8].copy_from_slice(&v.to_ne_bytes()),
            NlAttr::Str(_, s) => {
                buffer[..s.len()].copy_from_slice(s.as_bytes());
                buffer[s.len()] = 0;
            }
            NlAttr::Bytes(_, b) => buffer[..b.len()].copy_from_slice(b),
            NlAttr::Nested(_, attrs) => attrs.as_slice().emit(buffer),
        }
    }
}

/// Serializes a list of attributes into a freshly allocated buffer.
pub fn emit_attrs(attrs: &[NlAttr]) -> Vec<u8> {
    let mut buf = vec![0u8; attrs.buffer_len()];
    attrs.emit(&mut buf);
    buf
}

/// Walks the attributes in `bytes`, yielding `(kind, value)`.
pub fn iter_attrs(bytes: &[u8]) -> impl Iterator<Item = Result<(u16, &[u8]), DecodeError>> {
    NlasIterator::new(bytes).map(|nla| {
        let nla = nla?;
        let kind = nla.kind();
        let len = usize::from(nla.length());
        let raw: &[u8] = nla.into_inner();
        Ok((kind, &raw[NLA_HEADER_SIZE..len]))
    })
}
