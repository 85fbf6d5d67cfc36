//! Match/action translation between the switch's generic flow language and
//! flower entries.
//!
//! Encoding is strict about what flower can say precisely (VLAN masks,
//! EtherType and protocol masks, tunnel ids, action shapes) and returns
//! `Unsupported` for the rest, except for the fixed set of fields in
//! [`degraded`], which are dropped from the mask and reported. Decoding is
//! the inverse and also works out how the entry's UFID can be recovered.

mod decode;
pub mod degraded;
mod encode;

pub use decode::{DecodedFlow, FlowIdentity};
pub use degraded::{unsupported_fields, IgnoredField};
pub use encode::{EncodeContext, Encoded};

use crate::error::OffloadResult;
use crate::port::PortResolver;
use flow_types::{Action, Match, Ufid};
use std::sync::Arc;
use tc_flower::TcFlower;

/// Stateless translator bound to a port resolver.
#[derive(Clone)]
pub struct Translator {
    ports: Arc<dyn PortResolver>,
}

impl Translator {
    pub fn new(ports: Arc<dyn PortResolver>) -> Self {
        Self { ports }
    }

    /// Builds the flower entry for `m` and `actions`, with `ufid` as its
    /// cookie. Placement (ifindex, priority, handle) is left to the caller.
    pub fn encode(&self, m: &Match, actions: &[Action], ufid: Ufid, ctx: &EncodeContext) -> OffloadResult<Encoded> {
        encode::encode(self.ports.as_ref(), m, actions, ufid, ctx)
    }

    /// Turns a flower entry back into a match, actions and counters. The
    /// match's `in_port` is left wildcarded.
    pub fn decode(&self, flower: &TcFlower) -> OffloadResult<DecodedFlow> {
        decode::decode(self.ports.as_ref(), flower)
    }

    pub fn ports(&self) -> &dyn PortResolver {
        self.ports.as_ref()
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator").finish_non_exhaustive()
    }
}
