//! The link request seam.

use crate::error::VportResult;
use crate::message::LinkMessage;
use offload_common::NlSocket;
use parking_lot::Mutex;
use tracing::trace;

/// Carries link requests to the kernel.
pub trait LinkTransport: Send + Sync {
    /// Sends `request` with `NLM_F_REQUEST | NLM_F_ACK | flags` and returns
    /// the replies received before the ACK. A kernel rejection is an error
    /// carrying its errno.
    fn transact(&self, request: LinkMessage, flags: u16) -> VportResult<Vec<LinkMessage>>;
}

/// [`LinkTransport`] over one rtnetlink socket.
pub struct NetlinkLinkTransport {
    socket: Mutex<NlSocket>,
}

impl NetlinkLinkTransport {
    pub fn new() -> VportResult<Self> {
        Ok(Self {
            socket: Mutex::new(NlSocket::route()?),
        })
    }
}

impl LinkTransport for NetlinkLinkTransport {
    fn transact(&self, request: LinkMessage, flags: u16) -> VportResult<Vec<LinkMessage>> {
        trace!(message_type = request.message_type, name = ?request.name, "link request");
        Ok(self.socket.lock().transact(request, flags)?)
    }
}
