//! [`ClassifierBackend`] over rtnetlink.

use crate::backend::{ClassifierBackend, DumpHandle};
use crate::consts::RTM_NEWTFILTER;
use crate::error::{TcError, TcOp, TcResult};
use crate::flower::TcFlower;
use crate::message::TcMessage;
use netlink_packet_core::{NLM_F_CREATE, NLM_F_ECHO};
use offload_common::NlSocket;
use parking_lot::Mutex;
use tracing::{debug, instrument};

/// Talks to the kernel's tc subsystem.
///
/// Requests are serialized over one socket. Each dump opens its own socket
/// so a lazily consumed dump never blocks other requests.
pub struct NetlinkClassifier {
    socket: Mutex<NlSocket>,
}

impl NetlinkClassifier {
    pub fn new() -> TcResult<Self> {
        let socket = NlSocket::route().map_err(|e| TcError::from_netlink(TcOp::Install, e))?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    fn transact(&self, op: TcOp, msg: TcMessage, flags: u16) -> TcResult<Vec<TcMessage>> {
        self.socket
            .lock()
            .transact(msg, flags)
            .map_err(|e| TcError::from_netlink(op, e))
    }
}

impl ClassifierBackend for NetlinkClassifier {
    #[instrument(skip(self, flower), level = "debug")]
    fn install_or_replace(&self, ifindex: i32, prio: u16, handle: u32, flower: &TcFlower) -> TcResult<u32> {
        let request = TcFlower {
            ifindex,
            prio,
            handle,
            ..flower.clone()
        };
        let replies = self.transact(
            TcOp::Install,
            TcMessage::new_filter(&request),
            NLM_F_CREATE | NLM_F_ECHO,
        )?;

        let echoed = replies
            .iter()
            .find(|m| m.message_type == RTM_NEWTFILTER)
            .ok_or_else(|| TcError::Decode("install not echoed".into()))?;

        debug!(handle = echoed.handle, "filter installed");
        Ok(echoed.handle)
    }

    #[instrument(skip(self), level = "debug")]
    fn delete(&self, ifindex: i32, prio: u16, handle: u32) -> TcResult<()> {
        self.transact(TcOp::Delete, TcMessage::del_filter(ifindex, prio, handle), 0)?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn get(&self, ifindex: i32, prio: u16, handle: u32) -> TcResult<TcFlower> {
        let replies = self.transact(TcOp::Get, TcMessage::get_filter(ifindex, prio, handle), NLM_F_ECHO)?;
        replies
            .first()
            .ok_or(TcError::NotFound)?
            .to_flower()
    }

    #[instrument(skip(self), level = "debug")]
    fn dump_start(&self, ifindex: i32) -> TcResult<DumpHandle> {
        let dump = NlSocket::route()
            .and_then(|socket| socket.into_dump(TcMessage::dump_filters(ifindex)))
            .map_err(|e| TcError::from_netlink(TcOp::Dump, e))?;

        let stream = dump.map(|reply| {
            reply
                .map_err(|e| TcError::from_netlink(TcOp::Dump, e))
                .and_then(|msg| msg.to_flower())
        });
        Ok(DumpHandle::new(ifindex, Box::new(stream)))
    }

    #[instrument(skip(self), level = "debug")]
    fn flush(&self, ifindex: i32) -> TcResult<()> {
        self.transact(TcOp::Flush, TcMessage::flush(ifindex), 0)?;
        Ok(())
    }
}
