//! Blocking rtnetlink transport.
//!
//! [`NlSocket`] sends one request at a time and collects the kernel's reply
//! until the final ACK (or `NLMSG_DONE` for dumps). Dumps can also be read
//! lazily through [`NlDump`], which owns its socket so that a slow consumer
//! never interleaves with other requests.

use netlink_packet_core::{
    NetlinkDeserializable, NetlinkHeader, NetlinkMessage, NetlinkPayload, NetlinkSerializable,
    NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST,
};
use netlink_sys::{protocols::NETLINK_ROUTE, Socket, SocketAddr};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors from the netlink transport.
#[derive(Debug, Error)]
pub enum NlError {
    #[error("netlink socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("kernel returned errno {errno}")]
    Kernel { errno: i32 },

    #[error("failed to decode netlink reply: {0}")]
    Decode(String),
}

impl NlError {
    /// Positive errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            NlError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            NlError::Kernel { errno } => *errno,
            NlError::Decode(_) => libc::EPROTO,
        }
    }
}

pub type NlResult<T> = std::result::Result<T, NlError>;

/// One outcome of reading a reply datagram.
enum Reply<M> {
    Message(M),
    Ack,
    Done,
}

/// A blocking NETLINK_ROUTE socket.
pub struct NlSocket {
    socket: Socket,
    sequence: u32,
}

impl NlSocket {
    /// Opens and connects a NETLINK_ROUTE socket.
    pub fn route() -> NlResult<Self> {
        let mut socket = Socket::new(NETLINK_ROUTE)?;
        socket.bind_auto()?;
        socket.connect(&SocketAddr::new(0, 0))?;
        trace!("rtnetlink socket ready");

        Ok(Self {
            socket,
            sequence: 0,
        })
    }

    fn send<M>(&mut self, message: M, flags: u16) -> NlResult<u32>
    where
        M: NetlinkSerializable,
    {
        self.sequence = self.sequence.wrapping_add(1);

        let mut header = NetlinkHeader::default();
        header.flags = flags;
        header.sequence_number = self.sequence;

        let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(message));
        packet.finalize();

        let mut buf = vec![0u8; packet.buffer_len()];
        packet.serialize(&mut buf);

        self.socket.send(&buf, 0)?;
        Ok(self.sequence)
    }

    /// Receives one datagram and splits it into replies for `sequence`.
    fn recv<M>(&self, sequence: u32, out: &mut VecDeque<Reply<M>>) -> NlResult<()>
    where
        M: NetlinkDeserializable,
    {
        let (buf, _) = self.socket.recv_from_full()?;
        let mut offset = 0;

        while offset < buf.len() {
            let msg = NetlinkMessage::<M>::deserialize(&buf[offset..])
                .map_err(|e| NlError::Decode(e.to_string()))?;

            let length = msg.header.length as usize;
            if length == 0 {
                return Err(NlError::Decode("zero-length netlink message".into()));
            }
            offset += length;
            // Align to 4 bytes (netlink alignment requirement)
            offset = (offset + 3) & !3;

            if msg.header.sequence_number != sequence {
                trace!(
                    expected = sequence,
                    got = msg.header.sequence_number,
                    "Ignoring stale netlink reply"
                );
                continue;
            }

            match msg.payload {
                NetlinkPayload::InnerMessage(inner) => out.push_back(Reply::Message(inner)),
                NetlinkPayload::Error(err) => match err.code {
                    None => out.push_back(Reply::Ack),
                    Some(code) => {
                        return Err(NlError::Kernel {
                            errno: -code.get(),
                        })
                    }
                },
                NetlinkPayload::Done(_) => out.push_back(Reply::Done),
                _ => {}
            }
        }
        Ok(())
    }

    /// Sends `message` with `NLM_F_REQUEST | NLM_F_ACK | flags` and returns
    /// every reply message received before the ACK.
    pub fn transact<M>(&mut self, message: M, flags: u16) -> NlResult<Vec<M>>
    where
        M: NetlinkSerializable + NetlinkDeserializable,
    {
        let sequence = self.send(message, NLM_F_REQUEST | NLM_F_ACK | flags)?;
        let mut replies = Vec::new();
        let mut pending = VecDeque::new();

        loop {
            self.recv::<M>(sequence, &mut pending)?;
            while let Some(reply) = pending.pop_front() {
                match reply {
                    Reply::Message(m) => replies.push(m),
                    Reply::Ack | Reply::Done => {
                        debug!(sequence, replies = replies.len(), "netlink transaction complete");
                        return Ok(replies);
                    }
                }
            }
        }
    }

    /// Starts a dump request and hands the socket over to the returned stream.
    pub fn into_dump<M>(mut self, message: M) -> NlResult<NlDump<M>>
    where
        M: NetlinkSerializable + NetlinkDeserializable,
    {
        let sequence = self.send(message, NLM_F_REQUEST | NLM_F_DUMP)?;
        Ok(NlDump {
            socket: self,
            sequence,
            pending: VecDeque::new(),
            done: false,
        })
    }
}

/// A lazily read dump reply.
///
/// Each call to `next` reads more datagrams from the kernel only when the
/// already received messages are exhausted. The stream ends at
/// `NLMSG_DONE` or after the first error.
pub struct NlDump<M> {
    socket: NlSocket,
    sequence: u32,
    pending: VecDeque<Reply<M>>,
    done: bool,
}

impl<M> Iterator for NlDump<M>
where
    M: NetlinkDeserializable,
{
    type Item = NlResult<M>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            match self.pending.pop_front() {
                Some(Reply::Message(m)) => return Some(Ok(m)),
                Some(Reply::Ack) | Some(Reply::Done) => {
                    self.done = true;
                    return None;
                }
                None => {
                    if let Err(e) = self.socket.recv::<M>(self.sequence, &mut self.pending) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kernel_error_errno() {
        let err = NlError::Kernel { errno: libc::EEXIST };
        assert_eq!(err.errno(), libc::EEXIST);
        assert!(err.to_string().contains("17"));
    }

    #[test]
    fn test_decode_error_errno() {
        assert_eq!(NlError::Decode("bad".into()).errno(), libc::EPROTO);
        let io = NlError::from(std::io::Error::from_raw_os_error(libc::EPERM));
        assert_eq!(io.errno(), libc::EPERM);
    }
}
