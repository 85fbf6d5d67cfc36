//! The classifier backend contract.

use crate::error::TcResult;
use crate::flower::TcFlower;
use std::fmt;

/// Entry stream type carried by a [`DumpHandle`].
pub type DumpStream = Box<dyn Iterator<Item = TcResult<TcFlower>> + Send>;

/// An in-progress dump of one interface.
///
/// The handle owns the backend's cursor. Entries are produced lazily by
/// [`ClassifierBackend::dump_next`]; a dump cannot be resumed once
/// finished, only restarted with a new `dump_start`.
pub struct DumpHandle {
    ifindex: i32,
    stream: DumpStream,
}

impl DumpHandle {
    pub fn new(ifindex: i32, stream: DumpStream) -> Self {
        Self { ifindex, stream }
    }

    /// A dump that yields nothing.
    pub fn empty(ifindex: i32) -> Self {
        Self::new(ifindex, Box::new(std::iter::empty()))
    }

    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }

    /// Pulls the next entry from the backend cursor.
    pub fn next_entry(&mut self) -> Option<TcResult<TcFlower>> {
        self.stream.next()
    }
}

impl fmt::Debug for DumpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpHandle")
            .field("ifindex", &self.ifindex)
            .finish_non_exhaustive()
    }
}

/// A kernel-resident packet classifier addressed by
/// `(ifindex, priority, handle)`.
///
/// Every call is blocking and is expected to apply its own timeout.
pub trait ClassifierBackend: Send + Sync {
    /// Installs `flower` at `(ifindex, prio)`, replacing the entry at
    /// `handle` when it is nonzero. The identity fields inside `flower` are
    /// ignored. Returns the handle the classifier actually used.
    fn install_or_replace(&self, ifindex: i32, prio: u16, handle: u32, flower: &TcFlower) -> TcResult<u32>;

    fn delete(&self, ifindex: i32, prio: u16, handle: u32) -> TcResult<()>;

    fn get(&self, ifindex: i32, prio: u16, handle: u32) -> TcResult<TcFlower>;

    fn dump_start(&self, ifindex: i32) -> TcResult<DumpHandle>;

    /// Returns `None` once the dump is exhausted.
    fn dump_next(&self, dump: &mut DumpHandle) -> Option<TcResult<TcFlower>> {
        dump.next_entry()
    }

    /// Releases the cursor. Called exactly once per successful `dump_start`.
    fn dump_done(&self, dump: DumpHandle) {
        drop(dump);
    }

    /// Removes every classifier entry on `ifindex`.
    fn flush(&self, ifindex: i32) -> TcResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_handle_yields_stream() {
        let entries = vec![
            Ok(TcFlower {
                prio: 1,
                ..Default::default()
            }),
            Ok(TcFlower {
                prio: 2,
                ..Default::default()
            }),
        ];
        let mut dump = DumpHandle::new(3, Box::new(entries.into_iter()));

        assert_eq!(dump.ifindex(), 3);
        assert_eq!(dump.next_entry().unwrap().unwrap().prio, 1);
        assert_eq!(dump.next_entry().unwrap().unwrap().prio, 2);
        assert!(dump.next_entry().is_none());
        assert!(DumpHandle::empty(3).next_entry().is_none());
    }
}
