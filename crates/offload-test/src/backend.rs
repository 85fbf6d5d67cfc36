//! In-memory [`ClassifierBackend`].
//!
//! Entries are kept as encoded `TCA_OPTIONS` bytes and decoded on every
//! read, so everything that goes through the fake also goes through the
//! flower codec.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tc_flower::codec::{decode_options, encode_options_bytes};
use tc_flower::{ClassifierBackend, DumpHandle, FlowerStats, TcError, TcFlower, TcOp, TcResult};
use tracing::debug;

/// One request seen by the fake, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Install { ifindex: i32, prio: u16, handle: u32 },
    Delete { ifindex: i32, prio: u16, handle: u32 },
    Get { ifindex: i32, prio: u16, handle: u32 },
    DumpStart { ifindex: i32 },
    DumpDone { ifindex: i32 },
    Flush { ifindex: i32 },
}

type EntryKey = (i32, u16, u32);

#[derive(Debug, Clone)]
struct Stored {
    protocol: u16,
    options: Vec<u8>,
}

#[derive(Debug)]
struct State {
    entries: BTreeMap<EntryKey, Stored>,
    /// Next automatic handle per `(ifindex, prio)`, as the kernel numbers them.
    next_handles: HashMap<(i32, u16), u32>,
    calls: Vec<Call>,
    fail_next: HashMap<TcOp, VecDeque<i32>>,
    fail_always: HashMap<TcOp, i32>,
    keep_cookies: bool,
}

impl State {
    fn allocate_handle(&mut self, ifindex: i32, prio: u16) -> u32 {
        let next = self.next_handles.entry((ifindex, prio)).or_insert(1);
        let handle = *next;
        *next += 1;
        handle
    }

    fn injected_failure(&mut self, op: TcOp) -> TcResult<()> {
        if let Some(errno) = self.fail_next.get_mut(&op).and_then(|q| q.pop_front()) {
            return Err(TcError::kernel(op, errno));
        }
        if let Some(errno) = self.fail_always.get(&op) {
            return Err(TcError::kernel(op, *errno));
        }
        Ok(())
    }

    fn decode(&self, key: EntryKey) -> TcResult<TcFlower> {
        let stored = self
            .entries
            .get(&key)
            .ok_or_else(|| TcError::kernel(TcOp::Get, libc::ENOENT))?;
        let mut flower = TcFlower {
            ifindex: key.0,
            prio: key.1,
            handle: key.2,
            protocol: stored.protocol,
            ..Default::default()
        };
        decode_options(&stored.options, &mut flower)?;
        Ok(flower)
    }
}

/// Stateful in-memory flower classifier.
#[derive(Debug)]
pub struct FakeClassifier {
    state: Mutex<State>,
}

impl Default for FakeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClassifier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                entries: BTreeMap::new(),
                next_handles: HashMap::new(),
                calls: Vec::new(),
                fail_next: HashMap::new(),
                fail_always: HashMap::new(),
                keep_cookies: true,
            }),
        }
    }

    /// Makes the next `op` fail with `errno`. Queues up if called again.
    pub fn fail_next(&self, op: TcOp, errno: i32) {
        self.state.lock().fail_next.entry(op).or_default().push_back(errno);
    }

    /// Makes every `op` fail with `errno` until [`clear_failures`](Self::clear_failures).
    pub fn fail_always(&self, op: TcOp, errno: i32) {
        self.state.lock().fail_always.insert(op, errno);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_next.clear();
        state.fail_always.clear();
    }

    /// Models a classifier that does not store action cookies.
    pub fn set_keep_cookies(&self, keep: bool) {
        self.state.lock().keep_cookies = keep;
    }

    /// Overwrites the counters of a stored entry. Returns false if there
    /// is no such entry.
    pub fn set_stats(&self, ifindex: i32, prio: u16, handle: u32, stats: FlowerStats) -> bool {
        let mut state = self.state.lock();
        let key = (ifindex, prio, handle);
        let Ok(mut flower) = state.decode(key) else {
            return false;
        };
        flower.stats = stats;
        if let Some(stored) = state.entries.get_mut(&key) {
            stored.options = encode_options_bytes(&flower);
        }
        true
    }

    /// Places an entry without going through the call log or failure
    /// injection. Returns the handle used.
    pub fn insert_raw(&self, flower: &TcFlower) -> u32 {
        let mut state = self.state.lock();
        let handle = match flower.handle {
            0 => state.allocate_handle(flower.ifindex, flower.prio),
            handle => handle,
        };
        state.entries.insert(
            (flower.ifindex, flower.prio, handle),
            Stored {
                protocol: flower.protocol,
                options: encode_options_bytes(flower),
            },
        );
        handle
    }

    /// Decoded entry at `(ifindex, prio, handle)`.
    pub fn entry(&self, ifindex: i32, prio: u16, handle: u32) -> Option<TcFlower> {
        self.state.lock().decode((ifindex, prio, handle)).ok()
    }

    /// All decoded entries on `ifindex`, ordered by priority then handle.
    pub fn entries(&self, ifindex: i32) -> Vec<TcFlower> {
        let state = self.state.lock();
        state
            .entries
            .keys()
            .filter(|k| k.0 == ifindex)
            .filter_map(|k| state.decode(*k).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of `dump_done` calls received.
    pub fn dump_done_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::DumpDone { .. }))
            .count()
    }
}

impl ClassifierBackend for FakeClassifier {
    fn install_or_replace(&self, ifindex: i32, prio: u16, handle: u32, flower: &TcFlower) -> TcResult<u32> {
        let mut state = self.state.lock();
        state.calls.push(Call::Install { ifindex, prio, handle });
        state.injected_failure(TcOp::Install)?;

        let handle = match handle {
            0 => state.allocate_handle(ifindex, prio),
            handle => handle,
        };

        let mut stored = flower.clone();
        if !state.keep_cookies {
            stored.cookie = None;
        }
        state.entries.insert(
            (ifindex, prio, handle),
            Stored {
                protocol: flower.protocol,
                options: encode_options_bytes(&stored),
            },
        );
        debug!(ifindex, prio, handle, "fake classifier installed entry");
        Ok(handle)
    }

    fn delete(&self, ifindex: i32, prio: u16, handle: u32) -> TcResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Delete { ifindex, prio, handle });
        state.injected_failure(TcOp::Delete)?;

        state
            .entries
            .remove(&(ifindex, prio, handle))
            .map(|_| ())
            .ok_or_else(|| TcError::kernel(TcOp::Delete, libc::ENOENT))
    }

    fn get(&self, ifindex: i32, prio: u16, handle: u32) -> TcResult<TcFlower> {
        let mut state = self.state.lock();
        state.calls.push(Call::Get { ifindex, prio, handle });
        state.injected_failure(TcOp::Get)?;
        state.decode((ifindex, prio, handle))
    }

    fn dump_start(&self, ifindex: i32) -> TcResult<DumpHandle> {
        let mut state = self.state.lock();
        state.calls.push(Call::DumpStart { ifindex });
        state.injected_failure(TcOp::Dump)?;

        let keys: Vec<EntryKey> = state.entries.keys().filter(|k| k.0 == ifindex).copied().collect();
        let snapshot: Vec<TcResult<TcFlower>> = keys.into_iter().map(|k| state.decode(k)).collect();
        Ok(DumpHandle::new(ifindex, Box::new(snapshot.into_iter())))
    }

    fn dump_done(&self, dump: DumpHandle) {
        self.state.lock().calls.push(Call::DumpDone {
            ifindex: dump.ifindex(),
        });
    }

    fn flush(&self, ifindex: i32) -> TcResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Flush { ifindex });
        state.injected_failure(TcOp::Flush)?;
        state.entries.retain(|k, _| k.0 != ifindex);
        Ok(())
    }
}
