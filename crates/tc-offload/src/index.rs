//! Identifier index: UFID <-> (priority, handle, ifindex).
//!
//! Both directions live behind one lock so no reader can ever see one map
//! agree that a mapping exists while the other disagrees. The lock is held
//! only for hash access; device references released by a replace or remove
//! are dropped after it is let go.

use crate::device::DeviceHandle;
use flow_types::Ufid;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Classifier-side identity of an installed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcId {
    pub prio: u16,
    pub handle: u32,
    pub ifindex: i32,
}

impl TcId {
    pub fn new(prio: u16, handle: u32, ifindex: i32) -> Self {
        Self { prio, handle, ifindex }
    }
}

/// What a UFID lookup returns. Carries its own device reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub prio: u16,
    pub handle: u32,
    pub device: DeviceHandle,
}

impl IndexEntry {
    pub fn tc_id(&self) -> TcId {
        TcId::new(self.prio, self.handle, self.device.ifindex())
    }
}

#[derive(Debug)]
struct Record {
    id: TcId,
    device: DeviceHandle,
}

#[derive(Debug, Default)]
struct Maps {
    by_ufid: HashMap<Ufid, Record>,
    by_tc: HashMap<TcId, Ufid>,
}

impl Maps {
    fn take(&mut self, ufid: &Ufid) -> Option<Record> {
        let record = self.by_ufid.remove(ufid)?;
        self.by_tc.remove(&record.id);
        Some(record)
    }
}

/// Bidirectional UFID/classifier-identity index.
#[derive(Debug, Default)]
pub struct IdentifierIndex {
    maps: Mutex<Maps>,
}

impl IdentifierIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any mapping for `ufid` with `(prio, handle, device)`.
    ///
    /// The record takes its own reference on `device`. A different UFID
    /// that was mapped to the same classifier identity loses its mapping.
    pub fn upsert(&self, ufid: Ufid, prio: u16, handle: u32, device: &DeviceHandle) {
        let id = TcId::new(prio, handle, device.ifindex());
        let record = Record {
            id,
            device: device.clone(),
        };

        let (old, displaced) = {
            let mut maps = self.maps.lock();
            let old = maps.take(&ufid);
            let displaced = match maps.by_tc.get(&id).copied() {
                Some(other) => maps.take(&other).map(|r| (other, r)),
                None => None,
            };
            maps.by_tc.insert(id, ufid);
            maps.by_ufid.insert(ufid, record);
            (old, displaced)
        };

        if let Some((other, _)) = &displaced {
            debug!(ufid = %ufid, displaced = %other, prio, handle, "classifier identity reassigned");
        }
        drop(old);
        drop(displaced);
    }

    /// Removes the mapping for `ufid`. Returns whether one existed.
    pub fn remove(&self, ufid: &Ufid) -> bool {
        let record = self.maps.lock().take(ufid);
        record.is_some()
    }

    pub fn lookup_by_ufid(&self, ufid: &Ufid) -> Option<IndexEntry> {
        let maps = self.maps.lock();
        maps.by_ufid.get(ufid).map(|r| IndexEntry {
            prio: r.id.prio,
            handle: r.id.handle,
            device: r.device.clone(),
        })
    }

    pub fn lookup_by_tc(&self, prio: u16, handle: u32, ifindex: i32) -> Option<Ufid> {
        self.maps
            .lock()
            .by_tc
            .get(&TcId::new(prio, handle, ifindex))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.maps.lock().by_ufid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every mapping, for diagnostics.
    pub fn snapshot(&self) -> Vec<(Ufid, TcId)> {
        self.maps
            .lock()
            .by_ufid
            .iter()
            .map(|(ufid, r)| (*ufid, r.id))
            .collect()
    }

    /// Checks that both directions describe the same set of mappings.
    pub fn is_consistent(&self) -> bool {
        let maps = self.maps.lock();
        maps.by_ufid.len() == maps.by_tc.len()
            && maps
                .by_ufid
                .iter()
                .all(|(ufid, r)| maps.by_tc.get(&r.id) == Some(ufid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_upsert_and_lookup() {
        let registry = DeviceRegistry::new();
        let eth0 = registry.open("eth0", 2, None);
        let index = IdentifierIndex::new();
        let u1 = Ufid::new(1);

        index.upsert(u1, 1, 0x10, &eth0);

        let entry = index.lookup_by_ufid(&u1).unwrap();
        assert_eq!((entry.prio, entry.handle), (1, 0x10));
        assert_eq!(entry.device.ifindex(), 2);
        assert_eq!(index.lookup_by_tc(1, 0x10, 2), Some(u1));
        assert_eq!(index.lookup_by_tc(1, 0x10, 3), None);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_replace_removes_old_reverse_entry() {
        let registry = DeviceRegistry::new();
        let eth0 = registry.open("eth0", 2, None);
        let index = IdentifierIndex::new();
        let u1 = Ufid::new(1);

        index.upsert(u1, 1, 0x10, &eth0);
        index.upsert(u1, 1, 0x11, &eth0);

        assert_eq!(index.lookup_by_tc(1, 0x10, 2), None);
        assert_eq!(index.lookup_by_tc(1, 0x11, 2), Some(u1));
        assert_eq!(index.len(), 1);
        // caller's handle + one record
        assert_eq!(registry.ref_count(2), Some(2));
    }

    #[test]
    fn test_identity_collision_displaces_other_ufid() {
        let registry = DeviceRegistry::new();
        let eth0 = registry.open("eth0", 2, None);
        let index = IdentifierIndex::new();

        index.upsert(Ufid::new(1), 1, 0x10, &eth0);
        index.upsert(Ufid::new(2), 1, 0x10, &eth0);

        assert!(index.lookup_by_ufid(&Ufid::new(1)).is_none());
        assert_eq!(index.lookup_by_tc(1, 0x10, 2), Some(Ufid::new(2)));
        assert!(index.is_consistent());
        assert_eq!(registry.ref_count(2), Some(2));
    }

    #[test]
    fn test_remove_releases_device() {
        let registry = DeviceRegistry::new();
        let eth0 = registry.open("eth0", 2, None);
        let index = IdentifierIndex::new();
        let u1 = Ufid::new(1);

        index.upsert(u1, 1, 0x10, &eth0);
        assert_eq!(registry.ref_count(2), Some(2));

        assert!(index.remove(&u1));
        assert!(!index.remove(&u1));
        assert_eq!(registry.ref_count(2), Some(1));
        assert!(index.lookup_by_ufid(&u1).is_none());
        assert_eq!(index.lookup_by_tc(1, 0x10, 2), None);
    }

    #[test]
    fn test_lookup_takes_reference() {
        let registry = DeviceRegistry::new();
        let index = IdentifierIndex::new();
        {
            let eth0 = registry.open("eth0", 2, None);
            index.upsert(Ufid::new(1), 1, 1, &eth0);
        }
        let entry = index.lookup_by_ufid(&Ufid::new(1)).unwrap();
        assert_eq!(registry.ref_count(2), Some(2));

        index.remove(&Ufid::new(1));
        // the looked-up handle keeps the device alive
        assert_eq!(registry.ref_count(2), Some(1));
        drop(entry);
        assert_eq!(registry.ref_count(2), None);
    }

    #[test]
    fn test_bijection_under_interleaving() {
        let registry = DeviceRegistry::new();
        let devs = [registry.open("eth0", 2, None), registry.open("eth1", 3, None)];
        let index = IdentifierIndex::new();

        for step in 0u32..200 {
            let ufid = Ufid::new(u128::from(step % 17));
            let dev = &devs[(step % 2) as usize];
            if step % 5 == 0 {
                index.remove(&ufid);
            } else {
                index.upsert(ufid, (step % 3) as u16 + 1, step % 11, dev);
            }
            assert!(index.is_consistent());
        }

        for (ufid, id) in index.snapshot() {
            assert_eq!(index.lookup_by_tc(id.prio, id.handle, id.ifindex), Some(ufid));
            assert_eq!(index.lookup_by_ufid(&ufid).unwrap().tc_id(), id);
        }
    }
}
