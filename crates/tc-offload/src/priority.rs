//! Priority allocator.
//!
//! Every distinct `(mask, protocol)` shape gets its own classifier priority,
//! handed out once and kept for the life of the process. Rules whose masks
//! differ never share a priority, so the classifier never has to order
//! overlapping wildcards on its own.

use crate::error::{OffloadError, OffloadResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use tc_flower::FlowerKey;
use tracing::debug;

/// First priority handed out.
pub const FIRST_PRIORITY: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Signature {
    mask: FlowerKey,
    protocol: u16,
}

#[derive(Debug)]
struct State {
    by_signature: HashMap<Signature, u16>,
    next: Option<u16>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            by_signature: HashMap::new(),
            next: Some(FIRST_PRIORITY),
        }
    }
}

/// Memoizing `(mask, protocol) -> priority` table. Starts empty, never
/// evicts.
#[derive(Debug, Default)]
pub struct PriorityAllocator {
    state: Mutex<State>,
}

impl PriorityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the priority for this mask shape, allocating one on first
    /// sight. Fails once the priority space is used up.
    pub fn priority_for(&self, mask: &FlowerKey, protocol: u16) -> OffloadResult<u16> {
        let signature = Signature {
            mask: *mask,
            protocol,
        };

        let mut state = self.state.lock();
        if let Some(prio) = state.by_signature.get(&signature) {
            return Ok(*prio);
        }

        let prio = state
            .next
            .ok_or_else(|| OffloadError::unsupported("classifier priority space exhausted"))?;
        state.next = prio.checked_add(1);
        state.by_signature.insert(signature, prio);
        debug!(prio, protocol, "allocated priority for new mask");
        Ok(prio)
    }

    /// Number of distinct mask shapes seen.
    pub fn len(&self) -> usize {
        self.state.lock().by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    fn mask_dst(prefix: Ipv4Addr) -> FlowerKey {
        FlowerKey {
            eth_type: 0xffff,
            ipv4_dst: prefix,
            ..Default::default()
        }
    }

    #[test]
    fn test_equal_masks_share_priority() {
        let alloc = PriorityAllocator::new();
        let m = mask_dst(Ipv4Addr::new(255, 255, 255, 255));

        assert_eq!(alloc.priority_for(&m, 0x0800).unwrap(), 1);
        assert_eq!(alloc.priority_for(&m, 0x0800).unwrap(), 1);
        assert_eq!(alloc.len(), 1);
    }

    #[test]
    fn test_superset_mask_gets_new_priority() {
        let alloc = PriorityAllocator::new();
        let host = mask_dst(Ipv4Addr::new(255, 255, 255, 255));
        let subnet = mask_dst(Ipv4Addr::new(255, 255, 255, 0));

        assert_eq!(alloc.priority_for(&host, 0x0800).unwrap(), 1);
        assert_eq!(alloc.priority_for(&subnet, 0x0800).unwrap(), 2);
        assert_eq!(alloc.priority_for(&host, 0x0800).unwrap(), 1);
    }

    #[test]
    fn test_protocol_is_part_of_signature() {
        let alloc = PriorityAllocator::new();
        let m = FlowerKey::default();

        let a = alloc.priority_for(&m, 0x0800).unwrap();
        let b = alloc.priority_for(&m, 0x86dd).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_exhaustion_is_unsupported() {
        let alloc = PriorityAllocator::new();
        alloc.state.lock().next = Some(u16::MAX);

        assert_eq!(alloc.priority_for(&FlowerKey::default(), 1).unwrap(), u16::MAX);
        let err = alloc.priority_for(&FlowerKey::default(), 2).unwrap_err();
        assert!(matches!(err, OffloadError::Unsupported { .. }));
        // known shapes still resolve
        assert_eq!(alloc.priority_for(&FlowerKey::default(), 1).unwrap(), u16::MAX);
    }
}
