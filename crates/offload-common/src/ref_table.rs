//! Reference-counted ownership table.
//!
//! `RefTable` tracks values that live for as long as somebody holds a
//! reference to them. It never creates entries implicitly: acquiring a
//! missing key is an error, and the entry disappears when its last
//! reference is released.
//!
//! ```
//! use offload_common::RefTable;
//!
//! let mut table: RefTable<u32, &str> = RefTable::new();
//! table.insert(7, "eth0");
//! assert_eq!(table.acquire(&7), Ok(2));
//! assert_eq!(table.release(&7), Ok(1));
//! assert_eq!(table.release(&7), Ok(0));
//! assert!(table.get(&7).is_none());
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Error type for RefTable operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefTableError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Reference count underflow")]
    RefCountUnderflow,
}

#[derive(Debug)]
struct Counted<V> {
    value: V,
    refs: u32,
}

/// A map whose entries are owned by outstanding references.
#[derive(Debug)]
pub struct RefTable<K, V> {
    inner: HashMap<K, Counted<V>>,
}

impl<K, V> Default for RefTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RefTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the value for `key`. **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key).map(|c| &c.value)
    }

    /// Inserts `value` holding one reference.
    ///
    /// If the key is already present the stored value is kept, `value` is
    /// dropped and the entry gains one reference. Returns the new count.
    pub fn insert(&mut self, key: K, value: V) -> u32 {
        let entry = self.inner.entry(key).or_insert(Counted { value, refs: 0 });
        entry.refs += 1;
        entry.refs
    }

    /// Takes one more reference on an existing entry.
    pub fn acquire(&mut self, key: &K) -> Result<u32, RefTableError> {
        let entry = self.inner.get_mut(key).ok_or(RefTableError::KeyNotFound)?;
        entry.refs += 1;
        Ok(entry.refs)
    }

    /// Drops one reference. The entry is removed when the count reaches zero.
    pub fn release(&mut self, key: &K) -> Result<u32, RefTableError> {
        let entry = self.inner.get_mut(key).ok_or(RefTableError::KeyNotFound)?;
        entry.refs = entry
            .refs
            .checked_sub(1)
            .ok_or(RefTableError::RefCountUnderflow)?;

        let refs = entry.refs;
        if refs == 0 {
            self.inner.remove(key);
        }
        Ok(refs)
    }

    /// Current reference count, or `None` if the key is not present.
    pub fn ref_count(&self, key: &K) -> Option<u32> {
        self.inner.get(key).map(|c| c.refs)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }
}
