//! Device arena.
//!
//! Devices are keyed by ifindex and owned by their outstanding
//! [`DeviceHandle`]s. Index records hold a handle, so a device cannot leave
//! the registry while a rule still references it.

use flow_types::OdpPort;
use offload_common::RefTable;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct Device {
    name: Arc<str>,
    port: Option<OdpPort>,
}

type Table = Arc<Mutex<RefTable<i32, Device>>>;

/// Registry of open devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    table: Table,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `name` at `ifindex`, taking one reference.
    ///
    /// Opening an ifindex that is already open returns a handle to the
    /// existing device; the stored name and port are kept.
    pub fn open(&self, name: &str, ifindex: i32, port: Option<OdpPort>) -> DeviceHandle {
        let mut table = self.table.lock();
        let refs = table.insert(
            ifindex,
            Device {
                name: Arc::from(name),
                port,
            },
        );
        // insert keeps an existing entry, so read back what is stored
        let (name, port) = match table.get(&ifindex) {
            Some(dev) => (Arc::clone(&dev.name), dev.port),
            None => (Arc::from(name), port),
        };
        debug!(ifindex, name = %name, refs, "device opened");

        DeviceHandle {
            table: Arc::clone(&self.table),
            ifindex,
            name,
            port,
        }
    }

    /// Outstanding references on `ifindex`, or `None` once fully released.
    pub fn ref_count(&self, ifindex: i32) -> Option<u32> {
        self.table.lock().ref_count(&ifindex)
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

/// A counted reference to an open device.
///
/// Cloning takes another reference and dropping releases it.
pub struct DeviceHandle {
    table: Table,
    ifindex: i32,
    name: Arc<str>,
    port: Option<OdpPort>,
}

impl DeviceHandle {
    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Switch-local port of the device, if it is one.
    pub fn port(&self) -> Option<OdpPort> {
        self.port
    }
}

impl Clone for DeviceHandle {
    fn clone(&self) -> Self {
        if let Err(e) = self.table.lock().acquire(&self.ifindex) {
            warn!(ifindex = self.ifindex, error = %e, "cloned handle of a released device");
        }
        Self {
            table: Arc::clone(&self.table),
            ifindex: self.ifindex,
            name: Arc::clone(&self.name),
            port: self.port,
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Err(e) = self.table.lock().release(&self.ifindex) {
            warn!(ifindex = self.ifindex, error = %e, "device reference released twice");
        }
    }
}

impl PartialEq for DeviceHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.table, &other.table) && self.ifindex == other.ifindex
    }
}

impl Eq for DeviceHandle {}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("ifindex", &self.ifindex)
            .field("name", &self.name)
            .field("port", &self.port)
            .finish()
    }
}
