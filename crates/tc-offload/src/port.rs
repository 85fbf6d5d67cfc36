//! Port resolution between switch ports and kernel interfaces.

use flow_types::OdpPort;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Maps switch-local ports to interface indexes and back.
pub trait PortResolver: Send + Sync {
    fn port_to_ifindex(&self, port: OdpPort) -> Option<i32>;

    fn ifindex_to_port(&self, ifindex: i32) -> Option<OdpPort>;
}

#[derive(Debug, Default)]
struct Ports {
    to_ifindex: HashMap<OdpPort, i32>,
    to_port: HashMap<i32, OdpPort>,
}

/// In-memory [`PortResolver`] kept up to date by whoever adds and removes
/// datapath ports.
#[derive(Debug, Default)]
pub struct PortTable {
    ports: RwLock<Ports>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `port` as living on `ifindex`, replacing any previous
    /// binding of either side.
    pub fn add(&self, port: OdpPort, ifindex: i32) {
        let mut ports = self.ports.write();
        if let Some(old) = ports.to_ifindex.insert(port, ifindex) {
            ports.to_port.remove(&old);
        }
        if let Some(old) = ports.to_port.insert(ifindex, port) {
            if old != port {
                ports.to_ifindex.remove(&old);
            }
        }
    }

    pub fn remove(&self, port: OdpPort) -> Option<i32> {
        let mut ports = self.ports.write();
        let ifindex = ports.to_ifindex.remove(&port)?;
        ports.to_port.remove(&ifindex);
        Some(ifindex)
    }

    pub fn len(&self) -> usize {
        self.ports.read().to_ifindex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PortResolver for PortTable {
    fn port_to_ifindex(&self, port: OdpPort) -> Option<i32> {
        self.ports.read().to_ifindex.get(&port).copied()
    }

    fn ifindex_to_port(&self, ifindex: i32) -> Option<OdpPort> {
        self.ports.read().to_port.get(&ifindex).copied()
    }
}
