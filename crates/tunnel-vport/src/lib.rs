//! Tunnel vport provisioning
//!
//! Creates, verifies and removes the kernel tunnel links (vxlan, gretap,
//! geneve) that back a switch's tunnel ports, so offloaded flows have an
//! interface to redirect to:
//! - Link naming shared by every port on the same UDP destination port
//! - Metadata-mode link creation with verification of pre-existing links
//! - Out-of-tree tunnel module detection

pub mod error;
pub mod manager;
pub mod message;
pub mod transport;
pub mod types;

pub use error::{VportError, VportResult};
pub use manager::VportManager;
pub use message::LinkMessage;
pub use transport::{LinkTransport, NetlinkLinkTransport};
pub use types::{TunnelConfig, Vport, VportType};
