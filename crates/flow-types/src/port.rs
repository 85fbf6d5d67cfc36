//! Datapath port numbers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A switch-local datapath port number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OdpPort(u32);

impl OdpPort {
    /// Mask value that pins `in_port` exactly.
    pub const EXACT: OdpPort = OdpPort(u32::MAX);

    pub const fn new(port: u32) -> Self {
        OdpPort(port)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for OdpPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OdpPort {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(OdpPort)
            .map_err(|_| ParseError::InvalidPort(s.to_string()))
    }
}

impl From<u32> for OdpPort {
    fn from(port: u32) -> Self {
        OdpPort(port)
    }
}
