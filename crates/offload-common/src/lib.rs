//! Shared plumbing for the flow offload crates.
//!
//! - [`RefTable`]: explicit reference-counted ownership table (no auto-vivification)
//! - [`RateLimiter`]: token bucket used to keep failure logging bounded
//! - [`NlAttr`]: typed netlink attribute for building request payloads
//! - [`NlSocket`]: blocking rtnetlink request/ack and dump transport

pub mod attr;
pub mod netlink;
pub mod rate_limit;
pub mod ref_table;

pub use attr::NlAttr;
pub use netlink::{NlDump, NlError, NlResult, NlSocket};
pub use rate_limit::RateLimiter;
pub use ref_table::{RefTable, RefTableError};
