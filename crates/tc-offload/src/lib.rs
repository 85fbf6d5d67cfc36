//! Flow offload to the TC flower classifier.
//!
//! Switch flows are identified by a caller-assigned [`Ufid`]; flower entries
//! by `(priority, handle, ifindex)`. This crate keeps the two identity spaces
//! in step and translates between the generic match/action language and
//! flower keys, masks and actions.
//!
//! - [`IdentifierIndex`]: UFID <-> classifier identity, one lock for both directions
//! - [`PriorityAllocator`]: one priority per distinct mask shape, never reused
//! - [`Translator`]: encode/decode plus the degraded-match detector
//! - [`FlowOffload`]: flush/dump/put/get/del against a [`ClassifierBackend`]
//!
//! [`Ufid`]: flow_types::Ufid
//! [`ClassifierBackend`]: tc_flower::ClassifierBackend

pub mod config;
pub mod device;
pub mod error;
pub mod index;
pub mod offload;
pub mod port;
pub mod priority;
pub mod translate;

pub use config::OffloadConfig;
pub use device::{DeviceHandle, DeviceRegistry};
pub use error::{OffloadError, OffloadResult};
pub use index::{IdentifierIndex, IndexEntry, TcId};
pub use offload::{FlowDump, FlowOffload, FlowStats, OffloadedFlow, PutContext, PutOutcome};
pub use port::{PortResolver, PortTable};
pub use priority::PriorityAllocator;
pub use translate::{DecodedFlow, EncodeContext, Encoded, FlowIdentity, IgnoredField, Translator};
