//! TC flower classifier vocabulary.
//!
//! This crate knows how flower entries look on the wire and how to talk to
//! the kernel about them. It does not know about switch flows; that mapping
//! lives in `tc-offload`.
//!
//! - [`TcFlower`]: one classifier entry (identity, key/mask, actions, cookie)
//! - [`codec`]: `TCA_OPTIONS` encode/decode
//! - [`TcMessage`]: `tcmsg` framing for rtnetlink
//! - [`ClassifierBackend`]: the install/delete/get/dump/flush contract
//! - [`NetlinkClassifier`]: the kernel implementation of that contract

pub mod backend;
pub mod codec;
pub mod consts;
pub mod error;
pub mod flower;
pub mod message;
pub mod socket;

pub use backend::{ClassifierBackend, DumpHandle, DumpStream};
pub use error::{TcError, TcOp, TcResult, TcStatus};
pub use flower::{FlowerKey, FlowerStats, FlowerTunnelKey, OffloadPolicy, TcAction, TcFlower, TunnelKeySet};
pub use message::TcMessage;
pub use socket::NetlinkClassifier;
