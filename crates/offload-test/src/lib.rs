//! Test infrastructure for flow offload
//!
//! Provides:
//! - An in-memory flower classifier that stores entries in wire form
//! - Failure injection per classifier operation
//! - Test fixtures for common matches, actions and ports
//! - Verification helpers over the classifier's state and call log

pub mod backend;
pub mod fixtures;
mod verification;

pub use backend::{Call, FakeClassifier};
pub use fixtures::*;
pub use verification::*;
