//! Error types for tunnel vport provisioning.

use crate::types::VportType;
use offload_common::NlError;
use thiserror::Error;

/// Errors from creating, verifying or removing a tunnel link.
#[derive(Debug, Error)]
pub enum VportError {
    /// The vport type has no rtnetlink link kind.
    #[error("vport type {0} cannot be provisioned over rtnetlink")]
    Unsupported(VportType),

    #[error("unknown vport type: {0}")]
    UnknownType(String),

    /// The existing link does not carry the attributes a fresh one would.
    #[error("link {name} does not match its configuration: {reason}")]
    Mismatch { name: String, reason: String },

    #[error(transparent)]
    Netlink(#[from] NlError),
}

impl VportError {
    pub fn mismatch(name: &str, reason: impl Into<String>) -> Self {
        VportError::Mismatch {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Positive errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            VportError::Unsupported(_) => libc::EOPNOTSUPP,
            VportError::UnknownType(_) | VportError::Mismatch { .. } => libc::EINVAL,
            VportError::Netlink(e) => e.errno(),
        }
    }
}

pub type VportResult<T> = Result<T, VportError>;
