//! Error types for flow offload operations.

use tc_flower::TcError;
use thiserror::Error;

/// Errors returned by the offload layer.
///
/// `NotFound` and `Unsupported` are routine: the caller is expected to fall
/// back to the software datapath. `Backend` carries the classifier's own
/// reason and errno.
#[derive(Debug, Error)]
pub enum OffloadError {
    /// No mapping for a UFID, or an interface/port that cannot be resolved.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The request cannot be expressed by the classifier.
    #[error("unsupported: {what}")]
    Unsupported { what: String },

    /// The classifier rejected or failed the request.
    #[error("classifier error: {0}")]
    Backend(#[from] TcError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OffloadError {
    pub fn not_found(what: impl Into<String>) -> Self {
        OffloadError::NotFound { what: what.into() }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        OffloadError::Unsupported { what: what.into() }
    }

    /// Positive errno for a C-style caller.
    pub fn errno(&self) -> i32 {
        match self {
            OffloadError::NotFound { .. } => libc::ENOENT,
            OffloadError::Unsupported { .. } => libc::EOPNOTSUPP,
            OffloadError::Backend(e) => e.errno(),
            OffloadError::Configuration(_) => libc::EINVAL,
            OffloadError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OffloadError::NotFound { .. })
    }
}

/// Result type for offload operations.
pub type OffloadResult<T> = Result<T, OffloadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tc_flower::TcOp;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(OffloadError::not_found("ufid").errno(), libc::ENOENT);
        assert_eq!(OffloadError::unsupported("ct_state").errno(), libc::EOPNOTSUPP);
        assert_eq!(
            OffloadError::from(TcError::kernel(TcOp::Install, libc::ENOSPC)).errno(),
            libc::ENOSPC
        );
        assert_eq!(OffloadError::Configuration("x".into()).errno(), libc::EINVAL);
    }

    #[test]
    fn test_display() {
        let err = OffloadError::unsupported("partial VLAN mask 0x0f00");
        assert_eq!(err.to_string(), "unsupported: partial VLAN mask 0x0f00");
        assert!(OffloadError::not_found("x").is_not_found());
    }
}
