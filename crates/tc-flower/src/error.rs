//! Classifier error types and errno classification.

use offload_common::NlError;
use std::fmt;
use thiserror::Error;

/// Kernel status classes seen on classifier requests.
///
/// The discriminants are the positive errno values the kernel reports.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcStatus {
    Success = 0,
    PermissionDenied = libc::EPERM,
    NotFound = libc::ENOENT,
    NoMemory = libc::ENOMEM,
    Busy = libc::EBUSY,
    AlreadyExists = libc::EEXIST,
    NoDevice = libc::ENODEV,
    InvalidArgument = libc::EINVAL,
    NoSpace = libc::ENOSPC,
    NotSupported = libc::EOPNOTSUPP,
    Failure = libc::EIO,
}

impl TcStatus {
    /// Classifies a raw errno. Negative values (netlink style) are accepted.
    pub fn from_raw(errno: i32) -> Self {
        match errno.abs() {
            0 => TcStatus::Success,
            libc::EPERM => TcStatus::PermissionDenied,
            libc::ENOENT => TcStatus::NotFound,
            libc::ENOMEM => TcStatus::NoMemory,
            libc::EBUSY => TcStatus::Busy,
            libc::EEXIST => TcStatus::AlreadyExists,
            libc::ENODEV => TcStatus::NoDevice,
            libc::EINVAL => TcStatus::InvalidArgument,
            libc::ENOSPC => TcStatus::NoSpace,
            libc::EOPNOTSUPP => TcStatus::NotSupported,
            _ => TcStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == TcStatus::Success
    }
}

impl fmt::Display for TcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TcStatus::Success => "success",
            TcStatus::PermissionDenied => "permission denied",
            TcStatus::NotFound => "no such filter",
            TcStatus::NoMemory => "out of memory",
            TcStatus::Busy => "device busy",
            TcStatus::AlreadyExists => "filter exists",
            TcStatus::NoDevice => "no such device",
            TcStatus::InvalidArgument => "invalid argument",
            TcStatus::NoSpace => "no space in hardware table",
            TcStatus::NotSupported => "operation not supported",
            TcStatus::Failure => "failure",
        };
        write!(f, "{}", s)
    }
}

/// The classifier request that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcOp {
    Install,
    Delete,
    Get,
    Dump,
    Flush,
}

impl fmt::Display for TcOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TcOp::Install => "install",
            TcOp::Delete => "delete",
            TcOp::Get => "get",
            TcOp::Dump => "dump",
            TcOp::Flush => "flush",
        };
        write!(f, "{}", s)
    }
}

/// Error type for classifier backend operations.
#[derive(Debug, Error)]
pub enum TcError {
    /// The kernel rejected a request.
    #[error("tc {op} failed: {status} (errno {errno})")]
    Kernel { op: TcOp, status: TcStatus, errno: i32 },

    /// Socket level failure.
    #[error("tc transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A reply could not be parsed.
    #[error("malformed tc message: {0}")]
    Decode(String),

    /// The entry does not exist.
    #[error("tc filter not found")]
    NotFound,

    /// The entry uses something this codec does not understand.
    #[error("unsupported tc content: {0}")]
    Unsupported(String),
}

impl TcError {
    /// Creates a kernel error from a raw errno.
    pub fn kernel(op: TcOp, errno: i32) -> Self {
        let errno = errno.abs();
        TcError::Kernel {
            op,
            status: TcStatus::from_raw(errno),
            errno,
        }
    }

    /// Wraps a transport error for `op`.
    pub fn from_netlink(op: TcOp, err: NlError) -> Self {
        match err {
            NlError::Kernel { errno } => TcError::kernel(op, errno),
            NlError::Io(e) => TcError::Io(e),
            NlError::Decode(msg) => TcError::Decode(msg),
        }
    }

    /// Positive errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            TcError::Kernel { errno, .. } => *errno,
            TcError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            TcError::Decode(_) => libc::EPROTO,
            TcError::NotFound => libc::ENOENT,
            TcError::Unsupported(_) => libc::EOPNOTSUPP,
        }
    }

    pub fn status(&self) -> TcStatus {
        TcStatus::from_raw(self.errno())
    }
}

/// Result type for classifier operations.
pub type TcResult<T> = Result<T, TcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_from_raw() {
        assert_eq!(TcStatus::from_raw(0), TcStatus::Success);
        assert_eq!(TcStatus::from_raw(-libc::ENOENT), TcStatus::NotFound);
        assert_eq!(TcStatus::from_raw(libc::EOPNOTSUPP), TcStatus::NotSupported);
        assert_eq!(TcStatus::from_raw(9999), TcStatus::Failure);
    }

    #[test]
    fn test_kernel_error_keeps_errno() {
        let err = TcError::kernel(TcOp::Install, -libc::ENOSPC);
        assert_eq!(err.errno(), libc::ENOSPC);
        assert_eq!(err.status(), TcStatus::NoSpace);
        assert_eq!(
            err.to_string(),
            format!("tc install failed: no space in hardware table (errno {})", libc::ENOSPC)
        );
    }

    #[test]
    fn test_from_netlink() {
        let err = TcError::from_netlink(TcOp::Delete, NlError::Kernel { errno: libc::ENOENT });
        assert!(matches!(
            err,
            TcError::Kernel {
                op: TcOp::Delete,
                status: TcStatus::NotFound,
                ..
            }
        ));
        assert_eq!(TcError::NotFound.errno(), libc::ENOENT);
        assert_eq!(TcError::Unsupported("x".into()).errno(), libc::EOPNOTSUPP);
    }
}
