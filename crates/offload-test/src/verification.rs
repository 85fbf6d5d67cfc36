//! Verification helpers for offload tests
//!
//! Assertion helpers over the fake classifier's entries and call log.

use crate::backend::{Call, FakeClassifier};
use flow_types::Ufid;
use tc_flower::{TcAction, TcFlower};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("no classifier entry at ifindex {ifindex} prio {prio} handle {handle}")]
    EntryMissing { ifindex: i32, prio: u16, handle: u32 },

    #[error("unexpected classifier entry at ifindex {ifindex} prio {prio} handle {handle}")]
    EntryPresent { ifindex: i32, prio: u16, handle: u32 },

    #[error("cookie mismatch: expected {expected}, got {actual:?}")]
    CookieMismatch { expected: Ufid, actual: Option<Vec<u8>> },

    #[error("actions mismatch: expected {expected:?}, got {actual:?}")]
    ActionsMismatch {
        expected: Vec<TcAction>,
        actual: Vec<TcAction>,
    },

    #[error("expected {expected} calls matching {what}, found {actual}")]
    CallCountMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("expected {expected} entries on ifindex {ifindex}, found {actual}")]
    EntryCountMismatch {
        ifindex: i32,
        expected: usize,
        actual: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Classifier state verification helper
pub struct ClassifierVerifier<'a> {
    fake: &'a FakeClassifier,
}

impl<'a> ClassifierVerifier<'a> {
    pub fn new(fake: &'a FakeClassifier) -> Self {
        Self { fake }
    }

    /// Verify an entry exists and return it
    pub fn assert_installed(&self, ifindex: i32, prio: u16, handle: u32) -> VerifyResult<TcFlower> {
        self.fake
            .entry(ifindex, prio, handle)
            .ok_or(VerificationError::EntryMissing { ifindex, prio, handle })
    }

    /// Verify no entry exists at the given identity
    pub fn assert_absent(&self, ifindex: i32, prio: u16, handle: u32) -> VerifyResult<()> {
        match self.fake.entry(ifindex, prio, handle) {
            Some(_) => Err(VerificationError::EntryPresent { ifindex, prio, handle }),
            None => Ok(()),
        }
    }

    /// Verify an entry carries `ufid` as its cookie
    pub fn assert_cookie(&self, ifindex: i32, prio: u16, handle: u32, ufid: Ufid) -> VerifyResult<()> {
        let entry = self.assert_installed(ifindex, prio, handle)?;
        if entry.cookie.as_deref() != Some(&ufid.to_bytes()[..]) {
            return Err(VerificationError::CookieMismatch {
                expected: ufid,
                actual: entry.cookie,
            });
        }
        Ok(())
    }

    /// Verify an entry's action list
    pub fn assert_actions(&self, ifindex: i32, prio: u16, handle: u32, expected: &[TcAction]) -> VerifyResult<()> {
        let entry = self.assert_installed(ifindex, prio, handle)?;
        if entry.actions != expected {
            return Err(VerificationError::ActionsMismatch {
                expected: expected.to_vec(),
                actual: entry.actions,
            });
        }
        Ok(())
    }

    /// Verify the number of entries on an interface
    pub fn assert_entry_count(&self, ifindex: i32, expected: usize) -> VerifyResult<()> {
        let actual = self.fake.entries(ifindex).len();
        if actual != expected {
            return Err(VerificationError::EntryCountMismatch {
                ifindex,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify how many logged calls satisfy `pred`
    pub fn assert_call_count(
        &self,
        what: &str,
        expected: usize,
        pred: impl Fn(&Call) -> bool,
    ) -> VerifyResult<()> {
        let actual = self.fake.calls().iter().filter(|c| pred(c)).count();
        if actual != expected {
            return Err(VerificationError::CallCountMismatch {
                what: what.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Whether `call` is an install.
pub fn is_install(call: &Call) -> bool {
    matches!(call, Call::Install { .. })
}

/// Whether `call` is a delete.
pub fn is_delete(call: &Call) -> bool {
    matches!(call, Call::Delete { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tc_flower::ClassifierBackend;

    #[test]
    fn test_verifier_reports_mismatches() {
        let fake = FakeClassifier::new();
        let ufid = Ufid::new(3);
        let flower = TcFlower {
            actions: vec![TcAction::Drop],
            cookie: Some(ufid.to_bytes().to_vec()),
            ..Default::default()
        };
        let handle = fake.install_or_replace(2, 1, 0, &flower).unwrap();
        let verify = ClassifierVerifier::new(&fake);

        assert!(verify.assert_installed(2, 1, handle).is_ok());
        assert!(verify.assert_cookie(2, 1, handle, ufid).is_ok());
        assert!(verify.assert_actions(2, 1, handle, &[TcAction::Drop]).is_ok());
        assert!(verify.assert_entry_count(2, 1).is_ok());
        assert!(verify.assert_call_count("installs", 1, is_install).is_ok());

        assert_eq!(
            verify.assert_absent(2, 1, handle),
            Err(VerificationError::EntryPresent {
                ifindex: 2,
                prio: 1,
                handle
            })
        );
        assert!(verify.assert_cookie(2, 1, handle, Ufid::new(4)).is_err());
        assert!(verify.assert_call_count("deletes", 1, is_delete).is_err());
    }
}
