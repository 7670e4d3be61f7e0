#![forbid(unsafe_code)]
//! Error types for afsck.
//!
//! # Error Taxonomy
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `afsck-types` | Byte-level layout violations (short buffers, overflow) |
//! | Checker | `FsckError` | `afsck-error` (this crate) | What a driver sees: corruption verdicts and fatal conditions |
//!
//! `afsck-error` does not depend on `afsck-types`. The conversion from
//! `ParseError` to `FsckError` lives in `afsck-core`, which knows which
//! record was being parsed and can attach a context label.
//!
//! ## Fatal vs. reportable
//!
//! `Corruption` is the verdict for a violated on-disk invariant. It is
//! produced by the reporter in `afsck-core` and only reaches the driver as an
//! error when the abort policy is active.
//!
//! `OutOfMemory` is never reported as a finding. It travels up to a single
//! top-level boundary which prints it and exits the process.

use thiserror::Error;

/// fsck exit status: filesystem errors left uncorrected.
pub const EXIT_UNCORRECTED: i32 = 4;
/// fsck exit status: operational error.
pub const EXIT_OPERATIONAL: i32 = 8;

#[derive(Debug, Error)]
pub enum FsckError {
    /// The image violates the on-disk contract.
    ///
    /// `context` names the structure being checked ("Inode record",
    /// "Inode xfield", ...), `detail` says what is wrong with it.
    #[error("{context}: {detail}")]
    Corruption { context: String, detail: String },

    /// A record could not be decoded at the byte level.
    #[error("parse error: {0}")]
    Parse(String),

    /// An in-memory table could not grow.
    #[error("out of memory while allocating {what}")]
    OutOfMemory { what: &'static str },
}

impl FsckError {
    #[must_use]
    pub fn corruption(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Corruption {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// True for errors that must end the process regardless of policy.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Map onto a POSIX errno.
    ///
    /// The mapping is exhaustive, so adding a variant is a compile error
    /// until its errno is chosen.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Corruption { .. } | Self::Parse(_) => libc::EIO,
            Self::OutOfMemory { .. } => libc::ENOMEM,
        }
    }

    /// Map onto an fsck-style process exit status.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Corruption { .. } | Self::Parse(_) => EXIT_UNCORRECTED,
            Self::OutOfMemory { .. } => EXIT_OPERATIONAL,
        }
    }
}

/// Result alias using `FsckError`.
pub type Result<T> = std::result::Result<T, FsckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_covers_all_variants() {
        let cases: Vec<(FsckError, libc::c_int, i32)> = vec![
            (
                FsckError::corruption("Inode record", "value is too small."),
                libc::EIO,
                EXIT_UNCORRECTED,
            ),
            (FsckError::Parse("short".into()), libc::EIO, EXIT_UNCORRECTED),
            (
                FsckError::OutOfMemory { what: "inode" },
                libc::ENOMEM,
                EXIT_OPERATIONAL,
            ),
        ];

        for (error, errno, code) in &cases {
            assert_eq!(error.to_errno(), *errno, "wrong errno for {error:?}");
            assert_eq!(error.exit_code(), *code, "wrong exit code for {error:?}");
        }
    }

    #[test]
    fn display_formatting() {
        let err = FsckError::corruption("Catalog", "inode numbers are repeated.");
        assert_eq!(err.to_string(), "Catalog: inode numbers are repeated.");

        let oom = FsckError::OutOfMemory {
            what: "hash table bucket",
        };
        assert_eq!(
            oom.to_string(),
            "out of memory while allocating hash table bucket"
        );
    }

    #[test]
    fn only_allocation_failure_is_fatal() {
        assert!(FsckError::OutOfMemory { what: "inode" }.is_fatal());
        assert!(!FsckError::corruption("a", "b").is_fatal());
        assert!(!FsckError::Parse("x".into()).is_fatal());
    }
}
