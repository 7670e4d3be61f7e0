//! Legality of reserved inode numbers.

use afsck_types::InodeNumber;
use std::fmt;

/// Misuse of a reserved inode number in an inode record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdViolation {
    /// The record's own number is the invalid or root-parent sentinel.
    InvalidInodeNumber,
    /// A synthetic directory whose parent is not the root-parent sentinel.
    BadSyntheticParent,
    /// The record's own number is reserved but not a known synthetic inode.
    ReservedInodeNumber,
    /// The parent is the invalid sentinel.
    InvalidParent,
    /// A user inode claims the root-parent sentinel as its parent.
    RootParentForNonroot,
    /// The parent is reserved but not a known synthetic directory.
    ReservedParent,
}

impl IdViolation {
    #[must_use]
    pub fn context(self) -> &'static str {
        match self {
            Self::BadSyntheticParent => "Root inode record",
            _ => "Inode record",
        }
    }

    #[must_use]
    pub fn detail(self) -> &'static str {
        match self {
            Self::InvalidInodeNumber => "invalid inode number.",
            Self::BadSyntheticParent => "bad parent id",
            Self::ReservedInodeNumber => "reserved inode number.",
            Self::InvalidParent => "invalid parent inode number.",
            Self::RootParentForNonroot => "root parent id for nonroot.",
            Self::ReservedParent => "reserved parent inode number.",
        }
    }
}

impl fmt::Display for IdViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context(), self.detail())
    }
}

/// Check that an inode number is consistent with its parent's number.
///
/// Reserved numbers (below [`InodeNumber::MIN_USER`]) may only be used by the
/// root, private and snapshot directories, which must hang off the
/// root-parent sentinel. The parent of a user inode may be one of those
/// three directories but no other reserved number.
#[must_use]
pub fn check_inode_ids(ino: InodeNumber, parent_ino: InodeNumber) -> Option<IdViolation> {
    if ino.is_reserved() {
        return match ino {
            InodeNumber::INVALID | InodeNumber::ROOT_DIR_PARENT => {
                Some(IdViolation::InvalidInodeNumber)
            }
            _ if ino.is_synthetic_dir() => (parent_ino != InodeNumber::ROOT_DIR_PARENT)
                .then_some(IdViolation::BadSyntheticParent),
            _ => Some(IdViolation::ReservedInodeNumber),
        };
    }

    if parent_ino.is_reserved() {
        return match parent_ino {
            InodeNumber::INVALID => Some(IdViolation::InvalidParent),
            InodeNumber::ROOT_DIR_PARENT => Some(IdViolation::RootParentForNonroot),
            _ if parent_ino.is_synthetic_dir() => None,
            _ => Some(IdViolation::ReservedParent),
        };
    }

    None
}
