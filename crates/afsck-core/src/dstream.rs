//! Data streams and catalog node id markers.
//!
//! Both are filled in by the extent and catalog layers; this crate owns the
//! tables they live in and reads them during the end-of-scan inode checks.

use afsck_htable::TableEntry;
use serde::Serialize;

/// Extent coverage gathered for one data stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dstream {
    pub id: u64,
    /// Bytes covered by the extents seen so far. A gap between extents
    /// leaves this short of the end of the last extent.
    pub size: u64,
}

impl Dstream {
    /// Account for an extent of `len` bytes.
    pub fn record_extent(&mut self, len: u64) {
        self.size = self.size.saturating_add(len);
    }
}

impl TableEntry for Dstream {
    fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

/// Kinds of catalog objects that can claim a cnid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CnidUse {
    Inode = 1 << 0,
    Dstream = 1 << 1,
}

/// A catalog node id seen during the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListedCnid {
    pub id: u64,
    uses: u8,
}

impl ListedCnid {
    pub fn mark(&mut self, kind: CnidUse) {
        self.uses |= kind as u8;
    }

    #[must_use]
    pub fn is_used_by(&self, kind: CnidUse) -> bool {
        self.uses & kind as u8 != 0
    }
}

impl TableEntry for ListedCnid {
    fn new(id: u64) -> Self {
        Self { id, uses: 0 }
    }

    fn id(&self) -> u64 {
        self.id
    }
}
