use afsck_types::{
    InodeNumber, OBJ_ID_MASK, OBJ_TYPE_MASK, OBJ_TYPE_SHIFT, ParseError, S_IFMT, read_le_u16,
    read_le_u32, read_le_u64,
};
use serde::{Deserialize, Serialize};

/// Size of the fixed part of an inode record value, before the xfields.
pub const APFS_INODE_VAL_SIZE: usize = 92;

/// Header common to all catalog keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApfsKeyHeader {
    pub obj_id_and_type: u64,
}

impl ApfsKeyHeader {
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        Ok(Self {
            obj_id_and_type: read_le_u64(bytes, 0)?,
        })
    }

    /// The catalog node id this record belongs to.
    #[must_use]
    pub fn cnid(&self) -> u64 {
        self.obj_id_and_type & OBJ_ID_MASK
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // four bits after the shift
    pub fn record_type(&self) -> u8 {
        ((self.obj_id_and_type & OBJ_TYPE_MASK) >> OBJ_TYPE_SHIFT) as u8
    }

    #[must_use]
    pub fn inode_number(&self) -> InodeNumber {
        InodeNumber(self.cnid())
    }
}

/// Fixed part of an inode record value (`j_inode_val_t`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApfsInodeVal {
    pub parent_id: u64,
    pub private_id: u64,

    // ── Timestamps (nanoseconds since the epoch) ─────────────────────────
    pub create_time: u64,
    pub mod_time: u64,
    pub change_time: u64,
    pub access_time: u64,

    pub internal_flags: u64,
    /// Child count for directories, hard link count for everything else.
    pub nchildren_or_nlink: u32,
    pub default_protection_class: u32,
    pub write_generation_counter: u32,
    pub bsd_flags: u32,
    pub owner: u32,
    pub group: u32,
    pub mode: u16,
    pub pad1: u16,
    pub pad2: u64,
}

impl ApfsInodeVal {
    /// Parse the fixed inode value header.
    ///
    /// Requires at least [`APFS_INODE_VAL_SIZE`] bytes; anything beyond that
    /// is the xfield blob, see [`Self::xfields`].
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < APFS_INODE_VAL_SIZE {
            return Err(ParseError::InsufficientData {
                needed: APFS_INODE_VAL_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            parent_id: read_le_u64(bytes, 0x00)?,
            private_id: read_le_u64(bytes, 0x08)?,
            create_time: read_le_u64(bytes, 0x10)?,
            mod_time: read_le_u64(bytes, 0x18)?,
            change_time: read_le_u64(bytes, 0x20)?,
            access_time: read_le_u64(bytes, 0x28)?,
            internal_flags: read_le_u64(bytes, 0x30)?,
            nchildren_or_nlink: read_le_u32(bytes, 0x38)?,
            default_protection_class: read_le_u32(bytes, 0x3C)?,
            write_generation_counter: read_le_u32(bytes, 0x40)?,
            bsd_flags: read_le_u32(bytes, 0x44)?,
            owner: read_le_u32(bytes, 0x48)?,
            group: read_le_u32(bytes, 0x4C)?,
            mode: read_le_u16(bytes, 0x50)?,
            pad1: read_le_u16(bytes, 0x52)?,
            pad2: read_le_u64(bytes, 0x54)?,
        })
    }

    /// The xfield blob trailing the fixed header (possibly empty).
    #[must_use]
    pub fn xfields(bytes: &[u8]) -> &[u8] {
        bytes.get(APFS_INODE_VAL_SIZE..).unwrap_or_default()
    }

    #[must_use]
    pub fn parent_ino(&self) -> InodeNumber {
        InodeNumber(self.parent_id)
    }

    /// File type bits of `mode`.
    #[must_use]
    pub fn file_type(&self) -> u16 {
        self.mode & S_IFMT
    }
}
