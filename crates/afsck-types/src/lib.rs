#![forbid(unsafe_code)]
//! Shared vocabulary for the APFS checker crates: on-disk constants, the
//! inode number newtype, and bounds-checked little-endian readers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ── Catalog object ids ──────────────────────────────────────────────────────

/// Mask selecting the object id from a catalog key's `obj_id_and_type`.
pub const OBJ_ID_MASK: u64 = 0x0fff_ffff_ffff_ffff;
/// Mask selecting the record type from a catalog key's `obj_id_and_type`.
pub const OBJ_TYPE_MASK: u64 = 0xf000_0000_0000_0000;
pub const OBJ_TYPE_SHIFT: u32 = 60;

/// Catalog record type of an inode record.
pub const APFS_TYPE_INODE: u8 = 3;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InodeNumber(pub u64);

impl InodeNumber {
    /// Never a valid inode number.
    pub const INVALID: Self = Self(0);
    /// Fake parent of the root and private directories.
    pub const ROOT_DIR_PARENT: Self = Self(1);
    pub const ROOT_DIR: Self = Self(2);
    pub const PRIV_DIR: Self = Self(3);
    pub const SNAP_DIR: Self = Self(6);
    /// First inode number available to user objects.
    pub const MIN_USER: Self = Self(16);

    /// True for numbers below [`Self::MIN_USER`].
    #[must_use]
    pub fn is_reserved(self) -> bool {
        self < Self::MIN_USER
    }

    /// True for the three synthetic directories a volume always carries.
    #[must_use]
    pub fn is_synthetic_dir(self) -> bool {
        matches!(self, Self::ROOT_DIR | Self::PRIV_DIR | Self::SNAP_DIR)
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── POSIX file mode constants ────────────────────────────────────────────────

/// File type mask (upper 4 bits of mode).
pub const S_IFMT: u16 = 0o170_000;
/// Named pipe (FIFO).
pub const S_IFIFO: u16 = 0o010_000;
/// Character device.
pub const S_IFCHR: u16 = 0o020_000;
/// Directory.
pub const S_IFDIR: u16 = 0o040_000;
/// Block device.
pub const S_IFBLK: u16 = 0o060_000;
/// Regular file.
pub const S_IFREG: u16 = 0o100_000;
/// Symbolic link.
pub const S_IFLNK: u16 = 0o120_000;
/// Socket.
pub const S_IFSOCK: u16 = 0o140_000;

// ── Inode extended field types (x_type) ─────────────────────────────────────

pub const APFS_INO_EXT_TYPE_SNAP_XID: u8 = 1;
pub const APFS_INO_EXT_TYPE_DELTA_TREE_OID: u8 = 2;
pub const APFS_INO_EXT_TYPE_DOCUMENT_ID: u8 = 3;
pub const APFS_INO_EXT_TYPE_NAME: u8 = 4;
pub const APFS_INO_EXT_TYPE_PREV_FSIZE: u8 = 5;
pub const APFS_INO_EXT_TYPE_RESERVED_6: u8 = 6;
pub const APFS_INO_EXT_TYPE_FINDER_INFO: u8 = 7;
pub const APFS_INO_EXT_TYPE_DSTREAM: u8 = 8;
pub const APFS_INO_EXT_TYPE_RESERVED_9: u8 = 9;
pub const APFS_INO_EXT_TYPE_DIR_STATS_KEY: u8 = 10;
pub const APFS_INO_EXT_TYPE_FS_UUID: u8 = 11;
pub const APFS_INO_EXT_TYPE_RESERVED_12: u8 = 12;
pub const APFS_INO_EXT_TYPE_SPARSE_BYTES: u8 = 13;
pub const APFS_INO_EXT_TYPE_RDEV: u8 = 14;

/// Xfield payloads are zero-padded to this alignment.
pub const XFIELD_ALIGN: usize = 8;

// ── Parse errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_le_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_le_u64(data: &[u8], offset: usize) -> Result<u64, ParseError> {
    let bytes = ensure_slice(data, offset, 8)?;
    Ok(u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]))
}

/// Round `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be a non-zero power of two; returns `None` on overflow
/// or if `alignment` is invalid.
#[must_use]
pub fn align_up(value: usize, alignment: usize) -> Option<usize> {
    if alignment == 0 || !alignment.is_power_of_two() {
        return None;
    }
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

/// Number of zero bytes that follow an xfield payload of `len` bytes.
#[must_use]
pub fn xfield_padding(len: usize) -> usize {
    // Only overflow can fail here.
    align_up(len, XFIELD_ALIGN).map_or(0, |aligned| aligned - len)
}
