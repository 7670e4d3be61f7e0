//! Extended field (xfield) layouts.
//!
//! An xfield blob is laid out as:
//!
//! ```text
//! +----------------+--------------------------------+---------------------------+
//! | xf_blob header | x_field descriptors (4 B each) | padded payloads, in order |
//! +----------------+--------------------------------+---------------------------+
//! ```
//!
//! Each payload is followed by zeroes up to the next multiple of 8 bytes.

use afsck_types::{ParseError, ensure_slice, read_le_u16, read_le_u64};
use serde::{Deserialize, Serialize};

/// `xf_num_exts` + `xf_used_data`.
pub const APFS_XF_BLOB_HEADER_SIZE: usize = 4;
/// `x_type` + `x_flags` + `x_size`.
pub const APFS_X_FIELD_SIZE: usize = 4;
/// `j_dstream_t`.
pub const APFS_DSTREAM_SIZE: usize = 40;
/// `j_dir_stats_val_t`.
pub const APFS_DIR_STATS_VAL_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApfsXfBlobHeader {
    pub num_exts: u16,
    pub used_data: u16,
}

impl ApfsXfBlobHeader {
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        Ok(Self {
            num_exts: read_le_u16(bytes, 0)?,
            used_data: read_le_u16(bytes, 2)?,
        })
    }
}

/// One xfield descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApfsXField {
    pub x_type: u8,
    pub x_flags: u8,
    pub x_size: u16,
}

impl ApfsXField {
    /// Parse the `index`-th descriptor of a descriptor table.
    pub fn parse_at(table: &[u8], index: usize) -> Result<Self, ParseError> {
        let base = index
            .checked_mul(APFS_X_FIELD_SIZE)
            .ok_or(ParseError::InvalidField {
                field: "x_field",
                reason: "overflow",
            })?;
        let bytes = ensure_slice(table, base, APFS_X_FIELD_SIZE)?;
        Ok(Self {
            x_type: bytes[0],
            x_flags: bytes[1],
            x_size: read_le_u16(bytes, 2)?,
        })
    }
}

/// Data stream attributes embedded in a DSTREAM xfield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApfsDstream {
    /// Logical size of the file contents.
    pub size: u64,
    pub alloced_size: u64,
    pub default_crypto_id: u64,
    pub total_bytes_written: u64,
    pub total_bytes_read: u64,
}

impl ApfsDstream {
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < APFS_DSTREAM_SIZE {
            return Err(ParseError::InsufficientData {
                needed: APFS_DSTREAM_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            size: read_le_u64(bytes, 0x00)?,
            alloced_size: read_le_u64(bytes, 0x08)?,
            default_crypto_id: read_le_u64(bytes, 0x10)?,
            total_bytes_written: read_le_u64(bytes, 0x18)?,
            total_bytes_read: read_le_u64(bytes, 0x20)?,
        })
    }
}
