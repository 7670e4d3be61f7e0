#![forbid(unsafe_code)]
//! On-disk format parsing for APFS catalog records.
//!
//! Pure parsing crate — no I/O, no side effects, no verdicts. Parses byte
//! slices into typed Rust structures for catalog key headers, inode record
//! values, and the extended-field blob that trails an inode value. Deciding
//! whether the parsed values are *consistent* is the checker's job.

pub mod inode;
pub mod xfield;

pub use inode::{APFS_INODE_VAL_SIZE, ApfsInodeVal, ApfsKeyHeader};
pub use xfield::{
    APFS_DIR_STATS_VAL_SIZE, APFS_DSTREAM_SIZE, APFS_X_FIELD_SIZE, APFS_XF_BLOB_HEADER_SIZE,
    ApfsDstream, ApfsXField, ApfsXfBlobHeader,
};
