//! Validation of the extended fields trailing an inode record.

use crate::inode::Inode;
use crate::report::Reporter;
use crate::{INODE_RECORD, parse_to_fsck_error};
use afsck_error::Result;
use afsck_ondisk::{
    APFS_DIR_STATS_VAL_SIZE, APFS_DSTREAM_SIZE, APFS_X_FIELD_SIZE, APFS_XF_BLOB_HEADER_SIZE,
    ApfsDstream, ApfsXField, ApfsXfBlobHeader,
};
use afsck_types::{
    APFS_INO_EXT_TYPE_DELTA_TREE_OID, APFS_INO_EXT_TYPE_DIR_STATS_KEY,
    APFS_INO_EXT_TYPE_DOCUMENT_ID, APFS_INO_EXT_TYPE_DSTREAM, APFS_INO_EXT_TYPE_FINDER_INFO,
    APFS_INO_EXT_TYPE_FS_UUID, APFS_INO_EXT_TYPE_NAME, APFS_INO_EXT_TYPE_PREV_FSIZE,
    APFS_INO_EXT_TYPE_RDEV, APFS_INO_EXT_TYPE_RESERVED_6, APFS_INO_EXT_TYPE_RESERVED_9,
    APFS_INO_EXT_TYPE_RESERVED_12, APFS_INO_EXT_TYPE_SNAP_XID, APFS_INO_EXT_TYPE_SPARSE_BYTES,
    xfield_padding,
};

const INODE_XFIELD: &str = "Inode xfield";

/// Parse and check the xfield blob of an inode record.
///
/// `blob` is everything after the fixed inode value. An empty blob means the
/// inode has no extended fields. The DSTREAM field, if present, sets the
/// inode's declared size.
pub fn parse_inode_xfields(blob: &[u8], inode: &mut Inode, reporter: &mut Reporter) -> Result<()> {
    if blob.is_empty() {
        return Ok(());
    }

    let Ok(header) = ApfsXfBlobHeader::parse_from_bytes(blob) else {
        return reporter.report(INODE_RECORD, "no room for extended fields.");
    };
    let count = usize::from(header.num_exts);
    let table_len = count * APFS_X_FIELD_SIZE;
    let rest = &blob[APFS_XF_BLOB_HEADER_SIZE..];
    if rest.len() < table_len {
        return reporter.report(INODE_RECORD, "number of xfields cannot fit.");
    }
    let (table, data) = rest.split_at(table_len);

    if usize::from(header.used_data) != data.len() {
        reporter.report(INODE_RECORD, "value size incompatible with xfields.")?;
    }

    let mut offset = 0;
    for index in 0..count {
        let xfield = ApfsXField::parse_at(table, index).map_err(|e| parse_to_fsck_error(&e))?;
        let Some(xlen) = payload_len(xfield.x_type, &data[offset..], inode, reporter)? else {
            return Ok(());
        };

        if xlen != usize::from(xfield.x_size) {
            return reporter.report(INODE_XFIELD, "wrong size");
        }

        let padded_end = offset
            .checked_add(xlen)
            .and_then(|end| end.checked_add(xfield_padding(xlen)))
            .filter(|&end| end <= data.len());
        let Some(padded_end) = padded_end else {
            return reporter.report(INODE_XFIELD, "does not fit in record value.");
        };

        if data[offset + xlen..padded_end].iter().any(|&b| b != 0) {
            reporter.report(INODE_XFIELD, "non-zero padding.")?;
        }
        offset = padded_end;
    }

    if offset != data.len() {
        reporter.report(INODE_RECORD, "length of xfields does not add up.")?;
    }
    Ok(())
}

/// Length of the payload of an xfield of type `x_type`, before padding.
///
/// `Ok(None)` means the length cannot be known and the rest of the blob must
/// be skipped; the finding has already been reported.
fn payload_len(
    x_type: u8,
    payload: &[u8],
    inode: &mut Inode,
    reporter: &mut Reporter,
) -> Result<Option<usize>> {
    let len = match x_type {
        APFS_INO_EXT_TYPE_FS_UUID => 16,
        APFS_INO_EXT_TYPE_SNAP_XID
        | APFS_INO_EXT_TYPE_DELTA_TREE_OID
        | APFS_INO_EXT_TYPE_PREV_FSIZE
        | APFS_INO_EXT_TYPE_SPARSE_BYTES => 8,
        APFS_INO_EXT_TYPE_DOCUMENT_ID
        | APFS_INO_EXT_TYPE_FINDER_INFO
        | APFS_INO_EXT_TYPE_RDEV => 4,
        APFS_INO_EXT_TYPE_NAME => {
            let Some(nul) = payload.iter().position(|&b| b == 0) else {
                reporter.report(INODE_XFIELD, "name with no null termination")?;
                return Ok(None);
            };
            nul + 1
        }
        APFS_INO_EXT_TYPE_DSTREAM => {
            let Ok(dstream) = ApfsDstream::parse_from_bytes(payload) else {
                reporter.report("Dstream xfield", "doesn't fit in inode record.")?;
                return Ok(None);
            };
            inode.size = dstream.size;
            APFS_DSTREAM_SIZE
        }
        APFS_INO_EXT_TYPE_DIR_STATS_KEY => APFS_DIR_STATS_VAL_SIZE,
        APFS_INO_EXT_TYPE_RESERVED_6
        | APFS_INO_EXT_TYPE_RESERVED_9
        | APFS_INO_EXT_TYPE_RESERVED_12 => {
            reporter.report(INODE_XFIELD, "reserved type in use.")?;
            return Ok(None);
        }
        _ => {
            reporter.report(INODE_XFIELD, "invalid type.")?;
            return Ok(None);
        }
    };
    Ok(Some(len))
}
