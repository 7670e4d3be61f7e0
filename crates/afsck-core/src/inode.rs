//! Inodes: parsing of inode records and the checks that wait for the end of
//! the catalog.

use crate::dstream::{CnidUse, Dstream};
use crate::ids::check_inode_ids;
use crate::report::Reporter;
use crate::xfield::parse_inode_xfields;
use crate::{Checker, INODE_RECORD, parse_to_fsck_error};
use afsck_error::Result;
use afsck_htable::{IdTable, TableEntry};
use afsck_ondisk::{APFS_INODE_VAL_SIZE, ApfsInodeVal, ApfsKeyHeader};
use afsck_types::{
    InodeNumber, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG, S_IFSOCK,
};
use serde::Serialize;
use tracing::debug;

/// What the checker knows about one inode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inode {
    pub ino: InodeNumber,
    /// Full mode once the inode record is parsed; before that, at most the
    /// type bits a directory entry reported.
    pub mode: u16,
    /// Directory entries that point to this inode.
    pub link_count: u32,
    /// Link count stored in the inode record (non-directories).
    pub nlink: u32,
    pub private_id: u64,
    /// Size declared by the DSTREAM xfield.
    pub size: u64,
    /// Directory entries found inside this directory.
    pub child_count: u32,
    /// Child count stored in the inode record (directories).
    pub nchildren: u32,
    /// Set once the inode record has been parsed.
    pub seen: bool,
}

impl Inode {
    #[must_use]
    pub fn file_type(&self) -> u16 {
        self.mode & S_IFMT
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type() == S_IFDIR
    }

    /// Note a directory entry naming this inode with type bits `file_type`.
    ///
    /// Returns false if the inode already has a different type.
    #[must_use]
    pub fn record_dentry(&mut self, file_type: u16) -> bool {
        self.link_count = self.link_count.saturating_add(1);
        let file_type = file_type & S_IFMT;
        if self.mode == 0 {
            self.mode = file_type;
            return true;
        }
        self.file_type() == file_type
    }

    /// Note a directory entry found inside this directory.
    pub fn record_child(&mut self) {
        self.child_count = self.child_count.saturating_add(1);
    }
}

impl TableEntry for Inode {
    fn new(id: u64) -> Self {
        Self {
            ino: InodeNumber(id),
            ..Self::default()
        }
    }

    fn id(&self) -> u64 {
        self.ino.0
    }
}

/// Objects counted by file type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InodeStats {
    pub files: u64,
    /// Directories, not counting the synthetic ones.
    pub dirs: u64,
    pub symlinks: u64,
    /// Sockets, block and character devices, and fifos.
    pub special: u64,
}

impl Checker {
    /// Parse an inode record and check it for corruption.
    ///
    /// `key` must already have been validated as an inode key by the catalog
    /// layer.
    pub fn parse_inode_record(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = ApfsKeyHeader::parse_from_bytes(key).map_err(|e| parse_to_fsck_error(&e))?;
        let Self {
            reporter,
            stats,
            inodes,
            cnids,
            ..
        } = self;

        if value.len() < APFS_INODE_VAL_SIZE {
            return reporter.report(INODE_RECORD, "value is too small.");
        }
        let val = ApfsInodeVal::parse_from_bytes(value).map_err(|e| parse_to_fsck_error(&e))?;

        let ino = key.inode_number();
        let inode = inodes.get_or_create(ino.0)?;
        if inode.seen {
            return reporter.report("Catalog", "inode numbers are repeated.");
        }
        inode.seen = true;
        inode.private_id = val.private_id;
        cnids.get_or_create(ino.0)?.mark(CnidUse::Inode);
        if val.private_id != ino.0 {
            cnids.get_or_create(val.private_id)?.mark(CnidUse::Dstream);
        }

        if let Some(violation) = check_inode_ids(ino, val.parent_ino()) {
            reporter.report(violation.context(), violation.detail())?;
        }

        // A dentry may have already set the mode, but only the type bits
        let file_type = val.file_type();
        if inode.mode != 0 && inode.mode != file_type {
            reporter.report(INODE_RECORD, "file mode doesn't match dentry type.")?;
        }
        inode.mode = val.mode;

        match file_type {
            S_IFREG => stats.files += 1,
            S_IFDIR => {
                if !ino.is_reserved() {
                    stats.dirs += 1;
                }
            }
            S_IFLNK => stats.symlinks += 1,
            S_IFSOCK | S_IFBLK | S_IFCHR | S_IFIFO => stats.special += 1,
            _ => reporter.report(INODE_RECORD, "invalid file mode.")?,
        }

        if file_type == S_IFDIR {
            inode.nchildren = val.nchildren_or_nlink;
        } else {
            inode.nlink = val.nchildren_or_nlink;
        }

        if val.pad1 != 0 || val.pad2 != 0 {
            reporter.report(INODE_RECORD, "padding should be zeroes.")?;
        }

        debug!(
            ino = %ino,
            mode = val.mode,
            private_id = val.private_id,
            "parsed inode record"
        );
        parse_inode_xfields(ApfsInodeVal::xfields(value), inode, reporter)
    }
}

/// Verify the stats gathered during the scan against an inode's metadata.
///
/// Runs once per inode while the inode table is released, so every record
/// that could touch the inode or its data stream has been seen. A data
/// stream missing from `dstreams` covers no bytes.
pub fn check_inode_stats(
    inode: &Inode,
    dstreams: &IdTable<Dstream>,
    reporter: &mut Reporter,
) -> Result<()> {
    if inode.is_dir() {
        if inode.link_count != 1 {
            reporter.report(INODE_RECORD, "directory has hard links.")?;
        }
        if inode.nchildren != inode.child_count {
            reporter.report(INODE_RECORD, "wrong directory child count.")?;
        }
    } else if inode.nlink != inode.link_count {
        reporter.report(INODE_RECORD, "wrong link count.")?;
    }

    let covered = dstreams.get(inode.private_id).map_or(0, |ds| ds.size);
    if covered < inode.size {
        reporter.report(INODE_RECORD, "some extents are missing.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportPolicy;
    use crate::{CheckOptions, test_support::InodeRecord};
    use afsck_error::FsckError;

    fn checker(policy: ReportPolicy) -> Checker {
        Checker::new(CheckOptions { policy }).unwrap()
    }

    fn details(checker: &Checker) -> Vec<String> {
        checker.findings().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn regular_file_record_populates_the_inode() {
        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::file(20).private_id(21).nlink(2).size(300);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();

        let inode = ck.inode(InodeNumber(20)).unwrap();
        assert!(inode.seen);
        assert_eq!(inode.private_id, 21);
        assert_eq!(inode.nlink, 2);
        assert_eq!(inode.size, 300);
        assert_eq!(inode.file_type(), S_IFREG);
        assert_eq!(ck.stats().files, 1);
        assert!(ck.cnid_used_by(20, CnidUse::Inode));
    }

    #[test]
    fn short_value_is_rejected() {
        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::file(20);
        let value = rec.value();
        for len in [0, 1, APFS_INODE_VAL_SIZE - 1] {
            let err = ck.parse_inode_record(&rec.key(), &value[..len]).unwrap_err();
            assert_eq!(err.to_string(), "Inode record: value is too small.");
        }
        assert!(ck.inode(InodeNumber(20)).is_none());
    }

    #[test]
    fn repeated_inode_number_is_rejected() {
        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::file(20);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        let other = InodeRecord::dir(20);
        let err = ck
            .parse_inode_record(&other.key(), &other.value())
            .unwrap_err();
        assert_eq!(err.to_string(), "Catalog: inode numbers are repeated.");
        assert_eq!(ck.inode(InodeNumber(20)).unwrap().file_type(), S_IFREG);
    }

    #[test]
    fn short_key_is_a_parse_error() {
        let mut ck = checker(ReportPolicy::Continue);
        let rec = InodeRecord::file(20);
        let err = ck.parse_inode_record(&[0; 4], &rec.value()).unwrap_err();
        assert!(matches!(err, FsckError::Parse(_)));
    }

    #[test]
    fn root_dir_needs_root_parent() {
        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::dir(InodeNumber::ROOT_DIR.0).parent(InodeNumber::ROOT_DIR.0);
        let err = ck.parse_inode_record(&rec.key(), &rec.value()).unwrap_err();
        assert_eq!(err.to_string(), "Root inode record: bad parent id");

        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::dir(InodeNumber::ROOT_DIR.0).parent(InodeNumber::ROOT_DIR_PARENT.0);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        // Synthetic directories are not counted.
        assert_eq!(ck.stats().dirs, 0);
    }

    #[test]
    fn dentry_type_must_match_mode() {
        let mut ck = checker(ReportPolicy::Continue);
        assert!(ck.get_inode(InodeNumber(30)).unwrap().record_dentry(S_IFDIR));
        let rec = InodeRecord::file(30);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        assert_eq!(
            details(&ck),
            vec!["Inode record: file mode doesn't match dentry type."]
        );

        assert!(ck.get_inode(InodeNumber(31)).unwrap().record_dentry(S_IFREG));
        let rec = InodeRecord::file(31);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        assert_eq!(details(&ck).len(), 1);
    }

    #[test]
    fn file_types_are_counted() {
        let mut ck = checker(ReportPolicy::Abort);
        let modes = [S_IFREG, S_IFDIR, S_IFLNK, S_IFSOCK, S_IFBLK, S_IFCHR, S_IFIFO];
        for (i, mode) in modes.into_iter().enumerate() {
            let rec = InodeRecord::file(100 + i as u64).mode(mode | 0o600);
            ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        }
        let stats = ck.stats();
        assert_eq!(
            (stats.files, stats.dirs, stats.symlinks, stats.special),
            (1, 1, 1, 4)
        );
    }

    #[test]
    fn invalid_file_type_is_rejected() {
        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::file(20).mode(0o030_000 | 0o644);
        let err = ck.parse_inode_record(&rec.key(), &rec.value()).unwrap_err();
        assert_eq!(err.to_string(), "Inode record: invalid file mode.");
    }

    #[test]
    fn nonzero_padding_fields_are_rejected() {
        for (offset, byte) in [(0x52, 1_u8), (0x54, 1), (0x5B, 0x80)] {
            let mut ck = checker(ReportPolicy::Abort);
            let rec = InodeRecord::file(20);
            let mut value = rec.value();
            value[offset] = byte;
            let err = ck.parse_inode_record(&rec.key(), &value).unwrap_err();
            assert_eq!(err.to_string(), "Inode record: padding should be zeroes.");
        }
    }

    #[test]
    fn directory_record_fills_declared_children() {
        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::dir(40).nlink(3);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        let inode = ck.inode(InodeNumber(40)).unwrap();
        assert_eq!(inode.nchildren, 3);
        assert_eq!(inode.nlink, 0);
        assert_eq!(ck.stats().dirs, 1);
    }

    #[test]
    fn continue_policy_skips_rest_of_bad_record() {
        let mut ck = checker(ReportPolicy::Continue);
        let rec = InodeRecord::file(20);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        ck.parse_inode_record(&rec.key(), &[0; 8]).unwrap();
        assert_eq!(
            details(&ck),
            vec![
                "Catalog: inode numbers are repeated.",
                "Inode record: value is too small.",
            ]
        );
        assert_eq!(ck.stats().files, 1);
    }

    fn stats_findings(inode: &Inode, dstreams: &IdTable<Dstream>) -> Vec<String> {
        let mut reporter = Reporter::new(ReportPolicy::Continue);
        check_inode_stats(inode, dstreams, &mut reporter).unwrap();
        reporter
            .into_findings()
            .into_iter()
            .map(|f| f.to_string())
            .collect()
    }

    fn dir_inode(link_count: u32, child_count: u32, nchildren: u32) -> Inode {
        Inode {
            mode: S_IFDIR | 0o755,
            link_count,
            child_count,
            nchildren,
            seen: true,
            ..Inode::new(50)
        }
    }

    #[test]
    fn directory_with_hard_links_is_rejected() {
        let dstreams = IdTable::new().unwrap();
        assert!(stats_findings(&dir_inode(1, 2, 2), &dstreams).is_empty());
        assert_eq!(
            stats_findings(&dir_inode(2, 2, 2), &dstreams),
            vec!["Inode record: directory has hard links."]
        );
        assert_eq!(
            stats_findings(&dir_inode(1, 3, 2), &dstreams),
            vec!["Inode record: wrong directory child count."]
        );
    }

    #[test]
    fn file_link_count_must_match() {
        let dstreams = IdTable::new().unwrap();
        let inode = Inode {
            mode: S_IFREG,
            nlink: 2,
            link_count: 1,
            ..Inode::new(60)
        };
        assert_eq!(
            stats_findings(&inode, &dstreams),
            vec!["Inode record: wrong link count."]
        );
    }

    #[test]
    fn declared_size_must_be_covered() {
        let mut dstreams = IdTable::<Dstream>::new().unwrap();
        let inode = Inode {
            mode: S_IFREG,
            nlink: 1,
            link_count: 1,
            private_id: 61,
            size: 5000,
            ..Inode::new(60)
        };
        assert_eq!(
            stats_findings(&inode, &dstreams),
            vec!["Inode record: some extents are missing."]
        );

        dstreams.get_or_create(61).unwrap().record_extent(4096);
        assert_eq!(
            stats_findings(&inode, &dstreams),
            vec!["Inode record: some extents are missing."]
        );

        dstreams.get_or_create(61).unwrap().record_extent(4096);
        assert!(stats_findings(&inode, &dstreams).is_empty());
    }

    #[test]
    fn gap_between_extents_is_missing_coverage() {
        let mut dstreams = IdTable::<Dstream>::new().unwrap();
        let inode = Inode {
            mode: S_IFREG,
            nlink: 1,
            link_count: 1,
            private_id: 7,
            size: 12288,
            ..Inode::new(60)
        };
        // Extents at 0 and 8192; the middle 4096 bytes are never covered.
        let ds = dstreams.get_or_create(7).unwrap();
        ds.record_extent(4096);
        ds.record_extent(4096);
        assert_eq!(
            stats_findings(&inode, &dstreams),
            vec!["Inode record: some extents are missing."]
        );
    }

    #[test]
    fn separate_private_id_is_marked_as_dstream_cnid() {
        let mut ck = checker(ReportPolicy::Abort);
        let rec = InodeRecord::file(20).private_id(70);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        assert!(ck.cnid_used_by(20, CnidUse::Inode));
        assert!(!ck.cnid_used_by(20, CnidUse::Dstream));
        assert!(ck.cnid_used_by(70, CnidUse::Dstream));
        assert!(!ck.cnid_used_by(70, CnidUse::Inode));

        let rec = InodeRecord::file(21);
        ck.parse_inode_record(&rec.key(), &rec.value()).unwrap();
        assert!(!ck.cnid_used_by(21, CnidUse::Dstream));
    }
}
