#![forbid(unsafe_code)]
//! Inode checking core of the APFS consistency checker.
//!
//! The catalog layer walks the catalog in key order and hands every inode
//! record to [`Checker::parse_inode_record`]. Directory entry and extent
//! parsing feed the same [`Checker`] through [`Checker::get_inode`] and
//! [`Checker::get_dstream`]. Once the whole catalog has been seen,
//! [`Checker::finish`] releases the tables, running the checks that need
//! global information (link counts, child counts, extent coverage) on every
//! inode before it is dropped.
//!
//! Nothing here writes to the image.

pub mod dstream;
pub mod ids;
pub mod inode;
pub mod report;
pub mod xfield;

pub use dstream::{CnidUse, Dstream, ListedCnid};
pub use ids::{IdViolation, check_inode_ids};
pub use inode::{Inode, InodeStats, check_inode_stats};
pub use report::{Finding, ReportPolicy, Reporter};
pub use xfield::parse_inode_xfields;

use afsck_error::{FsckError, Result};
use afsck_htable::IdTable;
use afsck_types::{InodeNumber, ParseError};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub(crate) const INODE_RECORD: &str = "Inode record";

/// Convert a byte-level `ParseError` into an `FsckError`.
pub(crate) fn parse_to_fsck_error(e: &ParseError) -> FsckError {
    FsckError::Parse(e.to_string())
}

/// Scan options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    pub policy: ReportPolicy,
}

/// Outcome of a scan that ran to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub stats: InodeStats,
    pub inodes_checked: usize,
    /// Every corruption found, in the order it was reported.
    pub findings: Vec<Finding>,
}

impl CheckSummary {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// State shared by every stage of one catalog scan.
#[derive(Debug)]
pub struct Checker {
    reporter: Reporter,
    stats: InodeStats,
    inodes: IdTable<Inode>,
    dstreams: IdTable<Dstream>,
    cnids: IdTable<ListedCnid>,
}

impl Checker {
    /// Set up empty tables for a new scan.
    pub fn new(options: CheckOptions) -> Result<Self> {
        Ok(Self {
            reporter: Reporter::new(options.policy),
            stats: InodeStats::default(),
            inodes: IdTable::new()?,
            dstreams: IdTable::new()?,
            cnids: IdTable::new()?,
        })
    }

    /// Find or create the inode structure for `ino`.
    pub fn get_inode(&mut self, ino: InodeNumber) -> Result<&mut Inode> {
        self.inodes.get_or_create(ino.0)
    }

    #[must_use]
    pub fn inode(&self, ino: InodeNumber) -> Option<&Inode> {
        self.inodes.get(ino.0)
    }

    /// Find or create the data stream structure for `id`.
    pub fn get_dstream(&mut self, id: u64) -> Result<&mut Dstream> {
        self.dstreams.get_or_create(id)
    }

    /// Find or create the cnid structure for `id`.
    pub fn get_listed_cnid(&mut self, id: u64) -> Result<&mut ListedCnid> {
        self.cnids.get_or_create(id)
    }

    #[must_use]
    pub fn cnid_used_by(&self, id: u64, kind: CnidUse) -> bool {
        self.cnids.get(id).is_some_and(|cnid| cnid.is_used_by(kind))
    }

    /// Report a corruption found by a collaborating stage.
    pub fn report(&mut self, context: &str, detail: &str) -> Result<()> {
        self.reporter.report(context, detail)
    }

    #[must_use]
    pub fn stats(&self) -> &InodeStats {
        &self.stats
    }

    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        self.reporter.findings()
    }

    /// End the scan: check and free every inode, then free the other tables.
    ///
    /// The inode table goes first because its checks read the data streams.
    pub fn finish(self) -> Result<CheckSummary> {
        let Self {
            mut reporter,
            stats,
            inodes,
            dstreams,
            cnids,
        } = self;

        let inodes_checked = inodes.len();
        inodes.for_each_then_free(|inode| check_inode_stats(&inode, &dstreams, &mut reporter))?;
        dstreams.for_each_then_free(|_| Ok(()))?;
        cnids.for_each_then_free(|_| Ok(()))?;

        let findings = reporter.into_findings();
        info!(
            inodes_checked,
            files = stats.files,
            dirs = stats.dirs,
            symlinks = stats.symlinks,
            special = stats.special,
            findings = findings.len(),
            "catalog inode checks complete"
        );
        Ok(CheckSummary {
            stats,
            inodes_checked,
            findings,
        })
    }
}

/// Top-level boundary for unrecoverable errors.
///
/// Passes everything through except fatal errors (allocation failure), which
/// are printed to stderr before the process exits with a non-zero status.
pub fn exit_on_fatal<T>(result: Result<T>) -> Result<T> {
    match result {
        Err(err) if err.is_fatal() => {
            error!(error = %err, "fatal error, exiting");
            eprintln!("afsck: {err}");
            std::process::exit(err.exit_code());
        }
        other => other,
    }
}
