//! Corruption reporting.
//!
//! Every violated invariant goes through [`Reporter::report`] with a context
//! label naming the structure ("Inode record", "Inode xfield", ...) and a
//! short message. What happens next is decided by the [`ReportPolicy`].

use afsck_error::{FsckError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// What to do after a corruption is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPolicy {
    /// The first finding ends the scan as `FsckError::Corruption`.
    #[default]
    Abort,
    /// Findings are collected and the scan goes on. A record that cannot be
    /// decoded any further is skipped after its finding is recorded.
    Continue,
}

/// A single corruption finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub context: String,
    pub detail: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.detail)
    }
}

#[derive(Debug, Default)]
pub struct Reporter {
    policy: ReportPolicy,
    findings: Vec<Finding>,
}

impl Reporter {
    #[must_use]
    pub fn new(policy: ReportPolicy) -> Self {
        Self {
            policy,
            findings: Vec::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> ReportPolicy {
        self.policy
    }

    /// Record a corruption finding.
    ///
    /// Returns `Err(FsckError::Corruption)` under [`ReportPolicy::Abort`];
    /// callers propagate it with `?`.
    pub fn report(&mut self, context: &str, detail: &str) -> Result<()> {
        warn!(context, detail, "corruption detected");
        self.findings.push(Finding {
            context: context.to_owned(),
            detail: detail.to_owned(),
        });
        match self.policy {
            ReportPolicy::Abort => Err(FsckError::corruption(context, detail)),
            ReportPolicy::Continue => Ok(()),
        }
    }

    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    #[must_use]
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}
