use std::fmt;

use kbm_merge::{AbortReason, JobOutcome, SkipReason};
use kbm_stream::ProgressTracker;
use serde::Serialize;

/// Tally of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Candidates taken from the stream.
    pub processed: u64,
    pub merged: u64,
    pub self_cleaned: u64,
    /// Unclassified, missing or target-less candidates.
    pub skipped: u64,
    pub ambiguous: u64,
    /// Sitelink and policy conflicts.
    pub conflicts: u64,
    pub rolled_back: u64,
    pub failed: u64,
    pub final_offset: u64,
    pub resume_offset: u64,
}

impl RunReport {
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Merged { .. } => self.merged += 1,
            JobOutcome::SelfCleaned => self.self_cleaned += 1,
            JobOutcome::Skipped(SkipReason::Ambiguous { .. }) => self.ambiguous += 1,
            JobOutcome::Skipped(_) => self.skipped += 1,
            JobOutcome::Aborted(AbortReason::RedirectDepthExceeded { .. }) => self.failed += 1,
            JobOutcome::Aborted(_) => self.conflicts += 1,
            JobOutcome::RolledBack { .. } => self.rolled_back += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Copy the offsets out of the tracker.
    pub fn finish(&mut self, progress: &ProgressTracker) {
        self.final_offset = progress.current();
        self.resume_offset = progress.resume_offset();
    }

    /// Number of jobs with a recorded outcome.
    pub fn completed(&self) -> u64 {
        self.merged
            + self.self_cleaned
            + self.skipped
            + self.ambiguous
            + self.conflicts
            + self.rolled_back
            + self.failed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "processed:    {}", self.processed)?;
        writeln!(f, "merged:       {}", self.merged)?;
        writeln!(f, "self-cleaned: {}", self.self_cleaned)?;
        writeln!(f, "skipped:      {}", self.skipped)?;
        writeln!(f, "ambiguous:    {}", self.ambiguous)?;
        writeln!(f, "conflicts:    {}", self.conflicts)?;
        writeln!(f, "rolled back:  {}", self.rolled_back)?;
        writeln!(f, "failed:       {}", self.failed)?;
        write!(
            f,
            "current offset: {} (use {})",
            self.final_offset, self.resume_offset
        )
    }
}
