use std::collections::BTreeSet;
use std::fmt;

use kbm_types::{ClaimId, Entity, EntityId, PropertyId, SiteId};
use serde::Serialize;

use crate::executor::EditJournal;

/// Why a job ended without touching the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum SkipReason {
    /// The entity has no classification claim.
    NotClassified,
    /// No candidate target was found.
    NoTarget,
    /// More than one candidate target was found.
    Ambiguous { candidates: Vec<EntityId> },
}

/// Why a job was stopped before its first write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum AbortReason {
    SitelinkConflict { site: SiteId },
    PolicyConflict { property: PropertyId },
    RedirectDepthExceeded { start: EntityId, hops: usize },
}

/// Final state of a merge job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum JobOutcome {
    /// The source now redirects to `target`.
    Merged { target: EntityId },
    /// The source named itself as its duplicate; its markers were removed.
    SelfCleaned,
    Skipped(SkipReason),
    Aborted(AbortReason),
    /// A write failed and every edited entity was reverted.
    RolledBack { error: String },
    /// A write or read failed and the store may be left partially edited.
    Failed { error: String },
}

impl JobOutcome {
    /// Whether the source dropped out of the candidate query.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Merged { .. } | Self::SelfCleaned)
    }

    /// Whether the job ended in a real failure rather than a decision.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::RolledBack { .. }
                | Self::Failed { .. }
                | Self::Aborted(AbortReason::RedirectDepthExceeded { .. })
        )
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merged { target } => write!(f, "merged into {target}"),
            Self::SelfCleaned => f.write_str("removed self-referencing duplicate claims"),
            Self::Skipped(SkipReason::NotClassified) => f.write_str("skipped: not classified"),
            Self::Skipped(SkipReason::NoTarget) => f.write_str("skipped: no target found"),
            Self::Skipped(SkipReason::Ambiguous { candidates }) => {
                write!(f, "skipped: multiple targets found ({})", candidates.len())
            }
            Self::Aborted(AbortReason::SitelinkConflict { site }) => {
                write!(f, "aborted: conflicting sitelink on {site}")
            }
            Self::Aborted(AbortReason::PolicyConflict { property }) => {
                write!(f, "aborted: conflicting values for {property}")
            }
            Self::Aborted(AbortReason::RedirectDepthExceeded { start, hops }) => {
                write!(f, "aborted: redirect chain from {start} exceeds {hops} hops")
            }
            Self::RolledBack { error } => write!(f, "rolled back: {error}"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// State of one source entity as it moves through the pipeline.
#[derive(Clone, Debug)]
pub struct MergeJob {
    pub source: Entity,
    /// Candidate targets, deduplicated.
    pub candidates: BTreeSet<EntityId>,
    /// The resolved target, after following redirects.
    pub target: Option<Entity>,
    /// Duplicate-marking claims to remove from the source.
    pub source_claims: Vec<ClaimId>,
    /// Dead sitelinks to remove from the source.
    pub source_sitelinks: Vec<SiteId>,
    /// Back-reference claims to remove from the target.
    pub target_claims: Vec<ClaimId>,
    /// Dead sitelinks to remove from the target.
    pub target_sitelinks: Vec<SiteId>,
    /// Writes applied so far.
    pub journal: EditJournal,
    pub outcome: Option<JobOutcome>,
}

impl MergeJob {
    pub fn new(source: Entity) -> Self {
        Self {
            source,
            candidates: BTreeSet::new(),
            target: None,
            source_claims: Vec::new(),
            source_sitelinks: Vec::new(),
            target_claims: Vec::new(),
            target_sitelinks: Vec::new(),
            journal: EditJournal::default(),
            outcome: None,
        }
    }

    pub fn source_id(&self) -> &EntityId {
        &self.source.id
    }

    pub fn target_id(&self) -> Option<&EntityId> {
        self.target.as_ref().map(|t| &t.id)
    }

    /// Whether the source names itself as its original.
    pub fn is_self_merge(&self) -> bool {
        self.target_id() == Some(&self.source.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    #[test]
    fn success_and_failure_classes() {
        assert!(JobOutcome::Merged { target: qid("Q1") }.is_success());
        assert!(JobOutcome::SelfCleaned.is_success());
        assert!(!JobOutcome::Skipped(SkipReason::NoTarget).is_success());
        assert!(!JobOutcome::Skipped(SkipReason::NoTarget).is_failure());
        let conflict = JobOutcome::Aborted(AbortReason::SitelinkConflict {
            site: SiteId::new("enwiki").unwrap(),
        });
        assert!(!conflict.is_failure());
        let depth = AbortReason::RedirectDepthExceeded {
            start: qid("Q1"),
            hops: 11,
        };
        assert!(JobOutcome::Aborted(depth).is_failure());
        assert!(JobOutcome::RolledBack { error: "x".into() }.is_failure());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(JobOutcome::Skipped(SkipReason::Ambiguous {
            candidates: vec![qid("Q2"), qid("Q3")],
        }))
        .unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "ambiguous");
        assert_eq!(json["candidates"][1], "Q3");
    }

    #[test]
    fn self_merge_detection() {
        let mut job = MergeJob::new(Entity::new(qid("Q1")));
        assert!(!job.is_self_merge());
        job.target = Some(Entity::new(qid("Q1")));
        assert!(job.is_self_merge());
    }
}
