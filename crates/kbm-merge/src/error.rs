use kbm_store::StoreError;
use kbm_types::{EntityId, PropertyId, SiteId};

use crate::job::AbortReason;

/// Errors that can occur while resolving, checking or executing a merge.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Source and target link contradictory live pages on one site.
    #[error("target has a conflicting sitelink: {site}")]
    SitelinkConflict { site: SiteId },

    /// The merge policy found incompatible values for a property.
    #[error("conflicting values for {property}")]
    PolicyConflict { property: PropertyId },

    /// A redirect chain was longer than allowed or looped.
    #[error("redirect chain from {start} exceeds {hops} hops")]
    RedirectDepthExceeded { start: EntityId, hops: usize },

    /// A save was rejected by the store.
    #[error("remote write failed: {0}")]
    RemoteWrite(#[source] StoreError),

    /// One or more compensating reverts failed.
    #[error("rollback failed: {}", failures.join("; "))]
    Rollback { failures: Vec<String> },

    /// A job reached the executor without a resolved target.
    #[error("no target resolved for {0}")]
    MissingTarget(EntityId),

    /// An ordering strategy name was not recognized.
    #[error("unknown ordering strategy: {0}")]
    UnknownStrategy(String),

    /// A read from the store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MergeError {
    /// The abort reason for errors that stop a job before any write.
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::SitelinkConflict { site } => {
                Some(AbortReason::SitelinkConflict { site: site.clone() })
            }
            Self::PolicyConflict { property } => Some(AbortReason::PolicyConflict {
                property: property.clone(),
            }),
            Self::RedirectDepthExceeded { start, hops } => Some(AbortReason::RedirectDepthExceeded {
                start: start.clone(),
                hops: *hops,
            }),
            _ => None,
        }
    }
}

pub type MergeResult<T> = Result<T, MergeError>;
