//! Merge engine for kbm.
//!
//! Takes one entity flagged as a duplicate and carries it through the
//! merge pipeline:
//!
//! 1. [`TargetResolver`] collects candidate targets from duplicate-marking
//!    claims, or from redirected sitelinks when there are none.
//! 2. [`RedirectResolver`] follows the chosen target to a non-redirect
//!    entity within a hop limit.
//! 3. [`ConflictChecker`] rejects targets whose sitelinks contradict the
//!    source and collects back-reference claims on the target.
//! 4. [`MergeExecutor`] performs the ordered writes and the clean merge.
//! 5. [`CompensatingRollback`] reverts edited entities when a write fails.
//!
//! Reads and decisions about one external site are serialized through the
//! [`SiteLockRegistry`]; every write goes through the single [`SaveLock`].

pub mod conflict;
pub mod context;
pub mod error;
pub mod executor;
pub mod job;
pub mod locks;
pub mod ordering;
pub mod pipeline;
pub mod policy;
pub mod redirect;
pub mod resolver;
pub mod rollback;
pub mod rules;

pub use conflict::{ConflictChecker, ConflictReport};
pub use context::{MergeContext, MergeSettings};
pub use error::{MergeError, MergeResult};
pub use executor::{EditJournal, MergeExecutor};
pub use job::{AbortReason, JobOutcome, MergeJob, SkipReason};
pub use locks::{SaveLock, SiteLockRegistry};
pub use ordering::{MergeOrdering, OrderingStrategy};
pub use pipeline::{Decision, MergePipeline};
pub use policy::MergePolicy;
pub use redirect::RedirectResolver;
pub use resolver::{Resolution, TargetResolver};
pub use rollback::CompensatingRollback;
pub use rules::DuplicateRules;
