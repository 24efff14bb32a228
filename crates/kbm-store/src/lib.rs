//! Knowledge store interface for kbm.
//!
//! The merge engine never talks to a knowledge base directly. Everything it
//! needs from the remote side goes through the [`KnowledgeStore`] trait:
//! fetching entities, checking pages on external sites, saving one mutation
//! per call, reverting, and running candidate searches.
//!
//! # Backends
//!
//! - [`InMemoryKnowledgeStore`] -- revision-tracking store for tests, local
//!   runs against JSON [`Snapshot`] fixtures, and fault-injection scenarios
//!
//! # Design Rules
//!
//! 1. One `save` is one remote write. Writes are never batched or combined.
//! 2. Writes are not transactional with each other.
//! 3. `revert` undoes the trailing run of this client's edits on an entity
//!    and may fail; callers treat it as best effort.
//! 4. Redirect entities are returned as-is by `fetch`; following them is
//!    the caller's job.

pub mod error;
pub mod memory;
pub mod probe;
pub mod search;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{Fault, InMemoryKnowledgeStore, Revision, SaveRecord};
pub use probe::AccessProbe;
pub use search::SearchQuery;
pub use snapshot::{PageRecord, Snapshot};
pub use traits::{KnowledgeStore, Mutation, MutationKind, SaveReceipt, SaveRequest};
