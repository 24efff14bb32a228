use std::fmt;

use async_trait::async_trait;
use kbm_types::{ClaimId, Entity, EntityId, MergeField, SiteId};

use crate::error::StoreResult;

/// A single edit to one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Remove the claims with these ids.
    RemoveClaims(Vec<ClaimId>),
    /// Remove the sitelinks to these sites.
    RemoveSitelinks(Vec<SiteId>),
    /// Merge the entity into `target`. Fields in `ignore_conflicts` may
    /// differ between the two without failing the merge.
    MergeInto {
        target: EntityId,
        ignore_conflicts: Vec<MergeField>,
    },
    /// Drop all content of the entity.
    Clear,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::RemoveClaims(_) => MutationKind::RemoveClaims,
            Self::RemoveSitelinks(_) => MutationKind::RemoveSitelinks,
            Self::MergeInto { .. } => MutationKind::Merge,
            Self::Clear => MutationKind::Clear,
        }
    }
}

/// Discriminant of [`Mutation`], used for logging and fault injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    RemoveClaims,
    RemoveSitelinks,
    Merge,
    Clear,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveClaims => f.write_str("remove-claims"),
            Self::RemoveSitelinks => f.write_str("remove-sitelinks"),
            Self::Merge => f.write_str("merge"),
            Self::Clear => f.write_str("clear"),
        }
    }
}

/// One remote write.
#[derive(Clone, Debug)]
pub struct SaveRequest {
    pub entity: EntityId,
    pub mutation: Mutation,
    /// Short human-readable audit string stored with the edit.
    pub summary: String,
    /// Whether the caller allows the store to apply the write lazily.
    pub asynchronous: bool,
}

impl SaveRequest {
    pub fn new(entity: EntityId, mutation: Mutation, summary: impl Into<String>) -> Self {
        Self {
            entity,
            mutation,
            summary: summary.into(),
            asynchronous: false,
        }
    }
}

/// Acknowledgement of an applied write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveReceipt {
    pub entity: EntityId,
    /// Revision id of the entity after the write.
    pub revision: u64,
}

/// The remote knowledge store, as seen by the merge engine.
///
/// Implementations must be thread-safe. Every call is a remote round trip
/// from the caller's point of view; no call batches several writes.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Fetch the current state of an entity.
    ///
    /// Redirect entities are returned with `redirect` set and no content.
    /// Fails with `NotFound` if the entity does not exist.
    async fn fetch(&self, id: &EntityId) -> StoreResult<Entity>;

    /// Whether a page exists on the external site.
    async fn page_exists(&self, site: &SiteId, title: &str) -> StoreResult<bool>;

    /// The title a page redirects to, or `None` if it is not a redirect.
    async fn resolve_redirect(&self, site: &SiteId, title: &str) -> StoreResult<Option<String>>;

    /// The entity whose sitelink points at the page, if any.
    async fn linked_entity(&self, site: &SiteId, title: &str) -> StoreResult<Option<EntityId>>;

    /// Apply one mutation to one entity.
    async fn save(&self, request: SaveRequest) -> StoreResult<SaveReceipt>;

    /// Undo the most recent run of this client's edits on an entity.
    async fn revert(&self, id: &EntityId, summary: &str) -> StoreResult<SaveReceipt>;

    /// One page of entity ids matching `query`, starting at `offset`.
    async fn search(&self, query: &str, offset: u64, limit: usize) -> StoreResult<Vec<EntityId>>;

    /// Number of revisions an entity has.
    async fn revision_count(&self, id: &EntityId) -> StoreResult<usize>;

    /// Returns `true` if page `from` is a redirect to page `to` on `site`.
    async fn redirects_to(&self, site: &SiteId, from: &str, to: &str) -> StoreResult<bool> {
        Ok(self.resolve_redirect(site, from).await?.as_deref() == Some(to))
    }
}
