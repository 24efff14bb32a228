use std::collections::HashSet;

use kbm_store::KnowledgeStore;
use kbm_types::Entity;
use tracing::warn;

use crate::error::{MergeError, MergeResult};

/// Follows entity redirects to the entity that holds the content.
#[derive(Clone, Copy, Debug)]
pub struct RedirectResolver {
    max_hops: usize,
}

impl RedirectResolver {
    pub fn new(max_hops: usize) -> Self {
        Self { max_hops }
    }

    /// Follow `entity` until a non-redirect entity is reached.
    ///
    /// Fails with `RedirectDepthExceeded` if the chain is longer than the
    /// hop limit or revisits an entity.
    pub async fn resolve(&self, store: &dyn KnowledgeStore, entity: Entity) -> MergeResult<Entity> {
        let start = entity.id.clone();
        let mut visited = HashSet::from([start.clone()]);
        let mut current = entity;
        let mut hops = 0;
        while let Some(next) = current.redirect.clone() {
            hops += 1;
            if hops > self.max_hops || !visited.insert(next.clone()) {
                return Err(MergeError::RedirectDepthExceeded { start, hops });
            }
            warn!(entity = %current.id, redirect = %next, "target is a redirect");
            current = store.fetch(&next).await?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbm_store::InMemoryKnowledgeStore;
    use kbm_types::EntityId;

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn chain(store: &InMemoryKnowledgeStore, len: u64) {
        for i in 1..=len {
            store.insert_entity(
                Entity::redirect_to(qid(&format!("Q{i}")), qid(&format!("Q{}", i + 1))),
            );
        }
        store.insert_entity(Entity::new(qid(&format!("Q{}", len + 1))).with_label("en", "end"));
    }

    #[tokio::test]
    async fn non_redirect_is_returned_as_is() {
        let store = InMemoryKnowledgeStore::new();
        let entity = Entity::new(qid("Q1")).with_label("en", "x");
        let resolved = RedirectResolver::new(3).resolve(&store, entity.clone()).await.unwrap();
        assert_eq!(resolved, entity);
    }

    #[tokio::test]
    async fn follows_chain_within_limit() {
        let store = InMemoryKnowledgeStore::new();
        chain(&store, 3);
        let start = store.entity(&qid("Q1")).unwrap();
        let resolved = RedirectResolver::new(3).resolve(&store, start).await.unwrap();
        assert_eq!(resolved.id, qid("Q4"));
    }

    #[tokio::test]
    async fn chain_longer_than_limit_fails() {
        let store = InMemoryKnowledgeStore::new();
        chain(&store, 4);
        let start = store.entity(&qid("Q1")).unwrap();
        let err = RedirectResolver::new(3).resolve(&store, start).await.unwrap_err();
        assert!(matches!(err, MergeError::RedirectDepthExceeded { hops: 4, .. }));
    }

    #[tokio::test]
    async fn cycle_fails() {
        let store = InMemoryKnowledgeStore::new();
        store.insert_entity(Entity::redirect_to(qid("Q1"), qid("Q2")));
        store.insert_entity(Entity::redirect_to(qid("Q2"), qid("Q1")));
        let start = store.entity(&qid("Q1")).unwrap();
        let err = RedirectResolver::new(10).resolve(&store, start).await.unwrap_err();
        assert!(matches!(err, MergeError::RedirectDepthExceeded { hops: 2, .. }));
    }
}
