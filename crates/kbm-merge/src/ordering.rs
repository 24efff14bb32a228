use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use kbm_store::KnowledgeStore;
use kbm_types::Entity;
use tracing::warn;

use crate::error::{MergeError, MergeResult};

/// A rule for picking which of two entities survives a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderingStrategy {
    /// The older (lower numbered) entity survives.
    Id,
    /// The entity with more claims survives.
    Claims,
    /// The entity with more revisions survives.
    Revisions,
    /// The entity with more sitelinks survives.
    Sitelinks,
}

impl FromStr for OrderingStrategy {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "claims" => Ok(Self::Claims),
            "revisions" => Ok(Self::Revisions),
            "sitelinks" => Ok(Self::Sitelinks),
            other => Err(MergeError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for OrderingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("id"),
            Self::Claims => f.write_str("claims"),
            Self::Revisions => f.write_str("revisions"),
            Self::Sitelinks => f.write_str("sitelinks"),
        }
    }
}

/// Ordered list of strategies. The first one that tells the two entities
/// apart decides; if none does, the first entity survives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOrdering {
    strategies: Vec<OrderingStrategy>,
}

impl MergeOrdering {
    pub fn new(strategies: Vec<OrderingStrategy>) -> Self {
        Self { strategies }
    }

    /// Parse a comma separated list such as `claims,id`. Unknown names are
    /// logged and skipped.
    pub fn parse(list: &str) -> Self {
        let strategies = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse() {
                Ok(strategy) => Some(strategy),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            })
            .collect();
        Self::new(strategies)
    }

    pub fn strategies(&self) -> &[OrderingStrategy] {
        &self.strategies
    }

    /// Split two entities into `(target, source)`.
    pub async fn order(
        &self,
        store: &dyn KnowledgeStore,
        a: Entity,
        b: Entity,
    ) -> MergeResult<(Entity, Entity)> {
        for strategy in &self.strategies {
            let preference = match strategy {
                OrderingStrategy::Id => b.id.numeric().cmp(&a.id.numeric()),
                OrderingStrategy::Claims => a.claim_count().cmp(&b.claim_count()),
                OrderingStrategy::Sitelinks => a.sitelinks.len().cmp(&b.sitelinks.len()),
                OrderingStrategy::Revisions => {
                    let ra = store.revision_count(&a.id).await?;
                    let rb = store.revision_count(&b.id).await?;
                    ra.cmp(&rb)
                }
            };
            match preference {
                Ordering::Equal => continue,
                Ordering::Greater => return Ok((a, b)),
                Ordering::Less => return Ok((b, a)),
            }
        }
        Ok((a, b))
    }
}

impl Default for MergeOrdering {
    fn default() -> Self {
        Self::new(vec![OrderingStrategy::Id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbm_store::InMemoryKnowledgeStore;
    use kbm_types::{Claim, EntityId, PropertyId, SiteId};

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn rich(id: &str) -> Entity {
        let p: PropertyId = "P1".parse().unwrap();
        Entity::new(qid(id))
            .with_claim(Claim::entity(p.clone(), qid("Q5")))
            .with_claim(Claim::entity(p, qid("Q6")))
    }

    #[tokio::test]
    async fn lower_id_survives_by_default() {
        let store = InMemoryKnowledgeStore::new();
        let (target, source) = MergeOrdering::default()
            .order(&store, Entity::new(qid("Q20")), Entity::new(qid("Q3")))
            .await
            .unwrap();
        assert_eq!(target.id, qid("Q3"));
        assert_eq!(source.id, qid("Q20"));
    }

    #[tokio::test]
    async fn first_deciding_strategy_wins() {
        let store = InMemoryKnowledgeStore::new();
        let ordering = MergeOrdering::parse("sitelinks, claims, id");
        assert_eq!(ordering.strategies().len(), 3);
        let (target, _) = ordering
            .order(&store, Entity::new(qid("Q1")), rich("Q2"))
            .await
            .unwrap();
        assert_eq!(target.id, qid("Q2"));

        let en = SiteId::new("enwiki").unwrap();
        let (target, _) = ordering
            .order(&store, Entity::new(qid("Q1")).with_sitelink(en, "X"), rich("Q2"))
            .await
            .unwrap();
        assert_eq!(target.id, qid("Q1"));
    }

    #[tokio::test]
    async fn revisions_are_counted_in_the_store() {
        let store = InMemoryKnowledgeStore::new();
        store.insert_entity(Entity::new(qid("Q1")));
        store.insert_entity(Entity::new(qid("Q2")));
        store
            .save(kbm_store::SaveRequest::new(
                qid("Q2"),
                kbm_store::Mutation::RemoveSitelinks(vec![]),
                "touch",
            ))
            .await
            .unwrap();
        let (target, _) = MergeOrdering::parse("revisions")
            .order(&store, store.entity(&qid("Q1")).unwrap(), store.entity(&qid("Q2")).unwrap())
            .await
            .unwrap();
        assert_eq!(target.id, qid("Q2"));
    }

    #[test]
    fn unknown_strategy_name_is_an_error() {
        let err = "newest".parse::<OrderingStrategy>().unwrap_err();
        assert!(matches!(err, MergeError::UnknownStrategy(name) if name == "newest"));
        assert_eq!("claims".parse::<OrderingStrategy>().unwrap(), OrderingStrategy::Claims);
    }

    #[test]
    fn unknown_strategies_are_skipped() {
        let ordering = MergeOrdering::parse("bogus,id");
        assert_eq!(ordering.strategies(), &[OrderingStrategy::Id]);
    }

    #[tokio::test]
    async fn tie_keeps_input_order() {
        let store = InMemoryKnowledgeStore::new();
        let (target, _) = MergeOrdering::parse("claims")
            .order(&store, Entity::new(qid("Q9")), Entity::new(qid("Q1")))
            .await
            .unwrap();
        assert_eq!(target.id, qid("Q9"));
    }
}
