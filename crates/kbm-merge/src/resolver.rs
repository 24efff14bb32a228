use std::collections::BTreeSet;

use kbm_types::{ClaimId, Entity, EntityId, SiteId};
use tracing::debug;

use crate::context::MergeContext;
use crate::error::MergeResult;

/// What the resolver learned about a source entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Entities the source could be merged into.
    pub candidates: BTreeSet<EntityId>,
    /// Claims on the source that mark it as a duplicate.
    pub claims: Vec<ClaimId>,
    /// Sites whose linked page no longer exists.
    pub dead_sitelinks: Vec<SiteId>,
}

/// Determines merge targets for a source entity.
///
/// Targets come from the duplicate qualifiers of duplicate-marking claims
/// and from direct same-as claims. Only when neither yields a target are
/// the source's sitelinks inspected: a missing page marks the sitelink for
/// removal, and a redirected page makes the entity linked to the redirect
/// target a candidate. Each site is inspected under its site lock.
pub struct TargetResolver<'a> {
    ctx: &'a MergeContext,
}

impl<'a> TargetResolver<'a> {
    pub fn new(ctx: &'a MergeContext) -> Self {
        Self { ctx }
    }

    pub async fn resolve(&self, source: &Entity) -> MergeResult<Resolution> {
        let rules = &self.ctx.rules;
        let mut resolution = Resolution::default();

        for claim in source.claims_for(&rules.instance_of) {
            if !rules.is_duplicate_marker(claim) {
                continue;
            }
            resolution.claims.push(claim.id.clone());
            resolution
                .candidates
                .extend(rules.qualified_targets(claim).cloned());
        }
        for claim in source.claims_for(&rules.same_as) {
            if let Some(target) = claim.target_entity() {
                resolution.claims.push(claim.id.clone());
                resolution.candidates.insert(target.clone());
            }
        }

        if resolution.candidates.is_empty() {
            self.resolve_sitelinks(source, &mut resolution).await?;
        }
        debug!(
            entity = %source.id,
            candidates = resolution.candidates.len(),
            claims = resolution.claims.len(),
            "resolved targets"
        );
        Ok(resolution)
    }

    async fn resolve_sitelinks(
        &self,
        source: &Entity,
        resolution: &mut Resolution,
    ) -> MergeResult<()> {
        let store = self.ctx.store.as_ref();
        for (site, title) in &source.sitelinks {
            let _guard = self.ctx.site_locks.acquire(site).await;
            if !store.page_exists(site, title).await? {
                debug!(entity = %source.id, %site, %title, "linked page does not exist");
                resolution.dead_sitelinks.push(site.clone());
                continue;
            }
            let Some(redirect) = store.resolve_redirect(site, title).await? else {
                continue;
            };
            match store.linked_entity(site, &redirect).await? {
                Some(target) => {
                    debug!(
                        entity = %source.id,
                        %site,
                        %redirect,
                        %target,
                        "linked page is a redirect"
                    );
                    resolution.candidates.insert(target);
                }
                None => {
                    debug!(entity = %source.id, %site, %redirect, "redirect target is not linked")
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MergeSettings;
    use crate::rules::DuplicateRules;
    use kbm_store::InMemoryKnowledgeStore;
    use kbm_types::{Claim, PropertyId, Snak};
    use std::sync::Arc;

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn pid(s: &str) -> PropertyId {
        s.parse().unwrap()
    }

    fn site(s: &str) -> SiteId {
        SiteId::new(s).unwrap()
    }

    fn ctx(store: &Arc<InMemoryKnowledgeStore>) -> MergeContext {
        MergeContext::new(store.clone(), DuplicateRules::default(), MergeSettings::default())
    }

    fn marker(qualifier: &str, target: &str) -> Claim {
        Claim::entity(pid("P31"), qid("Q17362920"))
            .with_qualifier(Snak::entity(pid(qualifier), qid(target)))
    }

    #[tokio::test]
    async fn qualifier_targets() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(
            Entity::new(qid("Q1"))
                .with_claim(marker("P642", "Q2"))
                .with_claim(Claim::entity(pid("P31"), qid("Q5"))),
        );
        let source = store.entity(&qid("Q1")).unwrap();
        let ctx = ctx(&store);
        let res = TargetResolver::new(&ctx).resolve(&source).await.unwrap();
        assert_eq!(res.candidates, BTreeSet::from([qid("Q2")]));
        assert_eq!(res.claims.len(), 1);
        assert!(res.dead_sitelinks.is_empty());
    }

    #[tokio::test]
    async fn direct_same_as_claim() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(
            Entity::new(qid("Q1"))
                .with_claim(Claim::entity(pid("P31"), qid("Q17362920")))
                .with_claim(Claim::entity(pid("P460"), qid("Q3"))),
        );
        let source = store.entity(&qid("Q1")).unwrap();
        let ctx = ctx(&store);
        let res = TargetResolver::new(&ctx).resolve(&source).await.unwrap();
        assert_eq!(res.candidates, BTreeSet::from([qid("Q3")]));
        assert_eq!(res.claims.len(), 2);
    }

    #[tokio::test]
    async fn several_targets_are_all_reported() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(
            Entity::new(qid("Q1"))
                .with_claim(marker("P460", "Q2"))
                .with_claim(marker("P642", "Q3")),
        );
        let source = store.entity(&qid("Q1")).unwrap();
        let ctx = ctx(&store);
        let res = TargetResolver::new(&ctx).resolve(&source).await.unwrap();
        assert_eq!(res.candidates.len(), 2);
    }

    #[tokio::test]
    async fn sitelink_fallback() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let en = site("enwiki");
        let de = site("dewiki");
        store.insert_entity(
            Entity::new(qid("Q1"))
                .with_claim(Claim::entity(pid("P31"), qid("Q17362920")))
                .with_sitelink(en.clone(), "Old")
                .with_sitelink(de.clone(), "Gone"),
        );
        store.insert_entity(Entity::new(qid("Q9")).with_sitelink(en.clone(), "New"));
        store.add_redirect_page(&en, "Old", "New");
        store.add_page(&en, "New");

        let source = store.entity(&qid("Q1")).unwrap();
        let ctx = ctx(&store);
        let res = TargetResolver::new(&ctx).resolve(&source).await.unwrap();
        assert_eq!(res.candidates, BTreeSet::from([qid("Q9")]));
        assert_eq!(res.dead_sitelinks, vec![de]);
        assert_eq!(res.claims.len(), 1);
    }

    #[tokio::test]
    async fn sitelinks_ignored_when_claims_name_a_target() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let en = site("enwiki");
        store.insert_entity(
            Entity::new(qid("Q1"))
                .with_claim(marker("P642", "Q2"))
                .with_sitelink(en.clone(), "Gone"),
        );
        let source = store.entity(&qid("Q1")).unwrap();
        let ctx = ctx(&store);
        let res = TargetResolver::new(&ctx).resolve(&source).await.unwrap();
        assert!(res.dead_sitelinks.is_empty());
        assert_eq!(store.probe().site_reads(&en), 0);
    }

    #[tokio::test]
    async fn nothing_found() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(
            Entity::new(qid("Q1")).with_claim(Claim::entity(pid("P31"), qid("Q17362920"))),
        );
        let source = store.entity(&qid("Q1")).unwrap();
        let ctx = ctx(&store);
        let res = TargetResolver::new(&ctx).resolve(&source).await.unwrap();
        assert!(res.candidates.is_empty());
    }
}
