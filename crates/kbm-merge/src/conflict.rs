use kbm_types::{ClaimId, Entity, SiteId};
use tracing::debug;

use crate::context::MergeContext;
use crate::error::{MergeError, MergeResult};

/// Cleanup the executor must do before the merge itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictReport {
    /// Source sitelinks whose page is gone.
    pub source_dead_sitelinks: Vec<SiteId>,
    /// Target sitelinks whose page is gone.
    pub target_dead_sitelinks: Vec<SiteId>,
    /// Claims on the target that name the source as its duplicate.
    pub target_claims: Vec<ClaimId>,
}

/// Compares a source with its resolved target.
///
/// For every site linked from both entities the two pages must be the same
/// page, or one must redirect to the other. A missing page on either side is
/// not a conflict; its sitelink is scheduled for removal instead. Any other
/// pair aborts the job with `SitelinkConflict`.
pub struct ConflictChecker<'a> {
    ctx: &'a MergeContext,
}

impl<'a> ConflictChecker<'a> {
    pub fn new(ctx: &'a MergeContext) -> Self {
        Self { ctx }
    }

    pub async fn check(&self, source: &Entity, target: &Entity) -> MergeResult<ConflictReport> {
        let mut report = ConflictReport::default();
        for (site, title) in &source.sitelinks {
            let Some(target_title) = target.sitelink(site) else {
                continue;
            };
            let _guard = self.ctx.site_locks.acquire(site).await;
            self.check_site(site, title, target_title, &mut report).await?;
        }
        report.target_claims = self.back_references(source, target);
        Ok(report)
    }

    async fn check_site(
        &self,
        site: &SiteId,
        title: &str,
        target_title: &str,
        report: &mut ConflictReport,
    ) -> MergeResult<()> {
        let store = self.ctx.store.as_ref();
        if title == target_title {
            return Ok(());
        }
        if !store.page_exists(site, title).await? {
            debug!(%site, %title, "source page does not exist");
            report.source_dead_sitelinks.push(site.clone());
            return Ok(());
        }
        if !store.page_exists(site, target_title).await? {
            debug!(%site, title = %target_title, "target page does not exist");
            report.target_dead_sitelinks.push(site.clone());
            return Ok(());
        }
        if store.redirects_to(site, title, target_title).await?
            || store.redirects_to(site, target_title, title).await?
        {
            return Ok(());
        }
        Err(MergeError::SitelinkConflict { site: site.clone() })
    }

    fn back_references(&self, source: &Entity, target: &Entity) -> Vec<ClaimId> {
        let rules = &self.ctx.rules;
        let mut claims: Vec<ClaimId> = Vec::new();
        let candidates = target
            .claims_for(&rules.same_as)
            .iter()
            .chain(target.claims_for(&rules.instance_of));
        for claim in candidates {
            if rules.refers_to(claim, &source.id) && !claims.contains(&claim.id) {
                claims.push(claim.id.clone());
            }
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MergeSettings;
    use crate::rules::DuplicateRules;
    use kbm_store::InMemoryKnowledgeStore;
    use kbm_types::{Claim, EntityId, PropertyId, Snak};
    use std::sync::Arc;

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn pid(s: &str) -> PropertyId {
        s.parse().unwrap()
    }

    fn en() -> SiteId {
        SiteId::new("enwiki").unwrap()
    }

    fn setup(
        source_title: &str,
        target_title: &str,
    ) -> (Arc<InMemoryKnowledgeStore>, Entity, Entity) {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(Entity::new(qid("Q1")).with_sitelink(en(), source_title));
        store.insert_entity(Entity::new(qid("Q2")).with_sitelink(en(), target_title));
        let source = store.entity(&qid("Q1")).unwrap();
        let target = store.entity(&qid("Q2")).unwrap();
        (store, source, target)
    }

    fn ctx(store: &Arc<InMemoryKnowledgeStore>) -> MergeContext {
        MergeContext::new(store.clone(), DuplicateRules::default(), MergeSettings::default())
    }

    #[tokio::test]
    async fn distinct_live_pages_conflict() {
        let (store, source, target) = setup("A", "B");
        store.add_page(&en(), "A");
        store.add_page(&en(), "B");
        let ctx = ctx(&store);
        let err = ConflictChecker::new(&ctx).check(&source, &target).await.unwrap_err();
        assert!(matches!(err, MergeError::SitelinkConflict { site } if site == en()));
    }

    #[tokio::test]
    async fn redirect_in_either_direction_is_fine() {
        for (redirect, to) in [("A", "B"), ("B", "A")] {
            let (store, source, target) = setup("A", "B");
            store.add_redirect_page(&en(), redirect, to);
            store.add_page(&en(), to);
            let ctx = ctx(&store);
            let report = ConflictChecker::new(&ctx).check(&source, &target).await.unwrap();
            assert_eq!(report, ConflictReport::default());
        }
    }

    #[tokio::test]
    async fn dead_pages_are_scheduled_for_removal() {
        let (store, source, target) = setup("A", "B");
        store.add_page(&en(), "B");
        let ctx = ctx(&store);
        let report = ConflictChecker::new(&ctx).check(&source, &target).await.unwrap();
        assert_eq!(report.source_dead_sitelinks, vec![en()]);
        assert!(report.target_dead_sitelinks.is_empty());

        let (store, source, target) = setup("A", "B");
        store.add_page(&en(), "A");
        let ctx = MergeContext::new(
            store.clone(),
            DuplicateRules::default(),
            MergeSettings::default(),
        );
        let report = ConflictChecker::new(&ctx).check(&source, &target).await.unwrap();
        assert!(report.source_dead_sitelinks.is_empty());
        assert_eq!(report.target_dead_sitelinks, vec![en()]);
    }

    #[tokio::test]
    async fn sites_only_on_one_side_are_not_checked() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let de = SiteId::new("dewiki").unwrap();
        store.insert_entity(Entity::new(qid("Q1")).with_sitelink(en(), "A"));
        store.insert_entity(Entity::new(qid("Q2")).with_sitelink(de.clone(), "B"));
        let source = store.entity(&qid("Q1")).unwrap();
        let target = store.entity(&qid("Q2")).unwrap();
        let ctx = ctx(&store);
        ConflictChecker::new(&ctx).check(&source, &target).await.unwrap();
        assert_eq!(store.probe().site_reads(&en()), 0);
        assert_eq!(store.probe().site_reads(&de), 0);
    }

    #[tokio::test]
    async fn collects_back_references() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(Entity::new(qid("Q1")));
        store.insert_entity(
            Entity::new(qid("Q2"))
                .with_claim(Claim::entity(pid("P460"), qid("Q1")))
                .with_claim(Claim::entity(pid("P460"), qid("Q3")))
                .with_claim(
                    Claim::entity(pid("P31"), qid("Q17362920"))
                        .with_qualifier(Snak::entity(pid("P460"), qid("Q1")))
                        .with_qualifier(Snak::entity(pid("P642"), qid("Q1"))),
                )
                .with_claim(Claim::entity(pid("P31"), qid("Q5"))),
        );
        let source = store.entity(&qid("Q1")).unwrap();
        let target = store.entity(&qid("Q2")).unwrap();
        let ctx = ctx(&store);
        let report = ConflictChecker::new(&ctx).check(&source, &target).await.unwrap();
        assert_eq!(report.target_claims.len(), 2);
        for id in &report.target_claims {
            assert!(target.has_claim(id));
        }
    }
}
