use kbm_store::{Mutation, MutationKind, SaveRequest};
use kbm_types::{ClaimId, EntityId, SiteId};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::MergeContext;
use crate::error::{MergeError, MergeResult};
use crate::job::MergeJob;

pub const DEAD_SITELINKS_SUMMARY: &str = "removing sitelink(s) to non-existing page(s)";
pub const CLEAR_SUMMARY: &str = "Clearing item to prepare for redirect";

/// One applied write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub entity: EntityId,
    pub kind: String,
}

/// Ordered record of the writes a job has applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EditJournal {
    edits: Vec<Edit>,
}

impl EditJournal {
    pub fn record(&mut self, entity: EntityId, kind: MutationKind) {
        self.edits.push(Edit {
            entity,
            kind: kind.to_string(),
        });
    }

    /// Whether `entity` has been written to.
    pub fn touched(&self, entity: &EntityId) -> bool {
        self.edits.iter().any(|e| &e.entity == entity)
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Applies the writes of a prepared job.
///
/// Each write takes the global save lock for its own duration only. The
/// order is fixed: source sitelinks, source claims, target sitelinks,
/// target claims, then the merge. Empty steps are skipped. The first
/// failing write stops the sequence.
pub struct MergeExecutor<'a> {
    ctx: &'a MergeContext,
}

impl<'a> MergeExecutor<'a> {
    pub fn new(ctx: &'a MergeContext) -> Self {
        Self { ctx }
    }

    /// Run every cleanup step and the merge for `job`.
    pub async fn execute(&self, job: &mut MergeJob) -> MergeResult<()> {
        let source = job.source.id.clone();
        let Some(target) = job.target_id().cloned() else {
            return Err(MergeError::MissingTarget(source));
        };
        let target_claims = std::mem::take(&mut job.target_claims);
        let target_sitelinks = std::mem::take(&mut job.target_sitelinks);

        self.remove_source_content(job).await?;
        if !target_sitelinks.is_empty() {
            let mutation = Mutation::RemoveSitelinks(target_sitelinks.clone());
            self.save(job, &target, mutation, DEAD_SITELINKS_SUMMARY).await?;
            if let Some(t) = job.target.as_mut() {
                t.remove_sitelinks(&target_sitelinks);
            }
        }
        if !target_claims.is_empty() {
            let summary = format!("removing claim(s) referring to [[{source}]]");
            self.save(job, &target, Mutation::RemoveClaims(target_claims.clone()), &summary)
                .await?;
            if let Some(t) = job.target.as_mut() {
                t.remove_claims(&target_claims);
            }
        }
        self.clean_merge(job, &source, &target).await
    }

    /// Remove the duplicate markers and dead sitelinks of an entity that
    /// names itself as its original. No merge is attempted.
    pub async fn strip_self(&self, job: &mut MergeJob) -> MergeResult<()> {
        self.remove_source_content(job).await
    }

    /// Merge `source` into `target`. If the source is left with content,
    /// clear it and merge again so it becomes a redirect.
    pub async fn clean_merge(
        &self,
        job: &mut MergeJob,
        source: &EntityId,
        target: &EntityId,
    ) -> MergeResult<()> {
        let ignore = self.ctx.settings.ignore_conflicts.clone();
        let summary = format!("merging into [[{target}]]");
        self.save(
            job,
            source,
            Mutation::MergeInto {
                target: target.clone(),
                ignore_conflicts: ignore,
            },
            &summary,
        )
        .await?;

        let merged = self.ctx.store.fetch(source).await?;
        if !merged.is_redirect() {
            info!(entity = %source, "{CLEAR_SUMMARY}");
            self.save(job, source, Mutation::Clear, CLEAR_SUMMARY).await?;
            self.save(
                job,
                source,
                Mutation::MergeInto {
                    target: target.clone(),
                    ignore_conflicts: Vec::new(),
                },
                &summary,
            )
            .await?;
        }
        job.source = self.ctx.store.fetch(source).await?;
        Ok(())
    }

    async fn remove_source_content(&self, job: &mut MergeJob) -> MergeResult<()> {
        let source = job.source.id.clone();
        let sitelinks: Vec<SiteId> = std::mem::take(&mut job.source_sitelinks);
        let claims: Vec<ClaimId> = std::mem::take(&mut job.source_claims);
        if !sitelinks.is_empty() {
            let mutation = Mutation::RemoveSitelinks(sitelinks.clone());
            self.save(job, &source, mutation, DEAD_SITELINKS_SUMMARY).await?;
            job.source.remove_sitelinks(&sitelinks);
        }
        if !claims.is_empty() {
            let mutation = Mutation::RemoveClaims(claims.clone());
            self.save(job, &source, mutation, "removing duplicate-marking claim(s)")
                .await?;
            job.source.remove_claims(&claims);
        }
        Ok(())
    }

    /// Apply one write under the save lock and journal every entity it
    /// changed. A merge changes both its source and its target.
    async fn save(
        &self,
        job: &mut MergeJob,
        entity: &EntityId,
        mutation: Mutation,
        summary: &str,
    ) -> MergeResult<()> {
        let kind = mutation.kind();
        let merged_into = match &mutation {
            Mutation::MergeInto { target, .. } => Some(target.clone()),
            _ => None,
        };
        let summary = self.ctx.settings.summary(summary);
        let request = SaveRequest::new(entity.clone(), mutation, summary);
        {
            let _guard = self.ctx.save_lock.acquire().await;
            self.ctx
                .store
                .save(request)
                .await
                .map_err(MergeError::RemoteWrite)?;
        }
        debug!(%entity, %kind, "write applied");
        job.journal.record(entity.clone(), kind);
        if let Some(target) = merged_into {
            job.journal.record(target, kind);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MergeSettings;
    use crate::rules::DuplicateRules;
    use kbm_store::{Fault, InMemoryKnowledgeStore};
    use kbm_types::{Claim, Entity, PropertyId};
    use std::sync::Arc;

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn pid(s: &str) -> PropertyId {
        s.parse().unwrap()
    }

    fn ctx(store: &Arc<InMemoryKnowledgeStore>) -> MergeContext {
        MergeContext::new(store.clone(), DuplicateRules::default(), MergeSettings::default())
    }

    fn prepared(store: &InMemoryKnowledgeStore) -> MergeJob {
        let mut job = MergeJob::new(store.entity(&qid("Q1")).unwrap());
        job.target = store.entity(&qid("Q2"));
        job
    }

    #[tokio::test]
    async fn merges_and_records_writes() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(
            Entity::new(qid("Q1"))
                .with_label("en", "Foo")
                .with_claim(Claim::entity(pid("P31"), qid("Q17362920"))),
        );
        store.insert_entity(Entity::new(qid("Q2")).with_label("en", "Foo"));
        let mut job = prepared(&store);
        job.source_claims = job.source.all_claims().map(|c| c.id.clone()).collect();

        let ctx = ctx(&store);
        MergeExecutor::new(&ctx).execute(&mut job).await.unwrap();

        let kinds: Vec<_> = store.saves().into_iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![MutationKind::RemoveClaims, MutationKind::Merge]);
        assert_eq!(job.journal.len(), 3);
        assert!(job.journal.touched(&qid("Q2")));
        assert_eq!(store.entity(&qid("Q1")).unwrap().redirect, Some(qid("Q2")));
        assert!(job.source.is_redirect());
    }

    #[tokio::test]
    async fn leftover_content_is_cleared_before_second_merge() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(Entity::new(qid("Q1")).with_description("en", "a thing"));
        store.insert_entity(Entity::new(qid("Q2")).with_description("en", "another thing"));
        let mut job = prepared(&store);

        let ctx = ctx(&store);
        MergeExecutor::new(&ctx).execute(&mut job).await.unwrap();

        let kinds: Vec<_> = store.saves().into_iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![MutationKind::Merge, MutationKind::Clear, MutationKind::Merge]);
        assert!(store.entity(&qid("Q1")).unwrap().is_redirect());
        assert_eq!(store.entity(&qid("Q2")).unwrap().descriptions["en"], "another thing");
    }

    #[tokio::test]
    async fn failure_stops_the_sequence() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(
            Entity::new(qid("Q1")).with_claim(Claim::entity(pid("P31"), qid("Q17362920"))),
        );
        store.insert_entity(
            Entity::new(qid("Q2")).with_claim(Claim::entity(pid("P460"), qid("Q1"))),
        );
        store.inject(Fault::on_save(MutationKind::RemoveClaims).for_entity(qid("Q2")));
        let mut job = prepared(&store);
        job.source_claims = job.source.all_claims().map(|c| c.id.clone()).collect();
        let target = job.target.as_ref().unwrap();
        job.target_claims = target.all_claims().map(|c| c.id.clone()).collect();

        let ctx = ctx(&store);
        let err = MergeExecutor::new(&ctx).execute(&mut job).await.unwrap_err();
        assert!(matches!(err, MergeError::RemoteWrite(_)));
        assert_eq!(store.save_count(), 1);
        assert!(job.journal.touched(&qid("Q1")));
        assert!(!job.journal.touched(&qid("Q2")));
    }

    #[tokio::test]
    async fn merge_write_is_journaled_for_target() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(Entity::new(qid("Q1")).with_description("en", "a thing"));
        store.insert_entity(Entity::new(qid("Q2")).with_description("en", "another thing"));
        store.inject(Fault::on_save(MutationKind::Clear));
        let mut job = prepared(&store);

        let ctx = ctx(&store);
        let err = MergeExecutor::new(&ctx).execute(&mut job).await.unwrap_err();
        assert!(matches!(err, MergeError::RemoteWrite(_)));
        let touched: Vec<_> = job.journal.edits().iter().map(|e| e.entity.clone()).collect();
        assert_eq!(touched, vec![qid("Q1"), qid("Q2")]);
    }

    #[tokio::test]
    async fn job_without_target_is_rejected() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(Entity::new(qid("Q1")));
        let mut job = MergeJob::new(store.entity(&qid("Q1")).unwrap());

        let ctx = ctx(&store);
        let err = MergeExecutor::new(&ctx).execute(&mut job).await.unwrap_err();
        assert!(matches!(err, MergeError::MissingTarget(id) if id == qid("Q1")));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn summaries_carry_suffix() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store.insert_entity(Entity::new(qid("Q1")));
        store.insert_entity(Entity::new(qid("Q2")));
        let mut job = prepared(&store);
        let settings = MergeSettings {
            summary_suffix: Some("group".into()),
            ..MergeSettings::default()
        };
        let ctx = MergeContext::new(store.clone(), DuplicateRules::default(), settings);
        MergeExecutor::new(&ctx).execute(&mut job).await.unwrap();
        assert_eq!(store.saves()[0].summary, "merging into [[Q2]] (group)");
    }
}
