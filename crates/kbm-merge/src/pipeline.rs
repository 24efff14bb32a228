use kbm_types::{Entity, EntityId};
use tracing::{error, info, warn};

use crate::conflict::ConflictChecker;
use crate::context::MergeContext;
use crate::error::{MergeError, MergeResult};
use crate::executor::MergeExecutor;
use crate::job::{AbortReason, JobOutcome, MergeJob, SkipReason};
use crate::ordering::MergeOrdering;
use crate::policy::MergePolicy;
use crate::redirect::RedirectResolver;
use crate::resolver::TargetResolver;
use crate::rollback::CompensatingRollback;

/// What a prepared job is going to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Skip(SkipReason),
    /// The source is its own target: strip its markers only.
    SelfMerge,
    Merge,
}

/// Runs merge jobs end to end against a shared context.
#[derive(Debug, Clone)]
pub struct MergePipeline {
    ctx: MergeContext,
    policy: MergePolicy,
}

impl MergePipeline {
    pub fn new(ctx: MergeContext) -> Self {
        Self {
            ctx,
            policy: MergePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn context(&self) -> &MergeContext {
        &self.ctx
    }

    /// Resolve, check and merge one source entity.
    pub async fn process(&self, source: Entity) -> MergeJob {
        let mut job = MergeJob::new(source);
        let outcome = self.run(&mut job).await;
        log_outcome(&job, &outcome);
        job.outcome = Some(outcome);
        job
    }

    /// Everything `process` would decide, without writing. The returned job
    /// has an outcome only if it would stop before writing.
    pub async fn plan(&self, source: Entity) -> MergeJob {
        let mut job = MergeJob::new(source);
        match self.prepare(&mut job).await {
            Ok(Decision::Skip(reason)) => job.outcome = Some(JobOutcome::Skipped(reason)),
            Ok(Decision::SelfMerge | Decision::Merge) => {}
            Err(e) => job.outcome = Some(stopped(e)),
        }
        job
    }

    /// Merge two explicitly named entities. Which one survives is decided
    /// by `ordering`; duplicate markers are not required.
    pub async fn merge_pair(
        &self,
        a: &EntityId,
        b: &EntityId,
        ordering: &MergeOrdering,
    ) -> MergeResult<MergeJob> {
        let store = self.ctx.store.as_ref();
        let follow = RedirectResolver::new(self.ctx.settings.max_redirect_hops);
        let a = follow.resolve(store, store.fetch(a).await?).await?;
        let b = follow.resolve(store, store.fetch(b).await?).await?;
        let (target, source) = ordering.order(store, a, b).await?;

        let mut job = MergeJob::new(source);
        job.candidates.insert(target.id.clone());
        job.target = Some(target);
        let outcome = if job.is_self_merge() {
            JobOutcome::Failed {
                error: format!("{} cannot be merged into itself", job.source.id),
            }
        } else {
            match self.check_target(&mut job).await {
                Ok(()) => self.execute(&mut job, Decision::Merge).await,
                Err(e) => stopped(e),
            }
        };
        log_outcome(&job, &outcome);
        job.outcome = Some(outcome);
        Ok(job)
    }

    /// Fill in the job's target and cleanup lists and decide what to do.
    pub async fn prepare(&self, job: &mut MergeJob) -> MergeResult<Decision> {
        if !self.ctx.rules.is_classified(&job.source) {
            return Ok(Decision::Skip(SkipReason::NotClassified));
        }
        let resolution = TargetResolver::new(&self.ctx).resolve(&job.source).await?;
        job.source_claims = resolution.claims;
        job.source_sitelinks = resolution.dead_sitelinks;
        job.candidates = resolution.candidates;

        let mut candidates = job.candidates.iter();
        let target_id = match (candidates.next(), candidates.next()) {
            (None, _) => return Ok(Decision::Skip(SkipReason::NoTarget)),
            (Some(id), None) => id.clone(),
            (Some(_), Some(_)) => {
                return Ok(Decision::Skip(SkipReason::Ambiguous {
                    candidates: job.candidates.iter().cloned().collect(),
                }))
            }
        };

        let store = self.ctx.store.as_ref();
        let target = store.fetch(&target_id).await?;
        let target = RedirectResolver::new(self.ctx.settings.max_redirect_hops)
            .resolve(store, target)
            .await?;
        job.target = Some(target);
        if job.is_self_merge() {
            return Ok(Decision::SelfMerge);
        }
        self.check_target(job).await?;
        Ok(Decision::Merge)
    }

    async fn check_target(&self, job: &mut MergeJob) -> MergeResult<()> {
        let Some(target) = job.target.as_ref() else {
            return Ok(());
        };
        let report = ConflictChecker::new(&self.ctx).check(&job.source, target).await?;
        if self.ctx.settings.safe_merge {
            self.policy.check(&job.source, target)?;
        }
        for site in report.source_dead_sitelinks {
            if !job.source_sitelinks.contains(&site) {
                job.source_sitelinks.push(site);
            }
        }
        job.target_sitelinks = report.target_dead_sitelinks;
        job.target_claims = report.target_claims;
        Ok(())
    }

    async fn run(&self, job: &mut MergeJob) -> JobOutcome {
        match self.prepare(job).await {
            Ok(Decision::Skip(reason)) => JobOutcome::Skipped(reason),
            Ok(decision) => self.execute(job, decision).await,
            Err(e) => stopped(e),
        }
    }

    async fn execute(&self, job: &mut MergeJob, decision: Decision) -> JobOutcome {
        let executor = MergeExecutor::new(&self.ctx);
        let result = match decision {
            Decision::Skip(reason) => return JobOutcome::Skipped(reason),
            Decision::SelfMerge => executor.strip_self(job).await.map(|()| JobOutcome::SelfCleaned),
            Decision::Merge => executor.execute(job).await.and_then(|()| {
                job.target_id()
                    .cloned()
                    .map(|target| JobOutcome::Merged { target })
                    .ok_or_else(|| MergeError::MissingTarget(job.source.id.clone()))
            }),
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => self.compensate(job, e).await,
        }
    }

    async fn compensate(&self, job: &MergeJob, cause: MergeError) -> JobOutcome {
        error!(entity = %job.source.id, error = %cause, "merge failed");
        if job.journal.is_empty() {
            return JobOutcome::Failed {
                error: cause.to_string(),
            };
        }
        let source = job.source.id.clone();
        let target = job.target_id().cloned().unwrap_or_else(|| source.clone());
        match CompensatingRollback::new(&self.ctx)
            .run(&source, &target, &job.journal)
            .await
        {
            Ok(_) => JobOutcome::RolledBack {
                error: cause.to_string(),
            },
            Err(e) => JobOutcome::Failed {
                error: format!("{cause}; {e}"),
            },
        }
    }
}

fn stopped(e: MergeError) -> JobOutcome {
    match e.abort_reason() {
        Some(reason) => JobOutcome::Aborted(reason),
        None => JobOutcome::Failed { error: e.to_string() },
    }
}

fn log_outcome(job: &MergeJob, outcome: &JobOutcome) {
    let entity = &job.source.id;
    match outcome {
        JobOutcome::Merged { target } => {
            info!(%entity, %target, edits = job.journal.len(), "merged")
        }
        JobOutcome::SelfCleaned => info!(%entity, "entity is its own target; markers removed"),
        JobOutcome::Skipped(SkipReason::NotClassified) => info!(%entity, "skipped: not classified"),
        JobOutcome::Skipped(SkipReason::NoTarget) => info!(%entity, "no target found"),
        JobOutcome::Skipped(SkipReason::Ambiguous { candidates }) => {
            info!(%entity, count = candidates.len(), "multiple targets found")
        }
        JobOutcome::Aborted(AbortReason::SitelinkConflict { site }) => {
            warn!(%entity, %site, "target has a conflicting sitelink")
        }
        JobOutcome::Aborted(AbortReason::PolicyConflict { property }) => {
            warn!(%entity, %property, "conflicting values")
        }
        JobOutcome::Aborted(AbortReason::RedirectDepthExceeded { start, hops }) => {
            error!(%entity, %start, hops, "redirect chain too long")
        }
        JobOutcome::RolledBack { error } => error!(%entity, %error, "changes reverted"),
        JobOutcome::Failed { error } => error!(%entity, %error, "job failed"),
    }
}
