use std::sync::{Arc, Mutex};

use kbm_merge::{JobOutcome, MergeContext, MergeJob, MergeOrdering, MergePipeline, SkipReason};
use kbm_store::{KnowledgeStore, StoreError};
use kbm_stream::{CandidateStream, ProgressTracker, QueryStore};
use kbm_types::EntityId;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::editgroup::EditGroup;
use crate::error::EngineResult;
use crate::pool::WorkerPool;
use crate::report::RunReport;

/// Drives a full deduplication run.
///
/// A single producer reads candidate ids, fetches each entity, skips the
/// ones without a classification claim, and feeds the rest to the worker
/// pool. Workers run the merge pipeline and update the shared progress
/// offset and report.
pub struct DedupEngine {
    config: EngineConfig,
    store: Arc<dyn KnowledgeStore>,
    pipeline: Arc<MergePipeline>,
    progress: Arc<ProgressTracker>,
    queries: QueryStore,
    edit_group: Option<EditGroup>,
}

impl DedupEngine {
    /// Build an engine from a validated config. Draws a new edit group if
    /// the config asks for one.
    pub fn new(store: Arc<dyn KnowledgeStore>, config: EngineConfig) -> EngineResult<Self> {
        let group = config.edit_groups.then(EditGroup::random);
        Self::with_edit_group(store, config, group)
    }

    pub fn with_edit_group(
        store: Arc<dyn KnowledgeStore>,
        config: EngineConfig,
        edit_group: Option<EditGroup>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let settings = config.settings(edit_group.map(|g| g.link()));
        let ctx = MergeContext::new(Arc::clone(&store), config.rules(), settings);
        let queries = match &config.queries_dir {
            Some(dir) => QueryStore::with_dir(dir),
            None => QueryStore::new(),
        };
        Ok(Self {
            progress: Arc::new(ProgressTracker::new(config.offset, config.batch_size)),
            pipeline: Arc::new(MergePipeline::new(ctx)),
            config,
            store,
            queries,
            edit_group,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn edit_group(&self) -> Option<EditGroup> {
        self.edit_group
    }

    /// The rendered candidate query.
    pub fn query(&self) -> EngineResult<String> {
        let rules = self.pipeline.context().rules.clone();
        Ok(self.queries.build_query(
            &self.config.query,
            &[
                ("instance_of", rules.instance_of.to_string()),
                ("dupes", rules.classes_param()),
            ],
        )?)
    }

    /// Run over the results of the configured query.
    pub async fn run(&self) -> EngineResult<RunReport> {
        let query = self.query()?;
        info!(%query, offset = self.config.offset, "starting run");
        let stream = CandidateStream::from_query(
            Arc::clone(&self.store),
            query,
            self.config.offset,
            self.config.page_size,
        );
        self.run_stream(stream).await
    }

    /// Run over an explicit list of ids instead of the query.
    pub async fn run_ids(&self, ids: Vec<EntityId>) -> EngineResult<RunReport> {
        info!(count = ids.len(), offset = self.config.offset, "starting run over given ids");
        self.run_stream(CandidateStream::from_ids(ids, self.config.offset)).await
    }

    pub async fn run_stream(&self, mut stream: CandidateStream) -> EngineResult<RunReport> {
        let report = Arc::new(Mutex::new(RunReport::default()));
        let pool = {
            let pipeline = Arc::clone(&self.pipeline);
            let progress = Arc::clone(&self.progress);
            let report = Arc::clone(&report);
            WorkerPool::start(self.config.threads, move |worker, entity| {
                let pipeline = Arc::clone(&pipeline);
                let progress = Arc::clone(&progress);
                let report = Arc::clone(&report);
                async move {
                    let job = pipeline.process(entity).await;
                    if let Some(outcome) = &job.outcome {
                        if outcome.is_success() {
                            progress.on_success();
                        }
                        report.lock().expect("lock poisoned").record(outcome);
                    }
                    tracing::debug!(worker, entity = %job.source.id, "job finished");
                }
            })
        };

        let rules = self.pipeline.context().rules.clone();
        let mut stream_error = None;
        loop {
            let id = match stream.next().await {
                Ok(Some(id)) => id,
                Ok(None) => break,
                Err(e) => {
                    stream_error = Some(e);
                    break;
                }
            };
            self.progress.on_dequeue();
            report.lock().expect("lock poisoned").processed += 1;

            let entity = match self.store.fetch(&id).await {
                Ok(entity) => entity,
                Err(StoreError::NotFound(_)) => {
                    info!(entity = %id, "candidate no longer exists");
                    record(&report, &JobOutcome::Skipped(SkipReason::NoTarget));
                    continue;
                }
                Err(e) => {
                    error!(entity = %id, error = %e, "failed to fetch candidate");
                    record(&report, &JobOutcome::Failed { error: e.to_string() });
                    continue;
                }
            };
            if !rules.is_classified(&entity) {
                info!(entity = %id, "skipped: not classified");
                record(&report, &JobOutcome::Skipped(SkipReason::NotClassified));
                continue;
            }
            pool.submit(entity).await?;
        }
        pool.shutdown().await?;

        let mut report = report.lock().expect("lock poisoned").clone();
        report.finish(&self.progress);
        if let Some(e) = stream_error {
            error!(
                error = %e,
                processed = report.processed,
                offset = report.final_offset,
                resume = report.resume_offset,
                "candidate stream failed"
            );
            return Err(e.into());
        }
        info!(
            processed = report.processed,
            merged = report.merged,
            offset = report.final_offset,
            resume = report.resume_offset,
            "run finished"
        );
        Ok(report)
    }

    /// Resolve and check one entity without writing.
    pub async fn plan(&self, id: &EntityId) -> EngineResult<MergeJob> {
        let entity = self.store.fetch(id).await?;
        Ok(self.pipeline.plan(entity).await)
    }

    /// Merge two named entities, choosing the survivor with `ordering`.
    pub async fn merge_pair(
        &self,
        a: &EntityId,
        b: &EntityId,
        ordering: &MergeOrdering,
    ) -> EngineResult<MergeJob> {
        Ok(self.pipeline.merge_pair(a, b, ordering).await?)
    }
}

fn record(report: &Mutex<RunReport>, outcome: &JobOutcome) {
    report.lock().expect("lock poisoned").record(outcome);
}

impl std::fmt::Debug for DedupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupEngine")
            .field("config", &self.config)
            .field("progress", &self.progress)
            .field("edit_group", &self.edit_group)
            .finish()
    }
}
