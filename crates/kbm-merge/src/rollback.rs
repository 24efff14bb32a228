use kbm_types::EntityId;
use tracing::{error, info};

use crate::context::MergeContext;
use crate::error::{MergeError, MergeResult};
use crate::executor::EditJournal;

/// Undoes a partially applied merge.
///
/// Only entities the job actually wrote to are reverted, each under the
/// save lock. A failing revert does not stop the others.
pub struct CompensatingRollback<'a> {
    ctx: &'a MergeContext,
}

impl<'a> CompensatingRollback<'a> {
    pub fn new(ctx: &'a MergeContext) -> Self {
        Self { ctx }
    }

    /// Revert `source` and `target` if the journal shows edits to them.
    /// Returns the reverted entities.
    pub async fn run(
        &self,
        source: &EntityId,
        target: &EntityId,
        journal: &EditJournal,
    ) -> MergeResult<Vec<EntityId>> {
        info!(%source, %target, "reverting changes");
        let mut reverted = Vec::new();
        let mut failures = Vec::new();
        let pairs = if source == target {
            vec![(source, target)]
        } else {
            vec![(source, target), (target, source)]
        };
        for (entity, other) in pairs {
            if !journal.touched(entity) {
                continue;
            }
            let summary = self
                .ctx
                .settings
                .summary(&format!("Error occurred when attempting to merge with [[{other}]]"));
            let result = {
                let _guard = self.ctx.save_lock.acquire().await;
                self.ctx.store.revert(entity, &summary).await
            };
            match result {
                Ok(_) => reverted.push(entity.clone()),
                Err(e) => {
                    error!(%entity, error = %e, "revert failed");
                    failures.push(e.to_string());
                }
            }
        }
        if failures.is_empty() {
            Ok(reverted)
        } else {
            Err(MergeError::Rollback { failures })
        }
    }
}
