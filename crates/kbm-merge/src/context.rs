use std::sync::Arc;

use kbm_store::KnowledgeStore;
use kbm_types::MergeField;

use crate::locks::{SaveLock, SiteLockRegistry};
use crate::rules::DuplicateRules;

/// Tunables for a merge job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeSettings {
    /// Maximum number of entity redirects followed when resolving a target.
    pub max_redirect_hops: usize,
    /// Fields allowed to differ between source and target.
    pub ignore_conflicts: Vec<MergeField>,
    /// Refuse merges whose claims disagree on key properties.
    pub safe_merge: bool,
    /// Appended to every edit summary, e.g. an edit group link.
    pub summary_suffix: Option<String>,
}

impl MergeSettings {
    /// Full edit summary for a write.
    pub fn summary(&self, text: &str) -> String {
        match &self.summary_suffix {
            Some(suffix) => format!("{text} ({suffix})"),
            None => text.to_string(),
        }
    }
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            max_redirect_hops: 10,
            ignore_conflicts: vec![MergeField::Description],
            safe_merge: false,
            summary_suffix: None,
        }
    }
}

/// Everything a job needs that is shared between workers.
#[derive(Clone)]
pub struct MergeContext {
    pub store: Arc<dyn KnowledgeStore>,
    pub site_locks: Arc<SiteLockRegistry>,
    pub save_lock: Arc<SaveLock>,
    pub rules: DuplicateRules,
    pub settings: MergeSettings,
}

impl MergeContext {
    /// A context with fresh locks.
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        rules: DuplicateRules,
        settings: MergeSettings,
    ) -> Self {
        Self {
            store,
            site_locks: Arc::new(SiteLockRegistry::new()),
            save_lock: Arc::new(SaveLock::new()),
            rules,
            settings,
        }
    }
}

impl std::fmt::Debug for MergeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeContext")
            .field("site_locks", &self.site_locks)
            .field("rules", &self.rules)
            .field("settings", &self.settings)
            .finish()
    }
}
