use std::fs;
use std::path::{Path, PathBuf};

use kbm_merge::{DuplicateRules, MergeSettings};
use kbm_types::{EntityId, MergeField, PropertyId};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Engine configuration. Every field has a default, so a config file only
/// needs the values it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of workers.
    pub threads: usize,
    /// Query offset to start from.
    pub offset: u64,
    /// Boundary the resume offset is rounded down to.
    pub batch_size: u64,
    /// Candidates fetched per query page.
    pub page_size: usize,
    pub max_redirect_hops: usize,
    pub instance_of: PropertyId,
    pub same_as: PropertyId,
    pub duplicate_qualifiers: Vec<PropertyId>,
    pub duplicate_classes: Vec<EntityId>,
    pub ignore_conflicts: Vec<MergeField>,
    pub safe_merge: bool,
    /// Name of the candidate query template.
    pub query: String,
    pub queries_dir: Option<PathBuf>,
    /// Tag every edit of a run with an edit group link.
    pub edit_groups: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let rules = DuplicateRules::default();
        let settings = MergeSettings::default();
        Self {
            threads: 1,
            offset: 0,
            batch_size: 50,
            page_size: 50,
            max_redirect_hops: settings.max_redirect_hops,
            instance_of: rules.instance_of,
            same_as: rules.same_as,
            duplicate_qualifiers: rules.qualifiers,
            duplicate_classes: rules.duplicate_classes.into_iter().collect(),
            ignore_conflicts: settings.ignore_conflicts,
            safe_merge: false,
            query: "dupes".into(),
            queries_dir: None,
            edit_groups: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.threads == 0 {
            return Err(EngineError::Config("threads must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(EngineError::Config("batch_size must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(EngineError::Config("page_size must be at least 1".into()));
        }
        if self.duplicate_classes.is_empty() {
            return Err(EngineError::Config("duplicate_classes must not be empty".into()));
        }
        if self.query.trim().is_empty() {
            return Err(EngineError::Config("query must name a template".into()));
        }
        Ok(())
    }

    pub fn rules(&self) -> DuplicateRules {
        DuplicateRules::new(
            self.instance_of.clone(),
            self.same_as.clone(),
            self.duplicate_qualifiers.clone(),
            self.duplicate_classes.iter().cloned(),
        )
    }

    pub fn settings(&self, summary_suffix: Option<String>) -> MergeSettings {
        MergeSettings {
            max_redirect_hops: self.max_redirect_hops,
            ignore_conflicts: self.ignore_conflicts.clone(),
            safe_merge: self.safe_merge,
            summary_suffix,
        }
    }
}
