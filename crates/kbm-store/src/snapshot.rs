//! JSON fixture format for the in-memory store.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use kbm_types::{Entity, SiteId};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryKnowledgeStore;

/// A page on an external site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub site: SiteId,
    pub title: String,
    /// Title this page redirects to, if it is a redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Serializable contents of a knowledge base: entities plus the external
/// pages their sitelinks point at.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub pages: Vec<PageRecord>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Check that entity ids and page keys are unique.
    pub fn validate(&self) -> StoreResult<()> {
        let mut ids = HashSet::new();
        for entity in &self.entities {
            if !ids.insert(&entity.id) {
                return Err(StoreError::InvalidSnapshot(format!(
                    "duplicate entity {}",
                    entity.id
                )));
            }
        }
        let mut pages = HashSet::new();
        for page in &self.pages {
            if !pages.insert((&page.site, &page.title)) {
                return Err(StoreError::InvalidSnapshot(format!(
                    "duplicate page {}:{}",
                    page.site, page.title
                )));
            }
        }
        Ok(())
    }
}

impl InMemoryKnowledgeStore {
    /// Build a store from a validated snapshot. Claims without ids get
    /// fresh ones.
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        snapshot.validate()?;
        let store = Self::new();
        store.load_snapshot(snapshot);
        Ok(store)
    }

    /// Add every entity and page of the snapshot to this store.
    pub fn load_snapshot(&self, snapshot: Snapshot) {
        for entity in snapshot.entities {
            self.insert_entity(entity);
        }
        for page in snapshot.pages {
            match page.redirect {
                Some(target) => self.add_redirect_page(&page.site, page.title, target),
                None => self.add_page(&page.site, page.title),
            }
        }
    }

    /// Current contents of the store.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entities: self.current_entities(),
            pages: self
                .pages()
                .into_iter()
                .map(|(site, title, redirect)| PageRecord {
                    site,
                    title,
                    redirect,
                })
                .collect(),
        }
    }
}
