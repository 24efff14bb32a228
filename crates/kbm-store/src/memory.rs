use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use kbm_types::{ClaimId, Entity, EntityId, MergeField, SiteId};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::probe::AccessProbe;
use crate::search::SearchQuery;
use crate::traits::{KnowledgeStore, Mutation, MutationKind, SaveReceipt, SaveRequest};

/// Author recorded on revisions created by [`InMemoryKnowledgeStore::insert_entity`].
pub const IMPORT_AUTHOR: &str = "import";

/// One stored revision of an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub id: u64,
    pub author: String,
    pub summary: String,
    pub snapshot: Entity,
}

/// Log entry for an applied save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveRecord {
    pub entity: EntityId,
    pub kind: MutationKind,
    pub summary: String,
    pub asynchronous: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FaultTarget {
    Save(MutationKind),
    Revert,
}

/// A scripted failure for the in-memory store.
///
/// A fault matches saves of one mutation kind (or reverts), optionally only
/// on one entity, and fires a limited number of times.
#[derive(Clone, Debug)]
pub struct Fault {
    target: FaultTarget,
    entity: Option<EntityId>,
    remaining: usize,
}

impl Fault {
    /// Fail the next save of the given kind.
    pub fn on_save(kind: MutationKind) -> Self {
        Self {
            target: FaultTarget::Save(kind),
            entity: None,
            remaining: 1,
        }
    }

    /// Fail the next revert.
    pub fn on_revert() -> Self {
        Self {
            target: FaultTarget::Revert,
            entity: None,
            remaining: 1,
        }
    }

    /// Only fire for writes to `entity`.
    pub fn for_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Fire `n` times instead of once.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = n;
        self
    }
}

struct EntityRecord {
    current: Entity,
    revisions: Vec<Revision>,
}

#[derive(Default)]
struct StoreState {
    entities: BTreeMap<EntityId, EntityRecord>,
    /// Existing pages keyed by site and title, with their redirect target.
    pages: BTreeMap<(SiteId, String), Option<String>>,
    saves: Vec<SaveRecord>,
    reverts: Vec<EntityId>,
    last_revision: u64,
}

impl StoreState {
    fn next_revision(&mut self) -> u64 {
        self.last_revision += 1;
        self.last_revision
    }

    fn live(&self, id: &EntityId) -> StoreResult<&Entity> {
        let record = self
            .entities
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if record.current.is_redirect() {
            return Err(StoreError::write(id, "entity is a redirect"));
        }
        Ok(&record.current)
    }

    fn commit(&mut self, entity: Entity, author: &str, summary: &str) -> SaveReceipt {
        let revision = self.next_revision();
        let id = entity.id.clone();
        let record = self.entities.entry(id.clone()).or_insert_with(|| EntityRecord {
            current: entity.clone(),
            revisions: Vec::new(),
        });
        record.revisions.push(Revision {
            id: revision,
            author: author.to_string(),
            summary: summary.to_string(),
            snapshot: entity.clone(),
        });
        record.current = entity;
        SaveReceipt {
            entity: id,
            revision,
        }
    }

    fn pages_equivalent(&self, site: &SiteId, a: &str, b: &str) -> bool {
        let redirect_of = |title: &str| {
            self.pages
                .get(&(site.clone(), title.to_string()))
                .and_then(|r| r.as_deref())
                .map(str::to_string)
        };
        redirect_of(a).as_deref() == Some(b) || redirect_of(b).as_deref() == Some(a)
    }

    fn apply(&mut self, client: &str, request: &SaveRequest) -> StoreResult<SaveReceipt> {
        let id = &request.entity;
        match &request.mutation {
            Mutation::RemoveClaims(claims) => {
                let mut entity = self.live(id)?.clone();
                if let Some(missing) = claims.iter().find(|c| !entity.has_claim(c)) {
                    return Err(StoreError::write(id, format!("claim {missing} not found")));
                }
                entity.remove_claims(claims);
                Ok(self.commit(entity, client, &request.summary))
            }
            Mutation::RemoveSitelinks(sites) => {
                let mut entity = self.live(id)?.clone();
                entity.remove_sitelinks(sites);
                Ok(self.commit(entity, client, &request.summary))
            }
            Mutation::Clear => {
                let mut entity = self.live(id)?.clone();
                entity.clear();
                Ok(self.commit(entity, client, &request.summary))
            }
            Mutation::MergeInto {
                target,
                ignore_conflicts,
            } => self.merge(client, id, target, ignore_conflicts, &request.summary),
        }
    }

    /// Move the content of `source_id` into `target_id`.
    ///
    /// The merge is computed on copies and committed only if no conflict is
    /// found, so a failed merge leaves both entities untouched.
    fn merge(
        &mut self,
        client: &str,
        source_id: &EntityId,
        target_id: &EntityId,
        ignore: &[MergeField],
        summary: &str,
    ) -> StoreResult<SaveReceipt> {
        if source_id == target_id {
            return Err(StoreError::write(source_id, "cannot merge an entity into itself"));
        }
        let source = self.live(source_id)?.clone();
        let mut target = self.live(target_id)?.clone();
        let mut leftover = source.clone();

        for (site, title) in &source.sitelinks {
            match target.sitelinks.get(site) {
                None => {
                    target.sitelinks.insert(site.clone(), title.clone());
                }
                Some(existing)
                    if existing == title || self.pages_equivalent(site, title, existing) => {}
                Some(existing) => {
                    return Err(StoreError::write(
                        source_id,
                        format!("conflicting sitelinks on {site}: '{title}' vs '{existing}'"),
                    ));
                }
            }
            leftover.sitelinks.remove(site);
        }

        merge_terms(
            source_id,
            "label",
            &source.labels,
            &mut target.labels,
            &mut leftover.labels,
            ignore.contains(&MergeField::Label),
        )?;
        merge_terms(
            source_id,
            "description",
            &source.descriptions,
            &mut target.descriptions,
            &mut leftover.descriptions,
            ignore.contains(&MergeField::Description),
        )?;

        for claim in source.all_claims() {
            if target.all_claims().any(|c| c.same_statement(claim)) {
                continue;
            }
            let mut moved = claim.clone();
            moved.id = ClaimId::generate(target_id);
            target.add_claim(moved);
        }
        leftover.claims.clear();

        if leftover.is_empty() {
            leftover.redirect = Some(target_id.clone());
        }

        self.commit(target, client, summary);
        Ok(self.commit(leftover, client, summary))
    }

    fn revert(&mut self, client: &str, id: &EntityId, summary: &str) -> StoreResult<SaveReceipt> {
        let record = self
            .entities
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        match record.revisions.last() {
            Some(last) if last.author == client => {}
            _ => return Err(StoreError::revert(id, format!("no edits by {client} to revert"))),
        }
        let base = record
            .revisions
            .iter()
            .rev()
            .find(|r| r.author != client)
            .map(|r| r.snapshot.clone())
            .ok_or_else(|| StoreError::revert(id, "no earlier revision by another author"))?;
        self.reverts.push(id.clone());
        Ok(self.commit(base, client, summary))
    }
}

/// Merge one term map (labels or descriptions) of the source into the target.
fn merge_terms(
    source_id: &EntityId,
    field: &str,
    source: &BTreeMap<String, String>,
    target: &mut BTreeMap<String, String>,
    leftover: &mut BTreeMap<String, String>,
    ignored: bool,
) -> StoreResult<()> {
    for (lang, text) in source {
        match target.get(lang) {
            None => {
                target.insert(lang.clone(), text.clone());
                leftover.remove(lang);
            }
            Some(existing) if existing == text => {
                leftover.remove(lang);
            }
            Some(_) if ignored => {}
            Some(existing) => {
                return Err(StoreError::write(
                    source_id,
                    format!("conflicting {field} in '{lang}': '{text}' vs '{existing}'"),
                ));
            }
        }
    }
    Ok(())
}

/// In-memory, revision-tracking knowledge store.
///
/// Intended for tests and local runs against JSON fixtures. State lives
/// behind a `RwLock`; locks are never held across an await point. Every
/// applied save and revert creates a new revision authored by the store's
/// client name.
pub struct InMemoryKnowledgeStore {
    client: String,
    state: RwLock<StoreState>,
    faults: Mutex<Vec<Fault>>,
    probe: Arc<AccessProbe>,
    latency: Option<Duration>,
}

impl InMemoryKnowledgeStore {
    /// Create an empty store whose client name is `kbm`.
    pub fn new() -> Self {
        Self {
            client: "kbm".into(),
            state: RwLock::new(StoreState::default()),
            faults: Mutex::new(Vec::new()),
            probe: Arc::new(AccessProbe::new()),
            latency: None,
        }
    }

    /// Use a different author name for edits made through this store.
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// Delay every page read and write by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    /// Insert or replace an entity as an imported revision.
    pub fn insert_entity(&self, mut entity: Entity) {
        entity.assign_claim_ids();
        let mut state = self.state.write().expect("lock poisoned");
        state.entities.remove(&entity.id);
        state.commit(entity, IMPORT_AUTHOR, "import");
    }

    /// Register an existing, non-redirect page.
    pub fn add_page(&self, site: &SiteId, title: impl Into<String>) {
        let mut state = self.state.write().expect("lock poisoned");
        state.pages.insert((site.clone(), title.into()), None);
    }

    /// Register a redirect page pointing at `target`.
    pub fn add_redirect_page(
        &self,
        site: &SiteId,
        title: impl Into<String>,
        target: impl Into<String>,
    ) {
        let mut state = self.state.write().expect("lock poisoned");
        state.pages.insert((site.clone(), title.into()), Some(target.into()));
    }

    pub fn remove_page(&self, site: &SiteId, title: &str) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        state.pages.remove(&(site.clone(), title.to_string())).is_some()
    }

    /// Schedule a failure.
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().expect("fault lock poisoned").push(fault);
    }

    pub fn probe(&self) -> &Arc<AccessProbe> {
        &self.probe
    }

    /// Current state of an entity, without going through the async API.
    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        let state = self.state.read().expect("lock poisoned");
        state.entities.get(id).map(|r| r.current.clone())
    }

    pub fn revisions(&self, id: &EntityId) -> Vec<Revision> {
        let state = self.state.read().expect("lock poisoned");
        state
            .entities
            .get(id)
            .map(|r| r.revisions.clone())
            .unwrap_or_default()
    }

    /// Every applied save, in order.
    pub fn saves(&self) -> Vec<SaveRecord> {
        self.state.read().expect("lock poisoned").saves.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state.read().expect("lock poisoned").saves.len()
    }

    /// Entities that were reverted, in order.
    pub fn reverts(&self) -> Vec<EntityId> {
        self.state.read().expect("lock poisoned").reverts.clone()
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        let state = self.state.read().expect("lock poisoned");
        state.entities.keys().cloned().collect()
    }

    pub(crate) fn pages(&self) -> Vec<(SiteId, String, Option<String>)> {
        let state = self.state.read().expect("lock poisoned");
        state
            .pages
            .iter()
            .map(|((site, title), redirect)| (site.clone(), title.clone(), redirect.clone()))
            .collect()
    }

    pub(crate) fn current_entities(&self) -> Vec<Entity> {
        let state = self.state.read().expect("lock poisoned");
        state.entities.values().map(|r| r.current.clone()).collect()
    }

    fn take_fault(&self, target: FaultTarget, entity: &EntityId) -> bool {
        let mut faults = self.faults.lock().expect("fault lock poisoned");
        let hit = faults.iter_mut().find(|f| {
            f.remaining > 0 && f.target == target && f.entity.as_ref().map_or(true, |e| e == entity)
        });
        match hit {
            Some(fault) => {
                fault.remaining -= 1;
                true
            }
            None => false,
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryKnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (entities, pages) = {
            let state = self.state.read().expect("lock poisoned");
            (state.entities.len(), state.pages.len())
        };
        f.debug_struct("InMemoryKnowledgeStore")
            .field("client", &self.client)
            .field("entity_count", &entities)
            .field("page_count", &pages)
            .finish()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn fetch(&self, id: &EntityId) -> StoreResult<Entity> {
        self.entity(id).ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn page_exists(&self, site: &SiteId, title: &str) -> StoreResult<bool> {
        let _visit = self.probe.enter_site(site);
        self.pause().await;
        let state = self.state.read().expect("lock poisoned");
        Ok(state.pages.contains_key(&(site.clone(), title.to_string())))
    }

    async fn resolve_redirect(&self, site: &SiteId, title: &str) -> StoreResult<Option<String>> {
        let _visit = self.probe.enter_site(site);
        self.pause().await;
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .pages
            .get(&(site.clone(), title.to_string()))
            .cloned()
            .flatten())
    }

    async fn linked_entity(&self, site: &SiteId, title: &str) -> StoreResult<Option<EntityId>> {
        let _visit = self.probe.enter_site(site);
        self.pause().await;
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .entities
            .values()
            .map(|r| &r.current)
            .find(|e| !e.is_redirect() && e.sitelink(site) == Some(title))
            .map(|e| e.id.clone()))
    }

    async fn save(&self, request: SaveRequest) -> StoreResult<SaveReceipt> {
        let _visit = self.probe.enter_save();
        self.pause().await;
        let kind = request.mutation.kind();
        if self.take_fault(FaultTarget::Save(kind), &request.entity) {
            return Err(StoreError::write(&request.entity, format!("injected {kind} failure")));
        }
        let mut state = self.state.write().expect("lock poisoned");
        let receipt = state.apply(&self.client, &request)?;
        state.saves.push(SaveRecord {
            entity: request.entity.clone(),
            kind,
            summary: request.summary.clone(),
            asynchronous: request.asynchronous,
        });
        debug!(entity = %request.entity, %kind, revision = receipt.revision, "save applied");
        Ok(receipt)
    }

    async fn revert(&self, id: &EntityId, summary: &str) -> StoreResult<SaveReceipt> {
        let _visit = self.probe.enter_save();
        self.pause().await;
        if self.take_fault(FaultTarget::Revert, id) {
            return Err(StoreError::revert(id, "injected revert failure"));
        }
        let mut state = self.state.write().expect("lock poisoned");
        state.revert(&self.client, id, summary)
    }

    async fn search(&self, query: &str, offset: u64, limit: usize) -> StoreResult<Vec<EntityId>> {
        let query = SearchQuery::parse(query)?;
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .entities
            .values()
            .filter(|r| query.matches(&r.current))
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit)
            .map(|r| r.current.id.clone())
            .collect())
    }

    async fn revision_count(&self, id: &EntityId) -> StoreResult<usize> {
        let state = self.state.read().expect("lock poisoned");
        state
            .entities
            .get(id)
            .map(|r| r.revisions.len())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
