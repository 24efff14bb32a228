use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::claim::{Claim, ClaimId};
use crate::error::TypeError;
use crate::id::{EntityId, PropertyId, SiteId};

/// A knowledge-base record.
///
/// Entities are fetched from a store on demand and mutated in place while a
/// merge job runs. A redirect entity has no content of its own; `redirect`
/// names the entity it forwards to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub claims: BTreeMap<PropertyId, Vec<Claim>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sitelinks: BTreeMap<SiteId, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub descriptions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<EntityId>,
}

impl Entity {
    /// An empty entity.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            claims: BTreeMap::new(),
            sitelinks: BTreeMap::new(),
            labels: BTreeMap::new(),
            descriptions: BTreeMap::new(),
            redirect: None,
        }
    }

    /// A redirect entity forwarding to `target`.
    pub fn redirect_to(id: EntityId, target: EntityId) -> Self {
        Self {
            redirect: Some(target),
            ..Self::new(id)
        }
    }

    pub fn with_label(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.labels.insert(lang.into(), text.into());
        self
    }

    pub fn with_description(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.descriptions.insert(lang.into(), text.into());
        self
    }

    pub fn with_sitelink(mut self, site: SiteId, title: impl Into<String>) -> Self {
        self.sitelinks.insert(site, title.into());
        self
    }

    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.add_claim(claim);
        self
    }

    /// Add a claim, assigning a fresh id if it has none.
    pub fn add_claim(&mut self, mut claim: Claim) -> ClaimId {
        if claim.id.is_empty() {
            claim.id = ClaimId::generate(&self.id);
        }
        let id = claim.id.clone();
        self.claims.entry(claim.property.clone()).or_default().push(claim);
        id
    }

    /// Assign ids to every claim that lacks one.
    pub fn assign_claim_ids(&mut self) {
        let entity = self.id.clone();
        for claim in self.claims.values_mut().flatten() {
            if claim.id.is_empty() {
                claim.id = ClaimId::generate(&entity);
            }
        }
    }

    /// Claims for one property, in order.
    pub fn claims_for(&self, property: &PropertyId) -> &[Claim] {
        self.claims.get(property).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over every claim of the entity.
    pub fn all_claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values().flatten()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.values().map(Vec::len).sum()
    }

    pub fn has_claim(&self, id: &ClaimId) -> bool {
        self.all_claims().any(|c| &c.id == id)
    }

    /// Remove the claims with the given ids. Returns how many were removed.
    pub fn remove_claims(&mut self, ids: &[ClaimId]) -> usize {
        let mut removed = 0;
        for claims in self.claims.values_mut() {
            let before = claims.len();
            claims.retain(|c| !ids.contains(&c.id));
            removed += before - claims.len();
        }
        self.claims.retain(|_, claims| !claims.is_empty());
        removed
    }

    /// Remove sitelinks for the given sites. Returns how many were removed.
    pub fn remove_sitelinks(&mut self, sites: &[SiteId]) -> usize {
        let before = self.sitelinks.len();
        self.sitelinks.retain(|site, _| !sites.contains(site));
        before - self.sitelinks.len()
    }

    pub fn sitelink(&self, site: &SiteId) -> Option<&str> {
        self.sitelinks.get(site).map(String::as_str)
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    /// Returns `true` if the entity carries no content at all.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
            && self.sitelinks.is_empty()
            && self.labels.is_empty()
            && self.descriptions.is_empty()
    }

    /// Drop all content, keeping the id.
    pub fn clear(&mut self) {
        self.claims.clear();
        self.sitelinks.clear();
        self.labels.clear();
        self.descriptions.clear();
    }
}

/// Entity fields that may be allowed to differ during a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeField {
    Label,
    Description,
}

impl fmt::Display for MergeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label => f.write_str("label"),
            Self::Description => f.write_str("description"),
        }
    }
}

impl FromStr for MergeField {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "label" => Ok(Self::Label),
            "description" => Ok(Self::Description),
            other => Err(TypeError::UnknownMergeField(other.to_string())),
        }
    }
}
