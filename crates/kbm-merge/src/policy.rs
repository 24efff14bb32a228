use std::collections::BTreeSet;

use kbm_types::{Claim, DataType, Entity, PropertyId};
use tracing::debug;

use crate::error::{MergeError, MergeResult};

/// Safety check for merges: two entities describing the same thing do not
/// disagree on identifying properties.
///
/// For every property in the checked set that both entities use, the two
/// value sets must intersect. External identifiers shared by both entities
/// are checked the same way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergePolicy {
    properties: BTreeSet<PropertyId>,
    datatypes: Vec<DataType>,
}

impl MergePolicy {
    pub fn new(properties: impl IntoIterator<Item = PropertyId>, datatypes: Vec<DataType>) -> Self {
        Self {
            properties: properties.into_iter().collect(),
            datatypes,
        }
    }

    /// Returns `PolicyConflict` naming the first property whose values do
    /// not overlap.
    pub fn check(&self, a: &Entity, b: &Entity) -> MergeResult<()> {
        for property in &self.properties {
            if conflicts(a.claims_for(property), b.claims_for(property)) {
                debug!(a = %a.id, b = %b.id, %property, "values do not overlap");
                return Err(MergeError::PolicyConflict {
                    property: property.clone(),
                });
            }
        }
        for (property, claims) in &a.claims {
            let typed =
                |c: &[Claim]| c.first().is_some_and(|c| self.datatypes.contains(&c.datatype));
            if !typed(claims) || !typed(b.claims_for(property)) {
                continue;
            }
            if conflicts(claims, b.claims_for(property)) {
                debug!(a = %a.id, b = %b.id, %property, "identifiers do not overlap");
                return Err(MergeError::PolicyConflict {
                    property: property.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyId> {
        self.properties.iter()
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        let properties = [
            "P17", "P21", "P105", "P170", "P171", "P225", "P271", "P296", "P495", "P569", "P570",
            "P734", "P856", "P19", "P31", "P131", "P279",
        ]
        .into_iter()
        .map(|p| PropertyId::new(p).expect("valid built-in property id"));
        Self::new(properties, vec![DataType::ExternalId])
    }
}

/// Two non-empty claim lists conflict when no main snak appears in both.
fn conflicts(a: &[Claim], b: &[Claim]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    !a.iter().any(|x| b.iter().any(|y| x.mainsnak == y.mainsnak))
}
