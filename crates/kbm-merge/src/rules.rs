use std::collections::BTreeSet;

use kbm_types::{Claim, Entity, EntityId, PropertyId};

/// Which claims mark an entity as a duplicate, and of what.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateRules {
    /// Classification property ("instance of").
    pub instance_of: PropertyId,
    /// Direct "said to be the same as" property.
    pub same_as: PropertyId,
    /// Qualifiers on a duplicate-marking claim that name the original.
    pub qualifiers: Vec<PropertyId>,
    /// Classes that mark their instances as duplicates.
    pub duplicate_classes: BTreeSet<EntityId>,
}

impl DuplicateRules {
    pub fn new(
        instance_of: PropertyId,
        same_as: PropertyId,
        qualifiers: Vec<PropertyId>,
        duplicate_classes: impl IntoIterator<Item = EntityId>,
    ) -> Self {
        Self {
            instance_of,
            same_as,
            qualifiers,
            duplicate_classes: duplicate_classes.into_iter().collect(),
        }
    }

    /// Whether the entity carries any classification claim at all.
    /// Unclassified entities are never merged.
    pub fn is_classified(&self, entity: &Entity) -> bool {
        !entity.claims_for(&self.instance_of).is_empty()
    }

    /// Whether `claim` classifies its subject as a duplicate.
    pub fn is_duplicate_marker(&self, claim: &Claim) -> bool {
        claim.property == self.instance_of
            && claim
                .target_entity()
                .is_some_and(|class| self.duplicate_classes.contains(class))
    }

    /// Entities named by the duplicate qualifiers of `claim`.
    pub fn qualified_targets<'a>(
        &'a self,
        claim: &'a Claim,
    ) -> impl Iterator<Item = &'a EntityId> + 'a {
        self.qualifiers
            .iter()
            .flat_map(move |q| claim.qualifier_entities(q))
    }

    /// Whether `claim` on some entity points back at `source` as its
    /// duplicate: either a direct same-as claim, or a duplicate marker
    /// qualified with `source`.
    pub fn refers_to(&self, claim: &Claim, source: &EntityId) -> bool {
        if claim.property == self.same_as {
            return claim.target_entity() == Some(source);
        }
        self.is_duplicate_marker(claim) && self.qualified_targets(claim).any(|e| e == source)
    }

    /// Ids joined with `|`, for search templates.
    pub fn classes_param(&self) -> String {
        self.duplicate_classes
            .iter()
            .map(EntityId::as_str)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl Default for DuplicateRules {
    fn default() -> Self {
        let pid = |s: &str| PropertyId::new(s).expect("valid built-in property id");
        let qid = |s: &str| EntityId::new(s).expect("valid built-in entity id");
        Self::new(
            pid("P31"),
            pid("P460"),
            vec![pid("P460"), pid("P642")],
            ["Q1263068", "Q17362920", "Q20511493", "Q28065731"].map(qid),
        )
    }
}
