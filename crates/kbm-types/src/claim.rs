use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{EntityId, PropertyId};

/// Identifier of a single claim (statement GUID), e.g. `Q42$0191...`.
///
/// An empty id means "not yet assigned"; stores assign ids on load.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(String);

impl ClaimId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a fresh, time-ordered claim id scoped to `entity`.
    pub fn generate(entity: &EntityId) -> Self {
        Self(format!("{entity}${}", uuid::Uuid::now_v7()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimId({})", self.0)
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Datatype of a property's values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    #[default]
    WikibaseItem,
    ExternalId,
    String,
    Time,
    Quantity,
    Url,
    CommonsMedia,
}

/// A concrete data value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Value {
    /// Reference to another entity.
    Entity(EntityId),
    /// Any literal (string, identifier, time, quantity, url) in canonical text form.
    Literal(String),
}

impl Value {
    pub fn as_entity(&self) -> Option<&EntityId> {
        match self {
            Self::Entity(id) => Some(id),
            Self::Literal(_) => None,
        }
    }
}

/// The state of a snak: a concrete value, "no value", or "unknown value".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "snaktype", content = "datavalue", rename_all = "kebab-case")]
pub enum SnakValue {
    Value(Value),
    NoValue,
    UnknownValue,
}

impl SnakValue {
    pub fn entity(id: EntityId) -> Self {
        Self::Value(Value::Entity(id))
    }

    pub fn literal(s: impl Into<String>) -> Self {
        Self::Value(Value::Literal(s.into()))
    }

    /// Returns `true` if this snak carries a concrete value.
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// The referenced entity, if this is an entity-valued snak.
    pub fn target_entity(&self) -> Option<&EntityId> {
        match self {
            Self::Value(v) => v.as_entity(),
            _ => None,
        }
    }
}

/// A property/value pair used as a qualifier or as a reference fragment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snak {
    pub property: PropertyId,
    pub value: SnakValue,
}

impl Snak {
    pub fn new(property: PropertyId, value: SnakValue) -> Self {
        Self { property, value }
    }

    /// Entity-valued snak.
    pub fn entity(property: PropertyId, target: EntityId) -> Self {
        Self::new(property, SnakValue::entity(target))
    }

    pub fn target_entity(&self) -> Option<&EntityId> {
        self.value.target_entity()
    }
}

/// A property/value assertion on an entity, optionally qualified and
/// referenced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub id: ClaimId,
    pub property: PropertyId,
    #[serde(default)]
    pub datatype: DataType,
    pub mainsnak: SnakValue,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualifiers: BTreeMap<PropertyId, Vec<Snak>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Vec<Snak>>,
}

impl Claim {
    /// Build an unqualified claim with an unassigned id.
    pub fn new(property: PropertyId, mainsnak: SnakValue) -> Self {
        Self {
            id: ClaimId::default(),
            property,
            datatype: DataType::WikibaseItem,
            mainsnak,
            qualifiers: BTreeMap::new(),
            references: Vec::new(),
        }
    }

    /// Unqualified entity-valued claim.
    pub fn entity(property: PropertyId, target: EntityId) -> Self {
        Self::new(property, SnakValue::entity(target))
    }

    pub fn with_id(mut self, id: ClaimId) -> Self {
        self.id = id;
        self
    }

    pub fn with_datatype(mut self, datatype: DataType) -> Self {
        self.datatype = datatype;
        self
    }

    /// Append a qualifier snak.
    pub fn with_qualifier(mut self, snak: Snak) -> Self {
        self.qualifiers
            .entry(snak.property.clone())
            .or_default()
            .push(snak);
        self
    }

    /// Append one reference made of the given snaks.
    pub fn with_reference(mut self, snaks: Vec<Snak>) -> Self {
        self.references.push(snaks);
        self
    }

    /// The entity this claim's main snak points at, if any.
    pub fn target_entity(&self) -> Option<&EntityId> {
        self.mainsnak.target_entity()
    }

    /// Entities referenced by value-qualifiers of the given property.
    pub fn qualifier_entities<'a>(
        &'a self,
        property: &PropertyId,
    ) -> impl Iterator<Item = &'a EntityId> + 'a {
        self.qualifiers
            .get(property)
            .into_iter()
            .flatten()
            .filter_map(Snak::target_entity)
    }

    /// Two claims state the same thing if property and main snak agree.
    /// Ids, qualifiers and references are not compared.
    pub fn same_statement(&self, other: &Claim) -> bool {
        self.property == other.property && self.mainsnak == other.mainsnak
    }
}
