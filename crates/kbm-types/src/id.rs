use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Split `"Q42"` into `('Q', 42)` if it is a letter followed by a positive
/// decimal number without leading zeros.
fn split_prefixed(s: &str) -> Option<(char, u64)> {
    let mut chars = s.chars();
    let prefix = chars.next()?;
    let digits = chars.as_str();
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|n| (prefix, n))
}

/// Identifier of a knowledge-base record, e.g. `Q42`.
///
/// Items (`Q`), properties (`P`) and lexemes (`L`) share one namespace of
/// entity identifiers. Ordering is by prefix, then by numeric part, so
/// `Q2 < Q10`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse and validate an entity identifier.
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        match split_prefixed(&s) {
            Some(('Q' | 'P' | 'L', _)) => Ok(Self(s)),
            _ => Err(TypeError::InvalidEntityId(s)),
        }
    }

    /// The numeric part of the identifier (`42` for `Q42`).
    pub fn numeric(&self) -> u64 {
        split_prefixed(&self.0).map(|(_, n)| n).unwrap_or(0)
    }

    /// The single-letter entity type prefix.
    pub fn prefix(&self) -> char {
        self.0.chars().next().unwrap_or('Q')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix()
            .cmp(&other.prefix())
            .then_with(|| self.numeric().cmp(&other.numeric()))
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Identifier of a property, e.g. `P31`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyId(String);

impl PropertyId {
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        match split_prefixed(&s) {
            Some(('P', _)) => Ok(Self(s)),
            _ => Err(TypeError::InvalidPropertyId(s)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PropertyId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PropertyId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PropertyId> for String {
    fn from(id: PropertyId) -> Self {
        id.0
    }
}

/// Identifier of an external site a sitelink points into, e.g. `enwiki`.
///
/// Site ids are database names: lowercase ASCII letters, digits and
/// underscores.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SiteId(String);

impl SiteId {
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        let valid = !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if valid {
            Ok(Self(s))
        } else {
            Err(TypeError::InvalidSiteId(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SiteId({})", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SiteId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SiteId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SiteId> for String {
    fn from(id: SiteId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_accepts_items_properties_lexemes() {
        assert!(EntityId::new("Q42").is_ok());
        assert!(EntityId::new("P31").is_ok());
        assert!(EntityId::new("L7").is_ok());
    }

    #[test]
    fn entity_id_rejects_malformed() {
        for bad in ["", "Q", "42", "Q0", "Q042", "X5", "Q4a", "q42"] {
            assert!(EntityId::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn entity_id_orders_numerically() {
        let q2: EntityId = "Q2".parse().unwrap();
        let q10: EntityId = "Q10".parse().unwrap();
        assert!(q2 < q10);
        assert_eq!(q10.numeric(), 10);
    }

    #[test]
    fn property_id_requires_p_prefix() {
        assert!(PropertyId::new("P460").is_ok());
        assert_eq!(
            PropertyId::new("Q460"),
            Err(TypeError::InvalidPropertyId("Q460".into()))
        );
    }

    #[test]
    fn site_id_validation() {
        assert!(SiteId::new("enwiki").is_ok());
        assert!(SiteId::new("zh_yuewiki").is_ok());
        assert!(SiteId::new("").is_err());
        assert!(SiteId::new("en.wiki").is_err());
        assert!(SiteId::new("EnWiki").is_err());
    }

    #[test]
    fn serde_uses_plain_strings() {
        let id: EntityId = "Q1263068".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Q1263068\"");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<EntityId>("\"nope\"").is_err());
    }

    #[test]
    fn display_is_raw_id() {
        let site = SiteId::new("dewiki").unwrap();
        assert_eq!(format!("{site}"), "dewiki");
        assert_eq!(format!("{site:?}"), "SiteId(dewiki)");
    }
}
