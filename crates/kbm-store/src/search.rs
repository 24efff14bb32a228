use kbm_types::{Entity, PropertyId, SnakValue, Value};

use crate::error::{StoreError, StoreResult};

/// A parsed `haswbstatement` search.
///
/// The query is a whitespace-separated list of terms of the form
/// `haswbstatement:P31=Q1|Q2`. An entity matches when, for every term, it
/// has a claim of that property whose main value is one of the listed
/// values. Redirect entities never match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<(PropertyId, Vec<String>)>,
}

impl SearchQuery {
    pub fn parse(query: &str) -> StoreResult<Self> {
        let mut terms = Vec::new();
        for term in query.split_whitespace() {
            let body = term
                .strip_prefix("haswbstatement:")
                .ok_or_else(|| StoreError::Query(format!("unsupported term '{term}'")))?;
            let (prop, values) = body
                .split_once('=')
                .ok_or_else(|| StoreError::Query(format!("missing '=' in '{term}'")))?;
            let property: PropertyId = prop
                .parse()
                .map_err(|e| StoreError::Query(format!("{e} in '{term}'")))?;
            let values: Vec<String> = values
                .split('|')
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            if values.is_empty() {
                return Err(StoreError::Query(format!("no values in '{term}'")));
            }
            terms.push((property, values));
        }
        if terms.is_empty() {
            return Err(StoreError::Query("empty query".into()));
        }
        Ok(Self { terms })
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if entity.is_redirect() {
            return false;
        }
        self.terms.iter().all(|(property, values)| {
            entity.claims_for(property).iter().any(|claim| match &claim.mainsnak {
                SnakValue::Value(Value::Entity(id)) => values.iter().any(|v| v == id.as_str()),
                SnakValue::Value(Value::Literal(s)) => values.contains(s),
                _ => false,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbm_types::{Claim, EntityId};

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn pid(s: &str) -> PropertyId {
        s.parse().unwrap()
    }

    #[test]
    fn parses_alternatives() {
        let q = SearchQuery::parse("haswbstatement:P31=Q1263068|Q17362920").unwrap();
        let dupe = Entity::new(qid("Q9")).with_claim(Claim::entity(pid("P31"), qid("Q17362920")));
        let other = Entity::new(qid("Q10")).with_claim(Claim::entity(pid("P31"), qid("Q5")));
        assert!(q.matches(&dupe));
        assert!(!q.matches(&other));
    }

    #[test]
    fn all_terms_must_match() {
        let q = SearchQuery::parse("haswbstatement:P31=Q5 haswbstatement:P21=Q6").unwrap();
        let half = Entity::new(qid("Q1")).with_claim(Claim::entity(pid("P31"), qid("Q5")));
        let full = half.clone().with_claim(Claim::entity(pid("P21"), qid("Q6")));
        assert!(!q.matches(&half));
        assert!(q.matches(&full));
    }

    #[test]
    fn redirects_never_match() {
        let q = SearchQuery::parse("haswbstatement:P31=Q5").unwrap();
        let r = Entity::redirect_to(qid("Q1"), qid("Q2"));
        assert!(!q.matches(&r));
    }

    #[test]
    fn rejects_garbage() {
        assert!(SearchQuery::parse("").is_err());
        assert!(SearchQuery::parse("SELECT ?item").is_err());
        assert!(SearchQuery::parse("haswbstatement:P31").is_err());
        assert!(SearchQuery::parse("haswbstatement:Q31=Q5").is_err());
        assert!(SearchQuery::parse("haswbstatement:P31=").is_err());
    }
}
