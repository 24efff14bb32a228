//! Foundation types for kbm, the duplicate-entity merge engine.
//!
//! Every other kbm crate depends on `kbm-types`. The types here mirror the
//! record model of a Wikibase-style knowledge base.
//!
//! # Key Types
//!
//! - [`EntityId`] -- Identifier of a knowledge-base record (`Q42`)
//! - [`PropertyId`] -- Identifier of a property (`P31`)
//! - [`SiteId`] -- Identifier of an external site (`enwiki`)
//! - [`Entity`] -- Claims, sitelinks, labels and descriptions of one record
//! - [`Claim`] -- A property/value assertion with qualifiers and references
//! - [`Snak`] -- A property/value pair used as qualifier or reference fragment

pub mod claim;
pub mod entity;
pub mod error;
pub mod id;

pub use claim::{Claim, ClaimId, DataType, Snak, SnakValue, Value};
pub use entity::{Entity, MergeField};
pub use error::TypeError;
pub use id::{EntityId, PropertyId, SiteId};
