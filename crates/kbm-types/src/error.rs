use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("invalid property id: {0}")]
    InvalidPropertyId(String),

    #[error("invalid site id: {0}")]
    InvalidSiteId(String),

    #[error("unknown merge field: {0}")]
    UnknownMergeField(String),
}
