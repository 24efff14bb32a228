use kbm_types::{EntityId, SiteId};

/// Errors from knowledge store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// The requested page does not exist on the site.
    #[error("page not found: {site}:{title}")]
    PageNotFound { site: SiteId, title: String },

    /// A save was rejected or failed part way.
    #[error("write to {entity} failed: {reason}")]
    WriteFailure { entity: EntityId, reason: String },

    /// A compensating revert could not be applied.
    #[error("revert of {entity} failed: {reason}")]
    RevertFailure { entity: EntityId, reason: String },

    /// The search query could not be understood.
    #[error("invalid query: {0}")]
    Query(String),

    /// Snapshot fixture is inconsistent.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn write(entity: &EntityId, reason: impl Into<String>) -> Self {
        Self::WriteFailure {
            entity: entity.clone(),
            reason: reason.into(),
        }
    }

    pub fn revert(entity: &EntityId, reason: impl Into<String>) -> Self {
        Self::RevertFailure {
            entity: entity.clone(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
