use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("unknown query template: {0}")]
    UnknownQuery(String),

    #[error("query template '{query}' needs parameter '{param}'")]
    MissingParam { query: String, param: String },

    #[error("unterminated placeholder in query template '{0}'")]
    MalformedTemplate(String),

    #[error("store error: {0}")]
    Store(#[from] kbm_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;
