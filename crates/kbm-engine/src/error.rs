use kbm_merge::MergeError;
use kbm_store::StoreError;
use kbm_stream::StreamError;

/// Errors that can occur while configuring or running the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("work queue closed")]
    QueueClosed,

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
