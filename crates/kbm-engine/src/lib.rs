//! Concurrent duplicate-merge engine for kbm.
//!
//! [`DedupEngine`] pulls candidate entities from a [`CandidateStream`],
//! hands them to a fixed [`WorkerPool`] through a bounded queue, and runs
//! each one through the merge pipeline. Progress is kept as a resumable
//! offset and the outcome of every job is tallied in a [`RunReport`].
//!
//! [`CandidateStream`]: kbm_stream::CandidateStream

pub mod config;
pub mod editgroup;
pub mod engine;
pub mod error;
pub mod pool;
pub mod report;

pub use config::EngineConfig;
pub use editgroup::EditGroup;
pub use engine::DedupEngine;
pub use error::{EngineError, EngineResult};
pub use pool::{WorkItem, WorkQueue, WorkerPool};
pub use report::RunReport;
