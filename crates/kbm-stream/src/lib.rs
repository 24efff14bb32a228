//! Candidate discovery for kbm.
//!
//! A run starts from a search that lists entities flagged as duplicates.
//! [`QueryStore`] renders the search text from a named template,
//! [`CandidateStream`] pages through the results lazily from a numeric
//! offset, and [`ProgressTracker`] keeps the offset a later run can resume
//! from.

pub mod error;
pub mod progress;
pub mod query;
pub mod stream;

pub use error::{StreamError, StreamResult};
pub use progress::ProgressTracker;
pub use query::QueryStore;
pub use stream::CandidateStream;
