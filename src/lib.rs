//! Encore keeps a shared music-listening session ("party") in sync: one host
//! drives playback, listeners follow, and everyone's feedback shapes the queue.
//!
//! The engine is layered the usual way: `domain` owns the aggregates and the
//! collaborator contracts, `application` orchestrates them, and `infra` ships
//! in-memory implementations of the contracts.

pub use application;
pub use domain;
pub use infra;
