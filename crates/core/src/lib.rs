//! Domain model and pure algorithms for revisioned deck trees.
//!
//! Nothing in this crate performs I/O: the document store lives in
//! `deckhub-db` and the async orchestration in `deckhub-engine`.

pub mod change;
pub mod diff;
pub mod error;
pub mod history;
pub mod model;
pub mod simplify;
pub mod tracking;
pub mod types;
