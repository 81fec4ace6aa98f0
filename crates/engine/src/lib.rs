//! Revision and tree engine for decks.
//!
//! Everything here is generic over [`deckhub_db::store::DocumentStore`]:
//! tree resolution, change tracking, the change-log aggregator, fork and
//! attach copies, translations and history presentation. Operations are
//! sequential awaits against the store; a multi-document operation that
//! fails midway leaves the documents written so far in place.

pub mod changelog;
pub mod copy;
pub mod error;
pub mod history;
pub mod resolver;
pub mod tracker;
pub mod translate;
