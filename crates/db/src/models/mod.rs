//! Row models.
//!
//! Decks and slides are stored whole as JSONB documents; the change log
//! keeps its record as JSONB next to the columns it is queried by.

pub mod change_log;
pub mod deck;
pub mod slide;
