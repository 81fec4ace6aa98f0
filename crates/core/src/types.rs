/// Deck and slide ids are PostgreSQL BIGSERIAL values.
pub type DbId = i64;

/// Revision ids are dense per entity and start at 1.
pub type RevisionId = i32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
