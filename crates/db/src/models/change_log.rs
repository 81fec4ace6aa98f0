//! Change-log rows.
//!
//! `path_ids` and `slide_ids` are denormalized from the record so history
//! lookups can use GIN indexes instead of scanning JSONB. Rows are never
//! updated.

use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use deckhub_core::change::ChangeRecord;
use deckhub_core::types::{DbId, RevisionId, Timestamp};

/// A row from the `change_log` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChangeLogRow {
    pub id: Uuid,
    /// Deck revision the record's path ends at.
    pub deck_id: Option<DbId>,
    pub deck_revision: Option<RevisionId>,
    pub path_ids: Vec<DbId>,
    pub slide_ids: Vec<DbId>,
    pub created_at: Timestamp,
    pub record: Json<ChangeRecord>,
}

impl ChangeLogRow {
    pub fn into_record(self) -> ChangeRecord {
        self.record.0
    }
}

/// Insert DTO derived from a record.
#[derive(Debug, Clone)]
pub struct CreateChangeLog<'a> {
    pub id: Uuid,
    pub deck_id: Option<DbId>,
    pub deck_revision: Option<RevisionId>,
    pub path_ids: Vec<DbId>,
    pub slide_ids: Vec<DbId>,
    pub created_at: Timestamp,
    pub record: &'a ChangeRecord,
}

impl<'a> From<&'a ChangeRecord> for CreateChangeLog<'a> {
    fn from(record: &'a ChangeRecord) -> Self {
        let deck = record.deck_ref();
        Self {
            id: record.id,
            deck_id: deck.map(|d| d.id),
            deck_revision: deck.map(|d| d.revision),
            path_ids: record.path_deck_ids(),
            slide_ids: record.slide_ids(),
            created_at: record.timestamp,
            record,
        }
    }
}
