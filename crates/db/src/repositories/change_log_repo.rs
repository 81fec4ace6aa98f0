//! Repository for the append-only `change_log` table.

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use deckhub_core::change::ChangeRecord;
use deckhub_core::model::NodeRef;
use deckhub_core::types::DbId;

use crate::models::change_log::{ChangeLogRow, CreateChangeLog};

/// Column list for `change_log` queries.
const COLUMNS: &str = "\
    id, deck_id, deck_revision, path_ids, slide_ids, created_at, record";

/// Provides insert and lookup operations for change records.
pub struct ChangeLogRepo;

impl ChangeLogRepo {
    /// Insert a batch of records in one transaction.
    pub async fn insert_many(pool: &PgPool, records: &[ChangeRecord]) -> Result<(), sqlx::Error> {
        if records.is_empty() {
            return Ok(());
        }

        let query =
            format!("INSERT INTO change_log ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)");
        let mut tx = pool.begin().await?;
        for record in records {
            let row = CreateChangeLog::from(record);
            sqlx::query(&query)
                .bind(row.id)
                .bind(row.deck_id)
                .bind(row.deck_revision)
                .bind(&row.path_ids)
                .bind(&row.slide_ids)
                .bind(row.created_at)
                .bind(Json(row.record))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    /// Records whose path passes through `deck_id`, oldest first.
    pub async fn list_by_deck(
        pool: &PgPool,
        deck_id: DbId,
    ) -> Result<Vec<ChangeRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM change_log \
             WHERE $1 = ANY(path_ids) \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ChangeLogRow>(&query)
            .bind(deck_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(ChangeLogRow::into_record).collect())
    }

    /// Records referencing `slide_id`, oldest first.
    pub async fn list_by_slide(
        pool: &PgPool,
        slide_id: DbId,
    ) -> Result<Vec<ChangeRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM change_log \
             WHERE $1 = ANY(slide_ids) \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ChangeLogRow>(&query)
            .bind(slide_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(ChangeLogRow::into_record).collect())
    }

    /// Records with the given ids, oldest first.
    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<ChangeRecord>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM change_log \
             WHERE id = ANY($1) \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ChangeLogRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(ChangeLogRow::into_record).collect())
    }

    /// Number of records whose path ends at `deck`.
    pub async fn count_for_revision(pool: &PgPool, deck: NodeRef) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM change_log WHERE deck_id = $1 AND deck_revision = $2",
        )
        .bind(deck.id)
        .bind(deck.revision)
        .fetch_one(pool)
        .await
    }
}
