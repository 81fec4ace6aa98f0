//! Repository for the `slides` table.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;

use deckhub_core::model::{NewSlide, NodeRef, Slide};
use deckhub_core::types::{DbId, RevisionId};

use crate::error::StoreError;
use crate::models::slide::SlideRow;

/// Column list for `slides` queries.
const COLUMNS: &str = "id, document, created_at, updated_at";

/// Provides document operations for slides.
pub struct SlideRepo;

impl SlideRepo {
    /// Find a slide by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Slide>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM slides WHERE id = $1");
        let row = sqlx::query_as::<_, SlideRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(SlideRow::into_slide))
    }

    /// Insert a new slide document.
    pub async fn create(pool: &PgPool, input: NewSlide, user: DbId) -> Result<Slide, StoreError> {
        let mut tx = pool.begin().await?;
        let id = next_id(&mut tx).await?;
        let slide = Slide::create(id, input, user, Utc::now());
        insert(&mut tx, &slide).await?;
        tx.commit().await?;
        Ok(slide)
    }

    /// Copy revision `source` of a slide into a new document.
    ///
    /// Returns `Ok(None)` if the source slide or revision does not exist.
    pub async fn duplicate(
        pool: &PgPool,
        source: NodeRef,
        user: DbId,
        parent: NodeRef,
    ) -> Result<Option<Slide>, StoreError> {
        let Some(original) = Self::find_by_id(pool, source.id).await? else {
            return Ok(None);
        };
        if original.revision(source.revision).is_none() {
            return Ok(None);
        }

        let mut tx = pool.begin().await?;
        let id = next_id(&mut tx).await?;
        let Some(copy) = original.duplicate(id, source.revision, user, parent, Utc::now()) else {
            return Ok(None);
        };
        insert(&mut tx, &copy).await?;
        tx.commit().await?;
        Ok(Some(copy))
    }

    /// Add `parent` to the usage of slide revision `revision` under a row lock.
    pub async fn add_usage(
        pool: &PgPool,
        id: DbId,
        revision: RevisionId,
        parent: NodeRef,
    ) -> Result<bool, StoreError> {
        let mut tx = pool.begin().await?;
        let query = format!("SELECT {COLUMNS} FROM slides WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, SlideRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };

        let mut slide = row.into_slide();
        if !slide.add_usage(revision, parent) {
            return Ok(false);
        }
        sqlx::query("UPDATE slides SET document = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(Json(&slide))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }
}

async fn next_id(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<DbId, sqlx::Error> {
    sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('slides', 'id'))")
        .fetch_one(&mut **tx)
        .await
}

async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    slide: &Slide,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO slides (id, document) VALUES ($1, $2)")
        .bind(slide.id)
        .bind(Json(slide))
        .execute(&mut **tx)
        .await?;
    Ok(())
}
