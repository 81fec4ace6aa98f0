//! Repository for the `decks` table.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;

use deckhub_core::error::CoreError;
use deckhub_core::model::{Deck, NewDeck};
use deckhub_core::types::DbId;

use crate::error::StoreError;
use crate::models::deck::DeckRow;

/// Column list for `decks` queries.
const COLUMNS: &str = "id, document, created_at, updated_at";

/// Provides document operations for decks.
pub struct DeckRepo;

impl DeckRepo {
    /// Find a deck by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Deck>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM decks WHERE id = $1");
        let row = sqlx::query_as::<_, DeckRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(DeckRow::into_deck))
    }

    /// Insert a new deck document, allocating its id from the table sequence.
    pub async fn create(pool: &PgPool, input: NewDeck, user: DbId) -> Result<Deck, StoreError> {
        let mut tx = pool.begin().await?;
        let id: DbId = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('decks', 'id'))")
            .fetch_one(&mut *tx)
            .await?;
        let deck = Deck::create(id, input, user, Utc::now());
        sqlx::query("INSERT INTO decks (id, document) VALUES ($1, $2)")
            .bind(id)
            .bind(Json(&deck))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deck)
    }

    /// Read-modify-write the deck `id` under a row lock.
    ///
    /// Returns `Ok(None)` if the deck does not exist. An error from `f`
    /// rolls the transaction back and leaves the document untouched.
    pub async fn modify<T, F>(pool: &PgPool, id: DbId, f: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut Deck) -> Result<T, CoreError> + Send,
        T: Send,
    {
        let mut tx = pool.begin().await?;
        let query = format!("SELECT {COLUMNS} FROM decks WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, DeckRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut deck = row.into_deck();
        let out = f(&mut deck)?;

        sqlx::query("UPDATE decks SET document = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(Json(&deck))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(out))
    }
}
