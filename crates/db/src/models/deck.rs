use sqlx::types::Json;
use sqlx::FromRow;

use deckhub_core::model::Deck;
use deckhub_core::types::{DbId, Timestamp};

/// A row from the `decks` table.
#[derive(Debug, Clone, FromRow)]
pub struct DeckRow {
    pub id: DbId,
    pub document: Json<Deck>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DeckRow {
    pub fn into_deck(self) -> Deck {
        self.document.0
    }
}
