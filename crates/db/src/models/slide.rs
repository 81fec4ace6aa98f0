use sqlx::types::Json;
use sqlx::FromRow;

use deckhub_core::model::Slide;
use deckhub_core::types::{DbId, Timestamp};

/// A row from the `slides` table.
#[derive(Debug, Clone, FromRow)]
pub struct SlideRow {
    pub id: DbId,
    pub document: Json<Slide>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SlideRow {
    pub fn into_slide(self) -> Slide {
        self.document.0
    }
}
