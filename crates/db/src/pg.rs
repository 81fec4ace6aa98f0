//! PostgreSQL document store.

use async_trait::async_trait;
use sqlx::PgPool;

use deckhub_core::change::{ChangeRecord, PathSegment};
use deckhub_core::model::{
    ContentItem, Deck, DeckProperties, DeckRevision, ItemKind, NewDeck, NewSlide, NodeRef, Slide,
    VariantRef,
};
use deckhub_core::types::{DbId, RevisionId};
use uuid::Uuid;

use crate::error::StoreError;
use crate::repositories::change_log_repo::ChangeLogRepo;
use crate::repositories::deck_repo::DeckRepo;
use crate::repositories::slide_repo::SlideRepo;
use crate::store::{ChangeLogStore, DeckStore, PathResolver, SlideStore};
use crate::tree;

/// Document store over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DeckStore for PgStore {
    async fn get_deck(&self, id: DbId) -> Result<Option<Deck>, StoreError> {
        Ok(DeckRepo::find_by_id(&self.pool, id).await?)
    }

    async fn insert_deck(&self, input: NewDeck, user: DbId) -> Result<Deck, StoreError> {
        let deck = DeckRepo::create(&self.pool, input, user).await?;
        tracing::debug!(deck_id = deck.id, user, "Inserted deck");
        Ok(deck)
    }

    async fn update_content_items(
        &self,
        deck_id: DbId,
        items: Vec<ContentItem>,
    ) -> Result<Option<DeckRevision>, StoreError> {
        let updated = DeckRepo::modify(&self.pool, deck_id, move |deck| {
            Ok(deck.latest_revision_mut().map(|rev| {
                rev.content_items = items;
                rev.clone()
            }))
        })
        .await?;
        Ok(updated.flatten())
    }

    async fn update_deck_properties(
        &self,
        deck_id: DbId,
        props: DeckProperties,
    ) -> Result<Option<DeckRevision>, StoreError> {
        let updated = DeckRepo::modify(&self.pool, deck_id, move |deck| {
            deck.apply_properties(&props);
            Ok(deck.latest_revision().cloned())
        })
        .await?;
        Ok(updated.flatten())
    }

    async fn revise_deck(
        &self,
        deck_id: DbId,
        from_revision: Option<RevisionId>,
        user: DbId,
    ) -> Result<Option<DeckRevision>, StoreError> {
        let updated = DeckRepo::modify(&self.pool, deck_id, move |deck| {
            let Some(from) = from_revision.or_else(|| deck.latest_ref().map(|r| r.revision))
            else {
                return Ok(None);
            };
            Ok(Some(deck.push_revision(from, user, chrono::Utc::now())?.clone()))
        })
        .await?;
        Ok(updated.flatten())
    }

    async fn add_deck_usage(&self, deck: NodeRef, parent: NodeRef) -> Result<bool, StoreError> {
        let added = DeckRepo::modify(&self.pool, deck.id, move |d| {
            Ok(d.revision_mut(deck.revision).is_some_and(|r| r.add_usage(parent)))
        })
        .await?;
        Ok(added.unwrap_or(false))
    }

    async fn replace_item_ref(
        &self,
        parent_id: DbId,
        kind: ItemKind,
        old: NodeRef,
        new: NodeRef,
    ) -> Result<bool, StoreError> {
        let replaced = DeckRepo::modify(&self.pool, parent_id, move |deck| {
            Ok(deck.replace_item_ref(kind, old, new))
        })
        .await?;
        Ok(replaced.unwrap_or(false))
    }

    async fn add_slide_variant(
        &self,
        deck_id: DbId,
        slide_id: DbId,
        variant: VariantRef,
    ) -> Result<bool, StoreError> {
        let added = DeckRepo::modify(&self.pool, deck_id, move |deck| {
            deck.insert_slide_variant(slide_id, variant)
        })
        .await?;
        Ok(added.unwrap_or(false))
    }
}

#[async_trait]
impl SlideStore for PgStore {
    async fn get_slide(&self, id: DbId) -> Result<Option<Slide>, StoreError> {
        Ok(SlideRepo::find_by_id(&self.pool, id).await?)
    }

    async fn insert_slide(&self, input: NewSlide, user: DbId) -> Result<Slide, StoreError> {
        SlideRepo::create(&self.pool, input, user).await
    }

    async fn copy_slide(
        &self,
        source: NodeRef,
        user: DbId,
        parent: NodeRef,
    ) -> Result<Option<Slide>, StoreError> {
        SlideRepo::duplicate(&self.pool, source, user, parent).await
    }

    async fn add_slide_usage(
        &self,
        slide: NodeRef,
        parent: NodeRef,
    ) -> Result<bool, StoreError> {
        SlideRepo::add_usage(&self.pool, slide.id, slide.revision, parent).await
    }
}

#[async_trait]
impl ChangeLogStore for PgStore {
    async fn insert_changes(&self, records: &[ChangeRecord]) -> Result<(), StoreError> {
        Ok(ChangeLogRepo::insert_many(&self.pool, records).await?)
    }

    async fn list_deck_changes(&self, deck_id: DbId) -> Result<Vec<ChangeRecord>, StoreError> {
        Ok(ChangeLogRepo::list_by_deck(&self.pool, deck_id).await?)
    }

    async fn list_slide_changes(&self, slide_id: DbId) -> Result<Vec<ChangeRecord>, StoreError> {
        Ok(ChangeLogRepo::list_by_slide(&self.pool, slide_id).await?)
    }

    async fn get_changes(&self, ids: &[Uuid]) -> Result<Vec<ChangeRecord>, StoreError> {
        Ok(ChangeLogRepo::find_by_ids(&self.pool, ids).await?)
    }

    async fn count_changes(&self, deck: NodeRef) -> Result<i64, StoreError> {
        Ok(ChangeLogRepo::count_for_revision(&self.pool, deck).await?)
    }
}

#[async_trait]
impl PathResolver for PgStore {
    async fn resolve_path(
        &self,
        root_id: DbId,
        node_id: DbId,
        kind: ItemKind,
    ) -> Result<Vec<PathSegment>, StoreError> {
        tree::resolve_path(self, root_id, node_id, kind).await
    }
}
