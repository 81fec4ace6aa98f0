//! In-process document store.
//!
//! Documents live in hash maps behind a single `RwLock`. Each trait method
//! takes the lock once, so every mutation is atomic on its document just
//! like the PostgreSQL backend's row lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use deckhub_core::change::{ChangeRecord, PathSegment};
use deckhub_core::model::{
    ContentItem, Deck, DeckProperties, DeckRevision, ItemKind, NewDeck, NewSlide, NodeRef, Slide,
    VariantRef,
};
use deckhub_core::types::{DbId, RevisionId};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{ChangeLogStore, DeckStore, PathResolver, SlideStore};
use crate::tree;

#[derive(Debug)]
struct State {
    decks: HashMap<DbId, Deck>,
    slides: HashMap<DbId, Slide>,
    changes: Vec<ChangeRecord>,
    next_deck_id: DbId,
    next_slide_id: DbId,
}

impl Default for State {
    fn default() -> Self {
        Self {
            decks: HashMap::new(),
            slides: HashMap::new(),
            changes: Vec::new(),
            next_deck_id: 1,
            next_slide_id: 1,
        }
    }
}

/// Document store backed by process memory.
///
/// Cheap to construct; wrap in `Arc` to share across tasks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `deck` as-is, replacing any deck with the same id. Later
    /// inserts allocate ids above it.
    pub async fn put_deck(&self, deck: Deck) {
        let mut state = self.state.write().await;
        state.next_deck_id = state.next_deck_id.max(deck.id + 1);
        state.decks.insert(deck.id, deck);
    }

    /// Store `slide` as-is, replacing any slide with the same id.
    pub async fn put_slide(&self, slide: Slide) {
        let mut state = self.state.write().await;
        state.next_slide_id = state.next_slide_id.max(slide.id + 1);
        state.slides.insert(slide.id, slide);
    }

    /// Every change record in insertion order.
    pub async fn all_changes(&self) -> Vec<ChangeRecord> {
        self.state.read().await.changes.clone()
    }
}

#[async_trait]
impl DeckStore for MemoryStore {
    async fn get_deck(&self, id: DbId) -> Result<Option<Deck>, StoreError> {
        Ok(self.state.read().await.decks.get(&id).cloned())
    }

    async fn insert_deck(&self, input: NewDeck, user: DbId) -> Result<Deck, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_deck_id;
        state.next_deck_id += 1;
        let deck = Deck::create(id, input, user, Utc::now());
        state.decks.insert(id, deck.clone());
        Ok(deck)
    }

    async fn update_content_items(
        &self,
        deck_id: DbId,
        items: Vec<ContentItem>,
    ) -> Result<Option<DeckRevision>, StoreError> {
        let mut state = self.state.write().await;
        let Some(rev) = state
            .decks
            .get_mut(&deck_id)
            .and_then(Deck::latest_revision_mut)
        else {
            return Ok(None);
        };
        rev.content_items = items;
        Ok(Some(rev.clone()))
    }

    async fn update_deck_properties(
        &self,
        deck_id: DbId,
        props: DeckProperties,
    ) -> Result<Option<DeckRevision>, StoreError> {
        let mut state = self.state.write().await;
        let Some(deck) = state.decks.get_mut(&deck_id) else {
            return Ok(None);
        };
        deck.apply_properties(&props);
        Ok(deck.latest_revision().cloned())
    }

    async fn revise_deck(
        &self,
        deck_id: DbId,
        from_revision: Option<RevisionId>,
        user: DbId,
    ) -> Result<Option<DeckRevision>, StoreError> {
        let mut state = self.state.write().await;
        let Some(deck) = state.decks.get_mut(&deck_id) else {
            return Ok(None);
        };
        let Some(from) = from_revision.or_else(|| deck.latest_ref().map(|r| r.revision)) else {
            return Ok(None);
        };
        Ok(Some(deck.push_revision(from, user, Utc::now())?.clone()))
    }

    async fn add_deck_usage(&self, deck: NodeRef, parent: NodeRef) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .decks
            .get_mut(&deck.id)
            .and_then(|d| d.revision_mut(deck.revision))
            .is_some_and(|r| r.add_usage(parent)))
    }

    async fn replace_item_ref(
        &self,
        parent_id: DbId,
        kind: ItemKind,
        old: NodeRef,
        new: NodeRef,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .decks
            .get_mut(&parent_id)
            .is_some_and(|d| d.replace_item_ref(kind, old, new)))
    }

    async fn add_slide_variant(
        &self,
        deck_id: DbId,
        slide_id: DbId,
        variant: VariantRef,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.decks.get_mut(&deck_id) {
            Some(deck) => Ok(deck.insert_slide_variant(slide_id, variant)?),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SlideStore for MemoryStore {
    async fn get_slide(&self, id: DbId) -> Result<Option<Slide>, StoreError> {
        Ok(self.state.read().await.slides.get(&id).cloned())
    }

    async fn insert_slide(&self, input: NewSlide, user: DbId) -> Result<Slide, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_slide_id;
        state.next_slide_id += 1;
        let slide = Slide::create(id, input, user, Utc::now());
        state.slides.insert(id, slide.clone());
        Ok(slide)
    }

    async fn copy_slide(
        &self,
        source: NodeRef,
        user: DbId,
        parent: NodeRef,
    ) -> Result<Option<Slide>, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_slide_id;
        let Some(copy) = state
            .slides
            .get(&source.id)
            .and_then(|s| s.duplicate(id, source.revision, user, parent, Utc::now()))
        else {
            return Ok(None);
        };
        state.next_slide_id += 1;
        state.slides.insert(id, copy.clone());
        Ok(Some(copy))
    }

    async fn add_slide_usage(
        &self,
        slide: NodeRef,
        parent: NodeRef,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .slides
            .get_mut(&slide.id)
            .is_some_and(|s| s.add_usage(slide.revision, parent)))
    }
}

#[async_trait]
impl ChangeLogStore for MemoryStore {
    async fn insert_changes(&self, records: &[ChangeRecord]) -> Result<(), StoreError> {
        self.state.write().await.changes.extend_from_slice(records);
        Ok(())
    }

    async fn list_deck_changes(&self, deck_id: DbId) -> Result<Vec<ChangeRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .changes
            .iter()
            .filter(|r| r.path_deck_ids().contains(&deck_id))
            .cloned()
            .collect())
    }

    async fn list_slide_changes(&self, slide_id: DbId) -> Result<Vec<ChangeRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .changes
            .iter()
            .filter(|r| r.slide_ids().contains(&slide_id))
            .cloned()
            .collect())
    }

    async fn get_changes(&self, ids: &[Uuid]) -> Result<Vec<ChangeRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .changes
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn count_changes(&self, deck: NodeRef) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .changes
            .iter()
            .filter(|r| r.deck_ref() == Some(deck))
            .count() as i64)
    }
}

#[async_trait]
impl PathResolver for MemoryStore {
    async fn resolve_path(
        &self,
        root_id: DbId,
        node_id: DbId,
        kind: ItemKind,
    ) -> Result<Vec<PathSegment>, StoreError> {
        tree::resolve_path(self, root_id, node_id, kind).await
    }
}
