//! Storage seams used by the engine.
//!
//! Every mutation is a read-modify-write of a single document and is atomic
//! on that document only. Methods that address a missing document return
//! `Ok(None)` or `Ok(false)` rather than an error; callers decide whether
//! absence is fatal.

use async_trait::async_trait;
use deckhub_core::change::{ChangeRecord, PathSegment};
use deckhub_core::model::{
    ContentItem, Deck, DeckProperties, DeckRevision, ItemKind, NewDeck, NewSlide, NodeRef, Slide,
    VariantRef,
};
use deckhub_core::types::{DbId, RevisionId};
use uuid::Uuid;

use crate::error::StoreError;

#[async_trait]
pub trait DeckStore: Send + Sync {
    async fn get_deck(&self, id: DbId) -> Result<Option<Deck>, StoreError>;

    /// Create a deck document with a single revision and a fresh id.
    async fn insert_deck(&self, input: NewDeck, user: DbId) -> Result<Deck, StoreError>;

    /// Overwrite the content list of the latest revision.
    async fn update_content_items(
        &self,
        deck_id: DbId,
        items: Vec<ContentItem>,
    ) -> Result<Option<DeckRevision>, StoreError>;

    /// Apply property edits to the latest revision.
    async fn update_deck_properties(
        &self,
        deck_id: DbId,
        props: DeckProperties,
    ) -> Result<Option<DeckRevision>, StoreError>;

    /// Append a revision copied from `from_revision` (the latest when `None`).
    async fn revise_deck(
        &self,
        deck_id: DbId,
        from_revision: Option<RevisionId>,
        user: DbId,
    ) -> Result<Option<DeckRevision>, StoreError>;

    /// Record `parent` as a user of the deck revision `deck`.
    async fn add_deck_usage(&self, deck: NodeRef, parent: NodeRef) -> Result<bool, StoreError>;

    /// Re-point items of `kind` in the latest revision of `parent_id` from
    /// `old` to `new`.
    async fn replace_item_ref(
        &self,
        parent_id: DbId,
        kind: ItemKind,
        old: NodeRef,
        new: NodeRef,
    ) -> Result<bool, StoreError>;

    /// Register a translation on the slide item `slide_id` of `deck_id`.
    async fn add_slide_variant(
        &self,
        deck_id: DbId,
        slide_id: DbId,
        variant: VariantRef,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SlideStore: Send + Sync {
    async fn get_slide(&self, id: DbId) -> Result<Option<Slide>, StoreError>;

    async fn insert_slide(&self, input: NewSlide, user: DbId) -> Result<Slide, StoreError>;

    /// Duplicate revision `source` into a new slide document used by `parent`.
    async fn copy_slide(
        &self,
        source: NodeRef,
        user: DbId,
        parent: NodeRef,
    ) -> Result<Option<Slide>, StoreError>;

    /// Record `parent` as a user of the slide revision `slide`.
    async fn add_slide_usage(&self, slide: NodeRef, parent: NodeRef)
        -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ChangeLogStore: Send + Sync {
    /// Append a batch of records.
    async fn insert_changes(&self, records: &[ChangeRecord]) -> Result<(), StoreError>;

    /// Records whose path passes through `deck_id`, oldest first.
    async fn list_deck_changes(&self, deck_id: DbId) -> Result<Vec<ChangeRecord>, StoreError>;

    /// Records whose value or old value references `slide_id`, oldest first.
    async fn list_slide_changes(&self, slide_id: DbId) -> Result<Vec<ChangeRecord>, StoreError>;

    /// Records with the given ids, oldest first. Unknown ids are skipped.
    async fn get_changes(&self, ids: &[Uuid]) -> Result<Vec<ChangeRecord>, StoreError>;

    /// Number of records whose path ends at the deck revision `deck`.
    async fn count_changes(&self, deck: NodeRef) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait PathResolver: Send + Sync {
    /// Path from `root_id` to the node `node_id` of `kind`. Empty when the
    /// node is not reachable from the root.
    async fn resolve_path(
        &self,
        root_id: DbId,
        node_id: DbId,
        kind: ItemKind,
    ) -> Result<Vec<PathSegment>, StoreError>;
}

/// Everything the engine needs from a backend.
pub trait DocumentStore: DeckStore + SlideStore + ChangeLogStore + PathResolver {}

impl<T> DocumentStore for T where T: DeckStore + SlideStore + ChangeLogStore + PathResolver {}
