//! Change tracker.
//!
//! Snapshot a deck with [`DeckTracker::begin`], apply the edit through the
//! store, then [`DeckTracker::commit`] the updated document. The commit
//! persists the deck-level record first and the content-item records second,
//! each content-item record linking back to the caller's parents and the
//! deck-level record.

use uuid::Uuid;

use deckhub_core::change::{ChangeRecord, NewChange, PathSegment};
use deckhub_core::error::CoreError;
use deckhub_core::model::{ContentItem, Deck, ItemKind, NodeRef};
use deckhub_core::tracking::{
    content_item_changes, deck_level_change, ItemChange, TrackedProperties,
};
use deckhub_core::types::DbId;
use deckhub_db::store::DocumentStore;

use crate::changelog;
use crate::error::EngineError;

/// Before-state of one deck edit.
#[derive(Debug, Clone)]
pub struct DeckTracker {
    deck_id: DbId,
    root_id: DbId,
    user: DbId,
    before: TrackedProperties,
    items_before: Vec<ContentItem>,
}

/// Changes derived from a before/after pair, not yet placed on a path.
#[derive(Debug, Clone)]
pub struct TrackedChanges {
    pub deck: Option<NewChange>,
    pub items: Vec<ItemChange>,
}

impl DeckTracker {
    /// Snapshot `deck`, an edit of which will be attributed to the tree
    /// rooted at `root_id`.
    pub fn begin(deck: &Deck, root_id: DbId, user: DbId) -> Result<Self, CoreError> {
        let before = TrackedProperties::of(deck)
            .ok_or_else(|| CoreError::BadData(format!("deck {} has no revisions", deck.id)))?;
        let items_before = deck
            .latest_revision()
            .map(|rev| rev.content_items.iter().map(ContentItem::trackable).collect())
            .unwrap_or_default();
        Ok(Self {
            deck_id: deck.id,
            root_id,
            user,
            before,
            items_before,
        })
    }

    pub fn deck_id(&self) -> DbId {
        self.deck_id
    }

    /// Derive the changes between the snapshot and `updated`.
    pub fn changes(
        &self,
        updated: &Deck,
        path: &[PathSegment],
    ) -> Result<TrackedChanges, CoreError> {
        let after = TrackedProperties::of(updated).ok_or_else(|| {
            CoreError::BadData(format!("deck {} has no revisions", updated.id))
        })?;
        let items_after = updated
            .latest_revision()
            .map(|rev| rev.content_items.as_slice())
            .unwrap_or_default();

        Ok(TrackedChanges {
            deck: deck_level_change(self.deck_id, &self.before, &after, path, self.user),
            items: content_item_changes(&self.items_before, items_after)?,
        })
    }

    /// Path from the tracked root to the deck as it is now.
    ///
    /// The last segment names the deck's latest revision, the one the edit
    /// was applied to. A deck not reachable from the root is its own root.
    async fn deck_path<S>(&self, store: &S, latest: NodeRef) -> Result<Vec<PathSegment>, EngineError>
    where
        S: DocumentStore + ?Sized,
    {
        let mut path = store
            .resolve_path(self.root_id, self.deck_id, ItemKind::Deck)
            .await?;
        match path.last_mut() {
            Some(PathSegment::Node { revision, .. }) => *revision = latest.revision,
            _ => {
                if self.root_id != self.deck_id {
                    tracing::debug!(
                        deck_id = self.deck_id,
                        root_id = self.root_id,
                        "Deck not under root, tracking at its own position"
                    );
                }
                path = vec![PathSegment::root(latest)];
            }
        }
        Ok(path)
    }

    /// Persist the changes between the snapshot and `updated`.
    ///
    /// `parents` are causally prior records (e.g. the fork that triggered a
    /// revise). Returns every persisted record, deck-level first.
    pub async fn commit<S>(
        self,
        store: &S,
        updated: &Deck,
        parents: &[Uuid],
    ) -> Result<Vec<ChangeRecord>, EngineError>
    where
        S: DocumentStore + ?Sized,
    {
        let latest = updated
            .latest_ref()
            .ok_or_else(|| CoreError::BadData(format!("deck {} has no revisions", updated.id)))?;
        let path = self.deck_path(store, latest).await?;
        let changes = self.changes(updated, &path)?;

        let deck_changes: Vec<NewChange> = changes
            .deck
            .into_iter()
            .map(|mut change| {
                change.parents = parents.to_vec();
                change
            })
            .collect();
        let mut records = changelog::record(store, deck_changes).await?;

        let mut item_parents = parents.to_vec();
        item_parents.extend(records.iter().map(|r| r.id));
        let item_changes = changes
            .items
            .into_iter()
            .map(|change| change.into_new_change(&path, self.user, &item_parents))
            .collect();
        records.extend(changelog::record(store, item_changes).await?);

        tracing::debug!(
            deck_id = self.deck_id,
            root_id = self.root_id,
            count = records.len(),
            "Committed tracked deck edit"
        );
        Ok(records)
    }
}
