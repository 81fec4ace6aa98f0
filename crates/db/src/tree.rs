//! Depth-first search over the latest deck tree.
//!
//! Shared by every backend's [`PathResolver`](crate::store::PathResolver).
//! Subdecks are followed at the revision their parent references. A deck
//! already on the current branch is not entered again, so cyclic references
//! terminate.

use futures::future::BoxFuture;

use deckhub_core::change::PathSegment;
use deckhub_core::model::{ContentItem, Deck, ItemKind, NodeRef, Slide, VariantRef};
use deckhub_core::types::{DbId, RevisionId};

use crate::error::StoreError;
use crate::store::{DeckStore, SlideStore};

/// Path from the latest revision of `root_id` to `node_id`.
///
/// A deck target ends with its own segment; a slide target ends with the
/// containing deck's segment followed by the slide's position. The root
/// itself resolves to a single segment.
pub async fn resolve_path<S>(
    store: &S,
    root_id: DbId,
    node_id: DbId,
    kind: ItemKind,
) -> Result<Vec<PathSegment>, StoreError>
where
    S: DeckStore + ?Sized,
{
    let Some(root) = store.get_deck(root_id).await? else {
        return Ok(Vec::new());
    };
    let Some(root_ref) = root.latest_ref() else {
        return Ok(Vec::new());
    };

    let mut path = vec![PathSegment::root(root_ref)];
    if kind == ItemKind::Deck && node_id == root_id {
        return Ok(path);
    }

    let found = search(
        store,
        root,
        root_ref.revision,
        node_id,
        kind,
        &mut path,
        vec![root_id],
    )
    .await?;
    if found {
        Ok(path)
    } else {
        Ok(Vec::new())
    }
}

fn search<'a, S>(
    store: &'a S,
    deck: Deck,
    revision: RevisionId,
    target: DbId,
    kind: ItemKind,
    path: &'a mut Vec<PathSegment>,
    visited: Vec<DbId>,
) -> BoxFuture<'a, Result<bool, StoreError>>
where
    S: DeckStore + ?Sized,
{
    Box::pin(async move {
        let Some(rev) = deck.revision(revision) else {
            return Ok(false);
        };
        let items = &rev.content_items;

        if let Some(index) = items
            .iter()
            .position(|i| i.kind == kind && i.node.id == target)
        {
            path.push(match kind {
                ItemKind::Deck => PathSegment::Node {
                    id: target,
                    revision: items[index].node.revision,
                    index: Some(index),
                },
                ItemKind::Slide => PathSegment::Position { index },
            });
            return Ok(true);
        }

        for (index, item) in items.iter().enumerate() {
            if item.kind != ItemKind::Deck || visited.contains(&item.node.id) {
                continue;
            }
            let Some(child) = store.get_deck(item.node.id).await? else {
                tracing::warn!(
                    deck_id = item.node.id,
                    parent_id = deck.id,
                    "Skipping dangling deck reference"
                );
                continue;
            };

            path.push(PathSegment::Node {
                id: item.node.id,
                revision: item.node.revision,
                index: Some(index),
            });
            let mut branch = visited.clone();
            branch.push(item.node.id);
            if search(store, child, item.node.revision, target, kind, path, branch).await? {
                return Ok(true);
            }
            path.pop();
        }

        Ok(false)
    })
}

/// Where a slide sits inside a deck tree.
#[derive(Debug, Clone)]
pub struct SlideNodeLocation {
    pub slide: Slide,
    /// The slide item as it appears in the parent's content list.
    pub item: ContentItem,
    pub parent: NodeRef,
    pub index: usize,
    pub path: Vec<PathSegment>,
}

impl SlideNodeLocation {
    pub fn variants(&self) -> &[VariantRef] {
        &self.item.variants
    }
}

/// Locate `slide_id` under the latest revision of `root_id`.
pub async fn find_slide_node<S>(
    store: &S,
    root_id: DbId,
    slide_id: DbId,
) -> Result<Option<SlideNodeLocation>, StoreError>
where
    S: DeckStore + SlideStore + ?Sized,
{
    let path = resolve_path(store, root_id, slide_id, ItemKind::Slide).await?;
    let (Some(parent), Some(index)) = (
        deckhub_core::change::path_deck(&path),
        path.last().and_then(PathSegment::index),
    ) else {
        return Ok(None);
    };

    let Some(deck) = store.get_deck(parent.id).await? else {
        return Ok(None);
    };
    let Some(item) = deck
        .revision(parent.revision)
        .and_then(|r| r.content_items.get(index))
        .cloned()
    else {
        return Ok(None);
    };
    let Some(slide) = store.get_slide(slide_id).await? else {
        return Ok(None);
    };

    Ok(Some(SlideNodeLocation {
        slide,
        item,
        parent,
        index,
        path,
    }))
}
