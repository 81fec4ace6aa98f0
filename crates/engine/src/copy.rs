//! Tree copy engine: fork and attach.
//!
//! A copy duplicates every deck of a subtree into a new deck at revision 1
//! whose `origin` points at the source revision. Slides are shared by
//! default: the copy keeps the slide reference and is added to the slide
//! revision's usage. Copies are written one document at a time; a failure
//! midway leaves the decks copied so far in place.

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use deckhub_core::change::{
    ChangeAction, ChangeOp, ChangeRecord, NewChange, NodeValue, PathSegment,
};
use deckhub_core::error::CoreError;
use deckhub_core::model::{ContentItem, Deck, ItemKind, NewDeck, NodeRef, Origin};
use deckhub_core::types::{DbId, RevisionId};
use deckhub_db::store::DocumentStore;

use crate::changelog;
use crate::error::EngineError;
use crate::tracker::DeckTracker;

/// How slide items are carried into a copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlidePolicy {
    /// Keep the slide reference and record the copy as a user of it.
    #[default]
    ShareUsage,
    /// Copy each slide (and its variants) into a new slide document.
    Duplicate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub slides: SlidePolicy,
}

/// A copied subtree.
#[derive(Debug, Clone)]
pub struct CopiedTree {
    /// The source revision that was copied.
    pub source: NodeRef,
    pub new_root: NodeRef,
    /// Source and copy of every deck revision, root first. A revision that
    /// occurs more than once in the tree appears once.
    pub copies: Vec<(NodeRef, NodeRef)>,
    /// New source revision, when the source was revised after the copy.
    pub revised: Option<NodeRef>,
    /// Records of the revise and of its propagation into parents.
    pub records: Vec<ChangeRecord>,
}

impl CopiedTree {
    /// Old deck id to new deck id, root first.
    pub fn id_map(&self) -> IndexMap<DbId, DbId> {
        self.copies
            .iter()
            .map(|(source, copy)| (source.id, copy.id))
            .collect()
    }
}

/// Result of a fork or attach.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkResult {
    pub new_root_id: DbId,
    pub id_map: IndexMap<DbId, DbId>,
}

impl From<&CopiedTree> for ForkResult {
    fn from(copied: &CopiedTree) -> Self {
        Self {
            new_root_id: copied.new_root.id,
            id_map: copied.id_map(),
        }
    }
}

// ---------------------------------------------------------------------------
// Revision selection
// ---------------------------------------------------------------------------

/// Revision of `deck` to copy and whether the source must be revised after.
///
/// An explicitly requested earlier revision is copied as-is. For the latest
/// revision the recorded change count decides: none copies it untouched, a
/// single change copies the preceding revision when there is one, anything
/// else copies the latest and freezes it with a revise afterwards.
async fn revision_to_copy<S>(
    store: &S,
    deck: &Deck,
    requested: Option<RevisionId>,
) -> Result<Option<(RevisionId, bool)>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(latest) = deck.latest_ref() else {
        return Ok(None);
    };
    let target = requested.unwrap_or(latest.revision);
    if deck.revision(target).is_none() {
        return Ok(None);
    }
    if target != latest.revision {
        return Ok(Some((target, false)));
    }

    let count = store.count_changes(latest).await?;
    tracing::debug!(
        deck_id = deck.id,
        revision = target,
        count,
        "Selecting revision to copy"
    );
    Ok(Some(match count {
        0 => (target, false),
        1 if target > 1 => (target - 1, false),
        _ => (target, true),
    }))
}

// ---------------------------------------------------------------------------
// Subtree copy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct CopyContext {
    user: DbId,
    options: CopyOptions,
}

/// Carry one slide item into the copy `parent`. `None` drops a dangling item.
async fn copy_slide_item<S>(
    store: &S,
    item: &ContentItem,
    parent: NodeRef,
    ctx: CopyContext,
) -> Result<Option<ContentItem>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    match ctx.options.slides {
        SlidePolicy::ShareUsage => {
            if !store.add_slide_usage(item.node, parent).await? {
                tracing::warn!(slide_id = item.node.id, "Skipping dangling slide in copy");
                return Ok(None);
            }
            for variant in &item.variants {
                store.add_slide_usage(variant.node_ref(), parent).await?;
            }
            Ok(Some(item.clone()))
        }
        SlidePolicy::Duplicate => {
            let Some(copy) = store.copy_slide(item.node, ctx.user, parent).await? else {
                tracing::warn!(slide_id = item.node.id, "Skipping dangling slide in copy");
                return Ok(None);
            };
            let mut copied = ContentItem {
                kind: ItemKind::Slide,
                node: NodeRef::new(copy.id, 1),
                variants: Vec::with_capacity(item.variants.len()),
                order: item.order,
            };
            for variant in &item.variants {
                if let Some(v) = store.copy_slide(variant.node_ref(), ctx.user, parent).await? {
                    let mut variant = variant.clone();
                    variant.id = v.id;
                    variant.revision = 1;
                    copied.variants.push(variant);
                }
            }
            Ok(Some(copied))
        }
    }
}

fn copy_subtree<'a, S>(
    store: &'a S,
    deck: Deck,
    revision: RevisionId,
    parent: Option<NodeRef>,
    ctx: CopyContext,
    copies: &'a mut Vec<(NodeRef, NodeRef)>,
    visited: Vec<DbId>,
) -> BoxFuture<'a, Result<Option<NodeRef>, EngineError>>
where
    S: DocumentStore + ?Sized,
{
    Box::pin(async move {
        let Some(rev) = deck.revision(revision) else {
            tracing::warn!(
                deck_id = deck.id,
                revision,
                "Skipping dangling deck revision in copy"
            );
            return Ok(None);
        };
        let source = NodeRef::new(deck.id, rev.id);

        let input = NewDeck {
            title: rev.title.clone(),
            description: rev.description.clone(),
            language: rev.language.clone(),
            theme: rev.theme.clone(),
            content_items: Vec::new(),
            variants: deck.variants.clone(),
            origin: Some(Origin {
                id: deck.id,
                revision: rev.id,
                title: rev.title.clone(),
                user: deck.user,
            }),
            parent,
        };
        let created = store.insert_deck(input, ctx.user).await?;
        let copy = NodeRef::new(created.id, 1);
        copies.push((source, copy));
        tracing::debug!(source = %source, copy = %copy, "Copied deck");

        let mut items = Vec::with_capacity(rev.content_items.len());
        for item in &rev.content_items {
            match item.kind {
                ItemKind::Slide => {
                    if let Some(copied) = copy_slide_item(store, item, copy, ctx).await? {
                        items.push(copied);
                    }
                }
                ItemKind::Deck => {
                    if visited.contains(&item.node.id) {
                        tracing::warn!(
                            deck_id = item.node.id,
                            "Dropping cyclic deck reference in copy"
                        );
                        continue;
                    }
                    // A revision reached twice in one tree is copied once.
                    if let Some(existing) = copies
                        .iter()
                        .find(|(source, _)| *source == item.node)
                        .map(|(_, copied)| *copied)
                    {
                        store.add_deck_usage(existing, copy).await?;
                        items.push(ContentItem {
                            kind: ItemKind::Deck,
                            node: existing,
                            variants: Vec::new(),
                            order: item.order,
                        });
                        continue;
                    }
                    let Some(child) = store.get_deck(item.node.id).await? else {
                        tracing::warn!(deck_id = item.node.id, "Skipping dangling deck in copy");
                        continue;
                    };
                    let mut branch = visited.clone();
                    branch.push(child.id);
                    let copied = copy_subtree(
                        store,
                        child,
                        item.node.revision,
                        Some(copy),
                        ctx,
                        &mut *copies,
                        branch,
                    )
                    .await?;
                    if let Some(node) = copied {
                        items.push(ContentItem {
                            kind: ItemKind::Deck,
                            node,
                            variants: Vec::new(),
                            order: item.order,
                        });
                    }
                }
            }
        }

        store.update_content_items(created.id, items).await?;
        Ok(Some(copy))
    })
}

/// Freeze `copied` of `deck_id` behind a new revision and point every parent
/// that used it at the new one. Each step is tracked.
async fn revise_source<S>(
    store: &S,
    deck_id: DbId,
    copied: RevisionId,
    user: DbId,
) -> Result<(Option<NodeRef>, Vec<ChangeRecord>), EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(deck) = store.get_deck(deck_id).await? else {
        return Ok((None, Vec::new()));
    };
    let old = NodeRef::new(deck_id, copied);
    let users = deck
        .revision(copied)
        .map(|rev| rev.usage.clone())
        .unwrap_or_default();

    let tracker = DeckTracker::begin(&deck, deck_id, user)?;
    let Some(revision) = store.revise_deck(deck_id, Some(copied), user).await? else {
        return Ok((None, Vec::new()));
    };
    let new = NodeRef::new(deck_id, revision.id);
    let Some(updated) = store.get_deck(deck_id).await? else {
        return Ok((None, Vec::new()));
    };
    let mut records = tracker.commit(store, &updated, &[]).await?;
    let revise_ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();

    for parent in users {
        let Some(parent_deck) = store.get_deck(parent.id).await? else {
            tracing::warn!(
                deck_id = parent.id,
                "Skipping dangling parent while propagating revise"
            );
            continue;
        };
        let tracker = DeckTracker::begin(&parent_deck, parent.id, user)?;
        if !store.replace_item_ref(parent.id, ItemKind::Deck, old, new).await? {
            continue;
        }
        let Some(updated_parent) = store.get_deck(parent.id).await? else {
            continue;
        };
        if let Some(parent_latest) = updated_parent.latest_ref() {
            store.add_deck_usage(new, parent_latest).await?;
        }
        records.extend(tracker.commit(store, &updated_parent, &revise_ids).await?);
    }

    tracing::info!(deck_id, from = copied, to = new.revision, "Revised deck after copy");
    Ok((Some(new), records))
}

/// Copy the subtree under `deck_id` for `user`.
///
/// `revision` selects an earlier revision explicitly; `None` targets the
/// latest and applies the fresh-revision rule of [`revision_to_copy`].
/// `parent` becomes the usage of the new root. Returns `Ok(None)` if the
/// deck or revision does not exist.
pub async fn copy_deck_tree<S>(
    store: &S,
    deck_id: DbId,
    revision: Option<RevisionId>,
    user: DbId,
    parent: Option<NodeRef>,
    options: CopyOptions,
) -> Result<Option<CopiedTree>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(deck) = store.get_deck(deck_id).await? else {
        return Ok(None);
    };
    let Some((revision, revise_after)) = revision_to_copy(store, &deck, revision).await? else {
        return Ok(None);
    };

    let ctx = CopyContext { user, options };
    let mut copies = Vec::new();
    let Some(new_root) =
        copy_subtree(store, deck, revision, parent, ctx, &mut copies, vec![deck_id]).await?
    else {
        return Ok(None);
    };

    let (revised, records) = if revise_after {
        revise_source(store, deck_id, revision, user).await?
    } else {
        (None, Vec::new())
    };

    tracing::info!(
        deck_id,
        revision,
        new_root = %new_root,
        copied = copies.len(),
        "Copied deck tree"
    );
    Ok(Some(CopiedTree {
        source: NodeRef::new(deck_id, revision),
        new_root,
        copies,
        revised,
        records,
    }))
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Record one `copy` change per copied deck, root first, attributed to the
/// tree under `root_id`.
///
/// The root's record links to `parents`; every other record links to the
/// root's record.
pub async fn track_decks_forked<S>(
    store: &S,
    copies: &[(NodeRef, NodeRef)],
    root_id: DbId,
    action: ChangeAction,
    user: DbId,
    parents: &[Uuid],
) -> Result<Vec<ChangeRecord>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let mut records = Vec::with_capacity(copies.len());
    let mut root_record: Option<Uuid> = None;

    for (source, copy) in copies {
        let mut path = store.resolve_path(root_id, copy.id, ItemKind::Deck).await?;
        if path.is_empty() {
            path = vec![PathSegment::root(*copy)];
        }
        let mut change = NewChange::node(ChangeOp::Copy, path, user);
        change.old_value = Some(NodeValue::deck(*source));
        change.value = Some(NodeValue::deck(*copy));
        change.action = Some(action);
        change.parents = match root_record {
            Some(id) => vec![id],
            None => parents.to_vec(),
        };

        let persisted = changelog::record(store, vec![change]).await?;
        if root_record.is_none() {
            root_record = persisted.first().map(|r| r.id);
        }
        records.extend(persisted);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Fork / attach
// ---------------------------------------------------------------------------

/// Fork `deck_id` into a new, independent tree owned by `user`.
pub async fn fork_deck<S>(
    store: &S,
    deck_id: DbId,
    user: DbId,
    options: CopyOptions,
) -> Result<Option<ForkResult>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(copied) = copy_deck_tree(store, deck_id, None, user, None, options).await? else {
        return Ok(None);
    };
    track_decks_forked(
        store,
        &copied.copies,
        copied.new_root.id,
        ChangeAction::Fork,
        user,
        &[],
    )
    .await?;
    tracing::info!(deck_id, new_root_id = copied.new_root.id, user, "Forked deck");
    Ok(Some(ForkResult::from(&copied)))
}

/// Copy `source_id` and splice the copy into `target_id` at the 1-based
/// `position` (`None` or past the end appends). Provenance is attributed to
/// the tree under `target_root_id`.
pub async fn attach_deck_tree<S>(
    store: &S,
    source_id: DbId,
    target_id: DbId,
    position: Option<usize>,
    target_root_id: DbId,
    user: DbId,
    options: CopyOptions,
) -> Result<Option<ForkResult>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    if position == Some(0) {
        return Err(CoreError::BadData("content positions start at 1".to_string()).into());
    }
    let Some(target_ref) = store
        .get_deck(target_id)
        .await?
        .and_then(|deck| deck.latest_ref())
    else {
        return Ok(None);
    };

    let Some(copied) =
        copy_deck_tree(store, source_id, None, user, Some(target_ref), options).await?
    else {
        return Ok(None);
    };

    // Re-read: revising the source may have re-pointed an item of the target.
    let Some(target) = store.get_deck(target_id).await? else {
        return Ok(None);
    };
    let tracker = DeckTracker::begin(&target, target_root_id, user)?;
    let mut items = target
        .latest_revision()
        .map(|rev| rev.content_items.clone())
        .unwrap_or_default();
    let index = position
        .map(|p| p - 1)
        .filter(|i| *i <= items.len())
        .unwrap_or(items.len());
    items.insert(index, ContentItem::deck(copied.new_root));
    store.update_content_items(target_id, items).await?;

    let Some(updated) = store.get_deck(target_id).await? else {
        return Ok(None);
    };
    let added = tracker.commit(store, &updated, &[]).await?;
    let parents: Vec<Uuid> = added.iter().map(|r| r.id).collect();
    track_decks_forked(
        store,
        &copied.copies,
        target_root_id,
        ChangeAction::Attach,
        user,
        &parents,
    )
    .await?;

    tracing::info!(
        source_id,
        target_id,
        new_root_id = copied.new_root.id,
        index,
        "Attached deck tree"
    );
    Ok(Some(ForkResult::from(&copied)))
}
