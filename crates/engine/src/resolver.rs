//! Tree resolver.
//!
//! Materializes the current tree under a deck with language resolution. Each
//! recursion carries its own list of visited deck ids, so a deck that
//! (directly or indirectly) contains itself is dropped at its second
//! occurrence instead of being entered again. Items pointing at missing
//! decks, slides or revisions are skipped.

use futures::future::BoxFuture;
use serde::Serialize;

use deckhub_core::model::{ContentItem, Deck, DeckVariant, ItemKind, NodeRef, SlideRevision};
use deckhub_core::types::{DbId, RevisionId};
use deckhub_db::store::DocumentStore;

use crate::error::EngineError;

/// One node of a materialized tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub id: DbId,
    pub revision: RevisionId,
    pub title: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<DeckVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, self.revision)
    }
}

/// A tree node in pre-order position, for bulk scans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatNode {
    pub kind: ItemKind,
    #[serde(rename = "ref")]
    pub node: NodeRef,
    pub title: String,
    pub language: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The slide revision picked for a content item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSlide {
    pub node: NodeRef,
    pub revision: SlideRevision,
    /// Languages available for the item, the primary slide's first.
    pub languages: Vec<String>,
}

/// Add `language` to `variants` unless present; `original` marks the
/// primary entry.
fn merge_variant(variants: &mut Vec<DeckVariant>, language: &str, original: bool) {
    match variants.iter_mut().find(|v| v.language == language) {
        Some(existing) => existing.original |= original,
        None => variants.push(DeckVariant {
            language: language.to_string(),
            title: None,
            original,
        }),
    }
}

/// Pick the slide revision for `item` following the language preference.
///
/// Candidates are the primary slide and the item's variants. Returns `None`
/// if the primary slide is dangling.
async fn pick_slide<S>(
    store: &S,
    item: &ContentItem,
    preference: [Option<&str>; 3],
) -> Result<Option<ResolvedSlide>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(primary) = store
        .get_slide(item.node.id)
        .await?
        .and_then(|s| s.revision(item.node.revision).cloned())
    else {
        tracing::warn!(
            slide_id = item.node.id,
            revision = item.node.revision,
            "Skipping dangling slide reference"
        );
        return Ok(None);
    };

    let mut languages = vec![primary.language.clone()];
    for variant in &item.variants {
        if !languages.contains(&variant.language) {
            languages.push(variant.language.clone());
        }
    }

    for language in preference.into_iter().flatten() {
        if primary.language == language {
            break;
        }
        let Some(variant) = item.variant_for(language) else {
            continue;
        };
        match store
            .get_slide(variant.id)
            .await?
            .and_then(|s| s.revision(variant.revision).cloned())
        {
            Some(revision) => {
                return Ok(Some(ResolvedSlide {
                    node: variant.node_ref(),
                    revision,
                    languages,
                }))
            }
            None => {
                tracing::warn!(slide_id = variant.id, language, "Skipping dangling slide variant")
            }
        }
    }

    Ok(Some(ResolvedSlide {
        node: item.node,
        revision: primary,
        languages,
    }))
}

/// Slides resolve by the caller's filter, then the containing deck's
/// language, then the root's.
#[derive(Debug, Clone, Copy)]
struct WalkOptions<'a> {
    filter: Option<&'a str>,
    root_language: &'a str,
    with_content: bool,
}

fn walk_deck<'a, S>(
    store: &'a S,
    deck: Deck,
    revision: RevisionId,
    options: WalkOptions<'a>,
    visited: Vec<DbId>,
) -> BoxFuture<'a, Result<Option<TreeNode>, EngineError>>
where
    S: DocumentStore + ?Sized,
{
    Box::pin(async move {
        let Some(rev) = deck.revision(revision) else {
            tracing::warn!(deck_id = deck.id, revision, "Skipping dangling deck revision");
            return Ok(None);
        };
        tracing::debug!(deck_id = deck.id, revision, depth = visited.len(), "Resolving deck");

        let mut variants = Vec::new();
        merge_variant(&mut variants, &rev.language, true);
        for variant in &deck.variants {
            merge_variant(&mut variants, &variant.language, false);
        }

        let mut children = Vec::with_capacity(rev.content_items.len());
        for item in &rev.content_items {
            match item.kind {
                ItemKind::Slide => {
                    let preference = [
                        options.filter,
                        Some(rev.language.as_str()),
                        Some(options.root_language),
                    ];
                    let Some(slide) = pick_slide(store, item, preference).await? else {
                        continue;
                    };
                    let mut slide_variants = Vec::new();
                    for (i, language) in slide.languages.iter().enumerate() {
                        merge_variant(&mut slide_variants, language, i == 0);
                        merge_variant(&mut variants, language, false);
                    }
                    children.push(TreeNode {
                        kind: ItemKind::Slide,
                        id: slide.node.id,
                        revision: slide.node.revision,
                        title: slide.revision.title,
                        language: slide.revision.language,
                        theme: None,
                        variants: slide_variants,
                        content: options.with_content.then_some(slide.revision.content),
                        children: Vec::new(),
                    });
                }
                ItemKind::Deck => {
                    if visited.contains(&item.node.id) {
                        tracing::warn!(
                            deck_id = item.node.id,
                            parent_id = deck.id,
                            "Dropping cyclic deck reference"
                        );
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
                    let mut branch = visited.clone();
                    branch.push(child.id);
                    let Some(node) =
                        walk_deck(store, child, item.node.revision, options, branch).await?
                    else {
                        continue;
                    };
                    for variant in &node.variants {
                        merge_variant(&mut variants, &variant.language, false);
                    }
                    children.push(node);
                }
            }
        }

        Ok(Some(TreeNode {
            kind: ItemKind::Deck,
            id: deck.id,
            revision: rev.id,
            title: rev.title.clone(),
            language: rev.language.clone(),
            theme: rev.theme.clone(),
            variants,
            content: None,
            children,
        }))
    })
}

async fn resolve<S>(
    store: &S,
    root_id: DbId,
    language: Option<&str>,
    with_content: bool,
) -> Result<Option<TreeNode>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(root) = store.get_deck(root_id).await? else {
        return Ok(None);
    };
    let Some(latest) = root.latest_revision() else {
        return Ok(None);
    };
    let root_language = latest.language.clone();
    let revision = latest.id;
    let options = WalkOptions {
        filter: language,
        root_language: &root_language,
        with_content,
    };
    walk_deck(store, root, revision, options, vec![root_id]).await
}

/// Materialize the latest revision of `root_id` as a nested tree.
///
/// Slides resolve to the variant for `language` when one exists, otherwise
/// to the variant for the containing deck's language, then the root's, then
/// the primary slide. Returns `Ok(None)` if the root deck does not exist.
pub async fn resolve_tree<S>(
    store: &S,
    root_id: DbId,
    language: Option<&str>,
) -> Result<Option<TreeNode>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    resolve(store, root_id, language, false).await
}

/// The same traversal as [`resolve_tree`], emitted in pre-order.
pub async fn flatten<S>(
    store: &S,
    root_id: DbId,
    language: Option<&str>,
    with_content: bool,
) -> Result<Vec<FlatNode>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(tree) = resolve(store, root_id, language, with_content).await? else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    let mut stack = vec![(tree, 0usize, None)];
    while let Some((node, depth, parent)) = stack.pop() {
        let node_ref = node.node_ref();
        for child in node.children.into_iter().rev() {
            stack.push((child, depth + 1, Some(node_ref)));
        }
        out.push(FlatNode {
            kind: node.kind,
            node: node_ref,
            title: node.title,
            language: node.language,
            depth,
            parent,
            content: node.content,
        });
    }
    Ok(out)
}

/// The first slide of `deck_id`, for previews.
///
/// Descends through the first content item of each deck; stops at the
/// first slide. Returns `Ok(None)` if the descent reaches an empty deck, a
/// missing node or a cycle.
pub async fn first_slide<S>(
    store: &S,
    deck_id: DbId,
    language: Option<&str>,
) -> Result<Option<ResolvedSlide>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(root) = store.get_deck(deck_id).await? else {
        return Ok(None);
    };
    let Some(root_language) = root.language().map(str::to_string) else {
        return Ok(None);
    };

    let mut visited = vec![deck_id];
    let mut deck = root;
    let mut revision = deck.latest_ref().map(|r| r.revision);
    loop {
        let Some(rev) = deck.select_revision(revision) else {
            return Ok(None);
        };
        let Some(item) = rev.content_items.first() else {
            return Ok(None);
        };
        match item.kind {
            ItemKind::Slide => {
                let preference = [
                    language,
                    Some(rev.language.as_str()),
                    Some(root_language.as_str()),
                ];
                return pick_slide(store, item, preference).await;
            }
            ItemKind::Deck => {
                if visited.contains(&item.node.id) {
                    return Ok(None);
                }
                visited.push(item.node.id);
                let next = item.node;
                let Some(child) = store.get_deck(next.id).await? else {
                    return Ok(None);
                };
                deck = child;
                revision = Some(next.revision);
            }
        }
    }
}
