//! Deck and slide documents.
//!
//! A [`Deck`] holds an append-only list of [`DeckRevision`]s; revision `n`
//! lives at index `n - 1`. Only the latest revision is edited in place, every
//! earlier revision is treated as frozen. The mutation helpers here are the
//! single-document read-modify-write steps shared by every store backend.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, RevisionId, Timestamp};

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// The kind of node a content item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Deck,
    Slide,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deck => "deck",
            Self::Slide => "slide",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pointer at one revision of a deck or slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: DbId,
    pub revision: RevisionId,
}

impl NodeRef {
    pub fn new(id: DbId, revision: RevisionId) -> Self {
        Self { id, revision }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.id, self.revision)
    }
}

/// A language-specific alternative for a slide content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantRef {
    pub id: DbId,
    pub revision: RevisionId,
    pub language: String,
}

impl VariantRef {
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, self.revision)
    }
}

/// One entry of a deck revision's ordered content list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub kind: ItemKind,
    #[serde(rename = "ref")]
    pub node: NodeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantRef>,
    /// Display ordering hint. Carries no meaning beyond the array position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl ContentItem {
    pub fn slide(node: NodeRef) -> Self {
        Self {
            kind: ItemKind::Slide,
            node,
            variants: Vec::new(),
            order: None,
        }
    }

    pub fn deck(node: NodeRef) -> Self {
        Self {
            kind: ItemKind::Deck,
            node,
            variants: Vec::new(),
            order: None,
        }
    }

    pub fn with_variant(mut self, variant: VariantRef) -> Self {
        self.variants.push(variant);
        self
    }

    /// The variant registered for `language`, if any.
    pub fn variant_for(&self, language: &str) -> Option<&VariantRef> {
        self.variants.iter().find(|v| v.language == language)
    }

    /// Copy without the fields the change tracker ignores (`order`, `variants`).
    pub fn trackable(&self) -> Self {
        Self {
            kind: self.kind,
            node: self.node,
            variants: Vec::new(),
            order: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decks
// ---------------------------------------------------------------------------

/// Provenance of a deck created by fork or attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub id: DbId,
    pub revision: RevisionId,
    pub title: String,
    pub user: DbId,
}

/// A language a deck is available in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckVariant {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub original: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRevision {
    pub id: RevisionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub user: DbId,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub content_items: Vec<ContentItem>,
    /// Parent deck revisions that include this revision.
    #[serde(default)]
    pub usage: Vec<NodeRef>,
    /// The revision this one was derived from by a revise or revert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_revision: Option<RevisionId>,
}

impl DeckRevision {
    /// Record `parent` as a user of this revision. Returns `false` if it was
    /// already recorded.
    pub fn add_usage(&mut self, parent: NodeRef) -> bool {
        if self.usage.contains(&parent) {
            return false;
        }
        self.usage.push(parent);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: DbId,
    pub user: DbId,
    pub timestamp: Timestamp,
    pub revisions: Vec<DeckRevision>,
    #[serde(default)]
    pub variants: Vec<DeckVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

/// Input for creating a deck at revision 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeck {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub language: String,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub content_items: Vec<ContentItem>,
    #[serde(default)]
    pub variants: Vec<DeckVariant>,
    /// Set when the deck is a copy of another one.
    #[serde(default)]
    pub origin: Option<Origin>,
    /// Parent deck revision the new deck is created under.
    #[serde(default)]
    pub parent: Option<NodeRef>,
}

impl NewDeck {
    pub fn is_copy(&self) -> bool {
        self.origin.is_some()
    }
}

/// Editable scalar properties of the latest deck revision. `None` leaves a
/// property unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckProperties {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub theme: Option<String>,
}

impl Deck {
    /// Build a fresh deck document at revision 1.
    pub fn create(id: DbId, input: NewDeck, user: DbId, timestamp: Timestamp) -> Self {
        let revision = DeckRevision {
            id: 1,
            title: input.title,
            description: input.description,
            language: input.language,
            theme: input.theme,
            user,
            timestamp,
            content_items: input.content_items,
            usage: input.parent.into_iter().collect(),
            origin_revision: None,
        };
        Self {
            id,
            user,
            timestamp,
            revisions: vec![revision],
            variants: input.variants,
            origin: input.origin,
        }
    }

    pub fn latest_revision(&self) -> Option<&DeckRevision> {
        self.revisions.last()
    }

    pub fn latest_revision_mut(&mut self) -> Option<&mut DeckRevision> {
        self.revisions.last_mut()
    }

    pub fn latest_ref(&self) -> Option<NodeRef> {
        self.latest_revision().map(|r| NodeRef::new(self.id, r.id))
    }

    pub fn revision(&self, id: RevisionId) -> Option<&DeckRevision> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.revisions.get(index)
    }

    pub fn revision_mut(&mut self, id: RevisionId) -> Option<&mut DeckRevision> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.revisions.get_mut(index)
    }

    /// The revision `id`, or the latest one when `id` is `None`.
    pub fn select_revision(&self, id: Option<RevisionId>) -> Option<&DeckRevision> {
        match id {
            Some(id) => self.revision(id),
            None => self.latest_revision(),
        }
    }

    /// Primary language: the language of the latest revision.
    pub fn language(&self) -> Option<&str> {
        self.latest_revision().map(|r| r.language.as_str())
    }

    /// Append a new revision copied from revision `from`. The copy starts
    /// with no usage; parents re-point at it explicitly.
    pub fn push_revision(
        &mut self,
        from: RevisionId,
        user: DbId,
        timestamp: Timestamp,
    ) -> Result<&DeckRevision, CoreError> {
        let mut next = self
            .revision(from)
            .cloned()
            .ok_or_else(|| {
                CoreError::BadData(format!("deck {} has no revision {from}", self.id))
            })?;
        next.id = self.revisions.len() as RevisionId + 1;
        next.user = user;
        next.timestamp = timestamp;
        next.usage = Vec::new();
        next.origin_revision = Some(from);
        self.revisions.push(next);
        self.revisions
            .last()
            .ok_or_else(|| CoreError::Internal("revision list empty after push".to_string()))
    }

    /// Apply property edits to the latest revision. Returns `true` if any
    /// property changed.
    pub fn apply_properties(&mut self, props: &DeckProperties) -> bool {
        let Some(rev) = self.latest_revision_mut() else {
            return false;
        };
        let mut changed = false;
        if let Some(title) = &props.title {
            changed |= rev.title != *title;
            rev.title = title.clone();
        }
        if let Some(description) = &props.description {
            changed |= rev.description.as_deref() != Some(description.as_str());
            rev.description = Some(description.clone());
        }
        if let Some(language) = &props.language {
            changed |= rev.language != *language;
            rev.language = language.clone();
        }
        if let Some(theme) = &props.theme {
            changed |= rev.theme.as_deref() != Some(theme.as_str());
            rev.theme = Some(theme.clone());
        }
        changed
    }

    /// Re-point every latest-revision item of `kind` referencing `old` at
    /// `new`. Returns `true` if any item was updated.
    pub fn replace_item_ref(&mut self, kind: ItemKind, old: NodeRef, new: NodeRef) -> bool {
        let Some(rev) = self.latest_revision_mut() else {
            return false;
        };
        let mut replaced = false;
        for item in rev
            .content_items
            .iter_mut()
            .filter(|i| i.kind == kind && i.node == old)
        {
            item.node = new;
            replaced = true;
        }
        replaced
    }

    /// Register a translation for the slide `slide_id` in the latest revision.
    ///
    /// Returns `Ok(false)` if the slide is not part of the latest revision.
    pub fn insert_slide_variant(
        &mut self,
        slide_id: DbId,
        variant: VariantRef,
    ) -> Result<bool, CoreError> {
        let deck_id = self.id;
        let Some(rev) = self.latest_revision_mut() else {
            return Ok(false);
        };
        let Some(item) = rev
            .content_items
            .iter_mut()
            .find(|i| i.kind == ItemKind::Slide && i.node.id == slide_id)
        else {
            return Ok(false);
        };
        if item.variant_for(&variant.language).is_some() {
            return Err(CoreError::BadData(format!(
                "slide {slide_id} in deck {deck_id} already has a '{}' variant",
                variant.language
            )));
        }
        item.variants.push(variant);
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Slides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRevision {
    pub id: RevisionId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub language: String,
    pub user: DbId,
    pub timestamp: Timestamp,
    /// Deck revisions that include this slide revision.
    #[serde(default)]
    pub usage: Vec<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: DbId,
    pub user: DbId,
    pub revisions: Vec<SlideRevision>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSlide {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub parent: Option<NodeRef>,
}

impl Slide {
    pub fn create(id: DbId, input: NewSlide, user: DbId, timestamp: Timestamp) -> Self {
        Self {
            id,
            user,
            revisions: vec![SlideRevision {
                id: 1,
                title: input.title,
                content: input.content,
                language: input.language,
                user,
                timestamp,
                usage: input.parent.into_iter().collect(),
            }],
        }
    }

    pub fn revision(&self, id: RevisionId) -> Option<&SlideRevision> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.revisions.get(index)
    }

    pub fn revision_mut(&mut self, id: RevisionId) -> Option<&mut SlideRevision> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.revisions.get_mut(index)
    }

    pub fn latest_revision(&self) -> Option<&SlideRevision> {
        self.revisions.last()
    }

    /// A new slide document holding a copy of revision `source` as its
    /// revision 1, used by `parent`.
    pub fn duplicate(
        &self,
        new_id: DbId,
        source: RevisionId,
        user: DbId,
        parent: NodeRef,
        timestamp: Timestamp,
    ) -> Option<Self> {
        let rev = self.revision(source)?;
        Some(Self {
            id: new_id,
            user,
            revisions: vec![SlideRevision {
                id: 1,
                title: rev.title.clone(),
                content: rev.content.clone(),
                language: rev.language.clone(),
                user,
                timestamp,
                usage: vec![parent],
            }],
        })
    }

    /// Record `parent` as a user of revision `revision`. Returns `false` if
    /// the revision does not exist or the usage was already recorded.
    pub fn add_usage(&mut self, revision: RevisionId, parent: NodeRef) -> bool {
        match self.revision_mut(revision) {
            Some(rev) if !rev.usage.contains(&parent) => {
                rev.usage.push(parent);
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
