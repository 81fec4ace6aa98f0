//! Change derivation for a single deck edit.
//!
//! [`TrackedProperties`] snapshots the scalar state of a deck; the content
//! items are snapshotted with [`ContentItem::trackable`]. After the edit,
//! [`deck_level_change`] and [`content_item_changes`] turn the before/after
//! pair into [`NewChange`]s. Snapshots are owned values, so the before state
//! can never alias the document being edited.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::change::{ChangeOp, NewChange, NodeValue, PathSegment};
use crate::diff::{diff_arrays, split_path, PatchOp};
use crate::error::CoreError;
use crate::model::{ContentItem, Deck, NodeRef};
use crate::types::{DbId, RevisionId};

// ---------------------------------------------------------------------------
// Deck-level changes
// ---------------------------------------------------------------------------

/// Trackable scalar state of a deck's latest revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedProperties {
    #[serde(skip)]
    pub revision: RevisionId,
    pub title: String,
    pub description: Option<String>,
    pub language: String,
    pub theme: Option<String>,
}

impl TrackedProperties {
    pub fn of(deck: &Deck) -> Option<Self> {
        let rev = deck.latest_revision()?;
        Some(Self {
            revision: rev.id,
            title: rev.title.clone(),
            description: rev.description.clone(),
            language: rev.language.clone(),
            theme: rev.theme.clone(),
        })
    }

    fn fields(&self) -> [(&'static str, Value); 4] {
        [
            ("title", Value::from(self.title.clone())),
            ("description", Value::from(self.description.clone())),
            ("language", Value::from(self.language.clone())),
            ("theme", Value::from(self.theme.clone())),
        ]
    }
}

/// The deck-level record for an edit of deck `deck_id` at `path`, if any.
///
/// A new latest revision at the tree root is a `replace` of the old revision
/// by the new one. Anything else is an `update` carrying only the properties
/// that differ.
pub fn deck_level_change(
    deck_id: DbId,
    before: &TrackedProperties,
    after: &TrackedProperties,
    path: &[PathSegment],
    user: DbId,
) -> Option<NewChange> {
    if before.revision != after.revision && path.len() == 1 {
        let mut change = NewChange::node(ChangeOp::Replace, path.to_vec(), user);
        change.old_value = Some(NodeValue::deck(NodeRef::new(deck_id, before.revision)));
        change.value = Some(NodeValue::deck(NodeRef::new(deck_id, after.revision)));
        return Some(change);
    }

    let mut values = Map::new();
    let mut old_values = Map::new();
    for ((key, old), (_, new)) in before.fields().into_iter().zip(after.fields()) {
        if old != new {
            old_values.insert(key.to_string(), old);
            values.insert(key.to_string(), new);
        }
    }
    if values.is_empty() {
        return None;
    }
    let mut change = NewChange::node(ChangeOp::Update, path.to_vec(), user);
    change.values = Some(values);
    change.old_values = Some(old_values);
    Some(change)
}

// ---------------------------------------------------------------------------
// Content-item operations
// ---------------------------------------------------------------------------

/// Sub-field of a content item a replace operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Kind,
    RefId,
    RefRevision,
}

/// A diff operation validated against the content-item shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOp {
    Add { index: usize, value: Value },
    Remove { index: usize },
    /// `field == None` replaces the whole item.
    Replace {
        index: usize,
        field: Option<ItemField>,
        value: Value,
    },
}

impl TryFrom<&PatchOp> for ItemOp {
    type Error = CoreError;

    fn try_from(op: &PatchOp) -> Result<Self, Self::Error> {
        let segments = split_path(op.path());
        let shape_error =
            || CoreError::Internal(format!("unexpected content item diff path '{}'", op.path()));
        let (first, rest) = segments.split_first().ok_or_else(shape_error)?;
        let index: usize = first.parse().map_err(|_| shape_error())?;
        let field = match rest {
            [] => None,
            [k] if k == "kind" => Some(ItemField::Kind),
            [r, f] if r == "ref" && f == "id" => Some(ItemField::RefId),
            [r, f] if r == "ref" && f == "revision" => Some(ItemField::RefRevision),
            _ => return Err(shape_error()),
        };
        match (op, field) {
            (PatchOp::Add { value, .. }, None) => Ok(Self::Add {
                index,
                value: value.clone(),
            }),
            (PatchOp::Remove { .. }, None) => Ok(Self::Remove { index }),
            (PatchOp::Replace { value, .. }, field) => Ok(Self::Replace {
                index,
                field,
                value: value.clone(),
            }),
            _ => Err(shape_error()),
        }
    }
}

/// One content-item change at `index`, before it is placed on a tree path.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemChange {
    pub op: ChangeOp,
    pub index: usize,
    pub value: Option<ContentItem>,
    pub old_value: Option<ContentItem>,
}

impl ItemChange {
    /// Attach the change to the deck at the end of `deck_path`.
    pub fn into_new_change(
        self,
        deck_path: &[PathSegment],
        user: DbId,
        parents: &[Uuid],
    ) -> NewChange {
        let mut path = deck_path.to_vec();
        path.push(PathSegment::Position { index: self.index });
        let mut change = NewChange::node(self.op, path, user);
        change.value = self.value.as_ref().map(NodeValue::from);
        change.old_value = self.old_value.as_ref().map(NodeValue::from);
        change.parents = parents.to_vec();
        change
    }
}

// ---------------------------------------------------------------------------
// Folding state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum FoldState {
    Idle,
    /// An add or remove waiting to be materialized.
    HoldingAddOrRemove(ItemOp),
    /// Consecutive field replaces of the item at `index`.
    GroupingReplace {
        index: usize,
        fields: Vec<(Option<ItemField>, Value)>,
    },
}

/// Folds validated [`ItemOp`]s into [`ItemChange`]s while keeping a working
/// copy of the array, so every change reflects the state at its point in the
/// operation sequence.
#[derive(Debug)]
pub struct ItemChangeFolder {
    state: FoldState,
    working: Vec<Value>,
}

impl ItemChangeFolder {
    pub fn new(before: Vec<Value>) -> Self {
        Self {
            state: FoldState::Idle,
            working: before,
        }
    }

    /// The transition function. `None` flushes pending state.
    pub fn step(&mut self, input: Option<ItemOp>) -> Result<Vec<ItemChange>, CoreError> {
        let mut emitted = Vec::new();
        let state = std::mem::replace(&mut self.state, FoldState::Idle);

        match (state, input) {
            (
                FoldState::GroupingReplace { index, mut fields },
                Some(ItemOp::Replace {
                    index: next,
                    field,
                    value,
                }),
            ) if next == index => {
                fields.push((field, value));
                self.state = FoldState::GroupingReplace { index, fields };
            }
            (state, input) => {
                match state {
                    FoldState::Idle => {}
                    FoldState::HoldingAddOrRemove(op) => emitted.push(self.materialize(op)?),
                    FoldState::GroupingReplace { index, fields } => {
                        emitted.push(self.apply_group(index, fields)?)
                    }
                }
                self.state = match input {
                    None => FoldState::Idle,
                    Some(ItemOp::Replace { index, field, value }) => FoldState::GroupingReplace {
                        index,
                        fields: vec![(field, value)],
                    },
                    Some(op) => FoldState::HoldingAddOrRemove(op),
                };
            }
        }
        Ok(emitted)
    }

    /// The array as patched so far.
    pub fn working(&self) -> &[Value] {
        &self.working
    }

    fn materialize(&mut self, op: ItemOp) -> Result<ItemChange, CoreError> {
        match op {
            ItemOp::Remove { index } => {
                if index >= self.working.len() {
                    return Err(out_of_range(index));
                }
                let removed = self.working.remove(index);
                Ok(ItemChange {
                    op: ChangeOp::Remove,
                    index,
                    value: Some(to_item(removed)?),
                    old_value: None,
                })
            }
            ItemOp::Add { index, value } => {
                if index > self.working.len() {
                    return Err(out_of_range(index));
                }
                self.working.insert(index, value);
                Ok(ItemChange {
                    op: ChangeOp::Add,
                    index,
                    value: Some(to_item(self.working[index].clone())?),
                    old_value: None,
                })
            }
            ItemOp::Replace { index, field, value } => {
                self.apply_group(index, vec![(field, value)])
            }
        }
    }

    fn apply_group(
        &mut self,
        index: usize,
        fields: Vec<(Option<ItemField>, Value)>,
    ) -> Result<ItemChange, CoreError> {
        let slot = self.working.get_mut(index).ok_or_else(|| out_of_range(index))?;
        let old = slot.clone();
        for (field, value) in fields {
            match field {
                None => *slot = value,
                Some(ItemField::Kind) => set_field(slot, &["kind"], value)?,
                Some(ItemField::RefId) => set_field(slot, &["ref", "id"], value)?,
                Some(ItemField::RefRevision) => set_field(slot, &["ref", "revision"], value)?,
            }
        }
        let new = slot.clone();
        Ok(ItemChange {
            op: ChangeOp::Replace,
            index,
            value: Some(to_item(new)?),
            old_value: Some(to_item(old)?),
        })
    }
}

fn out_of_range(index: usize) -> CoreError {
    CoreError::Internal(format!("content item diff index {index} out of range"))
}

fn set_field(target: &mut Value, keys: &[&str], value: Value) -> Result<(), CoreError> {
    let mut current = target;
    for key in keys {
        current = current
            .get_mut(*key)
            .ok_or_else(|| CoreError::Internal(format!("content item has no field '{key}'")))?;
    }
    *current = value;
    Ok(())
}

fn to_item(value: Value) -> Result<ContentItem, CoreError> {
    serde_json::from_value(value)
        .map_err(|e| CoreError::Internal(format!("malformed content item in diff: {e}")))
}

fn to_values(items: &[ContentItem]) -> Result<Vec<Value>, CoreError> {
    items
        .iter()
        .map(|item| {
            serde_json::to_value(item.trackable())
                .map_err(|e| CoreError::Internal(format!("content item not serializable: {e}")))
        })
        .collect()
}

/// Content-item changes between two arrays, in operation order.
///
/// Both arrays are compared without their volatile fields. A diff operation
/// outside the `index[/kind|/ref/id|/ref/revision]` shape aborts the whole
/// computation with [`CoreError::Internal`].
pub fn content_item_changes(
    before: &[ContentItem],
    after: &[ContentItem],
) -> Result<Vec<ItemChange>, CoreError> {
    let old = to_values(before)?;
    let new = to_values(after)?;
    let ops = diff_arrays(&old, &new)
        .iter()
        .map(ItemOp::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let mut folder = ItemChangeFolder::new(old);
    let mut changes = Vec::new();
    for op in ops {
        changes.extend(folder.step(Some(op))?);
    }
    changes.extend(folder.step(None)?);
    Ok(changes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
