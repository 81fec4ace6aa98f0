//! Change-log records.
//!
//! A [`NewChange`] is produced by the change tracker or the tree copy engine
//! and becomes an immutable [`ChangeRecord`] once the change log persists it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ContentItem, ItemKind, NodeRef, VariantRef};
use crate::types::{DbId, RevisionId, Timestamp};

/// Raw operation stored in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Add,
    Remove,
    Replace,
    Update,
    /// Only produced by the history presentation layer.
    Move,
    /// A deck created by fork or attach.
    Copy,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Update => "update",
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }
}

/// Human-meaningful label attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Remove,
    Replace,
    Update,
    Move,
    Copy,
    Rename,
    Revise,
    Revert,
    Edit,
    Translate,
    Fork,
    Attach,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Update => "update",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Rename => "rename",
            Self::Revise => "revise",
            Self::Revert => "revert",
            Self::Edit => "edit",
            Self::Translate => "translate",
            Self::Fork => "fork",
            Self::Attach => "attach",
        }
    }
}

impl From<ChangeOp> for ChangeAction {
    fn from(op: ChangeOp) -> Self {
        match op {
            ChangeOp::Add => Self::Add,
            ChangeOp::Remove => Self::Remove,
            ChangeOp::Replace => Self::Replace,
            ChangeOp::Update => Self::Update,
            ChangeOp::Move => Self::Move,
            ChangeOp::Copy => Self::Copy,
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckNode {
    #[serde(rename = "ref")]
    pub node: NodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_revision: Option<RevisionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideNode {
    #[serde(rename = "ref")]
    pub node: NodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The translation this record is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<VariantRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantRef>,
}

/// The node a node-level record adds, removes or replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeValue {
    Deck(DeckNode),
    Slide(SlideNode),
}

impl NodeValue {
    pub fn deck(node: NodeRef) -> Self {
        Self::Deck(DeckNode {
            node,
            title: None,
            origin_revision: None,
        })
    }

    pub fn slide(node: NodeRef) -> Self {
        Self::Slide(SlideNode {
            node,
            title: None,
            variant: None,
            variants: Vec::new(),
        })
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Deck(_) => ItemKind::Deck,
            Self::Slide(_) => ItemKind::Slide,
        }
    }

    pub fn node(&self) -> NodeRef {
        match self {
            Self::Deck(d) => d.node,
            Self::Slide(s) => s.node,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Deck(d) => d.title.as_deref(),
            Self::Slide(s) => s.title.as_deref(),
        }
    }

    pub fn set_title(&mut self, title: Option<String>) {
        match self {
            Self::Deck(d) => d.title = title,
            Self::Slide(s) => s.title = title,
        }
    }
}

impl From<&ContentItem> for NodeValue {
    fn from(item: &ContentItem) -> Self {
        match item.kind {
            ItemKind::Deck => Self::deck(item.node),
            ItemKind::Slide => Self::Slide(SlideNode {
                node: item.node,
                title: None,
                variant: None,
                variants: item.variants.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// One step of the path from the tree root to the changed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A deck on the way down; `index` is its position in its parent.
    Node {
        id: DbId,
        revision: RevisionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    /// A content-item slot inside the last deck of the path.
    Position { index: usize },
}

impl PathSegment {
    pub fn root(node: NodeRef) -> Self {
        Self::Node {
            id: node.id,
            revision: node.revision,
            index: None,
        }
    }

    pub fn node_ref(&self) -> Option<NodeRef> {
        match self {
            Self::Node { id, revision, .. } => Some(NodeRef::new(*id, *revision)),
            Self::Position { .. } => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Node { index, .. } => *index,
            Self::Position { index } => Some(*index),
        }
    }
}

/// The deck revision a path ends at, ignoring a trailing item position.
pub fn path_deck(path: &[PathSegment]) -> Option<NodeRef> {
    path.iter().rev().find_map(PathSegment::node_ref)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A change that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChange {
    pub op: ChangeOp,
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<NodeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<NodeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_values: Option<serde_json::Map<String, serde_json::Value>>,
    pub user: DbId,
    /// Set by writers that already know the label (fork, attach).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ChangeAction>,
    #[serde(default)]
    pub parents: Vec<Uuid>,
}

impl NewChange {
    pub fn node(op: ChangeOp, path: Vec<PathSegment>, user: DbId) -> Self {
        Self {
            op,
            path,
            value: None,
            old_value: None,
            values: None,
            old_values: None,
            user,
            action: None,
            parents: Vec::new(),
        }
    }
}

/// Span of a revert: the revision that was current and the one restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertSpan {
    pub from: RevisionId,
    pub to: RevisionId,
}

/// A persisted, append-only change-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub id: Uuid,
    pub op: ChangeOp,
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<NodeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<NodeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_values: Option<serde_json::Map<String, serde_json::Value>>,
    pub timestamp: Timestamp,
    pub user: DbId,
    #[serde(default)]
    pub parents: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ChangeAction>,
    /// Source path of a presented move.
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub from_path: Option<Vec<PathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert: Option<RevertSpan>,
}

impl ChangeRecord {
    pub fn from_new(change: NewChange, id: Uuid, timestamp: Timestamp) -> Self {
        Self {
            id,
            op: change.op,
            path: change.path,
            value: change.value,
            old_value: change.old_value,
            values: change.values,
            old_values: change.old_values,
            timestamp,
            user: change.user,
            parents: change.parents,
            action: change.action,
            from_path: None,
            revert: None,
        }
    }

    /// The deck revision the record belongs to.
    pub fn deck_ref(&self) -> Option<NodeRef> {
        path_deck(&self.path)
    }

    /// Every deck id on the record's path.
    pub fn path_deck_ids(&self) -> Vec<DbId> {
        self.path
            .iter()
            .filter_map(|s| s.node_ref().map(|n| n.id))
            .collect()
    }

    /// Ids of the slides referenced by `value` and `oldValue`.
    pub fn slide_ids(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = [&self.value, &self.old_value]
            .into_iter()
            .flatten()
            .filter_map(|v| match v {
                NodeValue::Slide(s) => Some(s.node.id),
                NodeValue::Deck(_) => None,
            })
            .collect();
        ids.dedup();
        ids
    }

    /// The label presented for this record.
    pub fn effective_action(&self) -> ChangeAction {
        self.action.unwrap_or_else(|| self.op.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_value_is_tagged_by_kind() {
        let value = NodeValue::deck(NodeRef::new(21, 2));
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"kind": "deck", "ref": {"id": 21, "revision": 2}})
        );
        let parsed: NodeValue =
            serde_json::from_value(json!({"kind": "slide", "ref": {"id": 4, "revision": 1}}))
                .unwrap();
        assert_eq!(parsed, NodeValue::slide(NodeRef::new(4, 1)));
    }

    #[test]
    fn path_segments_distinguish_nodes_from_positions() {
        let path: Vec<PathSegment> = serde_json::from_value(json!([
            {"id": 10, "revision": 1},
            {"id": 21, "revision": 2, "index": 3},
            {"index": 0}
        ]))
        .unwrap();
        assert_eq!(path[0], PathSegment::root(NodeRef::new(10, 1)));
        assert_eq!(path[1].index(), Some(3));
        assert_eq!(path[2], PathSegment::Position { index: 0 });
        assert_eq!(path_deck(&path), Some(NodeRef::new(21, 2)));
    }

    #[test]
    fn effective_action_defaults_to_op() {
        let mut record = ChangeRecord::from_new(
            NewChange::node(ChangeOp::Remove, vec![], 7),
            Uuid::now_v7(),
            chrono::Utc::now(),
        );
        assert_eq!(record.effective_action(), ChangeAction::Remove);
        record.action = Some(ChangeAction::Move);
        assert_eq!(record.effective_action(), ChangeAction::Move);
    }
}
