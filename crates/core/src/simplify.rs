//! Compact one-line rendering of presented history records.

use serde::Serialize;
use uuid::Uuid;

use crate::change::{ChangeAction, ChangeRecord, NodeValue, PathSegment};
use crate::types::{DbId, Timestamp};

/// A history record reduced to a display string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplifiedChange {
    pub id: Uuid,
    pub timestamp: Timestamp,
    pub user: DbId,
    pub action: ChangeAction,
    pub summary: String,
}

fn label(value: &NodeValue) -> String {
    match value.title() {
        Some(title) => format!("{} \"{title}\"", value.kind()),
        None => format!("{} {}", value.kind(), value.node()),
    }
}

/// 1-based position of the item a path points at.
fn position(path: &[PathSegment]) -> Option<usize> {
    path.last().and_then(PathSegment::index).map(|i| i + 1)
}

fn at_position(path: &[PathSegment]) -> String {
    position(path)
        .map(|p| format!(" at position {p}"))
        .unwrap_or_default()
}

fn string_field(map: Option<&serde_json::Map<String, serde_json::Value>>, key: &str) -> String {
    map.and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn summarize(record: &ChangeRecord) -> String {
    let value = record.value.as_ref();
    let old = record.old_value.as_ref();
    let subject = value.or(old).map(label).unwrap_or_else(|| "deck".to_string());

    match record.effective_action() {
        ChangeAction::Rename => match (old, value) {
            (Some(old), Some(new)) => format!(
                "renamed {} \"{}\" to \"{}\"",
                new.kind(),
                old.title().unwrap_or_default(),
                new.title().unwrap_or_default()
            ),
            _ => format!(
                "renamed deck \"{}\" to \"{}\"",
                string_field(record.old_values.as_ref(), "title"),
                string_field(record.values.as_ref(), "title")
            ),
        },
        ChangeAction::Revise => format!("created a new revision of {subject}"),
        ChangeAction::Revert => match record.revert {
            Some(span) => format!("reverted {subject} from revision {} to {}", span.from, span.to),
            None => format!("reverted {subject}"),
        },
        ChangeAction::Edit => format!("edited {subject}"),
        ChangeAction::Move => {
            let from = record.from_path.as_deref().and_then(position);
            match (from, position(&record.path)) {
                (Some(from), Some(to)) => {
                    format!("moved {subject} from position {from} to position {to}")
                }
                _ => format!("moved {subject}"),
            }
        }
        ChangeAction::Translate => {
            let language = match value {
                Some(NodeValue::Slide(slide)) => slide
                    .variant
                    .as_ref()
                    .map(|v| v.language.clone())
                    .unwrap_or_default(),
                _ => String::new(),
            };
            format!("translated {subject} to '{language}'")
        }
        ChangeAction::Fork | ChangeAction::Attach | ChangeAction::Copy => {
            let verb = match record.effective_action() {
                ChangeAction::Attach => "attached",
                _ => "forked",
            };
            match (old, value) {
                (Some(source), Some(copy)) => {
                    format!("{verb} {} as {}", label(source), copy.node())
                }
                _ => format!("{verb} {subject}"),
            }
        }
        ChangeAction::Add => format!("added {subject}{}", at_position(&record.path)),
        ChangeAction::Remove => format!("removed {subject}{}", at_position(&record.path)),
        ChangeAction::Replace => match (old, value) {
            (Some(old), Some(new)) => format!("replaced {} with {}", label(old), label(new)),
            _ => format!("replaced {subject}"),
        },
        ChangeAction::Update => {
            let mut fields: Vec<&str> = record
                .values
                .iter()
                .flat_map(|m| m.keys().map(String::as_str))
                .collect();
            fields.sort_unstable();
            format!("updated {}", fields.join(", "))
        }
    }
}

/// Render presented records as short display strings, keeping their order.
pub fn simplify(records: &[ChangeRecord]) -> Vec<SimplifiedChange> {
    records
        .iter()
        .map(|record| SimplifiedChange {
            id: record.id,
            timestamp: record.timestamp,
            user: record.user,
            action: record.effective_action(),
            summary: summarize(record),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeOp, NewChange, RevertSpan};
    use crate::model::NodeRef;
    use serde_json::json;

    fn record(op: ChangeOp, action: ChangeAction) -> ChangeRecord {
        let mut r = ChangeRecord::from_new(
            NewChange::node(op, vec![PathSegment::root(NodeRef::new(10, 1))], 7),
            Uuid::now_v7(),
            chrono::Utc::now(),
        );
        r.action = Some(action);
        r
    }

    #[test]
    fn renders_deck_rename() {
        let mut r = record(ChangeOp::Update, ChangeAction::Rename);
        r.old_values = json!({"title": "Old"}).as_object().cloned();
        r.values = json!({"title": "New"}).as_object().cloned();
        assert_eq!(simplify(&[r])[0].summary, "renamed deck \"Old\" to \"New\"");
    }

    #[test]
    fn renders_move_positions() {
        let mut r = record(ChangeOp::Move, ChangeAction::Move);
        r.value = Some(NodeValue::slide(NodeRef::new(5, 1)));
        r.path.push(PathSegment::Position { index: 0 });
        let mut from = r.path.clone();
        from.pop();
        from.push(PathSegment::Position { index: 2 });
        r.from_path = Some(from);
        assert_eq!(
            simplify(&[r])[0].summary,
            "moved slide 5-1 from position 3 to position 1"
        );
    }

    #[test]
    fn renders_revert_span() {
        let mut r = record(ChangeOp::Replace, ChangeAction::Revert);
        r.value = Some(NodeValue::deck(NodeRef::new(21, 6)));
        r.revert = Some(RevertSpan { from: 5, to: 2 });
        assert_eq!(
            simplify(&[r])[0].summary,
            "reverted deck 21-6 from revision 5 to 2"
        );
    }

    #[test]
    fn renders_update_field_list() {
        let mut r = record(ChangeOp::Update, ChangeAction::Update);
        r.values = json!({"theme": "dark", "language": "de"}).as_object().cloned();
        let out = simplify(&[r]);
        assert_eq!(out[0].summary, "updated language, theme");
        assert_eq!(out[0].action, ChangeAction::Update);
    }
}
