//! History presentation: raw change records to labelled actions.
//!
//! [`present`] runs the stages in a fixed order over a timestamp-ascending
//! record list and returns the result newest first:
//!
//! 1. [`collapse_parent_chains`] keeps only the head of each causal chain.
//! 2. [`filter_variants`] resolves records to a language and drops the
//!    translations of other languages.
//! 3. [`merge_moves`] folds matching remove/add pairs into one move, then
//!    [`classify`] labels every remaining record.
//!
//! The stages never consult live tree state.

use std::collections::HashSet;

use uuid::Uuid;

use crate::change::{ChangeAction, ChangeOp, ChangeRecord, NodeValue, RevertSpan};

// ---------------------------------------------------------------------------
// Stage 1: parent-chain collapse
// ---------------------------------------------------------------------------

/// Collapse causal chains into their first record.
///
/// A record joins the current chain while its `parents` include the chain
/// head. When a record breaks the chain, the head is emitted and the rest of
/// the chain is dropped. A breaking record that descends from an already
/// collapsed chain is dropped as well; any other breaking record starts the
/// next chain.
pub fn collapse_parent_chains(records: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
    let mut out = Vec::with_capacity(records.len());
    let mut chain: Vec<ChangeRecord> = Vec::new();
    let mut collapsed: HashSet<Uuid> = HashSet::new();

    for record in records {
        if let Some(head) = chain.first() {
            if record.parents.contains(&head.id) {
                chain.push(record);
                continue;
            }
        }
        flush_chain(&mut chain, &mut out, &mut collapsed);
        if record.parents.iter().any(|p| collapsed.contains(p)) {
            collapsed.insert(record.id);
            continue;
        }
        chain.push(record);
    }
    flush_chain(&mut chain, &mut out, &mut collapsed);
    out
}

fn flush_chain(
    chain: &mut Vec<ChangeRecord>,
    out: &mut Vec<ChangeRecord>,
    collapsed: &mut HashSet<Uuid>,
) {
    let mut drained = chain.drain(..);
    if let Some(head) = drained.next() {
        collapsed.insert(head.id);
        collapsed.extend(drained.map(|r| r.id));
        out.push(head);
    }
}

// ---------------------------------------------------------------------------
// Stage 2: variant filtering
// ---------------------------------------------------------------------------

fn resolve_variant(value: &mut NodeValue, language: Option<&str>) {
    if let NodeValue::Slide(slide) = value {
        if let Some(language) = language {
            if let Some(variant) = slide.variant.as_ref().filter(|v| v.language == language) {
                slide.node = variant.node_ref();
            } else if let Some(variant) = slide.variants.iter().find(|v| v.language == language) {
                slide.node = variant.node_ref();
            }
        }
        slide.variants.clear();
    }
}

/// Resolve node values to the `language` variant and strip variant lists.
///
/// With a language filter, records about a translation into another
/// language are dropped; records without a variant (primary additions,
/// removals and edits) are kept.
pub fn filter_variants(records: Vec<ChangeRecord>, language: Option<&str>) -> Vec<ChangeRecord> {
    records
        .into_iter()
        .filter_map(|mut record| {
            if let (Some(language), Some(NodeValue::Slide(slide))) = (language, &record.value) {
                if slide.variant.as_ref().is_some_and(|v| v.language != language) {
                    return None;
                }
            }
            if let Some(value) = record.value.as_mut() {
                resolve_variant(value, language);
            }
            if let Some(value) = record.old_value.as_mut() {
                resolve_variant(value, language);
            }
            Some(record)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stage 3: move detection and action inference
// ---------------------------------------------------------------------------

fn is_move_pair(a: &ChangeRecord, b: &ChangeRecord) -> bool {
    let ops_match = matches!(
        (a.op, b.op),
        (ChangeOp::Add, ChangeOp::Remove) | (ChangeOp::Remove, ChangeOp::Add)
    );
    ops_match
        && a.value.is_some()
        && a.value == b.value
        && a.user == b.user
        && a.timestamp.timestamp() == b.timestamp.timestamp()
}

/// Fold adjacent remove/add pairs of the same node, by the same user, within
/// the same second, into one `move` record located at the add's path.
pub fn merge_moves(records: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
    let mut out = Vec::with_capacity(records.len());
    let mut iter = records.into_iter().peekable();
    while let Some(record) = iter.next() {
        let Some(partner) = iter.next_if(|next| is_move_pair(&record, next)) else {
            out.push(record);
            continue;
        };
        let (removed, mut added) = if record.op == ChangeOp::Remove {
            (record, partner)
        } else {
            (partner, record)
        };
        added.op = ChangeOp::Move;
        added.action = Some(ChangeAction::Move);
        added.from_path = Some(removed.path);
        for parent in removed.parents {
            if !added.parents.contains(&parent) {
                added.parents.push(parent);
            }
        }
        out.push(added);
    }
    out
}

fn only_title_updated(record: &ChangeRecord) -> bool {
    record
        .values
        .as_ref()
        .is_some_and(|values| values.len() == 1 && values.contains_key("title"))
}

/// Label every record that has no action yet.
pub fn classify(records: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
    classify_with(records, &HashSet::new())
}

/// [`classify`], with `reverted_parents` naming deck-level reverts that are
/// not part of `records`. A slide replace caused by one of them is a revert.
pub fn classify_with(
    mut records: Vec<ChangeRecord>,
    reverted_parents: &HashSet<Uuid>,
) -> Vec<ChangeRecord> {
    let mut reverted = reverted_parents.clone();

    for record in records.iter_mut() {
        if record.action.is_some() {
            continue;
        }
        let action = match (record.op, &record.value, &record.old_value) {
            (ChangeOp::Replace, Some(NodeValue::Deck(new)), Some(NodeValue::Deck(old))) => {
                match new.origin_revision {
                    Some(origin) if origin < old.node.revision - 1 => {
                        record.revert = Some(RevertSpan {
                            from: old.node.revision,
                            to: origin,
                        });
                        reverted.insert(record.id);
                        ChangeAction::Revert
                    }
                    _ => ChangeAction::Revise,
                }
            }
            (ChangeOp::Replace, Some(NodeValue::Slide(new)), Some(NodeValue::Slide(old))) => {
                let parent_reverted = record.parents.iter().any(|p| reverted.contains(p));
                if new.node.revision < old.node.revision || parent_reverted {
                    record.revert = Some(RevertSpan {
                        from: old.node.revision,
                        to: new.node.revision,
                    });
                    ChangeAction::Revert
                } else if new.title != old.title {
                    ChangeAction::Rename
                } else {
                    ChangeAction::Edit
                }
            }
            (ChangeOp::Update, _, _) if only_title_updated(record) => ChangeAction::Rename,
            (ChangeOp::Add, Some(NodeValue::Slide(slide)), _) if slide.variant.is_some() => {
                ChangeAction::Translate
            }
            (op, _, _) => op.into(),
        };
        record.action = Some(action);
    }
    records
}

/// Ids of the deck-level reverts among `records`.
pub fn deck_reverts(records: Vec<ChangeRecord>) -> HashSet<Uuid> {
    classify(records)
        .into_iter()
        .filter(|r| {
            r.action == Some(ChangeAction::Revert) && matches!(r.value, Some(NodeValue::Deck(_)))
        })
        .map(|r| r.id)
        .collect()
}

/// Run the whole presentation pipeline; output is newest first.
pub fn present(records: Vec<ChangeRecord>, language: Option<&str>) -> Vec<ChangeRecord> {
    present_with(records, language, &HashSet::new())
}

/// [`present`] for a partial log whose records may descend from deck-level
/// reverts outside it, see [`classify_with`].
pub fn present_with(
    mut records: Vec<ChangeRecord>,
    language: Option<&str>,
    reverted_parents: &HashSet<Uuid>,
) -> Vec<ChangeRecord> {
    records.sort_by_key(|r| r.timestamp);
    let records = collapse_parent_chains(records);
    let records = filter_variants(records, language);
    let records = merge_moves(records);
    let mut records = classify_with(records, reverted_parents);
    records.reverse();
    records
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
