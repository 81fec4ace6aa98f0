mod common;

use serde_json::json;
use uuid::Uuid;

use deckhub_core::change::{ChangeAction, ChangeOp, NodeValue, PathSegment};
use deckhub_core::model::{ContentItem, DeckProperties, ItemKind, NodeRef};
use deckhub_db::memory::MemoryStore;
use deckhub_db::store::DeckStore;
use deckhub_engine::history::{deck_history, History, HistoryOptions};
use deckhub_engine::tracker::DeckTracker;

use common::*;

fn actions(history: &History) -> Vec<ChangeAction> {
    match history {
        History::Records(records) => records.iter().map(|r| r.effective_action()).collect(),
        History::Simplified(changes) => changes.iter().map(|c| c.action).collect(),
    }
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

#[tokio::test]
async fn appending_a_slide_records_one_add() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let b = slide(&store, "B", "en").await;
    let d = deck(&store, "Deck", vec![ContentItem::slide(a)]).await;

    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    store
        .update_content_items(d.id, vec![ContentItem::slide(a), ContentItem::slide(b)])
        .await
        .unwrap();
    let updated = reload(&store, d.id).await;
    let records = tracker.commit(&store, &updated, &[]).await.unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.op, ChangeOp::Add);
    assert_eq!(
        record.path,
        vec![
            PathSegment::root(NodeRef::new(d.id, 1)),
            PathSegment::Position { index: 1 },
        ]
    );
    let value = record.value.as_ref().unwrap();
    assert_eq!(value.node(), b);
    assert_eq!(value.title(), Some("B"));
    assert_eq!(record.user, USER);
}

#[tokio::test]
async fn removing_the_first_slide_records_its_value() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let b = slide(&store, "B", "en").await;
    let d = deck(&store, "Deck", vec![ContentItem::slide(a), ContentItem::slide(b)]).await;

    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    store
        .update_content_items(d.id, vec![ContentItem::slide(b)])
        .await
        .unwrap();
    let records = tracker
        .commit(&store, &reload(&store, d.id).await, &[])
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].op, ChangeOp::Remove);
    assert_eq!(records[0].path.last(), Some(&PathSegment::Position { index: 0 }));
    assert_eq!(records[0].value.as_ref().map(NodeValue::node), Some(a));
}

#[tokio::test]
async fn substituting_a_node_is_one_replace() {
    let store = MemoryStore::new();
    let d = deck(&store, "Deck", vec![ContentItem::slide(NodeRef::new(5, 3))]).await;

    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    store
        .update_content_items(d.id, vec![ContentItem::deck(NodeRef::new(9, 1))])
        .await
        .unwrap();
    let records = tracker
        .commit(&store, &reload(&store, d.id).await, &[])
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].op, ChangeOp::Replace);
    assert_eq!(records[0].old_value, Some(NodeValue::slide(NodeRef::new(5, 3))));
    assert_eq!(records[0].value, Some(NodeValue::deck(NodeRef::new(9, 1))));
}

#[tokio::test]
async fn ordering_hints_are_not_tracked() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let mut item = ContentItem::slide(a);
    item.order = Some(3);
    let d = deck(&store, "Deck", vec![item.clone()]).await;

    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    item.order = Some(1);
    store.update_content_items(d.id, vec![item]).await.unwrap();
    let records = tracker
        .commit(&store, &reload(&store, d.id).await, &[])
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn nested_deck_edits_carry_the_tree_path() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let root = deck(&store, "Root", vec![]).await;
    let child = subdeck(&store, &root, "Child", vec![]).await;

    let tracker = DeckTracker::begin(&child, root.id, USER).unwrap();
    store
        .update_content_items(child.id, vec![ContentItem::slide(a)])
        .await
        .unwrap();
    let records = tracker
        .commit(&store, &reload(&store, child.id).await, &[])
        .await
        .unwrap();

    assert_eq!(
        records[0].path,
        vec![
            PathSegment::root(NodeRef::new(root.id, 1)),
            PathSegment::Node {
                id: child.id,
                revision: 1,
                index: Some(0),
            },
            PathSegment::Position { index: 0 },
        ]
    );
}

#[tokio::test]
async fn deck_outside_the_root_is_tracked_at_its_own_position() {
    let store = MemoryStore::new();
    let root = deck(&store, "Root", vec![]).await;
    let loose = deck(&store, "Loose", vec![]).await;

    let tracker = DeckTracker::begin(&loose, root.id, USER).unwrap();
    store
        .update_content_items(loose.id, vec![ContentItem::slide(NodeRef::new(1, 1))])
        .await
        .unwrap();
    let records = tracker
        .commit(&store, &reload(&store, loose.id).await, &[])
        .await
        .unwrap();
    assert_eq!(records[0].path[0], PathSegment::root(NodeRef::new(loose.id, 1)));
}

// ---------------------------------------------------------------------------
// Deck-level records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn revising_a_subdeck_reference_presents_as_revise() {
    let store = MemoryStore::new();
    let root = deck(&store, "Root", vec![]).await;
    let child = subdeck(&store, &root, "Child", vec![]).await;
    store.revise_deck(child.id, None, USER).await.unwrap();

    let root = reload(&store, root.id).await;
    let tracker = DeckTracker::begin(&root, root.id, USER).unwrap();
    store
        .replace_item_ref(
            root.id,
            ItemKind::Deck,
            NodeRef::new(child.id, 1),
            NodeRef::new(child.id, 2),
        )
        .await
        .unwrap();
    let records = tracker
        .commit(&store, &reload(&store, root.id).await, &[])
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.op, ChangeOp::Replace);
    assert_eq!(record.old_value.as_ref().unwrap().node().revision, 1);
    match record.value.as_ref().unwrap() {
        NodeValue::Deck(value) => {
            assert_eq!(value.node.revision, 2);
            assert_eq!(value.origin_revision, Some(1));
            assert_eq!(value.title.as_deref(), Some("Child"));
        }
        other => panic!("expected a deck value, got {other:?}"),
    }

    let history = deck_history(&store, root.id, &HistoryOptions::default())
        .await
        .unwrap();
    assert_eq!(actions(&history), vec![ChangeAction::Revise]);
}

#[tokio::test]
async fn root_revise_is_recorded_before_and_parents_item_changes() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let d = deck(&store, "Deck", vec![]).await;
    let cause = Uuid::now_v7();

    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    store.revise_deck(d.id, None, USER).await.unwrap();
    store
        .update_content_items(d.id, vec![ContentItem::slide(a)])
        .await
        .unwrap();
    let records = tracker
        .commit(&store, &reload(&store, d.id).await, &[cause])
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].op, ChangeOp::Replace);
    assert_eq!(records[0].path, vec![PathSegment::root(NodeRef::new(d.id, 2))]);
    assert_eq!(records[0].parents, vec![cause]);
    assert_eq!(records[1].op, ChangeOp::Add);
    assert_eq!(records[1].parents, vec![cause, records[0].id]);
    assert_eq!(records[1].path[0], PathSegment::root(NodeRef::new(d.id, 2)));
}

#[tokio::test]
async fn property_edits_record_only_changed_fields() {
    let store = MemoryStore::new();
    let d = deck(&store, "Old", vec![]).await;

    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    store
        .update_deck_properties(
            d.id,
            DeckProperties {
                title: Some("New".to_string()),
                theme: Some("default".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let records = tracker
        .commit(&store, &reload(&store, d.id).await, &[])
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].op, ChangeOp::Update);
    assert_eq!(records[0].values, json!({"title": "New"}).as_object().cloned());
    assert_eq!(records[0].old_values, json!({"title": "Old"}).as_object().cloned());

    let options = HistoryOptions {
        simplify: true,
        ..Default::default()
    };
    let history = deck_history(&store, d.id, &options).await.unwrap();
    match history {
        History::Simplified(changes) => {
            assert_eq!(changes[0].action, ChangeAction::Rename);
            assert_eq!(changes[0].summary, "renamed deck \"Old\" to \"New\"");
        }
        other => panic!("expected simplified history, got {other:?}"),
    }
}

#[tokio::test]
async fn unchanged_deck_records_nothing() {
    let store = MemoryStore::new();
    let d = deck(&store, "Same", vec![]).await;
    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    let records = tracker
        .commit(&store, &reload(&store, d.id).await, &[])
        .await
        .unwrap();
    assert!(records.is_empty());
    assert!(store.all_changes().await.is_empty());
}
