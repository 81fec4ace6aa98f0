mod common;

use assert_matches::assert_matches;
use chrono::Utc;

use deckhub_core::change::{ChangeAction, ChangeOp, PathSegment};
use deckhub_core::error::CoreError;
use deckhub_core::model::{ContentItem, Deck, ItemKind, NodeRef, Origin};
use deckhub_core::types::DbId;
use deckhub_db::memory::MemoryStore;
use deckhub_db::store::{ChangeLogStore, DeckStore, SlideStore};
use deckhub_engine::copy::{
    attach_deck_tree, copy_deck_tree, fork_deck, CopyOptions, SlidePolicy,
};
use deckhub_engine::history::{deck_history, History, HistoryOptions};
use deckhub_engine::tracker::DeckTracker;

use common::*;

/// Append `slide` to `deck_id` as a tracked edit attributed to `root_id`.
async fn tracked_append(store: &MemoryStore, deck_id: DbId, root_id: DbId, slide: NodeRef) {
    let current = reload(store, deck_id).await;
    let tracker = DeckTracker::begin(&current, root_id, USER).unwrap();
    let mut items = current.latest_revision().unwrap().content_items.clone();
    items.push(ContentItem::slide(slide));
    store.update_content_items(deck_id, items).await.unwrap();
    tracker
        .commit(store, &reload(store, deck_id).await, &[])
        .await
        .unwrap();
}

fn history_actions(history: &History) -> Vec<ChangeAction> {
    match history {
        History::Records(records) => records.iter().map(|r| r.effective_action()).collect(),
        History::Simplified(changes) => changes.iter().map(|c| c.action).collect(),
    }
}

// ---------------------------------------------------------------------------
// Fork
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fork_copies_the_tree_and_shares_slides() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let b = slide(&store, "B", "en").await;
    let root = deck(&store, "Root", vec![ContentItem::slide(a)]).await;
    let child = subdeck(&store, &root, "Child", vec![ContentItem::slide(b)]).await;

    let result = fork_deck(&store, root.id, 99, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();

    let ids: Vec<(DbId, DbId)> = result.id_map.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], (root.id, result.new_root_id));
    assert_eq!(ids[1].0, child.id);

    let copy = reload(&store, result.new_root_id).await;
    assert_eq!(copy.revisions.len(), 1);
    assert_eq!(copy.user, 99);
    assert_eq!(
        copy.origin,
        Some(Origin {
            id: root.id,
            revision: 1,
            title: "Root".to_string(),
            user: USER,
        })
    );
    let items = &copy.latest_revision().unwrap().content_items;
    assert_eq!(items[0], ContentItem::slide(a));
    assert_eq!(items[1], ContentItem::deck(NodeRef::new(ids[1].1, 1)));

    let copy_ref = NodeRef::new(result.new_root_id, 1);
    let shared = store.get_slide(a.id).await.unwrap().unwrap();
    assert!(shared.revisions[0].usage.contains(&copy_ref));

    let child_copy = reload(&store, ids[1].1).await;
    assert_eq!(child_copy.latest_revision().unwrap().usage, vec![copy_ref]);
    assert_eq!(child_copy.origin.as_ref().map(|o| o.id), Some(child.id));

    // A fresh source is left untouched.
    assert_eq!(reload(&store, root.id).await.revisions.len(), 1);
}

#[tokio::test]
async fn fork_records_provenance_root_first() {
    let store = MemoryStore::new();
    let root = deck(&store, "Root", vec![]).await;
    subdeck(&store, &root, "Child", vec![]).await;

    let result = fork_deck(&store, root.id, USER, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();

    let copies: Vec<_> = store
        .all_changes()
        .await
        .into_iter()
        .filter(|r| r.op == ChangeOp::Copy)
        .collect();
    assert_eq!(copies.len(), 2);
    assert!(copies.iter().all(|r| r.action == Some(ChangeAction::Fork)));
    assert_eq!(
        copies[0].path,
        vec![PathSegment::root(NodeRef::new(result.new_root_id, 1))]
    );
    assert!(copies[0].parents.is_empty());
    assert_eq!(copies[1].parents, vec![copies[0].id]);
    assert_eq!(copies[1].path.len(), 2);

    let history = deck_history(&store, result.new_root_id, &HistoryOptions::default())
        .await
        .unwrap();
    assert_eq!(history_actions(&history), vec![ChangeAction::Fork]);
}

#[tokio::test]
async fn fork_of_a_busy_revision_revises_the_source() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let b = slide(&store, "B", "en").await;
    let d = deck(&store, "Busy", vec![]).await;
    tracked_append(&store, d.id, d.id, a).await;
    tracked_append(&store, d.id, d.id, b).await;
    assert_eq!(store.count_changes(NodeRef::new(d.id, 1)).await.unwrap(), 2);

    let result = fork_deck(&store, d.id, USER, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();

    let source = reload(&store, d.id).await;
    assert_eq!(source.revisions.len(), 2);
    assert_eq!(source.revisions[1].origin_revision, Some(1));
    // Existing revisions are not mutated.
    assert_eq!(source.revisions[0].content_items.len(), 2);

    let copy = reload(&store, result.new_root_id).await;
    assert_eq!(copy.origin.as_ref().map(|o| o.revision), Some(1));
    assert_eq!(copy.latest_revision().unwrap().content_items.len(), 2);

    let history = deck_history(&store, d.id, &HistoryOptions::default())
        .await
        .unwrap();
    assert_eq!(
        history_actions(&history),
        vec![ChangeAction::Revise, ChangeAction::Add, ChangeAction::Add]
    );
}

#[tokio::test]
async fn fork_of_a_fresh_revision_copies_the_preceding_one() {
    let store = MemoryStore::new();
    let d = deck(&store, "Fresh", vec![]).await;
    let tracker = DeckTracker::begin(&d, d.id, USER).unwrap();
    store.revise_deck(d.id, None, USER).await.unwrap();
    tracker
        .commit(&store, &reload(&store, d.id).await, &[])
        .await
        .unwrap();
    assert_eq!(store.count_changes(NodeRef::new(d.id, 2)).await.unwrap(), 1);

    let result = fork_deck(&store, d.id, USER, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();

    let copy = reload(&store, result.new_root_id).await;
    assert_eq!(copy.origin.as_ref().map(|o| o.revision), Some(1));
    assert_eq!(reload(&store, d.id).await.revisions.len(), 2);
}

#[tokio::test]
async fn fork_of_a_single_changed_first_revision_revises_after_copy() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let d = deck(&store, "Deck 30", vec![]).await;
    tracked_append(&store, d.id, d.id, a).await;

    let copied = copy_deck_tree(&store, d.id, None, USER, None, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(copied.source, NodeRef::new(d.id, 1));
    assert_eq!(copied.revised, Some(NodeRef::new(d.id, 2)));

    let source = reload(&store, d.id).await;
    assert_eq!(source.latest_revision().unwrap().origin_revision, Some(1));
}

#[tokio::test]
async fn revise_after_copy_repoints_parents() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let b = slide(&store, "B", "en").await;
    let parent = deck(&store, "Parent", vec![]).await;
    let child = subdeck(&store, &parent, "Child", vec![]).await;
    tracked_append(&store, child.id, child.id, a).await;
    tracked_append(&store, child.id, child.id, b).await;

    fork_deck(&store, child.id, USER, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();

    let parent = reload(&store, parent.id).await;
    assert_eq!(
        parent.latest_revision().unwrap().content_items,
        vec![ContentItem::deck(NodeRef::new(child.id, 2))]
    );
    let child = reload(&store, child.id).await;
    assert_eq!(
        child.revisions[1].usage,
        vec![NodeRef::new(parent.id, 1)]
    );

    let history = deck_history(&store, parent.id, &HistoryOptions::default())
        .await
        .unwrap();
    assert_eq!(history_actions(&history), vec![ChangeAction::Revise]);
}

#[tokio::test]
async fn duplicate_policy_copies_slides() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let de = variant(&store, "A (de)", "de").await;
    let d = deck(&store, "Deck", vec![ContentItem::slide(a).with_variant(de.clone())]).await;

    let options = CopyOptions {
        slides: SlidePolicy::Duplicate,
    };
    let result = fork_deck(&store, d.id, USER, options).await.unwrap().unwrap();

    let copy = reload(&store, result.new_root_id).await;
    let item = &copy.latest_revision().unwrap().content_items[0];
    assert_ne!(item.node.id, a.id);
    assert_eq!(item.variants.len(), 1);
    assert_ne!(item.variants[0].id, de.id);
    assert_eq!(item.variants[0].language, "de");

    let original = store.get_slide(a.id).await.unwrap().unwrap();
    assert!(original.revisions[0].usage.is_empty());
    let duplicate = store.get_slide(item.node.id).await.unwrap().unwrap();
    assert_eq!(duplicate.revisions[0].title, "A");
}

#[tokio::test]
async fn copy_skips_dangling_and_cyclic_items() {
    let store = MemoryStore::new();
    let a = new_deck(
        "A",
        "en",
        vec![
            ContentItem::deck(NodeRef::new(2, 1)),
            ContentItem::slide(NodeRef::new(500, 1)),
        ],
    );
    let b = new_deck("B", "en", vec![ContentItem::deck(NodeRef::new(1, 1))]);
    store.put_deck(Deck::create(1, a, USER, Utc::now())).await;
    store.put_deck(Deck::create(2, b, USER, Utc::now())).await;

    let result = fork_deck(&store, 1, USER, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.id_map.len(), 2);

    let copy = reload(&store, result.new_root_id).await;
    let items = &copy.latest_revision().unwrap().content_items;
    assert_eq!(items.len(), 1);
    let b_copy = reload(&store, items[0].node.id).await;
    assert!(b_copy.latest_revision().unwrap().content_items.is_empty());
}

#[tokio::test]
async fn fork_copies_a_repeated_subdeck_once() {
    let store = MemoryStore::new();
    let root = deck(&store, "Root", vec![]).await;
    let sub = subdeck(&store, &root, "Sub", vec![]).await;
    let items = vec![
        ContentItem::deck(NodeRef::new(sub.id, 1)),
        ContentItem::deck(NodeRef::new(sub.id, 1)),
    ];
    store.update_content_items(root.id, items).await.unwrap();

    let result = fork_deck(&store, root.id, USER, CopyOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.id_map.len(), 2);
    let sub_copy = result.id_map[&sub.id];

    let copy = reload(&store, result.new_root_id).await;
    let copied_items = &copy.latest_revision().unwrap().content_items;
    assert_eq!(copied_items.len(), 2);
    assert!(copied_items
        .iter()
        .all(|item| item.node == NodeRef::new(sub_copy, 1)));
    assert_eq!(
        reload(&store, sub_copy).await.latest_revision().unwrap().usage,
        vec![NodeRef::new(result.new_root_id, 1)]
    );
}

#[tokio::test]
async fn fork_of_missing_deck_is_none() {
    let store = MemoryStore::new();
    assert_matches!(
        fork_deck(&store, 404, USER, CopyOptions::default()).await,
        Ok(None)
    );
}

// ---------------------------------------------------------------------------
// Attach
// ---------------------------------------------------------------------------

#[tokio::test]
async fn attach_splices_the_copy_at_a_position() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let b = slide(&store, "B", "en").await;
    let target = deck(&store, "Target", vec![ContentItem::slide(a)]).await;
    let source = deck(&store, "Source", vec![ContentItem::slide(b)]).await;

    let result = attach_deck_tree(
        &store,
        source.id,
        target.id,
        Some(1),
        target.id,
        USER,
        CopyOptions::default(),
    )
    .await
    .unwrap()
    .unwrap();

    let target = reload(&store, target.id).await;
    let items = &target.latest_revision().unwrap().content_items;
    assert_eq!(
        items,
        &vec![
            ContentItem::deck(NodeRef::new(result.new_root_id, 1)),
            ContentItem::slide(a),
        ]
    );
    let copy = reload(&store, result.new_root_id).await;
    assert_eq!(copy.latest_revision().unwrap().usage, vec![NodeRef::new(target.id, 1)]);

    let copies: Vec<_> = store
        .all_changes()
        .await
        .into_iter()
        .filter(|r| r.op == ChangeOp::Copy)
        .collect();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].action, Some(ChangeAction::Attach));
    assert_eq!(
        copies[0].path,
        vec![
            PathSegment::root(NodeRef::new(target.id, 1)),
            PathSegment::Node {
                id: result.new_root_id,
                revision: 1,
                index: Some(0),
            },
        ]
    );
    assert_eq!(copies[0].parents.len(), 1);

    let history = deck_history(&store, target.id, &HistoryOptions::default())
        .await
        .unwrap();
    assert_eq!(history_actions(&history), vec![ChangeAction::Add]);
}

#[tokio::test]
async fn attach_appends_without_or_past_the_end_position() {
    let store = MemoryStore::new();
    let a = slide(&store, "A", "en").await;
    let target = deck(&store, "Target", vec![ContentItem::slide(a)]).await;
    let source = deck(&store, "Source", vec![]).await;

    for position in [None, Some(42)] {
        let result = attach_deck_tree(
            &store,
            source.id,
            target.id,
            position,
            target.id,
            USER,
            CopyOptions::default(),
        )
        .await
        .unwrap()
        .unwrap();
        let items = reload(&store, target.id)
            .await
            .latest_revision()
            .unwrap()
            .content_items
            .clone();
        assert_eq!(
            items.last(),
            Some(&ContentItem::deck(NodeRef::new(result.new_root_id, 1)))
        );
        assert_eq!(items[0].kind, ItemKind::Slide);
    }
}

#[tokio::test]
async fn attach_rejects_position_zero_and_missing_decks() {
    let store = MemoryStore::new();
    let target = deck(&store, "Target", vec![]).await;
    let source = deck(&store, "Source", vec![]).await;

    let err = attach_deck_tree(
        &store,
        source.id,
        target.id,
        Some(0),
        target.id,
        USER,
        CopyOptions::default(),
    )
    .await
    .unwrap_err();
    assert_matches!(err.as_core(), Some(CoreError::BadData(_)));

    assert_matches!(
        attach_deck_tree(&store, 404, target.id, None, target.id, USER, CopyOptions::default())
            .await,
        Ok(None)
    );
    assert_matches!(
        attach_deck_tree(&store, source.id, 404, None, 404, USER, CopyOptions::default()).await,
        Ok(None)
    );
    assert!(store.all_changes().await.is_empty());
}
