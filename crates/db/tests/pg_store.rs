//! PostgreSQL backend tests. Run with a reachable `DATABASE_URL` and
//! `cargo test -- --ignored`.

use sqlx::PgPool;

use deckhub_core::change::{ChangeOp, ChangeRecord, NewChange, NodeValue, PathSegment};
use deckhub_core::model::{ContentItem, DeckProperties, ItemKind, NewDeck, NewSlide, NodeRef};
use deckhub_db::pg::PgStore;
use deckhub_db::store::{ChangeLogStore, DeckStore, PathResolver, SlideStore};

fn new_deck(title: &str, items: Vec<ContentItem>) -> NewDeck {
    NewDeck {
        title: title.to_string(),
        description: None,
        language: "en".to_string(),
        theme: None,
        content_items: items,
        variants: Vec::new(),
        origin: None,
        parent: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_bootstrap(pool: PgPool) {
    deckhub_db::health_check(&pool).await.unwrap();
    for table in ["decks", "slides", "change_log"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_deck_document_round_trip(pool: PgPool) {
    let store = PgStore::new(pool);
    let slide = store
        .insert_slide(
            NewSlide {
                title: "Intro".to_string(),
                content: "<p>hi</p>".to_string(),
                language: "en".to_string(),
                parent: None,
            },
            1,
        )
        .await
        .unwrap();
    let deck = store
        .insert_deck(
            new_deck("Root", vec![ContentItem::slide(NodeRef::new(slide.id, 1))]),
            1,
        )
        .await
        .unwrap();

    let props = DeckProperties {
        title: Some("Renamed".to_string()),
        ..Default::default()
    };
    let rev = store
        .update_deck_properties(deck.id, props)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rev.title, "Renamed");

    let revised = store.revise_deck(deck.id, None, 2).await.unwrap().unwrap();
    assert_eq!(revised.id, 2);
    assert_eq!(revised.content_items.len(), 1);

    let loaded = store.get_deck(deck.id).await.unwrap().unwrap();
    assert_eq!(loaded.revisions.len(), 2);

    let path = store
        .resolve_path(deck.id, slide.id, ItemKind::Slide)
        .await
        .unwrap();
    assert_eq!(path.last(), Some(&PathSegment::Position { index: 0 }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_change_log_queries(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut change = NewChange::node(
        ChangeOp::Remove,
        vec![
            PathSegment::root(NodeRef::new(3, 2)),
            PathSegment::Position { index: 1 },
        ],
        9,
    );
    change.value = Some(NodeValue::slide(NodeRef::new(44, 1)));
    let record = ChangeRecord::from_new(change, uuid::Uuid::now_v7(), chrono::Utc::now());
    store.insert_changes(&[record.clone()]).await.unwrap();

    assert_eq!(store.list_deck_changes(3).await.unwrap(), vec![record.clone()]);
    assert_eq!(store.get_changes(&[record.id]).await.unwrap(), vec![record.clone()]);
    assert_eq!(store.list_slide_changes(44).await.unwrap(), vec![record]);
    assert_eq!(store.count_changes(NodeRef::new(3, 2)).await.unwrap(), 1);
    assert_eq!(store.count_changes(NodeRef::new(3, 1)).await.unwrap(), 0);
}
