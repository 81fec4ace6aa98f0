//! Shared fixtures for engine tests.

#![allow(dead_code)]

use deckhub_core::model::{ContentItem, Deck, NewDeck, NewSlide, NodeRef, VariantRef};
use deckhub_db::memory::MemoryStore;
use deckhub_db::store::{DeckStore, SlideStore};

pub const USER: i64 = 7;

pub fn new_deck(title: &str, language: &str, items: Vec<ContentItem>) -> NewDeck {
    NewDeck {
        title: title.to_string(),
        description: None,
        language: language.to_string(),
        theme: Some("default".to_string()),
        content_items: items,
        variants: Vec::new(),
        origin: None,
        parent: None,
    }
}

/// Insert a slide and return a reference to its first revision.
pub async fn slide(store: &MemoryStore, title: &str, language: &str) -> NodeRef {
    let slide = store
        .insert_slide(
            NewSlide {
                title: title.to_string(),
                content: format!("<h1>{title}</h1>"),
                language: language.to_string(),
                parent: None,
            },
            USER,
        )
        .await
        .unwrap();
    NodeRef::new(slide.id, 1)
}

pub async fn variant(store: &MemoryStore, title: &str, language: &str) -> VariantRef {
    let node = slide(store, title, language).await;
    VariantRef {
        id: node.id,
        revision: node.revision,
        language: language.to_string(),
    }
}

pub async fn deck(store: &MemoryStore, title: &str, items: Vec<ContentItem>) -> Deck {
    store
        .insert_deck(new_deck(title, "en", items), USER)
        .await
        .unwrap()
}

/// Insert a deck nested under `parent` and add it to the parent's items.
pub async fn subdeck(
    store: &MemoryStore,
    parent: &Deck,
    title: &str,
    items: Vec<ContentItem>,
) -> Deck {
    let parent_ref = parent.latest_ref().unwrap();
    let mut input = new_deck(title, "en", items);
    input.parent = Some(parent_ref);
    let child = store.insert_deck(input, USER).await.unwrap();

    let current = store.get_deck(parent.id).await.unwrap().unwrap();
    let mut parent_items = current.latest_revision().unwrap().content_items.clone();
    parent_items.push(ContentItem::deck(NodeRef::new(child.id, 1)));
    store
        .update_content_items(parent.id, parent_items)
        .await
        .unwrap();
    child
}

pub async fn reload(store: &MemoryStore, id: i64) -> Deck {
    store.get_deck(id).await.unwrap().unwrap()
}
