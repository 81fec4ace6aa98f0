//! Change-log aggregator.
//!
//! Turns [`NewChange`]s into persisted [`ChangeRecord`]s: node values are
//! enriched with the titles of the revisions they reference (and deck values
//! with the revision's `originRevision`), then every record of the batch is
//! stamped with a time-ordered id and the batch timestamp and appended.

use chrono::Utc;
use uuid::Uuid;

use deckhub_core::change::{ChangeRecord, NewChange, NodeValue};
use deckhub_db::store::DocumentStore;

use crate::error::EngineError;

/// Fill in display data for a node value. Dangling references are left as-is.
async fn enrich<S>(store: &S, value: &mut NodeValue) -> Result<(), EngineError>
where
    S: DocumentStore + ?Sized,
{
    match value {
        NodeValue::Deck(deck) => {
            let Some(doc) = store.get_deck(deck.node.id).await? else {
                return Ok(());
            };
            if let Some(rev) = doc.revision(deck.node.revision) {
                if deck.title.is_none() {
                    deck.title = Some(rev.title.clone());
                }
                deck.origin_revision = rev.origin_revision;
            }
        }
        NodeValue::Slide(slide) => {
            if slide.title.is_some() {
                return Ok(());
            }
            let Some(doc) = store.get_slide(slide.node.id).await? else {
                return Ok(());
            };
            slide.title = doc.revision(slide.node.revision).map(|r| r.title.clone());
        }
    }
    Ok(())
}

/// Enrich and append a batch of changes. Returns the persisted records in
/// input order.
pub async fn record<S>(store: &S, changes: Vec<NewChange>) -> Result<Vec<ChangeRecord>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    if changes.is_empty() {
        return Ok(Vec::new());
    }

    let timestamp = Utc::now();
    let mut records = Vec::with_capacity(changes.len());
    for mut change in changes {
        if let Some(value) = change.value.as_mut() {
            enrich(store, value).await?;
        }
        if let Some(value) = change.old_value.as_mut() {
            enrich(store, value).await?;
        }
        records.push(ChangeRecord::from_new(change, Uuid::now_v7(), timestamp));
    }

    store.insert_changes(&records).await?;
    tracing::info!(
        count = records.len(),
        deck = ?records.first().and_then(ChangeRecord::deck_ref),
        "Recorded changes"
    );
    Ok(records)
}
