//! History service: loads a persisted log and presents it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use deckhub_core::change::ChangeRecord;
use deckhub_core::history;
use deckhub_core::simplify::{simplify, SimplifiedChange};
use deckhub_core::types::DbId;
use deckhub_db::store::DocumentStore;

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    /// Present slide values in this language where a variant exists.
    pub language: Option<String>,
    /// Render one-line summaries instead of records.
    pub simplify: bool,
}

/// Presented history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum History {
    Records(Vec<ChangeRecord>),
    Simplified(Vec<SimplifiedChange>),
}

impl History {
    pub fn len(&self) -> usize {
        match self {
            Self::Records(r) => r.len(),
            Self::Simplified(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn present(
    records: Vec<ChangeRecord>,
    options: &HistoryOptions,
    reverted_parents: &HashSet<Uuid>,
) -> History {
    let presented =
        history::present_with(records, options.language.as_deref(), reverted_parents);
    if options.simplify {
        History::Simplified(simplify(&presented))
    } else {
        History::Records(presented)
    }
}

/// History of every change whose path passes through `deck_id`.
pub async fn deck_history<S>(
    store: &S,
    deck_id: DbId,
    options: &HistoryOptions,
) -> Result<History, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let records = store.list_deck_changes(deck_id).await?;
    tracing::debug!(deck_id, count = records.len(), "Presenting deck history");
    Ok(present(records, options, &HashSet::new()))
}

/// Deck-level reverts that records of `records` descend from but that are
/// not part of `records` themselves.
async fn outside_reverts<S>(
    store: &S,
    records: &[ChangeRecord],
) -> Result<HashSet<Uuid>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let known: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
    let mut missing: Vec<Uuid> = records
        .iter()
        .flat_map(|r| r.parents.iter().copied())
        .filter(|id| !known.contains(id))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    if missing.is_empty() {
        return Ok(HashSet::new());
    }
    let parents = store.get_changes(&missing).await?;
    Ok(history::deck_reverts(parents))
}

/// History of every change that references `slide_id`.
pub async fn slide_history<S>(
    store: &S,
    slide_id: DbId,
    options: &HistoryOptions,
) -> Result<History, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let records = store.list_slide_changes(slide_id).await?;
    let reverted = outside_reverts(store, &records).await?;
    tracing::debug!(
        slide_id,
        count = records.len(),
        reverted_parents = reverted.len(),
        "Presenting slide history"
    );
    Ok(present(records, options, &reverted))
}
