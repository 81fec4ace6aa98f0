//! Slide translations.

use deckhub_core::change::{ChangeOp, ChangeRecord, NewChange, NodeValue, SlideNode};
use deckhub_core::error::CoreError;
use deckhub_core::model::VariantRef;
use deckhub_core::types::DbId;
use deckhub_db::store::DocumentStore;
use deckhub_db::tree;

use crate::changelog;
use crate::error::EngineError;

/// Register `variant` as the translation of `slide_id` inside the tree under
/// `root_id` and record it.
///
/// Returns `Ok(None)` if the slide is not part of the tree. The variant
/// slide revision must exist and its language must not be registered yet.
pub async fn add_slide_translation<S>(
    store: &S,
    root_id: DbId,
    slide_id: DbId,
    variant: VariantRef,
    user: DbId,
) -> Result<Option<ChangeRecord>, EngineError>
where
    S: DocumentStore + ?Sized,
{
    let Some(location) = tree::find_slide_node(store, root_id, slide_id).await? else {
        return Ok(None);
    };

    let exists = store
        .get_slide(variant.id)
        .await?
        .is_some_and(|s| s.revision(variant.revision).is_some());
    if !exists {
        return Err(CoreError::BadData(format!(
            "translation slide {}-{} does not exist",
            variant.id, variant.revision
        ))
        .into());
    }

    if !store
        .add_slide_variant(location.parent.id, slide_id, variant.clone())
        .await?
    {
        return Ok(None);
    }
    store
        .add_slide_usage(variant.node_ref(), location.parent)
        .await?;

    let mut change = NewChange::node(ChangeOp::Add, location.path, user);
    change.value = Some(NodeValue::Slide(SlideNode {
        node: location.item.node,
        title: None,
        variant: Some(variant.clone()),
        variants: Vec::new(),
    }));
    let record = changelog::record(store, vec![change]).await?.into_iter().next();

    tracing::info!(
        slide_id,
        deck_id = location.parent.id,
        language = %variant.language,
        "Added slide translation"
    );
    Ok(record)
}
