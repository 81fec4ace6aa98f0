use crate::types::DbId;

/// Domain error taxonomy shared by every layer.
///
/// Lookups that simply find nothing are not errors: they return `None` and the
/// caller decides whether that is a not-found condition.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Structurally invalid input on a write path (dangling reference,
    /// duplicate variant, bad position).
    #[error("Bad data: {0}")]
    BadData(String),

    /// A broken internal assumption, such as a diff operation touching a
    /// field the change tracker does not know about.
    #[error("Internal error: {0}")]
    Internal(String),
}
