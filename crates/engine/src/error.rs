use deckhub_core::error::CoreError;
use deckhub_db::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// The domain error behind this failure, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(e) | Self::Store(StoreError::Core(e)) => Some(e),
            Self::Store(_) => None,
        }
    }
}
