use lowermail_core::{CoreError, DocumentId};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("invalid page size: {0}")]
    InvalidPageSize(usize),
    #[error("documents out of order: {next} returned after {previous}")]
    OutOfOrder {
        previous: DocumentId,
        next: DocumentId,
    },
    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: BoxError,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn backend(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Backend {
            context: context.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
