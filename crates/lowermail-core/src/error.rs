use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("document id is required")]
    EmptyDocumentId,
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
    #[error("invalid flush policy: {0}")]
    InvalidFlushPolicy(String),
}
