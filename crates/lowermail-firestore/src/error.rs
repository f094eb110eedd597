use lowermail_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("token exchange failed: {0}")]
    Auth(String),
    #[error("firestore api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, FirestoreError>;
