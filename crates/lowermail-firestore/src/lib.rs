pub mod auth;
pub mod client;
pub mod collection;
pub mod credentials;
pub mod error;
pub mod wire;

pub use client::FirestoreClient;
pub use collection::{BulkWriter, FirestoreCollection};
pub use credentials::ServiceAccountKey;
pub use error::{FirestoreError, Result};
