pub mod collection;
pub mod error;
pub mod memory;
pub mod migrator;
pub mod pages;

pub use collection::{DocumentSource, FlushReport, PendingUpdate, WriteBuffer, WriteFailure};
pub use error::{Result, StoreError};
pub use memory::{MemoryCollection, MemoryWriter};
pub use migrator::{MigrationOptions, Migrator};
pub use pages::Pages;
