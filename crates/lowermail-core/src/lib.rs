pub mod domain;
pub mod error;
pub mod policy;
pub mod report;

pub use domain::*;
pub use error::CoreError;
pub use policy::{FlushPolicy, DEFAULT_PAGE_SIZE};
pub use report::MigrationReport;
