pub mod document;
pub mod email;
pub mod ids;
pub mod value;

pub use document::Document;
pub use email::{inspect_email, normalize_email, EmailCheck, EMAIL_FIELD};
pub use ids::DocumentId;
pub use value::FieldValue;
