pub mod field;
pub mod matcher;

pub use field::{fold_text, CanonicalField};
pub use matcher::{FieldMapping, SchemaMapper};
