// Field engine - typed declarations, defaults and per-instance coercion
//
// Classes declare fields into a FieldSchema (inheriting the parent's entries);
// each operation instance owns a FieldStore that coerces caller input lazily
// and remembers which keys were actually supplied.

pub mod declaration;
pub mod schema;
pub mod store;

pub use declaration::{DefaultProducer, DefaultValue, FieldDeclaration, FieldOptions};
pub use schema::{FieldConfig, FieldSchema};
pub use store::FieldStore;
