//! Metadata-driven module configuration.
//!
//! Modules declare a record type with an annotated field table and register
//! a [`Spec`] for it. The [`Registry`] compiles each spec once; the [`Store`]
//! then loads, saves and form-parses records generically, and a [`Loader`]
//! gives a module typed access to its own record.

mod compile;
pub mod error;
pub mod form;
pub mod loader;
pub mod registry;
pub mod schema;
pub mod spec;
pub mod store;
pub mod value;

#[cfg(test)]
mod tests;

pub use error::{ConfigError, ConfigResult};
pub use form::FormData;
pub use loader::Loader;
pub use registry::Registry;
pub use schema::{ConfigItem, ConfigRecord, ItemSchema, RecordSchema, RecordType};
pub use spec::{
    ArrayField, ArrayFieldDef, Field, FieldOption, FieldType, ParsedSpec, Section, SectionDef, Spec,
};
pub use store::{AnyConfig, Snapshot, Store};
pub use value::{Value, ValueKind};
