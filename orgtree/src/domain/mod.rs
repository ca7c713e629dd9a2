//! Domain layer: entities and tree logic
//!
//! This layer is independent of external concerns (no I/O, no HTTP, no config loading).

pub mod builder;
pub mod entities;
pub mod error;
pub mod expansion;
pub mod form;
pub mod store;

pub use builder::{analyze, build_hierarchy, HierarchyReport};
pub use entities::*;
pub use error::DomainError;
pub use expansion::ExpansionSet;
pub use form::{FormError, FormMode, NodeForm, ValidatedForm};
pub use store::FlatStore;
