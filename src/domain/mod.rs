//! Domain layer: the business object model core
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod error;
pub mod factory;
pub mod node;
pub mod relation;
pub mod root;
pub mod store;
pub mod walker;

pub use error::{DomainError, DomainResult};
pub use factory::{Handle, ObjectFactory, Pool};
pub use node::{BomKey, BomNode, BomObject, Field, FieldReader, FieldWriter, NodeRef};
pub use relation::RelationIndex;
pub use root::{BomRoot, ROOT_KEY};
pub use store::BomStore;
