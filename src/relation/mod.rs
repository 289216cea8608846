//! Relations between services and the membership of their units.

mod endpoint;
pub mod keys;
#[allow(clippy::module_inception)]
mod relation;
mod relation_unit;
mod scope_watcher;

#[cfg(test)]
mod endpoint_test;
#[cfg(test)]
mod keys_test;

pub use endpoint::*;
pub use relation::Relation;
pub(crate) use relation::RelationDoc;
pub use relation_unit::RelationUnit;
pub use scope_watcher::*;
