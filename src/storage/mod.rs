//! Document store
//!
//! The relation layer never locks. Every mutual-exclusion guarantee it
//! offers is delegated to [`Store::run`], which applies a batch of
//! per-document operations all-or-nothing:
//! - an insert succeeds only if the document is absent,
//! - an assertion that does not hold aborts the whole batch,
//! - a remove of an absent document is a no-op.

mod sled_store;


pub use sled_store::*;

#[cfg(test)]
use mockall::automock;

use crate::constants::RELATIONS_TREE;
use crate::constants::RELATION_REFS_TREE;
use crate::constants::SETTINGS_TREE;
use crate::Result;

/// Document collections used by the relation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Relation documents, keyed by relation key
    Relations,
    /// Membership markers, keyed by membership key
    RelationRefs,
    /// Unit relation settings, keyed by membership key
    Settings,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Relations => RELATIONS_TREE,
            Collection::RelationRefs => RELATION_REFS_TREE,
            Collection::Settings => SETTINGS_TREE,
        }
    }
}

/// Precondition checked against a document before its action is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assert {
    /// No precondition
    Any,
    /// The document must not exist
    Missing,
    /// The document must exist
    Exists,
    /// The document must exist with exactly these bytes (compare-and-swap)
    Equals(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Only check the assertion
    None,
    /// Create the document; aborts if it already exists
    Insert(Vec<u8>),
    /// Create or overwrite the document
    Replace(Vec<u8>),
    /// Delete the document if present
    Remove,
}

/// One document operation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnOp {
    pub collection: Collection,
    pub id: String,
    pub assert: Assert,
    pub action: Action,
}

impl TxnOp {
    pub fn insert(
        collection: Collection,
        id: impl Into<String>,
        doc: Vec<u8>,
    ) -> Self {
        Self {
            collection,
            id: id.into(),
            assert: Assert::Missing,
            action: Action::Insert(doc),
        }
    }

    pub fn remove(
        collection: Collection,
        id: impl Into<String>,
    ) -> Self {
        Self {
            collection,
            id: id.into(),
            assert: Assert::Any,
            action: Action::Remove,
        }
    }

    /// Writes `doc` only if the stored document still equals `expected`
    /// (`None` meaning the document must still be absent).
    pub fn compare_and_swap(
        collection: Collection,
        id: impl Into<String>,
        expected: Option<Vec<u8>>,
        doc: Vec<u8>,
    ) -> Self {
        let assert = match expected {
            Some(bytes) => Assert::Equals(bytes),
            None => Assert::Missing,
        };
        Self {
            collection,
            id: id.into(),
            assert,
            action: Action::Replace(doc),
        }
    }

    pub fn assert(
        collection: Collection,
        id: impl Into<String>,
        assert: Assert,
    ) -> Self {
        Self {
            collection,
            id: id.into(),
            assert,
            action: Action::None,
        }
    }
}

/// The store interface consumed by the relation layer
#[cfg_attr(test, automock)]
pub trait Store: Send + Sync + 'static {
    /// Looks up a document by id; `Ok(None)` when absent.
    fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Vec<u8>>>;

    /// Applies `ops` all-or-nothing.
    ///
    /// Returns `StorageError::TransactionAborted` naming the first operation
    /// whose assertion failed; nothing is written in that case.
    fn run(
        &self,
        ops: Vec<TxnOp>,
    ) -> Result<()>;

    /// Returns the ids in `collection` starting with `prefix`, in key order.
    fn scan_prefix(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<String>>;

    /// Atomically allocates the next value of the named sequence, starting at 0.
    fn next_sequence(
        &self,
        name: &str,
    ) -> Result<u64>;

    fn flush(&self) -> Result<()>;

    /// Flushes and refuses further requests.
    fn close(&self) -> Result<()>;
}
