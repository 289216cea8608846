//! Sled-backed document store.
//!
//! One tree per [`Collection`], plus a tree of sequences. Batches are applied
//! inside a single multi-tree sled transaction, so assertions and writes of
//! one batch are observed atomically by every other caller.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use sled::transaction::abort;
use sled::transaction::ConflictableTransactionResult;
use sled::transaction::TransactionError;
use sled::transaction::TransactionalTree;
use sled::Transactional;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Action;
use super::Assert;
use super::Collection;
use super::Store;
use super::TxnOp;
use crate::config::StorageConfig;
use crate::constants::RELATIONS_TREE;
use crate::constants::RELATION_REFS_TREE;
use crate::constants::SEQUENCES_TREE;
use crate::constants::SETTINGS_TREE;
use crate::Error;
use crate::Result;
use crate::StorageError;

/// The operation whose assertion failed inside a transaction
#[derive(Debug)]
struct Aborted {
    collection: &'static str,
    id: String,
}

pub struct SledStore {
    db: sled::Db,
    relations: sled::Tree,
    relation_refs: sled::Tree,
    settings: sled::Tree,
    sequences: sled::Tree,
    closed: AtomicBool,
}

impl std::fmt::Debug for SledStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("relations_len", &self.relations.len())
            .field("relation_refs_len", &self.relation_refs.len())
            .field("settings_len", &self.settings.len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl SledStore {
    /// Opens (or creates) the database described by `config`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        debug!("open sled store with config: {:?}", config);

        let mut sled_config = sled::Config::default()
            .cache_capacity(config.cache_capacity_bytes)
            .flush_every_ms(config.flush_every_ms)
            .use_compression(config.use_compression)
            .compression_factor(1);

        sled_config = if config.temporary {
            sled_config.temporary(true)
        } else {
            sled_config.path(&config.db_root_dir)
        };

        let db = sled_config.open().map_err(|e| {
            warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                config.db_root_dir, e
            );
            StorageError::IoError(std::io::Error::other(e))
        })?;

        Self::from_db(db)
    }

    /// Builds the store on top of an already opened database.
    pub fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            relations: db.open_tree(RELATIONS_TREE)?,
            relation_refs: db.open_tree(RELATION_REFS_TREE)?,
            settings: db.open_tree(SETTINGS_TREE)?,
            sequences: db.open_tree(SEQUENCES_TREE)?,
            db,
            closed: AtomicBool::new(false),
        })
    }

    fn tree(
        &self,
        collection: Collection,
    ) -> &sled::Tree {
        match collection {
            Collection::Relations => &self.relations,
            Collection::RelationRefs => &self.relation_refs,
            Collection::Settings => &self.settings,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("store has been closed".into()).into());
        }
        Ok(())
    }
}

impl Store for SledStore {
    fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        match self.tree(collection).get(id.as_bytes()) {
            Ok(Some(v)) => Ok(Some(v.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("{} get error: {}", collection.name(), e);
                Err(StorageError::DbError(e.to_string()).into())
            }
        }
    }

    fn run(
        &self,
        ops: Vec<TxnOp>,
    ) -> Result<()> {
        self.ensure_open()?;
        if ops.is_empty() {
            return Ok(());
        }

        let result = (&self.relations, &self.relation_refs, &self.settings).transaction(
            |(relations, relation_refs, settings)| {
                for op in &ops {
                    let tree = pick(op.collection, relations, relation_refs, settings);
                    apply_op(tree, op)?;
                }
                Ok(())
            },
        );

        match result {
            Ok(()) => {
                trace!(ops = ops.len(), "transaction applied");
                Ok(())
            }
            Err(TransactionError::Abort(Aborted { collection, id })) => {
                debug!(%collection, %id, "transaction aborted");
                Err(StorageError::TransactionAborted { collection, id }.into())
            }
            Err(TransactionError::Storage(e)) => {
                error!("transaction storage failure: {}", e);
                Err(e.into())
            }
        }
    }

    fn scan_prefix(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut ids = Vec::new();
        for item in self.tree(collection).scan_prefix(prefix.as_bytes()) {
            let (k, _v) = item?;
            let id = String::from_utf8(k.to_vec())
                .map_err(|e| Error::Fatal(format!("non utf-8 id in {}: {}", collection.name(), e)))?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn next_sequence(
        &self,
        name: &str,
    ) -> Result<u64> {
        self.ensure_open()?;
        let updated = self.sequences.update_and_fetch(name.as_bytes(), |old| {
            let next = match old.and_then(decode_sequence) {
                Some(current) => current + 1,
                None => 0,
            };
            Some(next.to_be_bytes().to_vec())
        })?;

        updated
            .as_deref()
            .and_then(decode_sequence)
            .ok_or_else(|| Error::Fatal(format!("sequence {:?} holds an invalid value", name)))
    }

    fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        let bytes = self.db.flush()?;
        debug!("Successfully flushed sled store, bytes flushed: {}", bytes);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let bytes = self.db.flush()?;
        info!("sled store closed, bytes flushed: {}", bytes);
        Ok(())
    }
}

fn pick<'a>(
    collection: Collection,
    relations: &'a TransactionalTree,
    relation_refs: &'a TransactionalTree,
    settings: &'a TransactionalTree,
) -> &'a TransactionalTree {
    match collection {
        Collection::Relations => relations,
        Collection::RelationRefs => relation_refs,
        Collection::Settings => settings,
    }
}

fn apply_op(
    tree: &TransactionalTree,
    op: &TxnOp,
) -> ConflictableTransactionResult<(), Aborted> {
    let current = tree.get(op.id.as_bytes())?;

    let holds = match &op.assert {
        Assert::Any => true,
        Assert::Missing => current.is_none(),
        Assert::Exists => current.is_some(),
        Assert::Equals(expected) => current.as_deref() == Some(expected.as_slice()),
    };
    // inserting over an existing document never succeeds
    let holds = holds && !(matches!(op.action, Action::Insert(_)) && current.is_some());

    if !holds {
        return abort(Aborted {
            collection: op.collection.name(),
            id: op.id.clone(),
        });
    }

    match &op.action {
        Action::None => {}
        Action::Insert(doc) | Action::Replace(doc) => {
            tree.insert(op.id.as_bytes(), doc.as_slice())?;
        }
        Action::Remove => {
            tree.remove(op.id.as_bytes())?;
        }
    }
    Ok(())
}

fn decode_sequence(bytes: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
}
