//! Entry point of the relation layer.
//!
//! A [`State`] bundles the document store, the configuration and the
//! registry of live scope watchers. It is cheap to clone; every clone
//! shares the same store.

#[cfg(test)]
mod state_test;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::constants::RELATION_SEQUENCE;
use crate::errors::ResultExt;
use crate::metrics::ACTIVE_SCOPE_WATCHERS;
use crate::relation::keys::relation_key;
use crate::relation::RelationDoc;
use crate::Collection;
use crate::Life;
use crate::Relation;
use crate::RelationEndpoint;
use crate::RelationError;
use crate::RelationRole;
use crate::RelationScope;
use crate::Result;
use crate::SledStore;
use crate::StateConfig;
use crate::Store;
use crate::TxnOp;

#[derive(Clone)]
pub struct State {
    inner: Arc<StateInner>,
}

struct StateInner {
    store: Arc<dyn Store>,
    config: StateConfig,
    /// Live watchers by id, with the prefix each one observes
    watchers: DashMap<u64, String>,
    next_watcher_id: AtomicU64,
    /// Parent of every watcher's cancellation token
    shutdown: CancellationToken,
}

impl std::fmt::Debug for State {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("State")
            .field("config", &self.inner.config)
            .field("watchers", &self.inner.watchers.len())
            .finish_non_exhaustive()
    }
}

impl State {
    /// Validates `config` and opens the sled store it describes.
    pub fn open(config: StateConfig) -> Result<Self> {
        let config = config.validate()?;
        let store = SledStore::open(&config.storage)?;
        info!("relation state opened");
        Self::with_store(Arc::new(store), config)
    }

    /// Builds a state over an arbitrary store implementation.
    ///
    /// Fails if `config` does not validate.
    pub fn with_store(
        store: Arc<dyn Store>,
        config: StateConfig,
    ) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            inner: Arc::new(StateInner {
                store,
                config,
                watchers: DashMap::new(),
                next_watcher_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &StateConfig {
        &self.inner.config
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub(crate) fn shared_store(&self) -> Arc<dyn Store> {
        self.inner.store.clone()
    }

    /// Creates a relation between the given endpoints.
    ///
    /// A relation has either a single peer endpoint or two endpoints that
    /// can relate to each other. If either endpoint is container-scoped the
    /// whole relation is stored container-scoped.
    pub fn add_relation(
        &self,
        mut endpoints: Vec<RelationEndpoint>,
    ) -> Result<Relation> {
        let key = relation_key(&endpoints);
        validate_endpoints(&endpoints).context_with(|| format!("cannot add relation {:?}", key))?;

        if endpoints.iter().any(|ep| ep.scope == RelationScope::Container) {
            for ep in endpoints.iter_mut() {
                ep.scope = RelationScope::Container;
            }
        }

        self.insert_relation(key.clone(), endpoints)
            .context_with(|| format!("cannot add relation {:?}", key))
    }

    fn insert_relation(
        &self,
        key: String,
        endpoints: Vec<RelationEndpoint>,
    ) -> Result<Relation> {
        let already_exists = || RelationError::AlreadyExists { relation: key.clone() };

        if self.store().find_by_id(Collection::Relations, &key)?.is_some() {
            return Err(already_exists().into());
        }

        let id = self.store().next_sequence(RELATION_SEQUENCE)?;
        let doc = RelationDoc {
            key: key.clone(),
            id,
            endpoints,
            life: Life::Alive,
        };
        let bytes = bincode::serialize(&doc)?;

        match self.store().run(vec![TxnOp::insert(Collection::Relations, key.as_str(), bytes)]) {
            Ok(()) => {
                info!(relation = %key, id, "relation added");
                Ok(Relation::new(self.clone(), doc))
            }
            Err(e) if e.is_txn_aborted() => Err(already_exists().into()),
            Err(e) => Err(e),
        }
    }

    /// Returns the relation with the given key.
    pub fn relation(
        &self,
        key: &str,
    ) -> Result<Relation> {
        match self.store().find_by_id(Collection::Relations, key)? {
            Some(bytes) => {
                let doc: RelationDoc = bincode::deserialize(&bytes)?;
                Ok(Relation::new(self.clone(), doc))
            }
            None => Err(RelationError::RelationNotFound {
                relation: key.to_string(),
            }
            .into()),
        }
    }

    /// Returns the relation with the given numeric id.
    pub fn relation_by_id(
        &self,
        id: u64,
    ) -> Result<Relation> {
        for key in self.store().scan_prefix(Collection::Relations, "")? {
            let Some(bytes) = self.store().find_by_id(Collection::Relations, &key)? else {
                // removed between scan and lookup
                continue;
            };
            let doc: RelationDoc = bincode::deserialize(&bytes)?;
            if doc.id == id {
                return Ok(Relation::new(self.clone(), doc));
            }
        }
        Err(RelationError::RelationNotFound {
            relation: format!("#{}", id),
        }
        .into())
    }

    /// Cancels every live watcher and closes the store.
    pub fn close(&self) -> Result<()> {
        self.inner.shutdown.cancel();
        self.inner.store.close()?;
        info!("relation state closed");
        Ok(())
    }

    /// Number of watchers that have not been stopped or dropped yet.
    pub fn active_watchers(&self) -> usize {
        self.inner.watchers.len()
    }

    pub(crate) fn register_watcher(
        &self,
        prefix: &str,
    ) -> (u64, CancellationToken) {
        let id = self.inner.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        self.inner.watchers.insert(id, prefix.to_string());
        ACTIVE_SCOPE_WATCHERS.inc();
        debug!(watcher_id = id, %prefix, "scope watcher registered");
        (id, self.inner.shutdown.child_token())
    }

    pub(crate) fn unregister_watcher(
        &self,
        id: u64,
    ) {
        if self.inner.watchers.remove(&id).is_some() {
            ACTIVE_SCOPE_WATCHERS.dec();
            debug!(watcher_id = id, "scope watcher unregistered");
        }
    }
}

fn validate_endpoints(endpoints: &[RelationEndpoint]) -> Result<()> {
    match endpoints {
        [single] => {
            if single.role != RelationRole::Peer {
                return Err(RelationError::InvalidEndpoints(format!(
                    "single endpoint {} must be a peer, not a {}",
                    single, single.role
                ))
                .into());
            }
        }
        [a, b] => {
            if a.service_name == b.service_name {
                return Err(RelationError::InvalidEndpoints(format!(
                    "endpoints {} and {} belong to the same service",
                    a, b
                ))
                .into());
            }
            if !a.can_relate_to(b) {
                return Err(RelationError::InvalidEndpoints(format!("endpoints {} and {} do not relate", a, b)).into());
            }
        }
        other => {
            return Err(RelationError::InvalidEndpoints(format!(
                "expected 1 or 2 endpoints, got {}",
                other.len()
            ))
            .into());
        }
    }
    Ok(())
}
