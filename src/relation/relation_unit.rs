use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::keys::membership_key;
use super::keys::service_name;
use super::keys::watch_prefix;
use super::Relation;
use super::RelationScopeWatcher;
use crate::constants::PRIVATE_ADDRESS_KEY;
use crate::errors::ResultExt;
use crate::metrics::MEMBERSHIP_DEPART_METRIC;
use crate::metrics::MEMBERSHIP_JOIN_METRIC;
use crate::Assert;
use crate::Collection;
use crate::Error;
use crate::RelationEndpoint;
use crate::RelationError;
use crate::Result;
use crate::Settings;
use crate::SettingsMap;
use crate::State;
use crate::StorageError;
use crate::SystemError;
use crate::TxnOp;
use crate::Unit;

/// Membership marker. Its existence is the unit's presence in the scope;
/// relation, container, role and unit are all encoded in the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RelationRefDoc {
    pub(crate) key: String,
}

/// A unit's view of a relation it participates in.
pub struct RelationUnit {
    st: State,
    relation: Relation,
    unit: Unit,
    endpoint: RelationEndpoint,
    scope: String,
}

impl fmt::Debug for RelationUnit {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RelationUnit")
            .field("relation", &self.relation.key())
            .field("unit", &self.unit.name())
            .field("scope", &self.scope)
            .finish()
    }
}

impl RelationUnit {
    pub(crate) fn new(
        st: State,
        relation: Relation,
        unit: Unit,
        endpoint: RelationEndpoint,
        scope: String,
    ) -> Self {
        Self {
            st,
            relation,
            unit,
            endpoint,
            scope,
        }
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn endpoint(&self) -> &RelationEndpoint {
        &self.endpoint
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// The scope string grouping this unit with the units it can see.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Identifier of the relation as presented to hooks, `<relation name>:<id>`.
    pub fn relation_ident(&self) -> String {
        format!("{}:{}", self.endpoint.relation_name, self.relation.id())
    }

    /// Publishes the unit's settings and enters the relation scope.
    ///
    /// The settings document always gets `private-address`, and is written
    /// before the membership marker so that a unit is never seen in scope
    /// without settings. Nothing is written if the relation is gone. Fails
    /// with a duplicate membership error if the marker already exists.
    pub fn ensure_join(&self) -> Result<()> {
        self.join().context_with(|| {
            format!(
                "cannot initialize state for unit {:?} in relation {:?}",
                self.unit.name(),
                self.relation.key()
            )
        })
    }

    fn join(&self) -> Result<()> {
        let address = self.unit.private_address()?;
        let key = self.key(self.unit.name())?;
        self.ensure_relation_exists()?;

        let mut node = Settings::new(self.st.shared_store(), key.as_str());
        node.set(PRIVATE_ADDRESS_KEY, address);
        node.write()?;

        let marker = bincode::serialize(&RelationRefDoc { key: key.clone() })?;
        // the relation may still vanish before the batch runs
        let ops = vec![
            TxnOp::assert(Collection::Relations, self.relation.key(), Assert::Exists),
            TxnOp::insert(Collection::RelationRefs, key.as_str(), marker),
        ];
        match self.st.store().run(ops) {
            Ok(()) => {
                MEMBERSHIP_JOIN_METRIC.inc();
                info!(unit = %self.unit, relation = %self.relation, %key, "unit entered relation scope");
                Ok(())
            }
            Err(e) => Err(self.classify_join_abort(e)),
        }
    }

    fn classify_join_abort(
        &self,
        e: Error,
    ) -> Error {
        let aborted_on = match e.root() {
            Error::System(SystemError::Storage(StorageError::TransactionAborted { collection, .. })) => {
                Some(*collection)
            }
            _ => None,
        };
        match aborted_on {
            // the relation assertion is checked before the marker insert
            Some(collection) if collection == Collection::Relations.name() => RelationError::RelationNotFound {
                relation: self.relation.key().to_string(),
            }
            .into(),
            Some(_) => RelationError::DuplicateMembership {
                unit: self.unit.name().to_string(),
                relation: self.relation.key().to_string(),
            }
            .into(),
            None => e,
        }
    }

    /// Leaves the relation scope. A no-op if the unit is not in scope.
    ///
    /// The unit's settings are kept; they outlive the unit for as long as
    /// the relation exists.
    pub fn ensure_depart(&self) -> Result<()> {
        let key = self.key(self.unit.name())?;
        let removed = self.remove_marker(&key).context_with(|| {
            format!(
                "cannot leave scope for unit {:?} in relation {:?}",
                self.unit.name(),
                self.relation.key()
            )
        })?;
        if removed {
            MEMBERSHIP_DEPART_METRIC.inc();
            debug!(unit = %self.unit, relation = %self.relation, %key, "unit left relation scope");
        } else {
            trace!(unit = %self.unit, relation = %self.relation, %key, "unit was not in relation scope");
        }
        Ok(())
    }

    /// Removes the membership marker `key`, returning whether it existed.
    pub(crate) fn remove_marker(
        &self,
        key: &str,
    ) -> Result<bool> {
        let op = TxnOp {
            assert: Assert::Exists,
            ..TxnOp::remove(Collection::RelationRefs, key)
        };
        match self.st.store().run(vec![op]) {
            Ok(()) => Ok(true),
            Err(e) if e.is_txn_aborted() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Watches counterpart units of the same scope joining and departing.
    ///
    /// Must be called within a tokio runtime.
    pub fn watch_scope(&self) -> RelationScopeWatcher {
        let prefix = watch_prefix(&self.scope, self.endpoint.role.counterpart_role());
        RelationScopeWatcher::spawn(self.st.clone(), prefix, self.unit.name().to_string())
    }

    /// A buffered handle on this unit's own settings in the relation.
    pub fn settings(&self) -> Result<Settings> {
        let key = self.key(self.unit.name())?;
        Settings::load(self.st.shared_store(), key)
    }

    /// Reads the settings of any unit of the relation, present or not.
    ///
    /// Fails if the relation no longer exists, if the unit's service is not
    /// part of the relation, or if the unit never published settings.
    pub fn read_settings(
        &self,
        unit_name: &str,
    ) -> Result<SettingsMap> {
        self.read_unit_settings(unit_name).context_with(|| {
            format!(
                "cannot read settings for unit {:?} in relation {:?}",
                unit_name,
                self.relation.key()
            )
        })
    }

    fn read_unit_settings(
        &self,
        unit_name: &str,
    ) -> Result<SettingsMap> {
        let key = self.key(unit_name)?;
        self.ensure_relation_exists()?;
        Settings::fetch(self.st.store(), &key)?
            .ok_or_else(|| RelationError::NotFound(format!("settings for unit {:?}", unit_name)).into())
    }

    fn ensure_relation_exists(&self) -> Result<()> {
        if self.st.store().find_by_id(Collection::Relations, self.relation.key())?.is_none() {
            return Err(RelationError::RelationNotFound {
                relation: self.relation.key().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Membership key of `unit_name` within this unit's scope.
    pub(crate) fn key(
        &self,
        unit_name: &str,
    ) -> Result<String> {
        let ep = self.relation.endpoint(service_name(unit_name))?;
        Ok(membership_key(&self.scope, ep.role, unit_name))
    }
}
