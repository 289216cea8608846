use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::keys::scope_string;
use super::RelationUnit;
use crate::life::ensure_life;
use crate::life::Living;
use crate::Collection;
use crate::Life;
use crate::RelationEndpoint;
use crate::RelationError;
use crate::Result;
use crate::State;
use crate::Unit;

/// Persisted form of a relation, keyed by relation key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RelationDoc {
    pub(crate) key: String,
    pub(crate) id: u64,
    pub(crate) endpoints: Vec<RelationEndpoint>,
    pub(crate) life: Life,
}

impl Living for RelationDoc {
    fn life(&self) -> Life {
        self.life
    }

    fn set_life(
        &mut self,
        life: Life,
    ) {
        self.life = life;
    }
}

/// A relation between one peer endpoint or two compatible endpoints.
///
/// The value caches the stored document; [`Relation::refresh`] reloads it.
#[derive(Clone)]
pub struct Relation {
    st: State,
    doc: RelationDoc,
}

impl fmt::Debug for Relation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Relation")
            .field("key", &self.doc.key)
            .field("id", &self.doc.id)
            .field("life", &self.doc.life)
            .finish()
    }
}

impl fmt::Display for Relation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.doc.key)
    }
}

impl Relation {
    pub(crate) fn new(
        st: State,
        doc: RelationDoc,
    ) -> Self {
        Self { st, doc }
    }

    pub fn key(&self) -> &str {
        &self.doc.key
    }

    pub fn id(&self) -> u64 {
        self.doc.id
    }

    /// Life as of the last load or refresh.
    pub fn life(&self) -> Life {
        self.doc.life
    }

    pub fn endpoints(&self) -> &[RelationEndpoint] {
        &self.doc.endpoints
    }

    /// Reloads the relation document.
    pub fn refresh(&mut self) -> Result<()> {
        match self.st.store().find_by_id(Collection::Relations, &self.doc.key)? {
            Some(bytes) => {
                self.doc = bincode::deserialize(&bytes)?;
                Ok(())
            }
            None => Err(self.not_found()),
        }
    }

    /// Moves the relation to Dying; a no-op if it is Dying or Dead already.
    pub fn kill(&mut self) -> Result<()> {
        self.ensure_life(Life::Dying)
    }

    /// Moves the relation to Dead; a no-op if it is Dead already.
    pub fn die(&mut self) -> Result<()> {
        self.ensure_life(Life::Dead)
    }

    fn ensure_life(
        &mut self,
        life: Life,
    ) -> Result<()> {
        match ensure_life::<RelationDoc>(self.st.store(), Collection::Relations, &self.doc.key, life, "relation")? {
            Some(doc) => {
                if doc.life != self.doc.life {
                    info!(relation = %self, life = %doc.life, "relation life changed");
                }
                self.doc = doc;
                Ok(())
            }
            None => Err(self.not_found()),
        }
    }

    /// Returns the endpoint of `service_name` in this relation.
    pub fn endpoint(
        &self,
        service_name: &str,
    ) -> Result<&RelationEndpoint> {
        self.doc
            .endpoints
            .iter()
            .find(|ep| ep.service_name == service_name)
            .ok_or_else(|| {
                RelationError::NotMember {
                    service: service_name.to_string(),
                    relation: self.doc.key.clone(),
                }
                .into()
            })
    }

    /// Returns the endpoints `service_name` can see: every endpoint whose
    /// role is the counterpart of its own.
    pub fn related_endpoints(
        &self,
        service_name: &str,
    ) -> Result<Vec<RelationEndpoint>> {
        let role = self.endpoint(service_name)?.role.counterpart_role();
        let related: Vec<RelationEndpoint> =
            self.doc.endpoints.iter().filter(|ep| ep.role == role).cloned().collect();
        if related.is_empty() {
            return Err(RelationError::NoRelatedEndpoints {
                relation: self.doc.key.clone(),
                service: service_name.to_string(),
            }
            .into());
        }
        Ok(related)
    }

    /// Binds `unit` to this relation.
    pub fn unit(
        &self,
        unit: &Unit,
    ) -> Result<RelationUnit> {
        let endpoint = self.endpoint(unit.service_name())?.clone();
        let scope = scope_string(self.doc.id, endpoint.scope, unit);
        Ok(RelationUnit::new(self.st.clone(), self.clone(), unit.clone(), endpoint, scope))
    }

    fn not_found(&self) -> crate::Error {
        RelationError::RelationNotFound {
            relation: self.doc.key.clone(),
        }
        .into()
    }
}
