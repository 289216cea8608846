use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::RelationError;

/// The role of a relation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationRole {
    Provider,
    Requirer,
    Peer,
}

impl RelationRole {
    /// Returns the role this role can relate to.
    ///
    /// Kept crate-internal: the relation model does not guarantee that every
    /// future role has a single counterpart that algorithms could rely on.
    pub(crate) fn counterpart_role(self) -> RelationRole {
        match self {
            RelationRole::Provider => RelationRole::Requirer,
            RelationRole::Requirer => RelationRole::Provider,
            RelationRole::Peer => RelationRole::Peer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationRole::Provider => "provider",
            RelationRole::Requirer => "requirer",
            RelationRole::Peer => "peer",
        }
    }
}

impl fmt::Display for RelationRole {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider" => Ok(RelationRole::Provider),
            "requirer" => Ok(RelationRole::Requirer),
            "peer" => Ok(RelationRole::Peer),
            other => Err(RelationError::UnknownRole(other.to_string()).into()),
        }
    }
}

/// Whether a relation applies to every unit of the services or only to
/// units sharing a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationScope {
    #[default]
    Global,
    Container,
}

impl RelationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationScope::Global => "global",
            RelationScope::Container => "container",
        }
    }
}

impl fmt::Display for RelationScope {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(RelationScope::Global),
            "container" => Ok(RelationScope::Container),
            other => Err(RelationError::UnknownScope(other.to_string()).into()),
        }
    }
}

/// One endpoint of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEndpoint {
    pub service_name: String,
    pub interface: String,
    pub relation_name: String,
    pub role: RelationRole,
    pub scope: RelationScope,
}

impl RelationEndpoint {
    pub fn new(
        service_name: impl Into<String>,
        interface: impl Into<String>,
        relation_name: impl Into<String>,
        role: RelationRole,
        scope: RelationScope,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            interface: interface.into(),
            relation_name: relation_name.into(),
            role,
            scope,
        }
    }

    /// Returns whether a relation may be established between `self` and `other`.
    pub fn can_relate_to(
        &self,
        other: &RelationEndpoint,
    ) -> bool {
        if self.interface != other.interface {
            return false;
        }
        if self.role == RelationRole::Peer {
            // Peer relations do not work with multiple endpoints.
            return false;
        }
        self.role.counterpart_role() == other.role
    }
}

/// The unique identifier of the endpoint: `service:relation`.
impl fmt::Display for RelationEndpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.service_name, self.relation_name)
    }
}
