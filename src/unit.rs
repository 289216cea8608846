//! Unit identity as seen by the relation layer.
//!
//! Units are owned by the unit/service subsystem; this crate only needs
//! their name, owning service, principal (for subordinates) and private
//! address.

use std::fmt;

use crate::relation::keys;
use crate::RelationError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    name: String,
    service: String,
    principal: Option<String>,
    private_address: Option<String>,
}

impl Unit {
    /// Creates a principal unit from a `<service>/<number>` name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        keys::validate_unit_name(&name)?;
        let service = keys::service_name(&name).to_string();
        Ok(Self {
            name,
            service,
            principal: None,
            private_address: None,
        })
    }

    /// Marks the unit as a subordinate deployed alongside `principal`.
    pub fn with_principal(
        mut self,
        principal: impl Into<String>,
    ) -> Result<Self> {
        let principal = principal.into();
        keys::validate_unit_name(&principal)?;
        self.principal = Some(principal);
        Ok(self)
    }

    pub fn with_private_address(
        mut self,
        address: impl Into<String>,
    ) -> Self {
        self.private_address = Some(address.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn is_principal(&self) -> bool {
        self.principal.is_none()
    }

    /// The container a unit lives in is named after its principal unit.
    pub fn container_name(&self) -> &str {
        self.principal.as_deref().unwrap_or(&self.name)
    }

    /// Returns the address other units use to reach this one.
    pub fn private_address(&self) -> Result<&str> {
        self.private_address
            .as_deref()
            .ok_or_else(|| RelationError::NotFound(format!("private address of unit {:?}", self.name)).into())
    }
}

impl fmt::Display for Unit {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_unit() {
        let unit = Unit::new("wordpress/0").unwrap();
        assert_eq!(unit.service_name(), "wordpress");
        assert!(unit.is_principal());
        assert_eq!(unit.container_name(), "wordpress/0");
    }

    #[test]
    fn test_subordinate_unit_lives_in_principal_container() {
        let unit = Unit::new("logging/3").unwrap().with_principal("wordpress/0").unwrap();
        assert_eq!(unit.principal(), Some("wordpress/0"));
        assert_eq!(unit.container_name(), "wordpress/0");
    }

    #[test]
    fn test_private_address() {
        let unit = Unit::new("mysql/0").unwrap();
        assert!(unit.private_address().unwrap_err().is_not_found());

        let unit = unit.with_private_address("10.0.0.2");
        assert_eq!(unit.private_address().unwrap(), "10.0.0.2");
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        for name in ["mysql", "mysql/", "/0", "my#sql/0", "mysql/x", "mysql/0/1"] {
            assert!(Unit::new(name).is_err(), "{name} should be rejected");
        }
        assert!(Unit::new("logging/0").unwrap().with_principal("bad#name/0").is_err());
    }
}
