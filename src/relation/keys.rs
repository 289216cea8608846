//! Key naming for relations and relation membership.
//!
//! Relation identity, container nesting, endpoint role and unit name are all
//! encoded into flat string keys instead of cross-document references:
//!
//! ```text
//! relation key     "mysql:server wordpress:db"
//! scope string     "r#<relation id>"                       global scope
//!                  "r#<relation id>#<container unit name>"  container scope
//! membership key   "<scope>#<role>#<unit name>"
//! watch prefix     "<scope>#<role>#"
//! ```
//!
//! The membership key addresses both the membership marker and the unit's
//! settings document. The unit name is recovered from the last `#` segment,
//! which is sound because unit names never contain `#`.

use crate::constants::KEY_SEPARATOR;
use crate::constants::SCOPE_PREFIX;
use crate::constants::UNIT_NAME_SEPARATOR;
use crate::RelationEndpoint;
use crate::RelationError;
use crate::RelationRole;
use crate::RelationScope;
use crate::Result;
use crate::Unit;

/// Returns the key of the relation formed by `endpoints`.
///
/// Endpoint string forms are sorted before joining, so the key does not
/// depend on declaration order.
pub fn relation_key(endpoints: &[RelationEndpoint]) -> String {
    let mut names: Vec<String> = endpoints.iter().map(|ep| ep.to_string()).collect();
    names.sort();
    names.join(" ")
}

/// Returns the scope string grouping `unit` with the units it can see in
/// relation `relation_id`.
pub fn scope_string(
    relation_id: u64,
    scope: RelationScope,
    unit: &Unit,
) -> String {
    match scope {
        RelationScope::Global => format!("{SCOPE_PREFIX}{KEY_SEPARATOR}{relation_id}"),
        RelationScope::Container => format!(
            "{SCOPE_PREFIX}{KEY_SEPARATOR}{relation_id}{KEY_SEPARATOR}{}",
            unit.container_name()
        ),
    }
}

pub fn membership_key(
    scope: &str,
    role: RelationRole,
    unit_name: &str,
) -> String {
    format!("{scope}{KEY_SEPARATOR}{role}{KEY_SEPARATOR}{unit_name}")
}

/// Prefix shared by the membership keys of every `role` unit in `scope`.
///
/// Ends with the separator so that scope `r#1` never matches `r#10`.
pub fn watch_prefix(
    scope: &str,
    role: RelationRole,
) -> String {
    format!("{scope}{KEY_SEPARATOR}{role}{KEY_SEPARATOR}")
}

pub fn unit_name_from_key(key: &str) -> &str {
    key.rsplit(KEY_SEPARATOR).next().unwrap_or(key)
}

/// Returns the service part of a `<service>/<number>` unit name.
pub fn service_name(unit_name: &str) -> &str {
    unit_name.split(UNIT_NAME_SEPARATOR).next().unwrap_or(unit_name)
}

/// Checks that `name` is `<service>/<number>` and safe to embed in keys.
pub fn validate_unit_name(name: &str) -> Result<()> {
    let invalid = || -> crate::Error { RelationError::InvalidUnitName(name.to_string()).into() };

    if name.contains(KEY_SEPARATOR) || name.contains(' ') {
        return Err(invalid());
    }
    let Some((service, number)) = name.split_once(UNIT_NAME_SEPARATOR) else {
        return Err(invalid());
    };
    if service.is_empty() || number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok(())
}
