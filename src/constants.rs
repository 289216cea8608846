// -
// Database namespaces

/// Sled tree holding relation documents, keyed by relation key
pub(crate) const RELATIONS_TREE: &str = "relations";
/// Sled tree holding membership markers, keyed by membership key
pub(crate) const RELATION_REFS_TREE: &str = "relation_refs";
/// Sled tree holding per-unit relation settings, keyed by membership key
pub(crate) const SETTINGS_TREE: &str = "settings";
/// Sled tree holding monotonic id sequences
pub(crate) const SEQUENCES_TREE: &str = "sequences";

/// Sequence used to allocate relation ids
pub(crate) const RELATION_SEQUENCE: &str = "relation";

// -
// Key naming

/// Separator between the segments of scope strings and membership keys
pub const KEY_SEPARATOR: char = '#';
/// Separator between service name and unit number in a unit name
pub const UNIT_NAME_SEPARATOR: char = '/';
/// Leading segment of every scope string
pub(crate) const SCOPE_PREFIX: &str = "r";

/// Settings key every joined unit publishes
pub const PRIVATE_ADDRESS_KEY: &str = "private-address";

/// Upper bound on compare-and-swap retries for a single read-modify-write
pub(crate) const MAX_TXN_ATTEMPTS: usize = 8;
