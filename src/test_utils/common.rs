use std::sync::Arc;

use crate::RelationEndpoint;
use crate::RelationRole;
use crate::RelationScope;
use crate::SledStore;
use crate::State;
use crate::StateConfig;
use crate::StorageConfig;
use crate::Unit;
use crate::WatcherConfig;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Poll interval used by watchers in tests
pub(crate) const TEST_POLL_INTERVAL_MS: u64 = 5;

pub(crate) fn temporary_config() -> StateConfig {
    StateConfig {
        storage: StorageConfig {
            temporary: true,
            ..Default::default()
        },
        watcher: WatcherConfig {
            poll_interval_ms: TEST_POLL_INTERVAL_MS,
            ..Default::default()
        },
    }
}

/// A sled store living in memory, removed on drop.
pub(crate) fn temporary_store() -> SledStore {
    SledStore::open(&temporary_config().storage).expect("open temporary sled store")
}

pub(crate) fn temporary_state() -> State {
    State::with_store(Arc::new(temporary_store()), temporary_config()).expect("temporary state")
}

pub(crate) fn endpoint(
    service: &str,
    interface: &str,
    relation: &str,
    role: RelationRole,
    scope: RelationScope,
) -> RelationEndpoint {
    RelationEndpoint::new(service, interface, relation, role, scope)
}

/// `wordpress:db` requires `mysql:server` over the `mysql` interface.
pub(crate) fn wordpress_mysql() -> (RelationEndpoint, RelationEndpoint) {
    (
        endpoint("wordpress", "mysql", "db", RelationRole::Requirer, RelationScope::Global),
        endpoint("mysql", "mysql", "server", RelationRole::Provider, RelationScope::Global),
    )
}

/// Unit `name` reachable at `10.0.0.<n>`, `n` being its unit number.
pub(crate) fn unit(name: &str) -> Unit {
    let n = name.rsplit('/').next().unwrap_or("0");
    Unit::new(name).unwrap().with_private_address(format!("10.0.0.{}", n))
}
