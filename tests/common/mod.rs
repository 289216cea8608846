use std::time::Duration;

use relscope::RelationEndpoint;
use relscope::RelationRole;
use relscope::RelationScope;
use relscope::RelationScopeWatcher;
use relscope::ScopeEvent;
use relscope::State;
use relscope::StateConfig;
use relscope::StorageConfig;
use relscope::Unit;
use relscope::WatcherConfig;
use tokio::time::timeout;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
pub const QUIET_PERIOD: Duration = Duration::from_millis(80);

pub fn open_state() -> State {
    let config = StateConfig {
        storage: StorageConfig {
            temporary: true,
            ..Default::default()
        },
        watcher: WatcherConfig {
            poll_interval_ms: 5,
            ..Default::default()
        },
    };
    State::open(config).expect("open temporary state")
}

pub fn wordpress_db() -> RelationEndpoint {
    RelationEndpoint::new("wordpress", "mysql", "db", RelationRole::Requirer, RelationScope::Global)
}

pub fn mysql_server() -> RelationEndpoint {
    RelationEndpoint::new("mysql", "mysql", "server", RelationRole::Provider, RelationScope::Global)
}

pub fn unit(name: &str) -> Unit {
    let n = name.rsplit('/').next().unwrap_or("0");
    Unit::new(name)
        .expect("valid unit name")
        .with_private_address(format!("192.168.1.{}", n))
}

pub async fn next_event(watcher: &mut RelationScopeWatcher) -> ScopeEvent {
    timeout(EVENT_TIMEOUT, watcher.next())
        .await
        .expect("no scope event in time")
        .expect("watcher closed")
}

pub async fn assert_quiet(watcher: &mut RelationScopeWatcher) {
    let res = timeout(QUIET_PERIOD, watcher.next()).await;
    assert!(res.is_err(), "unexpected scope event: {:?}", res);
}
