use std::sync::Arc;

use tempfile::tempdir;

use super::*;
use crate::test_utils::endpoint;
use crate::test_utils::temporary_config;
use crate::test_utils::temporary_state;
use crate::test_utils::temporary_store;
use crate::test_utils::wordpress_mysql;
use crate::Error;
use crate::MockStore;
use crate::StorageError;

fn is_invalid_endpoints(e: &Error) -> bool {
    matches!(e.root(), Error::Relation(RelationError::InvalidEndpoints(_)))
}

#[test]
fn test_add_relation_assigns_sequential_ids() {
    let st = temporary_state();
    let (db, server) = wordpress_mysql();
    let first = st.add_relation(vec![db, server]).unwrap();
    let ring = endpoint("riak", "riak", "ring", RelationRole::Peer, RelationScope::Global);
    let second = st.add_relation(vec![ring]).unwrap();

    assert_eq!(first.id(), 0);
    assert_eq!(second.id(), 1);
    assert_eq!(first.life(), Life::Alive);
}

#[test]
fn test_relation_lookup_is_order_independent() {
    let st = temporary_state();
    let (db, server) = wordpress_mysql();
    let added = st.add_relation(vec![server.clone(), db.clone()]).unwrap();

    let by_key = st.relation(&relation_key(&[db, server])).unwrap();
    assert_eq!(by_key.id(), added.id());
    assert_eq!(by_key.key(), "mysql:server wordpress:db");

    let by_id = st.relation_by_id(added.id()).unwrap();
    assert_eq!(by_id.key(), added.key());
}

#[test]
fn test_missing_relation_is_not_found() {
    let st = temporary_state();
    assert!(st.relation("mysql:server wordpress:db").unwrap_err().is_relation_not_found());
    assert!(st.relation_by_id(42).unwrap_err().is_relation_not_found());
}

#[test]
fn test_add_relation_twice_already_exists() {
    let st = temporary_state();
    let (db, server) = wordpress_mysql();
    st.add_relation(vec![db.clone(), server.clone()]).unwrap();

    let err = st.add_relation(vec![server, db]).unwrap_err();
    assert!(matches!(
        err.root(),
        Error::Relation(RelationError::AlreadyExists { .. })
    ));
}

#[test]
fn test_add_relation_rejects_invalid_endpoints() {
    let st = temporary_state();
    let (db, server) = wordpress_mysql();

    // no endpoints
    assert!(is_invalid_endpoints(&st.add_relation(vec![]).unwrap_err()));
    // a lone non-peer endpoint
    assert!(is_invalid_endpoints(&st.add_relation(vec![db.clone()]).unwrap_err()));
    // two requirers
    let other_db = endpoint("drupal", "mysql", "db", RelationRole::Requirer, RelationScope::Global);
    assert!(is_invalid_endpoints(&st.add_relation(vec![db.clone(), other_db]).unwrap_err()));
    // interface mismatch
    let cache = endpoint("memcached", "memcache", "cache", RelationRole::Provider, RelationScope::Global);
    assert!(is_invalid_endpoints(&st.add_relation(vec![db.clone(), cache]).unwrap_err()));
    // peers never pair up
    let ring_a = endpoint("riak", "riak", "ring", RelationRole::Peer, RelationScope::Global);
    let ring_b = endpoint("riak2", "riak", "ring", RelationRole::Peer, RelationScope::Global);
    assert!(is_invalid_endpoints(&st.add_relation(vec![ring_a, ring_b]).unwrap_err()));
    // three endpoints
    let third = endpoint("haproxy", "mysql", "db", RelationRole::Requirer, RelationScope::Global);
    assert!(is_invalid_endpoints(
        &st.add_relation(vec![db, server, third]).unwrap_err()
    ));
}

#[test]
fn test_add_relation_propagates_store_failure() {
    let mut store = MockStore::new();
    store
        .expect_find_by_id()
        .returning(|_, _| Err(StorageError::DbError("io".into()).into()));

    let st = State::with_store(Arc::new(store), temporary_config()).unwrap();
    let (db, server) = wordpress_mysql();
    let err = st.add_relation(vec![db, server]).unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("cannot add relation"));
}

#[test]
fn test_open_persists_relations_across_restarts() {
    let dir = tempdir().unwrap();
    let mut config = temporary_config();
    config.storage.temporary = false;
    config.storage.db_root_dir = dir.path().join("db");

    let key = {
        let st = State::open(config.clone()).unwrap();
        let (db, server) = wordpress_mysql();
        let rel = st.add_relation(vec![db, server]).unwrap();
        st.close().unwrap();
        rel.key().to_string()
    };

    let st = State::open(config).unwrap();
    let rel = st.relation(&key).unwrap();
    assert_eq!(rel.id(), 0);
    // ids keep counting after a restart
    let ring = endpoint("riak", "riak", "ring", RelationRole::Peer, RelationScope::Global);
    assert_eq!(st.add_relation(vec![ring]).unwrap().id(), 1);
}

#[test]
fn test_open_rejects_invalid_config() {
    let mut config = temporary_config();
    config.watcher.poll_interval_ms = 0;
    assert!(matches!(State::open(config).unwrap_err(), Error::Config(_)));
}

#[test]
fn test_with_store_rejects_invalid_watcher_config() {
    let mut config = temporary_config();
    config.watcher.event_buffer_size = 0;
    let err = State::with_store(Arc::new(temporary_store()), config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let mut config = temporary_config();
    config.watcher.poll_interval_ms = 0;
    let err = State::with_store(Arc::new(temporary_store()), config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_state_is_debug() {
    let st = temporary_state();
    let text = format!("{:?}", st);
    assert!(text.contains("State"));
}
