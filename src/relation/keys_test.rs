use super::keys::*;
use super::*;
use crate::RelationError;
use crate::Unit;

fn endpoint(
    service: &str,
    relation: &str,
    role: RelationRole,
) -> RelationEndpoint {
    RelationEndpoint::new(service, "mysql", relation, role, RelationScope::Global)
}

#[test]
fn test_relation_key_is_order_independent() {
    let db = endpoint("wordpress", "db", RelationRole::Requirer);
    let server = endpoint("mysql", "server", RelationRole::Provider);

    let forward = relation_key(&[db.clone(), server.clone()]);
    let backward = relation_key(&[server, db]);

    assert_eq!(forward, "mysql:server wordpress:db");
    assert_eq!(forward, backward);
}

#[test]
fn test_relation_key_single_peer_endpoint() {
    let ring = endpoint("riak", "ring", RelationRole::Peer);
    assert_eq!(relation_key(&[ring]), "riak:ring");
}

#[test]
fn test_scope_string_global_ignores_container() {
    let principal = Unit::new("wordpress/0").unwrap();
    let subordinate = Unit::new("logging/1").unwrap().with_principal("wordpress/0").unwrap();

    assert_eq!(scope_string(7, RelationScope::Global, &principal), "r#7");
    assert_eq!(scope_string(7, RelationScope::Global, &subordinate), "r#7");
}

#[test]
fn test_scope_string_container_uses_principal() {
    let principal = Unit::new("wordpress/0").unwrap();
    let sub_a = Unit::new("logging/1").unwrap().with_principal("wordpress/0").unwrap();
    let sub_b = Unit::new("monitor/4").unwrap().with_principal("wordpress/0").unwrap();
    let sub_other = Unit::new("logging/2").unwrap().with_principal("wordpress/1").unwrap();

    assert_eq!(
        scope_string(3, RelationScope::Container, &principal),
        "r#3#wordpress/0"
    );
    assert_eq!(scope_string(3, RelationScope::Container, &sub_a), "r#3#wordpress/0");
    assert_eq!(
        scope_string(3, RelationScope::Container, &sub_a),
        scope_string(3, RelationScope::Container, &sub_b)
    );
    assert_ne!(
        scope_string(3, RelationScope::Container, &sub_a),
        scope_string(3, RelationScope::Container, &sub_other)
    );
}

#[test]
fn test_membership_key_for_every_role() {
    assert_eq!(
        membership_key("r#0", RelationRole::Provider, "mysql/0"),
        "r#0#provider#mysql/0"
    );
    assert_eq!(
        membership_key("r#0", RelationRole::Requirer, "wordpress/2"),
        "r#0#requirer#wordpress/2"
    );
    assert_eq!(
        membership_key("r#5#wordpress/0", RelationRole::Peer, "logging/1"),
        "r#5#wordpress/0#peer#logging/1"
    );
}

#[test]
fn test_watch_prefix_matches_only_its_scope_and_role() {
    let prefix = watch_prefix("r#1", RelationRole::Provider);
    assert_eq!(prefix, "r#1#provider#");

    assert!(membership_key("r#1", RelationRole::Provider, "mysql/0").starts_with(&prefix));
    assert!(!membership_key("r#10", RelationRole::Provider, "mysql/0").starts_with(&prefix));
    assert!(!membership_key("r#1", RelationRole::Requirer, "wordpress/0").starts_with(&prefix));
    assert!(!membership_key("r#1#mysql/0", RelationRole::Provider, "mysql/0").starts_with(&prefix));
}

#[test]
fn test_unit_name_from_key() {
    assert_eq!(unit_name_from_key("r#0#provider#mysql/0"), "mysql/0");
    assert_eq!(unit_name_from_key("r#3#wordpress/0#requirer#logging/1"), "logging/1");

    let key = membership_key("r#9#wordpress/0", RelationRole::Peer, "logging/7");
    assert_eq!(unit_name_from_key(&key), "logging/7");
}

#[test]
fn test_service_name() {
    assert_eq!(service_name("wordpress/0"), "wordpress");
    assert_eq!(service_name("my-service/12"), "my-service");
}

#[test]
fn test_validate_unit_name() {
    assert!(validate_unit_name("wordpress/0").is_ok());
    assert!(validate_unit_name("my-service/123").is_ok());

    for name in ["", "wordpress", "wordpress/", "/0", "word#press/0", "wordpress/a", "word press/0"] {
        let err = validate_unit_name(name).unwrap_err();
        assert!(
            matches!(err, crate::Error::Relation(RelationError::InvalidUnitName(_))),
            "{name:?}"
        );
    }
}
