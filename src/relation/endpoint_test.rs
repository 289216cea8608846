use super::*;
use crate::Error;
use crate::RelationError;

fn ep(
    service: &str,
    interface: &str,
    role: RelationRole,
) -> RelationEndpoint {
    RelationEndpoint::new(service, interface, "rel", role, RelationScope::Global)
}

#[test]
fn test_counterpart_role() {
    assert_eq!(RelationRole::Provider.counterpart_role(), RelationRole::Requirer);
    assert_eq!(RelationRole::Requirer.counterpart_role(), RelationRole::Provider);
    assert_eq!(RelationRole::Peer.counterpart_role(), RelationRole::Peer);
}

#[test]
fn test_can_relate_to_truth_table() {
    use RelationRole::*;

    let cases = [
        (Provider, Requirer, true),
        (Requirer, Provider, true),
        (Provider, Provider, false),
        (Requirer, Requirer, false),
        (Peer, Peer, false),
        (Peer, Provider, false),
        (Peer, Requirer, false),
        (Provider, Peer, false),
        (Requirer, Peer, false),
    ];
    for (a, b, expected) in cases {
        assert_eq!(
            ep("a", "mysql", a).can_relate_to(&ep("b", "mysql", b)),
            expected,
            "{a} -> {b}"
        );
    }
}

#[test]
fn test_can_relate_to_requires_matching_interface() {
    let provider = ep("mysql", "mysql", RelationRole::Provider);
    let requirer = ep("wordpress", "postgres", RelationRole::Requirer);

    assert!(!provider.can_relate_to(&requirer));
    assert!(!requirer.can_relate_to(&provider));
}

#[test]
fn test_can_relate_to_is_symmetric_for_provider_requirer() {
    let provider = ep("mysql", "mysql", RelationRole::Provider);
    let requirer = ep("wordpress", "mysql", RelationRole::Requirer);

    assert_eq!(provider.can_relate_to(&requirer), requirer.can_relate_to(&provider));
}

#[test]
fn test_endpoint_display() {
    let endpoint = RelationEndpoint::new(
        "wordpress",
        "mysql",
        "db",
        RelationRole::Requirer,
        RelationScope::Global,
    );
    assert_eq!(endpoint.to_string(), "wordpress:db");
}

#[test]
fn test_role_and_scope_parsing() {
    assert_eq!("provider".parse::<RelationRole>().unwrap(), RelationRole::Provider);
    assert_eq!("peer".parse::<RelationRole>().unwrap(), RelationRole::Peer);
    assert_eq!("container".parse::<RelationScope>().unwrap(), RelationScope::Container);

    let err = "master".parse::<RelationRole>().unwrap_err();
    assert!(matches!(err, Error::Relation(RelationError::UnknownRole(ref r)) if r == "master"));
    assert!("local".parse::<RelationScope>().is_err());
}

#[test]
fn test_role_string_forms_round_trip_through_display() {
    for role in [RelationRole::Provider, RelationRole::Requirer, RelationRole::Peer] {
        assert_eq!(role.to_string().parse::<RelationRole>().unwrap(), role);
    }
}
