use super::*;

#[test]
fn test_gather_metrics_exposes_relation_metrics() {
    MEMBERSHIP_JOIN_METRIC.inc();
    SCOPE_EVENT_METRIC.with_label_values(&["joined"]).inc();

    let text = gather_metrics();

    assert!(text.contains("relation_membership_joins"), "Missing relation_membership_joins");
    assert!(text.contains("relation_scope_events"), "Missing relation_scope_events");
}

#[test]
fn test_gather_metrics_is_repeatable() {
    // registration happens once, later calls must not panic
    let _ = gather_metrics();
    let _ = gather_metrics();
}

#[test]
fn test_counter_increment() {
    let before = MEMBERSHIP_DEPART_METRIC.get();
    MEMBERSHIP_DEPART_METRIC.inc();
    assert!(MEMBERSHIP_DEPART_METRIC.get() > before);
}
