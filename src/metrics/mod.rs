use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref MEMBERSHIP_JOIN_METRIC: IntCounter = IntCounter::new(
        "relation_membership_joins",
        "Units that entered a relation scope"
    )
    .expect("metric can not be created");

    pub static ref MEMBERSHIP_DEPART_METRIC: IntCounter = IntCounter::new(
        "relation_membership_departs",
        "Units that left a relation scope"
    )
    .expect("metric can not be created");

    pub static ref SCOPE_EVENT_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("relation_scope_events", "Scope events delivered to watchers"),
        &["kind"]
    )
    .expect("Should succeed to create metric");

    pub static ref LIFE_TRANSITION_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("life_transitions", "Applied life transitions"),
        &["entity", "life"]
    )
    .expect("Should succeed to create metric");

    pub static ref ACTIVE_SCOPE_WATCHERS: IntGauge = IntGauge::new(
        "relation_scope_watchers_active",
        "Scope watchers currently polling"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(MEMBERSHIP_JOIN_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(MEMBERSHIP_DEPART_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(SCOPE_EVENT_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(LIFE_TRANSITION_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(ACTIVE_SCOPE_WATCHERS.clone()))
            .expect("collector can be registered");
    });
}

/// Renders every relation-layer metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    register_custom_metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::new()
        }
    }
}
