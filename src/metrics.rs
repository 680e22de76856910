// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static RELATIONSHIP_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(IntCounterVec::new(
        Opts::new(
            "relationship_transitions_total",
            "Relationship request operations by outcome",
        ),
        &["operation", "outcome"],
    ))
});

pub static VISIBILITY_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(IntCounterVec::new(
        Opts::new("visibility_decisions_total", "Audience resolver decisions"),
        &["decision"],
    ))
});

pub static MEMBERSHIP_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(IntCounterVec::new(
        Opts::new(
            "membership_transitions_total",
            "Group, subnet and round-table membership operations by outcome",
        ),
        &["operation", "outcome"],
    ))
});

fn register(counter: prometheus::Result<IntCounterVec>) -> IntCounterVec {
    // Names and labels are static; construction only fails on a typo.
    let counter = counter.expect("valid metric definition");
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        error!("Failed to register metric: {}", e);
    }
    counter
}

/// Records the outcome of a lifecycle operation, `ok` or the error code.
pub fn record_relationship<T>(operation: &str, result: &crate::error::Result<T>) {
    RELATIONSHIP_TRANSITIONS
        .with_label_values(&[operation, outcome(result)])
        .inc();
}

pub fn record_membership<T>(operation: &str, result: &crate::error::Result<T>) {
    MEMBERSHIP_TRANSITIONS
        .with_label_values(&[operation, outcome(result)])
        .inc();
}

pub fn record_visibility(allowed: bool) {
    let decision = if allowed { "allow" } else { "deny" };
    VISIBILITY_DECISIONS.with_label_values(&[decision]).inc();
}

fn outcome<T>(result: &crate::error::Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    }
}

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    // Touch the counters so they are listed before their first increment.
    Lazy::force(&RELATIONSHIP_TRANSITIONS);
    Lazy::force(&VISIBILITY_DECISIONS);
    Lazy::force(&MEMBERSHIP_TRANSITIONS);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn outcomes_are_labelled_by_error_code() {
        record_relationship::<()>("submit", &Err(Error::not_found("User not found")));
        record_relationship("submit", &Ok(()));
        record_visibility(false);

        let denied = RELATIONSHIP_TRANSITIONS
            .with_label_values(&["submit", "not_found"])
            .get();
        assert!(denied >= 1);

        let text = render().unwrap();
        assert!(text.contains("relationship_transitions_total"));
        assert!(text.contains("visibility_decisions_total"));
    }
}
