//! Prometheus metrics exposition
//!
//! - `oauth_transitions_total` (counter): labels `transition`, `outcome`
//! - `portal_requests_total` (counter): labels `route`, `status`

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record the outcome of one session transition.
///
/// For `begin`, `call` and `kill` the outcome is `success` or `failure`.
/// Client failures seen while resuming are recorded under the failed
/// operation (`initiate`, `complete`, `identify`). `resume` records the
/// state label the session ended in.
pub fn record_transition(transition: &'static str, outcome: &'static str) {
    metrics::counter!("oauth_transitions_total", "transition" => transition, "outcome" => outcome)
        .increment(1);
}

/// Record a handled portal request.
pub fn record_request(route: &'static str, status: u16) {
    metrics::counter!("portal_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
}
