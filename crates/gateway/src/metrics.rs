//! Gateway counters
//!
//! - `gateway_requests_total` (counter): label `status` (HTTP status, or `network`)
//! - `gateway_refresh_total` (counter): label `outcome`
//! - `gateway_replays_total` (counter)
//! - `gateway_session_expired_total` (counter)
//!
//! Nothing here installs a recorder; without one these calls are no-ops.

/// Record one dispatched attempt (original or replay) by response status.
pub fn record_response(status: u16) {
    metrics::counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
}

/// Record an attempt that got no response at all.
pub fn record_network_failure() {
    metrics::counter!("gateway_requests_total", "status" => "network").increment(1);
}

/// Record the end of a refresh call: `success`, `no_refresh_token`, `rejected`,
/// `unreachable` or `malformed`.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("gateway_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_replay() {
    metrics::counter!("gateway_replays_total").increment(1);
}

pub fn record_session_expired() {
    metrics::counter!("gateway_session_expired_total").increment(1);
}
