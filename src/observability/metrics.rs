//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gridconf_commits_total` (counter): commits by result
//! - `gridconf_version_changes_total` (counter): snapshots installed by a replica
//! - `gridconf_refresh_total` (counter): refresh requests by outcome
//! - `gridconf_candidate_failures_total` (counter): failed pulls from one server
//! - `gridconf_history_length` (gauge): retained commits on the master
//! - `gridconf_registered_slaves` (gauge): replicas known to this node
//! - `gridconf_rpc_requests_total` (counter): served requests by route, status

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    describe_counter!("gridconf_commits_total", "Commits by result (accepted, rejected)");
    describe_counter!("gridconf_version_changes_total", "Newer snapshots installed locally");
    describe_counter!("gridconf_refresh_total", "Refresh requests by outcome");
    describe_counter!("gridconf_candidate_failures_total", "Pulls that failed against one server");
    describe_gauge!("gridconf_history_length", "Commits retained in history");
    describe_gauge!("gridconf_registered_slaves", "Replicas registered with this node");
    describe_counter!("gridconf_rpc_requests_total", "Requests served by route and status");
}

pub fn record_commit(result: &str) {
    counter!("gridconf_commits_total", "result" => result.to_string()).increment(1);
}

pub fn record_history_length(len: usize) {
    gauge!("gridconf_history_length").set(len as f64);
}

pub fn record_registered_slaves(count: usize) {
    gauge!("gridconf_registered_slaves").set(count as f64);
}

pub fn record_version_change() {
    counter!("gridconf_version_changes_total").increment(1);
}

pub fn record_refresh(outcome: &str) {
    counter!("gridconf_refresh_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_candidate_failure() {
    counter!("gridconf_candidate_failures_total").increment(1);
}

pub fn record_rpc(route: &str, status: u16) {
    counter!(
        "gridconf_rpc_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
