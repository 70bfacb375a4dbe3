//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_requests_total` (counter): RPC calls by method and status code
//! - `rpc_request_duration_seconds` (histogram): RPC latency by method
//! - `rpc_panics_total` (counter): handler panics caught at the recovery boundary
//! - `rpc_active_connections` (gauge): open RPC connections

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Install the Prometheus exporter when enabled.
///
/// Without an installed recorder every metric call is a no-op.
pub fn init_metrics(config: &MetricsConfig) {
    if !config.enabled {
        return;
    }

    let addr: SocketAddr = match config.address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(metrics_address = %config.address, error = %e, "Failed to parse metrics address");
            return;
        }
    };

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rpc_call(method: &str, code: &'static str, started: Instant) {
    metrics::counter!(
        "rpc_requests_total",
        "method" => method.to_string(),
        "code" => code
    )
    .increment(1);
    metrics::histogram!("rpc_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rpc_panic(method: &str) {
    metrics::counter!("rpc_panics_total", "method" => method.to_string()).increment(1);
}

pub fn rpc_connection_opened() {
    metrics::gauge!("rpc_active_connections").increment(1.0);
}

pub fn rpc_connection_closed() {
    metrics::gauge!("rpc_active_connections").decrement(1.0);
}
