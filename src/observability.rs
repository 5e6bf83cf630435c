use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total overlap requests answered. Labels: status.
pub const REQUESTS_TOTAL: &str = "slotmeet_requests_total";

/// Histogram: request latency in seconds, store fetch included.
pub const REQUEST_DURATION_SECONDS: &str = "slotmeet_request_duration_seconds";

/// Histogram: ranked slots returned per successful request.
pub const SLOTS_EMITTED: &str = "slotmeet_slots_emitted";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "slotmeet_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "slotmeet_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "slotmeet_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a response status to a short label for metrics.
pub fn status_label(status: u16) -> &'static str {
    match status {
        200 => "ok",
        400 => "invalid",
        504 => "timeout",
        _ => "error",
    }
}
