use std::net::SocketAddr;

/// Counter: submission attempts by result. Labels: outcome.
pub const SUBMISSIONS_TOTAL: &str = "hallbook_submissions_total";

/// Histogram: store `create` latency in seconds, successful or not.
pub const CREATE_DURATION_SECONDS: &str = "hallbook_create_duration_seconds";

/// Counter: availability index rebuilds.
pub const INDEX_REBUILDS_TOTAL: &str = "hallbook_index_rebuilds_total";

/// Gauge: bookings in the current index snapshot.
pub const INDEX_BOOKINGS: &str = "hallbook_index_bookings";

/// Counter: subscription pushes dropped because the sync loop fell behind.
pub const SYNC_LAGGED_TOTAL: &str = "hallbook_sync_lagged_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
