//! Prometheus metrics for blog-service.
//!
//! Store round trips are counted by outcome and timed; `/metrics` renders
//! the default registry in text format.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Store round trips segmented by store, operation and taxonomy outcome.
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_store_operations_total",
        "Store round trips segmented by outcome",
        &["store", "operation", "outcome"]
    )
    .expect("failed to register blog_store_operations_total");

    /// Latency of individual store round trips.
    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "blog_store_operation_duration_seconds",
        "Store round trip duration",
        &["store", "operation"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 3.0]
    )
    .expect("failed to register blog_store_operation_duration_seconds");
}

pub fn record_store_call(store: &str, operation: &str, outcome: &str, elapsed: Duration) {
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[store, operation, outcome])
        .inc();
    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[store, operation])
        .observe(elapsed.as_secs_f64());
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
