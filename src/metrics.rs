use actix_web::HttpResponse;
use prometheus::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};

// Prometheus metrics for monitoring the sync engine
lazy_static::lazy_static! {
    // Counter for the total number of blocks indexed by the fast track
    pub static ref BLOCKS_INDEXED: Counter = register_counter!(
        "shovelwatch_blocks_indexed_total",
        "Total blocks processed through the indexer layers"
    ).unwrap();

    // Histogram for measuring one batch pass through all layers, in seconds
    pub static ref BATCH_PROCESS_TIME: Histogram = register_histogram!(
        "shovelwatch_batch_process_seconds",
        "Batch processing time in seconds"
    ).unwrap();

    // Counter for live ticks skipped because a previous tick is still running
    pub static ref TICKS_SKIPPED: Counter = register_counter!(
        "shovelwatch_ticks_skipped_total",
        "Live ticks dropped while indexing was already in progress"
    ).unwrap();

    // Gauges for the two progress cursors
    pub static ref FAST_CURSOR: Gauge = register_gauge!(
        "shovelwatch_fast_cursor",
        "Last block fully processed by the fast track"
    ).unwrap();

    pub static ref SLOW_CURSOR: Gauge = register_gauge!(
        "shovelwatch_slow_cursor",
        "Last block fully processed by the slow track"
    ).unwrap();
}

// Handles GET /metrics requests to expose Prometheus metrics
pub async fn metrics() -> HttpResponse {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let encoded = encoder.encode_to_string(&metric_families).unwrap_or_default();
    HttpResponse::Ok().body(encoded)
}
