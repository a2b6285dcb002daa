use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("streamgen_requests_total", "Total number of generation calls").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("streamgen_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("streamgen_cache_misses_total", "Total cache misses").unwrap();
    pub static ref REQUEST_FAILURES: Counter =
        register_counter!("streamgen_request_failures_total", "Generation calls that failed").unwrap();
    pub static ref CHUNKS_TOTAL: Counter =
        register_counter!("streamgen_chunks_total", "Chunks delivered to token sinks").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "streamgen_request_latency_seconds",
        "Generation call latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("streamgen_cache_size", "Current number of cached completions").unwrap();
}

// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
