use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, HistogramVec, register_counter, register_counter_vec, register_gauge,
    register_histogram_vec,
};

lazy_static! {
    pub static ref ADMISSION_CHECKS: CounterVec = register_counter_vec!(
        "gateway_admission_checks_total",
        "Rate limit checks by decision",
        &["decision"]
    )
    .expect("metric can be registered");
    pub static ref STORE_FALLBACKS: Counter = register_counter!(
        "gateway_counter_store_fallbacks_total",
        "Durable counter store failures answered in-process"
    )
    .expect("metric can be registered");
    pub static ref UPSTREAM_LATENCY: HistogramVec = register_histogram_vec!(
        "gateway_upstream_latency_seconds",
        "Upstream request latency in seconds",
        &["upstream"]
    )
    .expect("metric can be registered");
    pub static ref CACHE_HITS: Counter =
        register_counter!("gateway_cache_hits_total", "Total YouTube cache hits")
            .expect("metric can be registered");
    pub static ref CACHE_MISSES: Counter =
        register_counter!("gateway_cache_misses_total", "Total YouTube cache misses")
            .expect("metric can be registered");
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("gateway_cache_size", "Current number of items in cache")
            .expect("metric can be registered");
}
