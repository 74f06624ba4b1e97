use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// Global Prometheus registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static CACHE_HITS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("cache_hits_total", "Record store reads that found a value"),
        &["domain"],
    )
    .expect("valid metric opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CACHE_MISSES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("cache_misses_total", "Record store reads that found nothing"),
        &["domain"],
    )
    .expect("valid metric opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CACHE_CORRUPT_RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "cache_corrupt_records_total",
            "Stored values that failed to decode and were deleted",
        ),
        &["domain"],
    )
    .expect("valid metric opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CACHE_BACKEND_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("cache_backend_errors_total", "Failed backend operations"),
        &["op"],
    )
    .expect("valid metric opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static RATE_LIMIT_REJECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("rate_limit_rejections_total", "Requests denied by the rate limiter")
        .expect("valid metric opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static RATE_LIMIT_FAIL_OPEN_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "rate_limit_fail_open_total",
        "Rate-limit checks allowed because the backend failed",
    )
    .expect("valid metric opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub fn record_hit(domain: &str) {
    CACHE_HITS_TOTAL.with_label_values(&[domain]).inc();
}

pub fn record_miss(domain: &str) {
    CACHE_MISSES_TOTAL.with_label_values(&[domain]).inc();
}

pub fn record_corruption(domain: &str) {
    CACHE_CORRUPT_RECORDS_TOTAL.with_label_values(&[domain]).inc();
}

pub fn record_backend_error(op: &str) {
    CACHE_BACKEND_ERRORS_TOTAL.with_label_values(&[op]).inc();
}

/// Forces registration so every family shows up in the first scrape.
pub fn init() {
    Lazy::force(&CACHE_HITS_TOTAL);
    Lazy::force(&CACHE_MISSES_TOTAL);
    Lazy::force(&CACHE_CORRUPT_RECORDS_TOTAL);
    Lazy::force(&CACHE_BACKEND_ERRORS_TOTAL);
    Lazy::force(&RATE_LIMIT_REJECTIONS_TOTAL);
    Lazy::force(&RATE_LIMIT_FAIL_OPEN_TOTAL);
}

/// Text exposition of the registry.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
