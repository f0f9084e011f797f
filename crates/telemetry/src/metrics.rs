use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Request pipeline ====
    pub static ref THUMBNAIL_REQUESTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "thumbnail_requests_total",
                "Thumbnail requests by outcome (hit, generated, invalid, failed)",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref THUMBNAIL_CACHE_LOOKUPS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "thumbnail_cache_lookups_total",
                "Cache lookups by result (hit, miss, error)",
            ),
            &["result"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref THUMBNAIL_CACHE_WRITES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "thumbnail_cache_writes_total",
                "Cache write-backs by status",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Generation ====
    pub static ref THUMBNAIL_GENERATIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "thumbnail_generations_total",
                "Completed generation tasks by status",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref THUMBNAIL_GENERATION_DURATION: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "thumbnail_generation_seconds",
                "Wall time of a single generation task, excluding queueing",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Scheduler ====
    pub static ref SCHEDULER_IN_FLIGHT: IntGauge = {
        let metric = IntGauge::new(
            "thumbnail_scheduler_in_flight",
            "Generation tasks currently running",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SCHEDULER_QUEUED: IntGauge = {
        let metric = IntGauge::new(
            "thumbnail_scheduler_queued",
            "Generation tasks waiting for a free slot",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Encode every registered metric in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
