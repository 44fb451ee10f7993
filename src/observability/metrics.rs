use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token cache metrics
    pub token_cache_hits: IntCounterVec,
    pub token_cache_misses: IntCounterVec,
    pub token_generation_attempts: IntCounterVec,
    pub token_generation_failures: IntCounterVec,
    pub token_invalidations: IntCounterVec,
    pub cached_tokens: IntGauge,

    // Messaging metrics
    pub messaging_operations: IntCounterVec,
    pub messaging_duration: HistogramVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("fcmagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Token cache
            token_cache_hits: IntCounterVec::new(Opts::new("token_cache_hits_total", "Tokens served from cache"),&["project"],).unwrap(),
            token_cache_misses: IntCounterVec::new(Opts::new("token_cache_misses_total", "Token lookups that required generation"),&["project"],).unwrap(),
            token_generation_attempts: IntCounterVec::new(Opts::new("token_generation_attempts_total", "Token generator invocations"),&["project"],).unwrap(),
            token_generation_failures: IntCounterVec::new(Opts::new("token_generation_failures_total", "Failed token generator invocations"),&["project"],).unwrap(),
            token_invalidations: IntCounterVec::new(Opts::new("token_invalidations_total", "Removed cache entries by reason"),&["reason"],).unwrap(),
            cached_tokens: IntGauge::new("cached_tokens", "Tokens currently cached").unwrap(),

            // Messaging
            messaging_operations: IntCounterVec::new(Opts::new("messaging_operations_total", "Messaging operations by outcome"),&["operation", "outcome"],).unwrap(),
            messaging_duration: HistogramVec::new(HistogramOpts::new("messaging_operation_duration_seconds", "Messaging operation duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["operation"],).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.token_cache_misses.clone())).unwrap();
        reg.register(Box::new(metrics.token_generation_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.token_generation_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_invalidations.clone())).unwrap();
        reg.register(Box::new(metrics.cached_tokens.clone())).unwrap();
        reg.register(Box::new(metrics.messaging_operations.clone())).unwrap();
        reg.register(Box::new(metrics.messaging_duration.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
