//! Metric name and label definitions.

/// Image acquisition metrics
pub mod media {
    /// Total image resolutions, labelled by `outcome`
    pub const RESOLUTIONS_TOTAL: &str = "aggregator_media_resolutions_total";
    /// Resolutions answered from an existing attachment, labelled by dedup `key`
    pub const DEDUP_HITS_TOTAL: &str = "aggregator_media_dedup_hits_total";
    /// Download strategy attempts, labelled by `strategy`
    pub const STRATEGY_ATTEMPTS_TOTAL: &str = "aggregator_media_strategy_attempts_total";
    /// Download strategy failures, labelled by `strategy`
    pub const STRATEGY_FAILURES_TOTAL: &str = "aggregator_media_strategy_failures_total";
    /// Wall time of a full resolution in seconds
    pub const RESOLVE_DURATION_SECONDS: &str = "aggregator_media_resolve_duration_seconds";
}

/// Common label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const KEY: &str = "key";
    pub const STRATEGY: &str = "strategy";
}

/// Histogram buckets
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Resolution duration buckets (in seconds)
    /// Covers 1ms for dedup hits up to three chained download timeouts
    pub static RESOLVE_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0,
        ]
    });
}
