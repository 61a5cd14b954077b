use std::time::Duration;

/// Engine tunables. Defaults match the documented contract; env vars
/// override the operational knobs in `from_env`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared wall-clock budget for one aggregate call
    pub deadline: Duration,
    /// Per-call timeout for a single upstream request
    pub source_timeout: Duration,
    /// Extra attempts after the first, for transient failures only
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub retry_backoff: Duration,
    /// Posts requested per social platform
    pub post_limit: usize,
    /// How far back to search for posts, in days
    pub post_days_back: u32,
    /// Content-prefix length used for dedup
    pub dedup_prefix_len: usize,
    /// Bars required for any technical signal at all
    pub min_bars: usize,
    /// Bars required for SMA-5 / volatility
    pub sma_short_bars: usize,
    /// Bars required for SMA-10 and `good` data quality
    pub sma_long_bars: usize,
    /// Maximum bars fed to the regression projection
    pub regression_window: usize,
    /// Confidence factor weights; must sum to 1.0
    pub weight_base: f64,
    pub weight_ai_confidence: f64,
    pub weight_data_quality: f64,
    pub weight_signal_alignment: f64,
    /// Confidence clamp bounds
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(180),
            source_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            post_limit: 25,
            post_days_back: 1,
            dedup_prefix_len: 100,
            min_bars: 2,
            sma_short_bars: 5,
            sma_long_bars: 10,
            regression_window: 30,
            weight_base: 0.2,
            weight_ai_confidence: 0.3,
            weight_data_quality: 0.25,
            weight_signal_alignment: 0.25,
            min_confidence: 0.1,
            max_confidence: 0.95,
        }
    }
}

impl EngineConfig {
    /// Build config from environment, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("PREDICTION_DEADLINE_SECS") {
            config.deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("SOURCE_TIMEOUT_SECS") {
            config.source_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("SOURCE_MAX_RETRIES") {
            config.max_retries = n as u32;
        }
        if let Some(n) = env_u64("POST_LIMIT") {
            config.post_limit = n as usize;
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
