use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One trading day of OHLCV data, the source of truth for that day.
/// Bars arrive ordered ascending by date and are never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Social platforms we collect posts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Reddit,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Reddit => "reddit",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three unreliable upstream sources tracked by the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Historical,
    Twitter,
    Reddit,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Historical => "historical",
            SourceId::Twitter => "twitter",
            SourceId::Reddit => "reddit",
        }
    }
}

impl From<Platform> for SourceId {
    fn from(p: Platform) -> Self {
        match p {
            Platform::Twitter => SourceId::Twitter,
            Platform::Reddit => SourceId::Reddit,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a post came from within its platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorType {
    Influencer,
    HighQualitySubreddit,
    Regular,
}

/// A social media post, produced fresh per request and never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub platform: Platform,
    /// Platform-assigned id; opaque, may be absent
    #[serde(default)]
    pub id: Option<String>,
    pub author: String,
    #[serde(default)]
    pub author_type: Option<AuthorType>,
    pub text: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Platform-specific popularity counters (like_count, score, comments, ...)
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

/// Price trend over the two most recent closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much history backs the technical signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Insufficient,
    Limited,
    Good,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl VolatilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityLevel::Low => "low",
            VolatilityLevel::Medium => "medium",
            VolatilityLevel::High => "high",
            VolatilityLevel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price is above or below its moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmaPosition {
    Above,
    Below,
}

impl SmaPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmaPosition::Above => "above",
            SmaPosition::Below => "below",
        }
    }
}

impl fmt::Display for SmaPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technical indicators computed from historical bars.
/// Optional fields are each populated by exactly one computation stage:
/// sma_5 / price_vs_sma / volatility at >=5 bars, sma_10 at >=10 bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSignals {
    pub trend: Trend,
    pub latest_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub data_quality: DataQuality,
    pub data_points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_5: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_10: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_vs_sma: Option<SmaPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility_level: Option<VolatilityLevel>,
}

impl TechnicalSignals {
    /// Sentinel for fewer than two bars of history
    pub fn insufficient() -> Self {
        Self {
            trend: Trend::Neutral,
            latest_price: 0.0,
            price_change: 0.0,
            price_change_percent: 0.0,
            data_quality: DataQuality::Insufficient,
            data_points: 0,
            sma_5: None,
            sma_10: None,
            price_vs_sma: None,
            volatility: None,
            volatility_level: None,
        }
    }
}

/// Five-point sentiment scale returned by the AI analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    #[serde(rename = "very negative")]
    VeryNegative,
    #[serde(rename = "negative")]
    Negative,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "positive")]
    Positive,
    #[serde(rename = "very positive")]
    VeryPositive,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::VeryNegative => "very negative",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
            Sentiment::VeryPositive => "very positive",
        }
    }

    pub fn is_positive_family(&self) -> bool {
        matches!(self, Sentiment::Positive | Sentiment::VeryPositive)
    }

    pub fn is_negative_family(&self) -> bool {
        matches!(self, Sentiment::Negative | Sentiment::VeryNegative)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five-point expected price impact scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    #[serde(rename = "significant decrease")]
    SignificantDecrease,
    #[serde(rename = "moderate decrease")]
    ModerateDecrease,
    #[serde(rename = "minimal change")]
    MinimalChange,
    #[serde(rename = "moderate increase")]
    ModerateIncrease,
    #[serde(rename = "significant increase")]
    SignificantIncrease,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::SignificantDecrease => "significant decrease",
            Impact::ModerateDecrease => "moderate decrease",
            Impact::MinimalChange => "minimal change",
            Impact::ModerateIncrease => "moderate increase",
            Impact::SignificantIncrease => "significant increase",
        }
    }
}

/// Confidence level self-reported by the AI analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiConfidence {
    Low,
    Medium,
    High,
}

/// Structured sentiment analysis, normalized at the adapter boundary.
/// The core never branches on payload representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    pub impact: Impact,
    pub confidence: AiConfidence,
    pub key_factors: Vec<String>,
    pub patterns: Vec<String>,
    pub reasoning: String,
}

impl SentimentResult {
    /// Fixed neutral fallback used whenever the sentiment source fails
    pub fn neutral_fallback(reason: &str) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            impact: Impact::MinimalChange,
            confidence: AiConfidence::Low,
            key_factors: vec!["AI analysis unavailable".to_string()],
            patterns: Vec::new(),
            reasoning: format!("Fallback analysis: {}", reason),
        }
    }
}

/// Directional recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::StrongBuy => "strong_buy",
            Direction::Buy => "buy",
            Direction::Hold => "hold",
            Direction::Sell => "sell",
            Direction::StrongSell => "strong_sell",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative agreement between the technical trend and the sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    StrongAlignment,
    GoodAlignment,
    Neutral,
    Mixed,
    Conflicting,
}

/// Five-bucket combined signal magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

/// Fused technical + sentiment signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedSignal {
    pub direction: Direction,
    pub expected_impact: Impact,
    pub technical_trend: Trend,
    pub sentiment: Sentiment,
    pub reasoning: Vec<String>,
    pub signal_alignment: Alignment,
    pub combined_strength: Strength,
}

/// Prediction horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1w")]
    Week,
    #[serde(rename = "1m")]
    Month,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Day
    }
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Day => "1d",
            Timeframe::Week => "1w",
            Timeframe::Month => "1m",
        }
    }

    /// Steps ahead for the regression projection
    pub fn projection_days(&self) -> usize {
        match self {
            Timeframe::Day => 1,
            Timeframe::Week => 7,
            Timeframe::Month => 30,
        }
    }

    /// How much history to request for this horizon
    pub fn history_days(&self) -> u32 {
        match self {
            Timeframe::Day => 30,
            Timeframe::Week => 90,
            Timeframe::Month => 365,
        }
    }
}

/// Why a breaker tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripReason {
    RateLimited,
    Forbidden,
}

/// Snapshot of one source's breaker, reported by /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitState {
    pub source: SourceId,
    pub tripped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_reason: Option<TripReason>,
}

/// Final prediction returned to the caller. Always produced, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub confidence: f64,
    pub technical_signals: TechnicalSignals,
    pub sentiment: SentimentResult,
    pub reasoning: Vec<String>,
    pub sources_used: Vec<String>,
    pub posts_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_breakdown: Option<crate::confidence::ConfidenceBreakdown>,
}

/// Classified source error, decided at the adapter boundary.
/// The engine dispatches on the variant, never on message text.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("rate limit exceeded for {origin}")]
    RateLimited {
        origin: String,
        retry_after: Option<u64>,
    },

    #[error("access forbidden for {origin}: {message}")]
    Forbidden { origin: String, message: String },

    #[error("transient failure from {origin}: {message}")]
    Transient { origin: String, message: String },

    #[error("malformed response from {origin}: {message}")]
    Malformed { origin: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Rate-limit and forbidden failures trip the breaker until an explicit reset
    pub fn trips_breaker(&self) -> Option<TripReason> {
        match self {
            SourceError::RateLimited { .. } => Some(TripReason::RateLimited),
            SourceError::Forbidden { .. } => Some(TripReason::Forbidden),
            _ => None,
        }
    }

    /// Only transient failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Transient { .. })
    }
}

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Trait for historical price sources
#[async_trait::async_trait]
pub trait HistoricalSource: Send + Sync {
    /// Fetch daily bars for a ticker, ordered ascending by date
    async fn fetch_bars(&self, ticker: &str, days: u32) -> Result<Vec<PriceBar>>;

    /// Source name
    fn name(&self) -> &str;
}

/// Trait for social post sources
#[async_trait::async_trait]
pub trait SocialSource: Send + Sync {
    /// Fetch recent posts mentioning a ticker
    async fn fetch_posts(&self, ticker: &str, limit: usize, days_back: u32) -> Result<Vec<Post>>;

    /// Which platform this source serves
    fn platform(&self) -> Platform;
}

/// Trait for the AI sentiment source
#[async_trait::async_trait]
pub trait SentimentSource: Send + Sync {
    /// Analyze deduplicated posts for a ticker
    async fn analyze(&self, posts: &[Post], ticker: &str) -> Result<SentimentResult>;

    /// Source name
    fn name(&self) -> &str;
}
