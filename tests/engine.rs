//! Engine-level tests with mocked sources, no external dependencies

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use prediction_engine::config::EngineConfig;
use prediction_engine::engine::{PredictOptions, PredictionEngine};
use prediction_engine::types::{
    AiConfidence, AuthorType, Direction, HistoricalSource, Impact, Platform, Post, PriceBar,
    Result, Sentiment, SentimentResult, SentimentSource, SocialSource, SourceError,
};

/// Mock historical source with call counting
struct MockHistorical {
    bars: Vec<PriceBar>,
    fail: Option<fn() -> SourceError>,
    calls: AtomicUsize,
}

impl MockHistorical {
    fn returning(bars: Vec<PriceBar>) -> Arc<Self> {
        Arc::new(Self {
            bars,
            fail: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(fail: fn() -> SourceError) -> Arc<Self> {
        Arc::new(Self {
            bars: Vec::new(),
            fail: Some(fail),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HistoricalSource for MockHistorical {
    async fn fetch_bars(&self, _ticker: &str, _days: u32) -> Result<Vec<PriceBar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail {
            Some(fail) => Err(fail()),
            None => Ok(self.bars.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock_historical"
    }
}

/// Mock social source with call counting
struct MockSocial {
    platform: Platform,
    posts: Vec<Post>,
    fail: Option<fn() -> SourceError>,
    calls: AtomicUsize,
}

impl MockSocial {
    fn returning(platform: Platform, posts: Vec<Post>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            posts,
            fail: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(platform: Platform, fail: fn() -> SourceError) -> Arc<Self> {
        Arc::new(Self {
            platform,
            posts: Vec::new(),
            fail: Some(fail),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SocialSource for MockSocial {
    async fn fetch_posts(&self, _ticker: &str, _limit: usize, _days_back: u32) -> Result<Vec<Post>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail {
            Some(fail) => Err(fail()),
            None => Ok(self.posts.clone()),
        }
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

/// Mock sentiment source with call counting
struct MockSentiment {
    result: Option<SentimentResult>,
    fail: Option<fn() -> SourceError>,
    calls: AtomicUsize,
}

impl MockSentiment {
    fn returning(result: SentimentResult) -> Arc<Self> {
        Arc::new(Self {
            result: Some(result),
            fail: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(fail: fn() -> SourceError) -> Arc<Self> {
        Arc::new(Self {
            result: None,
            fail: Some(fail),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SentimentSource for MockSentiment {
    async fn analyze(&self, _posts: &[Post], _ticker: &str) -> Result<SentimentResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail {
            Some(fail) => Err(fail()),
            None => Ok(self.result.clone().expect("mock has a result")),
        }
    }

    fn name(&self) -> &str {
        "mock_sentiment"
    }
}

fn bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap() + chrono::Days::new(i as u64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

fn post(platform: Platform, id: &str, text: &str) -> Post {
    Post {
        platform,
        id: Some(id.to_string()),
        author: "someone".to_string(),
        author_type: Some(AuthorType::Regular),
        text: text.to_string(),
        date: Some(Utc::now()),
        metrics: HashMap::new(),
    }
}

fn positive_sentiment() -> SentimentResult {
    SentimentResult {
        sentiment: Sentiment::Positive,
        impact: Impact::ModerateIncrease,
        confidence: AiConfidence::High,
        key_factors: vec!["strong earnings".to_string()],
        patterns: Vec::new(),
        reasoning: "Broadly bullish chatter".to_string(),
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        max_retries: 0,
        retry_backoff: Duration::from_millis(1),
        ..EngineConfig::default()
    }
}

fn rate_limited() -> SourceError {
    SourceError::RateLimited {
        origin: "mock".to_string(),
        retry_after: Some(60),
    }
}

fn forbidden() -> SourceError {
    SourceError::Forbidden {
        origin: "mock".to_string(),
        message: "blocked".to_string(),
    }
}

fn transient() -> SourceError {
    SourceError::Transient {
        origin: "mock".to_string(),
        message: "connection reset".to_string(),
    }
}

#[tokio::test]
async fn test_historical_only_prediction() {
    // Two bars, no posts, sentiment source fails: the result must still be
    // valid and built purely from the technical trend.
    let historical = MockHistorical::returning(bars(&[100.0, 105.0]));
    let twitter = MockSocial::returning(Platform::Twitter, Vec::new());
    let reddit = MockSocial::returning(Platform::Reddit, Vec::new());
    let sentiment = MockSentiment::failing(transient);

    let engine = PredictionEngine::new(
        historical.clone(),
        twitter,
        reddit,
        sentiment,
        test_config(),
    );
    let result = engine.predict("AAPL", PredictOptions::default()).await;

    assert_eq!(result.sources_used, vec!["historical"]);
    assert!(result.confidence >= 0.1);
    assert_eq!(result.posts_analyzed, 0);
    assert_eq!(result.sentiment.sentiment, Sentiment::Neutral);
    // Up trend with neutral sentiment resolves to buy via the cascade
    assert_eq!(result.direction, Direction::Buy);
    assert!(result
        .reasoning
        .iter()
        .any(|r| r.starts_with("Technical: up trend")));
    assert_eq!(result.technical_signals.price_change, 5.0);
}

#[tokio::test]
async fn test_healthy_sources_are_attempted() {
    // Fresh engine, no breakers tripped: every enabled source gets
    // exactly one network attempt.
    let historical = MockHistorical::returning(bars(&[100.0, 105.0]));
    let twitter = MockSocial::returning(
        Platform::Twitter,
        vec![post(Platform::Twitter, "t1", "tweet")],
    );
    let reddit = MockSocial::returning(Platform::Reddit, Vec::new());
    let sentiment = MockSentiment::returning(positive_sentiment());

    let engine = PredictionEngine::new(
        historical.clone(),
        twitter.clone(),
        reddit.clone(),
        sentiment,
        test_config(),
    );
    let result = engine.predict("AAPL", PredictOptions::default()).await;

    assert_eq!(historical.call_count(), 1);
    assert_eq!(twitter.call_count(), 1);
    assert_eq!(reddit.call_count(), 1);
    assert!(result.sources_used.iter().any(|s| s == "historical"));
    assert!(result.sources_used.iter().any(|s| s == "twitter"));
}

#[tokio::test]
async fn test_full_pipeline_with_posts() {
    let historical = MockHistorical::returning(bars(&[
        100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0, 107.0, 108.0, 109.0,
    ]));
    let twitter = MockSocial::returning(
        Platform::Twitter,
        vec![
            post(Platform::Twitter, "t1", "AAPL is flying today"),
            post(Platform::Twitter, "t2", "thinking about calls"),
        ],
    );
    let reddit = MockSocial::returning(
        Platform::Reddit,
        vec![post(Platform::Reddit, "r1", "AAPL discussion thread")],
    );
    let sentiment = MockSentiment::returning(positive_sentiment());

    let engine = PredictionEngine::new(historical, twitter, reddit, sentiment.clone(), test_config());
    let result = engine.predict("AAPL", PredictOptions::default()).await;

    assert_eq!(
        result.sources_used,
        vec!["historical", "twitter", "reddit", "ai_analysis"]
    );
    assert_eq!(result.posts_analyzed, 3);
    assert_eq!(result.direction, Direction::Buy);
    assert_eq!(sentiment.call_count(), 1);
    // Steadily rising closes give the projection a price above spot
    assert!(result.predicted_price.unwrap() > 100.0);
    assert!(result.confidence_breakdown.is_some());
}

#[tokio::test]
async fn test_duplicate_posts_counted_once() {
    let historical = MockHistorical::returning(bars(&[100.0, 105.0]));
    let twitter = MockSocial::returning(
        Platform::Twitter,
        vec![
            post(Platform::Twitter, "same", "identical tweet"),
            post(Platform::Twitter, "same", "identical tweet"),
        ],
    );
    let reddit = MockSocial::returning(Platform::Reddit, Vec::new());
    let sentiment = MockSentiment::returning(positive_sentiment());

    let engine = PredictionEngine::new(historical, twitter, reddit, sentiment, test_config());
    let result = engine.predict("AAPL", PredictOptions::default()).await;

    assert_eq!(result.posts_analyzed, 1);
}

#[tokio::test]
async fn test_rate_limit_trips_breaker_until_reset() {
    let historical = MockHistorical::returning(bars(&[100.0, 105.0]));
    let twitter = MockSocial::failing(Platform::Twitter, rate_limited);
    let reddit = MockSocial::returning(Platform::Reddit, Vec::new());
    let sentiment = MockSentiment::returning(positive_sentiment());

    let engine = PredictionEngine::new(
        historical,
        twitter.clone(),
        reddit,
        sentiment,
        test_config(),
    );

    engine.predict("AAPL", PredictOptions::default()).await;
    assert_eq!(twitter.call_count(), 1);

    // Tripped breaker means zero further network attempts
    engine.predict("AAPL", PredictOptions::default()).await;
    engine.predict("AAPL", PredictOptions::default()).await;
    assert_eq!(twitter.call_count(), 1);

    let tripped = engine
        .circuit_snapshot()
        .into_iter()
        .filter(|c| c.tripped)
        .count();
    assert_eq!(tripped, 1);

    engine.reset_breakers();
    engine.predict("AAPL", PredictOptions::default()).await;
    assert_eq!(twitter.call_count(), 2);
}

#[tokio::test]
async fn test_forbidden_trips_only_that_source() {
    let historical = MockHistorical::returning(bars(&[100.0, 105.0]));
    let twitter = MockSocial::returning(
        Platform::Twitter,
        vec![post(Platform::Twitter, "t1", "still here")],
    );
    let reddit = MockSocial::failing(Platform::Reddit, forbidden);
    let sentiment = MockSentiment::returning(positive_sentiment());

    let engine = PredictionEngine::new(
        historical,
        twitter.clone(),
        reddit.clone(),
        sentiment,
        test_config(),
    );

    engine.predict("AAPL", PredictOptions::default()).await;
    engine.predict("AAPL", PredictOptions::default()).await;

    assert_eq!(reddit.call_count(), 1);
    assert_eq!(twitter.call_count(), 2);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let historical = MockHistorical::failing(transient);
    let twitter = MockSocial::returning(Platform::Twitter, Vec::new());
    let reddit = MockSocial::returning(Platform::Reddit, Vec::new());
    let sentiment = MockSentiment::returning(positive_sentiment());

    let config = EngineConfig {
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
        ..EngineConfig::default()
    };
    let engine = PredictionEngine::new(historical.clone(), twitter, reddit, sentiment, config);
    let result = engine.predict("AAPL", PredictOptions::default()).await;

    // Initial attempt plus two retries, then the source is marked absent
    assert_eq!(historical.call_count(), 3);
    assert!(!result.sources_used.iter().any(|s| s == "historical"));
    // Transient failure does not trip the breaker
    assert!(engine.circuit_snapshot().iter().all(|c| !c.tripped));
}

#[tokio::test]
async fn test_total_failure_yields_conservative_hold() {
    let historical = MockHistorical::failing(transient);
    let twitter = MockSocial::failing(Platform::Twitter, rate_limited);
    let reddit = MockSocial::failing(Platform::Reddit, forbidden);
    let sentiment = MockSentiment::returning(positive_sentiment());

    let engine = PredictionEngine::new(
        historical,
        twitter,
        reddit,
        sentiment.clone(),
        test_config(),
    );
    let result = engine.predict("AAPL", PredictOptions::default()).await;

    assert!(result.sources_used.is_empty());
    assert_eq!(result.direction, Direction::Hold);
    assert_eq!(result.confidence, 0.1);
    assert!(result.reasoning.iter().any(|r| r.contains("No data")));
    assert!(result.predicted_price.is_none());
    // Sentiment is never attempted when there is nothing to analyze
    assert_eq!(sentiment.call_count(), 0);
}

#[tokio::test]
async fn test_expired_deadline_skips_all_sources() {
    let historical = MockHistorical::returning(bars(&[100.0, 105.0]));
    let twitter = MockSocial::returning(Platform::Twitter, Vec::new());
    let reddit = MockSocial::returning(Platform::Reddit, Vec::new());
    let sentiment = MockSentiment::returning(positive_sentiment());

    let config = EngineConfig {
        deadline: Duration::ZERO,
        ..test_config()
    };
    let engine = PredictionEngine::new(
        historical.clone(),
        twitter.clone(),
        reddit.clone(),
        sentiment.clone(),
        config,
    );
    let result = engine.predict("AAPL", PredictOptions::default()).await;

    assert_eq!(historical.call_count(), 0);
    assert_eq!(twitter.call_count(), 0);
    assert_eq!(reddit.call_count(), 0);
    assert_eq!(sentiment.call_count(), 0);
    assert_eq!(result.direction, Direction::Hold);
    assert_eq!(result.confidence, 0.1);
}

#[tokio::test]
async fn test_post_toggles_skip_social_sources() {
    let historical = MockHistorical::returning(bars(&[100.0, 105.0]));
    let twitter = MockSocial::returning(
        Platform::Twitter,
        vec![post(Platform::Twitter, "t1", "tweet")],
    );
    let reddit = MockSocial::returning(
        Platform::Reddit,
        vec![post(Platform::Reddit, "r1", "thread")],
    );
    let sentiment = MockSentiment::returning(positive_sentiment());

    let engine = PredictionEngine::new(
        historical,
        twitter.clone(),
        reddit.clone(),
        sentiment,
        test_config(),
    );

    let options = PredictOptions {
        include_posts: false,
        ..PredictOptions::default()
    };
    engine.predict("AAPL", options).await;
    assert_eq!(twitter.call_count(), 0);
    assert_eq!(reddit.call_count(), 0);

    let options = PredictOptions {
        include_reddit: false,
        ..PredictOptions::default()
    };
    let result = engine.predict("AAPL", options).await;
    assert_eq!(twitter.call_count(), 1);
    assert_eq!(reddit.call_count(), 0);
    assert!(!result.sources_used.iter().any(|s| s == "reddit"));
}
