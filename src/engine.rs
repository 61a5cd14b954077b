//! Prediction orchestrator: concurrent source collection, fusion and
//! result assembly.
//!
//! Every unreliable source is attempted independently under a shared
//! wall-clock deadline. Failures never propagate to the caller; a source
//! that fails is simply absent from `sources_used` for that call. Breaker
//! flags are the only state surviving across calls.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::circuit::{CircuitBreakers, Deadline};
use crate::combine;
use crate::config::EngineConfig;
use crate::confidence;
use crate::dedup::{dedupe_posts, sort_posts};
use crate::technical;
use crate::types::{
    CircuitState, Direction, HistoricalSource, Post, PredictionResult, PriceBar, Result,
    SentimentResult, SentimentSource, SocialSource, SourceId, Timeframe,
};

/// Per-call options accepted by [`PredictionEngine::predict`]
#[derive(Debug, Clone, Copy)]
pub struct PredictOptions {
    pub timeframe: Timeframe,
    pub include_reddit: bool,
    pub include_posts: bool,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::Day,
            include_reddit: true,
            include_posts: true,
        }
    }
}

/// Raw material gathered from the unreliable sources for one call
struct Collected {
    bars: Vec<PriceBar>,
    posts: Vec<Post>,
    sources_used: Vec<String>,
}

/// Multi-source prediction engine
pub struct PredictionEngine {
    historical: Arc<dyn HistoricalSource>,
    twitter: Arc<dyn SocialSource>,
    reddit: Arc<dyn SocialSource>,
    sentiment: Arc<dyn SentimentSource>,
    breakers: CircuitBreakers,
    config: EngineConfig,
}

impl PredictionEngine {
    pub fn new(
        historical: Arc<dyn HistoricalSource>,
        twitter: Arc<dyn SocialSource>,
        reddit: Arc<dyn SocialSource>,
        sentiment: Arc<dyn SentimentSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            historical,
            twitter,
            reddit,
            sentiment,
            breakers: CircuitBreakers::new(),
            config,
        }
    }

    /// Run a full prediction. Always yields a valid result; total source
    /// failure produces a conservative hold.
    pub async fn predict(&self, ticker: &str, options: PredictOptions) -> PredictionResult {
        info!("🚀 Starting prediction for {} ({})", ticker, options.timeframe.as_str());
        let deadline = Deadline::new(self.config.deadline);

        let Collected {
            bars,
            posts,
            mut sources_used,
        } = self.collect_sources(ticker, options, &deadline).await;

        let mut posts = dedupe_posts(posts, self.config.dedup_prefix_len);
        sort_posts(&mut posts);

        let (sentiment_result, sentiment_ok) =
            self.analyze_sentiment(ticker, &posts, &bars, &deadline).await;
        if sentiment_ok {
            sources_used.push("ai_analysis".to_string());
        }

        self.assemble(ticker, options.timeframe, bars, posts, sentiment_result, sources_used)
    }

    /// Current breaker state, for the health surface
    pub fn circuit_snapshot(&self) -> Vec<CircuitState> {
        self.breakers.snapshot()
    }

    /// Clear all tripped breakers
    pub fn reset_breakers(&self) {
        self.breakers.reset();
        info!("🔄 Circuit breakers reset");
    }

    async fn collect_sources(
        &self,
        ticker: &str,
        options: PredictOptions,
        deadline: &Deadline,
    ) -> Collected {
        let history_days = options.timeframe.history_days();
        let limit = self.config.post_limit;
        let days_back = self.config.post_days_back;

        let historical_fut = {
            let source = Arc::clone(&self.historical);
            let ticker = ticker.to_string();
            self.attempt(SourceId::Historical, deadline, move || {
                let source = Arc::clone(&source);
                let ticker = ticker.clone();
                async move { source.fetch_bars(&ticker, history_days).await }
            })
        };

        let twitter_fut = {
            let source = Arc::clone(&self.twitter);
            let ticker = ticker.to_string();
            let enabled = options.include_posts;
            async move {
                if !enabled {
                    return None;
                }
                self.attempt(SourceId::Twitter, deadline, move || {
                    let source = Arc::clone(&source);
                    let ticker = ticker.clone();
                    async move { source.fetch_posts(&ticker, limit, days_back).await }
                })
                .await
            }
        };

        let reddit_fut = {
            let source = Arc::clone(&self.reddit);
            let ticker = ticker.to_string();
            let enabled = options.include_posts && options.include_reddit;
            async move {
                if !enabled {
                    return None;
                }
                self.attempt(SourceId::Reddit, deadline, move || {
                    let source = Arc::clone(&source);
                    let ticker = ticker.clone();
                    async move { source.fetch_posts(&ticker, limit, days_back).await }
                })
                .await
            }
        };

        let (bars, twitter_posts, reddit_posts) =
            futures::join!(historical_fut, twitter_fut, reddit_fut);

        let mut sources_used = Vec::new();
        let bars = match bars {
            Some(bars) if !bars.is_empty() => {
                info!("✅ Historical: {} bars", bars.len());
                sources_used.push("historical".to_string());
                bars
            }
            _ => Vec::new(),
        };

        let mut posts = Vec::new();
        if let Some(twitter_posts) = twitter_posts {
            if !twitter_posts.is_empty() {
                info!("✅ Twitter: {} posts", twitter_posts.len());
                sources_used.push("twitter".to_string());
                posts.extend(twitter_posts);
            }
        }
        if let Some(reddit_posts) = reddit_posts {
            if !reddit_posts.is_empty() {
                info!("✅ Reddit: {} posts", reddit_posts.len());
                sources_used.push("reddit".to_string());
                posts.extend(reddit_posts);
            }
        }

        info!("📊 Successful sources: {:?}", sources_used);
        Collected {
            bars,
            posts,
            sources_used,
        }
    }

    /// One guarded source attempt: breaker and deadline checks before any
    /// network call, bounded retries for transient failures, breaker trip
    /// on classified rate-limit/forbidden errors.
    async fn attempt<T, F, Fut>(&self, source: SourceId, deadline: &Deadline, op: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.breakers.is_open(source) {
            warn!("⏭️ Skipping {}: circuit breaker open", source);
            return None;
        }

        let mut attempt = 0u32;
        loop {
            if deadline.expired() {
                warn!("⏭️ Skipping {}: deadline elapsed", source);
                return None;
            }

            let call_timeout = self.config.source_timeout.min(deadline.remaining());
            match tokio::time::timeout(call_timeout, op()).await {
                Ok(Ok(value)) => return Some(value),
                Ok(Err(error)) => {
                    if let Some(reason) = error.trips_breaker() {
                        warn!("❌ {} failed, tripping breaker: {}", source, error);
                        self.breakers.trip(source, reason);
                        return None;
                    }
                    if error.is_retryable() && attempt < self.config.max_retries {
                        attempt += 1;
                        let backoff = self.config.retry_backoff * 2u32.pow(attempt - 1);
                        warn!(
                            "🔁 {} transient failure (attempt {}), retrying in {:?}: {}",
                            source, attempt, backoff, error
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    warn!("❌ {} failed: {}", source, error);
                    return None;
                }
                Err(_) => {
                    if attempt < self.config.max_retries && !deadline.expired() {
                        attempt += 1;
                        warn!("🔁 {} timed out (attempt {}), retrying", source, attempt);
                        continue;
                    }
                    warn!("❌ {} timed out", source);
                    return None;
                }
            }
        }
    }

    /// Sentiment runs last, fed whatever posts survived dedup. Its failure
    /// never propagates; the caller gets the fixed neutral fallback.
    async fn analyze_sentiment(
        &self,
        ticker: &str,
        posts: &[Post],
        bars: &[PriceBar],
        deadline: &Deadline,
    ) -> (SentimentResult, bool) {
        if posts.is_empty() && bars.is_empty() {
            return (
                SentimentResult::neutral_fallback("no source data collected"),
                false,
            );
        }
        if deadline.expired() {
            warn!("⏭️ Skipping sentiment analysis: deadline elapsed");
            return (
                SentimentResult::neutral_fallback("deadline elapsed"),
                false,
            );
        }

        let call_timeout = self.config.source_timeout.min(deadline.remaining());
        match tokio::time::timeout(call_timeout, self.sentiment.analyze(posts, ticker)).await {
            Ok(Ok(result)) => {
                info!("✅ AI analysis completed");
                (result, true)
            }
            Ok(Err(error)) => {
                warn!("❌ AI analysis failed: {}", error);
                (SentimentResult::neutral_fallback(&error.to_string()), false)
            }
            Err(_) => {
                warn!("❌ AI analysis timed out");
                (SentimentResult::neutral_fallback("analysis timed out"), false)
            }
        }
    }

    fn assemble(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        bars: Vec<PriceBar>,
        posts: Vec<Post>,
        sentiment: SentimentResult,
        sources_used: Vec<String>,
    ) -> PredictionResult {
        if sources_used.is_empty() {
            warn!("All data sources failed for {}", ticker);
            return PredictionResult {
                ticker: ticker.to_string(),
                timestamp: Utc::now(),
                timeframe,
                direction: Direction::Hold,
                confidence: self.config.min_confidence,
                technical_signals: crate::types::TechnicalSignals::insufficient(),
                sentiment,
                reasoning: vec!["No data available from any source".to_string()],
                sources_used,
                posts_analyzed: 0,
                predicted_price: None,
                confidence_breakdown: None,
            };
        }

        let technical_signals = technical::compute_indicators(&bars, &self.config);
        let projection = technical::project_price(
            &bars,
            timeframe.projection_days(),
            self.config.regression_window,
        );

        let combined = combine::combine(&technical_signals, &sentiment);
        let score = confidence::score(
            &combined,
            Some(sentiment.confidence),
            &technical_signals,
            posts.len(),
            &self.config,
        );
        let breakdown = confidence::breakdown(
            &combined,
            Some(sentiment.confidence),
            &technical_signals,
            posts.len(),
            &self.config,
        );

        let blended = technical::blend_prediction(
            combined.direction,
            score,
            &projection,
            technical_signals.latest_price,
        );

        info!(
            "✓ Prediction for {}: {} (confidence {:.2})",
            ticker, combined.direction, score
        );

        PredictionResult {
            ticker: ticker.to_string(),
            timestamp: Utc::now(),
            timeframe,
            direction: combined.direction,
            confidence: score,
            technical_signals,
            sentiment,
            reasoning: combined.reasoning,
            sources_used,
            posts_analyzed: posts.len(),
            predicted_price: blended.predicted_price,
            confidence_breakdown: Some(breakdown),
        }
    }
}
