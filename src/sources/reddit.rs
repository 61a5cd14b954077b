//! Reddit search adapter over the public JSON listing API.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::sources::alphavantage::{classify_request_error, classify_status};
use crate::types::{AuthorType, Platform, Post, Result, SocialSource, SourceError};

const SOURCE_NAME: &str = "reddit";
const USER_AGENT: &str = "prediction-engine/0.1 (stock signal research)";

const DEFAULT_SUBREDDITS: &[&str] = &[
    "wallstreetbets",
    "stocks",
    "investing",
    "StockMarket",
    "SecurityAnalysis",
];
/// Subreddits whose posts are tagged as higher-quality discussion
const QUALITY_SUBREDDITS: &[&str] = &["SecurityAnalysis", "investing"];

pub struct RedditClient {
    client: Client,
    base_url: String,
    subreddits: Vec<String>,
}

impl RedditClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: "https://www.reddit.com".to_string(),
            subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Point the client at a different endpoint, for tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_subreddits(mut self, subreddits: Vec<String>) -> Self {
        self.subreddits = subreddits;
        self
    }

    pub async fn search(&self, ticker: &str, limit: usize, days_back: u32) -> Result<Vec<Post>> {
        let cutoff = Utc::now() - Duration::days(days_back as i64);
        let mut posts = Vec::new();

        for subreddit in &self.subreddits {
            match self.search_subreddit(subreddit, ticker, limit, cutoff).await {
                Ok(found) => {
                    debug!("r/{}: {} posts for {}", subreddit, found.len(), ticker);
                    posts.extend(found);
                }
                // A block on one subreddit means the client as a whole is
                // blocked; surface it so the breaker trips
                Err(error @ SourceError::Forbidden { .. })
                | Err(error @ SourceError::RateLimited { .. }) => return Err(error),
                Err(error) => {
                    warn!("r/{} search failed for {}: {}", subreddit, ticker, error);
                }
            }
            if posts.len() >= limit {
                break;
            }
        }

        posts.truncate(limit);
        Ok(posts)
    }

    async fn search_subreddit(
        &self,
        subreddit: &str,
        ticker: &str,
        limit: usize,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let url = format!("{}/r/{}/search.json", self.base_url, subreddit);
        let limit_param = limit.max(5).to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", ticker),
                ("restrict_sr", "on"),
                ("sort", "new"),
                ("t", "week"),
                ("limit", &limit_param),
            ])
            .send()
            .await
            .map_err(|e| classify_request_error(e, SOURCE_NAME))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(classify_status(status, response, SOURCE_NAME).await);
        }

        let payload: Listing = response.json().await.map_err(|e| SourceError::Malformed {
            origin: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })?;

        let author_type = if QUALITY_SUBREDDITS.contains(&subreddit) {
            AuthorType::HighQualitySubreddit
        } else {
            AuthorType::Regular
        };

        let posts = payload
            .data
            .children
            .into_iter()
            .filter_map(|child| {
                let item = child.data;
                let date = DateTime::from_timestamp(item.created_utc as i64, 0)?;
                if date < cutoff {
                    return None;
                }

                let mut metrics = HashMap::new();
                metrics.insert("score".to_string(), item.score);
                metrics.insert("comments".to_string(), item.num_comments);
                if let Some(ratio) = item.upvote_ratio {
                    metrics.insert("upvote_ratio".to_string(), ratio);
                }

                let text = match item.selftext.as_deref() {
                    Some(body) if !body.is_empty() => format!("{}\n{}", item.title, body),
                    _ => item.title.clone(),
                };

                Some(Post {
                    platform: Platform::Reddit,
                    id: Some(item.id),
                    author: item.author.unwrap_or_else(|| "[deleted]".to_string()),
                    author_type: Some(author_type),
                    text,
                    date: Some(date),
                    metrics,
                })
            })
            .collect();

        Ok(posts)
    }
}

impl Default for RedditClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SocialSource for RedditClient {
    async fn fetch_posts(&self, ticker: &str, limit: usize, days_back: u32) -> Result<Vec<Post>> {
        self.search(ticker, limit, days_back).await
    }

    fn platform(&self) -> Platform {
        Platform::Reddit
    }
}

// Response types for the Reddit listing API
#[derive(Debug, serde::Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, serde::Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, serde::Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, serde::Deserialize)]
struct Submission {
    id: String,
    author: Option<String>,
    title: String,
    selftext: Option<String>,
    created_utc: f64,
    score: f64,
    num_comments: f64,
    upvote_ratio: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing_body(id: &str, created_utc: i64) -> serde_json::Value {
        serde_json::json!({
            "data": {
                "children": [{
                    "data": {
                        "id": id,
                        "author": "diamond_hands",
                        "title": "TSLA earnings discussion",
                        "selftext": "What does everyone think?",
                        "created_utc": created_utc,
                        "score": 42,
                        "num_comments": 7,
                        "upvote_ratio": 0.91
                    }
                }]
            }
        })
    }

    #[tokio::test]
    async fn test_search_maps_posts() {
        let server = MockServer::start().await;
        let now = Utc::now().timestamp();
        Mock::given(method("GET"))
            .and(path("/r/wallstreetbets/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_body("abc", now)))
            .mount(&server)
            .await;

        let client = RedditClient::new()
            .with_base_url(server.uri())
            .with_subreddits(vec!["wallstreetbets".to_string()]);
        let posts = client.search("TSLA", 25, 1).await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].platform, Platform::Reddit);
        assert_eq!(posts[0].author, "diamond_hands");
        assert!(posts[0].text.starts_with("TSLA earnings discussion\n"));
        assert_eq!(posts[0].metrics.get("score"), Some(&42.0));
        assert_eq!(posts[0].metrics.get("upvote_ratio"), Some(&0.91));
    }

    #[tokio::test]
    async fn test_old_posts_filtered_by_cutoff() {
        let server = MockServer::start().await;
        let old = (Utc::now() - Duration::days(5)).timestamp();
        Mock::given(method("GET"))
            .and(path("/r/stocks/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_body("old", old)))
            .mount(&server)
            .await;

        let client = RedditClient::new()
            .with_base_url(server.uri())
            .with_subreddits(vec!["stocks".to_string()]);
        let posts = client.search("TSLA", 25, 1).await.unwrap();

        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_403_classified_as_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Blocked"))
            .mount(&server)
            .await;

        let client = RedditClient::new().with_base_url(server.uri());
        let error = client.search("TSLA", 25, 1).await.unwrap_err();

        assert!(matches!(error, SourceError::Forbidden { .. }));
        assert!(error.trips_breaker().is_some());
    }

    #[tokio::test]
    async fn test_quality_subreddit_tagging() {
        let server = MockServer::start().await;
        let now = Utc::now().timestamp();
        Mock::given(method("GET"))
            .and(path("/r/SecurityAnalysis/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_body("q1", now)))
            .mount(&server)
            .await;

        let client = RedditClient::new()
            .with_base_url(server.uri())
            .with_subreddits(vec!["SecurityAnalysis".to_string()]);
        let posts = client.search("TSLA", 25, 1).await.unwrap();

        assert_eq!(posts[0].author_type, Some(AuthorType::HighQualitySubreddit));
    }
}
