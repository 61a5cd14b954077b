//! Twitter recent-search adapter.
//!
//! Tries a sequence of query variants (the basic API tier lacks the
//! cashtag operator) and stops at the first one that returns tweets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::sources::alphavantage::{classify_request_error, classify_status};
use crate::types::{AuthorType, Platform, Post, Result, SocialSource, SourceError};

const SOURCE_NAME: &str = "twitter";
/// Recent-search hard cap per request
const MAX_RESULTS: usize = 100;

pub struct TwitterClient {
    client: Client,
    base_url: String,
    bearer_token: String,
    /// Usernames whose posts are tagged as influencer content
    influencers: Vec<String>,
}

impl TwitterClient {
    pub fn new(bearer_token: String, influencers: Vec<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: "https://api.twitter.com".to_string(),
            bearer_token,
            influencers,
        }
    }

    /// Point the client at a different endpoint, for tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn search_recent(&self, ticker: &str, limit: usize) -> Result<Vec<Post>> {
        let query_variants = [
            format!("{ticker} stock -is:retweet lang:en"),
            format!("#{ticker}stock -is:retweet lang:en"),
            format!("{ticker} -is:retweet lang:en"),
        ];

        let mut last_error = None;
        for query in &query_variants {
            match self.run_query(query, limit).await {
                Ok(posts) if !posts.is_empty() => {
                    debug!("Retrieved {} tweets for {} using: {}", posts.len(), ticker, query);
                    return Ok(posts);
                }
                Ok(_) => continue,
                // Classified failures abort the variant loop so the
                // breaker sees them
                Err(error @ SourceError::RateLimited { .. })
                | Err(error @ SourceError::Forbidden { .. }) => return Err(error),
                Err(error) => {
                    warn!("Query variant failed for {}: {}", ticker, error);
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => Ok(Vec::new()),
        }
    }

    async fn run_query(&self, query: &str, limit: usize) -> Result<Vec<Post>> {
        let url = format!("{}/2/tweets/search/recent", self.base_url);
        let max_results = limit.min(MAX_RESULTS).to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", query),
                ("tweet.fields", "author_id,created_at,public_metrics,lang"),
                ("expansions", "author_id"),
                ("user.fields", "name,username,verified"),
                ("max_results", &max_results),
            ])
            .send()
            .await
            .map_err(|e| classify_request_error(e, SOURCE_NAME))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(classify_status(status, response, SOURCE_NAME).await);
        }

        let payload: SearchResponse = response.json().await.map_err(|e| {
            SourceError::Malformed {
                origin: SOURCE_NAME.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(self.into_posts(payload))
    }

    fn into_posts(&self, payload: SearchResponse) -> Vec<Post> {
        let users: HashMap<String, TwitterUser> = payload
            .includes
            .map(|inc| inc.users.into_iter().map(|u| (u.id.clone(), u)).collect())
            .unwrap_or_default();

        payload
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|tweet| {
                let author = tweet
                    .author_id
                    .as_ref()
                    .and_then(|id| users.get(id))
                    .map(|u| u.username.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                let author_type = if self.influencers.iter().any(|i| i.eq_ignore_ascii_case(&author)) {
                    AuthorType::Influencer
                } else {
                    AuthorType::Regular
                };

                Post {
                    platform: Platform::Twitter,
                    id: Some(tweet.id),
                    author,
                    author_type: Some(author_type),
                    text: tweet.text,
                    date: tweet.created_at,
                    metrics: tweet.public_metrics.unwrap_or_default(),
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SocialSource for TwitterClient {
    async fn fetch_posts(&self, ticker: &str, limit: usize, _days_back: u32) -> Result<Vec<Post>> {
        self.search_recent(ticker, limit).await
    }

    fn platform(&self) -> Platform {
        Platform::Twitter
    }
}

// Response types for the Twitter v2 search API
#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    data: Option<Vec<Tweet>>,
    includes: Option<Includes>,
}

#[derive(Debug, serde::Deserialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    public_metrics: Option<HashMap<String, f64>>,
}

#[derive(Debug, serde::Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<TwitterUser>,
}

#[derive(Debug, serde::Deserialize)]
struct TwitterUser {
    id: String,
    username: String,
}
