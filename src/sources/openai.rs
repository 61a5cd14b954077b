//! OpenAI chat-completions adapter for sentiment analysis.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sentiment;
use crate::sources::alphavantage::{classify_request_error, classify_status};
use crate::types::{Post, Result, SentimentResult, SentimentSource, SourceError};

const SOURCE_NAME: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f64 = 0.3;

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: "https://api.openai.com".to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point the client at a different endpoint, for tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn analyze_posts(&self, posts: &[Post], ticker: &str) -> Result<SentimentResult> {
        let prompt = sentiment::build_analysis_prompt(posts, ticker);

        let request = ChatRequest {
            model: self.model.clone(),
            temperature: TEMPERATURE,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system_message,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user_prompt,
                },
            ],
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_request_error(e, SOURCE_NAME))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(classify_status(status, response, SOURCE_NAME).await);
        }

        let payload: ChatResponse = response.json().await.map_err(|e| SourceError::Malformed {
            origin: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SourceError::Malformed {
                origin: SOURCE_NAME.to_string(),
                message: "empty choices array".to_string(),
            })?;

        debug!("Model returned {} chars of analysis", content.len());
        Ok(sentiment::parse_response(&content))
    }
}

#[async_trait::async_trait]
impl SentimentSource for OpenAiClient {
    async fn analyze(&self, posts: &[Post], ticker: &str) -> Result<SentimentResult> {
        self.analyze_posts(posts, ticker).await
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// Wire types for the chat-completions endpoint
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}
