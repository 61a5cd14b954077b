//! Prompt construction and response parsing for AI sentiment analysis.
//!
//! Model output is untrusted text. Parsing runs a cascade: direct JSON,
//! then a fenced ```json block, then the outermost brace span, then a
//! keyword heuristic over the raw text. Every path ends in a valid
//! [`SentimentResult`].

use serde_json::Value;
use tracing::debug;

use crate::types::{AiConfidence, Impact, Post, Sentiment, SentimentResult};

/// Cap on posts included in the prompt to stay inside token limits
const MAX_PROMPT_POSTS: usize = 15;
/// Cap on characters quoted from a single post
const MAX_POST_CHARS: usize = 500;

pub struct AnalysisPrompt {
    pub system_message: String,
    pub user_prompt: String,
}

/// Build the chat prompt for the sentiment model.
pub fn build_analysis_prompt(posts: &[Post], ticker: &str) -> AnalysisPrompt {
    if posts.is_empty() {
        return AnalysisPrompt {
            system_message: "You are a financial analyst AI.".to_string(),
            user_prompt: format!(
                "No posts available for analysis of {}. Provide neutral analysis.",
                ticker
            ),
        };
    }

    let formatted_posts: Vec<String> = posts
        .iter()
        .take(MAX_PROMPT_POSTS)
        .map(|post| {
            let text: String = post.text.chars().take(MAX_POST_CHARS).collect();
            format!("Post by {} ({}): {}", post.author, post.platform, text)
        })
        .collect();

    let system_message = "You are a financial analyst AI specializing in social media sentiment \
         analysis for stock prediction. Provide accurate, unbiased analysis based on the \
         provided data."
        .to_string();

    let user_prompt = format!(
        "Analyze the following social media posts about {ticker} stock and determine:\n\
         1. The overall sentiment (very negative, negative, neutral, positive, very positive)\n\
         2. The potential impact on stock price (significant decrease, moderate decrease, \
         minimal change, moderate increase, significant increase)\n\
         3. The confidence level of your prediction (low, medium, high)\n\
         4. Key factors mentioned that could influence stock price (list of specific factors)\n\
         5. Notable patterns or trends in the discussion\n\n\
         Posts ({total} total, showing first {shown}):\n{posts}\n\n\
         Please return your analysis in the following JSON format:\n\
         {{\n\
         \x20   \"sentiment\": \"one of: very negative, negative, neutral, positive, very positive\",\n\
         \x20   \"impact\": \"one of: significant decrease, moderate decrease, minimal change, moderate increase, significant increase\",\n\
         \x20   \"confidence\": \"one of: low, medium, high\",\n\
         \x20   \"key_factors\": [\"list\", \"of\", \"key\", \"factors\"],\n\
         \x20   \"patterns\": [\"notable\", \"patterns\", \"or\", \"trends\"],\n\
         \x20   \"reasoning\": \"Brief explanation of your analysis\"\n\
         }}",
        ticker = ticker,
        total = posts.len(),
        shown = posts.len().min(MAX_PROMPT_POSTS),
        posts = formatted_posts.join("\n"),
    );

    AnalysisPrompt {
        system_message,
        user_prompt,
    }
}

/// Parse a raw model response into a normalized [`SentimentResult`].
pub fn parse_response(raw: &str) -> SentimentResult {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        debug!("Parsed sentiment response as direct JSON");
        return normalize(&value, raw);
    }

    if let Some(block) = extract_fenced_json(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&block) {
            debug!("Extracted sentiment JSON from fenced code block");
            return normalize(&value, raw);
        }
    }

    if let Some(span) = extract_brace_span(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            debug!("Extracted sentiment JSON from brace span");
            return normalize(&value, raw);
        }
    }

    debug!("Falling back to keyword heuristic for sentiment response");
    parse_unstructured(raw)
}

/// Contents of the first ```json fenced block, if present
fn extract_fenced_json(raw: &str) -> Option<String> {
    let start = raw.find("```json")? + "```json".len();
    let rest = &raw[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

/// Span from the first `{` to the last `}`, if both exist in order
fn extract_brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        Some(&raw[start..=end])
    } else {
        None
    }
}

fn normalize(value: &Value, raw: &str) -> SentimentResult {
    let sentiment = value
        .get("sentiment")
        .and_then(Value::as_str)
        .map(normalize_sentiment)
        .unwrap_or(Sentiment::Neutral);
    let impact = value
        .get("impact")
        .and_then(Value::as_str)
        .map(normalize_impact)
        .unwrap_or(Impact::MinimalChange);
    let confidence = value
        .get("confidence")
        .and_then(Value::as_str)
        .map(normalize_confidence)
        .unwrap_or(AiConfidence::Medium);

    let string_list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| truncate_reasoning(raw));

    SentimentResult {
        sentiment,
        impact,
        confidence,
        key_factors: string_list("key_factors"),
        patterns: string_list("patterns"),
        reasoning,
    }
}

/// Map a free-form sentiment label onto the five-point scale.
pub fn normalize_sentiment(label: &str) -> Sentiment {
    let label = label.to_lowercase();
    match label.as_str() {
        "very negative" => return Sentiment::VeryNegative,
        "negative" => return Sentiment::Negative,
        "neutral" => return Sentiment::Neutral,
        "positive" => return Sentiment::Positive,
        "very positive" => return Sentiment::VeryPositive,
        _ => {}
    }
    if label.contains("very") && label.contains("positive") {
        Sentiment::VeryPositive
    } else if label.contains("very") && label.contains("negative") {
        Sentiment::VeryNegative
    } else if label.contains("positive") {
        Sentiment::Positive
    } else if label.contains("negative") {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

pub fn normalize_impact(label: &str) -> Impact {
    let label = label.to_lowercase();
    match label.as_str() {
        "significant decrease" => return Impact::SignificantDecrease,
        "moderate decrease" => return Impact::ModerateDecrease,
        "minimal change" => return Impact::MinimalChange,
        "moderate increase" => return Impact::ModerateIncrease,
        "significant increase" => return Impact::SignificantIncrease,
        _ => {}
    }
    let rising = label.contains("increase") || label.contains("up");
    let falling = label.contains("decrease") || label.contains("down");
    if label.contains("significant") && rising {
        Impact::SignificantIncrease
    } else if label.contains("significant") && falling {
        Impact::SignificantDecrease
    } else if label.contains("moderate") && rising {
        Impact::ModerateIncrease
    } else if label.contains("moderate") && falling {
        Impact::ModerateDecrease
    } else {
        Impact::MinimalChange
    }
}

pub fn normalize_confidence(label: &str) -> AiConfidence {
    match label.to_lowercase().as_str() {
        "low" => AiConfidence::Low,
        "high" => AiConfidence::High,
        _ => AiConfidence::Medium,
    }
}

/// Keyword heuristic over free text when no JSON can be recovered
fn parse_unstructured(content: &str) -> SentimentResult {
    let lower = content.to_lowercase();

    let sentiment = if lower.contains("very positive") || lower.contains("extremely positive") {
        Sentiment::VeryPositive
    } else if lower.contains("positive") {
        Sentiment::Positive
    } else if lower.contains("very negative") || lower.contains("extremely negative") {
        Sentiment::VeryNegative
    } else if lower.contains("negative") {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };

    let impact = if lower.contains("significant increase") || lower.contains("major increase") {
        Impact::SignificantIncrease
    } else if lower.contains("moderate increase") || lower.contains("slight increase") {
        Impact::ModerateIncrease
    } else if lower.contains("significant decrease") || lower.contains("major decrease") {
        Impact::SignificantDecrease
    } else if lower.contains("moderate decrease") || lower.contains("slight decrease") {
        Impact::ModerateDecrease
    } else {
        Impact::MinimalChange
    };

    let confidence = if lower.contains("high confidence") || lower.contains("very confident") {
        AiConfidence::High
    } else if lower.contains("low confidence") || lower.contains("uncertain") {
        AiConfidence::Low
    } else {
        AiConfidence::Medium
    };

    SentimentResult {
        sentiment,
        impact,
        confidence,
        key_factors: Vec::new(),
        patterns: Vec::new(),
        reasoning: truncate_reasoning(content),
    }
}

fn truncate_reasoning(content: &str) -> String {
    if content.chars().count() > 200 {
        let head: String = content.chars().take(200).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorType, Platform};
    use std::collections::HashMap;

    fn post(author: &str, text: &str) -> Post {
        Post {
            platform: Platform::Twitter,
            id: Some("1".to_string()),
            author: author.to_string(),
            author_type: Some(AuthorType::Regular),
            text: text.to_string(),
            date: None,
            metrics: HashMap::new(),
        }
    }

    #[test]
    fn test_prompt_empty_posts() {
        let prompt = build_analysis_prompt(&[], "AAPL");
        assert!(prompt.user_prompt.contains("No posts available"));
        assert!(prompt.user_prompt.contains("AAPL"));
    }

    #[test]
    fn test_prompt_caps_posts_and_reports_totals() {
        let posts: Vec<Post> = (0..20).map(|i| post(&format!("u{i}"), "bullish")).collect();
        let prompt = build_analysis_prompt(&posts, "TSLA");
        assert!(prompt.user_prompt.contains("20 total, showing first 15"));
        assert!(prompt.user_prompt.contains("Post by u14"));
        assert!(!prompt.user_prompt.contains("Post by u15"));
    }

    #[test]
    fn test_parse_direct_json() {
        let raw = r#"{"sentiment": "positive", "impact": "moderate increase",
                      "confidence": "high", "key_factors": ["earnings beat"],
                      "patterns": ["momentum"], "reasoning": "Strong quarter"}"#;
        let result = parse_response(raw);
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.impact, Impact::ModerateIncrease);
        assert_eq!(result.confidence, AiConfidence::High);
        assert_eq!(result.key_factors, vec!["earnings beat"]);
        assert_eq!(result.reasoning, "Strong quarter");
    }

    #[test]
    fn test_parse_fenced_block() {
        let raw = "Here is my analysis:\n```json\n{\"sentiment\": \"very negative\", \
                   \"impact\": \"significant decrease\", \"confidence\": \"low\", \
                   \"key_factors\": [], \"patterns\": [], \"reasoning\": \"bad news\"}\n```\nDone.";
        let result = parse_response(raw);
        assert_eq!(result.sentiment, Sentiment::VeryNegative);
        assert_eq!(result.impact, Impact::SignificantDecrease);
        assert_eq!(result.confidence, AiConfidence::Low);
    }

    #[test]
    fn test_parse_embedded_brace_span() {
        let raw = "The model says {\"sentiment\": \"very positive\", \"impact\": \
                   \"significant increase\", \"confidence\": \"medium\"} which looks right";
        let result = parse_response(raw);
        assert_eq!(result.sentiment, Sentiment::VeryPositive);
        assert_eq!(result.impact, Impact::SignificantIncrease);
        assert!(result.key_factors.is_empty());
    }

    #[test]
    fn test_keyword_fallback() {
        let raw = "Overall the discussion is positive with a moderate increase likely. \
                   High confidence in this read.";
        let result = parse_response(raw);
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.impact, Impact::ModerateIncrease);
        assert_eq!(result.confidence, AiConfidence::High);
        assert_eq!(result.reasoning, raw);
    }

    #[test]
    fn test_keyword_fallback_neutral_default() {
        let result = parse_response("nothing actionable here");
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert_eq!(result.impact, Impact::MinimalChange);
        assert_eq!(result.confidence, AiConfidence::Medium);
    }

    #[test]
    fn test_fallback_reasoning_truncated() {
        let long = "x".repeat(300);
        let result = parse_response(&long);
        assert_eq!(result.reasoning.chars().count(), 203);
        assert!(result.reasoning.ends_with("..."));
    }

    #[test]
    fn test_normalize_offscale_labels() {
        assert_eq!(normalize_sentiment("Very Positive!"), Sentiment::VeryPositive);
        assert_eq!(normalize_sentiment("somewhat negative"), Sentiment::Negative);
        assert_eq!(normalize_sentiment("bullish"), Sentiment::Neutral);
        assert_eq!(normalize_impact("significant upside"), Impact::SignificantIncrease);
        assert_eq!(normalize_impact("moderate downturn"), Impact::ModerateDecrease);
        assert_eq!(normalize_impact("who knows"), Impact::MinimalChange);
        assert_eq!(normalize_confidence("HIGH"), AiConfidence::High);
        assert_eq!(normalize_confidence("maybe"), AiConfidence::Medium);
    }
}
