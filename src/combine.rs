//! Fusion of technical indicators with AI sentiment into one signal.

use crate::types::{
    Alignment, CombinedSignal, Direction, Sentiment, SentimentResult, Strength, TechnicalSignals,
    Trend,
};

/// Maximum AI key factors quoted in the reasoning trail
const MAX_KEY_FACTORS: usize = 3;
/// Maximum AI patterns quoted in the reasoning trail
const MAX_PATTERNS: usize = 2;

/// Fuse technical signals and sentiment analysis into a combined signal.
pub fn combine(technical: &TechnicalSignals, sentiment: &SentimentResult) -> CombinedSignal {
    let direction = resolve_direction(technical.trend, sentiment.sentiment);
    let alignment = assess_alignment(technical.trend, sentiment.sentiment);
    let strength = combined_strength(technical, sentiment.sentiment);
    let reasoning = build_reasoning(technical, sentiment, direction);

    CombinedSignal {
        direction,
        expected_impact: sentiment.impact,
        technical_trend: technical.trend,
        sentiment: sentiment.sentiment,
        reasoning,
        signal_alignment: alignment,
        combined_strength: strength,
    }
}

/// Exact label-pair lookup, then a cascading fallback.
fn resolve_direction(trend: Trend, sentiment: Sentiment) -> Direction {
    match (trend, sentiment) {
        (Trend::Up, Sentiment::Positive) => return Direction::Buy,
        (Trend::Up, Sentiment::VeryPositive) => return Direction::StrongBuy,
        (Trend::Down, Sentiment::Negative) => return Direction::Sell,
        (Trend::Down, Sentiment::VeryNegative) => return Direction::StrongSell,
        (Trend::Neutral, Sentiment::Neutral) => return Direction::Hold,
        _ => {}
    }

    if trend == Trend::Up && sentiment.is_positive_family() {
        if sentiment == Sentiment::VeryPositive {
            Direction::StrongBuy
        } else {
            Direction::Buy
        }
    } else if trend == Trend::Up || sentiment.is_positive_family() {
        Direction::Buy
    } else if trend == Trend::Down && sentiment.is_negative_family() {
        if sentiment == Sentiment::VeryNegative {
            Direction::StrongSell
        } else {
            Direction::Sell
        }
    } else if trend == Trend::Down || sentiment.is_negative_family() {
        Direction::Sell
    } else {
        Direction::Hold
    }
}

/// Classify how the two signal families relate.
///
/// Strong alignment requires literally identical labels across the two
/// vocabularies, which the current vocabularies never produce; kept as-is
/// so downstream score weights are unchanged.
fn assess_alignment(trend: Trend, sentiment: Sentiment) -> Alignment {
    if trend == Trend::Neutral && sentiment == Sentiment::Neutral {
        return Alignment::Neutral;
    }
    if trend.as_str() == sentiment.as_str() {
        return Alignment::StrongAlignment;
    }
    let bullish_pair = trend == Trend::Up && sentiment.is_positive_family();
    let bearish_pair = trend == Trend::Down && sentiment.is_negative_family();
    if bullish_pair || bearish_pair {
        return Alignment::GoodAlignment;
    }
    let contra_up = trend == Trend::Up && sentiment.is_negative_family();
    let contra_down = trend == Trend::Down && sentiment.is_positive_family();
    if contra_up || contra_down {
        return Alignment::Conflicting;
    }
    Alignment::Mixed
}

fn combined_strength(technical: &TechnicalSignals, sentiment: Sentiment) -> Strength {
    let change = technical.price_change_percent.abs();
    let technical_strength = if technical.trend == Trend::Neutral {
        0
    } else if change > 5.0 {
        3
    } else if change > 2.0 {
        2
    } else {
        1
    };

    let sentiment_strength = match sentiment {
        Sentiment::VeryPositive | Sentiment::VeryNegative => 3,
        Sentiment::Positive | Sentiment::Negative => 2,
        Sentiment::Neutral => 0,
    };

    match technical_strength + sentiment_strength {
        total if total >= 5 => Strength::VeryStrong,
        total if total >= 3 => Strength::Strong,
        total if total >= 2 => Strength::Moderate,
        total if total >= 1 => Strength::Weak,
        _ => Strength::VeryWeak,
    }
}

/// Assemble the ordered reasoning trail: AI factors and patterns first,
/// then the AI's own reasoning, then technical statements, closing with
/// the direction justification.
fn build_reasoning(
    technical: &TechnicalSignals,
    sentiment: &SentimentResult,
    direction: Direction,
) -> Vec<String> {
    let mut reasoning = Vec::new();

    if !sentiment.key_factors.is_empty() {
        let factors: Vec<&str> = sentiment
            .key_factors
            .iter()
            .take(MAX_KEY_FACTORS)
            .map(String::as_str)
            .collect();
        reasoning.push(format!("Key factors: {}", factors.join(", ")));
    }

    if !sentiment.patterns.is_empty() {
        let patterns: Vec<&str> = sentiment
            .patterns
            .iter()
            .take(MAX_PATTERNS)
            .map(String::as_str)
            .collect();
        reasoning.push(format!("Patterns: {}", patterns.join(", ")));
    }

    if !sentiment.reasoning.is_empty() {
        reasoning.push(format!("AI: {}", sentiment.reasoning));
    }

    if technical.trend != Trend::Neutral {
        reasoning.push(format!(
            "Technical: {} trend ({:.1}% change)",
            technical.trend, technical.price_change_percent
        ));
    }

    if let Some(position) = technical.price_vs_sma {
        reasoning.push(format!("Price is {} moving average", position));
    }

    if let Some(level) = technical.volatility_level {
        reasoning.push(format!("Market volatility: {}", level));
    }

    reasoning.push(direction_justification(
        technical.trend,
        sentiment.sentiment,
        direction,
    ));

    reasoning
}

fn direction_justification(trend: Trend, sentiment: Sentiment, direction: Direction) -> String {
    match direction {
        Direction::StrongBuy | Direction::StrongSell => format!(
            "Both technical ({}) and sentiment ({}) signals align strongly",
            trend, sentiment
        ),
        Direction::Buy | Direction::Sell => {
            if trend != Trend::Neutral && sentiment != Sentiment::Neutral {
                format!(
                    "Technical ({}) and sentiment ({}) signals support {}",
                    trend, sentiment, direction
                )
            } else if trend != Trend::Neutral {
                format!("Technical signal ({}) suggests {}", trend, direction)
            } else {
                format!("Sentiment signal ({}) suggests {}", sentiment, direction)
            }
        }
        Direction::Hold => "Mixed or neutral signals suggest holding position".to_string(),
    }
}
