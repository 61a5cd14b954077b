//! Confidence scoring for fused predictions.
//!
//! Four weighted factors produce a raw score, a direction multiplier
//! adjusts it, and the result is clamped to [0.1, 0.95] and rounded to
//! two decimals. The score is always produced; a non-finite intermediate
//! falls back to a conservative 0.4.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::types::{
    AiConfidence, Alignment, CombinedSignal, DataQuality, Direction, Strength, TechnicalSignals,
};

const BASE_FACTOR: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.4;
/// Post count at which the posts factor saturates
const POSTS_SATURATION: f64 = 20.0;

/// One weighted component of the confidence score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorContribution {
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl FactorContribution {
    fn new(value: f64, weight: f64) -> Self {
        Self {
            value,
            weight,
            contribution: value * weight,
        }
    }
}

/// Detailed breakdown of a confidence calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub ai_confidence: FactorContribution,
    pub data_quality: FactorContribution,
    pub signal_alignment: FactorContribution,
    pub prediction_multiplier: f64,
    pub posts_analyzed: usize,
    pub technical_data_quality: DataQuality,
    pub combined_strength: Strength,
}

/// Score a fused prediction.
pub fn score(
    combined: &CombinedSignal,
    ai_confidence: Option<AiConfidence>,
    technical: &TechnicalSignals,
    post_count: usize,
    config: &EngineConfig,
) -> f64 {
    let ai_factor = ai_confidence_factor(ai_confidence);
    let data_factor = data_quality_factor(post_count, technical);
    let alignment_factor = signal_alignment_factor(combined);
    let multiplier = prediction_multiplier(combined);

    let raw = BASE_FACTOR * config.weight_base
        + ai_factor * config.weight_ai_confidence
        + data_factor * config.weight_data_quality
        + alignment_factor * config.weight_signal_alignment;

    let adjusted = raw * multiplier;
    if !adjusted.is_finite() {
        error!("Non-finite confidence intermediate, using fallback");
        return FALLBACK_CONFIDENCE;
    }

    let bounded = adjusted.clamp(config.min_confidence, config.max_confidence);
    let rounded = (bounded * 100.0).round() / 100.0;

    debug!(
        ai_factor,
        data_factor, alignment_factor, multiplier, confidence = rounded,
        "Confidence calculation"
    );

    rounded
}

/// Full component breakdown alongside the inputs that drove it.
pub fn breakdown(
    combined: &CombinedSignal,
    ai_confidence: Option<AiConfidence>,
    technical: &TechnicalSignals,
    post_count: usize,
    config: &EngineConfig,
) -> ConfidenceBreakdown {
    ConfidenceBreakdown {
        ai_confidence: FactorContribution::new(
            ai_confidence_factor(ai_confidence),
            config.weight_ai_confidence,
        ),
        data_quality: FactorContribution::new(
            data_quality_factor(post_count, technical),
            config.weight_data_quality,
        ),
        signal_alignment: FactorContribution::new(
            signal_alignment_factor(combined),
            config.weight_signal_alignment,
        ),
        prediction_multiplier: prediction_multiplier(combined),
        posts_analyzed: post_count,
        technical_data_quality: technical.data_quality,
        combined_strength: combined.combined_strength,
    }
}

/// Map the AI's self-reported confidence; missing values land midway
fn ai_confidence_factor(ai_confidence: Option<AiConfidence>) -> f64 {
    match ai_confidence {
        Some(AiConfidence::Low) => 0.3,
        Some(AiConfidence::Medium) => 0.6,
        Some(AiConfidence::High) => 0.9,
        None => 0.5,
    }
}

fn data_quality_factor(post_count: usize, technical: &TechnicalSignals) -> f64 {
    let posts_factor = (post_count as f64 / POSTS_SATURATION).min(1.0);
    let tech_factor = if technical.data_quality == DataQuality::Good {
        1.0
    } else {
        0.7
    };
    posts_factor * 0.6 + tech_factor * 0.4
}

fn signal_alignment_factor(combined: &CombinedSignal) -> f64 {
    let alignment_score = match combined.signal_alignment {
        Alignment::StrongAlignment => 1.0,
        Alignment::GoodAlignment => 0.8,
        Alignment::Neutral => 0.6,
        Alignment::Mixed => 0.4,
        Alignment::Conflicting => 0.2,
    };
    let strength_score = match combined.combined_strength {
        Strength::VeryStrong => 1.0,
        Strength::Strong => 0.8,
        Strength::Moderate => 0.6,
        Strength::Weak => 0.4,
        Strength::VeryWeak => 0.2,
    };
    alignment_score * 0.6 + strength_score * 0.4
}

/// Strong calls are boosted only when the signals back them up; holds
/// carry reduced confidence.
fn prediction_multiplier(combined: &CombinedSignal) -> f64 {
    match combined.direction {
        Direction::StrongBuy | Direction::StrongSell => match combined.signal_alignment {
            Alignment::StrongAlignment | Alignment::GoodAlignment => 1.2,
            _ => 0.8,
        },
        Direction::Buy | Direction::Sell => 1.0,
        Direction::Hold => 0.8,
    }
}
