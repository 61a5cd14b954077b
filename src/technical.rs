//! Technical indicator calculation and regression-based price projection.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EngineConfig;
use crate::types::{
    DataQuality, Direction, PriceBar, SmaPosition, TechnicalSignals, Trend, VolatilityLevel,
};

/// Calculate technical indicators from historical bars.
///
/// Fewer than `min_bars` bars yields the insufficient sentinel. SMA-5,
/// SMA-position and volatility need `sma_short_bars`; SMA-10 and `good`
/// data quality need `sma_long_bars`.
pub fn compute_indicators(bars: &[PriceBar], config: &EngineConfig) -> TechnicalSignals {
    if bars.len() < config.min_bars {
        warn!("Insufficient historical data for technical analysis");
        return TechnicalSignals::insufficient();
    }

    let latest = bars[bars.len() - 1].close;
    let previous = bars[bars.len() - 2].close;

    let trend = if latest > previous {
        Trend::Up
    } else if latest < previous {
        Trend::Down
    } else {
        Trend::Neutral
    };

    let price_change = latest - previous;
    let price_change_percent = if previous == 0.0 {
        0.0
    } else {
        (latest - previous) / previous * 100.0
    };

    let data_quality = if bars.len() >= config.sma_long_bars {
        DataQuality::Good
    } else {
        DataQuality::Limited
    };

    let mut signals = TechnicalSignals {
        trend,
        latest_price: latest,
        price_change,
        price_change_percent,
        data_quality,
        data_points: bars.len(),
        sma_5: None,
        sma_10: None,
        price_vs_sma: None,
        volatility: None,
        volatility_level: None,
    };

    if bars.len() >= config.sma_short_bars {
        let recent: Vec<f64> = bars[bars.len() - config.sma_short_bars..]
            .iter()
            .map(|b| b.close)
            .collect();
        let sma_5 = recent.iter().sum::<f64>() / recent.len() as f64;
        signals.sma_5 = Some(sma_5);
        signals.price_vs_sma = Some(if latest > sma_5 {
            SmaPosition::Above
        } else {
            SmaPosition::Below
        });

        // Population standard deviation of the short window
        let mean = sma_5;
        let variance =
            recent.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / recent.len() as f64;
        let volatility = variance.sqrt();
        signals.volatility = Some(volatility);
        signals.volatility_level = Some(classify_volatility(volatility, mean));
    }

    if bars.len() >= config.sma_long_bars {
        let recent: Vec<f64> = bars[bars.len() - config.sma_long_bars..]
            .iter()
            .map(|b| b.close)
            .collect();
        signals.sma_10 = Some(recent.iter().sum::<f64>() / recent.len() as f64);
    }

    signals
}

/// Classify volatility relative to the mean price
fn classify_volatility(volatility: f64, mean_price: f64) -> VolatilityLevel {
    if mean_price == 0.0 {
        return VolatilityLevel::Unknown;
    }

    let volatility_percent = volatility / mean_price * 100.0;
    if volatility_percent < 2.0 {
        VolatilityLevel::Low
    } else if volatility_percent < 5.0 {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::High
    }
}

/// Forward price projection from ordinary least-squares regression over
/// the index positions of the recent closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceProjection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_price: Option<f64>,
    /// Coefficient of determination of the fit, clamped to [0, 1]
    pub confidence: f64,
    pub trend: Trend,
    pub slope: f64,
    /// Standard deviation of daily returns over the window
    pub volatility: f64,
}

impl PriceProjection {
    fn unavailable() -> Self {
        Self {
            predicted_price: None,
            confidence: 0.0,
            trend: Trend::Neutral,
            slope: 0.0,
            volatility: 0.0,
        }
    }
}

/// Project the close `projection_days` steps ahead using OLS over the last
/// `regression_window` closes. Requires at least 5 bars.
pub fn project_price(
    bars: &[PriceBar],
    projection_days: usize,
    regression_window: usize,
) -> PriceProjection {
    if bars.len() < 5 {
        warn!("Insufficient data for price projection (requires at least 5 bars)");
        return PriceProjection::unavailable();
    }

    let window = regression_window.min(bars.len());
    let prices: Vec<f64> = bars[bars.len() - window..].iter().map(|b| b.close).collect();

    // Daily returns over the window
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    let avg_return = if returns.is_empty() {
        0.0
    } else {
        returns.iter().sum::<f64>() / returns.len() as f64
    };
    let volatility = if returns.is_empty() {
        0.0
    } else {
        (returns.iter().map(|r| (r - avg_return).powi(2)).sum::<f64>() / returns.len() as f64)
            .sqrt()
    };

    let n = prices.len();
    let x_mean = (n as f64 - 1.0) / 2.0;
    let y_mean = prices.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &price) in prices.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (price - y_mean);
        denominator += dx * dx;
    }

    let (slope, intercept) = if denominator == 0.0 {
        warn!("Degenerate regression window, falling back to flat projection");
        (0.0, y_mean)
    } else {
        let slope = numerator / denominator;
        (slope, y_mean - slope * x_mean)
    };

    let next_x = (n + projection_days - 1) as f64;
    let predicted_price = intercept + slope * next_x;

    let trend = if slope > 0.0 {
        Trend::Up
    } else if slope < 0.0 {
        Trend::Down
    } else {
        Trend::Neutral
    };

    // R-squared of the fit, clamped into [0, 1]
    let ss_total: f64 = prices.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_residual: f64 = prices
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();
    let r_squared = if ss_total == 0.0 {
        0.0
    } else {
        1.0 - ss_residual / ss_total
    };
    let confidence = r_squared.clamp(0.0, 1.0);

    PriceProjection {
        predicted_price: Some((predicted_price * 100.0).round() / 100.0),
        confidence,
        trend,
        slope,
        volatility,
    }
}

/// Point price estimate from blending the fused direction with the
/// regression projection: 70% weight to the fused signal, 30% to the
/// projection, each scaled by its own confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendedPrediction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_price: Option<f64>,
    pub combined_confidence: f64,
    pub ai_contribution: Direction,
    pub technical_contribution: Trend,
}

const FUSED_WEIGHT: f64 = 0.7;
const PROJECTION_WEIGHT: f64 = 0.3;

/// Direction's expected fractional price move, before confidence scaling
fn direction_modifier(direction: Direction) -> f64 {
    match direction {
        Direction::StrongBuy => 0.05,
        Direction::Buy => 0.02,
        Direction::Hold => 0.0,
        Direction::Sell => -0.02,
        Direction::StrongSell => -0.05,
    }
}

pub fn blend_prediction(
    direction: Direction,
    fused_confidence: f64,
    projection: &PriceProjection,
    current_price: f64,
) -> BlendedPrediction {
    let ai_modifier = direction_modifier(direction) * fused_confidence;

    if current_price == 0.0 {
        return BlendedPrediction {
            predicted_price: None,
            combined_confidence: fused_confidence,
            ai_contribution: direction,
            technical_contribution: Trend::Neutral,
        };
    }

    let (combined_change, combined_confidence, technical_contribution) =
        match projection.predicted_price {
            Some(projected) => {
                let tech_percent_change = (projected - current_price) / current_price;
                let change = ai_modifier * FUSED_WEIGHT
                    + tech_percent_change * PROJECTION_WEIGHT * projection.confidence;
                let confidence = fused_confidence * FUSED_WEIGHT
                    + projection.confidence * PROJECTION_WEIGHT;
                (change, confidence, projection.trend)
            }
            None => (ai_modifier, fused_confidence, Trend::Neutral),
        };

    let price = current_price * (1.0 + combined_change);

    BlendedPrediction {
        predicted_price: Some((price * 100.0).round() / 100.0),
        combined_confidence,
        ai_contribution: direction,
        technical_contribution,
    }
}
