//! Per-timeframe confidence weights
//!
//! Weekly bars carry more information per bar, so the weekly table raises the
//! bases, the trend bonus and the minimum confidence relative to daily.

use serde::{Deserialize, Serialize};

use crate::Timeframe;

/// Two-bar reversal scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoBarWeights {
    pub base_confirmed: f64,
    pub base_unconfirmed: f64,
    pub volume_bonus: f64,
    pub price_break_bonus: f64,
    /// Applied per proximity condition, unconfirmed setups only
    pub proximity_bonus: f64,
    pub trend_penalty: f64,
    pub trend_bonus: f64,
    pub min_confidence: f64,
}

/// W-bottom scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WBottomWeights {
    pub base_confirmed: f64,
    /// Lows within 3%
    pub perfect_symmetry_bonus: f64,
    /// Lows within 5%
    pub good_symmetry_bonus: f64,
    pub bb_recovery_bonus: f64,
    pub max_low_diff: f64,
}

/// Bollinger bounce / rejection scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BollingerWeights {
    pub base_confidence: f64,
    pub recovery_bonus: f64,
    pub volume_bonus: f64,
    pub squeeze_bonus: f64,
    pub price_break_bonus: f64,
    pub trend_penalty: f64,
    pub trend_bonus: f64,
    /// Bullish bounces below this are dropped
    pub min_bullish_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternWeights {
    pub two_bar_reversal: TwoBarWeights,
    pub w_bottom: WBottomWeights,
    pub bollinger: BollingerWeights,
}

pub const DAILY_WEIGHTS: PatternWeights = PatternWeights {
    two_bar_reversal: TwoBarWeights {
        base_confirmed: 96.0,
        base_unconfirmed: 80.0,
        volume_bonus: 24.0,
        price_break_bonus: 24.0,
        proximity_bonus: 15.0,
        trend_penalty: 18.0,
        trend_bonus: 38.0,
        min_confidence: 88.0,
    },
    w_bottom: WBottomWeights {
        base_confirmed: 96.0,
        perfect_symmetry_bonus: 24.0,
        good_symmetry_bonus: 16.0,
        bb_recovery_bonus: 24.0,
        max_low_diff: 0.08,
    },
    bollinger: BollingerWeights {
        base_confidence: 84.0,
        recovery_bonus: 16.0,
        volume_bonus: 24.0,
        squeeze_bonus: 24.0,
        price_break_bonus: 24.0,
        trend_penalty: 18.0,
        trend_bonus: 38.0,
        min_bullish_confidence: 65.0,
    },
};

pub const WEEKLY_WEIGHTS: PatternWeights = PatternWeights {
    two_bar_reversal: TwoBarWeights {
        base_confirmed: 98.0,
        base_unconfirmed: 85.0,
        volume_bonus: 25.0,
        price_break_bonus: 25.0,
        proximity_bonus: 15.0,
        trend_penalty: 15.0,
        trend_bonus: 55.0,
        min_confidence: 92.0,
    },
    w_bottom: WBottomWeights {
        base_confirmed: 98.0,
        perfect_symmetry_bonus: 25.0,
        good_symmetry_bonus: 18.0,
        bb_recovery_bonus: 35.0,
        max_low_diff: 0.12,
    },
    bollinger: BollingerWeights {
        base_confidence: 88.0,
        recovery_bonus: 18.0,
        volume_bonus: 25.0,
        squeeze_bonus: 38.0,
        price_break_bonus: 25.0,
        trend_penalty: 15.0,
        trend_bonus: 55.0,
        min_bullish_confidence: 65.0,
    },
};

/// Weight table for a timeframe
#[inline]
pub fn weights_for(timeframe: Timeframe) -> &'static PatternWeights {
    match timeframe {
        Timeframe::Daily => &DAILY_WEIGHTS,
        Timeframe::Weekly => &WEEKLY_WEIGHTS,
    }
}
