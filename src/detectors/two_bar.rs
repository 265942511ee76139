//! Two-bar reversal detector
//!
//! A wide-range bar followed by a similar-bodied bar in the opposite direction,
//! scored by how the pair sits against the Bollinger bands.

use super::helpers::{band_position, passes_bullish_trend_gate, trend_adjustment};
use crate::{
    DetectionInput, Direction, OHLCVExt, Result, Signal, SignalDetector, SignalMetadata,
    SignalType, TwoBarMetadata,
};

/// Two-bar reversal (bullish and bearish)
#[derive(Debug, Clone)]
pub struct TwoBarReversalDetector {
    /// min(body) / max(body) across the pair
    pub min_body_similarity: f64,
    /// Current bar alone is wide: range >= atr * wide_range_atr
    pub wide_range_atr: f64,
    /// Or both bars moderately wide: prev >= atr * prev_range_atr ...
    pub prev_range_atr: f64,
    /// ... and curr >= atr * curr_range_atr
    pub curr_range_atr: f64,
    /// Down bars examined before a bullish setup
    pub capitulation_bars: usize,
    /// Bullish rejected when those bars' declines sum above this
    pub capitulation_decline: f64,
    /// Near-breach tolerance as a fraction of the band
    pub near_band_tolerance: f64,
    /// Band position counted as extreme (mirrored for bearish)
    pub extreme_position: f64,
}

impl Default for TwoBarReversalDetector {
    fn default() -> Self {
        Self {
            min_body_similarity: 0.7,
            wide_range_atr: 1.8,
            prev_range_atr: 1.5,
            curr_range_atr: 1.2,
            capitulation_bars: 5,
            capitulation_decline: 0.15,
            near_band_tolerance: 0.01,
            extreme_position: 0.3,
        }
    }
}

impl TwoBarReversalDetector {
    fn is_wide_range<T: OHLCVExt>(&self, prev: &T, curr: &T, prev_atr: f64, curr_atr: f64) -> bool {
        curr.range() >= curr_atr * self.wide_range_atr
            || (prev.range() >= prev_atr * self.prev_range_atr
                && curr.range() >= curr_atr * self.curr_range_atr)
    }

    fn bodies_similar<T: OHLCVExt>(&self, prev: &T, curr: &T) -> bool {
        let (a, b) = (prev.body(), curr.body());
        let max = a.max(b);
        max > 0.0 && a.min(b) / max >= self.min_body_similarity
    }

    /// Run of down bars right before `index` losing more than `capitulation_decline` in sum.
    fn after_capitulation(&self, input: &DetectionInput<'_>, index: usize) -> bool {
        if self.capitulation_bars == 0 || index < self.capitulation_bars {
            return false;
        }
        let run = &input.bars[index - self.capitulation_bars..index];
        if !run.iter().all(|b| b.is_bearish()) {
            return false;
        }
        let decline: f64 = run
            .iter()
            .filter(|b| b.open > 0.0)
            .map(|b| (b.open - b.close) / b.open)
            .sum();
        decline > self.capitulation_decline
    }

    fn score(&self, input: &DetectionInput<'_>, index: usize, direction: Direction) -> Option<Signal> {
        let w = &input.weights.two_bar_reversal;
        let prev = &input.bars[index - 1];
        let curr = &input.bars[index];
        let (prev_lower, prev_upper) = input.bands[index - 1].bounds()?;
        let (curr_lower, curr_upper) = input.bands[index].bounds()?;
        let ctx = &input.contexts[index];

        let inside = curr.close >= curr_lower && curr.close <= curr_upper;
        let position = band_position(curr.close, curr_lower, curr_upper);
        let (breached, bb_recovery, near_breach, extreme, price_break) = match direction {
            Direction::Buy => {
                let breached = prev.low < prev_lower;
                (
                    breached,
                    breached && curr.close >= curr_lower,
                    prev.low < curr_lower * (1.0 + self.near_band_tolerance),
                    position < self.extreme_position,
                    curr.close > prev.high,
                )
            }
            Direction::Sell => {
                let breached = prev.high > prev_upper;
                (
                    breached,
                    breached && curr.close <= curr_upper,
                    prev.high > curr_upper * (1.0 - self.near_band_tolerance),
                    position > 1.0 - self.extreme_position,
                    curr.close < prev.low,
                )
            }
        };
        let confirmed = breached && inside;
        let volume_confirm = ctx.volume_confirms(curr.volume);

        if direction.is_buy() {
            if !passes_bullish_trend_gate(ctx.trend, confirmed, volume_confirm) {
                return None;
            }
            if self.after_capitulation(input, index) {
                return None;
            }
        }

        let mut confidence = if confirmed { w.base_confirmed } else { w.base_unconfirmed };
        confidence += trend_adjustment(ctx.trend, direction, w.trend_penalty, w.trend_bonus);
        if volume_confirm {
            confidence += w.volume_bonus;
        }
        if price_break {
            confidence += w.price_break_bonus;
        }
        if !confirmed {
            if near_breach {
                confidence += w.proximity_bonus;
            }
            if extreme {
                confidence += w.proximity_bonus;
            }
        }
        let confidence = confidence.min(100.0);
        if confidence < w.min_confidence {
            return None;
        }

        let signal_type = match direction {
            Direction::Buy => SignalType::TwoBarBullish,
            Direction::Sell => SignalType::TwoBarBearish,
        };
        Some(Signal {
            index,
            date: curr.date,
            signal_type,
            direction,
            confidence,
            price: curr.close,
            confirmed,
            metadata: SignalMetadata::TwoBar(TwoBarMetadata {
                trend: ctx.trend,
                volume_confirm,
                volume_ratio: ctx.volume_ratio(curr.volume),
                price_position: position,
                bb_recovery,
                near_breach,
                price_break,
            }),
        })
    }
}

impl SignalDetector for TwoBarReversalDetector {
    fn signal_types(&self) -> &'static [SignalType] {
        &[SignalType::TwoBarBullish, SignalType::TwoBarBearish]
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<Signal> {
        let mut signals = Vec::new();
        for i in 1..input.len() {
            let (Some(prev_atr), Some(curr_atr)) = (input.atr[i - 1], input.atr[i]) else {
                continue;
            };
            let prev = &input.bars[i - 1];
            let curr = &input.bars[i];
            if !self.is_wide_range(prev, curr, prev_atr, curr_atr) || !self.bodies_similar(prev, curr) {
                continue;
            }

            let direction = if prev.is_bearish() && curr.is_bullish() {
                Direction::Buy
            } else if prev.is_bullish() && curr.is_bearish() {
                Direction::Sell
            } else {
                continue;
            };
            if let Some(signal) = self.score(input, i, direction) {
                signals.push(signal);
            }
        }
        signals
    }

    fn validate_config(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_body_similarity) {
            return Err(crate::AnalysisError::OutOfRange {
                field: "min_body_similarity",
                value: self.min_body_similarity,
                min: 0.0,
                max: 1.0,
            });
        }
        if !(0.0..=0.5).contains(&self.extreme_position) {
            return Err(crate::AnalysisError::OutOfRange {
                field: "extreme_position",
                value: self.extreme_position,
                min: 0.0,
                max: 0.5,
            });
        }
        for (field, value) in [
            ("wide_range_atr", self.wide_range_atr),
            ("prev_range_atr", self.prev_range_atr),
            ("curr_range_atr", self.curr_range_atr),
            ("capitulation_decline", self.capitulation_decline),
            ("near_band_tolerance", self.near_band_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(crate::AnalysisError::InvalidConfig(format!(
                    "{field} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
