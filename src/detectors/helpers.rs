//! Shared measurements for the band pattern detectors
//!
//! Trend, trailing volume and range lookups used by every detector module.

use crate::{Bar, Direction};

// ============================================================
// THRESHOLDS
// ============================================================

/// Trailing window for average volume (includes the current bar)
pub const VOLUME_PERIOD: usize = 20;
/// Volume confirms when volume > avg_volume * VOLUME_CONFIRM_FACTOR
pub const VOLUME_CONFIRM_FACTOR: f64 = 1.2;
/// Upper bound on the trend comparison window
pub const TREND_WINDOW: usize = 20;

/// Bullish setups are rejected outright below this trend
pub const STRONG_DOWNTREND: f64 = -0.10;
/// Between STRONG_DOWNTREND and this, bullish needs confirmation AND volume
pub const MILD_DOWNTREND: f64 = -0.03;
/// Below this, bullish needs confirmation OR volume
pub const FLAT_TREND_CEILING: f64 = 0.02;

/// Trend below this costs the full trend penalty
pub const TREND_PENALTY_THRESHOLD: f64 = -0.05;
/// `(threshold, share of trend bonus)`, checked in order
pub const TREND_BONUS_TIERS: [(f64, f64); 3] = [(0.10, 1.0), (0.05, 0.6), (0.02, 0.3)];

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Trailing average volume per bar; `None` until `period` bars are available.
pub fn average_volumes(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        sum += bar.volume;
        if i >= period {
            sum -= bars[i - period].volume;
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

fn mean_close(bars: &[Bar]) -> f64 {
    bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64
}

/// Fractional change of the mean of the last `w` closes ending at `index`
/// against the `w` closes before them, `w = min(TREND_WINDOW, (index + 1) / 2)`.
///
/// Returns 0.0 when fewer than two bars fit in each window.
pub fn trend_at(bars: &[Bar], index: usize) -> f64 {
    if index >= bars.len() {
        return 0.0;
    }
    let window = TREND_WINDOW.min((index + 1) / 2);
    if window < 2 {
        return 0.0;
    }
    let recent_start = index + 1 - window;
    let prior_start = recent_start - window;
    let recent = mean_close(&bars[recent_start..=index]);
    let prior = mean_close(&bars[prior_start..recent_start]);
    if prior.abs() <= f64::EPSILON {
        return 0.0;
    }
    (recent - prior) / prior
}

/// Confidence adjustment for trend alignment. Sell setups score against `-trend`.
pub fn trend_adjustment(trend: f64, direction: Direction, penalty: f64, bonus: f64) -> f64 {
    let aligned = match direction {
        Direction::Buy => trend,
        Direction::Sell => -trend,
    };
    if aligned < TREND_PENALTY_THRESHOLD {
        return -penalty;
    }
    TREND_BONUS_TIERS
        .iter()
        .find(|(threshold, _)| aligned > *threshold)
        .map_or(0.0, |(_, share)| bonus * share)
}

/// Counter-trend gate for bullish setups.
///
/// `confirmed` is the detector's own breach condition.
#[inline]
pub fn passes_bullish_trend_gate(trend: f64, confirmed: bool, volume_confirm: bool) -> bool {
    if trend < STRONG_DOWNTREND {
        false
    } else if trend < MILD_DOWNTREND {
        confirmed && volume_confirm
    } else if trend < FLAT_TREND_CEILING {
        confirmed || volume_confirm
    } else {
        true
    }
}

/// Index of the lowest low in `start..=end` (first on ties).
pub fn lowest_low_index(bars: &[Bar], start: usize, end: usize) -> Option<usize> {
    let end = end.min(bars.len().checked_sub(1)?);
    (start..=end).reduce(|best, i| if bars[i].low < bars[best].low { i } else { best })
}

/// Index of the highest high in `start..=end` (first on ties).
pub fn highest_high_index(bars: &[Bar], start: usize, end: usize) -> Option<usize> {
    let end = end.min(bars.len().checked_sub(1)?);
    (start..=end).reduce(|best, i| if bars[i].high > bars[best].high { i } else { best })
}

/// Position of `close` inside the band, 0 = lower, 1 = upper. Zero-width band maps to 0.5.
#[inline]
pub fn band_position(close: f64, lower: f64, upper: f64) -> f64 {
    let width = upper - lower;
    if width <= 0.0 {
        0.5
    } else {
        (close - lower) / width
    }
}
