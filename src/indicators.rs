//! ATR (Wilder) and Bollinger Bands
//!
//! Every series has the same length as the input bars; warm-up slots are `None`.

use serde::{Deserialize, Serialize};

use crate::{
    validate_bars, AnalysisError, Bar, BollingerBand, Direction, Period, Result, OHLCV,
};

/// Indicator series aligned with the input bars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub atr: Vec<Option<f64>>,
    pub bands: Vec<BollingerBand>,
}

/// True range per bar. The first bar has no previous close and uses `high - low`.
pub fn true_range<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high() - bar.low();
            match i.checked_sub(1).map(|p| bars[p].close()) {
                Some(prev_close) => hl
                    .max((bar.high() - prev_close).abs())
                    .max((bar.low() - prev_close).abs()),
                None => hl,
            }
        })
        .collect()
}

/// Wilder-smoothed average of a true range series.
///
/// Seeded with the simple mean of the first `period` values, then
/// `atr[i] = (atr[i-1] * (period - 1) + tr[i]) / period`.
pub fn wilder_atr(true_ranges: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; true_ranges.len()];
    if period == 0 || true_ranges.len() < period {
        return out;
    }

    let n = period as f64;
    let mut prev = true_ranges[..period].iter().sum::<f64>() / n;
    out[period - 1] = Some(prev);
    for (i, tr) in true_ranges.iter().enumerate().skip(period) {
        prev = (prev * (n - 1.0) + tr) / n;
        out[i] = Some(prev);
    }
    out
}

/// Average true range over bars
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> Vec<Option<f64>> {
    wilder_atr(&true_range(bars), period)
}

/// Bollinger Bands: SMA of the trailing `period` closes ± population std × `std_mult`.
pub fn bollinger_bands<T: OHLCV>(bars: &[T], period: usize, std_mult: f64) -> Vec<BollingerBand> {
    let mut out = vec![BollingerBand::EMPTY; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let n = period as f64;
    for (i, slot) in out.iter_mut().enumerate().skip(period - 1) {
        let window = &bars[i + 1 - period..=i];
        let sma = window.iter().map(|b| b.close()).sum::<f64>() / n;
        let variance = window
            .iter()
            .map(|b| {
                let d = b.close() - sma;
                d * d
            })
            .sum::<f64>()
            / n;
        let offset = variance.sqrt() * std_mult;
        *slot = BollingerBand {
            sma: Some(sma),
            upper: Some(sma + offset),
            lower: Some(sma - offset),
        };
    }
    out
}

/// Compute ATR and Bollinger series for a validated bar series.
///
/// Fails with [`AnalysisError::InsufficientData`] when fewer than
/// `max(atr_period, bb_period)` bars are supplied.
pub fn compute_indicators(
    bars: &[Bar],
    atr_period: usize,
    bb_period: usize,
    bb_std_mult: f64,
) -> Result<IndicatorSet> {
    let atr_period = Period::new(atr_period)?.get();
    let bb_period = Period::new(bb_period)?.get();
    if !bb_std_mult.is_finite() || bb_std_mult < 0.0 {
        return Err(AnalysisError::InvalidValue(
            "bb_std_mult must be finite and non-negative",
        ));
    }
    validate_bars(bars)?;

    let need = atr_period.max(bb_period);
    if bars.len() < need {
        return Err(AnalysisError::InsufficientData {
            need,
            got: bars.len(),
        });
    }

    Ok(IndicatorSet {
        atr: atr(bars, atr_period),
        bands: bollinger_bands(bars, bb_period, bb_std_mult),
    })
}

/// ATR-based trailing stop for the most recent bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChandelierExit {
    pub direction: Direction,
    pub exit_price: f64,
    pub atr: f64,
    /// Set for long exits
    pub highest_high: Option<f64>,
    /// Set for short exits
    pub lowest_low: Option<f64>,
}

/// Chandelier exit at the last bar: the extreme of the last `atr_period` bars
/// offset by `multiplier` ATRs against the position.
pub fn chandelier_exit(
    bars: &[Bar],
    direction: Direction,
    atr_period: usize,
    multiplier: f64,
) -> Result<ChandelierExit> {
    let period = Period::new(atr_period)?.get();
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(AnalysisError::InvalidValue(
            "chandelier multiplier must be finite and non-negative",
        ));
    }
    if bars.len() < period {
        return Err(AnalysisError::InsufficientData {
            need: period,
            got: bars.len(),
        });
    }

    let current_atr = atr(bars, period)
        .last()
        .copied()
        .flatten()
        .ok_or(AnalysisError::InsufficientData {
            need: period,
            got: bars.len(),
        })?;
    let lookback = &bars[bars.len() - period..];

    let exit = match direction {
        Direction::Buy => {
            let highest = lookback.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            ChandelierExit {
                direction,
                exit_price: highest - current_atr * multiplier,
                atr: current_atr,
                highest_high: Some(highest),
                lowest_low: None,
            }
        }
        Direction::Sell => {
            let lowest = lookback.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            ChandelierExit {
                direction,
                exit_price: lowest + current_atr * multiplier,
                atr: current_atr,
                highest_high: None,
                lowest_low: Some(lowest),
            }
        }
    };
    Ok(exit)
}
