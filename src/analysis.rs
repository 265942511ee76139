//! End-to-end analysis of one instrument
//!
//! Aggregates to weekly when asked, computes indicators, detects signals and
//! reports the ones inside the most recent ATR window.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    detect_signals,
    indicators::{chandelier_exit, compute_indicators, ChandelierExit},
    params::AnalysisParams,
    transform::daily_to_weekly,
    validate_bars, Bar, BollingerBand, Result, Signal, Timeframe,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub buy_count: usize,
    pub sell_count: usize,
    /// Bars supplied by the caller, before any aggregation
    pub total_bars: usize,
    /// Signals inside the recent window
    pub pattern_count: usize,
    pub recent_signal_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Signals inside the trailing `atr_period` bars
    pub signals: Vec<Signal>,
    pub stats: AnalysisStats,
    pub current_atr: Option<f64>,
    /// Bars the indicators were computed on (weekly when aggregated)
    pub bars: Vec<Bar>,
    pub bollinger_bands: Vec<BollingerBand>,
    /// Exit level for the direction of the latest recent signal
    pub chandelier: Option<ChandelierExit>,
}

/// Validate and, for weekly analysis, aggregate the caller's bars.
pub(crate) fn prepare_bars(bars: &[Bar], timeframe: Timeframe) -> Result<Cow<'_, [Bar]>> {
    validate_bars(bars)?;
    Ok(match timeframe {
        Timeframe::Daily => Cow::Borrowed(bars),
        Timeframe::Weekly => Cow::Owned(daily_to_weekly(bars)),
    })
}

pub fn analyze(bars: &[Bar], params: &AnalysisParams) -> Result<AnalysisResult> {
    params.validate()?;
    let data = prepare_bars(bars, params.timeframe)?;
    let atr_period = params.atr_period.get();

    let indicators = compute_indicators(&data, atr_period, params.bb_period.get(), params.bb_std_mult)?;
    let all_signals = detect_signals(&data, &indicators.bands, &indicators.atr, params.timeframe)?;

    let recent_from = data.len().saturating_sub(atr_period);
    let total_signals = all_signals.len();
    let signals: Vec<Signal> = all_signals
        .into_iter()
        .filter(|s| s.index >= recent_from)
        .collect();

    let buy_count = signals.iter().filter(|s| s.direction.is_buy()).count();
    let stats = AnalysisStats {
        buy_count,
        sell_count: signals.len() - buy_count,
        total_bars: bars.len(),
        pattern_count: signals.len(),
        recent_signal_count: signals.len(),
    };

    let chandelier = match signals.last() {
        Some(latest) => Some(chandelier_exit(
            &data,
            latest.direction,
            atr_period,
            params.chandelier_mult,
        )?),
        None => None,
    };
    let current_atr = indicators.atr.last().copied().flatten();

    debug!(
        timeframe = ?params.timeframe,
        bars = data.len(),
        signals = total_signals,
        "indicators and signals computed"
    );
    info!(
        recent = stats.recent_signal_count,
        buys = stats.buy_count,
        sells = stats.sell_count,
        "analysis complete"
    );

    Ok(AnalysisResult {
        signals,
        stats,
        current_atr,
        bars: data.into_owned(),
        bollinger_bands: indicators.bands,
        chandelier,
    })
}
