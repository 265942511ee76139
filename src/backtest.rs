//! Long-only, single-position backtest simulator
//!
//! The simulator walks the bars once. While flat, the first BUY signal at a bar
//! opens a position; while long, stop-loss, take-profit and SELL signals close
//! it, checked in that order. A position still open after the last bar is not
//! counted.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    analysis::prepare_bars,
    detect_signals,
    indicators::compute_indicators,
    params::{AnalysisParams, BacktestParams},
    validate_bars, AnalysisError, Bar, Direction, Result, Signal, SignalType,
};
use chrono::NaiveDate;

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
}

/// A completed round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub direction: Direction,
    /// Signal that opened the position
    pub signal_type: SignalType,
    /// Capital committed at entry
    pub size: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    #[inline]
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestSummary {
    pub total_trades: usize,
    pub win_count: usize,
    pub loss_count: usize,
    /// Percent of trades with positive pnl
    pub win_rate: f64,
    pub total_pnl: f64,
    /// Total pnl as a percent of initial capital
    pub total_pnl_percent: f64,
    /// Largest peak-to-trough drop of closed-trade equity, percent of the peak
    pub max_drawdown: f64,
}

impl BacktestSummary {
    pub fn from_trades(trades: &[Trade], initial_capital: f64) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let total_trades = trades.len();
        let win_count = trades.iter().filter(|t| t.is_win()).count();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        let mut equity = initial_capital;
        let mut peak = initial_capital;
        let mut max_drawdown = 0.0_f64;
        for trade in trades {
            equity += trade.pnl;
            peak = peak.max(equity);
            if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - equity) / peak * 100.0);
            }
        }

        Self {
            total_trades,
            win_count,
            loss_count: total_trades - win_count,
            win_rate: win_count as f64 / total_trades as f64 * 100.0,
            total_pnl,
            total_pnl_percent: if initial_capital > 0.0 {
                total_pnl / initial_capital * 100.0
            } else {
                0.0
            },
            max_drawdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub summary: BacktestSummary,
}

// ============================================================
// SIMULATOR
// ============================================================

#[derive(Debug, Clone, Copy)]
struct Position {
    entry_price: f64,
    entry_date: NaiveDate,
    signal_type: SignalType,
    size: f64,
}

impl Position {
    fn close(self, exit_date: NaiveDate, exit_price: f64, exit_reason: ExitReason) -> Trade {
        let quantity = self.size / self.entry_price;
        let pnl = quantity * (exit_price - self.entry_price);
        Trade {
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            exit_date,
            exit_price,
            direction: Direction::Buy,
            signal_type: self.signal_type,
            size: self.size,
            pnl,
            pnl_percent: pnl / self.size * 100.0,
            exit_reason,
        }
    }

    fn exit_at(&self, bar: &Bar, signal: Option<&Signal>, params: &BacktestParams) -> Option<(f64, ExitReason)> {
        if let Some(sl) = params.stop_loss() {
            if bar.low <= self.entry_price * (1.0 - sl / 100.0) {
                return Some((bar.close, ExitReason::StopLoss));
            }
        }
        if let Some(tp) = params.take_profit() {
            if bar.high >= self.entry_price * (1.0 + tp / 100.0) {
                return Some((bar.close, ExitReason::TakeProfit));
            }
        }
        match signal {
            Some(s) if s.direction.is_sell() => Some((s.price, ExitReason::Signal)),
            _ => None,
        }
    }
}

/// Replay `signals` over `bars` and summarize the resulting trades.
///
/// Every signal index must reference a bar.
pub fn run_backtest(bars: &[Bar], signals: &[Signal], params: &BacktestParams) -> Result<BacktestResult> {
    params.validate()?;
    validate_bars(bars)?;

    // first qualifying signal per bar, in stream order
    let mut by_bar: Vec<Option<&Signal>> = vec![None; bars.len()];
    for signal in signals {
        let slot = by_bar.get_mut(signal.index).ok_or(AnalysisError::SignalOutOfRange {
            index: signal.index,
            len: bars.len(),
        })?;
        if signal.confidence >= params.min_confidence && slot.is_none() {
            *slot = Some(signal);
        }
    }

    let mut trades = Vec::new();
    let mut position: Option<Position> = None;

    for (bar, signal) in bars.iter().zip(by_bar) {
        if let Some(open) = position {
            if let Some((price, reason)) = open.exit_at(bar, signal, params) {
                let trade = open.close(bar.date, price, reason);
                trace!(date = %bar.date, pnl = trade.pnl, reason = ?reason, "position closed");
                trades.push(trade);
                position = None;
            }
        }

        if position.is_none() {
            if let Some(s) = signal.filter(|s| s.direction.is_buy()) {
                trace!(date = %s.date, price = s.price, confidence = s.confidence, "position opened");
                position = Some(Position {
                    entry_price: s.price,
                    entry_date: s.date,
                    signal_type: s.signal_type,
                    size: params.size_for(s.confidence),
                });
            }
        }
    }

    if let Some(open) = position {
        debug!(entry_date = %open.entry_date, "open position at end of data discarded");
    }

    let summary = BacktestSummary::from_trades(&trades, params.initial_capital);
    debug!(
        trades = summary.total_trades,
        win_rate = summary.win_rate,
        total_pnl = summary.total_pnl,
        "backtest complete"
    );
    Ok(BacktestResult { trades, summary })
}

// ============================================================
// PIPELINE
// ============================================================

/// Indicators, signals and simulation from raw bars.
pub fn backtest(bars: &[Bar], analysis: &AnalysisParams, params: &BacktestParams) -> Result<BacktestResult> {
    analysis.validate()?;
    params.validate()?;

    let data = prepare_bars(bars, analysis.timeframe)?;
    let indicators = compute_indicators(
        &data,
        analysis.atr_period.get(),
        analysis.bb_period.get(),
        analysis.bb_std_mult,
    )?;
    let signals = detect_signals(&data, &indicators.bands, &indicators.atr, analysis.timeframe)?;
    run_backtest(&data, &signals, params)
}

/// Backtest result for one instrument
#[derive(Debug, Clone)]
pub struct InstrumentBacktest {
    pub symbol: String,
    pub result: BacktestResult,
}

/// Failure for one instrument
#[derive(Debug, Clone)]
pub struct InstrumentError {
    pub symbol: String,
    pub error: AnalysisError,
}

/// Backtest many instruments in parallel.
///
/// Returns successes and per-symbol failures; one failure does not stop the rest.
pub fn backtest_parallel<'a, I>(
    instruments: I,
    analysis: &AnalysisParams,
    params: &BacktestParams,
) -> (Vec<InstrumentBacktest>, Vec<InstrumentError>)
where
    I: IntoParallelIterator<Item = (&'a str, &'a [Bar])>,
{
    let outcomes: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| (symbol, backtest(bars, analysis, params)))
        .collect();

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(result) => results.push(InstrumentBacktest {
                symbol: symbol.to_string(),
                result,
            }),
            Err(error) => {
                warn!(symbol, %error, "backtest failed");
                errors.push(InstrumentError {
                    symbol: symbol.to_string(),
                    error,
                });
            }
        }
    }
    (results, errors)
}
