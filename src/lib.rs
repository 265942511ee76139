//! # bandwatch
//!
//! Bollinger-band pattern signals and a long-only backtest simulator.
//!
//! The crate turns a chronological series of daily (or weekly) bars into
//! ATR / Bollinger indicator series, runs three chart-pattern detectors over
//! them (two-bar reversal, W-bottom, band bounce/rejection), consolidates the
//! resulting signals and can replay them through a single-position simulator.
//!
//! ## Quick Start
//!
//! ```rust
//! use bandwatch::prelude::*;
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let bars: Vec<Bar> = (0..40u64)
//!     .map(|i| {
//!         let close = 100.0 + (i as f64 * 0.7).sin() * 5.0;
//!         let date = start.checked_add_days(chrono::Days::new(i)).unwrap();
//!         Bar::new(date, close - 0.5, close + 1.0, close - 1.5, close, 1_000.0)
//!     })
//!     .collect();
//!
//! let indicators = compute_indicators(&bars, 14, 20, 2.0).unwrap();
//! let signals =
//!     detect_signals(&bars, &indicators.bands, &indicators.atr, Timeframe::Daily).unwrap();
//! let result = run_backtest(&bars, &signals, &BacktestParams::default()).unwrap();
//! assert_eq!(
//!     result.summary.win_count + result.summary.loss_count,
//!     result.summary.total_trades
//! );
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod backtest;
pub mod consolidate;
pub mod detectors;
pub mod indicators;
pub mod params;
pub mod transform;
pub mod weights;

pub mod prelude {
    pub use crate::{
        // Pipelines
        analysis::{analyze, AnalysisResult, AnalysisStats},
        backtest::{
            backtest, backtest_parallel, run_backtest, BacktestResult, BacktestSummary,
            ExitReason, InstrumentBacktest, InstrumentError, Trade,
        },
        consolidate::{consolidate_signals, DEFAULT_MIN_GAP},
        // Detectors
        detectors::*,
        indicators::{chandelier_exit, compute_indicators, ChandelierExit, IndicatorSet},
        // Configuration
        params::{AnalysisParams, BacktestParams},
        transform::daily_to_weekly,
        weights::{weights_for, PatternWeights},
        // Types
        AnalysisError,
        Bar,
        BollingerBand,
        BuiltinDetector,
        DetectionInput,
        Direction,
        EngineBuilder,
        ErrorKind,
        MarketContext,
        OHLCVExt,
        Period,
        Result,
        Signal,
        SignalDetector,
        SignalEngine,
        SignalMetadata,
        SignalType,
        Timeframe,
        OHLCV,
        // Entry point
        detect_signals,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by indicator, detection and simulation entry points
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Insufficient data: need at least {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Bar dates must be strictly ascending (violated at index {index})")]
    NonMonotonicDates { index: usize },

    #[error("{series} has {got} entries, expected {expected} to match the bars")]
    LengthMismatch {
        series: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Signal references bar {index} but only {len} bars were supplied")]
    SignalOutOfRange { index: usize, len: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of [`AnalysisError`] for callers mapping errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must supply more bars
    InsufficientData,
    /// Input violates the bar/series contract
    MalformedInput,
    /// Parameters are out of range
    InvalidConfig,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InsufficientData { .. } => ErrorKind::InsufficientData,
            AnalysisError::InvalidBar { .. }
            | AnalysisError::NonMonotonicDates { .. }
            | AnalysisError::LengthMismatch { .. }
            | AnalysisError::SignalOutOfRange { .. } => ErrorKind::MalformedInput,
            AnalysisError::InvalidValue(_)
            | AnalysisError::OutOfRange { .. }
            | AnalysisError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(AnalysisError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Up bar: close above open
    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    /// Down bar: close below open
    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.high() < self.low() {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        if !self.volume().is_finite() || self.volume() < 0.0 {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "volume must be finite and non-negative",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// One period of price data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Check every bar for consistency and the series for strictly ascending dates.
pub fn validate_bars(bars: &[Bar]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            AnalysisError::InvalidBar { reason, .. } => AnalysisError::InvalidBar { index: i, reason },
            other => other,
        })?;
        if i > 0 && bar.date <= bars[i - 1].date {
            return Err(AnalysisError::NonMonotonicDates { index: i });
        }
    }
    Ok(())
}

pub(crate) fn ensure_len(series: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(AnalysisError::LengthMismatch {
            series,
            expected,
            got,
        });
    }
    Ok(())
}

// ============================================================
// SIGNALS
// ============================================================

/// Trade direction of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    #[inline]
    pub fn is_buy(self) -> bool {
        matches!(self, Direction::Buy)
    }

    #[inline]
    pub fn is_sell(self) -> bool {
        matches!(self, Direction::Sell)
    }
}

/// Bar granularity; selects the weight table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    Daily,
    Weekly,
}

/// Pattern that produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    TwoBarBullish,
    TwoBarBearish,
    WBottom,
    BbBounceBuy,
    BbRejectionSell,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::TwoBarBullish => "two_bar_bullish",
            SignalType::TwoBarBearish => "two_bar_bearish",
            SignalType::WBottom => "w_bottom",
            SignalType::BbBounceBuy => "bb_bounce_buy",
            SignalType::BbRejectionSell => "bb_rejection_sell",
        }
    }

    /// Direction every signal of this type carries
    pub fn direction(self) -> Direction {
        match self {
            SignalType::TwoBarBullish | SignalType::WBottom | SignalType::BbBounceBuy => {
                Direction::Buy
            }
            SignalType::TwoBarBearish | SignalType::BbRejectionSell => Direction::Sell,
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurements behind a two-bar reversal signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoBarMetadata {
    pub trend: f64,
    pub volume_confirm: bool,
    pub volume_ratio: Option<f64>,
    /// Close position inside the current band, 0 = lower, 1 = upper
    pub price_position: f64,
    pub bb_recovery: bool,
    pub near_breach: bool,
    pub price_break: bool,
}

/// Geometry of a W-bottom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WBottomMetadata {
    pub low1: f64,
    pub low1_index: usize,
    pub neckline: f64,
    pub neckline_index: usize,
    pub low2: f64,
    pub low2_index: usize,
    pub low_diff: f64,
    /// Measured-move projection `2 * neckline - low1`
    pub target: f64,
    pub bb_recovery: bool,
}

/// Measurements behind a band bounce / rejection signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BollingerMetadata {
    pub trend: f64,
    pub squeeze: bool,
    pub breach: bool,
    pub volume_confirm: bool,
    pub volume_ratio: Option<f64>,
    pub price_break: bool,
}

/// Per-detector payload attached to a [`Signal`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum SignalMetadata {
    TwoBar(TwoBarMetadata),
    WBottom(WBottomMetadata),
    Bollinger(BollingerMetadata),
}

/// A discrete trading signal anchored at one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub index: usize,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub direction: Direction,
    /// Heuristic score 0.0..=100.0
    pub confidence: f64,
    pub price: f64,
    pub confirmed: bool,
    pub metadata: SignalMetadata,
}

/// Bollinger band values at one bar; `None` during warm-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerBand {
    pub sma: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

impl BollingerBand {
    pub const EMPTY: BollingerBand = BollingerBand {
        sma: None,
        upper: None,
        lower: None,
    };

    /// `(lower, upper)` when both bands are defined
    #[inline]
    pub fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.lower?, self.upper?))
    }

    #[inline]
    pub fn width(&self) -> Option<f64> {
        self.bounds().map(|(lower, upper)| upper - lower)
    }
}

// ============================================================
// MARKET CONTEXT
// ============================================================

/// Per-bar context shared by all detectors
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketContext {
    /// Fractional change of recent mean close vs the preceding window
    pub trend: f64,
    /// Trailing average volume including the current bar
    pub avg_volume: Option<f64>,
}

impl MarketContext {
    #[inline]
    pub fn volume_ratio(&self, volume: f64) -> Option<f64> {
        self.avg_volume.filter(|avg| *avg > 0.0).map(|avg| volume / avg)
    }

    #[inline]
    pub fn volume_confirms(&self, volume: f64) -> bool {
        matches!(self.avg_volume, Some(avg) if avg > 0.0 && volume > avg * detectors::VOLUME_CONFIRM_FACTOR)
    }
}

/// Precompute context for all bars
pub fn compute_contexts(bars: &[Bar]) -> Vec<MarketContext> {
    let avg_volumes = detectors::average_volumes(bars, detectors::VOLUME_PERIOD);
    (0..bars.len())
        .map(|i| MarketContext {
            trend: detectors::trend_at(bars, i),
            avg_volume: avg_volumes[i],
        })
        .collect()
}

/// Everything a detector reads: bars, aligned indicator series, contexts and weights
#[derive(Debug, Clone)]
pub struct DetectionInput<'a> {
    pub bars: &'a [Bar],
    pub bands: &'a [BollingerBand],
    pub atr: &'a [Option<f64>],
    pub contexts: Vec<MarketContext>,
    pub weights: &'a weights::PatternWeights,
}

impl<'a> DetectionInput<'a> {
    pub fn new(
        bars: &'a [Bar],
        bands: &'a [BollingerBand],
        atr: &'a [Option<f64>],
        weights: &'a weights::PatternWeights,
    ) -> Result<Self> {
        ensure_len("bollinger series", bars.len(), bands.len())?;
        ensure_len("atr series", bars.len(), atr.len())?;
        Ok(Self {
            bars,
            bands,
            atr,
            contexts: compute_contexts(bars),
            weights,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

// ============================================================
// SIGNAL DETECTOR TRAIT
// ============================================================

/// A read-only pass over bars and indicators producing signals
pub trait SignalDetector: Send + Sync {
    /// Signal types this detector can emit
    fn signal_types(&self) -> &'static [SignalType];

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<Signal>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect(&self, input: &DetectionInput<'_>) -> Vec<Signal> {
                match self {
                    $(Self::$variant(d) => SignalDetector::detect(d, input)),*
                }
            }

            #[inline]
            pub fn signal_types(&self) -> &'static [SignalType] {
                match self {
                    $(Self::$variant(d) => SignalDetector::signal_types(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => SignalDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    TwoBarReversal(TwoBarReversalDetector),
    WBottom(WBottomDetector),
    Bollinger(BollingerBounceDetector),
}

// ============================================================
// SIGNAL ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub timeframe: Timeframe,
    pub min_gap: usize,
    pub min_confidence: Option<f64>,
    pub validate_data: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::Daily,
            min_gap: consolidate::DEFAULT_MIN_GAP,
            min_confidence: None,
            validate_data: true,
        }
    }
}

/// Runs the configured detectors and consolidates their output
#[derive(Debug, Clone)]
pub struct SignalEngine {
    detectors: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl SignalEngine {
    /// All three detectors with defaults for the given timeframe.
    pub fn for_timeframe(timeframe: Timeframe) -> Self {
        Self {
            detectors: EngineBuilder::default_detectors().to_vec(),
            config: EngineConfig {
                timeframe,
                ..EngineConfig::default()
            },
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.detectors
    }

    /// Detect and consolidate signals over a full series.
    pub fn detect(
        &self,
        bars: &[Bar],
        bands: &[BollingerBand],
        atr: &[Option<f64>],
    ) -> Result<Vec<Signal>> {
        if self.config.validate_data {
            validate_bars(bars)?;
        }

        let weights = weights::weights_for(self.config.timeframe);
        let input = DetectionInput::new(bars, bands, atr, weights)?;
        let raw = self.detect_raw(&input);
        let raw_count = raw.len();
        let signals = consolidate::consolidate_signals(raw, self.config.min_gap);

        tracing::debug!(
            timeframe = ?self.config.timeframe,
            bars = bars.len(),
            raw = raw_count,
            kept = signals.len(),
            "signals consolidated"
        );

        Ok(signals)
    }

    /// Run every detector without consolidation; output is in detector order.
    pub fn detect_raw(&self, input: &DetectionInput<'_>) -> Vec<Signal> {
        self.detectors
            .iter()
            .flat_map(|detector| detector.detect(input))
            .filter(|signal| self.should_include(signal))
            .collect()
    }

    fn should_include(&self, signal: &Signal) -> bool {
        match self.config.min_confidence {
            Some(min) => signal.confidence >= min,
            None => true,
        }
    }

    fn validate(&self) -> Result<()> {
        for d in &self.detectors {
            d.validate_config()?;
        }
        if let Some(min) = self.config.min_confidence {
            if !(0.0..=100.0).contains(&min) {
                return Err(AnalysisError::OutOfRange {
                    field: "min_confidence",
                    value: min,
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating SignalEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    detectors: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn default_detectors() -> [BuiltinDetector; 3] {
        [
            BuiltinDetector::TwoBarReversal(TwoBarReversalDetector::default()),
            BuiltinDetector::WBottom(WBottomDetector::default()),
            BuiltinDetector::Bollinger(BollingerBounceDetector::default()),
        ]
    }

    /// Add all three detectors with default configurations
    pub fn with_all_defaults(mut self) -> Self {
        self.detectors.extend(Self::default_detectors());
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.detectors.push(detector);
        Ok(self)
    }

    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.config.timeframe = timeframe;
        self
    }

    /// Bars within which same-direction signals are merged
    pub fn min_gap(mut self, gap: usize) -> Self {
        self.config.min_gap = gap;
        self
    }

    /// Drop signals below this confidence before consolidation
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.config.min_confidence = Some(confidence);
        self
    }

    /// Enable/disable bar validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<SignalEngine> {
        let engine = SignalEngine {
            detectors: self.detectors,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

/// Run all three detectors for `timeframe` and consolidate with the default gap.
///
/// `bands` and `atr` must be aligned with `bars` (same length).
pub fn detect_signals(
    bars: &[Bar],
    bands: &[BollingerBand],
    atr: &[Option<f64>],
    timeframe: Timeframe,
) -> Result<Vec<Signal>> {
    SignalEngine::for_timeframe(timeframe).detect(bars, bands, atr)
}

// ============================================================
// TESTS
// ============================================================
