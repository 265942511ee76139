//! Analysis and backtest parameters
//!
//! Both structs deserialize from camelCase JSON with every field optional,
//! and validate on demand.
//!
//! # Example
//!
//! ```rust
//! use bandwatch::params::{AnalysisParams, BacktestParams};
//! use bandwatch::Timeframe;
//!
//! let analysis = AnalysisParams {
//!   timeframe: Timeframe::Weekly,
//!   ..AnalysisParams::default()
//! };
//! assert_eq!(analysis.min_bars(), 20);
//!
//! let backtest = BacktestParams {
//!   stop_loss_percent: Some(5.0),
//!   ..BacktestParams::default()
//! };
//! assert!(backtest.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Period, Result, Timeframe};

// ============================================================
// ANALYSIS
// ============================================================

/// Indicator and pipeline parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisParams {
  pub bb_period: Period,
  pub bb_std_mult: f64,
  pub atr_period: Period,
  /// ATR multiple for the chandelier exit
  pub chandelier_mult: f64,
  pub timeframe: Timeframe,
}

impl Default for AnalysisParams {
  fn default() -> Self {
    Self {
      bb_period: Period::new_const(20),
      bb_std_mult: 2.0,
      atr_period: Period::new_const(14),
      chandelier_mult: 3.0,
      timeframe: Timeframe::Daily,
    }
  }
}

impl AnalysisParams {
  /// Bars needed (after aggregation) before indicators are meaningful
  pub fn min_bars(&self) -> usize {
    self.bb_period.get().max(self.atr_period.get())
  }

  pub fn validate(&self) -> Result<()> {
    check_range("bb_std_mult", self.bb_std_mult, 0.0, 10.0)?;
    check_range("chandelier_mult", self.chandelier_mult, 0.0, 20.0)?;
    Ok(())
  }
}

// ============================================================
// BACKTEST
// ============================================================

/// Simulator parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BacktestParams {
  pub initial_capital: f64,
  /// Currency amount committed per trade before confidence scaling
  pub position_size: f64,
  /// `None` or <= 0 disables the stop
  pub stop_loss_percent: Option<f64>,
  /// `None` or <= 0 disables the target
  pub take_profit_percent: Option<f64>,
  /// Signals below this are ignored
  pub min_confidence: f64,
  /// Scale size by `(confidence / 70)^2`
  pub confidence_scaling: bool,
}

impl Default for BacktestParams {
  fn default() -> Self {
    Self {
      initial_capital: 10_000.0,
      position_size: 1_000.0,
      stop_loss_percent: None,
      take_profit_percent: None,
      min_confidence: 0.0,
      confidence_scaling: false,
    }
  }
}

/// Confidence at which scaled size equals `position_size`
pub const CONFIDENCE_SCALING_PIVOT: f64 = 70.0;

impl BacktestParams {
  /// Active stop-loss percentage
  #[inline]
  pub fn stop_loss(&self) -> Option<f64> {
    self.stop_loss_percent.filter(|p| *p > 0.0)
  }

  /// Active take-profit percentage
  #[inline]
  pub fn take_profit(&self) -> Option<f64> {
    self.take_profit_percent.filter(|p| *p > 0.0)
  }

  /// Size of a position opened on a signal with `confidence`
  pub fn size_for(&self, confidence: f64) -> f64 {
    if self.confidence_scaling {
      self.position_size * (confidence / CONFIDENCE_SCALING_PIVOT).powi(2)
    } else {
      self.position_size
    }
  }

  pub fn validate(&self) -> Result<()> {
    if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
      return Err(AnalysisError::InvalidValue("initial_capital must be > 0"));
    }
    if !self.position_size.is_finite() || self.position_size <= 0.0 {
      return Err(AnalysisError::InvalidValue("position_size must be > 0"));
    }
    check_range("min_confidence", self.min_confidence, 0.0, 100.0)?;
    if let Some(sl) = self.stop_loss_percent {
      check_range("stop_loss_percent", sl, f64::NEG_INFINITY, 100.0)?;
    }
    if let Some(tp) = self.take_profit_percent {
      if tp.is_nan() {
        return Err(AnalysisError::InvalidValue("take_profit_percent is NaN"));
      }
    }
    Ok(())
  }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
  if value.is_nan() || value < min || value > max {
    return Err(AnalysisError::OutOfRange {
      field,
      value,
      min,
      max,
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_valid() {
    assert!(AnalysisParams::default().validate().is_ok());
    assert!(BacktestParams::default().validate().is_ok());
    assert_eq!(AnalysisParams::default().min_bars(), 20);
  }

  #[test]
  fn test_disabled_stops() {
    let params = BacktestParams {
      stop_loss_percent: Some(0.0),
      take_profit_percent: Some(-1.0),
      ..BacktestParams::default()
    };
    assert!(params.validate().is_ok());
    assert_eq!(params.stop_loss(), None);
    assert_eq!(params.take_profit(), None);
  }

  #[test]
  fn test_confidence_scaling() {
    let params = BacktestParams {
      position_size: 1000.0,
      confidence_scaling: true,
      ..BacktestParams::default()
    };
    assert!((params.size_for(70.0) - 1000.0).abs() < 1e-9);
    assert!((params.size_for(91.0) - 1690.0).abs() < 1e-9);
    assert_eq!(BacktestParams::default().size_for(91.0), 1000.0);
  }

  #[test]
  fn test_invalid_backtest_params() {
    let bad_capital = BacktestParams {
      initial_capital: 0.0,
      ..BacktestParams::default()
    };
    assert!(bad_capital.validate().is_err());

    let bad_confidence = BacktestParams {
      min_confidence: 101.0,
      ..BacktestParams::default()
    };
    assert!(matches!(
      bad_confidence.validate(),
      Err(AnalysisError::OutOfRange { field: "min_confidence", .. })
    ));
  }

  #[test]
  fn test_analysis_params_reject_negative_mult() {
    let params = AnalysisParams {
      bb_std_mult: -1.0,
      ..AnalysisParams::default()
    };
    assert!(params.validate().is_err());
  }
}
