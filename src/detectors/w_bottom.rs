//! W-bottom (double bottom) detector
//!
//! First low pierces the lower band, second low holds it, and an optional
//! breakout above the neckline confirms the pattern.

use super::helpers::{highest_high_index, lowest_low_index};
use crate::{
    AnalysisError, DetectionInput, Direction, Result, Signal, SignalDetector, SignalMetadata,
    SignalType, WBottomMetadata,
};

/// First low is searched in `[i - FIRST_LOW_START, i - FIRST_LOW_END]`
const FIRST_LOW_START: usize = 4;
const FIRST_LOW_END: usize = 2;
/// Neckline must clear the first low by 2%
const MIN_NECKLINE_RISE: f64 = 1.02;
/// Breakout close must clear the neckline by 1%
const BREAKOUT_MARGIN: f64 = 1.01;
/// Patterns forming in a steeper decline are skipped
const MIN_TREND: f64 = -0.05;
const PERFECT_SYMMETRY: f64 = 0.03;
const GOOD_SYMMETRY: f64 = 0.05;
const MIN_CONFIDENCE: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct WBottomDetector {
    /// Only emit once a close breaks above the neckline
    pub require_breakout: bool,
    /// Bars after the second low searched for the breakout
    pub max_look_ahead: usize,
}

impl Default for WBottomDetector {
    fn default() -> Self {
        Self {
            require_breakout: true,
            max_look_ahead: 5,
        }
    }
}

impl WBottomDetector {
    fn breakout_index(&self, input: &DetectionInput<'_>, low2_index: usize, neckline: f64) -> Option<usize> {
        let last = (low2_index + self.max_look_ahead).min(input.len().checked_sub(1)?);
        (low2_index + 1..=last).find(|&j| input.bars[j].close > neckline * BREAKOUT_MARGIN)
    }

    fn pattern_at(&self, input: &DetectionInput<'_>, i: usize) -> Option<Signal> {
        let w = &input.weights.w_bottom;
        let bars = input.bars;

        let low1_index = lowest_low_index(bars, i - FIRST_LOW_START, i - FIRST_LOW_END)?;
        let neckline_index = highest_high_index(bars, low1_index, i - 1)?;
        let low1 = bars[low1_index].low;
        let neckline = bars[neckline_index].high;
        let low2 = bars[i].low;
        if low1 <= 0.0 {
            return None;
        }

        let low_diff = (low1 - low2).abs() / low1;
        let valid = low_diff < w.max_low_diff
            && low2 < neckline
            && low1 < neckline
            && neckline > low1 * MIN_NECKLINE_RISE
            && low1_index < neckline_index
            && neckline_index < i;
        if !valid || input.contexts[i].trend < MIN_TREND {
            return None;
        }

        let low1_band = input.bands[low1_index].lower;
        let low2_band = input.bands[i].lower;
        let confirmed =
            matches!(low1_band, Some(l) if low1 < l) && matches!(low2_band, Some(l) if low2 >= l);
        if !confirmed {
            return None;
        }

        let signal_index = if self.require_breakout {
            self.breakout_index(input, i, neckline)?
        } else {
            i
        };

        let bb_recovery = matches!(low2_band, Some(l) if bars[i].close >= l);
        let mut confidence = w.base_confirmed;
        if low_diff < PERFECT_SYMMETRY {
            confidence += w.perfect_symmetry_bonus;
        } else if low_diff < GOOD_SYMMETRY {
            confidence += w.good_symmetry_bonus;
        }
        if bb_recovery {
            confidence += w.bb_recovery_bonus;
        }

        let trigger = &bars[signal_index];
        Some(Signal {
            index: signal_index,
            date: trigger.date,
            signal_type: SignalType::WBottom,
            direction: Direction::Buy,
            confidence: confidence.clamp(MIN_CONFIDENCE, 100.0),
            price: trigger.close,
            confirmed,
            metadata: SignalMetadata::WBottom(WBottomMetadata {
                low1,
                low1_index,
                neckline,
                neckline_index,
                low2,
                low2_index: i,
                low_diff,
                target: 2.0 * neckline - low1,
                bb_recovery,
            }),
        })
    }
}

impl SignalDetector for WBottomDetector {
    fn signal_types(&self) -> &'static [SignalType] {
        &[SignalType::WBottom]
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<Signal> {
        let end = if self.require_breakout {
            input.len().saturating_sub(self.max_look_ahead)
        } else {
            input.len()
        };
        (FIRST_LOW_START..end)
            .filter_map(|i| self.pattern_at(input, i))
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        if self.require_breakout && self.max_look_ahead == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_look_ahead must be > 0 when a breakout is required".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{weights::weights_for, Bar, BollingerBand, Timeframe};
    use chrono::NaiveDate;

    fn series(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| {
                let date = start.checked_add_days(chrono::Days::new(i as u64)).unwrap();
                Bar::new(date, o, h, l, c, 1000.0)
            })
            .collect()
    }

    fn w_shape(low1: f64, bar3_low: f64) -> Vec<Bar> {
        let close = low1 + 2.0;
        series(&[
            (100.0, 102.0, 100.0, 101.0),
            (101.0, 102.0, 100.0, 101.0),
            (101.0, 102.0, low1, close),
            (close, 100.0, bar3_low, 99.0),
            (99.0, 105.0, 98.0, 104.0),
            (104.0, 105.0, 90.0, 95.0),
            (96.0, 110.0, 95.5, 108.0),
            (108.0, 112.0, 107.0, 110.0),
            (110.0, 115.0, 109.0, 114.0),
            (114.0, 118.0, 113.0, 117.0),
            (117.0, 120.0, 116.0, 119.0),
            (119.0, 122.0, 118.0, 121.0),
        ])
    }

    fn detect(bars: &[Bar], detector: WBottomDetector, timeframe: Timeframe) -> Vec<Signal> {
        let bands = vec![
            BollingerBand {
                sma: Some(100.0),
                upper: Some(110.0),
                lower: Some(90.0),
            };
            bars.len()
        ];
        let atr = vec![Some(5.0); bars.len()];
        let input = DetectionInput::new(bars, &bands, &atr, weights_for(timeframe)).unwrap();
        detector.detect(&input)
    }

    fn with_look_ahead(max_look_ahead: usize) -> WBottomDetector {
        WBottomDetector {
            require_breakout: true,
            max_look_ahead,
        }
    }

    #[test]
    fn test_confirmed_w_with_breakout() {
        let signals = detect(&w_shape(88.0, 89.0), with_look_ahead(3), Timeframe::Daily);
        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert!(s.confirmed);
        assert_eq!(s.index, 6);
        assert_eq!(s.price, 108.0);
        assert_eq!(s.confidence, 100.0);

        let SignalMetadata::WBottom(meta) = s.metadata else {
            panic!("expected W-bottom metadata");
        };
        assert_eq!(meta.low1_index, 2);
        assert_eq!(meta.neckline_index, 4);
        assert_eq!(meta.low2_index, 5);
        assert_eq!(meta.target, 2.0 * 105.0 - 88.0);
        assert!(meta.bb_recovery);
    }

    #[test]
    fn test_without_breakout_signals_at_second_low() {
        let detector = WBottomDetector {
            require_breakout: false,
            max_look_ahead: 3,
        };
        let signals = detect(&w_shape(88.0, 89.0), detector, Timeframe::Daily);
        assert!(signals.iter().any(|s| s.index == 5 && s.price == 95.0));
    }

    #[test]
    fn test_unconfirmed_w_emits_nothing() {
        let signals = detect(&w_shape(92.0, 93.0), with_look_ahead(3), Timeframe::Daily);
        assert!(signals.is_empty());

        let detector = WBottomDetector {
            require_breakout: false,
            max_look_ahead: 3,
        };
        assert!(detect(&w_shape(92.0, 93.0), detector, Timeframe::Daily).is_empty());
    }

    #[test]
    fn test_weekly_tolerates_wider_low_difference() {
        let signals = detect(&w_shape(88.0, 89.0), with_look_ahead(3), Timeframe::Weekly);
        let indices: Vec<usize> = signals.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![6, 7]);
    }

    #[test]
    fn test_no_breakout_in_window() {
        let mut bars = w_shape(88.0, 89.0);
        // cap every close after the second low under the breakout level
        for b in bars.iter_mut().skip(6) {
            b.close = 104.0;
            b.open = 104.0;
            b.high = 105.0;
            b.low = 97.0;
        }
        assert!(detect(&bars, with_look_ahead(3), Timeframe::Daily).is_empty());
    }

    #[test]
    fn test_validate_config() {
        assert!(WBottomDetector::default().validate_config().is_ok());
        assert!(with_look_ahead(0).validate_config().is_err());
    }
}
