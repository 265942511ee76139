//! Bollinger band bounce / rejection detector

use super::helpers::{passes_bullish_trend_gate, trend_adjustment};
use crate::{
    AnalysisError, BollingerMetadata, DetectionInput, Direction, OHLCVExt, Result, Signal,
    SignalDetector, SignalMetadata, SignalType,
};

/// Buy on a bounce off the lower band, sell on a rejection at the upper band.
///
/// Only the bullish side is trend-gated and floored by
/// `min_bullish_confidence`; rejections are emitted at any score.
#[derive(Debug, Clone)]
pub struct BollingerBounceDetector {
    /// Previous bar within this fraction of the band counts as a touch
    pub touch_tolerance: f64,
    /// Squeeze when width < prior width * squeeze_ratio
    pub squeeze_ratio: f64,
}

impl Default for BollingerBounceDetector {
    fn default() -> Self {
        Self {
            touch_tolerance: 0.01,
            squeeze_ratio: 0.7,
        }
    }
}

impl SignalDetector for BollingerBounceDetector {
    fn signal_types(&self) -> &'static [SignalType] {
        &[SignalType::BbBounceBuy, SignalType::BbRejectionSell]
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<Signal> {
        let w = &input.weights.bollinger;
        let mut signals = Vec::new();

        for i in 2..input.len() {
            let (Some((prev_lower, prev_upper)), Some((curr_lower, curr_upper))) =
                (input.bands[i - 1].bounds(), input.bands[i].bounds())
            else {
                continue;
            };
            let prev = &input.bars[i - 1];
            let curr = &input.bars[i];
            let ctx = &input.contexts[i];

            let squeeze = (curr_upper - curr_lower) < (prev_upper - prev_lower) * self.squeeze_ratio;
            let volume_confirm = ctx.volume_confirms(curr.volume);
            let volume_ratio = ctx.volume_ratio(curr.volume);

            let score = |direction: Direction, recovered: bool, price_break: bool| {
                let mut confidence = w.base_confidence;
                if recovered {
                    confidence += w.recovery_bonus;
                }
                if volume_confirm {
                    confidence += w.volume_bonus;
                }
                if squeeze {
                    confidence += w.squeeze_bonus;
                }
                if price_break {
                    confidence += w.price_break_bonus;
                }
                confidence += trend_adjustment(ctx.trend, direction, w.trend_penalty, w.trend_bonus);
                confidence.clamp(0.0, 100.0)
            };

            // Bounce
            if prev.low <= prev_lower * (1.0 + self.touch_tolerance)
                && curr.is_bullish()
                && curr.close > prev_lower
            {
                let breach = prev.low < prev_lower;
                if passes_bullish_trend_gate(ctx.trend, breach, volume_confirm) {
                    let recovered = breach && curr.close >= curr_lower;
                    let price_break = curr.close > prev.high;
                    let confidence = score(Direction::Buy, recovered, price_break);
                    if confidence >= w.min_bullish_confidence {
                        signals.push(Signal {
                            index: i,
                            date: curr.date,
                            signal_type: SignalType::BbBounceBuy,
                            direction: Direction::Buy,
                            confidence,
                            price: curr.close,
                            confirmed: recovered,
                            metadata: SignalMetadata::Bollinger(BollingerMetadata {
                                trend: ctx.trend,
                                squeeze,
                                breach,
                                volume_confirm,
                                volume_ratio,
                                price_break,
                            }),
                        });
                    }
                }
            }

            // Rejection
            if prev.high >= prev_upper * (1.0 - self.touch_tolerance)
                && curr.is_bearish()
                && curr.close < prev_upper
            {
                let breach = prev.high > prev_upper;
                let recovered = breach && curr.close <= curr_upper;
                let price_break = curr.close < prev.low;
                signals.push(Signal {
                    index: i,
                    date: curr.date,
                    signal_type: SignalType::BbRejectionSell,
                    direction: Direction::Sell,
                    confidence: score(Direction::Sell, recovered, price_break),
                    price: curr.close,
                    confirmed: recovered,
                    metadata: SignalMetadata::Bollinger(BollingerMetadata {
                        trend: ctx.trend,
                        squeeze,
                        breach,
                        volume_confirm,
                        volume_ratio,
                        price_break,
                    }),
                });
            }
        }
        signals
    }

    fn validate_config(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.touch_tolerance) {
            return Err(AnalysisError::OutOfRange {
                field: "touch_tolerance",
                value: self.touch_tolerance,
                min: 0.0,
                max: 1.0,
            });
        }
        if !(0.0..=1.0).contains(&self.squeeze_ratio) {
            return Err(AnalysisError::OutOfRange {
                field: "squeeze_ratio",
                value: self.squeeze_ratio,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}
