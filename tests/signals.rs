//! Integration tests for indicator computation and signal detection.

use bandwatch::prelude::*;
use bandwatch::{BollingerMetadata, TwoBarMetadata, WBottomMetadata};
use chrono::{Days, NaiveDate};

fn day(n: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 6, 1)
        .unwrap()
        .checked_add_days(Days::new(n as u64))
        .unwrap()
}

fn bar(n: usize, o: f64, h: f64, l: f64, c: f64) -> Bar {
    Bar::new(day(n), o, h, l, c, 1_000_000.0)
}

fn const_band(lower: f64, upper: f64, n: usize) -> Vec<BollingerBand> {
    vec![
        BollingerBand {
            sma: Some((lower + upper) / 2.0),
            upper: Some(upper),
            lower: Some(lower),
        };
        n
    ]
}

fn two_bar(bars: &[Bar], bands: &[BollingerBand], atr: f64) -> Vec<Signal> {
    let atr = vec![Some(atr); bars.len()];
    let input = DetectionInput::new(bars, bands, &atr, weights_for(Timeframe::Daily)).unwrap();
    TwoBarReversalDetector::default().detect(&input)
}

/// Deterministic pseudo-random walk with mixed up/down bars
fn random_walk(n: usize, seed: u64) -> Vec<Bar> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as f64) / (1u64 << 31) as f64
    };
    let mut close = 100.0;
    (0..n)
        .map(|i| {
            let open = close;
            close = (open * (1.0 + (next() - 0.5) * 0.08)).max(1.0);
            let high = open.max(close) * (1.0 + next() * 0.02);
            let low = open.min(close) * (1.0 - next() * 0.02);
            Bar::new(day(i), open, high, low, close, 500_000.0 + next() * 1_000_000.0)
        })
        .collect()
}

// ============================================================
// TWO-BAR REVERSAL
// ============================================================

/// 22 falling bars (~21% decline) followed by a reversal pair
fn downtrend_with_reversal() -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..22)
        .map(|i| {
            let p = 100.0 - i as f64;
            bar(i, p + 0.5, p + 1.0, p - 1.0, p)
        })
        .collect();
    bars.push(bar(22, 80.0, 81.0, 70.0, 72.0));
    let mut reversal = bar(23, 72.0, 88.0, 71.0, 80.0);
    reversal.volume = 2_000_000.0;
    bars.push(reversal);
    bars
}

/// 22 rising bars followed by a pullback and a reversal pair
fn uptrend_with_reversal() -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..22)
        .map(|i| {
            let p = 100.0 + i as f64;
            bar(i, p - 0.5, p + 1.0, p - 1.0, p)
        })
        .collect();
    bars.push(bar(22, 122.0, 123.0, 112.0, 114.0));
    let mut reversal = bar(23, 114.0, 131.0, 113.0, 122.0);
    reversal.volume = 2_000_000.0;
    bars.push(reversal);
    bars
}

#[test]
fn test_strong_downtrend_suppresses_bullish_reversal() {
    let bars = downtrend_with_reversal();
    let signals = two_bar(&bars, &const_band(75.0, 95.0, bars.len()), 8.0);
    assert!(
        signals.iter().all(|s| s.direction != Direction::Buy),
        "no BUY expected in a strong downtrend, got {signals:?}"
    );
}

#[test]
fn test_uptrend_reversal_emits_buy() {
    let bars = uptrend_with_reversal();
    let signals = two_bar(&bars, &const_band(115.0, 135.0, bars.len()), 8.0);
    let buy = signals
        .iter()
        .find(|s| s.direction == Direction::Buy)
        .expect("uptrend reversal should produce a BUY");
    assert_eq!(buy.index, 23);
    assert!(buy.confirmed);
    assert_eq!(buy.confidence, 100.0);

    let SignalMetadata::TwoBar(TwoBarMetadata {
        trend,
        volume_confirm,
        ..
    }) = buy.metadata
    else {
        panic!("expected two-bar metadata");
    };
    assert!(trend > 0.10);
    assert!(volume_confirm);
}

/// 40 rising bars, five down bars each losing `step`, then a similar-bodied up bar
fn capitulation_setup(step: f64) -> (Vec<Bar>, f64) {
    let mut bars: Vec<Bar> = (0..40)
        .map(|i| {
            let c = 100.0 + 2.0 * i as f64;
            bar(i, c - 1.0, c + 0.5, c - 1.5, c)
        })
        .collect();
    let mut close = 178.0;
    for i in 40..45 {
        let open = close;
        close = open * (1.0 - step);
        bars.push(bar(i, open, open + 0.2, close - 0.2, close));
    }
    let body = bars[44].open - close;
    let open = close;
    bars.push(bar(45, open, open + body + 0.3, open - 0.3, open + body));
    (bars, body * 0.5)
}

#[test]
fn test_bullish_rejected_after_capitulation() {
    let (bars, atr) = capitulation_setup(0.032);
    let signals = two_bar(&bars, &const_band(100.0, 200.0, bars.len()), atr);
    assert!(signals.iter().all(|s| s.direction != Direction::Buy));
}

#[test]
fn test_bullish_kept_after_mild_pullback() {
    let (bars, atr) = capitulation_setup(0.01);
    let signals = two_bar(&bars, &const_band(100.0, 200.0, bars.len()), atr);
    assert!(signals.iter().any(|s| s.index == 45 && s.direction == Direction::Buy));
}

// ============================================================
// W-BOTTOM
// ============================================================

fn w_pattern(low1: f64, bar3_low: f64) -> Vec<Bar> {
    let close = low1 + 2.0;
    let data = [
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
    ];
    data.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| bar(i, o, h, l, c))
        .collect()
}

fn w_bottoms(bars: &[Bar]) -> Vec<Signal> {
    let engine = EngineBuilder::new()
        .add(BuiltinDetector::WBottom(WBottomDetector {
            require_breakout: true,
            max_look_ahead: 3,
        }))
        .build()
        .unwrap();
    let bands = const_band(90.0, 110.0, bars.len());
    let atr = vec![Some(5.0); bars.len()];
    engine.detect(bars, &bands, &atr).unwrap()
}

#[test]
fn test_confirmed_w_bottom_emits_once() {
    let signals = w_bottoms(&w_pattern(88.0, 89.0));
    assert_eq!(signals.len(), 1);
    let s = &signals[0];
    assert_eq!(s.signal_type, SignalType::WBottom);
    assert!(s.confirmed);
    assert_eq!(s.index, 6);

    let SignalMetadata::WBottom(WBottomMetadata { low1, neckline, target, .. }) = s.metadata else {
        panic!("expected W-bottom metadata");
    };
    assert_eq!((low1, neckline, target), (88.0, 105.0, 122.0));
}

#[test]
fn test_unconfirmed_w_bottom_never_signals() {
    assert!(w_bottoms(&w_pattern(92.0, 93.0)).is_empty());
}

// ============================================================
// ENGINE / PIPELINE
// ============================================================

#[test]
fn test_consolidation_example() {
    let make = |index: usize, confidence: f64| Signal {
        index,
        date: day(index),
        signal_type: SignalType::BbBounceBuy,
        direction: Direction::Buy,
        confidence,
        price: 100.0,
        confirmed: true,
        metadata: SignalMetadata::Bollinger(BollingerMetadata {
            trend: 0.0,
            squeeze: false,
            breach: true,
            volume_confirm: false,
            volume_ratio: None,
            price_break: false,
        }),
    };
    let merged = consolidate_signals(vec![make(5, 70.0), make(6, 85.0), make(7, 75.0)], 3);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].confidence, 85.0);

    let spaced = consolidate_signals(vec![make(5, 70.0), make(10, 70.0)], 3);
    assert_eq!(spaced.len(), 2);
}

#[test]
fn test_detect_signals_is_idempotent() {
    let bars = random_walk(300, 7);
    let ind = compute_indicators(&bars, 14, 20, 2.0).unwrap();

    let first = detect_signals(&bars, &ind.bands, &ind.atr, Timeframe::Daily).unwrap();
    let second = detect_signals(&bars, &ind.bands, &ind.atr, Timeframe::Daily).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_detected_signals_are_well_formed() {
    for seed in [1, 2, 3, 42] {
        let bars = random_walk(250, seed);
        let ind = compute_indicators(&bars, 14, 20, 2.0).unwrap();
        for timeframe in [Timeframe::Daily, Timeframe::Weekly] {
            let signals = detect_signals(&bars, &ind.bands, &ind.atr, timeframe).unwrap();
            assert!(signals.windows(2).all(|w| w[0].index <= w[1].index));
            for s in &signals {
                assert!(s.index < bars.len());
                assert_eq!(s.date, bars[s.index].date);
                assert!((0.0..=100.0).contains(&s.confidence));
                assert_eq!(s.direction, s.signal_type.direction());
            }
        }
    }
}

#[test]
fn test_detect_signals_rejects_misaligned_indicators() {
    let bars = random_walk(40, 5);
    let ind = compute_indicators(&bars, 14, 20, 2.0).unwrap();
    let err = detect_signals(&bars, &ind.bands[1..], &ind.atr, Timeframe::Daily).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn test_detect_signals_rejects_unordered_bars() {
    let mut bars = random_walk(40, 5);
    let ind = compute_indicators(&bars, 14, 20, 2.0).unwrap();
    bars.swap(10, 11);
    assert_eq!(
        detect_signals(&bars, &ind.bands, &ind.atr, Timeframe::Daily),
        Err(AnalysisError::NonMonotonicDates { index: 11 })
    );
}

#[test]
fn test_minimum_data_guard() {
    let bars = random_walk(20, 9);
    assert!(matches!(
        compute_indicators(&bars[..19], 14, 20, 2.0),
        Err(AnalysisError::InsufficientData { need: 20, got: 19 })
    ));
    assert!(compute_indicators(&bars, 14, 20, 2.0).is_ok());
    assert!(analyze(&bars, &AnalysisParams::default()).is_ok());
    assert!(analyze(&bars[..19], &AnalysisParams::default()).is_err());
}

// ============================================================
// WIRE SHAPE
// ============================================================

#[test]
fn test_signal_json_shape() {
    let signal = Signal {
        index: 6,
        date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        signal_type: SignalType::WBottom,
        direction: Direction::Buy,
        confidence: 100.0,
        price: 108.0,
        confirmed: true,
        metadata: SignalMetadata::WBottom(WBottomMetadata {
            low1: 88.0,
            low1_index: 2,
            neckline: 105.0,
            neckline_index: 4,
            low2: 90.0,
            low2_index: 5,
            low_diff: 2.0 / 88.0,
            target: 122.0,
            bb_recovery: true,
        }),
    };

    let json = serde_json::to_value(&signal).unwrap();
    assert_eq!(json["type"], "w_bottom");
    assert_eq!(json["direction"], "BUY");
    assert_eq!(json["date"], "2024-01-05");
    assert_eq!(json["metadata"]["pattern"], "w_bottom");
    assert_eq!(json["metadata"]["neckline"], 105.0);
    assert_eq!(json["metadata"]["low1Index"], 2);
    assert_eq!(json["metadata"]["bbRecovery"], true);

    let back: Signal = serde_json::from_value(json).unwrap();
    assert_eq!(back, signal);
}

#[test]
fn test_params_deserialize_with_defaults() {
    let params: AnalysisParams =
        serde_json::from_str(r#"{"bbPeriod": 10, "timeframe": "weekly"}"#).unwrap();
    assert_eq!(params.bb_period.get(), 10);
    assert_eq!(params.atr_period.get(), 14);
    assert_eq!(params.timeframe, Timeframe::Weekly);

    assert!(serde_json::from_str::<AnalysisParams>(r#"{"atrPeriod": 0}"#).is_err());
}
