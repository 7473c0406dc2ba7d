//! Signal scenarios on small hand-checked series.

use aramplus_core::domain::{PriceBar, PriceSeries};
use aramplus_core::indicators::{IndicatorEngine, IndicatorParams, IndicatorRow};
use aramplus_core::signal::{RiskLevels, Signal, SignalError, SignalParams, SignalRule};
use chrono::{Duration, TimeZone, Utc};

const CLOSES: [f64; 10] = [
    100.0, 102.0, 101.0, 105.0, 107.0, 110.0, 108.0, 112.0, 115.0, 117.0,
];

fn series(closes: &[f64]) -> PriceSeries {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::new(base + Duration::days(i as i64), c, c + 1.0, c - 1.0, c))
        .collect();
    PriceSeries::new("BTC-USD", bars).unwrap()
}

fn windows(ma: usize, rsi: usize) -> IndicatorParams {
    IndicatorParams {
        ma_window: ma,
        rsi_window: rsi,
        atr_window: 3,
    }
}

fn latest(closes: &[f64], w: IndicatorParams) -> Result<aramplus_core::signal::SignalDecision, SignalError> {
    let s = series(closes);
    let frame = IndicatorEngine::new(w).compute(&s);
    SignalRule::new(SignalParams::default(), w).latest(&s, &frame)
}

#[test]
fn all_gains_window_holds_above_ma() {
    let d = latest(&CLOSES, windows(3, 3)).unwrap();
    let ma = d.row.ma.unwrap();
    assert!((ma - 114.666_666_666_666_67).abs() < 1e-9);
    assert_eq!(d.row.rsi, Some(100.0));
    assert!(d.close > ma);
    assert_eq!(d.signal, Signal::Hold);
    assert!(d.risk.is_none());
}

#[test]
fn rsi_5_window_value() {
    let d = latest(&CLOSES, windows(3, 5)).unwrap();
    assert!((d.row.rsi.unwrap() - 85.714_285_714).abs() < 1e-6);
    assert_eq!(d.signal, Signal::Hold);
}

#[test]
fn constant_price_is_hold_with_neutral_rsi() {
    let d = latest(&[250.0; 30], windows(10, 14)).unwrap();
    assert_eq!(d.row.ma, Some(250.0));
    assert_eq!(d.row.rsi, Some(50.0));
    assert_eq!(d.signal, Signal::Hold);
}

#[test]
fn short_series_is_undetermined() {
    let err = latest(&CLOSES, IndicatorParams::default()).unwrap_err();
    assert_eq!(
        err,
        SignalError::InsufficientData {
            required: 50,
            available: 10
        }
    );
}

#[test]
fn exactly_max_window_bars_is_enough() {
    let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i % 5) as f64).collect();
    assert!(latest(&closes, IndicatorParams::default()).is_ok());
    assert!(latest(&closes[..49], IndicatorParams::default()).is_err());
}

#[test]
fn buy_carries_atr_levels() {
    let rule = SignalRule::new(SignalParams::default(), IndicatorParams::default());
    let bar = PriceBar::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        99.0,
        101.0,
        98.0,
        100.0,
    );
    let row = IndicatorRow {
        ma: Some(95.0),
        rsi: Some(40.0),
        atr: Some(2.0),
    };
    let d = rule.evaluate(&bar, &row).unwrap();
    assert_eq!(d.signal, Signal::Buy);
    assert_eq!(
        d.risk,
        Some(RiskLevels {
            stop_loss: 97.0,
            take_profit: 106.0
        })
    );
}

#[test]
fn pullback_in_uptrend_is_buy() {
    // Steady climb then a shallow dip: close stays above MA(5) while RSI(5)
    // drops under 60.
    let closes = [
        100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0, 104.0, 105.0, 104.5, 105.5,
    ];
    let d = latest(&closes, windows(5, 5)).unwrap();
    // MA = (106+104+105+104.5+105.5)/5 = 105.0; changes +1 -2 +1 -0.5 +1
    assert!((d.row.ma.unwrap() - 105.0).abs() < 1e-9);
    assert!(d.row.rsi.unwrap() < 60.0);
    assert_eq!(d.signal, Signal::Buy);
    assert!(d.risk.is_some());
}

#[test]
fn same_input_same_decision() {
    let a = latest(&CLOSES, windows(3, 5)).unwrap();
    let b = latest(&CLOSES, windows(3, 5)).unwrap();
    assert_eq!(a, b);
}
