//! Intrabar protective exits: stop-loss and take-profit against a bar's range.
//!
//! Path policy is worst case: when a bar touches both levels the stop fills.
//! Gap rule: if the bar opens beyond a level, the fill is at the open.

use crate::domain::PriceBar;
use crate::signal::RiskLevels;
use serde::{Deserialize, Serialize};

/// Whether the backtest checks RiskLevels inside each bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectiveExits {
    /// Positions close only on the signal exit rule.
    #[default]
    Disabled,
    /// Levels computed at entry are armed from the next bar.
    Intrabar,
}

/// Why a protective level closed the position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProtectiveHit {
    StopLoss { price: f64 },
    TakeProfit { price: f64 },
}

/// Check a long position's levels against one bar.
pub fn check_long(levels: &RiskLevels, bar: &PriceBar) -> Option<ProtectiveHit> {
    if bar.low <= levels.stop_loss {
        let price = if bar.open < levels.stop_loss {
            bar.open
        } else {
            levels.stop_loss
        };
        return Some(ProtectiveHit::StopLoss { price });
    }

    if bar.high >= levels.take_profit {
        let price = if bar.open > levels.take_profit {
            bar.open
        } else {
            levels.take_profit
        };
        return Some(ProtectiveHit::TakeProfit { price });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
        )
    }

    const LEVELS: RiskLevels = RiskLevels {
        stop_loss: 97.0,
        take_profit: 106.0,
    };

    #[test]
    fn inside_range_is_no_hit() {
        assert_eq!(check_long(&LEVELS, &bar(100.0, 105.0, 98.0, 101.0)), None);
    }

    #[test]
    fn stop_fills_at_level() {
        assert_eq!(
            check_long(&LEVELS, &bar(100.0, 101.0, 95.0, 96.0)),
            Some(ProtectiveHit::StopLoss { price: 97.0 })
        );
    }

    #[test]
    fn gap_down_fills_at_open() {
        assert_eq!(
            check_long(&LEVELS, &bar(94.0, 95.0, 92.0, 93.0)),
            Some(ProtectiveHit::StopLoss { price: 94.0 })
        );
    }

    #[test]
    fn take_profit_and_gap_up() {
        assert_eq!(
            check_long(&LEVELS, &bar(104.0, 107.0, 103.0, 105.0)),
            Some(ProtectiveHit::TakeProfit { price: 106.0 })
        );
        assert_eq!(
            check_long(&LEVELS, &bar(108.0, 110.0, 107.0, 109.0)),
            Some(ProtectiveHit::TakeProfit { price: 108.0 })
        );
    }

    #[test]
    fn both_touched_is_worst_case() {
        assert_eq!(
            check_long(&LEVELS, &bar(100.0, 107.0, 96.0, 100.0)),
            Some(ProtectiveHit::StopLoss { price: 97.0 })
        );
    }
}
