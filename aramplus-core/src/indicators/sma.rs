//! Simple Moving Average (SMA).
//!
//! Arithmetic mean of the trailing `period` closes, current bar included.
//! `None` until `period` closes are available.

use super::{rolling_mean, Indicator};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn window(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rolling_mean(&closes, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_3_over_reference_closes() {
        let bars = make_bars(&[
            100.0, 102.0, 101.0, 105.0, 107.0, 110.0, 108.0, 112.0, 115.0, 117.0,
        ]);
        let result = Sma::new(3).compute(&bars);

        assert_eq!(result.len(), 10);
        assert!(result[0].is_none() && result[1].is_none());
        // mean(100, 102, 101)
        assert_approx(result[2].unwrap(), 101.0, DEFAULT_EPSILON);
        // mean(112, 115, 117)
        assert_approx(result[9].unwrap(), 344.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_close() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Sma::new(1).compute(&bars);
        assert_eq!(result, vec![Some(100.0), Some(200.0), Some(300.0)]);
    }

    #[test]
    fn sma_constant_price_is_exact() {
        let bars = make_bars(&[250.0; 20]);
        let result = Sma::new(7).compute(&bars);
        for value in result.iter().skip(6) {
            assert_eq!(*value, Some(250.0));
        }
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).lookback(), 19);
        assert_eq!(Sma::new(1).lookback(), 0);
        assert_eq!(Sma::new(20).name(), "sma_20");
    }

    #[test]
    fn sma_too_few_bars() {
        let bars = make_bars(&[64_000.0, 65_500.0]);
        let result = Sma::new(50).compute(&bars);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    #[should_panic(expected = "SMA period must be >= 1")]
    fn sma_zero_period_panics() {
        Sma::new(0);
    }
}
