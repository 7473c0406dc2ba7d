//! Cash and fee bookkeeping for the single-position backtest.

/// Cash and cumulative fees of one backtest run.
#[derive(Debug, Clone)]
pub struct EquityTracker {
    cash: f64,
    fees_paid: f64,
}

impl EquityTracker {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            fees_paid: 0.0,
        }
    }

    /// Pay for `quantity` units at `price` plus `fee`.
    pub fn apply_buy(&mut self, price: f64, quantity: f64, fee: f64) {
        self.cash -= price * quantity + fee;
        self.fees_paid += fee;
    }

    /// Receive `quantity` units at `price` minus `fee`.
    pub fn apply_sell(&mut self, price: f64, quantity: f64, fee: f64) {
        self.cash += price * quantity - fee;
        self.fees_paid += fee;
    }

    /// Cash plus the marked value of the open quantity.
    pub fn compute_equity(&self, quantity: f64, price: f64) -> f64 {
        self.cash + quantity * price
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }
}
