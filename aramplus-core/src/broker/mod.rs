//! Broker boundary: order intents and the executor trait.
//!
//! The core only describes what it would send. Placing orders is an adapter
//! behind [`OrderExecutor`]; the bundled [`DryRunExecutor`] logs the intent
//! and acknowledges it without contacting anything.

use crate::signal::{Signal, SignalDecision};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// How the order should be placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderType {
    /// Fill at the current market price.
    Market,
    /// Market entry with stop-loss and take-profit children.
    MarketBracket { stop_loss: f64, take_profit: f64 },
}

/// An order the signal would place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
}

impl TradeIntent {
    /// Intent for a decision: a market buy sized from `balance` for BUY,
    /// nothing for HOLD.
    ///
    /// Quantity is `balance / close` floored to a multiple of `quantity_step`.
    /// Returns `None` when the balance is not positive or rounds to zero units.
    pub fn for_decision(
        symbol: &str,
        decision: &SignalDecision,
        balance: f64,
        quantity_step: f64,
    ) -> Option<Self> {
        if decision.signal != Signal::Buy || !(balance > 0.0) || !(decision.close > 0.0) {
            return None;
        }

        let raw = balance / decision.close;
        let quantity = if quantity_step > 0.0 {
            (raw / quantity_step).floor() * quantity_step
        } else {
            raw
        };
        if !(quantity > 0.0) {
            return None;
        }

        let order_type = match decision.risk {
            Some(levels) => OrderType::MarketBracket {
                stop_loss: levels.stop_loss,
                take_profit: levels.take_profit,
            },
            None => OrderType::Market,
        };

        Some(Self {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            quantity,
            order_type,
        })
    }
}

/// What the executor did with an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Accepted,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: String,
    pub status: ExecutionStatus,
    pub intent: TradeIntent,
}

#[derive(Debug, Error, PartialEq)]
pub enum BrokerError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("invalid intent: {0}")]
    InvalidIntent(String),
}

/// Places order intents somewhere.
pub trait OrderExecutor: Send + Sync {
    fn name(&self) -> &str;

    fn submit(&self, intent: &TradeIntent) -> Result<ExecutionReport, BrokerError>;
}

/// Logs intents and acknowledges them as simulated.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    submitted: AtomicU64,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl OrderExecutor for DryRunExecutor {
    fn name(&self) -> &str {
        "dry_run"
    }

    fn submit(&self, intent: &TradeIntent) -> Result<ExecutionReport, BrokerError> {
        if !(intent.quantity > 0.0) {
            return Err(BrokerError::InvalidIntent(format!(
                "quantity must be positive, got {}",
                intent.quantity
            )));
        }

        let n = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "[dry-run] {:?} {} {} ({:?})",
            intent.side, intent.quantity, intent.symbol, intent.order_type
        );

        Ok(ExecutionReport {
            order_id: format!("dry-run-{n}"),
            status: ExecutionStatus::Simulated,
            intent: intent.clone(),
        })
    }
}
