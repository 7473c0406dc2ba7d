//! AramPlus Core: domain types, market data, indicators, signal rule, backtest.
//!
//! This crate contains the signal pipeline:
//! - Domain types (price bars, validated price series)
//! - Data providers (Yahoo Finance, CSV, synthetic) and canonicalization
//! - MA / RSI / ATR indicators computed once per series
//! - The BUY/HOLD rule with ATR-based stop-loss and take-profit levels
//! - A causal, single-position backtest with an equity curve
//! - The broker boundary (order intents and executors)

pub mod backtest;
pub mod broker;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod signal;
