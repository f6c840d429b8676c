//! Core domain types and logic.

pub mod ohlcv;
pub mod corporate_action;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod execution;
pub mod ledger;
pub mod market;
pub mod batch;
pub mod backtest;
pub mod metrics;
pub mod config;
pub mod config_validation;
pub mod error;
