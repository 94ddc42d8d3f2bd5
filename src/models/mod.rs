//! Data models for journaled trades and derived metrics.

mod metrics;
mod trade;

pub use metrics::{BalancePoint, Metrics, MonthlyReturn, SymbolCount};
pub use trade::{Direction, NewTrade, Trade, TradeUpdate};
