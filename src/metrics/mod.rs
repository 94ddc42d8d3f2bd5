//! Performance aggregation over the trade history.

mod calculator;

pub use calculator::{MetricsCalculator, DEFAULT_TOP_SYMBOLS};
