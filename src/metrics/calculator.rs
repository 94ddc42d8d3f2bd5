//! Calculator for journal performance metrics: P&L, profit factor, win rate, etc.

use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{BalancePoint, Metrics, MonthlyReturn, SymbolCount, Trade};

/// Number of symbols reported in the popularity table by default.
pub const DEFAULT_TOP_SYMBOLS: usize = 5;

/// Calculator for computing journal performance metrics.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate metrics from the full trade history.
    ///
    /// `trades` must be ordered by id. P&L statistics only consider closed
    /// trades; counts, lots and symbol popularity include open ones.
    pub fn calculate(trades: &[Trade], initial_balance: Decimal, top_symbols: usize) -> Metrics {
        let mut metrics = Metrics::empty(initial_balance);

        if trades.is_empty() {
            return metrics;
        }

        metrics.total_trades = trades.len();
        metrics.total_lots = trades.iter().map(|t| t.position_size).sum();

        let results: Vec<Decimal> = trades.iter().filter_map(|t| t.result).collect();
        metrics.closed_trades = results.len();
        metrics.open_trades = trades.len() - results.len();

        if !results.is_empty() {
            Self::calculate_pnl_metrics(&mut metrics, &results);
        }

        Self::calculate_balance(&mut metrics, trades);
        metrics.monthly_returns = Self::monthly_returns(trades, initial_balance);
        metrics.top_symbols = Self::symbol_popularity(trades, top_symbols);

        metrics
    }

    /// Calculate P&L-related metrics from realized results.
    fn calculate_pnl_metrics(metrics: &mut Metrics, results: &[Decimal]) {
        let wins: Vec<Decimal> = results.iter().copied().filter(|r| *r > Decimal::ZERO).collect();
        let losses: Vec<Decimal> = results.iter().copied().filter(|r| *r < Decimal::ZERO).collect();

        metrics.winning_trades = wins.len();
        metrics.losing_trades = losses.len();
        metrics.total_pnl = results.iter().copied().sum();

        metrics.gross_profit = wins.iter().copied().sum();
        metrics.gross_loss = losses.iter().map(|l| l.abs()).sum();

        if !wins.is_empty() {
            metrics.avg_win = Some(metrics.gross_profit / Decimal::from(wins.len()));
        }
        if !losses.is_empty() {
            let sum: Decimal = losses.iter().copied().sum();
            metrics.avg_loss = Some(sum / Decimal::from(losses.len()));
        }

        if metrics.gross_loss > Decimal::ZERO {
            metrics.profit_factor = metrics.gross_profit.to_f64().unwrap_or(0.0)
                / metrics.gross_loss.to_f64().unwrap_or(1.0);
        }

        metrics.best_trade = results.iter().copied().max();
        metrics.worst_trade = results.iter().copied().min();
    }

    /// Current balance and the balance curve from the settled chain.
    fn calculate_balance(metrics: &mut Metrics, trades: &[Trade]) {
        metrics.balance_curve = trades
            .iter()
            .filter(|t| t.is_closed())
            .filter_map(|t| {
                t.balance_after.map(|balance| BalancePoint {
                    trade_id: t.id,
                    at: t.opened(),
                    balance,
                })
            })
            .collect();

        if let Some(last) = metrics.balance_curve.last() {
            metrics.current_balance = last.balance;
        }
    }

    /// Realized P&L per calendar month of the open date.
    ///
    /// Percentages use the starting balance as a fixed denominator, so they
    /// add up to the total return instead of compounding. Months with no
    /// closed trade are left out of the series.
    fn monthly_returns(trades: &[Trade], initial_balance: Decimal) -> Vec<MonthlyReturn> {
        let mut by_month: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();

        for trade in trades {
            if let Some(result) = trade.result {
                let key = (trade.opened_on.year(), trade.opened_on.month());
                *by_month.entry(key).or_insert(Decimal::ZERO) += result;
            }
        }

        by_month
            .into_iter()
            .map(|((year, month), pnl)| {
                let pct = if initial_balance.is_zero() {
                    Decimal::ZERO
                } else {
                    pnl / initial_balance * dec!(100)
                };
                MonthlyReturn {
                    year,
                    month,
                    pnl,
                    pct,
                }
            })
            .collect()
    }

    /// Most traded symbols, open trades included. Ties sort by name.
    fn symbol_popularity(trades: &[Trade], limit: usize) -> Vec<SymbolCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for trade in trades {
            *counts.entry(trade.symbol.as_str()).or_insert(0) += 1;
        }

        let mut ranked: Vec<SymbolCount> = counts
            .into_iter()
            .map(|(symbol, count)| SymbolCount {
                symbol: symbol.to_string(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symbol.cmp(&b.symbol)));
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    use crate::models::Direction;

    fn trade(id: i64, date: (i32, u32, u32), symbol: &str, result: Option<Decimal>) -> Trade {
        Trade {
            id,
            symbol: symbol.to_string(),
            direction: Direction::Long,
            opened_on: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            opened_at: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            closed_at: None,
            entry_price: dec!(1.1000),
            take_profit: dec!(1.1050),
            stop_loss: dec!(1.0950),
            close_price: result.map(|_| dec!(1.1000)),
            risk_pct: dec!(1),
            pips_to_target: dec!(50),
            pips_to_stop: dec!(50),
            est_win: dec!(10),
            est_loss: dec!(10),
            position_size: dec!(0.5),
            balance_at_open: dec!(1000),
            balance_after: None,
            result,
            comment: String::new(),
            attachment: None,
            link: None,
            session: None,
        }
    }

    /// Closed trades with the balance chain filled in from `initial`.
    fn chained(initial: Decimal, mut trades: Vec<Trade>) -> Vec<Trade> {
        let mut balance = initial;
        for t in trades.iter_mut() {
            if let Some(r) = t.result {
                balance += r;
                t.balance_after = Some(balance);
            }
        }
        trades
    }

    #[test]
    fn test_empty_history() {
        let metrics = MetricsCalculator::calculate(&[], dec!(1000), DEFAULT_TOP_SYMBOLS);

        assert_eq!(metrics, Metrics::empty(dec!(1000)));
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.total_pnl, Decimal::ZERO);
        assert_eq!(metrics.profit_factor, 0.0);
        assert!(metrics.avg_win.is_none());
        assert!(metrics.best_trade.is_none());
        assert_eq!(metrics.current_balance, dec!(1000));
        assert!(metrics.monthly_returns.is_empty());
        assert!(metrics.top_symbols.is_empty());
    }

    #[test]
    fn test_calculate_pnl_metrics() {
        let trades = chained(
            dec!(1000),
            vec![
                trade(1, (2024, 1, 5), "EURUSD", Some(dec!(50))),
                trade(2, (2024, 1, 9), "EURUSD", Some(dec!(-20))),
                trade(3, (2024, 2, 1), "GBPUSD", Some(dec!(30))),
            ],
        );
        let metrics = MetricsCalculator::calculate(&trades, dec!(1000), DEFAULT_TOP_SYMBOLS);

        assert_eq!(metrics.total_pnl, dec!(60));
        assert_eq!(metrics.gross_profit, dec!(80));
        assert_eq!(metrics.gross_loss, dec!(20));
        assert!((metrics.profit_factor - 4.0).abs() < 1e-12);
        assert_eq!(metrics.avg_win, Some(dec!(40)));
        assert_eq!(metrics.avg_loss, Some(dec!(-20)));
        assert_eq!(metrics.best_trade, Some(dec!(50)));
        assert_eq!(metrics.worst_trade, Some(dec!(-20)));
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.current_balance, dec!(1060));
    }

    #[test]
    fn test_break_even_trade_is_neither_win_nor_loss() {
        let trades = chained(dec!(1000), vec![trade(1, (2024, 3, 1), "USDJPY", Some(Decimal::ZERO))]);
        let metrics = MetricsCalculator::calculate(&trades, dec!(1000), DEFAULT_TOP_SYMBOLS);

        assert_eq!((metrics.winning_trades, metrics.losing_trades), (0, 0));
        assert_eq!(metrics.closed_trades, 1);
        assert!(metrics.avg_win.is_none());
        assert!(metrics.avg_loss.is_none());
        assert_eq!(metrics.best_trade, Some(Decimal::ZERO));
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.win_rate(), None);
    }

    #[test]
    fn test_no_losses_gives_zero_profit_factor() {
        let trades = chained(
            dec!(1000),
            vec![
                trade(1, (2024, 3, 1), "EURUSD", Some(dec!(10))),
                trade(2, (2024, 3, 2), "EURUSD", Some(dec!(15))),
            ],
        );
        let metrics = MetricsCalculator::calculate(&trades, dec!(1000), DEFAULT_TOP_SYMBOLS);

        assert_eq!(metrics.profit_factor, 0.0);
        assert!(metrics.avg_loss.is_none());
        assert_eq!(metrics.win_rate(), Some(1.0));
    }

    #[test]
    fn test_open_trades_count_for_lots_and_popularity_only() {
        let trades = chained(
            dec!(1000),
            vec![
                trade(1, (2024, 4, 1), "EURUSD", Some(dec!(25))),
                trade(2, (2024, 4, 2), "XAUUSD", None),
                trade(3, (2024, 4, 3), "XAUUSD", None),
            ],
        );
        let metrics = MetricsCalculator::calculate(&trades, dec!(1000), DEFAULT_TOP_SYMBOLS);

        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.open_trades, 2);
        assert_eq!(metrics.closed_trades, 1);
        assert_eq!(metrics.total_lots, dec!(1.5));
        assert_eq!(metrics.total_pnl, dec!(25));
        assert_eq!(metrics.current_balance, dec!(1025));
        assert_eq!(metrics.top_symbols[0], SymbolCount { symbol: "XAUUSD".to_string(), count: 2 });
        assert_eq!(metrics.balance_curve.len(), 1);
    }

    #[test]
    fn test_months_with_only_open_trades_are_omitted() {
        let trades = chained(
            dec!(1000),
            vec![
                trade(1, (2024, 5, 2), "EURUSD", Some(dec!(20))),
                trade(2, (2024, 6, 7), "EURUSD", None),
                trade(3, (2024, 7, 1), "EURUSD", Some(dec!(-10))),
            ],
        );
        let metrics = MetricsCalculator::calculate(&trades, dec!(1000), DEFAULT_TOP_SYMBOLS);

        let labels: Vec<String> = metrics.monthly_returns.iter().map(|m| m.label()).collect();
        assert_eq!(labels, vec!["2024-05", "2024-07"]);
    }

    #[test]
    fn test_monthly_returns_use_fixed_denominator() {
        let trades = chained(
            dec!(2000),
            vec![
                trade(1, (2024, 1, 15), "EURUSD", Some(dec!(100))),
                trade(2, (2024, 1, 20), "EURUSD", Some(dec!(-40))),
                trade(3, (2024, 2, 3), "EURUSD", Some(dec!(200))),
                trade(4, (2024, 3, 9), "EURUSD", Some(dec!(-30))),
                trade(5, (2024, 3, 12), "EURUSD", None),
            ],
        );
        let metrics = MetricsCalculator::calculate(&trades, dec!(2000), DEFAULT_TOP_SYMBOLS);

        let labels: Vec<String> = metrics.monthly_returns.iter().map(|m| m.label()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);

        // February is measured against the starting 2000, not the rebased 2060
        assert_eq!(metrics.monthly_returns[0].pct, dec!(3));
        assert_eq!(metrics.monthly_returns[1].pct, dec!(10));
        assert_eq!(metrics.monthly_returns[2].pct, dec!(-1.5));

        let sum: Decimal = metrics.monthly_returns.iter().map(|m| m.pct).sum();
        let expected = metrics.total_pnl / dec!(2000) * dec!(100);
        assert!((sum - expected).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_monthly_returns_with_zero_starting_balance() {
        let trades = chained(Decimal::ZERO, vec![trade(1, (2024, 5, 1), "EURUSD", Some(dec!(5)))]);
        let metrics = MetricsCalculator::calculate(&trades, Decimal::ZERO, DEFAULT_TOP_SYMBOLS);

        assert_eq!(metrics.monthly_returns[0].pnl, dec!(5));
        assert_eq!(metrics.monthly_returns[0].pct, Decimal::ZERO);
    }

    #[test]
    fn test_symbol_popularity_ranking() {
        let symbols = ["GBPUSD", "EURUSD", "GBPUSD", "AUDUSD", "EURUSD", "GBPUSD", "NZDUSD"];
        let trades: Vec<Trade> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| trade(i as i64 + 1, (2024, 6, 1), s, None))
            .collect();

        let top = MetricsCalculator::calculate(&trades, dec!(1000), 3).top_symbols;

        assert_eq!(top.len(), 3);
        assert_eq!((top[0].symbol.as_str(), top[0].count), ("GBPUSD", 3));
        assert_eq!((top[1].symbol.as_str(), top[1].count), ("EURUSD", 2));
        // AUDUSD and NZDUSD tie at 1; alphabetical order decides
        assert_eq!(top[2].symbol, "AUDUSD");
    }

    #[test]
    fn test_calculation_is_idempotent() {
        let trades = chained(
            dec!(1000),
            vec![
                trade(1, (2024, 1, 5), "EURUSD", Some(dec!(12.5))),
                trade(2, (2024, 2, 5), "GBPUSD", Some(dec!(-7.25))),
                trade(3, (2024, 2, 6), "EURUSD", None),
            ],
        );

        let first = MetricsCalculator::calculate(&trades, dec!(1000), DEFAULT_TOP_SYMBOLS);
        let second = MetricsCalculator::calculate(&trades, dec!(1000), DEFAULT_TOP_SYMBOLS);
        assert_eq!(first, second);
    }
}
