//! Journal performance snapshot: P&L, win/loss, monthly returns, popularity.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Realized P&L for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,

    /// Sum of results of trades opened in this month
    pub pnl: Decimal,

    /// `pnl` as a percentage of the journal's starting balance
    pub pct: Decimal,
}

impl MonthlyReturn {
    /// Label in `YYYY-MM` form.
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// How many times a symbol was traded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCount {
    pub symbol: String,
    pub count: usize,
}

/// Balance right after a closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub trade_id: i64,
    pub at: NaiveDateTime,
    pub balance: Decimal,
}

/// Aggregate statistics over the whole trade history.
///
/// Values that need at least one qualifying trade (averages, extremes) are
/// `None` when there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// First-ever recorded balance
    pub initial_balance: Decimal,

    /// Balance after the most recently closed trade
    pub current_balance: Decimal,

    // === Counts ===
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,

    /// Trades with a positive result
    pub winning_trades: usize,

    /// Trades with a negative result
    pub losing_trades: usize,

    // === P&L ===
    pub total_pnl: Decimal,
    pub gross_profit: Decimal,

    /// Absolute sum of losing results
    pub gross_loss: Decimal,

    /// gross_profit / gross_loss, 0 while there are no losses
    pub profit_factor: f64,

    pub avg_win: Option<Decimal>,

    /// Mean of losing results (negative)
    pub avg_loss: Option<Decimal>,

    pub best_trade: Option<Decimal>,
    pub worst_trade: Option<Decimal>,

    /// Sum of recommended lot sizes, open trades included
    pub total_lots: Decimal,

    // === Series ===
    pub monthly_returns: Vec<MonthlyReturn>,
    pub top_symbols: Vec<SymbolCount>,
    pub balance_curve: Vec<BalancePoint>,
}

impl Metrics {
    /// Metrics for a journal with no trades.
    pub fn empty(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            current_balance: initial_balance,
            total_trades: 0,
            open_trades: 0,
            closed_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_pnl: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: 0.0,
            avg_win: None,
            avg_loss: None,
            best_trade: None,
            worst_trade: None,
            total_lots: Decimal::ZERO,
            monthly_returns: Vec::new(),
            top_symbols: Vec::new(),
            balance_curve: Vec::new(),
        }
    }

    /// Winners over decided trades (0.0 to 1.0). Break-even trades don't count.
    pub fn win_rate(&self) -> Option<f64> {
        let decided = self.winning_trades + self.losing_trades;
        if decided == 0 {
            return None;
        }
        Some(self.winning_trades as f64 / decided as f64)
    }

    pub fn has_data(&self) -> bool {
        self.total_trades > 0
    }
}

fn money(value: Option<Decimal>) -> String {
    value
        .map(|v| format!("${:.2}", v.round_dp(2)))
        .unwrap_or_else(|| "n/a".to_string())
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^50}", " DASHBOARD ")?;
        writeln!(f, "Balance:          ${:.2}", self.current_balance.round_dp(2))?;
        writeln!(f, "Starting Balance: ${:.2}", self.initial_balance.round_dp(2))?;

        if !self.has_data() {
            writeln!(f, "\nNo trades recorded yet.")?;
            writeln!(f, "{:=^50}", "")?;
            return Ok(());
        }

        writeln!(f)?;
        writeln!(f, "Total P&L:        ${:.2}", self.total_pnl.round_dp(2))?;
        writeln!(f, "Profit Factor:    {:.2}", self.profit_factor)?;
        writeln!(f, "Avg Win:          {}", money(self.avg_win))?;
        writeln!(f, "Avg Loss:         {}", money(self.avg_loss))?;
        writeln!(f)?;
        writeln!(
            f,
            "Trades:           {} ({} open, {} closed)",
            self.total_trades, self.open_trades, self.closed_trades
        )?;
        match self.win_rate() {
            Some(rate) => writeln!(
                f,
                "Win Rate:         {:.1}% ({} W / {} L)",
                rate * 100.0,
                self.winning_trades,
                self.losing_trades
            )?,
            None => writeln!(f, "Win Rate:         n/a")?,
        }
        writeln!(f, "Total Lots:       {:.2}", self.total_lots.round_dp(2))?;
        writeln!(f, "Best Trade:       {}", money(self.best_trade))?;
        writeln!(f, "Worst Trade:      {}", money(self.worst_trade))?;

        if !self.monthly_returns.is_empty() {
            writeln!(f, "\n--- Monthly Return ---")?;
            for m in &self.monthly_returns {
                writeln!(f, "  {}  {:>+8.2}%  (${:.2})", m.label(), m.pct.round_dp(2), m.pnl.round_dp(2))?;
            }
        }

        if !self.top_symbols.is_empty() {
            writeln!(f, "\n--- Most Traded ---")?;
            for s in &self.top_symbols {
                writeln!(f, "  {:<12} {:>4}", s.symbol, s.count)?;
            }
        }

        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}
