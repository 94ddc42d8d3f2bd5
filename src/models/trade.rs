//! Trade model representing one journaled trading decision.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::JournalError;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "Long",
            Direction::Short => "Short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Direction::Long),
            "short" | "sell" => Ok(Direction::Short),
            other => Err(JournalError::invalid(
                "direction",
                format!("expected Long or Short, got '{}'", other),
            )),
        }
    }
}

/// A persisted journal entry.
///
/// Sizing fields are fixed at open time. `close_price`, `result` and
/// `balance_after` stay `None` until the trade is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Auto-assigned, monotonically increasing identity
    pub id: i64,

    pub symbol: String,
    pub direction: Direction,

    /// Date the trade was opened
    pub opened_on: NaiveDate,

    /// Time of day the trade was opened
    pub opened_at: NaiveTime,

    /// Time of day the trade was closed, if recorded
    pub closed_at: Option<NaiveTime>,

    pub entry_price: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub close_price: Option<Decimal>,

    /// Percentage of the balance put at risk (0 to 100)
    pub risk_pct: Decimal,

    pub pips_to_target: Decimal,
    pub pips_to_stop: Decimal,

    /// Expected win in account currency if the target is hit
    pub est_win: Decimal,

    /// Expected loss in account currency if the stop is hit
    pub est_loss: Decimal,

    /// Recommended size in lots
    pub position_size: Decimal,

    /// Balance the sizing was computed against
    pub balance_at_open: Decimal,

    /// Account balance right after this trade settled
    pub balance_after: Option<Decimal>,

    /// Realized P&L in account currency
    pub result: Option<Decimal>,

    pub comment: String,

    /// File name of an attached screenshot or note
    pub attachment: Option<String>,

    pub link: Option<String>,

    /// Reserved for trading-session tagging
    pub session: Option<String>,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.result.is_some()
    }

    /// Combined open date and time.
    pub fn opened(&self) -> NaiveDateTime {
        self.opened_on.and_time(self.opened_at)
    }
}

/// Fields for a new, open trade. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub symbol: String,
    pub direction: Direction,
    pub opened_on: NaiveDate,
    pub opened_at: NaiveTime,
    pub entry_price: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub risk_pct: Decimal,
    pub pips_to_target: Decimal,
    pub pips_to_stop: Decimal,
    pub est_win: Decimal,
    pub est_loss: Decimal,
    pub position_size: Decimal,
    pub balance_at_open: Decimal,
    pub comment: String,
    pub attachment: Option<String>,
    pub link: Option<String>,
}

/// Close-related fields written when a trade is settled or re-edited.
#[derive(Debug, Clone)]
pub struct TradeUpdate {
    pub entry_price: Decimal,
    pub close_price: Decimal,
    pub result: Decimal,
    pub closed_at: Option<NaiveTime>,
    pub comment: String,
    pub attachment: Option<String>,
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parsing() {
        assert_eq!("Long".parse::<Direction>().unwrap(), Direction::Long);
        assert_eq!(" short ".parse::<Direction>().unwrap(), Direction::Short);
        assert_eq!("BUY".parse::<Direction>().unwrap(), Direction::Long);
        assert!(matches!(
            "flat".parse::<Direction>(),
            Err(JournalError::InvalidInput { field: "direction", .. })
        ));
    }

    #[test]
    fn test_direction_display_round_trips() {
        for d in [Direction::Long, Direction::Short] {
            assert_eq!(d.to_string().parse::<Direction>().unwrap(), d);
        }
    }
}
