//! Journal handle: binds one trade store to one sizing configuration.
//!
//! Every user action goes through an explicit `Journal`:
//! - Previewing a position size before committing to it
//! - Opening a trade sized against the current balance
//! - Closing or re-editing a trade, which re-settles the balance chain
//! - Reading history and the dashboard snapshot

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::db::{Database, JournalInfo};
use crate::error::JournalError;
use crate::metrics::MetricsCalculator;
use crate::models::{Direction, Metrics, NewTrade, Trade, TradeUpdate};
use crate::sizing::{PositionSizer, SizingConfig, SizingResult};

type Result<T> = std::result::Result<T, JournalError>;

/// File extension of journal databases.
pub const JOURNAL_EXTENSION: &str = "db";

/// A trade the user wants to open.
#[derive(Debug, Clone)]
pub struct OpenTrade {
    pub symbol: String,
    pub direction: Direction,
    pub opened_on: NaiveDate,
    pub opened_at: NaiveTime,
    pub risk_pct: Decimal,
    pub entry_price: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub comment: String,
    pub attachment: Option<String>,
    pub link: Option<String>,
}

/// Closing (or re-editing) a trade. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct CloseTrade {
    pub close_price: Decimal,
    pub entry_price: Option<Decimal>,
    pub closed_at: Option<NaiveTime>,
    pub comment: Option<String>,
    pub attachment: Option<String>,
    pub link: Option<String>,
}

/// An open journal file.
pub struct Journal {
    db: Database,
    sizer: PositionSizer,
}

impl Journal {
    /// Wrap an already-open database. Rejects sizing constants that are not positive.
    pub fn new(db: Database, config: SizingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            db,
            sizer: PositionSizer::new(config),
        })
    }

    /// Create a journal file with its starting balance.
    pub async fn create(path: &Path, initial_balance: Decimal, config: SizingConfig) -> Result<Self> {
        validate_balance(initial_balance)?;
        config.validate()?;

        let db = Database::open(path, true).await?;
        db.init_journal(initial_balance).await?;

        info!(path = %path.display(), initial_balance = %initial_balance, "Created journal");
        Self::new(db, config)
    }

    /// Open an existing journal file.
    pub async fn open(path: &Path, config: SizingConfig) -> Result<Self> {
        config.validate()?;
        let db = Database::open(path, false).await?;
        db.journal_info().await?;
        Self::new(db, config)
    }

    pub async fn info(&self) -> Result<JournalInfo> {
        self.db.journal_info().await
    }

    /// Balance after the most recently closed trade, or the starting balance.
    pub async fn current_balance(&self) -> Result<Decimal> {
        let info = self.db.journal_info().await?;
        let trades = self.db.all_trades().await?;

        Ok(trades
            .iter()
            .rev()
            .filter(|t| t.is_closed())
            .find_map(|t| t.balance_after)
            .unwrap_or(info.initial_balance))
    }

    /// Size a hypothetical trade without saving anything.
    pub fn preview(
        &self,
        balance: Decimal,
        risk_pct: Decimal,
        entry_price: Decimal,
        take_profit: Decimal,
        stop_loss: Decimal,
    ) -> Result<SizingResult> {
        validate_balance(balance)?;
        validate_risk(risk_pct)?;
        validate_price("entry_price", entry_price)?;
        validate_price("take_profit", take_profit)?;
        validate_price("stop_loss", stop_loss)?;

        self.sizer
            .size(balance, risk_pct, entry_price, take_profit, stop_loss)
    }

    /// Size a trade against the current balance and save it as open.
    pub async fn open_trade(&self, request: OpenTrade) -> Result<Trade> {
        let symbol = request.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(JournalError::invalid("symbol", "must not be empty"));
        }

        let balance = self.current_balance().await?;
        let sizing = self.preview(
            balance,
            request.risk_pct,
            request.entry_price,
            request.take_profit,
            request.stop_loss,
        )?;

        let new_trade = NewTrade {
            symbol,
            direction: request.direction,
            opened_on: request.opened_on,
            opened_at: request.opened_at,
            entry_price: request.entry_price,
            take_profit: request.take_profit,
            stop_loss: request.stop_loss,
            risk_pct: request.risk_pct,
            pips_to_target: sizing.pips_to_target,
            pips_to_stop: sizing.pips_to_stop,
            est_win: sizing.est_win,
            est_loss: sizing.est_loss,
            position_size: sizing.position_size,
            balance_at_open: balance,
            comment: request.comment,
            attachment: non_empty(request.attachment),
            link: non_empty(request.link),
        };

        let id = self.db.insert_trade(&new_trade).await?;
        info!(
            id = id,
            symbol = %new_trade.symbol,
            direction = %new_trade.direction,
            lots = %new_trade.position_size.round_dp(2),
            "Trade opened"
        );

        self.db.get_trade(id).await
    }

    /// Settle a trade at `close_price`, or re-edit an already closed one.
    pub async fn close_trade(&self, id: i64, request: CloseTrade) -> Result<Trade> {
        let trade = self.db.get_trade(id).await?;

        let entry_price = request.entry_price.unwrap_or(trade.entry_price);
        validate_price("entry_price", entry_price)?;
        validate_price("close_price", request.close_price)?;

        let result = self.sizer.settle(&trade, entry_price, request.close_price)?;
        let was_closed = trade.is_closed();

        let update = TradeUpdate {
            entry_price,
            close_price: request.close_price,
            result,
            closed_at: request.closed_at.or(trade.closed_at),
            comment: request.comment.unwrap_or(trade.comment),
            attachment: non_empty(request.attachment).or(trade.attachment),
            link: match request.link {
                Some(link) => non_empty(Some(link)),
                None => trade.link,
            },
        };

        self.db.update_trade(id, &update).await?;

        if was_closed {
            info!(id = id, result = %result.round_dp(2), "Closed trade re-edited");
        } else {
            info!(id = id, result = %result.round_dp(2), "Trade closed");
        }

        self.db.get_trade(id).await
    }

    pub async fn trade(&self, id: i64) -> Result<Trade> {
        self.db.get_trade(id).await
    }

    /// Trades opened within an inclusive date range.
    pub async fn history(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<Trade>> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(JournalError::invalid(
                    "date range",
                    format!("{} is after {}", from, to),
                ));
            }
        }
        self.db.trades_between(from, to).await
    }

    /// Snapshot of every metric over the full history.
    pub async fn dashboard(&self, top_symbols: usize) -> Result<Metrics> {
        let info = self.db.journal_info().await?;
        let trades = self.db.all_trades().await?;
        debug!(trades = trades.len(), "Aggregating journal");

        Ok(MetricsCalculator::calculate(&trades, info.initial_balance, top_symbols))
    }

    /// Recompute every stored post-trade balance.
    pub async fn rebuild_balances(&self) -> Result<usize> {
        self.db.rebuild_balance_chain().await
    }
}

/// Journal files in `dir`, sorted by name.
pub fn list_journals(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut journals = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == JOURNAL_EXTENSION) {
            journals.push(path);
        }
    }
    journals.sort();
    Ok(journals)
}

/// Path of a journal called `name` inside `dir`.
pub fn journal_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, JOURNAL_EXTENSION))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_balance(balance: Decimal) -> Result<()> {
    if balance < Decimal::ZERO {
        return Err(JournalError::invalid("balance", "must not be negative"));
    }
    Ok(())
}

fn validate_risk(risk_pct: Decimal) -> Result<()> {
    if risk_pct < Decimal::ZERO || risk_pct > dec!(100) {
        return Err(JournalError::invalid(
            "risk_pct",
            format!("{} is outside 0-100", risk_pct),
        ));
    }
    Ok(())
}

fn validate_price(field: &'static str, price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(JournalError::invalid(field, "must be positive"));
    }
    Ok(())
}
