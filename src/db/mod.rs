//! SQLite persistence for the journal.
//!
//! One file per journal holds:
//! - The journal header (starting balance, creation time)
//! - Every trade, open or closed, keyed by an auto-increment id
//!
//! Money and prices are stored as decimal text so the balance chain
//! survives a round trip without float drift.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::JournalError;
use crate::models::{Direction, NewTrade, Trade, TradeUpdate};

type Result<T> = std::result::Result<T, JournalError>;

/// Database connection pool for one journal file.
pub struct Database {
    pool: SqlitePool,
}

/// Journal header row.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalInfo {
    /// First-ever recorded balance
    pub initial_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StoredJournal {
    initial_balance: String,
    created_at: DateTime<Utc>,
}

/// Trade row as stored, before decimal parsing.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StoredTrade {
    id: i64,
    opened_on: NaiveDate,
    opened_at: NaiveTime,
    symbol: String,
    direction: String,
    comment: String,
    risk_pct: String,
    entry_price: String,
    take_profit: String,
    stop_loss: String,
    pips_to_target: String,
    pips_to_stop: String,
    est_win: String,
    est_loss: String,
    position_size: String,
    balance_at_open: String,
    balance_after: Option<String>,
    session: Option<String>,
    close_price: Option<String>,
    result: Option<String>,
    attachment: Option<String>,
    link: Option<String>,
    closed_at: Option<NaiveTime>,
}

fn parse_decimal(id: i64, field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| JournalError::CorruptRow {
        id,
        reason: format!("{} '{}': {}", field, raw, e),
    })
}

fn parse_optional(id: i64, field: &str, raw: Option<&str>) -> Result<Option<Decimal>> {
    raw.map(|r| parse_decimal(id, field, r)).transpose()
}

impl TryFrom<StoredTrade> for Trade {
    type Error = JournalError;

    fn try_from(row: StoredTrade) -> Result<Self> {
        let id = row.id;
        let direction = Direction::from_str(&row.direction).map_err(|e| JournalError::CorruptRow {
            id,
            reason: e.to_string(),
        })?;

        Ok(Trade {
            id,
            symbol: row.symbol,
            direction,
            opened_on: row.opened_on,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            entry_price: parse_decimal(id, "entry_price", &row.entry_price)?,
            take_profit: parse_decimal(id, "take_profit", &row.take_profit)?,
            stop_loss: parse_decimal(id, "stop_loss", &row.stop_loss)?,
            close_price: parse_optional(id, "close_price", row.close_price.as_deref())?,
            risk_pct: parse_decimal(id, "risk_pct", &row.risk_pct)?,
            pips_to_target: parse_decimal(id, "pips_to_target", &row.pips_to_target)?,
            pips_to_stop: parse_decimal(id, "pips_to_stop", &row.pips_to_stop)?,
            est_win: parse_decimal(id, "est_win", &row.est_win)?,
            est_loss: parse_decimal(id, "est_loss", &row.est_loss)?,
            position_size: parse_decimal(id, "position_size", &row.position_size)?,
            balance_at_open: parse_decimal(id, "balance_at_open", &row.balance_at_open)?,
            balance_after: parse_optional(id, "balance_after", row.balance_after.as_deref())?,
            result: parse_optional(id, "result", row.result.as_deref())?,
            comment: row.comment,
            attachment: row.attachment,
            link: row.link,
            session: row.session,
        })
    }
}

fn into_trades(rows: Vec<StoredTrade>) -> Result<Vec<Trade>> {
    rows.into_iter().map(Trade::try_from).collect()
}

impl Database {
    /// Open a journal file, creating it when `create` is set.
    pub async fn open(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        debug!(path = %path.display(), "Journal database opened");
        Ok(db)
    }

    /// Private in-memory journal.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single connection that never recycles, or the data goes with it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        // Journal header
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS journal (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                initial_balance TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Trades
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                opened_on TEXT NOT NULL,
                opened_at TEXT NOT NULL,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                comment TEXT NOT NULL DEFAULT '',
                risk_pct TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                take_profit TEXT NOT NULL,
                stop_loss TEXT NOT NULL,
                pips_to_target TEXT NOT NULL,
                pips_to_stop TEXT NOT NULL,
                est_win TEXT NOT NULL,
                est_loss TEXT NOT NULL,
                position_size TEXT NOT NULL,
                balance_at_open TEXT NOT NULL,
                balance_after TEXT,
                session TEXT,
                close_price TEXT,
                result TEXT,
                attachment TEXT,
                link TEXT,
                closed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_opened_on ON trades(opened_on)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Journal ====================

    /// Record the starting balance of a fresh journal.
    pub async fn init_journal(&self, initial_balance: Decimal) -> Result<JournalInfo> {
        let created_at = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO journal (id, initial_balance, created_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(initial_balance.to_string())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(JournalError::AlreadyInitialized);
        }

        info!(initial_balance = %initial_balance, "Journal initialized");
        self.journal_info().await
    }

    /// Get the journal header.
    pub async fn journal_info(&self) -> Result<JournalInfo> {
        let row = sqlx::query_as::<_, StoredJournal>(
            "SELECT initial_balance, created_at FROM journal WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or(JournalError::NotInitialized)?;

        Ok(JournalInfo {
            initial_balance: parse_decimal(0, "initial_balance", &row.initial_balance)?,
            created_at: row.created_at,
        })
    }

    // ==================== Trades ====================

    /// Append a new open trade and return its id.
    pub async fn insert_trade(&self, trade: &NewTrade) -> Result<i64> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO trades (
                opened_on, opened_at, symbol, direction, comment, risk_pct,
                entry_price, take_profit, stop_loss, pips_to_target, pips_to_stop,
                est_win, est_loss, position_size, balance_at_open, attachment, link
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.opened_on)
        .bind(trade.opened_at)
        .bind(&trade.symbol)
        .bind(trade.direction.as_str())
        .bind(&trade.comment)
        .bind(trade.risk_pct.to_string())
        .bind(trade.entry_price.to_string())
        .bind(trade.take_profit.to_string())
        .bind(trade.stop_loss.to_string())
        .bind(trade.pips_to_target.to_string())
        .bind(trade.pips_to_stop.to_string())
        .bind(trade.est_win.to_string())
        .bind(trade.est_loss.to_string())
        .bind(trade.position_size.to_string())
        .bind(trade.balance_at_open.to_string())
        .bind(trade.attachment.as_deref())
        .bind(trade.link.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(inserted.last_insert_rowid())
    }

    /// Get a single trade.
    pub async fn get_trade(&self, id: i64) -> Result<Trade> {
        let row = sqlx::query_as::<_, StoredTrade>("SELECT * FROM trades WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(JournalError::TradeNotFound(id))?;

        Trade::try_from(row)
    }

    /// Get every trade in creation order.
    pub async fn all_trades(&self) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, StoredTrade>("SELECT * FROM trades ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        into_trades(rows)
    }

    /// Get trades opened within an inclusive date range. Open bounds match everything.
    pub async fn trades_between(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, StoredTrade>(
            r#"
            SELECT * FROM trades
            WHERE (?1 IS NULL OR opened_on >= ?1)
              AND (?2 IS NULL OR opened_on <= ?2)
            ORDER BY id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        into_trades(rows)
    }

    /// Write close-related fields and re-settle every later balance.
    ///
    /// Runs in one transaction: a missing id or a failure part way through
    /// leaves the journal untouched.
    pub async fn update_trade(&self, id: i64, update: &TradeUpdate) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE trades SET
                entry_price = ?,
                close_price = ?,
                result = ?,
                closed_at = ?,
                comment = ?,
                attachment = ?,
                link = ?
            WHERE id = ?
            "#,
        )
        .bind(update.entry_price.to_string())
        .bind(update.close_price.to_string())
        .bind(update.result.to_string())
        .bind(update.closed_at)
        .bind(&update.comment)
        .bind(update.attachment.as_deref())
        .bind(update.link.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(JournalError::TradeNotFound(id));
        }

        let rebalanced = Self::rebalance_from(&mut tx, id).await?;
        tx.commit().await?;

        debug!(id = id, rebalanced = rebalanced, "Trade updated");
        Ok(())
    }

    /// Recompute every post-trade balance from the starting balance.
    ///
    /// Returns how many rows changed. Repairs journals whose trades were
    /// closed out of order before the chain was maintained on write.
    pub async fn rebuild_balance_chain(&self) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let changed = Self::rebalance_from(&mut tx, 0).await?;
        tx.commit().await?;

        info!(changed = changed, "Balance chain rebuilt");
        Ok(changed)
    }

    /// Walk closed trades from `from_id` forward, setting each balance to the
    /// previous closed balance plus its own result.
    ///
    /// When the previous closed trade has no stored balance, the walk starts
    /// over from the first trade.
    async fn rebalance_from(tx: &mut Transaction<'_, Sqlite>, from_id: i64) -> Result<usize> {
        let (initial,): (String,) =
            sqlx::query_as("SELECT initial_balance FROM journal WHERE id = 1")
                .fetch_optional(&mut **tx)
                .await?
                .ok_or(JournalError::NotInitialized)?;

        let prior: Option<(i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, balance_after FROM trades
            WHERE id < ? AND result IS NOT NULL
            ORDER BY id DESC LIMIT 1
            "#,
        )
        .bind(from_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (start_id, mut balance) = match prior {
            Some((prior_id, Some(raw))) => (from_id, parse_decimal(prior_id, "balance_after", &raw)?),
            Some((_, None)) => (0, parse_decimal(0, "initial_balance", &initial)?),
            None => (from_id, parse_decimal(0, "initial_balance", &initial)?),
        };

        let rows: Vec<(i64, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT id, result, balance_after FROM trades WHERE id >= ? ORDER BY id",
        )
        .bind(start_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut changed = 0;
        for (id, result, stored) in rows {
            let Some(result) = parse_optional(id, "result", result.as_deref())? else {
                continue;
            };
            balance = balance.checked_add(result).ok_or_else(|| JournalError::CorruptRow {
                id,
                reason: "balance overflows".to_string(),
            })?;

            if parse_optional(id, "balance_after", stored.as_deref())? == Some(balance) {
                continue;
            }

            sqlx::query("UPDATE trades SET balance_after = ? WHERE id = ?")
                .bind(balance.to_string())
                .bind(id)
                .execute(&mut **tx)
                .await?;
            changed += 1;
        }

        Ok(changed)
    }
}
