//! CSV export of journal history.

use std::io::Write;
use std::path::Path;

use rust_decimal::Decimal;

use crate::error::JournalError;
use crate::models::Trade;

const HEADER: [&str; 23] = [
    "id",
    "date",
    "time",
    "symbol",
    "direction",
    "comment",
    "risk_pct",
    "entry",
    "take_profit",
    "stop_loss",
    "pips_to_target",
    "pips_to_stop",
    "est_win",
    "est_loss",
    "lots",
    "balance_at_open",
    "balance_after",
    "session",
    "close",
    "result",
    "attachment",
    "link",
    "close_time",
];

fn opt_decimal(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write trades as CSV to any writer. Empty cells stand for unset values.
pub fn write_trades<W: Write>(writer: W, trades: &[Trade]) -> Result<(), JournalError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    for trade in trades {
        wtr.write_record([
            trade.id.to_string(),
            trade.opened_on.format("%Y-%m-%d").to_string(),
            trade.opened_at.format("%H:%M:%S").to_string(),
            trade.symbol.clone(),
            trade.direction.to_string(),
            trade.comment.clone(),
            trade.risk_pct.to_string(),
            trade.entry_price.to_string(),
            trade.take_profit.to_string(),
            trade.stop_loss.to_string(),
            trade.pips_to_target.to_string(),
            trade.pips_to_stop.to_string(),
            trade.est_win.to_string(),
            trade.est_loss.to_string(),
            trade.position_size.to_string(),
            trade.balance_at_open.to_string(),
            opt_decimal(trade.balance_after),
            trade.session.clone().unwrap_or_default(),
            opt_decimal(trade.close_price),
            opt_decimal(trade.result),
            trade.attachment.clone().unwrap_or_default(),
            trade.link.clone().unwrap_or_default(),
            trade
                .closed_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write trades to a CSV file at `path`, replacing it if present.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), JournalError> {
    let file = std::fs::File::create(path)?;
    write_trades(file, trades)
}
