//! Trade Journal
//!
//! Records discretionary trades with risk-based position sizing and derives
//! performance statistics from the accumulated history.

mod db;
mod error;
mod export;
mod journal;
mod metrics;
mod models;
mod sizing;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::journal::{journal_path, list_journals, CloseTrade, Journal, OpenTrade};
use crate::metrics::DEFAULT_TOP_SYMBOLS;
use crate::models::{Direction, Trade};
use crate::sizing::SizingConfig;

/// Trade journal CLI.
#[derive(Parser)]
#[command(name = "tradelog")]
#[command(about = "Journal trades, size positions by risk, and review performance", long_about = None)]
struct Cli {
    /// Journal database file
    #[arg(short, long, env = "TRADELOG_JOURNAL", default_value = "journal.db")]
    journal: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Price distance to pips multiplier
    #[arg(long, env = "TRADELOG_PIP_SCALE", default_value = "10000")]
    pip_scale: Decimal,

    /// Pip value of one standard lot
    #[arg(long, env = "TRADELOG_LOT_UNIT", default_value = "10")]
    lot_unit: Decimal,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List journal files in a directory
    Journals {
        /// Directory to scan
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Create a new journal with a starting balance
    Init {
        /// Starting account balance
        #[arg(short, long)]
        balance: Decimal,

        /// Journal name; creates <dir>/<name>.db instead of --journal
        #[arg(short, long)]
        name: Option<String>,

        /// Directory for a named journal
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Preview position sizing without saving
    Preview {
        /// Percentage of the balance to risk (0-100)
        #[arg(short, long)]
        risk: Decimal,

        #[arg(short, long)]
        entry: Decimal,

        /// Take-profit price
        #[arg(long)]
        tp: Decimal,

        /// Stop-loss price
        #[arg(long)]
        sl: Decimal,

        /// Balance to size against (defaults to the journal's current balance)
        #[arg(short, long)]
        balance: Option<Decimal>,
    },

    /// Record a new open trade
    Open {
        #[arg(short, long)]
        symbol: String,

        /// Long or Short
        #[arg(short, long)]
        direction: Direction,

        /// Percentage of the balance to risk (0-100)
        #[arg(short, long)]
        risk: Decimal,

        #[arg(short, long)]
        entry: Decimal,

        /// Take-profit price
        #[arg(long)]
        tp: Decimal,

        /// Stop-loss price
        #[arg(long)]
        sl: Decimal,

        /// Open date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Open time, HH:MM[:SS] (defaults to now)
        #[arg(long)]
        time: Option<NaiveTime>,

        #[arg(short, long, default_value = "")]
        comment: String,

        /// Attachment file name
        #[arg(short, long)]
        attachment: Option<String>,

        #[arg(long)]
        link: Option<String>,
    },

    /// Close a trade, or correct a closed one
    Close {
        /// Trade id
        id: i64,

        /// Close price
        #[arg(short, long)]
        price: Decimal,

        /// Corrected entry price
        #[arg(short, long)]
        entry: Option<Decimal>,

        /// Close time, HH:MM[:SS]
        #[arg(long)]
        close_time: Option<NaiveTime>,

        #[arg(short, long)]
        comment: Option<String>,

        /// Attachment file name
        #[arg(short, long)]
        attachment: Option<String>,

        #[arg(long)]
        link: Option<String>,
    },

    /// Show one trade in full
    Show {
        /// Trade id
        id: i64,
    },

    /// List trades, optionally filtered by open date
    History {
        /// First date to include, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last date to include, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Write the listed trades to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Show performance metrics
    Dashboard {
        /// Number of symbols in the popularity table
        #[arg(long, default_value_t = DEFAULT_TOP_SYMBOLS)]
        top: usize,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompute every post-trade balance from the starting balance
    Rebalance,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli.log_level) {
        eprintln!("failed to set up logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `--log-level`.
fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = SizingConfig {
        pip_scale: cli.pip_scale,
        lot_unit: cli.lot_unit,
    };

    match cli.command {
        Commands::Journals { dir } => {
            let journals = list_journals(&dir)
                .with_context(|| format!("Failed to scan {}", dir.display()))?;

            if journals.is_empty() {
                println!("No journals in {}. Use 'tradelog init --balance <amount>' to create one.", dir.display());
                return Ok(());
            }

            for path in journals {
                println!("{}", path.display());
            }
        }

        Commands::Init { balance, name, dir } => {
            let path = match name {
                Some(name) => journal_path(&dir, &name),
                None => cli.journal.clone(),
            };

            let journal = Journal::create(&path, balance, config)
                .await
                .with_context(|| format!("Failed to create journal {}", path.display()))?;
            let info = journal.info().await?;

            println!(
                "Created {} on {} with starting balance ${:.2}",
                path.display(),
                info.created_at.format("%Y-%m-%d %H:%M"),
                info.initial_balance.round_dp(2)
            );
        }

        Commands::Preview {
            risk,
            entry,
            tp,
            sl,
            balance,
        } => {
            let journal = open_journal(&cli.journal, config).await?;
            let balance = match balance {
                Some(b) => b,
                None => journal.current_balance().await?,
            };

            let sizing = journal.preview(balance, risk, entry, tp, sl)?;

            println!("\nBalance:          ${:.2}", balance.round_dp(2));
            println!("Risk:             {}% (${:.2})", risk, sizing.risk_amount.round_dp(2));
            println!("{}", sizing);
        }

        Commands::Open {
            symbol,
            direction,
            risk,
            entry,
            tp,
            sl,
            date,
            time,
            comment,
            attachment,
            link,
        } => {
            let journal = open_journal(&cli.journal, config).await?;
            let now = Local::now().naive_local();

            let trade = journal
                .open_trade(OpenTrade {
                    symbol,
                    direction,
                    opened_on: date.unwrap_or(now.date()),
                    opened_at: time.unwrap_or(now.time()),
                    risk_pct: risk,
                    entry_price: entry,
                    take_profit: tp,
                    stop_loss: sl,
                    comment,
                    attachment,
                    link,
                })
                .await
                .context("Failed to save trade")?;

            println!("Saved trade #{}", trade.id);
            print_trade(&trade);
        }

        Commands::Close {
            id,
            price,
            entry,
            close_time,
            comment,
            attachment,
            link,
        } => {
            let journal = open_journal(&cli.journal, config).await?;

            let trade = journal
                .close_trade(
                    id,
                    CloseTrade {
                        close_price: price,
                        entry_price: entry,
                        closed_at: close_time,
                        comment,
                        attachment,
                        link,
                    },
                )
                .await
                .with_context(|| format!("Failed to update trade #{}", id))?;

            println!("Updated trade #{}", trade.id);
            print_trade(&trade);
        }

        Commands::Show { id } => {
            let journal = open_journal(&cli.journal, config).await?;
            let trade = journal.trade(id).await?;
            print_trade(&trade);
        }

        Commands::History { from, to, export } => {
            let journal = open_journal(&cli.journal, config).await?;
            let trades = journal.history(from, to).await?;

            if trades.is_empty() {
                println!("No trades recorded yet.");
                return Ok(());
            }

            print_history(&trades);

            if let Some(path) = export {
                export::write_trades_csv(&path, &trades)
                    .with_context(|| format!("Failed to export to {}", path.display()))?;
                info!(path = %path.display(), trades = trades.len(), "Exported history");
                println!("\nExported {} trades to {}", trades.len(), path.display());
            }
        }

        Commands::Dashboard { top, json } => {
            let journal = open_journal(&cli.journal, config).await?;
            let metrics = journal.dashboard(top).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("{}", metrics);
            }
        }

        Commands::Rebalance => {
            let journal = open_journal(&cli.journal, config).await?;
            let changed = journal.rebuild_balances().await?;
            println!("Rebalanced {} trades", changed);
        }
    }

    Ok(())
}

async fn open_journal(path: &Path, config: SizingConfig) -> Result<Journal> {
    Journal::open(path, config).await.with_context(|| {
        format!(
            "Failed to open journal {} (create one with 'tradelog init --balance <amount>')",
            path.display()
        )
    })
}

fn money(value: Option<Decimal>) -> String {
    value
        .map(|v| format!("{:.2}", v.round_dp(2)))
        .unwrap_or_else(|| "-".to_string())
}

fn print_history(trades: &[Trade]) {
    println!(
        "\n{:>5} {:<10} {:<5} {:<10} {:<5} {:>10} {:>10} {:>6} {:>10} {:>12}",
        "ID", "DATE", "TIME", "SYMBOL", "DIR", "ENTRY", "CLOSE", "LOTS", "RESULT", "BALANCE"
    );
    println!("{}", "-".repeat(92));

    for t in trades {
        println!(
            "{:>5} {:<10} {:<5} {:<10} {:<5} {:>10} {:>10} {:>6.2} {:>10} {:>12}",
            t.id,
            t.opened_on.format("%Y-%m-%d"),
            t.opened_at.format("%H:%M"),
            truncate(&t.symbol, 10),
            t.direction,
            t.entry_price,
            t.close_price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            t.position_size.round_dp(2),
            money(t.result),
            money(t.balance_after),
        );
    }
}

fn print_trade(t: &Trade) {
    println!("\n=== Trade #{}: {} {} ===", t.id, t.direction, t.symbol);
    println!("Opened:           {} {}", t.opened_on, t.opened_at.format("%H:%M:%S"));
    if let Some(closed_at) = t.closed_at {
        println!("Closed:           {}", closed_at.format("%H:%M:%S"));
    }

    println!("\n--- Prices ---");
    println!("Entry:            {}", t.entry_price);
    println!("Take Profit:      {}", t.take_profit);
    println!("Stop Loss:        {}", t.stop_loss);
    if let Some(close) = t.close_price {
        println!("Close:            {}", close);
    }

    println!("\n--- Sizing ---");
    println!("Risk:             {}%", t.risk_pct);
    println!("Pips to Target:   {:.1}", t.pips_to_target.round_dp(1));
    println!("Pips to Stop:     {:.1}", t.pips_to_stop.round_dp(1));
    println!("Est. Win:         ${:.2}", t.est_win.round_dp(2));
    println!("Est. Loss:        ${:.2}", t.est_loss.round_dp(2));
    println!("Lots:             {:.2}", t.position_size.round_dp(2));

    println!("\n--- Outcome ---");
    println!("Balance at Open:  ${:.2}", t.balance_at_open.round_dp(2));
    println!("Result:           {}", money(t.result));
    println!("Balance After:    {}", money(t.balance_after));

    if !t.comment.is_empty() {
        println!("\nComment: {}", t.comment);
    }
    if let Some(attachment) = &t.attachment {
        println!("Attachment: {}", attachment);
    }
    if let Some(link) = &t.link {
        println!("Link: {}", link);
    }
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
