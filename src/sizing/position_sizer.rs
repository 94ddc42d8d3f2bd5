//! Risk-based position sizing and trade settlement.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::SizingConfig;
use crate::error::JournalError;
use crate::models::{Direction, Trade};

type Result<T> = std::result::Result<T, JournalError>;

fn out_of_range(field: &'static str) -> JournalError {
    JournalError::invalid(field, "value is too large to size")
}

fn mul(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| out_of_range(field))
}

fn div(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_div(b).ok_or_else(|| out_of_range(field))
}

/// Output of a sizing calculation, kept at full precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    pub pips_to_target: Decimal,
    pub pips_to_stop: Decimal,

    /// Currency put at risk: risk_pct of the balance
    pub risk_amount: Decimal,

    /// Expected win if the target is hit
    pub est_win: Decimal,

    /// Expected loss if the stop is hit, always equal to `risk_amount`
    pub est_loss: Decimal,

    /// Recommended size in lots
    pub position_size: Decimal,
}

impl fmt::Display for SizingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pips to Target:   {:.1}", self.pips_to_target.round_dp(1))?;
        writeln!(f, "Pips to Stop:     {:.1}", self.pips_to_stop.round_dp(1))?;
        writeln!(f, "Est. Win:         ${:.2}", self.est_win.round_dp(2))?;
        writeln!(f, "Est. Loss:        ${:.2}", self.est_loss.round_dp(2))?;
        write!(f, "Recommended Lots: {:.2}", self.position_size.round_dp(2))
    }
}

/// Calculator for position sizes and realized results.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Pip distance between two prices. Never negative.
    pub fn pips_between(&self, a: Decimal, b: Decimal) -> Option<Decimal> {
        a.checked_sub(b)?.abs().checked_mul(self.config.pip_scale)
    }

    /// Size a trade so that hitting the stop loses exactly `risk_pct` of `balance`.
    ///
    /// With no stop distance, risk-based sizing is undefined: win estimate and
    /// lot size come back as zero. Inputs whose products leave the decimal
    /// range are rejected as invalid.
    pub fn size(
        &self,
        balance: Decimal,
        risk_pct: Decimal,
        entry: Decimal,
        take_profit: Decimal,
        stop_loss: Decimal,
    ) -> Result<SizingResult> {
        let pips_to_target = self
            .pips_between(take_profit, entry)
            .ok_or_else(|| out_of_range("take_profit"))?;
        let pips_to_stop = self
            .pips_between(entry, stop_loss)
            .ok_or_else(|| out_of_range("stop_loss"))?;
        let risk_amount = mul("balance", risk_pct / dec!(100), balance)?;

        let (est_win, position_size) = if pips_to_stop.is_zero() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            let per_pip = div("stop_loss", risk_amount, pips_to_stop)?;
            let stop_value = mul("stop_loss", pips_to_stop, self.config.lot_unit)?;
            (
                mul("take_profit", pips_to_target, per_pip)?,
                div("stop_loss", risk_amount, stop_value)?,
            )
        };

        Ok(SizingResult {
            pips_to_target,
            pips_to_stop,
            risk_amount,
            est_win,
            est_loss: risk_amount,
            position_size,
        })
    }

    /// Realized result of closing `trade` at `close_price`.
    ///
    /// `entry_price` may differ from the stored one when the entry is being
    /// corrected. Risk is taken from the balance the trade was opened with,
    /// so the result is `pips moved × (risk / pips to stop)`.
    pub fn settle(&self, trade: &Trade, entry_price: Decimal, close_price: Decimal) -> Result<Decimal> {
        let pips_to_stop = self
            .pips_between(entry_price, trade.stop_loss)
            .ok_or_else(|| out_of_range("entry_price"))?;
        if pips_to_stop.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let moved = match trade.direction {
            Direction::Long => close_price.checked_sub(entry_price),
            Direction::Short => entry_price.checked_sub(close_price),
        }
        .ok_or_else(|| out_of_range("close_price"))?;
        let signed_pips = mul("close_price", moved, self.config.pip_scale)?;
        let risk_amount = mul("balance_at_open", trade.risk_pct / dec!(100), trade.balance_at_open)?;

        mul("close_price", signed_pips, div("entry_price", risk_amount, pips_to_stop)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn open_trade(direction: Direction, entry: Decimal, stop_loss: Decimal) -> Trade {
        Trade {
            id: 1,
            symbol: "EURUSD".to_string(),
            direction,
            opened_on: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            opened_at: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            closed_at: None,
            entry_price: entry,
            take_profit: entry,
            stop_loss,
            close_price: None,
            risk_pct: dec!(1),
            pips_to_target: Decimal::ZERO,
            pips_to_stop: Decimal::ZERO,
            est_win: Decimal::ZERO,
            est_loss: Decimal::ZERO,
            position_size: Decimal::ZERO,
            balance_at_open: dec!(10000),
            balance_after: None,
            result: None,
            comment: String::new(),
            attachment: None,
            link: None,
            session: None,
        }
    }

    #[test]
    fn test_symmetric_eurusd_setup() {
        let sizer = PositionSizer::default();
        let r = sizer.size(dec!(10000), dec!(1), dec!(1.1000), dec!(1.1050), dec!(1.0950)).unwrap();

        assert_eq!(r.pips_to_target, dec!(50));
        assert_eq!(r.pips_to_stop, dec!(50));
        assert_eq!(r.risk_amount, dec!(100));
        assert_eq!(r.est_win, dec!(100));
        assert_eq!(r.est_loss, dec!(100));
        assert_eq!(r.position_size, dec!(0.2)); // 100 / (50 * 10)
    }

    #[test]
    fn test_zero_stop_distance_is_degenerate_not_error() {
        let sizer = PositionSizer::default();
        let r = sizer.size(dec!(5000), dec!(2), dec!(1.2500), dec!(1.2600), dec!(1.2500)).unwrap();

        assert_eq!(r.pips_to_stop, Decimal::ZERO);
        assert_eq!(r.est_win, Decimal::ZERO);
        assert_eq!(r.position_size, Decimal::ZERO);
        assert_eq!(r.est_loss, dec!(100));
    }

    #[test]
    fn test_est_loss_always_equals_risk_amount() {
        let sizer = PositionSizer::default();
        let cases = [
            (dec!(0), dec!(1)),
            (dec!(2500.50), dec!(0.5)),
            (dec!(10000), dec!(100)),
            (dec!(123456.78), dec!(3.3)),
        ];

        for (balance, risk) in cases {
            let r = sizer.size(balance, risk, dec!(1.3000), dec!(1.3120), dec!(1.2960)).unwrap();
            assert_eq!(r.est_loss, r.risk_amount);
            assert_eq!(r.est_loss, risk / dec!(100) * balance);
        }
    }

    #[test]
    fn test_pips_are_non_negative_for_shorts() {
        let sizer = PositionSizer::default();
        // Short: target below, stop above
        let r = sizer.size(dec!(10000), dec!(1), dec!(1.1000), dec!(1.0900), dec!(1.1025)).unwrap();

        assert_eq!(r.pips_to_target, dec!(100));
        assert_eq!(r.pips_to_stop, dec!(25));
        assert_eq!(r.est_win, dec!(400));
    }

    #[test]
    fn test_custom_pip_scale() {
        let sizer = PositionSizer::new(SizingConfig {
            pip_scale: dec!(100),
            lot_unit: dec!(10),
        });
        let r = sizer.size(dec!(10000), dec!(1), dec!(150.00), dec!(151.00), dec!(149.50)).unwrap();

        assert_eq!(r.pips_to_target, dec!(100));
        assert_eq!(r.pips_to_stop, dec!(50));
        assert_eq!(r.est_win, dec!(200));
    }

    #[test]
    fn test_settle_long_and_short() {
        let sizer = PositionSizer::default();

        let long = open_trade(Direction::Long, dec!(1.1000), dec!(1.0950));
        assert_eq!(sizer.settle(&long, dec!(1.1000), dec!(1.1050)).unwrap(), dec!(100));
        assert_eq!(sizer.settle(&long, dec!(1.1000), dec!(1.0950)).unwrap(), dec!(-100));

        let short = open_trade(Direction::Short, dec!(1.1000), dec!(1.1050));
        assert_eq!(sizer.settle(&short, dec!(1.1000), dec!(1.1050)).unwrap(), dec!(-100));
        assert_eq!(sizer.settle(&short, dec!(1.1000), dec!(1.0900)).unwrap(), dec!(200));
    }

    #[test]
    fn test_settle_uses_corrected_entry() {
        let sizer = PositionSizer::default();
        let trade = open_trade(Direction::Long, dec!(1.1000), dec!(1.0950));

        // Entry corrected to 1.1010: 60 pips to stop, 40 pips gained
        let result = sizer.settle(&trade, dec!(1.1010), dec!(1.1050)).unwrap();
        assert_eq!(result.round_dp(6), dec!(66.666667));
    }

    #[test]
    fn test_settle_without_stop_distance_is_zero() {
        let sizer = PositionSizer::default();
        let trade = open_trade(Direction::Long, dec!(1.1000), dec!(1.1000));
        assert_eq!(sizer.settle(&trade, dec!(1.1000), dec!(1.2000)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_display_rounds_only_for_presentation() {
        let sizer = PositionSizer::default();
        let r = sizer.size(dec!(10000), dec!(1), dec!(1.1000), dec!(1.1033), dec!(1.0993)).unwrap();

        // 33 * (100 / 7) keeps its full precision internally
        assert!(r.est_win.scale() > 2);
        assert_ne!(r.est_win, r.est_win.round_dp(2));
        assert_eq!(r.est_win.round_dp(2), dec!(471.43));

        let text = r.to_string();
        assert!(text.contains("Pips to Target:   33.0"));
        assert!(text.contains("Pips to Stop:     7.0"));
        assert!(text.contains("Est. Win:         $471.43"));
        assert!(text.contains("Est. Loss:        $100.00"));
        assert!(text.contains("Recommended Lots: 1.43"));
    }

    #[test]
    fn test_out_of_range_prices_are_rejected() {
        let sizer = PositionSizer::default();

        assert!(matches!(
            sizer.size(dec!(10000), dec!(1), Decimal::MAX, dec!(1), dec!(1)),
            Err(JournalError::InvalidInput { field: "take_profit", .. })
        ));

        let trade = open_trade(Direction::Long, dec!(1.1000), dec!(1.0950));
        assert!(matches!(
            sizer.settle(&trade, dec!(1.1000), Decimal::MAX),
            Err(JournalError::InvalidInput { .. })
        ));
    }
}
