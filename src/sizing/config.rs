//! Sizing configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::JournalError;

/// Instrument constants used to turn price distances into pips and lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Multiplier from price distance to pips (10000 for most FX pairs)
    pub pip_scale: Decimal,

    /// Pip value of one standard lot, in account currency
    pub lot_unit: Decimal,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            pip_scale: dec!(10000), // 4-decimal quotes
            lot_unit: dec!(10),     // $10 per pip per standard lot
        }
    }
}

impl SizingConfig {
    /// Both constants must be positive for sizing to be defined.
    pub fn validate(&self) -> Result<(), JournalError> {
        if self.pip_scale <= Decimal::ZERO {
            return Err(JournalError::invalid("pip_scale", "must be positive"));
        }
        if self.lot_unit <= Decimal::ZERO {
            return Err(JournalError::invalid("lot_unit", "must be positive"));
        }
        Ok(())
    }
}
