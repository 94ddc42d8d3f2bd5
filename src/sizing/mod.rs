//! Position sizing: pip distances, dollar risk, lot size, and settlement.

mod config;
mod position_sizer;

pub use config::SizingConfig;
pub use position_sizer::{PositionSizer, SizingResult};
