//! Utility types.
//!
//! - [`money_amount`] - Human-readable currency amount parsing

pub mod money_amount;

pub use money_amount::*;
