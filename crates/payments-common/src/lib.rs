//! # payments-common
//!
//! Chain-agnostic vocabulary shared by the payment backends: lossless unit
//! conversion between main and base denominations, fee-rate types, payports,
//! and the balance / transaction-info records returned to callers.

pub mod error;
pub mod types;
pub mod units;

pub use error::PaymentsError;
pub use units::UnitConverter;
