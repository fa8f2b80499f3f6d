use thiserror::Error;

/// Errors shared by every payments backend.
#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unsupported decimals: {0}")]
    UnsupportedDecimals(u32),

    #[error("invalid fee rate: {0}")]
    InvalidFeeRate(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),
}
