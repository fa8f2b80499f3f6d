use payments_common::PaymentsError;
use thiserror::Error;

/// Errors raised while building, signing or broadcasting UTXO payments.
#[derive(Debug, Error)]
pub enum BitcoinishError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid output at index {index}: {reason}")]
    InvalidOutput { index: usize, reason: String },

    #[error("invalid change address: {0}")]
    InvalidChangeAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid utxo: {0}")]
    InvalidUtxo(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("insufficient utxo total: have {have} sat, need {need} sat + {fee} sat fee (short {shortfall} sat)")]
    InsufficientFunds {
        have: u64,
        need: u64,
        fee: u64,
        shortfall: u64,
    },

    #[error("output {index} of {value} sat is dust after deducting {fee_share} sat fee share (short {deficit} sat)")]
    DustOutput {
        index: usize,
        value: u64,
        fee_share: u64,
        deficit: u64,
    },

    #[error("balance of {balance} sat is too low to sweep (minimum relay fee {min_relay_fee} sat)")]
    BalanceTooLowToSweep { balance: u64, min_relay_fee: u64 },

    #[error("fee of {fee} sat exceeds {max_percent}% of {amount} sat sent")]
    FeeTooHigh {
        fee: u64,
        amount: u64,
        max_percent: String,
    },

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error(transparent)]
    Payments(#[from] PaymentsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_output() {
        let err = BitcoinishError::InvalidOutput {
            index: 2,
            reason: "value 0 must be positive".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid output at index 2: value 0 must be positive"
        );
    }

    #[test]
    fn display_insufficient_funds() {
        let err = BitcoinishError::InsufficientFunds {
            have: 1_000,
            need: 5_000,
            fee: 200,
            shortfall: 4_200,
        };
        assert_eq!(
            err.to_string(),
            "insufficient utxo total: have 1000 sat, need 5000 sat + 200 sat fee (short 4200 sat)"
        );
    }

    #[test]
    fn display_dust_output() {
        let err = BitcoinishError::DustOutput {
            index: 1,
            value: 600,
            fee_share: 300,
            deficit: 247,
        };
        assert_eq!(
            err.to_string(),
            "output 1 of 600 sat is dust after deducting 300 sat fee share (short 247 sat)"
        );
    }

    #[test]
    fn display_balance_too_low() {
        let err = BitcoinishError::BalanceTooLowToSweep {
            balance: 900,
            min_relay_fee: 1_000,
        };
        assert_eq!(
            err.to_string(),
            "balance of 900 sat is too low to sweep (minimum relay fee 1000 sat)"
        );
    }

    #[test]
    fn display_fee_too_high() {
        let err = BitcoinishError::FeeTooHigh {
            fee: 50_000,
            amount: 100_000,
            max_percent: "10".into(),
        };
        assert_eq!(err.to_string(), "fee of 50000 sat exceeds 10% of 100000 sat sent");
    }

    #[test]
    fn display_invariant() {
        let err = BitcoinishError::Invariant("negative change".into());
        assert_eq!(err.to_string(), "invariant violation: negative change");
    }

    #[test]
    fn payments_error_is_transparent() {
        let err: BitcoinishError = PaymentsError::InvalidAmount("abc".into()).into();
        assert_eq!(err.to_string(), "invalid amount: abc");
        assert!(matches!(err, BitcoinishError::Payments(_)));
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> =
            Box::new(BitcoinishError::SigningError("test".into()));
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn debug_format_works() {
        let err = BitcoinishError::Network("timeout".into());
        let debug = format!("{:?}", err);
        assert!(debug.contains("Network"));
    }
}
