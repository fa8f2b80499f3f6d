//! Payments for bitcoin-derived UTXO chains (Bitcoin, Litecoin, Dogecoin and
//! their testnets).
//!
//! Provides exact-integer fee estimation, UTXO coin selection, weighted
//! change splitting, unsigned transaction building, P2WPKH signing, and a
//! [`BitcoinishPayments`] facade that ties them to a chain data source and a
//! fee-rate oracle.

pub mod address;
pub mod change;
pub mod config;
pub mod data_source;
pub mod error;
pub mod fee;
pub mod fee_oracle;
pub mod keyring;
pub mod network;
pub mod payment_tx;
pub mod payments;
pub mod transaction;
pub mod tx_info;
pub mod types;
pub mod utxo;

pub use config::BitcoinishPaymentsConfig;
pub use data_source::ChainDataSource;
pub use error::BitcoinishError;
pub use fee::{AddressType, FeeEstimator};
pub use fee_oracle::{FeeRateOracle, StaticFeeRateOracle};
pub use keyring::{Keyring, P2wpkhKeyring};
pub use network::{BitcoinishNetwork, CoinNetwork};
pub use payment_tx::{PaymentTxBuilder, PaymentTxParams};
pub use payments::{BitcoinishPayments, CreateTransactionOptions};
pub use types::{PaymentTx, PayportOutput, PayportRef, TxOutput, UtxoInfo};
