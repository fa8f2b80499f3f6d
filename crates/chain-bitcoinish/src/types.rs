use payments_common::types::{FeeLevel, FeeRateType, Payport, TransactionStatus};
use payments_common::UnitConverter;
use serde::{Deserialize, Serialize};

use crate::error::BitcoinishError;

/// An unspent output as reported by a chain data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoInfo {
    pub txid: String,
    pub vout: u32,
    /// Main-denomination value.
    pub value: String,
    /// Base-denomination value, derived from `value` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satoshis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<bool>,
}

impl UtxoInfo {
    pub fn new(txid: impl Into<String>, vout: u32, value: impl Into<String>) -> Self {
        Self {
            txid: txid.into(),
            vout,
            value: value.into(),
            satoshis: None,
            confirmations: None,
            height: None,
            lock_time: None,
            coinbase: None,
        }
    }

    /// Confirmed when it has at least one confirmation, or when no
    /// confirmation count is reported but a block height is.
    pub fn is_confirmed(&self) -> bool {
        match self.confirmations {
            Some(confirmations) => confirmations > 0,
            None => self.height.is_some(),
        }
    }

    /// Value in base units. Errors if `satoshis` was never filled in, see
    /// [`Self::with_satoshis`].
    pub fn value_sat(&self) -> Result<u64, BitcoinishError> {
        self.satoshis.ok_or_else(|| {
            let outpoint = format!("{}:{}", self.txid, self.vout);
            BitcoinishError::InvalidUtxo(format!("{outpoint} has no satoshi value"))
        })
    }

    /// Copy with `satoshis` derived from `value` when absent.
    pub fn with_satoshis(&self, units: &UnitConverter) -> Result<Self, BitcoinishError> {
        let mut utxo = self.clone();
        if utxo.satoshis.is_none() {
            let sat = units.to_base_denomination(&self.value).map_err(|e| {
                let outpoint = format!("{}:{}", self.txid, self.vout);
                BitcoinishError::InvalidUtxo(format!("{outpoint} value {}: {e}", self.value))
            })?;
            utxo.satoshis = Some(sat);
        }
        Ok(utxo)
    }
}

/// A payee or change output, main denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: String,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, value: impl Into<String>) -> Self {
        Self { address: address.into(), value: value.into() }
    }
}

/// Working form of [`TxOutput`] used during arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutputSatoshis {
    pub address: String,
    pub satoshis: u64,
}

impl TxOutputSatoshis {
    pub fn to_output(&self, units: &UnitConverter) -> TxOutput {
        TxOutput::new(self.address.clone(), units.to_main_denomination(self.satoshis))
    }
}

/// A change slot and its share of the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedChangeOutput {
    pub address: String,
    pub weight: u64,
}

/// Unsigned payment produced by the transaction builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTx {
    pub inputs: Vec<UtxoInfo>,
    /// External outputs followed by change outputs.
    pub outputs: Vec<TxOutput>,
    pub fee: String,
    pub change: String,
    /// Set only when exactly one change output exists.
    pub change_address: Option<String>,
    pub change_outputs: Vec<TxOutput>,
    pub external_outputs: Vec<TxOutput>,
    pub external_output_total: String,
    pub raw_hex: String,
    pub raw_hash: String,
}

/// Unsigned transaction record handed to callers for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinishUnsignedTransaction {
    pub status: TransactionStatus,
    pub id: Option<String>,
    pub from_address: String,
    /// Recipient address, or `"batch"` for multi-output payments.
    pub to_address: String,
    pub to_extra_id: Option<String>,
    pub from_index: u32,
    pub to_index: Option<u32>,
    pub amount: String,
    pub fee: String,
    pub target_fee_level: FeeLevel,
    pub target_fee_rate: String,
    pub target_fee_rate_type: FeeRateType,
    pub data: PaymentTx,
}

/// Signed serialization returned by a keyring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTxData {
    pub hex: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinishSignedTransaction {
    pub status: TransactionStatus,
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    pub from_index: u32,
    pub to_index: Option<u32>,
    pub amount: String,
    pub fee: String,
    pub data: SignedTxData,
}

/// Where funds come from or go to: a keyring index, a raw address, or a
/// full payport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayportRef {
    Index(u32),
    Address(String),
    Payport(Payport),
}

impl From<u32> for PayportRef {
    fn from(index: u32) -> Self {
        PayportRef::Index(index)
    }
}

impl From<&str> for PayportRef {
    fn from(address: &str) -> Self {
        PayportRef::Address(address.to_string())
    }
}

impl From<String> for PayportRef {
    fn from(address: String) -> Self {
        PayportRef::Address(address)
    }
}

impl From<Payport> for PayportRef {
    fn from(payport: Payport) -> Self {
        PayportRef::Payport(payport)
    }
}

/// One requested payment of a multi-output transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayportOutput {
    pub payport: PayportRef,
    /// Main-denomination amount.
    pub amount: String,
}

impl PayportOutput {
    pub fn new(payport: impl Into<PayportRef>, amount: impl Into<String>) -> Self {
        Self { payport: payport.into(), amount: amount.into() }
    }
}
