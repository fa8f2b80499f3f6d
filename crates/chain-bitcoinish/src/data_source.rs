use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BitcoinishError;
use crate::types::UtxoInfo;

/// Balance summary of an address, base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    pub balance_sat: u64,
    /// Net effect of mempool transactions; negative while spends are pending.
    pub unconfirmed_balance_sat: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTxInput {
    pub txid: String,
    pub vout: u32,
    pub addresses: Vec<String>,
    pub value_sat: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTxOutput {
    pub n: u32,
    pub addresses: Vec<String>,
    pub value_sat: u64,
}

/// A transaction as reported by an indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTxInfo {
    pub txid: String,
    pub block_hash: Option<String>,
    pub block_height: Option<u64>,
    /// Unix seconds.
    pub block_time: Option<u64>,
    pub confirmations: u64,
    pub fee_sat: u64,
    pub vin: Vec<RawTxInput>,
    pub vout: Vec<RawTxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockRef {
    Hash(String),
    Height(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub id: String,
    pub height: u64,
    pub previous_id: Option<String>,
    /// Unix seconds.
    pub time: u64,
    pub tx_ids: Vec<String>,
}

/// Chain indexer used for UTXOs, balances, transactions, blocks and
/// broadcasting. Transient failures surface as [`BitcoinishError::Network`]
/// and are retried by the caller, not here.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    async fn get_utxos_for_address(&self, address: &str) -> Result<Vec<UtxoInfo>, BitcoinishError>;
    async fn get_address_details(&self, address: &str) -> Result<AddressDetails, BitcoinishError>;
    async fn get_tx(&self, txid: &str) -> Result<RawTxInfo, BitcoinishError>;
    /// Broadcast a signed transaction, returning the txid the node reports.
    async fn send_tx(&self, raw_hex: &str) -> Result<String, BitcoinishError>;
    async fn get_block(&self, block: &BlockRef) -> Result<BlockInfo, BitcoinishError>;
}
