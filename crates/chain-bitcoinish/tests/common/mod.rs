//! In-process chain data source shared by the integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chain_bitcoinish::data_source::{
    AddressDetails, BlockInfo, BlockRef, ChainDataSource, RawTxInfo,
};
use chain_bitcoinish::transaction::{decode_transaction, transaction_id};
use chain_bitcoinish::{BitcoinishError, UtxoInfo};

/// Data source backed by maps. Broadcasts are recorded and answered with the
/// txid of the submitted hex; submitting the same hex twice is rejected the
/// way a node rejects a known transaction.
#[derive(Default)]
pub struct MockChainDataSource {
    utxos: Mutex<HashMap<String, Vec<UtxoInfo>>>,
    details: Mutex<HashMap<String, AddressDetails>>,
    transactions: Mutex<HashMap<String, RawTxInfo>>,
    blocks: Mutex<Vec<BlockInfo>>,
    broadcast: Mutex<Vec<String>>,
}

fn poisoned(store: &str) -> BitcoinishError {
    BitcoinishError::Network(format!("mock {store} store lock poisoned"))
}

impl MockChainDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_utxos(&self, address: &str, utxos: Vec<UtxoInfo>) {
        self.utxos.lock().unwrap().insert(address.to_string(), utxos);
    }

    pub fn set_address_details(&self, address: &str, details: AddressDetails) {
        self.details.lock().unwrap().insert(address.to_string(), details);
    }

    pub fn insert_tx(&self, tx: RawTxInfo) {
        self.transactions.lock().unwrap().insert(tx.txid.clone(), tx);
    }

    pub fn push_block(&self, block: BlockInfo) {
        self.blocks.lock().unwrap().push(block);
    }

    /// Raw hex of every accepted broadcast, in order.
    pub fn broadcast_transactions(&self) -> Vec<String> {
        self.broadcast.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainDataSource for MockChainDataSource {
    async fn get_utxos_for_address(&self, address: &str) -> Result<Vec<UtxoInfo>, BitcoinishError> {
        let entries = self.utxos.lock().map_err(|_| poisoned("utxo"))?;
        Ok(entries.get(address).cloned().unwrap_or_default())
    }

    async fn get_address_details(&self, address: &str) -> Result<AddressDetails, BitcoinishError> {
        let entries = self.details.lock().map_err(|_| poisoned("address"))?;
        Ok(entries
            .get(address)
            .copied()
            .unwrap_or(AddressDetails { balance_sat: 0, unconfirmed_balance_sat: 0 }))
    }

    async fn get_tx(&self, txid: &str) -> Result<RawTxInfo, BitcoinishError> {
        let entries = self.transactions.lock().map_err(|_| poisoned("transaction"))?;
        entries
            .get(txid)
            .cloned()
            .ok_or_else(|| BitcoinishError::Network(format!("transaction {txid} not found")))
    }

    async fn send_tx(&self, raw_hex: &str) -> Result<String, BitcoinishError> {
        let txid = transaction_id(&decode_transaction(raw_hex)?);
        let mut submitted = self.broadcast.lock().map_err(|_| poisoned("broadcast"))?;
        if submitted.iter().any(|hex| hex == raw_hex) {
            return Err(BitcoinishError::Network(format!("txn-already-known: {txid}")));
        }
        submitted.push(raw_hex.to_string());
        Ok(txid)
    }

    async fn get_block(&self, block: &BlockRef) -> Result<BlockInfo, BitcoinishError> {
        let blocks = self.blocks.lock().map_err(|_| poisoned("block"))?;
        blocks
            .iter()
            .find(|candidate| match block {
                BlockRef::Hash(hash) => &candidate.id == hash,
                BlockRef::Height(height) => candidate.height == *height,
            })
            .cloned()
            .ok_or_else(|| BitcoinishError::Network(format!("block {block:?} not found")))
    }
}
