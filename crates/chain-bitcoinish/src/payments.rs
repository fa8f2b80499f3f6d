use std::sync::Arc;

use payments_common::types::{
    BalanceResult, BroadcastResult, FeeLevel, FeeOption, FeeRate, ResolvedFeeOption,
    TransactionInfo, TransactionStatus,
};
use payments_common::UnitConverter;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::address::validate_address;
use crate::config::BitcoinishPaymentsConfig;
use crate::data_source::{BlockInfo, BlockRef, ChainDataSource};
use crate::error::BitcoinishError;
use crate::fee::FeeEstimator;
use crate::fee_oracle::{FeeRateOracle, StaticFeeRateOracle};
use crate::keyring::Keyring;
use crate::network::CoinNetwork;
use crate::payment_tx::{PaymentTxBuilder, PaymentTxParams};
use crate::tx_info::{map_balance, map_transaction_info};
use crate::types::{
    BitcoinishSignedTransaction, BitcoinishUnsignedTransaction, PayportOutput, PayportRef,
    TxOutput, UtxoInfo,
};
use crate::utxo::{filter_spendable, prepare_utxos, sum_utxo_sat};

/// Node error fragments meaning the transaction was already accepted.
const ALREADY_BROADCAST_MESSAGES: [&str; 4] =
    ["already in block chain", "already known", "txn-already-in-mempool", "txn-already-known"];

/// `to_address` of unsigned transactions paying more than one output.
pub const BATCH_ADDRESS: &str = "batch";

fn is_already_broadcast(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ALREADY_BROADCAST_MESSAGES.iter().any(|known| message.contains(known))
}

/// Per-call options of the `create_*_transaction` operations.
#[derive(Debug, Clone, Default)]
pub struct CreateTransactionOptions {
    /// Fee preference; the configured default level when unset.
    pub fee: Option<FeeOption>,
    pub use_all_utxos: bool,
    pub use_unconfirmed_utxos: bool,
    /// Spend from these UTXOs instead of querying the data source.
    pub available_utxos: Option<Vec<UtxoInfo>>,
    pub recipient_pays_fee: bool,
    pub max_fee_percent: Option<Decimal>,
}

/// A payport resolved to a concrete address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPayport {
    pub address: String,
    pub index: Option<u32>,
    pub extra_id: Option<String>,
}

/// Payments for one bitcoin-derived network: balances, transaction
/// creation, signing and broadcasting.
#[derive(Clone)]
pub struct BitcoinishPayments {
    config: BitcoinishPaymentsConfig,
    network: &'static CoinNetwork,
    units: UnitConverter,
    builder: PaymentTxBuilder,
    static_fees: StaticFeeRateOracle,
    keyring: Arc<dyn Keyring>,
    data_source: Arc<dyn ChainDataSource>,
    fee_oracle: Arc<dyn FeeRateOracle>,
}

impl BitcoinishPayments {
    /// Without a `fee_oracle`, fee levels resolve from the network's static
    /// table.
    pub fn new(
        config: BitcoinishPaymentsConfig,
        keyring: Arc<dyn Keyring>,
        data_source: Arc<dyn ChainDataSource>,
        fee_oracle: Option<Arc<dyn FeeRateOracle>>,
    ) -> Result<Self, BitcoinishError> {
        config.validate()?;
        let network = config.params();
        let units = UnitConverter::new(network.decimals)?;
        let fee_estimator = FeeEstimator::new(
            config.address_type(),
            units,
            config.min_tx_fee.clone(),
            config.min_relay_fee_sat(),
        );
        let builder = PaymentTxBuilder::new(network, units, fee_estimator)
            .with_dust_threshold(config.dust_threshold_sat())
            .with_min_change(config.min_change_sat()?)
            .with_target_utxo_pool_size(config.target_utxo_pool_size);
        let static_fees = StaticFeeRateOracle::for_network(network);
        let fee_oracle: Arc<dyn FeeRateOracle> = match fee_oracle {
            Some(oracle) => oracle,
            None => Arc::new(static_fees),
        };

        Ok(Self { config, network, units, builder, static_fees, keyring, data_source, fee_oracle })
    }

    pub fn network(&self) -> &'static CoinNetwork {
        self.network
    }

    pub fn units(&self) -> &UnitConverter {
        &self.units
    }

    pub fn config(&self) -> &BitcoinishPaymentsConfig {
        &self.config
    }

    pub fn is_valid_address(&self, address: &str) -> bool {
        validate_address(address, self.network)
    }

    /// Key indices resolve through the keyring; addresses must be valid on
    /// this network.
    pub fn resolve_payport(
        &self,
        payport: &PayportRef,
    ) -> Result<ResolvedPayport, BitcoinishError> {
        let (address, index, extra_id) = match payport {
            PayportRef::Index(index) => (self.keyring.derive_address(*index)?, Some(*index), None),
            PayportRef::Address(address) => (address.clone(), None, None),
            PayportRef::Payport(payport) => {
                (payport.address.clone(), None, payport.extra_id.clone())
            }
        };
        if !self.is_valid_address(&address) {
            return Err(BitcoinishError::InvalidAddress(format!(
                "{address} is not a valid {} address",
                self.network.name
            )));
        }
        Ok(ResolvedPayport { address, index, extra_id })
    }

    async fn recommended_fee_rate(&self, level: FeeLevel) -> FeeRate {
        match self.fee_oracle.get_fee_rate_recommendation(level).await {
            Ok(rate) => match rate.validate() {
                Ok(()) => rate,
                Err(e) => {
                    warn!(%level, error = %e, "invalid fee oracle rate, using static rate");
                    self.static_fees.fee_rate(level)
                }
            },
            Err(e) => {
                warn!(%level, error = %e, "fee rate recommendation failed, using static rate");
                self.static_fees.fee_rate(level)
            }
        }
    }

    /// Custom rates are used as given; levels ask the fee oracle and fall
    /// back to the static table when it fails.
    pub async fn resolve_fee_option(
        &self,
        fee: Option<&FeeOption>,
    ) -> Result<ResolvedFeeOption, BitcoinishError> {
        let (level, rate) = match fee {
            Some(FeeOption::Custom(rate)) => (FeeLevel::Custom, rate.clone()),
            Some(FeeOption::Level(level)) => (*level, self.recommended_fee_rate(*level).await),
            None => {
                let level = self.config.default_fee_level;
                (level, self.recommended_fee_rate(level).await)
            }
        };
        Ok(ResolvedFeeOption::new(level, &rate, &self.units)?)
    }

    pub async fn get_balance(
        &self,
        payport: impl Into<PayportRef>,
    ) -> Result<BalanceResult, BitcoinishError> {
        let resolved = self.resolve_payport(&payport.into())?;
        let details = self.data_source.get_address_details(&resolved.address).await?;
        Ok(map_balance(&details, &self.units, self.config.min_relay_fee_sat()))
    }

    pub async fn is_sweepable_balance(
        &self,
        payport: impl Into<PayportRef>,
    ) -> Result<bool, BitcoinishError> {
        Ok(self.get_balance(payport).await?.sweepable)
    }

    /// Unspent outputs of the payport with `satoshis` filled in.
    pub async fn get_utxos(
        &self,
        payport: impl Into<PayportRef>,
    ) -> Result<Vec<UtxoInfo>, BitcoinishError> {
        let resolved = self.resolve_payport(&payport.into())?;
        let utxos = self.data_source.get_utxos_for_address(&resolved.address).await?;
        prepare_utxos(&utxos, &self.units)
    }

    async fn available_utxos(
        &self,
        from_address: &str,
        options: &CreateTransactionOptions,
    ) -> Result<Vec<UtxoInfo>, BitcoinishError> {
        match &options.available_utxos {
            Some(utxos) => Ok(utxos.clone()),
            None => self.data_source.get_utxos_for_address(from_address).await,
        }
    }

    pub async fn create_transaction(
        &self,
        from: u32,
        to: impl Into<PayportRef>,
        amount: &str,
        options: CreateTransactionOptions,
    ) -> Result<BitcoinishUnsignedTransaction, BitcoinishError> {
        self.create_multi_output_transaction(from, &[PayportOutput::new(to, amount)], options)
            .await
    }

    /// Pay every output from key `from`, returning change to its own address.
    pub async fn create_multi_output_transaction(
        &self,
        from: u32,
        outputs: &[PayportOutput],
        options: CreateTransactionOptions,
    ) -> Result<BitcoinishUnsignedTransaction, BitcoinishError> {
        let from_address = self.keyring.derive_address(from)?;

        let mut recipients = Vec::with_capacity(outputs.len());
        let mut desired_outputs = Vec::with_capacity(outputs.len());
        for output in outputs {
            let resolved = self.resolve_payport(&output.payport)?;
            desired_outputs.push(TxOutput::new(resolved.address.clone(), output.amount.clone()));
            recipients.push(resolved);
        }

        let fee = self.resolve_fee_option(options.fee.as_ref()).await?;
        let utxos = self.available_utxos(&from_address, &options).await?;
        let fee_rate = fee.fee_rate();
        let tx = self.builder.build(PaymentTxParams {
            unused_utxos: &utxos,
            desired_outputs: &desired_outputs,
            change_address: &from_address,
            fee_rate: &fee_rate,
            use_all_utxos: options.use_all_utxos,
            use_unconfirmed_utxos: options.use_unconfirmed_utxos,
            recipient_pays_fee: options.recipient_pays_fee,
            max_fee_percent: options.max_fee_percent,
        })?;

        let (to_address, to_extra_id, to_index) = match recipients.as_slice() {
            [only] => (only.address.clone(), only.extra_id.clone(), only.index),
            _ => (BATCH_ADDRESS.to_string(), None, None),
        };
        info!(
            from_index = from,
            to = %to_address,
            amount = %tx.external_output_total,
            fee = %tx.fee,
            txid = %tx.raw_hash,
            "created {} transaction",
            self.network.symbol
        );

        Ok(BitcoinishUnsignedTransaction {
            status: TransactionStatus::Unsigned,
            id: None,
            from_address,
            to_address,
            to_extra_id,
            from_index: from,
            to_index,
            amount: tx.external_output_total.clone(),
            fee: tx.fee.clone(),
            target_fee_level: fee.target_fee_level,
            target_fee_rate: fee.target_fee_rate,
            target_fee_rate_type: fee.target_fee_rate_type,
            data: tx,
        })
    }

    /// Send the whole eligible balance of key `from` to `to`, the fee coming
    /// out of the sent amount.
    pub async fn create_sweep_transaction(
        &self,
        from: u32,
        to: impl Into<PayportRef>,
        options: CreateTransactionOptions,
    ) -> Result<BitcoinishUnsignedTransaction, BitcoinishError> {
        let from_address = self.keyring.derive_address(from)?;
        let available = self.available_utxos(&from_address, &options).await?;
        let utxos = prepare_utxos(&available, &self.units)?;
        let balance = sum_utxo_sat(&filter_spendable(&utxos, options.use_unconfirmed_utxos))?;
        let min_relay_fee = self.config.min_relay_fee_sat();
        if balance <= min_relay_fee {
            return Err(BitcoinishError::BalanceTooLowToSweep { balance, min_relay_fee });
        }

        let amount = self.units.to_main_denomination(balance);
        let options = CreateTransactionOptions {
            use_all_utxos: true,
            available_utxos: Some(utxos),
            ..options
        };
        self.create_transaction(from, to, &amount, options).await
    }

    pub fn sign_transaction(
        &self,
        unsigned: &BitcoinishUnsignedTransaction,
    ) -> Result<BitcoinishSignedTransaction, BitcoinishError> {
        if unsigned.status != TransactionStatus::Unsigned {
            return Err(BitcoinishError::SigningError(format!(
                "cannot sign a transaction with status {:?}",
                unsigned.status
            )));
        }
        let signed = self.keyring.sign(&unsigned.data, unsigned.from_index)?;
        Ok(BitcoinishSignedTransaction {
            status: TransactionStatus::Signed,
            id: signed.id.clone(),
            from_address: unsigned.from_address.clone(),
            to_address: unsigned.to_address.clone(),
            from_index: unsigned.from_index,
            to_index: unsigned.to_index,
            amount: unsigned.amount.clone(),
            fee: unsigned.fee.clone(),
            data: signed,
        })
    }

    /// Broadcasting a transaction the network already has succeeds.
    pub async fn broadcast_transaction(
        &self,
        signed: &BitcoinishSignedTransaction,
    ) -> Result<BroadcastResult, BitcoinishError> {
        match self.data_source.send_tx(&signed.data.hex).await {
            Ok(txid) => {
                if txid != signed.id {
                    warn!(expected = %signed.id, reported = %txid, "broadcast txid mismatch");
                }
                info!(%txid, "broadcast {} transaction", self.network.symbol);
                Ok(BroadcastResult { id: txid })
            }
            Err(e) if is_already_broadcast(&e.to_string()) => {
                warn!(txid = %signed.id, error = %e, "transaction already broadcast");
                Ok(BroadcastResult { id: signed.id.clone() })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_transaction_info(
        &self,
        txid: &str,
    ) -> Result<TransactionInfo, BitcoinishError> {
        let raw = self.data_source.get_tx(txid).await?;
        Ok(map_transaction_info(&raw, &self.units))
    }

    pub async fn get_block(&self, block: &BlockRef) -> Result<BlockInfo, BitcoinishError> {
        self.data_source.get_block(block).await
    }
}
