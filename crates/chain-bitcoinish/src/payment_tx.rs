use payments_common::types::FeeRate;
use payments_common::UnitConverter;
use rust_decimal::Decimal;
use tracing::debug;

use crate::address::validate_address;
use crate::change::{weighted_change_outputs, ChangeAllocator, MAX_CHANGE_SLOTS};
use crate::error::BitcoinishError;
use crate::fee::FeeEstimator;
use crate::network::CoinNetwork;
use crate::transaction::{build_unsigned_transaction, encode_transaction, transaction_id};
use crate::types::{PaymentTx, TxOutput, TxOutputSatoshis, UtxoInfo};
use crate::utxo::{filter_spendable, prepare_utxos, UtxoSelector};

/// Inputs of a single [`PaymentTxBuilder::build`] call.
#[derive(Debug, Clone)]
pub struct PaymentTxParams<'a> {
    /// Every unspent output of the sender, confirmed or not.
    pub unused_utxos: &'a [UtxoInfo],
    pub desired_outputs: &'a [TxOutput],
    pub change_address: &'a str,
    pub fee_rate: &'a FeeRate,
    pub use_all_utxos: bool,
    pub use_unconfirmed_utxos: bool,
    /// Take the fee out of the external outputs instead of adding it on top.
    pub recipient_pays_fee: bool,
    /// Reject the payment when the final fee exceeds this percentage of the
    /// requested output total.
    pub max_fee_percent: Option<Decimal>,
}

/// Builds unsigned payments: selects inputs, settles the fee and splits
/// change across the configured number of change outputs.
#[derive(Debug, Clone)]
pub struct PaymentTxBuilder {
    network: &'static CoinNetwork,
    units: UnitConverter,
    fee_estimator: FeeEstimator,
    dust_threshold_sat: u64,
    min_change_sat: u64,
    target_utxo_pool_size: usize,
}

fn sum_outputs(outputs: &[TxOutputSatoshis]) -> Result<u64, BitcoinishError> {
    outputs.iter().try_fold(0u64, |total, output| {
        total
            .checked_add(output.satoshis)
            .ok_or_else(|| BitcoinishError::InvalidAmount("output total overflows u64".into()))
    })
}

impl PaymentTxBuilder {
    /// Builder using the network dust threshold, no minimum change and a
    /// single change output.
    pub fn new(
        network: &'static CoinNetwork,
        units: UnitConverter,
        fee_estimator: FeeEstimator,
    ) -> Self {
        Self {
            network,
            units,
            fee_estimator,
            dust_threshold_sat: network.dust_threshold_sat,
            min_change_sat: 0,
            target_utxo_pool_size: 1,
        }
    }

    pub fn with_dust_threshold(mut self, dust_threshold_sat: u64) -> Self {
        self.dust_threshold_sat = dust_threshold_sat;
        self
    }

    pub fn with_min_change(mut self, min_change_sat: u64) -> Self {
        self.min_change_sat = min_change_sat;
        self
    }

    /// Clamped to `1..=MAX_CHANGE_SLOTS`.
    pub fn with_target_utxo_pool_size(mut self, target_utxo_pool_size: usize) -> Self {
        self.target_utxo_pool_size = target_utxo_pool_size.clamp(1, MAX_CHANGE_SLOTS);
        self
    }

    pub fn units(&self) -> &UnitConverter {
        &self.units
    }

    fn validate_outputs(
        &self,
        desired_outputs: &[TxOutput],
    ) -> Result<Vec<TxOutputSatoshis>, BitcoinishError> {
        if desired_outputs.is_empty() {
            return Err(BitcoinishError::TransactionBuildError(
                "at least one output is required".into(),
            ));
        }
        let mut external = Vec::with_capacity(desired_outputs.len());
        for (index, output) in desired_outputs.iter().enumerate() {
            if !validate_address(&output.address, self.network) {
                return Err(BitcoinishError::InvalidOutput {
                    index,
                    reason: format!(
                        "address {:?} is not a valid {} address",
                        output.address, self.network.name
                    ),
                });
            }
            let satoshis = self.units.to_base_denomination(&output.value).map_err(|e| {
                BitcoinishError::InvalidOutput {
                    index,
                    reason: format!("value {:?}: {e}", output.value),
                }
            })?;
            if satoshis == 0 {
                return Err(BitcoinishError::InvalidOutput {
                    index,
                    reason: format!("value {:?} must be positive", output.value),
                });
            }
            external.push(TxOutputSatoshis { address: output.address.clone(), satoshis });
        }
        Ok(external)
    }

    /// Takes `ceil(fee / outputs)` from every external output and returns the
    /// fee actually collected.
    fn deduct_fee_from_outputs(
        &self,
        external: &mut [TxOutputSatoshis],
        fee_sat: u64,
    ) -> Result<u64, BitcoinishError> {
        let count = external.len() as u64;
        let fee_share = fee_sat.div_ceil(count);
        for (index, output) in external.iter_mut().enumerate() {
            let value = output.satoshis;
            match value.checked_sub(fee_share) {
                Some(remaining) if remaining > self.dust_threshold_sat => {
                    output.satoshis = remaining
                }
                _ => {
                    let deficit = self
                        .dust_threshold_sat
                        .saturating_add(1)
                        .saturating_add(fee_share)
                        .saturating_sub(value);
                    return Err(BitcoinishError::DustOutput { index, value, fee_share, deficit });
                }
            }
        }
        debug!(fee_share, outputs = count, "fee deducted from external outputs");
        fee_share
            .checked_mul(count)
            .ok_or_else(|| BitcoinishError::InvalidAmount("fee share total overflows u64".into()))
    }

    fn check_fee_cap(
        &self,
        fee_sat: u64,
        output_total: u64,
        max_fee_percent: Option<Decimal>,
    ) -> Result<(), BitcoinishError> {
        let Some(max_percent) = max_fee_percent else {
            return Ok(());
        };
        let limit = Decimal::from(output_total)
            .checked_mul(max_percent)
            .map(|scaled| scaled / Decimal::ONE_HUNDRED)
            .ok_or_else(|| {
                let reason = format!("max fee percent {max_percent} out of range");
                BitcoinishError::InvalidAmount(reason)
            })?;
        if Decimal::from(fee_sat) > limit {
            return Err(BitcoinishError::FeeTooHigh {
                fee: fee_sat,
                amount: output_total,
                max_percent: max_percent.normalize().to_string(),
            });
        }
        Ok(())
    }

    /// Build the unsigned payment described by `params`.
    pub fn build(&self, params: PaymentTxParams<'_>) -> Result<PaymentTx, BitcoinishError> {
        let mut external = self.validate_outputs(params.desired_outputs)?;
        if !validate_address(params.change_address, self.network) {
            return Err(BitcoinishError::InvalidChangeAddress(params.change_address.to_string()));
        }

        let unused_utxos = prepare_utxos(params.unused_utxos, &self.units)?;
        let eligible = filter_spendable(&unused_utxos, params.use_unconfirmed_utxos);

        let output_total = sum_outputs(&external)?;
        let selector = UtxoSelector::new(&self.fee_estimator, self.dust_threshold_sat);
        let selection = selector.select_input_utxos(
            &eligible,
            output_total,
            external.len().saturating_add(self.target_utxo_pool_size),
            params.fee_rate,
            params.use_all_utxos,
            params.recipient_pays_fee,
        )?;
        let input_total = selection.selected_total_sat;
        let mut fee_sat = selection.fee_sat;
        let amount_with_fee = output_total
            .checked_add(fee_sat)
            .ok_or_else(|| {
                BitcoinishError::InvalidAmount("output total plus fee overflows u64".into())
            })?;

        let exact_balance = amount_with_fee > input_total && output_total == input_total;
        let total_change_sat = if params.recipient_pays_fee || exact_balance {
            if output_total > input_total {
                return Err(BitcoinishError::InsufficientFunds {
                    have: input_total,
                    need: output_total,
                    fee: 0,
                    shortfall: output_total - input_total,
                });
            }
            fee_sat = self.deduct_fee_from_outputs(&mut external, fee_sat)?;
            input_total - output_total
        } else if amount_with_fee > input_total {
            return Err(BitcoinishError::InsufficientFunds {
                have: input_total,
                need: output_total,
                fee: fee_sat,
                shortfall: amount_with_fee - input_total,
            });
        } else {
            input_total.checked_sub(amount_with_fee).ok_or_else(|| {
                BitcoinishError::Invariant(format!(
                    "negative change: {input_total} - {amount_with_fee}"
                ))
            })?
        };

        let mut change_outputs = Vec::new();
        if total_change_sat > self.dust_threshold_sat {
            let remaining_unused =
                unused_utxos.len().saturating_sub(selection.selected_utxos.len());
            let change_count = self.target_utxo_pool_size.saturating_sub(remaining_unused).max(1);
            debug!(total_change_sat, change_count, remaining_unused, "allocating change");
            let slots = weighted_change_outputs(params.change_address, change_count);
            let allocation = ChangeAllocator::new(self.dust_threshold_sat, self.min_change_sat)
                .allocate(total_change_sat, &slots)?;
            fee_sat = fee_sat.saturating_add(allocation.unallocated_sat);
            change_outputs = allocation.outputs;
        } else if total_change_sat > 0 {
            debug!(total_change_sat, "dust change added to fee");
            fee_sat = fee_sat.saturating_add(total_change_sat);
        }

        self.check_fee_cap(fee_sat, output_total, params.max_fee_percent)?;

        let external_total = sum_outputs(&external)?;
        let change_total = sum_outputs(&change_outputs)?;
        let spent = external_total
            .checked_add(change_total)
            .and_then(|outputs| outputs.checked_add(fee_sat));
        if spent != Some(input_total) {
            return Err(BitcoinishError::Invariant(format!(
                "inputs {input_total} sat != outputs {external_total} + {change_total} sat \
                 + fee {fee_sat} sat"
            )));
        }

        let all_outputs: Vec<TxOutputSatoshis> =
            external.iter().chain(&change_outputs).cloned().collect();
        let tx = build_unsigned_transaction(&selection.selected_utxos, &all_outputs, self.network)?;

        let change_address = match change_outputs.as_slice() {
            [only] => Some(only.address.clone()),
            _ => None,
        };
        debug!(
            inputs = selection.selected_utxos.len(),
            outputs = all_outputs.len(),
            fee_sat,
            change_total,
            "payment built"
        );

        Ok(PaymentTx {
            inputs: selection.selected_utxos,
            outputs: all_outputs.iter().map(|o| o.to_output(&self.units)).collect(),
            fee: self.units.to_main_denomination(fee_sat),
            change: self.units.to_main_denomination(change_total),
            change_address,
            change_outputs: change_outputs.iter().map(|o| o.to_output(&self.units)).collect(),
            external_outputs: external.iter().map(|o| o.to_output(&self.units)).collect(),
            external_output_total: self.units.to_main_denomination(external_total),
            raw_hex: encode_transaction(&tx),
            raw_hash: transaction_id(&tx),
        })
    }
}
