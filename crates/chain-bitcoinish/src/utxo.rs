use std::cmp::Ordering;

use payments_common::types::FeeRate;
use payments_common::UnitConverter;
use tracing::debug;

use crate::error::BitcoinishError;
use crate::fee::FeeEstimator;
use crate::types::UtxoInfo;

/// Result of UTXO selection: the chosen UTXOs, their aggregate value and the
/// fee estimated for that input count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSelection {
    pub selected_utxos: Vec<UtxoInfo>,
    pub selected_total_sat: u64,
    pub fee_sat: u64,
}

/// Copies of `utxos` with `satoshis` filled in.
pub fn prepare_utxos(
    utxos: &[UtxoInfo],
    units: &UnitConverter,
) -> Result<Vec<UtxoInfo>, BitcoinishError> {
    utxos.iter().map(|utxo| utxo.with_satoshis(units)).collect()
}

/// UTXOs eligible for spending under the given confirmation policy.
pub fn filter_spendable(utxos: &[UtxoInfo], use_unconfirmed_utxos: bool) -> Vec<UtxoInfo> {
    utxos
        .iter()
        .filter(|utxo| use_unconfirmed_utxos || utxo.is_confirmed())
        .cloned()
        .collect()
}

pub fn sum_utxo_sat(utxos: &[UtxoInfo]) -> Result<u64, BitcoinishError> {
    utxos.iter().try_fold(0u64, |total, utxo| {
        total
            .checked_add(utxo.value_sat()?)
            .ok_or_else(|| BitcoinishError::InvalidUtxo("utxo total overflows u64".into()))
    })
}

/// Greedy accumulation order: ascending satoshis, then txid, then vout.
fn compare_for_accumulation(a: &UtxoInfo, b: &UtxoInfo) -> Ordering {
    a.satoshis
        .cmp(&b.satoshis)
        .then_with(|| a.txid.cmp(&b.txid))
        .then_with(|| a.vout.cmp(&b.vout))
}

/// Chooses which UTXOs fund a payment.
#[derive(Debug, Clone, Copy)]
pub struct UtxoSelector<'a> {
    fee_estimator: &'a FeeEstimator,
    dust_threshold_sat: u64,
}

impl<'a> UtxoSelector<'a> {
    pub fn new(fee_estimator: &'a FeeEstimator, dust_threshold_sat: u64) -> Self {
        Self { fee_estimator, dust_threshold_sat }
    }

    fn required_sat(
        &self,
        output_total: u64,
        fee_sat: u64,
        recipient_pays_fee: bool,
    ) -> Result<u64, BitcoinishError> {
        if recipient_pays_fee {
            return Ok(output_total);
        }
        output_total.checked_add(fee_sat).ok_or_else(|| {
            BitcoinishError::InvalidAmount(format!("{output_total} + {fee_sat} overflows"))
        })
    }

    /// Select inputs covering `output_total` plus the fee for `output_count`
    /// outputs.
    ///
    /// With `use_all_utxos` the whole pool is taken. Otherwise the first UTXO
    /// (in pool order) worth between the single-input requirement and that
    /// requirement plus dust is taken alone; failing that, UTXOs are
    /// accumulated smallest first until the requirement for the current input
    /// count is met. When nothing satisfies the requirement the whole pool is
    /// returned and the caller reports the shortfall.
    ///
    /// Every UTXO must already carry `satoshis`, see [`prepare_utxos`].
    pub fn select_input_utxos(
        &self,
        available: &[UtxoInfo],
        output_total: u64,
        output_count: usize,
        fee_rate: &FeeRate,
        use_all_utxos: bool,
        recipient_pays_fee: bool,
    ) -> Result<UtxoSelection, BitcoinishError> {
        let fee_for = |inputs: usize| {
            self.fee_estimator
                .calculate_tx_fee_satoshis(fee_rate, inputs, output_count)
        };

        if use_all_utxos {
            let fee_sat = fee_for(available.len())?;
            debug!(inputs = available.len(), fee_sat, "selecting every utxo");
            return Ok(UtxoSelection {
                selected_utxos: available.to_vec(),
                selected_total_sat: sum_utxo_sat(available)?,
                fee_sat,
            });
        }

        let single_fee = fee_for(1)?;
        let single_required = self.required_sat(output_total, single_fee, recipient_pays_fee)?;
        let single_ceiling = single_required.saturating_add(self.dust_threshold_sat);
        for utxo in available {
            let value = utxo.value_sat()?;
            if (single_required..=single_ceiling).contains(&value) {
                debug!(txid = %utxo.txid, vout = utxo.vout, value, "ideal single utxo match");
                return Ok(UtxoSelection {
                    selected_utxos: vec![utxo.clone()],
                    selected_total_sat: value,
                    fee_sat: single_fee,
                });
            }
        }

        let mut sorted: Vec<&UtxoInfo> = available.iter().collect();
        sorted.sort_by(|a, b| compare_for_accumulation(a, b));

        let mut selected_utxos = Vec::new();
        let mut selected_total_sat: u64 = 0;
        for utxo in sorted {
            selected_utxos.push(utxo.clone());
            selected_total_sat = selected_total_sat
                .checked_add(utxo.value_sat()?)
                .ok_or_else(|| BitcoinishError::InvalidUtxo("utxo total overflows u64".into()))?;

            let fee_sat = fee_for(selected_utxos.len())?;
            if selected_total_sat >= self.required_sat(output_total, fee_sat, recipient_pays_fee)? {
                debug!(
                    inputs = selected_utxos.len(),
                    selected_total_sat,
                    fee_sat,
                    "greedy selection satisfied"
                );
                return Ok(UtxoSelection { selected_utxos, selected_total_sat, fee_sat });
            }
        }

        let fee_sat = fee_for(available.len())?;
        debug!(inputs = available.len(), selected_total_sat, fee_sat, "pool cannot cover outputs");
        Ok(UtxoSelection {
            selected_utxos: available.to_vec(),
            selected_total_sat,
            fee_sat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::AddressType;

    fn units() -> UnitConverter {
        UnitConverter::new(8).unwrap()
    }

    fn estimator() -> FeeEstimator {
        FeeEstimator::new(AddressType::P2wpkh, units(), None, 0)
    }

    fn make_utxo(txid_byte: char, vout: u32, satoshis: u64) -> UtxoInfo {
        let value = units().to_main_denomination(satoshis);
        let mut utxo = UtxoInfo::new(txid_byte.to_string().repeat(64), vout, value);
        utxo.satoshis = Some(satoshis);
        utxo.confirmations = Some(1);
        utxo
    }

    #[test]
    fn use_all_takes_whole_pool() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 546);
        let pool = vec![make_utxo('a', 0, 10_000), make_utxo('b', 0, 20_000)];
        let selection = selector
            .select_input_utxos(&pool, 1_000, 2, &FeeRate::base("500"), true, false)
            .unwrap();
        assert_eq!(selection.selected_utxos, pool);
        assert_eq!(selection.selected_total_sat, 30_000);
        assert_eq!(selection.fee_sat, 500);
    }

    #[test]
    fn ideal_single_match_beats_greedy() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 546);
        // Greedy would take the two small ones first.
        let pool = vec![
            make_utxo('a', 0, 30_000),
            make_utxo('b', 0, 30_000),
            make_utxo('c', 0, 51_200),
        ];
        let selection = selector
            .select_input_utxos(&pool, 50_000, 2, &FeeRate::base("1000"), false, false)
            .unwrap();
        assert_eq!(selection.selected_utxos.len(), 1);
        assert_eq!(selection.selected_utxos[0].txid, "c".repeat(64));
        assert_eq!(selection.fee_sat, 1_000);
    }

    #[test]
    fn first_ideal_match_in_pool_order_wins() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 546);
        let pool = vec![make_utxo('f', 0, 51_500), make_utxo('a', 0, 51_000)];
        let selection = selector
            .select_input_utxos(&pool, 50_000, 1, &FeeRate::base("1000"), false, false)
            .unwrap();
        assert_eq!(selection.selected_utxos[0].txid, "f".repeat(64));
    }

    #[test]
    fn greedy_accumulates_smallest_first() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 546);
        let pool = vec![
            make_utxo('a', 0, 90_000),
            make_utxo('b', 0, 10_000),
            make_utxo('c', 0, 20_000),
        ];
        let selection = selector
            .select_input_utxos(&pool, 25_000, 2, &FeeRate::base("1000"), false, false)
            .unwrap();
        let values: Vec<u64> =
            selection.selected_utxos.iter().map(|u| u.satoshis.unwrap()).collect();
        assert_eq!(values, vec![10_000, 20_000]);
        assert_eq!(selection.selected_total_sat, 30_000);
    }

    #[test]
    fn greedy_recomputes_per_weight_fee() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 0);
        let pool = vec![make_utxo('a', 0, 10_000), make_utxo('b', 0, 10_000)];
        // 1 input, 1 output at 10 sat/vB: ceil(438 / 4) = 110 vB -> 1100 sat.
        // 2 inputs: ceil(710 / 4) = 178 vB -> 1780 sat.
        let selection = selector
            .select_input_utxos(&pool, 15_000, 1, &FeeRate::base_per_weight("10"), false, false)
            .unwrap();
        assert_eq!(selection.selected_utxos.len(), 2);
        assert_eq!(selection.fee_sat, 1_780);
    }

    #[test]
    fn ties_broken_by_txid_then_vout() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 0);
        let pool = vec![
            make_utxo('b', 0, 10_000),
            make_utxo('a', 1, 10_000),
            make_utxo('a', 0, 10_000),
        ];
        let selection = selector
            .select_input_utxos(&pool, 9_500, 1, &FeeRate::base("1000"), false, false)
            .unwrap();
        assert_eq!(selection.selected_utxos.len(), 2);
        assert_eq!(selection.selected_utxos[0].txid, "a".repeat(64));
        assert_eq!(selection.selected_utxos[0].vout, 0);
        assert_eq!(selection.selected_utxos[1].vout, 1);
    }

    #[test]
    fn recipient_paid_fee_not_required_up_front() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 0);
        let pool = vec![make_utxo('a', 0, 50_000), make_utxo('b', 0, 60_000)];
        let selection = selector
            .select_input_utxos(&pool, 50_000, 1, &FeeRate::base("1000"), false, true)
            .unwrap();
        assert_eq!(selection.selected_utxos.len(), 1);
        assert_eq!(selection.selected_total_sat, 50_000);
    }

    #[test]
    fn insufficient_pool_returned_whole() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 546);
        let pool = vec![make_utxo('a', 0, 1_000), make_utxo('b', 0, 2_000)];
        let selection = selector
            .select_input_utxos(&pool, 500_000, 2, &FeeRate::base("1000"), false, false)
            .unwrap();
        assert_eq!(selection.selected_utxos.len(), 2);
        assert_eq!(selection.selected_total_sat, 3_000);
    }

    #[test]
    fn missing_satoshis_is_an_error() {
        let est = estimator();
        let selector = UtxoSelector::new(&est, 546);
        let pool = vec![UtxoInfo::new("a".repeat(64), 0, "0.1")];
        assert!(selector
            .select_input_utxos(&pool, 1_000, 1, &FeeRate::base("1000"), false, false)
            .is_err());
    }

    #[test]
    fn spendable_filter_respects_policy() {
        let mut unconfirmed = make_utxo('b', 0, 1_000);
        unconfirmed.confirmations = Some(0);
        let pool = vec![make_utxo('a', 0, 1_000), unconfirmed];
        assert_eq!(filter_spendable(&pool, false).len(), 1);
        assert_eq!(filter_spendable(&pool, true).len(), 2);
    }

    #[test]
    fn prepare_fills_satoshis() {
        let pool = vec![UtxoInfo::new("a".repeat(64), 0, "0.00012345")];
        let prepared = prepare_utxos(&pool, &units()).unwrap();
        assert_eq!(sum_utxo_sat(&prepared).unwrap(), 12_345);
    }
}
