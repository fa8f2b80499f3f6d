use payments_common::types::{BalanceResult, TransactionInfo, TransactionStatus};
use payments_common::UnitConverter;

use crate::data_source::{AddressDetails, RawTxInfo, RawTxOutput};

/// Main-denomination string of a signed base amount.
fn signed_main_denomination(units: &UnitConverter, base: i64) -> String {
    let magnitude = units.to_main_denomination(base.unsigned_abs());
    if base < 0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

/// Balance of an address. Only confirmed funds are spendable, and a balance
/// is sweepable once it exceeds the minimum relay fee.
pub fn map_balance(
    details: &AddressDetails,
    units: &UnitConverter,
    min_relay_fee_sat: u64,
) -> BalanceResult {
    BalanceResult {
        confirmed_balance: units.to_main_denomination(details.balance_sat),
        unconfirmed_balance: signed_main_denomination(units, details.unconfirmed_balance_sat),
        spendable_balance: units.to_main_denomination(details.balance_sat),
        sweepable: details.balance_sat > min_relay_fee_sat,
        requires_activation: false,
    }
}

/// Transaction info from an indexer record.
///
/// The sender is the first input's first address; the recipient is the
/// first output address that differs from it (or the first output when all
/// pay back to the sender). `amount` totals the outputs paying the recipient.
pub fn map_transaction_info(raw: &RawTxInfo, units: &UnitConverter) -> TransactionInfo {
    let from_address = raw
        .vin
        .first()
        .and_then(|input| input.addresses.first())
        .cloned();
    let output_address = |output: &RawTxOutput| output.addresses.first().cloned();
    let to_address = raw
        .vout
        .iter()
        .filter_map(output_address)
        .find(|address| Some(address) != from_address.as_ref())
        .or_else(|| raw.vout.first().and_then(output_address));

    let amount_sat: u64 = raw
        .vout
        .iter()
        .filter(|output| to_address.is_some() && output.addresses.first() == to_address.as_ref())
        .map(|output| output.value_sat)
        .sum();

    let confirmed = raw.confirmations > 0;
    TransactionInfo {
        id: raw.txid.clone(),
        from_address,
        to_address,
        from_index: None,
        to_index: None,
        amount: units.to_main_denomination(amount_sat),
        fee: units.to_main_denomination(raw.fee_sat),
        status: if confirmed { TransactionStatus::Confirmed } else { TransactionStatus::Pending },
        is_executed: confirmed,
        confirmation_id: raw.block_hash.clone().filter(|_| confirmed),
        confirmation_number: raw.block_height.filter(|_| confirmed),
        confirmations: raw.confirmations,
        confirmation_timestamp: raw.block_time.filter(|_| confirmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::RawTxInput;

    fn units() -> UnitConverter {
        UnitConverter::new(8).unwrap()
    }

    fn raw_tx(confirmations: u64) -> RawTxInfo {
        RawTxInfo {
            txid: "ab".repeat(32),
            block_hash: Some("00".repeat(32)),
            block_height: Some(800_000),
            block_time: Some(1_700_000_000),
            confirmations,
            fee_sat: 1_410,
            vin: vec![RawTxInput {
                txid: "cd".repeat(32),
                vout: 0,
                addresses: vec!["sender".into()],
                value_sat: 100_000,
            }],
            vout: vec![
                RawTxOutput { n: 0, addresses: vec!["recipient".into()], value_sat: 40_000 },
                RawTxOutput { n: 1, addresses: vec!["sender".into()], value_sat: 58_590 },
            ],
        }
    }

    #[test]
    fn confirmed_transaction() {
        let info = map_transaction_info(&raw_tx(3), &units());
        assert_eq!(info.from_address.as_deref(), Some("sender"));
        assert_eq!(info.to_address.as_deref(), Some("recipient"));
        assert_eq!(info.amount, "0.0004");
        assert_eq!(info.fee, "0.0000141");
        assert_eq!(info.status, TransactionStatus::Confirmed);
        assert!(info.is_executed);
        assert_eq!(info.confirmation_number, Some(800_000));
        assert_eq!(info.confirmation_timestamp, Some(1_700_000_000));
    }

    #[test]
    fn mempool_transaction_has_no_block_fields() {
        let info = map_transaction_info(&raw_tx(0), &units());
        assert_eq!(info.status, TransactionStatus::Pending);
        assert!(!info.is_executed);
        assert_eq!(info.confirmation_id, None);
        assert_eq!(info.confirmation_number, None);
    }

    #[test]
    fn self_transfer_uses_first_output() {
        let mut raw = raw_tx(1);
        raw.vout[0].addresses = vec!["sender".into()];
        let info = map_transaction_info(&raw, &units());
        assert_eq!(info.to_address.as_deref(), Some("sender"));
        assert_eq!(info.amount, "0.0009859");
    }

    #[test]
    fn balance_mapping() {
        let details = AddressDetails { balance_sat: 150_000, unconfirmed_balance_sat: -20_000 };
        let balance = map_balance(&details, &units(), 1_000);
        assert_eq!(balance.confirmed_balance, "0.0015");
        assert_eq!(balance.unconfirmed_balance, "-0.0002");
        assert_eq!(balance.spendable_balance, "0.0015");
        assert!(balance.sweepable);
        assert!(!balance.requires_activation);
    }

    #[test]
    fn balance_at_relay_fee_not_sweepable() {
        let details = AddressDetails { balance_sat: 1_000, unconfirmed_balance_sat: 0 };
        assert!(!map_balance(&details, &units(), 1_000).sweepable);
    }
}
