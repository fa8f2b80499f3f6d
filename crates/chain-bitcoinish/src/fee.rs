use payments_common::types::{FeeRate, FeeRateType};
use payments_common::units::{parse_decimal, UnitConverter};
use payments_common::PaymentsError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::BitcoinishError;

/// Version, locktime and the two count varints (10 bytes) in weight units.
const TX_OVERHEAD_WEIGHT: u64 = 40;
/// Segwit marker and flag bytes, witness data so one weight unit each.
const SEGWIT_MARKER_WEIGHT: u64 = 2;
/// DER signature plus sighash byte plus its push opcode.
const SIGNATURE_PUSH_BYTES: u64 = 73;
/// Outpoint plus sequence.
const INPUT_BASE_BYTES: u64 = 40;

/// Script type of the inputs being spent, which drives size estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    P2pkh,
    P2shP2wpkh,
    P2wpkh,
    P2tr,
    P2shMultisig { m: u8, n: u8 },
    P2wshMultisig { m: u8, n: u8 },
}

fn varint_len(n: u64) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        _ => 5,
    }
}

fn push_opcode_len(n: u64) -> u64 {
    match n {
        0..=75 => 1,
        76..=0xff => 2,
        _ => 3,
    }
}

/// OP_m <n pubkeys> OP_n OP_CHECKMULTISIG
fn multisig_script_len(n: u8) -> u64 {
    3 + 34 * u64::from(n)
}

impl AddressType {
    /// Whether spending this type needs witness data.
    pub fn is_segwit(self) -> bool {
        !matches!(self, AddressType::P2pkh | AddressType::P2shMultisig { .. })
    }

    /// Estimated weight units of one input of this type.
    pub fn input_weight(self) -> u64 {
        match self {
            AddressType::P2pkh => 148 * 4,
            AddressType::P2shP2wpkh => 64 * 4 + 108,
            AddressType::P2wpkh => 41 * 4 + 108,
            AddressType::P2tr => 41 * 4 + 66,
            AddressType::P2shMultisig { m, n } => {
                let script = multisig_script_len(n);
                let script_sig =
                    1 + u64::from(m) * SIGNATURE_PUSH_BYTES + push_opcode_len(script) + script;
                (INPUT_BASE_BYTES + varint_len(script_sig) + script_sig) * 4
            }
            AddressType::P2wshMultisig { m, n } => {
                let script = multisig_script_len(n);
                let witness =
                    1 + 1 + u64::from(m) * SIGNATURE_PUSH_BYTES + varint_len(script) + script;
                (INPUT_BASE_BYTES + 1) * 4 + witness
            }
        }
    }

    /// Estimated weight units of one output paying to this type.
    pub fn output_weight(self) -> u64 {
        let vbytes = match self {
            AddressType::P2pkh => 34,
            AddressType::P2shP2wpkh | AddressType::P2shMultisig { .. } => 32,
            AddressType::P2wpkh => 31,
            AddressType::P2tr | AddressType::P2wshMultisig { .. } => 43,
        };
        vbytes * 4
    }

    pub fn validate(self) -> Result<(), BitcoinishError> {
        let (m, n, max_n) = match self {
            AddressType::P2shMultisig { m, n } => (m, n, 15),
            AddressType::P2wshMultisig { m, n } => (m, n, 20),
            _ => return Ok(()),
        };
        if m == 0 || m > n || n > max_n {
            return Err(BitcoinishError::InvalidConfig(format!(
                "invalid {m}-of-{n} multisig for {self:?}"
            )));
        }
        Ok(())
    }
}

/// Turns fee rates into total fees for a given input/output shape.
#[derive(Debug, Clone)]
pub struct FeeEstimator {
    address_type: AddressType,
    units: UnitConverter,
    min_tx_fee: Option<FeeRate>,
    min_relay_fee_sat: u64,
}

impl FeeEstimator {
    pub fn new(
        address_type: AddressType,
        units: UnitConverter,
        min_tx_fee: Option<FeeRate>,
        min_relay_fee_sat: u64,
    ) -> Self {
        Self { address_type, units, min_tx_fee, min_relay_fee_sat }
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    /// Linear weight estimate: overhead plus per-input and per-output weight.
    pub fn estimate_tx_weight(&self, input_count: usize, output_count: usize) -> u64 {
        let marker = if self.address_type.is_segwit() { SEGWIT_MARKER_WEIGHT } else { 0 };
        TX_OVERHEAD_WEIGHT
            + marker
            + input_count as u64 * self.address_type.input_weight()
            + output_count as u64 * self.address_type.output_weight()
    }

    /// Estimated virtual size in vbytes, rounded up.
    pub fn estimate_tx_vsize(&self, input_count: usize, output_count: usize) -> u64 {
        self.estimate_tx_weight(input_count, output_count).div_ceil(4)
    }

    /// Total fee in base units implied by `fee_rate` for the given shape.
    /// Per-weight rates are rounded to a whole satoshi; flat base rates are
    /// returned as given.
    pub fn fee_rate_to_satoshis(
        &self,
        fee_rate: &FeeRate,
        input_count: usize,
        output_count: usize,
    ) -> Result<Decimal, PaymentsError> {
        match fee_rate.fee_rate_type {
            FeeRateType::BasePerWeight => {
                let rate = parse_decimal(&fee_rate.fee_rate)?;
                let vsize = Decimal::from(self.estimate_tx_vsize(input_count, output_count));
                let total = rate
                    .checked_mul(vsize)
                    .ok_or_else(|| PaymentsError::Overflow(format!("{rate} x {vsize} vbytes")))?;
                Ok(total.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            }
            FeeRateType::Main => {
                Ok(Decimal::from(self.units.to_base_denomination(&fee_rate.fee_rate)?))
            }
            FeeRateType::Base => parse_decimal(&fee_rate.fee_rate),
        }
    }

    /// Fee for the shape, raised to the configured minimum transaction fee and
    /// the network minimum relay fee, rounded up to a whole satoshi.
    pub fn calculate_tx_fee_satoshis(
        &self,
        target_rate: &FeeRate,
        input_count: usize,
        output_count: usize,
    ) -> Result<u64, BitcoinishError> {
        target_rate.validate()?;
        let mut fee = self.fee_rate_to_satoshis(target_rate, input_count, output_count)?;
        if let Some(min_tx_fee) = &self.min_tx_fee {
            fee = fee.max(self.fee_rate_to_satoshis(min_tx_fee, input_count, output_count)?);
        }
        fee = fee.max(Decimal::from(self.min_relay_fee_sat));
        fee.ceil()
            .to_u64()
            .ok_or_else(|| BitcoinishError::InvalidAmount(format!("fee {fee} out of range")))
    }
}
