use serde::{Deserialize, Serialize};

use crate::error::PaymentsError;
use crate::units::{parse_base_amount, parse_decimal, UnitConverter};

/// Fee urgency tiers understood by fee-rate oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeLevel {
    Custom,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for FeeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeLevel::Custom => write!(f, "custom"),
            FeeLevel::Low => write!(f, "low"),
            FeeLevel::Medium => write!(f, "medium"),
            FeeLevel::High => write!(f, "high"),
        }
    }
}

/// How a [`FeeRate`] value is denominated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeRateType {
    /// Flat total in base units (satoshis).
    #[serde(rename = "base")]
    Base,
    /// Flat total in main units (BTC).
    #[serde(rename = "main")]
    Main,
    /// Base units per vbyte; needs a size estimate to become a total.
    #[serde(rename = "base/weight")]
    BasePerWeight,
}

impl FeeRateType {
    /// Whether the rate is already a total fee.
    pub fn is_flat(self) -> bool {
        !matches!(self, FeeRateType::BasePerWeight)
    }
}

/// A fee rate as a decimal string plus its denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRate {
    pub fee_rate: String,
    pub fee_rate_type: FeeRateType,
}

impl FeeRate {
    pub fn new(fee_rate: impl Into<String>, fee_rate_type: FeeRateType) -> Self {
        Self { fee_rate: fee_rate.into(), fee_rate_type }
    }

    pub fn base(fee_rate: impl Into<String>) -> Self {
        Self::new(fee_rate, FeeRateType::Base)
    }

    pub fn main(fee_rate: impl Into<String>) -> Self {
        Self::new(fee_rate, FeeRateType::Main)
    }

    pub fn base_per_weight(fee_rate: impl Into<String>) -> Self {
        Self::new(fee_rate, FeeRateType::BasePerWeight)
    }

    /// Reject rates that are not finite non-negative decimals.
    pub fn validate(&self) -> Result<(), PaymentsError> {
        let value = parse_decimal(&self.fee_rate)
            .map_err(|_| PaymentsError::InvalidFeeRate(self.fee_rate.clone()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PaymentsError::InvalidFeeRate(self.fee_rate.clone()));
        }
        Ok(())
    }
}

/// Caller's fee preference: an explicit rate or a level to look up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeOption {
    Custom(FeeRate),
    Level(FeeLevel),
}

/// Outcome of fee option resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFeeOption {
    pub target_fee_level: FeeLevel,
    pub target_fee_rate: String,
    pub target_fee_rate_type: FeeRateType,
    /// Flat fee in base units; `None` for per-weight rates.
    pub fee_base: Option<String>,
    /// Flat fee in main units; `None` for per-weight rates.
    pub fee_main: Option<String>,
}

impl ResolvedFeeOption {
    pub fn new(
        level: FeeLevel,
        rate: &FeeRate,
        units: &UnitConverter,
    ) -> Result<Self, PaymentsError> {
        rate.validate()?;
        let (fee_base, fee_main) = match rate.fee_rate_type {
            FeeRateType::Base => {
                let base = parse_base_amount(&rate.fee_rate)?;
                (Some(base.to_string()), Some(units.to_main_denomination(base)))
            }
            FeeRateType::Main => {
                let base = units.to_base_denomination(&rate.fee_rate)?;
                (Some(base.to_string()), Some(units.to_main_denomination(base)))
            }
            FeeRateType::BasePerWeight => (None, None),
        };
        Ok(Self {
            target_fee_level: level,
            target_fee_rate: rate.fee_rate.clone(),
            target_fee_rate_type: rate.fee_rate_type,
            fee_base,
            fee_main,
        })
    }

    pub fn fee_rate(&self) -> FeeRate {
        FeeRate::new(self.target_fee_rate.clone(), self.target_fee_rate_type)
    }
}

/// A payment destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payport {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_id: Option<String>,
}

impl Payport {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), extra_id: None }
    }
}

/// Lifecycle of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Unsigned,
    Signed,
    Pending,
    Confirmed,
    Failed,
}

/// Balance of a payport, main denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResult {
    pub confirmed_balance: String,
    pub unconfirmed_balance: String,
    pub spendable_balance: String,
    pub sweepable: bool,
    pub requires_activation: bool,
}

/// A transaction as seen on chain, main denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub from_index: Option<u32>,
    pub to_index: Option<u32>,
    pub amount: String,
    pub fee: String,
    pub status: TransactionStatus,
    pub is_executed: bool,
    /// Hash of the including block.
    pub confirmation_id: Option<String>,
    /// Height of the including block.
    pub confirmation_number: Option<u64>,
    pub confirmations: u64,
    /// Unix seconds of the including block.
    pub confirmation_timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub id: String,
}
