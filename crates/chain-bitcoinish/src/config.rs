use payments_common::types::{FeeLevel, FeeRate};
use payments_common::UnitConverter;
use serde::{Deserialize, Serialize};

use crate::change::MAX_CHANGE_SLOTS;
use crate::error::BitcoinishError;
use crate::fee::AddressType;
use crate::network::{BitcoinishNetwork, CoinNetwork};

/// Largest accepted dust threshold, one whole coin at eight decimals.
pub const MAX_DUST_THRESHOLD_SAT: u64 = 100_000_000;

fn default_fee_level() -> FeeLevel {
    FeeLevel::Medium
}

fn default_target_utxo_pool_size() -> usize {
    1
}

/// Construction-time settings of a payments instance. Unset fields fall
/// back to the network parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BitcoinishPaymentsConfig {
    pub network: BitcoinishNetwork,
    #[serde(default)]
    pub address_type: Option<AddressType>,
    /// Dust threshold in base units.
    #[serde(default)]
    pub dust_threshold: Option<u64>,
    /// Minimum relay fee in base units.
    #[serde(default)]
    pub network_min_relay_fee: Option<u64>,
    #[serde(default)]
    pub min_tx_fee: Option<FeeRate>,
    #[serde(default = "default_fee_level")]
    pub default_fee_level: FeeLevel,
    /// Number of UTXOs the sender should hold after each payment.
    #[serde(default = "default_target_utxo_pool_size")]
    pub target_utxo_pool_size: usize,
    /// Smallest change output worth creating, main denomination.
    #[serde(default)]
    pub min_change: Option<String>,
}

impl BitcoinishPaymentsConfig {
    pub fn new(network: BitcoinishNetwork) -> Self {
        Self {
            network,
            address_type: None,
            dust_threshold: None,
            network_min_relay_fee: None,
            min_tx_fee: None,
            default_fee_level: default_fee_level(),
            target_utxo_pool_size: default_target_utxo_pool_size(),
            min_change: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, BitcoinishError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BitcoinishError::InvalidConfig(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BitcoinishError> {
        if !(1..=MAX_CHANGE_SLOTS).contains(&self.target_utxo_pool_size) {
            return Err(BitcoinishError::InvalidConfig(format!(
                "target_utxo_pool_size must be between 1 and {MAX_CHANGE_SLOTS}, got {}",
                self.target_utxo_pool_size
            )));
        }
        if let Some(dust) = self.dust_threshold {
            if dust > MAX_DUST_THRESHOLD_SAT {
                return Err(BitcoinishError::InvalidConfig(format!(
                    "dust_threshold must be at most {MAX_DUST_THRESHOLD_SAT}, got {dust}"
                )));
            }
        }
        if self.default_fee_level == FeeLevel::Custom {
            return Err(BitcoinishError::InvalidConfig(
                "default_fee_level must be low, medium or high".into(),
            ));
        }
        if let Some(min_tx_fee) = &self.min_tx_fee {
            min_tx_fee
                .validate()
                .map_err(|e| BitcoinishError::InvalidConfig(format!("min_tx_fee: {e}")))?;
        }
        self.address_type().validate()?;
        self.min_change_sat()?;
        Ok(())
    }

    pub fn params(&self) -> &'static CoinNetwork {
        self.network.params()
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type.unwrap_or_else(|| self.network.default_address_type())
    }

    pub fn dust_threshold_sat(&self) -> u64 {
        self.dust_threshold.unwrap_or(self.params().dust_threshold_sat)
    }

    pub fn min_relay_fee_sat(&self) -> u64 {
        self.network_min_relay_fee.unwrap_or(self.params().min_relay_fee_sat)
    }

    pub fn min_change_sat(&self) -> Result<u64, BitcoinishError> {
        let Some(min_change) = &self.min_change else {
            return Ok(0);
        };
        UnitConverter::new(self.params().decimals)?
            .to_base_denomination(min_change)
            .map_err(|e| BitcoinishError::InvalidConfig(format!("min_change: {e}")))
    }
}
