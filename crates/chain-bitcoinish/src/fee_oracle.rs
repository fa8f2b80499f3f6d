use async_trait::async_trait;
use payments_common::types::{FeeLevel, FeeRate};

use crate::error::BitcoinishError;
use crate::network::{CoinNetwork, FeeLevelRates};

/// Source of fee rate recommendations, usually a network service.
#[async_trait]
pub trait FeeRateOracle: Send + Sync {
    async fn get_fee_rate_recommendation(
        &self,
        level: FeeLevel,
    ) -> Result<FeeRate, BitcoinishError>;
}

/// Oracle answering from a fixed sat/vbyte table.
#[derive(Debug, Clone, Copy)]
pub struct StaticFeeRateOracle {
    rates: FeeLevelRates,
}

impl StaticFeeRateOracle {
    pub fn new(rates: FeeLevelRates) -> Self {
        Self { rates }
    }

    pub fn for_network(network: &CoinNetwork) -> Self {
        Self::new(network.fee_rates)
    }

    pub fn fee_rate(&self, level: FeeLevel) -> FeeRate {
        FeeRate::base_per_weight(self.rates.rate_for(level).to_string())
    }
}

#[async_trait]
impl FeeRateOracle for StaticFeeRateOracle {
    async fn get_fee_rate_recommendation(
        &self,
        level: FeeLevel,
    ) -> Result<FeeRate, BitcoinishError> {
        Ok(self.fee_rate(level))
    }
}
