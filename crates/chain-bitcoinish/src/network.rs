use payments_common::types::FeeLevel;
use serde::{Deserialize, Serialize};

use crate::fee::AddressType;

/// Static per-level fee rates in base units per vbyte, used when no oracle
/// recommendation is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeLevelRates {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl FeeLevelRates {
    /// Rate for `level`; `Custom` has no static rate and maps to `medium`.
    pub fn rate_for(&self, level: FeeLevel) -> u64 {
        match level {
            FeeLevel::Low => self.low,
            FeeLevel::Medium | FeeLevel::Custom => self.medium,
            FeeLevel::High => self.high,
        }
    }
}

/// Consensus and policy parameters of a bitcoin-derived network.
#[derive(Debug, Clone, Serialize)]
pub struct CoinNetwork {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u32,
    /// Base58check version byte of pay-to-pubkey-hash addresses.
    pub p2pkh_prefix: u8,
    /// Base58check version bytes accepted for pay-to-script-hash addresses.
    pub p2sh_prefixes: &'static [u8],
    /// Bech32 human-readable part; `None` where segwit is not deployed.
    pub bech32_hrp: Option<&'static str>,
    pub dust_threshold_sat: u64,
    /// Smallest total fee nodes relay.
    pub min_relay_fee_sat: u64,
    pub fee_rates: FeeLevelRates,
    pub tx_version: i32,
    pub is_testnet: bool,
}

/// Bitcoin mainnet.
pub const BITCOIN: CoinNetwork = CoinNetwork {
    name: "Bitcoin",
    symbol: "BTC",
    decimals: 8,
    p2pkh_prefix: 0x00,
    p2sh_prefixes: &[0x05],
    bech32_hrp: Some("bc"),
    dust_threshold_sat: 546,
    min_relay_fee_sat: 1_000,
    fee_rates: FeeLevelRates { low: 5, medium: 10, high: 20 },
    tx_version: 2,
    is_testnet: false,
};

/// Bitcoin testnet3.
pub const BITCOIN_TESTNET: CoinNetwork = CoinNetwork {
    name: "Bitcoin Testnet",
    symbol: "TBTC",
    decimals: 8,
    p2pkh_prefix: 0x6f,
    p2sh_prefixes: &[0xc4],
    bech32_hrp: Some("tb"),
    dust_threshold_sat: 546,
    min_relay_fee_sat: 1_000,
    fee_rates: FeeLevelRates { low: 1, medium: 2, high: 5 },
    tx_version: 2,
    is_testnet: true,
};

/// Litecoin mainnet. Accepts both the legacy (`3...`) and current (`M...`)
/// script-hash prefixes.
pub const LITECOIN: CoinNetwork = CoinNetwork {
    name: "Litecoin",
    symbol: "LTC",
    decimals: 8,
    p2pkh_prefix: 0x30,
    p2sh_prefixes: &[0x32, 0x05],
    bech32_hrp: Some("ltc"),
    dust_threshold_sat: 5_460,
    min_relay_fee_sat: 1_000,
    fee_rates: FeeLevelRates { low: 2, medium: 5, high: 10 },
    tx_version: 2,
    is_testnet: false,
};

/// Litecoin testnet4.
pub const LITECOIN_TESTNET: CoinNetwork = CoinNetwork {
    name: "Litecoin Testnet",
    symbol: "TLTC",
    decimals: 8,
    p2pkh_prefix: 0x6f,
    p2sh_prefixes: &[0x3a, 0xc4],
    bech32_hrp: Some("tltc"),
    dust_threshold_sat: 5_460,
    min_relay_fee_sat: 1_000,
    fee_rates: FeeLevelRates { low: 1, medium: 2, high: 5 },
    tx_version: 2,
    is_testnet: true,
};

/// Dogecoin mainnet. No segwit.
pub const DOGECOIN: CoinNetwork = CoinNetwork {
    name: "Dogecoin",
    symbol: "DOGE",
    decimals: 8,
    p2pkh_prefix: 0x1e,
    p2sh_prefixes: &[0x16],
    bech32_hrp: None,
    dust_threshold_sat: 1_000_000,
    min_relay_fee_sat: 100_000,
    fee_rates: FeeLevelRates { low: 1_000, medium: 5_000, high: 10_000 },
    tx_version: 1,
    is_testnet: false,
};

/// Dogecoin testnet.
pub const DOGECOIN_TESTNET: CoinNetwork = CoinNetwork {
    name: "Dogecoin Testnet",
    symbol: "TDOGE",
    decimals: 8,
    p2pkh_prefix: 0x71,
    p2sh_prefixes: &[0xc4],
    bech32_hrp: None,
    dust_threshold_sat: 1_000_000,
    min_relay_fee_sat: 100_000,
    fee_rates: FeeLevelRates { low: 1_000, medium: 5_000, high: 10_000 },
    tx_version: 1,
    is_testnet: true,
};

/// Supported bitcoin-derived networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitcoinishNetwork {
    Bitcoin,
    BitcoinTestnet,
    Litecoin,
    LitecoinTestnet,
    Dogecoin,
    DogecoinTestnet,
}

impl BitcoinishNetwork {
    /// Parameter table for this network.
    pub fn params(self) -> &'static CoinNetwork {
        match self {
            BitcoinishNetwork::Bitcoin => &BITCOIN,
            BitcoinishNetwork::BitcoinTestnet => &BITCOIN_TESTNET,
            BitcoinishNetwork::Litecoin => &LITECOIN,
            BitcoinishNetwork::LitecoinTestnet => &LITECOIN_TESTNET,
            BitcoinishNetwork::Dogecoin => &DOGECOIN,
            BitcoinishNetwork::DogecoinTestnet => &DOGECOIN_TESTNET,
        }
    }

    /// Address type used for derived addresses unless configured otherwise.
    pub fn default_address_type(self) -> AddressType {
        if self.params().bech32_hrp.is_some() {
            AddressType::P2wpkh
        } else {
            AddressType::P2pkh
        }
    }
}

impl std::fmt::Display for BitcoinishNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BitcoinishNetwork::Bitcoin => write!(f, "bitcoin"),
            BitcoinishNetwork::BitcoinTestnet => write!(f, "bitcoin_testnet"),
            BitcoinishNetwork::Litecoin => write!(f, "litecoin"),
            BitcoinishNetwork::LitecoinTestnet => write!(f, "litecoin_testnet"),
            BitcoinishNetwork::Dogecoin => write!(f, "dogecoin"),
            BitcoinishNetwork::DogecoinTestnet => write!(f, "dogecoin_testnet"),
        }
    }
}
