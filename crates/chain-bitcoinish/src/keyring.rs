use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use payments_common::UnitConverter;
use zeroize::Zeroize;

use crate::address::pubkey_to_p2wpkh_address;
use crate::error::BitcoinishError;
use crate::network::CoinNetwork;
use crate::transaction::{
    decode_transaction, encode_transaction, sign_p2wpkh_transaction, transaction_id,
};
use crate::types::{PaymentTx, SignedTxData};

/// Key management for a payments instance: maps indices to keys and
/// addresses and signs payments spending from them.
pub trait Keyring: Send + Sync {
    /// Compressed public key of `index`, hex encoded.
    fn public_key(&self, index: u32) -> Result<String, BitcoinishError>;

    fn derive_address(&self, index: u32) -> Result<String, BitcoinishError>;

    /// Sign every input of `tx` with the key of `index`.
    fn sign(&self, tx: &PaymentTx, index: u32) -> Result<SignedTxData, BitcoinishError>;
}

/// One secp256k1 keypair with its native segwit address.
struct KeyPair {
    private_key: [u8; 32],
    public_key_compressed: [u8; 33],
    address: String,
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Keyring over a fixed list of keypairs; index `i` is the `i`-th key.
/// Addresses are P2WPKH, so the network must have a bech32 prefix.
pub struct P2wpkhKeyring {
    network: &'static CoinNetwork,
    units: UnitConverter,
    keys: Vec<KeyPair>,
}

impl P2wpkhKeyring {
    /// Takes ownership of the raw private keys and wipes them once parsed.
    pub fn new(
        network: &'static CoinNetwork,
        mut private_keys: Vec<[u8; 32]>,
    ) -> Result<Self, BitcoinishError> {
        let result = Self::parse_keys(network, &private_keys);
        for key in private_keys.iter_mut() {
            key.zeroize();
        }
        let keys = result?;
        Ok(Self { network, units: UnitConverter::new(network.decimals)?, keys })
    }

    fn parse_keys(
        network: &CoinNetwork,
        private_keys: &[[u8; 32]],
    ) -> Result<Vec<KeyPair>, BitcoinishError> {
        let secp = Secp256k1::signing_only();
        private_keys
            .iter()
            .enumerate()
            .map(|(index, private_key)| -> Result<KeyPair, BitcoinishError> {
                let secret_key = SecretKey::from_slice(private_key)
                    .map_err(|e| BitcoinishError::InvalidPrivateKey(format!("key {index}: {e}")))?;
                let public_key_compressed =
                    PublicKey::from_secret_key(&secp, &secret_key).serialize();
                let address = pubkey_to_p2wpkh_address(&public_key_compressed, network)?;
                Ok(KeyPair { private_key: *private_key, public_key_compressed, address })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn key(&self, index: u32) -> Result<&KeyPair, BitcoinishError> {
        self.keys.get(index as usize).ok_or_else(|| {
            BitcoinishError::InvalidPrivateKey(format!(
                "no key at index {index} ({} {} keys loaded)",
                self.keys.len(),
                self.network.symbol
            ))
        })
    }
}

impl std::fmt::Debug for P2wpkhKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2wpkhKeyring")
            .field("network", &self.network.name)
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl Keyring for P2wpkhKeyring {
    fn public_key(&self, index: u32) -> Result<String, BitcoinishError> {
        Ok(hex::encode(self.key(index)?.public_key_compressed))
    }

    fn derive_address(&self, index: u32) -> Result<String, BitcoinishError> {
        Ok(self.key(index)?.address.clone())
    }

    fn sign(&self, tx: &PaymentTx, index: u32) -> Result<SignedTxData, BitcoinishError> {
        let key = self.key(index)?;
        let unsigned = decode_transaction(&tx.raw_hex)?;
        if unsigned.input.len() != tx.inputs.len() {
            return Err(BitcoinishError::SigningError(format!(
                "raw transaction has {} inputs, payment lists {}",
                unsigned.input.len(),
                tx.inputs.len()
            )));
        }
        let input_values_sat = tx
            .inputs
            .iter()
            .map(|utxo| utxo.with_satoshis(&self.units)?.value_sat())
            .collect::<Result<Vec<u64>, BitcoinishError>>()?;

        let signed = sign_p2wpkh_transaction(&unsigned, &input_values_sat, &key.private_key)?;
        Ok(SignedTxData { hex: encode_transaction(&signed), id: transaction_id(&signed) })
    }
}
