use bech32::{segwit, Hrp};
use bitcoin::hashes::Hash;
use bitcoin::{
    CompressedPublicKey, PubkeyHash, ScriptBuf, ScriptHash, WitnessProgram, WitnessVersion,
};

use crate::error::BitcoinishError;
use crate::network::CoinNetwork;

fn invalid(address: &str, reason: impl std::fmt::Display) -> BitcoinishError {
    BitcoinishError::InvalidAddress(format!("{address}: {reason}"))
}

fn witness_script(
    address: &str,
    version: u8,
    program: &[u8],
) -> Result<ScriptBuf, BitcoinishError> {
    let version = WitnessVersion::try_from(version).map_err(|e| invalid(address, e))?;
    let program = WitnessProgram::new(version, program).map_err(|e| invalid(address, e))?;
    Ok(ScriptBuf::new_witness_program(&program))
}

fn is_bech32_candidate(address: &str, hrp: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    lower.len() > hrp.len() + 1 && lower.starts_with(hrp) && lower.as_bytes()[hrp.len()] == b'1'
}

/// Decode an address of `network` into the scriptPubKey it pays to.
///
/// Understands base58check P2PKH / P2SH addresses using the network's
/// version bytes and, where the network has a bech32 prefix, segwit
/// addresses of any witness version.
pub fn address_to_script_pubkey(
    address: &str,
    network: &CoinNetwork,
) -> Result<ScriptBuf, BitcoinishError> {
    if let Some(hrp) = network.bech32_hrp {
        if is_bech32_candidate(address, hrp) {
            let (decoded_hrp, version, program) =
                segwit::decode(address).map_err(|e| invalid(address, e))?;
            let expected = Hrp::parse(hrp)
                .map_err(|e| BitcoinishError::InvalidAddress(format!("bad hrp {hrp}: {e}")))?;
            if decoded_hrp != expected {
                return Err(BitcoinishError::InvalidAddress(format!(
                    "{address} is not a {} address",
                    network.name
                )));
            }
            return witness_script(address, version.to_u8(), &program);
        }
    }

    let payload = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| invalid(address, e))?;
    if payload.len() != 21 {
        return Err(BitcoinishError::InvalidAddress(format!(
            "{address}: unexpected payload length {}",
            payload.len()
        )));
    }
    let (version, hash) = (payload[0], &payload[1..]);
    if version == network.p2pkh_prefix {
        let hash = PubkeyHash::from_slice(hash).map_err(|e| invalid(address, e))?;
        Ok(ScriptBuf::new_p2pkh(&hash))
    } else if network.p2sh_prefixes.contains(&version) {
        let hash = ScriptHash::from_slice(hash).map_err(|e| invalid(address, e))?;
        Ok(ScriptBuf::new_p2sh(&hash))
    } else {
        Err(BitcoinishError::InvalidAddress(format!(
            "{address} is not a {} address (version byte {version:#04x})",
            network.name
        )))
    }
}

/// Whether `address` decodes to a script on `network`.
pub fn validate_address(address: &str, network: &CoinNetwork) -> bool {
    address_to_script_pubkey(address, network).is_ok()
}

/// Derive a P2WPKH (native segwit) address from a compressed public key.
pub fn pubkey_to_p2wpkh_address(
    pubkey_bytes: &[u8; 33],
    network: &CoinNetwork,
) -> Result<String, BitcoinishError> {
    let hrp = network.bech32_hrp.ok_or_else(|| {
        BitcoinishError::InvalidAddress(format!("{} has no segwit addresses", network.name))
    })?;
    let compressed_pk = CompressedPublicKey::from_slice(pubkey_bytes).map_err(|e| {
        BitcoinishError::InvalidAddress(format!("failed to parse compressed public key: {e}"))
    })?;
    let hrp = Hrp::parse(hrp)
        .map_err(|e| BitcoinishError::InvalidAddress(format!("bad hrp {hrp}: {e}")))?;
    segwit::encode_v0(hrp, compressed_pk.wpubkey_hash().as_byte_array())
        .map_err(|e| BitcoinishError::InvalidAddress(format!("bech32 encoding failed: {e}")))
}

/// Derive a legacy P2PKH address from a compressed public key.
pub fn pubkey_to_p2pkh_address(
    pubkey_bytes: &[u8; 33],
    network: &CoinNetwork,
) -> Result<String, BitcoinishError> {
    let compressed_pk = CompressedPublicKey::from_slice(pubkey_bytes).map_err(|e| {
        BitcoinishError::InvalidAddress(format!("failed to parse compressed public key: {e}"))
    })?;
    let mut payload = Vec::with_capacity(21);
    payload.push(network.p2pkh_prefix);
    payload.extend_from_slice(compressed_pk.pubkey_hash().as_byte_array());
    Ok(bs58::encode(payload).with_check().into_string())
}
