use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

use crate::address::address_to_script_pubkey;
use crate::error::BitcoinishError;
use crate::network::CoinNetwork;
use crate::types::{TxOutputSatoshis, UtxoInfo};

/// Assemble the unsigned transaction spending `inputs` to `outputs`.
///
/// Inputs keep the given order and signal RBF; lock time is zero and the
/// version comes from the network.
pub fn build_unsigned_transaction(
    inputs: &[UtxoInfo],
    outputs: &[TxOutputSatoshis],
    network: &CoinNetwork,
) -> Result<Transaction, BitcoinishError> {
    let mut tx_inputs = Vec::with_capacity(inputs.len());
    for utxo in inputs {
        let txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| BitcoinishError::InvalidUtxo(format!("invalid txid {}: {e}", utxo.txid)))?;
        tx_inputs.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        });
    }

    let mut tx_outputs = Vec::with_capacity(outputs.len());
    for output in outputs {
        tx_outputs.push(TxOut {
            value: Amount::from_sat(output.satoshis),
            script_pubkey: address_to_script_pubkey(&output.address, network)?,
        });
    }

    Ok(Transaction {
        version: Version(network.tx_version),
        lock_time: LockTime::ZERO,
        input: tx_inputs,
        output: tx_outputs,
    })
}

/// Hex of the consensus serialization.
pub fn encode_transaction(tx: &Transaction) -> String {
    hex::encode(bitcoin::consensus::serialize(tx))
}

pub fn decode_transaction(raw_hex: &str) -> Result<Transaction, BitcoinishError> {
    let bytes = hex::decode(raw_hex).map_err(|e| {
        BitcoinishError::TransactionBuildError(format!("invalid transaction hex: {e}"))
    })?;
    bitcoin::consensus::deserialize(&bytes)
        .map_err(|e| BitcoinishError::TransactionBuildError(format!("invalid transaction: {e}")))
}

/// Transaction id in display order.
pub fn transaction_id(tx: &Transaction) -> String {
    tx.compute_txid().to_string()
}

/// Sign every input of `tx` as a P2WPKH spend of `private_key`.
///
/// `input_values_sat` holds the value of each spent output, in input order;
/// BIP143 commits to it.
pub fn sign_p2wpkh_transaction(
    tx: &Transaction,
    input_values_sat: &[u64],
    private_key: &[u8; 32],
) -> Result<Transaction, BitcoinishError> {
    if input_values_sat.len() != tx.input.len() {
        return Err(BitcoinishError::SigningError(format!(
            "{} input values for {} inputs",
            input_values_sat.len(),
            tx.input.len()
        )));
    }

    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(private_key)
        .map_err(|e| BitcoinishError::InvalidPrivateKey(format!("invalid secret key: {e}")))?;
    let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
    let script_pubkey = ScriptBuf::new_p2wpkh(&CompressedPublicKey(public_key).wpubkey_hash());

    let mut signed_tx = tx.clone();
    let mut sighash_cache = SighashCache::new(tx);
    for (input_index, value) in input_values_sat.iter().enumerate() {
        let sighash = sighash_cache
            .p2wpkh_signature_hash(
                input_index,
                &script_pubkey,
                Amount::from_sat(*value),
                EcdsaSighashType::All,
            )
            .map_err(|e| {
                BitcoinishError::SigningError(format!("sighash computation failed: {e}"))
            })?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&msg, &secret_key);

        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All as u8);

        let mut witness = Witness::new();
        witness.push(&sig_bytes);
        witness.push(public_key.serialize());
        signed_tx.input[input_index].witness = witness;
    }

    Ok(signed_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::pubkey_to_p2wpkh_address;
    use crate::network::{BITCOIN, BITCOIN_TESTNET, DOGECOIN};

    const RECIPIENT: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    fn make_utxo(txid: &str, vout: u32, satoshis: u64) -> UtxoInfo {
        let mut utxo = UtxoInfo::new(txid, vout, "0");
        utxo.satoshis = Some(satoshis);
        utxo
    }

    fn output(address: &str, satoshis: u64) -> TxOutputSatoshis {
        TxOutputSatoshis { address: address.to_string(), satoshis }
    }

    #[test]
    fn unsigned_transaction_shape() {
        let inputs = vec![make_utxo(&"a".repeat(64), 3, 100_000)];
        let tx =
            build_unsigned_transaction(&inputs, &[output(RECIPIENT, 50_000)], &BITCOIN).unwrap();
        assert_eq!(tx.version, Version::TWO);
        assert_eq!(tx.lock_time, LockTime::ZERO);
        assert_eq!(tx.input[0].previous_output.vout, 3);
        assert_eq!(tx.input[0].sequence, Sequence::ENABLE_RBF_NO_LOCKTIME);
        assert_eq!(tx.output[0].value.to_sat(), 50_000);
        assert_eq!(
            hex::encode(tx.output[0].script_pubkey.as_bytes()),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn dogecoin_uses_version_one() {
        let mut payload = vec![0x1e];
        payload.extend_from_slice(&[0x44; 20]);
        let doge = bs58::encode(payload).with_check().into_string();
        let inputs = vec![make_utxo(&"b".repeat(64), 0, 5_000_000)];
        let tx =
            build_unsigned_transaction(&inputs, &[output(&doge, 2_000_000)], &DOGECOIN).unwrap();
        assert_eq!(tx.version, Version::ONE);
    }

    #[test]
    fn invalid_txid_rejected() {
        let inputs = vec![make_utxo("xyz", 0, 100_000)];
        let err =
            build_unsigned_transaction(&inputs, &[output(RECIPIENT, 1_000)], &BITCOIN).unwrap_err();
        assert!(matches!(err, BitcoinishError::InvalidUtxo(_)));
    }

    #[test]
    fn wrong_network_output_rejected() {
        let inputs = vec![make_utxo(&"c".repeat(64), 0, 100_000)];
        let outputs = [output(RECIPIENT, 1_000)];
        assert!(build_unsigned_transaction(&inputs, &outputs, &BITCOIN_TESTNET).is_err());
    }

    #[test]
    fn hex_round_trip_preserves_txid() {
        let inputs = vec![make_utxo(&"d".repeat(64), 1, 100_000)];
        let tx =
            build_unsigned_transaction(&inputs, &[output(RECIPIENT, 60_000)], &BITCOIN).unwrap();
        let decoded = decode_transaction(&encode_transaction(&tx)).unwrap();
        assert_eq!(transaction_id(&decoded), transaction_id(&tx));
        assert_eq!(transaction_id(&tx).len(), 64);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_transaction("zz").is_err());
        assert!(decode_transaction("0100").is_err());
    }

    #[test]
    fn signing_fills_every_witness() {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x42; 32]).unwrap();
        let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let own_address =
            pubkey_to_p2wpkh_address(&public_key.serialize(), &BITCOIN_TESTNET).unwrap();

        let inputs = vec![
            make_utxo(&"ab".repeat(32), 0, 200_000),
            make_utxo(&"cd".repeat(32), 1, 300_000),
        ];
        let tx =
            build_unsigned_transaction(&inputs, &[output(&own_address, 450_000)], &BITCOIN_TESTNET)
                .unwrap();
        let signed = sign_p2wpkh_transaction(&tx, &[200_000, 300_000], &[0x42; 32]).unwrap();

        for input in &signed.input {
            assert_eq!(input.witness.len(), 2);
            assert_eq!(input.witness.nth(1).unwrap(), public_key.serialize().as_slice());
        }
        // Witness data does not change the txid.
        assert_eq!(transaction_id(&signed), transaction_id(&tx));
        assert!(encode_transaction(&signed).len() > encode_transaction(&tx).len());
    }

    #[test]
    fn signing_rejects_invalid_key() {
        let inputs = vec![make_utxo(&"e".repeat(64), 0, 100_000)];
        let tx =
            build_unsigned_transaction(&inputs, &[output(RECIPIENT, 50_000)], &BITCOIN).unwrap();
        let err = sign_p2wpkh_transaction(&tx, &[100_000], &[0u8; 32]).unwrap_err();
        assert!(matches!(err, BitcoinishError::InvalidPrivateKey(_)));
    }

    #[test]
    fn signing_requires_value_per_input() {
        let inputs = vec![make_utxo(&"f".repeat(64), 0, 100_000)];
        let tx =
            build_unsigned_transaction(&inputs, &[output(RECIPIENT, 50_000)], &BITCOIN).unwrap();
        assert!(sign_p2wpkh_transaction(&tx, &[], &[0x42; 32]).is_err());
    }
}
