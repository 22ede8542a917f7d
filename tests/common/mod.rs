//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::str::FromStr;

use bitcoin::{
    Address, Amount, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, Witness, absolute, transaction,
    consensus::encode::serialize_hex,
    hashes::Hash,
    script::PushBytesBuf,
    secp256k1::{Message, Secp256k1},
    sighash::{EcdsaSighashType, SighashCache},
};
use regtest_client::{RegtestClient, RegtestConfig, Unspent};
use serde_json::json;

pub const PREV_TXID: &str = "1f93459a31c5cdaf86daff892b29343aca2e85f7bd27761ab155df23423b8223";
pub const FAUCET_TXID: &str = "3dae1de0ab840ebc5f1b27ddc275acf52e7c86117218157986504ac8eaac98e1";

pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

/// Client pointed at a mock server, with short polls so retries stay fast.
pub fn mock_client(server_url: &str) -> RegtestClient {
    let config = RegtestConfig {
        api_url: server_url.to_string(),
        faucet_attempts: 2,
        poll_interval_ms: 1,
        request_timeout_secs: 5,
        ..RegtestConfig::default()
    };
    RegtestClient::new(config).expect("client should build")
}

/// Unsigned transaction spending a made-up outpoint into `outputs`.
pub fn sample_tx(outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_str(PREV_TXID).unwrap(), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs,
    }
}

pub fn pay(address: &Address, sats: u64) -> TxOut {
    TxOut {
        value: Amount::from_sat(sats),
        script_pubkey: address.script_pubkey(),
    }
}

/// Explorer JSON for `tx`, as served by `/t/{txid}/json`.
pub fn fetched_json(tx: &Transaction) -> String {
    let outs: Vec<_> = tx
        .output
        .iter()
        .map(|out| {
            json!({
                "value": out.value.to_sat(),
                "script": out.script_pubkey.to_hex_string(),
            })
        })
        .collect();

    json!({
        "txId": tx.compute_txid().to_string(),
        "txHex": serialize_hex(tx),
        "vsize": tx.vsize(),
        "version": tx.version.0,
        "locktime": tx.lock_time.to_consensus_u32(),
        "ins": [{ "txId": PREV_TXID, "vout": 0, "script": "", "sequence": 0xffffffffu32 }],
        "outs": outs,
    })
    .to_string()
}

/// A key able to spend P2PKH outputs on regtest.
pub struct TestKey {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl TestKey {
    pub fn random() -> Self {
        let secp = Secp256k1::new();
        let private_key = PrivateKey::generate(bitcoin::Network::Regtest);
        let public_key = private_key.public_key(&secp);
        Self {
            private_key,
            public_key,
        }
    }

    pub fn p2pkh(&self) -> Address {
        Address::p2pkh(self.public_key.pubkey_hash(), bitcoin::Network::Regtest)
    }
}

/// Spends P2PKH `unspents` locked to `key` into a single output.
pub fn spend_p2pkh(key: &TestKey, unspents: &[Unspent], output: TxOut) -> Transaction {
    let secp = Secp256k1::new();
    let prev_script = key.p2pkh().script_pubkey();

    let mut tx = Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: unspents
            .iter()
            .map(|u| TxIn {
                previous_output: OutPoint::new(u.tx_id, u.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ZERO,
                witness: Witness::new(),
            })
            .collect(),
        output: vec![output],
    };

    let script_sigs: Vec<ScriptBuf> = {
        let cache = SighashCache::new(&tx);
        (0..tx.input.len())
            .map(|i| {
                let sighash = cache
                    .legacy_signature_hash(i, &prev_script, EcdsaSighashType::All.to_u32())
                    .expect("input index in range");
                let msg = Message::from_digest(sighash.to_byte_array());
                let signature = bitcoin::ecdsa::Signature {
                    signature: secp.sign_ecdsa(&msg, &key.private_key.inner),
                    sighash_type: EcdsaSighashType::All,
                };
                let push = PushBytesBuf::try_from(signature.to_vec()).expect("signature fits");
                ScriptBuf::builder()
                    .push_slice(push)
                    .push_key(&key.public_key)
                    .into_script()
            })
            .collect()
    };

    for (input, script_sig) in tx.input.iter_mut().zip(script_sigs) {
        input.script_sig = script_sig;
    }
    tx
}
