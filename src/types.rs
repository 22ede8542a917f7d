use bitcoin::{Address, Transaction, Txid, consensus::encode::deserialize_hex};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An output paying an address, as listed by the explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unspent {
    /// Confirmation height; `-1` or absent while the output sits in the mempool
    #[serde(default)]
    pub height: Option<i64>,
    pub tx_id: Txid,
    pub vout: u32,
    pub value: u64, // satoshis
}

/// Explorer view of a transaction, including its raw serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedTransaction {
    pub tx_id: Txid,
    pub tx_hex: String,
    #[serde(default)]
    pub vsize: Option<u64>,
    #[serde(default)]
    pub version: Option<i32>,
    #[serde(default)]
    pub locktime: Option<u32>,
    #[serde(default)]
    pub ins: Vec<FetchedInput>,
    #[serde(default)]
    pub outs: Vec<FetchedOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedInput {
    pub tx_id: Txid,
    pub vout: u32,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub sequence: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedOutput {
    pub value: u64, // satoshis
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl FetchedTransaction {
    /// Decodes `tx_hex` into a consensus transaction.
    pub fn transaction(&self) -> Result<Transaction> {
        Ok(deserialize_hex(&self.tx_hex)?)
    }
}

/// Expected output of a broadcast transaction.
///
/// `address` and `value` are only checked when set.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub tx_id: Txid,
    pub address: Option<Address>,
    pub vout: u32,
    pub value: Option<u64>,
}

impl Verification {
    pub fn new(tx_id: Txid, address: Address, vout: u32, value: u64) -> Self {
        Self {
            tx_id,
            address: Some(address),
            vout,
            value: Some(value),
        }
    }

    /// Checks only that output `vout` exists.
    pub fn output(tx_id: Txid, vout: u32) -> Self {
        Self {
            tx_id,
            address: None,
            vout,
            value: None,
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = Some(value);
        self
    }
}
