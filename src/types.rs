//! Data model for transaction planning and signing

use crate::constants::{SEQUENCE_FINAL, SIGHASH_ALL};
use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hash type: 256-bit hash, kept in the byte order it is serialized in
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Amount in satoshis
///
/// Signed so fee and change arithmetic stays in one type. Planning rejects
/// negative values and anything above `MAX_MONEY` with `InvalidAmount`.
pub type Amount = i64;

/// OutPoint: previous transaction hash, output index and the sequence of the spending input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
    pub sequence: u32,
}

impl OutPoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self {
            hash,
            index,
            sequence: SEQUENCE_FINAL,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Build an outpoint from a txid in display (byte-reversed) hex.
    pub fn from_txid_hex(txid: &str, index: u32) -> crate::error::Result<Self> {
        let mut bytes = hex::decode(txid)
            .map_err(|e| crate::error::SigningError::Serialization(format!("txid hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(crate::error::SigningError::Serialization(format!(
                "txid must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        bytes.reverse();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self::new(hash, index))
    }
}

/// Which build/sign path a UTXO takes.
///
/// `Plain` leaves the decision to the shape of the locking script; the other
/// variants pin it and are checked against that shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UtxoVariant {
    #[default]
    Plain,
    P2wpkh,
    P2shP2wpkh,
    P2wsh,
    Taproot,
    Brc20Transfer,
    NftInscription,
}

/// A spendable output owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub out_point: OutPoint,
    pub script: ByteString,
    pub amount: Amount,
    /// Script revealed when spending, e.g. the inscription leaf of a commit output
    pub spending_script: Option<ByteString>,
    pub variant: UtxoVariant,
}

impl Utxo {
    pub fn new(out_point: OutPoint, script: ByteString, amount: Amount) -> Self {
        Self {
            out_point,
            script,
            amount,
            spending_script: None,
            variant: UtxoVariant::Plain,
        }
    }

    pub fn with_variant(mut self, variant: UtxoVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_spending_script(mut self, script: ByteString) -> Self {
        self.spending_script = Some(script);
        self
    }
}

/// Transaction Input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: u32,
    pub witness: Vec<ByteString>,
}

/// Transaction Output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: Amount,
    pub script_pubkey: ByteString,
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

/// Resolved spend produced by the builder
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionPlan {
    pub utxos: Vec<Utxo>,
    pub amount: Amount,
    pub available_amount: Amount,
    pub fee: Amount,
    pub change: Amount,
    pub output_op_return: Option<ByteString>,
    pub branch_id: Option<ByteString>,
    pub error: ErrorCode,
}

impl TransactionPlan {
    pub fn failed(error: ErrorCode) -> Self {
        Self {
            error,
            ..Default::default()
        }
    }
}

/// Pre-computed plan carried on a request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlanState {
    #[default]
    Pending,
    Resolved(TransactionPlan),
}

/// Full signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInput {
    pub hash_type: u32,
    pub amount: Amount,
    /// Fee rate in satoshis per virtual byte
    pub byte_fee: Amount,
    pub to_address: String,
    pub change_address: String,
    pub use_max_amount: bool,
    /// Unordered pool of 32-byte secret keys
    pub private_keys: Vec<ByteString>,
    /// Redeem and witness scripts keyed by hex HASH160 of the script
    pub scripts: HashMap<String, ByteString>,
    pub utxos: Vec<Utxo>,
    pub output_op_return: Option<ByteString>,
    /// Explicit outputs; when present they replace destination and change
    pub outputs: Vec<TransactionOutput>,
    pub version: Option<i32>,
    pub lock_time: u32,
    pub plan: PlanState,
}

impl Default for SigningInput {
    fn default() -> Self {
        Self {
            hash_type: SIGHASH_ALL,
            amount: 0,
            byte_fee: 1,
            to_address: String::new(),
            change_address: String::new(),
            use_max_amount: false,
            private_keys: Vec::new(),
            scripts: HashMap::new(),
            utxos: Vec::new(),
            output_op_return: None,
            outputs: Vec::new(),
            version: None,
            lock_time: 0,
            plan: PlanState::Pending,
        }
    }
}

/// Result of a signing request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SigningOutput {
    pub encoded: ByteString,
    /// Byte-reversed double SHA-256 of the legacy serialization, hex
    pub transaction_id: String,
    pub error: ErrorCode,
    pub error_message: String,
    pub transaction: Option<Transaction>,
}

/// Serialized sizes of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedTxSize {
    pub segwit: u64,
    pub non_segwit: u64,
    pub virtual_bytes: u64,
}
