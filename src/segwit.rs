//! SegWit weight and virtual size (BIP141)

use crate::constants::WITNESS_SCALE_FACTOR;
use crate::types::Transaction;

/// True when any input carries a non-empty witness stack
pub fn has_witness(tx: &Transaction) -> bool {
    tx.inputs.iter().any(|input| !input.witness.is_empty())
}

/// Weight = 3 × |legacy| + |segwit|
pub fn weight(non_segwit_size: u64, segwit_size: u64) -> u64 {
    non_segwit_size * (WITNESS_SCALE_FACTOR - 1) + segwit_size
}

/// Virtual size = ⌈weight / 4⌉
pub fn virtual_size(non_segwit_size: u64, segwit_size: u64) -> u64 {
    weight(non_segwit_size, segwit_size).div_ceil(WITNESS_SCALE_FACTOR)
}

/// Virtual size used for fee estimation: the legacy size when no input has a
/// witness, the BIP141 virtual size otherwise.
pub fn estimated_virtual_size(tx: &Transaction, non_segwit_size: u64, segwit_size: u64) -> u64 {
    if has_witness(tx) {
        virtual_size(non_segwit_size, segwit_size)
    } else {
        non_segwit_size
    }
}
