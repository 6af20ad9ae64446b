//! Fee calculation
//!
//! Linear size models used for coin selection, and the vsize-based fee used
//! once a candidate transaction has been sized by a dry-run signing pass.

use crate::constants::WITNESS_SCALE_FACTOR;
use crate::types::Amount;

/// Fee model: inputs × outputs × byte fee → satoshis
pub trait FeeCalculator {
    fn calculate(&self, inputs: usize, outputs: usize, byte_fee: Amount) -> Amount;

    /// Cost of adding one input. Inputs worth less than this are dust.
    fn calculate_single_input(&self, byte_fee: Amount) -> Amount;
}

/// Per-input, per-output and fixed costs, expressed in weight units (4 × bytes)
/// so that fractional byte costs stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearFeeCalculator {
    pub input_weight: u64,
    pub output_weight: u64,
    pub overhead_weight: u64,
}

impl LinearFeeCalculator {
    /// Pre-segwit P2PKH: 148 bytes per input, 34 per output, 10 fixed
    pub const LEGACY: LinearFeeCalculator = LinearFeeCalculator {
        input_weight: 148 * WITNESS_SCALE_FACTOR,
        output_weight: 34 * WITNESS_SCALE_FACTOR,
        overhead_weight: 10 * WITNESS_SCALE_FACTOR,
    };

    /// P2WPKH: 101.25 vbytes per input, 31 per output, 10 fixed
    pub const SEGWIT: LinearFeeCalculator = LinearFeeCalculator {
        input_weight: 405,
        output_weight: 31 * WITNESS_SCALE_FACTOR,
        overhead_weight: 10 * WITNESS_SCALE_FACTOR,
    };

    /// Estimated virtual size in bytes, rounded up
    ///
    /// Formula: vsize = ⌈(in × w_in + out × w_out + w_fixed) / 4⌉
    pub fn virtual_size(&self, inputs: usize, outputs: usize) -> u64 {
        let weight = inputs as u64 * self.input_weight
            + outputs as u64 * self.output_weight
            + self.overhead_weight;
        weight.div_ceil(WITNESS_SCALE_FACTOR)
    }
}

impl Default for LinearFeeCalculator {
    fn default() -> Self {
        Self::SEGWIT
    }
}

impl FeeCalculator for LinearFeeCalculator {
    fn calculate(&self, inputs: usize, outputs: usize, byte_fee: Amount) -> Amount {
        fee_for_virtual_size(self.virtual_size(inputs, outputs), byte_fee)
    }

    fn calculate_single_input(&self, byte_fee: Amount) -> Amount {
        // ⌈w_in × byte_fee / 4⌉, not ⌈w_in / 4⌉ × byte_fee
        let weight = self.input_weight as i128 * byte_fee as i128;
        let scale = WITNESS_SCALE_FACTOR as i128;
        ((weight + scale - 1).div_euclid(scale)) as Amount
    }
}

/// Fee = byte_fee × vsize
pub fn fee_for_virtual_size(virtual_size: u64, byte_fee: Amount) -> Amount {
    (virtual_size as Amount).saturating_mul(byte_fee)
}
