//! # UTXO-Signer
//!
//! Transaction planning and signing for Bitcoin and its script-compatible forks.
//!
//! Given spendable outputs, a destination and private keys, this crate selects
//! inputs, computes the fee from the exact size of the resulting transaction,
//! signs every input under the digest algorithm its script requires (legacy,
//! BIP143 or BIP341) and serializes the result in legacy or segwit wire format.
//!
//! ## Architecture
//!
//! - `script`, `address`, `inscription`: locking script construction and recognition
//! - `transaction`, `segwit`: wire format and sizes
//! - `sighash`, `taproot`, `crypto`: digests, key tweaks and signatures
//! - `fee`, `builder`: coin selection and fee planning
//! - `signer`: per-input signing and assembly
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: planning and signing are deterministic and free of I/O
//! 2. **Explicit Configuration**: chain constants travel in a [`ChainParams`] value
//! 3. **Exact Version Pinning**: consensus-critical cryptography is pinned to exact versions
//! 4. **All or Nothing**: a request yields a fully signed transaction or one error code
//!
//! ## Usage
//!
//! ```rust
//! use utxo_signer::UtxoSigner;
//! use utxo_signer::types::*;
//!
//! let signer = UtxoSigner::bitcoin();
//! let input = SigningInput {
//!     amount: 10_000,
//!     to_address: "1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx".to_string(),
//!     change_address: "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU".to_string(),
//!     ..Default::default()
//! };
//! let plan = signer.plan(&input);
//! assert_eq!(plan.error, utxo_signer::ErrorCode::MissingInputUtxos);
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod config;
pub mod crypto;
pub mod script;
pub mod address;
pub mod inscription;
pub mod transaction;
pub mod segwit;
pub mod sighash;
pub mod taproot;
pub mod fee;
pub mod builder;
pub mod signer;

// Re-export commonly used types
pub use types::*;
pub use config::{ChainId, ChainParams};
pub use error::{ErrorCode, Result, SigningError};
pub use builder::TransactionBuilder;
pub use signer::TransactionSigner;

/// Planning and signing entry point bound to one chain's parameters
///
/// # Examples
///
/// ```
/// use utxo_signer::UtxoSigner;
/// use utxo_signer::types::*;
/// use utxo_signer::ErrorCode;
///
/// let signer = UtxoSigner::bitcoin();
/// let script = hex::decode("001479091972186c449eb1ded22b78e40d009bdf0089").unwrap();
/// let input = SigningInput {
///     amount: 1_000_000,
///     to_address: "bc1q0yy3juscd3zfavw76g4h3eqdqzda7qyf58rj4m".to_string(),
///     change_address: "bc1qhkfq3zahaqkkzx5mjnamwjsfpq2jk7z00ppggv".to_string(),
///     utxos: vec![Utxo::new(OutPoint::new([1; 32], 0), script, 2_000_000)],
///     ..Default::default()
/// };
///
/// // Planning needs no keys
/// let plan = signer.plan(&input);
/// assert_eq!(plan.error, ErrorCode::Ok);
/// assert_eq!(plan.amount + plan.fee + plan.change, plan.available_amount);
///
/// // Signing does
/// let output = signer.sign(&input);
/// assert_eq!(output.error, ErrorCode::MissingPrivateKey);
/// assert!(output.encoded.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct UtxoSigner {
    params: ChainParams,
}

impl UtxoSigner {
    pub fn new(params: ChainParams) -> Self {
        Self { params }
    }

    /// Signer for Bitcoin mainnet
    pub fn bitcoin() -> Self {
        Self::new(ChainParams::bitcoin())
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Select inputs and compute fee and change. Never needs private keys.
    pub fn plan(&self, input: &SigningInput) -> TransactionPlan {
        TransactionBuilder::plan(input, &self.params)
    }

    /// Sign a request, returning the transaction or the first error.
    pub fn sign_transaction(&self, input: &SigningInput) -> Result<Transaction> {
        TransactionSigner::sign(input, &self.params)
    }

    /// Sign a request and encode the result for broadcast.
    ///
    /// # Examples
    ///
    /// ```
    /// use utxo_signer::UtxoSigner;
    /// use utxo_signer::types::*;
    /// use utxo_signer::ErrorCode;
    ///
    /// let signer = UtxoSigner::bitcoin();
    /// let key = hex::decode("619c335025c7f4012e556c2a58b2506e30b8511b53ade95ea316fd8c3286feb9").unwrap();
    /// let script = hex::decode("00141d0f172a0ecb48aee1be1f2687d2963ae33f71a1").unwrap();
    /// let input = SigningInput {
    ///     amount: 1_000_000,
    ///     to_address: "1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx".to_string(),
    ///     change_address: "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU".to_string(),
    ///     private_keys: vec![key],
    ///     utxos: vec![Utxo::new(OutPoint::new([1; 32], 0), script, 2_000_000)],
    ///     ..Default::default()
    /// };
    ///
    /// let output = signer.sign(&input);
    /// assert_eq!(output.error, ErrorCode::Ok);
    /// assert_eq!(output.transaction_id.len(), 64);
    /// // Segwit marker and flag follow the version
    /// assert_eq!(&output.encoded[4..6], &[0x00, 0x01]);
    /// ```
    pub fn sign(&self, input: &SigningInput) -> SigningOutput {
        match self.sign_transaction(input) {
            Ok(tx) => SigningOutput {
                encoded: transaction::encode_for_broadcast(&tx),
                transaction_id: transaction::txid(&tx),
                error: ErrorCode::Ok,
                error_message: String::new(),
                transaction: Some(tx),
            },
            Err(e) => SigningOutput {
                error: e.code(),
                error_message: e.to_string(),
                ..Default::default()
            },
        }
    }

    /// Sizes the signed transaction will have, measured with placeholder signatures.
    pub fn estimate_size(&self, input: &SigningInput) -> Result<EncodedTxSize> {
        let plan = TransactionSigner::resolve_plan(input, &self.params)?;
        let tx = TransactionSigner::estimate(input, &plan, &self.params)?;
        Ok(transaction::encoded_size(&tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_reports_error_code_and_message() {
        let signer = UtxoSigner::bitcoin();
        let output = signer.sign(&SigningInput::default());
        assert_eq!(output.error, ErrorCode::MissingInputUtxos);
        assert_eq!(output.error_message, "Missing input UTXOs");
        assert!(output.transaction.is_none());
        assert!(output.transaction_id.is_empty());
    }

    #[test]
    fn test_params_are_kept() {
        let signer = UtxoSigner::new(ChainParams::litecoin());
        assert_eq!(signer.params().chain, ChainId::Litecoin);
        assert_eq!(UtxoSigner::default().params().chain, ChainId::Bitcoin);
    }

    #[test]
    fn test_estimate_size_bounds_signed_size() {
        let signer = UtxoSigner::bitcoin();
        let script = hex::decode("00141d0f172a0ecb48aee1be1f2687d2963ae33f71a1").unwrap();
        let mut input = SigningInput {
            amount: 1_000_000,
            to_address: "bc1q0yy3juscd3zfavw76g4h3eqdqzda7qyf58rj4m".to_string(),
            change_address: "bc1qhkfq3zahaqkkzx5mjnamwjsfpq2jk7z00ppggv".to_string(),
            utxos: vec![Utxo::new(OutPoint::new([1; 32], 0), script, 2_000_000)],
            ..Default::default()
        };

        // No keys needed to estimate
        let estimate = signer.estimate_size(&input).unwrap();

        input.private_keys =
            vec![hex::decode("619c335025c7f4012e556c2a58b2506e30b8511b53ade95ea316fd8c3286feb9").unwrap()];
        let signed = transaction::encoded_size(&signer.sign_transaction(&input).unwrap());
        assert_eq!(estimate.non_segwit, signed.non_segwit);
        assert!(estimate.segwit >= signed.segwit);
        assert!(estimate.segwit - signed.segwit <= 2);
        assert!(estimate.virtual_bytes >= signed.virtual_bytes);

        input.utxos.clear();
        assert!(matches!(signer.estimate_size(&input), Err(SigningError::MissingInputUtxos)));
    }
}
