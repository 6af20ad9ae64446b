//! Taproot key tweaking and script-path commitments (BIP341)

use crate::constants::TAPROOT_LEAF_TAPSCRIPT;
use crate::crypto::tagged_hash;
use crate::error::{Result, SigningError};
use crate::transaction::write_varint;
use crate::types::{ByteString, Hash};
use secp256k1::{Keypair, Parity, Scalar, Secp256k1, Verification, XOnlyPublicKey};

/// TapLeaf hash: H_TapLeaf(leaf_version || compact_size(|script|) || script)
pub fn tap_leaf_hash(script: &[u8], leaf_version: u8) -> Hash {
    let mut data = Vec::with_capacity(script.len() + 10);
    data.push(leaf_version);
    write_varint(&mut data, script.len() as u64);
    data.extend_from_slice(script);
    tagged_hash("TapLeaf", &data)
}

/// TapTweak hash: H_TapTweak(internal_key || merkle_root), merkle root omitted for key-only outputs
pub fn tap_tweak_hash(internal_key: &XOnlyPublicKey, merkle_root: Option<&Hash>) -> Hash {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&internal_key.serialize());
    if let Some(root) = merkle_root {
        data.extend_from_slice(root);
    }
    tagged_hash("TapTweak", &data)
}

fn tweak_scalar(internal_key: &XOnlyPublicKey, merkle_root: Option<&Hash>) -> Result<Scalar> {
    Scalar::from_be_bytes(tap_tweak_hash(internal_key, merkle_root))
        .map_err(|_| SigningError::Signing("taproot tweak out of range".to_string()))
}

/// Output key Q = P + t·G, with its parity.
pub fn tweak_public_key<C: Verification>(
    secp: &Secp256k1<C>,
    internal_key: &XOnlyPublicKey,
    merkle_root: Option<&Hash>,
) -> Result<(XOnlyPublicKey, Parity)> {
    let tweak = tweak_scalar(internal_key, merkle_root)?;
    internal_key
        .add_tweak(secp, &tweak)
        .map_err(|e| SigningError::Signing(format!("taproot tweak: {}", e)))
}

/// Keypair for a key-path spend of the output committing to `merkle_root`.
pub fn tweak_keypair<C: Verification>(
    secp: &Secp256k1<C>,
    keypair: &Keypair,
    merkle_root: Option<&Hash>,
) -> Result<Keypair> {
    let (internal_key, _) = keypair.x_only_public_key();
    let tweak = tweak_scalar(&internal_key, merkle_root)?;
    keypair
        .add_xonly_tweak(secp, &tweak)
        .map_err(|e| SigningError::Signing(format!("taproot tweak: {}", e)))
}

/// Control block for a single-leaf tree: (leaf_version | parity) || internal_key
pub fn control_block(leaf_version: u8, output_parity: Parity, internal_key: &XOnlyPublicKey) -> ByteString {
    let mut block = Vec::with_capacity(33);
    block.push(leaf_version | output_parity.to_u8());
    block.extend_from_slice(&internal_key.serialize());
    block
}

/// A taproot output committing to exactly one tapscript leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleLeafTree {
    pub leaf_script: ByteString,
    pub internal_key: XOnlyPublicKey,
    pub output_key: XOnlyPublicKey,
    pub output_parity: Parity,
}

impl SingleLeafTree {
    pub fn new<C: Verification>(
        secp: &Secp256k1<C>,
        internal_key: XOnlyPublicKey,
        leaf_script: ByteString,
    ) -> Result<Self> {
        // A single leaf is its own merkle root
        let root = tap_leaf_hash(&leaf_script, TAPROOT_LEAF_TAPSCRIPT);
        let (output_key, output_parity) = tweak_public_key(secp, &internal_key, Some(&root))?;
        Ok(Self {
            leaf_script,
            internal_key,
            output_key,
            output_parity,
        })
    }

    pub fn leaf_hash(&self) -> Hash {
        tap_leaf_hash(&self.leaf_script, TAPROOT_LEAF_TAPSCRIPT)
    }

    pub fn control_block(&self) -> ByteString {
        control_block(TAPROOT_LEAF_TAPSCRIPT, self.output_parity, &self.internal_key)
    }

    /// OP_1 <output_key>
    pub fn script_pubkey(&self) -> ByteString {
        crate::script::build_pay_to_taproot(&self.output_key.serialize())
    }
}
