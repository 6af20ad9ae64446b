//! Transaction signing
//!
//! Each planned UTXO is resolved to a [`SpendPath`] from its locking script
//! (and, for script-hash outputs, the caller's scripts map). The path decides
//! which digest is computed, which key signs it and how the unlocking data is
//! laid out. Any failure aborts the whole transaction.
//!
//! In estimation mode no keys are needed: signatures are replaced by
//! placeholders of the maximum encoded length so the result has the size of
//! the final transaction.

use crate::builder::{build_outputs, TransactionBuilder};
use crate::config::ChainParams;
use crate::constants::*;
use crate::crypto::{hash160, ripemd160, sha256, KeyStore, SigningKey};
use crate::error::{Result, SigningError};
use crate::inscription::inscription_commitment;
use crate::script::{build_pay_to_public_key_hash, classify, push_data, ScriptClass};
use crate::sighash::{SigHashType, SighashCache};
use crate::taproot::{tweak_keypair, tweak_public_key, SingleLeafTree};
use crate::transaction::{encoded_size, txid};
use crate::types::*;
use secp256k1::Keypair;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{info, trace};

/// Whether signatures are real or size-accurate placeholders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    Sign,
    Estimate,
}

/// Digest algorithm family for ECDSA signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SigVersion {
    Base,
    WitnessV0,
}

/// How a UTXO is unlocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendPath {
    /// P2PK, P2PKH or bare multisig; the stack goes into scriptSig
    Legacy(ScriptClass),
    /// P2SH wrapping a P2PK, P2PKH or multisig redeem script
    ScriptHash {
        redeem_script: ByteString,
        class: ScriptClass,
    },
    /// P2WPKH; `redeem_script` is the witness program when nested in P2SH
    WitnessKeyHash {
        hash: [u8; 20],
        redeem_script: Option<ByteString>,
    },
    /// P2WSH; `redeem_script` is the witness program when nested in P2SH
    WitnessScriptHash {
        witness_script: ByteString,
        class: ScriptClass,
        redeem_script: Option<ByteString>,
    },
    TaprootKey([u8; 32]),
    /// Script-path reveal of an inscription leaf
    TaprootScript(SingleLeafTree),
}

/// Work out how `utxo` is spent.
pub fn resolve_spend_path(utxo: &Utxo, scripts: &HashMap<String, ByteString>) -> Result<SpendPath> {
    let path = match utxo.variant {
        UtxoVariant::Brc20Transfer | UtxoVariant::NftInscription => resolve_reveal(utxo)?,
        _ => {
            let class = classify(&utxo.script).ok_or_else(|| {
                SigningError::InvalidOutputScript(format!(
                    "unrecognized locking script {}",
                    hex::encode(&utxo.script)
                ))
            })?;
            match &class {
                ScriptClass::PayToPublicKey(_)
                | ScriptClass::PayToPublicKeyHash(_)
                | ScriptClass::Multisig { .. } => SpendPath::Legacy(class.clone()),
                ScriptClass::PayToScriptHash(hash) => resolve_script_hash(hash, scripts)?,
                ScriptClass::PayToWitnessPublicKeyHash(hash) => SpendPath::WitnessKeyHash {
                    hash: *hash,
                    redeem_script: None,
                },
                ScriptClass::PayToWitnessScriptHash(program) => {
                    let (witness_script, class) = lookup_witness_script(program, scripts)?;
                    SpendPath::WitnessScriptHash {
                        witness_script,
                        class,
                        redeem_script: None,
                    }
                }
                ScriptClass::PayToTaproot(output_key) => SpendPath::TaprootKey(*output_key),
                ScriptClass::OpReturn(_) => {
                    return Err(SigningError::InvalidOutputScript(
                        "OP_RETURN outputs cannot be spent".to_string(),
                    ))
                }
            }
        }
    };
    check_variant(utxo.variant, &path)?;
    Ok(path)
}

fn resolve_reveal(utxo: &Utxo) -> Result<SpendPath> {
    let leaf = utxo.spending_script.as_ref().ok_or_else(|| {
        SigningError::InvalidRedeemScript("inscription UTXO without a leaf script".to_string())
    })?;
    let tree = inscription_commitment(leaf)?;
    if tree.script_pubkey() != utxo.script {
        return Err(SigningError::InvalidOutputScript(
            "locking script does not commit to the inscription leaf".to_string(),
        ));
    }
    Ok(SpendPath::TaprootScript(tree))
}

fn resolve_script_hash(hash: &[u8; 20], scripts: &HashMap<String, ByteString>) -> Result<SpendPath> {
    let key = hex::encode(hash);
    let redeem_script = scripts
        .get(&key)
        .ok_or_else(|| SigningError::InvalidRedeemScript(format!("no redeem script for {}", key)))?;
    if &hash160(redeem_script) != hash {
        return Err(SigningError::InvalidRedeemScript(format!(
            "redeem script does not hash to {}",
            key
        )));
    }
    let class = classify(redeem_script).ok_or_else(|| {
        SigningError::InvalidRedeemScript(format!(
            "unrecognized redeem script {}",
            hex::encode(redeem_script)
        ))
    })?;
    match class {
        ScriptClass::PayToWitnessPublicKeyHash(hash) => Ok(SpendPath::WitnessKeyHash {
            hash,
            redeem_script: Some(redeem_script.clone()),
        }),
        ScriptClass::PayToWitnessScriptHash(program) => {
            let (witness_script, class) = lookup_witness_script(&program, scripts)?;
            Ok(SpendPath::WitnessScriptHash {
                witness_script,
                class,
                redeem_script: Some(redeem_script.clone()),
            })
        }
        ScriptClass::PayToPublicKey(_)
        | ScriptClass::PayToPublicKeyHash(_)
        | ScriptClass::Multisig { .. } => Ok(SpendPath::ScriptHash {
            redeem_script: redeem_script.clone(),
            class,
        }),
        other => Err(SigningError::InvalidRedeemScript(format!(
            "unsupported redeem script class {:?}",
            other
        ))),
    }
}

/// Witness scripts are keyed by HASH160, i.e. RIPEMD160 of the 32-byte program.
fn lookup_witness_script(
    program: &[u8; 32],
    scripts: &HashMap<String, ByteString>,
) -> Result<(ByteString, ScriptClass)> {
    let key = hex::encode(ripemd160(program));
    let witness_script = scripts
        .get(&key)
        .ok_or_else(|| SigningError::InvalidRedeemScript(format!("no witness script for {}", key)))?;
    if &sha256(witness_script) != program {
        return Err(SigningError::InvalidRedeemScript(format!(
            "witness script does not hash to {}",
            hex::encode(program)
        )));
    }
    match classify(witness_script) {
        Some(
            class @ (ScriptClass::PayToPublicKey(_)
            | ScriptClass::PayToPublicKeyHash(_)
            | ScriptClass::Multisig { .. }),
        ) => Ok((witness_script.clone(), class)),
        _ => Err(SigningError::InvalidRedeemScript(format!(
            "unsupported witness script {}",
            hex::encode(witness_script)
        ))),
    }
}

fn check_variant(variant: UtxoVariant, path: &SpendPath) -> Result<()> {
    let consistent = match variant {
        UtxoVariant::Plain => true,
        UtxoVariant::P2wpkh => matches!(path, SpendPath::WitnessKeyHash { redeem_script: None, .. }),
        UtxoVariant::P2shP2wpkh => {
            matches!(path, SpendPath::WitnessKeyHash { redeem_script: Some(_), .. })
        }
        UtxoVariant::P2wsh => matches!(path, SpendPath::WitnessScriptHash { .. }),
        UtxoVariant::Taproot => matches!(path, SpendPath::TaprootKey(_)),
        UtxoVariant::Brc20Transfer | UtxoVariant::NftInscription => {
            matches!(path, SpendPath::TaprootScript(_))
        }
    };
    if consistent {
        Ok(())
    } else {
        Err(SigningError::InvalidOutputScript(format!(
            "{:?} UTXO does not match its locking script",
            variant
        )))
    }
}

/// Unlocking data of one input
#[derive(Debug, Default)]
struct Unlock {
    script_sig: ByteString,
    witness: Vec<ByteString>,
}

/// What an ECDSA signature commits to
#[derive(Clone, Copy)]
struct SigContext<'s> {
    index: usize,
    amount: Amount,
    script_code: &'s [u8],
    version: SigVersion,
}

pub struct TransactionSigner<'a> {
    input: &'a SigningInput,
    plan: &'a TransactionPlan,
    params: &'a ChainParams,
    keys: KeyStore,
    mode: SigningMode,
    hash_type: SigHashType,
}

impl<'a> TransactionSigner<'a> {
    pub fn new(
        input: &'a SigningInput,
        plan: &'a TransactionPlan,
        params: &'a ChainParams,
        mode: SigningMode,
    ) -> Result<Self> {
        let keys = KeyStore::new(&input.private_keys)?;
        let hash_type = match params.fork_id {
            Some(_) => SigHashType(input.hash_type | SIGHASH_FORK),
            None => SigHashType(input.hash_type),
        };
        Ok(Self {
            input,
            plan,
            params,
            keys,
            mode,
            hash_type,
        })
    }

    /// The plan a request is signed against: the pinned one, or a fresh one.
    /// A pinned plan that carries an error yields that error.
    pub fn resolve_plan<'i>(
        input: &'i SigningInput,
        params: &ChainParams,
    ) -> Result<Cow<'i, TransactionPlan>> {
        match &input.plan {
            PlanState::Pending => Ok(Cow::Owned(TransactionBuilder::try_plan(input, params)?)),
            PlanState::Resolved(plan) => match plan.error.into_error() {
                Some(err) => Err(err),
                None => Ok(Cow::Borrowed(plan)),
            },
        }
    }

    /// Plan (unless pinned), sign every input and return the signed transaction.
    pub fn sign(input: &SigningInput, params: &ChainParams) -> Result<Transaction> {
        let plan = Self::resolve_plan(input, params)?;
        let tx = TransactionSigner::new(input, &plan, params, SigningMode::Sign)?.build()?;
        let size = encoded_size(&tx);
        info!(
            txid = %txid(&tx),
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            vsize = size.virtual_bytes,
            "signed transaction"
        );
        Ok(tx)
    }

    /// Build `plan` with placeholder signatures. Keys are used only for their public forms.
    pub fn estimate(input: &SigningInput, plan: &TransactionPlan, params: &ChainParams) -> Result<Transaction> {
        TransactionSigner::new(input, plan, params, SigningMode::Estimate)?.build()
    }

    fn build(&self) -> Result<Transaction> {
        if self.plan.utxos.is_empty() {
            return Err(SigningError::MissingInputUtxos);
        }
        let paths = self
            .plan
            .utxos
            .iter()
            .map(|utxo| resolve_spend_path(utxo, &self.input.scripts))
            .collect::<Result<Vec<_>>>()?;
        let outputs = build_outputs(self.input, self.plan, self.params)?;

        let mut tx = Transaction {
            version: self.input.version.unwrap_or(self.params.default_version),
            inputs: self
                .plan
                .utxos
                .iter()
                .map(|utxo| TransactionInput {
                    prevout: utxo.out_point,
                    script_sig: Vec::new(),
                    sequence: utxo.out_point.sequence,
                    witness: Vec::new(),
                })
                .collect(),
            outputs,
            lock_time: self.input.lock_time,
        };
        let spent_outputs: Vec<TransactionOutput> = self
            .plan
            .utxos
            .iter()
            .map(|utxo| TransactionOutput {
                value: utxo.amount,
                script_pubkey: utxo.script.clone(),
            })
            .collect();

        let unlocks = {
            let cache = SighashCache::new(&tx, &spent_outputs)?;
            self.plan
                .utxos
                .iter()
                .zip(&paths)
                .enumerate()
                .map(|(index, (utxo, path))| self.unlock_input(&cache, index, utxo, path))
                .collect::<Result<Vec<_>>>()?
        };
        for (txin, unlock) in tx.inputs.iter_mut().zip(unlocks) {
            txin.script_sig = unlock.script_sig;
            txin.witness = unlock.witness;
        }
        Ok(tx)
    }

    fn unlock_input(
        &self,
        cache: &SighashCache,
        index: usize,
        utxo: &Utxo,
        path: &SpendPath,
    ) -> Result<Unlock> {
        trace!(index, ?path, mode = ?self.mode, "unlocking input");
        match path {
            SpendPath::Legacy(class) => {
                let ctx = SigContext {
                    index,
                    amount: utxo.amount,
                    script_code: &utxo.script,
                    version: SigVersion::Base,
                };
                let stack = self.script_stack(cache, ctx, class)?;
                Ok(Unlock {
                    script_sig: push_all(&stack),
                    witness: Vec::new(),
                })
            }
            SpendPath::ScriptHash {
                redeem_script,
                class,
            } => {
                let ctx = SigContext {
                    index,
                    amount: utxo.amount,
                    script_code: redeem_script,
                    version: SigVersion::Base,
                };
                let mut script_sig = push_all(&self.script_stack(cache, ctx, class)?);
                script_sig.extend_from_slice(&push_data(redeem_script));
                Ok(Unlock {
                    script_sig,
                    witness: Vec::new(),
                })
            }
            SpendPath::WitnessKeyHash {
                hash,
                redeem_script,
            } => {
                let script_code = build_pay_to_public_key_hash(hash);
                let ctx = SigContext {
                    index,
                    amount: utxo.amount,
                    script_code: &script_code,
                    version: SigVersion::WitnessV0,
                };
                Ok(Unlock {
                    script_sig: redeem_script.as_deref().map(push_data).unwrap_or_default(),
                    witness: self.key_hash_stack(cache, ctx, hash)?,
                })
            }
            SpendPath::WitnessScriptHash {
                witness_script,
                class,
                redeem_script,
            } => {
                let ctx = SigContext {
                    index,
                    amount: utxo.amount,
                    script_code: witness_script,
                    version: SigVersion::WitnessV0,
                };
                let mut witness = self.script_stack(cache, ctx, class)?;
                witness.push(witness_script.clone());
                Ok(Unlock {
                    script_sig: redeem_script.as_deref().map(push_data).unwrap_or_default(),
                    witness,
                })
            }
            SpendPath::TaprootKey(output_key) => self.taproot_key_spend(cache, index, output_key),
            SpendPath::TaprootScript(tree) => self.taproot_script_spend(cache, index, tree),
        }
    }

    /// Signature stack satisfying a P2PK, P2PKH or multisig script.
    fn script_stack(
        &self,
        cache: &SighashCache,
        ctx: SigContext,
        class: &ScriptClass,
    ) -> Result<Vec<ByteString>> {
        match class {
            ScriptClass::PayToPublicKey(pubkey) => {
                let key = self.keys.find_by_pubkey(pubkey);
                self.check_key(key.is_some(), || format!("public key {}", hex::encode(pubkey)))?;
                Ok(vec![self.ecdsa_signature(cache, ctx, key)?])
            }
            ScriptClass::PayToPublicKeyHash(hash) => self.key_hash_stack(cache, ctx, hash),
            ScriptClass::Multisig { required, keys } => self.multisig_stack(cache, ctx, *required, keys),
            other => Err(SigningError::InvalidRedeemScript(format!(
                "cannot sign for {:?}",
                other
            ))),
        }
    }

    /// [signature, public key] for a pubkey-hash commitment
    fn key_hash_stack(
        &self,
        cache: &SighashCache,
        ctx: SigContext,
        hash: &[u8; 20],
    ) -> Result<Vec<ByteString>> {
        let found = self.keys.find_by_pubkey_hash(hash);
        self.check_key(found.is_some(), || format!("pubkey hash {}", hex::encode(hash)))?;
        let (key, pubkey) = match found {
            Some((key, pubkey)) => (Some(key), pubkey),
            None => (None, vec![0u8; COMPRESSED_PUBKEY_LEN]),
        };
        Ok(vec![self.ecdsa_signature(cache, ctx, key)?, pubkey])
    }

    /// OP_0 dummy, then `required` signatures in the order their keys appear in the script.
    fn multisig_stack(
        &self,
        cache: &SighashCache,
        ctx: SigContext,
        required: usize,
        pubkeys: &[ByteString],
    ) -> Result<Vec<ByteString>> {
        let mut stack = vec![Vec::new()];
        for key in pubkeys.iter().filter_map(|pubkey| self.keys.find_by_pubkey(pubkey)) {
            if stack.len() > required {
                break;
            }
            stack.push(self.ecdsa_signature(cache, ctx, Some(key))?);
        }
        let signed = stack.len() - 1;
        if signed < required {
            self.check_key(false, || format!("{} of {} multisig keys", signed, required))?;
            stack.extend((signed..required).map(|_| vec![0u8; ESTIMATED_ECDSA_SIGNATURE_LEN]));
        }
        Ok(stack)
    }

    fn check_key(&self, found: bool, describe: impl FnOnce() -> String) -> Result<()> {
        if found || self.mode == SigningMode::Estimate {
            Ok(())
        } else {
            Err(SigningError::MissingPrivateKey(describe()))
        }
    }

    /// DER signature with the hash type byte appended
    fn ecdsa_signature(
        &self,
        cache: &SighashCache,
        ctx: SigContext,
        key: Option<&SigningKey>,
    ) -> Result<ByteString> {
        if self.mode == SigningMode::Estimate {
            return Ok(vec![0u8; ESTIMATED_ECDSA_SIGNATURE_LEN]);
        }
        let key = key.ok_or_else(|| SigningError::MissingPrivateKey(format!("input {}", ctx.index)))?;
        let digest = match (self.params.fork_id, ctx.version) {
            (Some(fork_id), _) => cache.segwit_v0_signature_hash(
                ctx.index,
                ctx.script_code,
                ctx.amount,
                self.hash_type,
                Some(fork_id),
            )?,
            (None, SigVersion::WitnessV0) => cache.segwit_v0_signature_hash(
                ctx.index,
                ctx.script_code,
                ctx.amount,
                self.hash_type,
                None,
            )?,
            (None, SigVersion::Base) => {
                cache.legacy_signature_hash(ctx.index, ctx.script_code, self.hash_type)?
            }
        };
        let mut sig = self.keys.sign_ecdsa(key, &digest);
        sig.push(self.hash_type.as_byte());
        Ok(sig)
    }

    /// ALL is signed as DEFAULT so taproot signatures stay 64 bytes.
    fn taproot_hash_type(&self) -> SigHashType {
        match self.input.hash_type {
            SIGHASH_DEFAULT | SIGHASH_ALL => SigHashType(SIGHASH_DEFAULT),
            other => SigHashType(other),
        }
    }

    fn schnorr_signature(
        &self,
        cache: &SighashCache,
        index: usize,
        keypair: Option<&Keypair>,
        leaf_hash: Option<&Hash>,
    ) -> Result<ByteString> {
        let hash_type = self.taproot_hash_type();
        let mut sig = match (self.mode, keypair) {
            (SigningMode::Sign, Some(keypair)) => {
                let digest = cache.taproot_signature_hash(index, hash_type, leaf_hash)?;
                self.keys.sign_schnorr(keypair, &digest)
            }
            (SigningMode::Sign, None) => {
                return Err(SigningError::MissingPrivateKey(format!("input {}", index)))
            }
            (SigningMode::Estimate, _) => vec![0u8; SCHNORR_SIGNATURE_LEN],
        };
        if hash_type.0 != SIGHASH_DEFAULT {
            sig.push(hash_type.as_byte());
        }
        Ok(sig)
    }

    fn taproot_key_spend(&self, cache: &SighashCache, index: usize, output_key: &[u8; 32]) -> Result<Unlock> {
        let secp = self.keys.context();
        let mut keypair = None;
        for key in self.keys.keys() {
            let (tweaked, _) = tweak_public_key(secp, &key.x_only(), None)?;
            if &tweaked.serialize() == output_key {
                keypair = Some(tweak_keypair(secp, &self.keys.keypair(key), None)?);
                break;
            }
        }
        self.check_key(keypair.is_some(), || format!("taproot output key {}", hex::encode(output_key)))?;
        Ok(Unlock {
            script_sig: Vec::new(),
            witness: vec![self.schnorr_signature(cache, index, keypair.as_ref(), None)?],
        })
    }

    /// [signature, leaf script, control block], signed by the untweaked leaf key
    fn taproot_script_spend(&self, cache: &SighashCache, index: usize, tree: &SingleLeafTree) -> Result<Unlock> {
        let internal_key = tree.internal_key.serialize();
        let key = self.keys.find_by_x_only(&internal_key);
        self.check_key(key.is_some(), || format!("inscription key {}", hex::encode(internal_key)))?;
        let keypair = key.map(|key| self.keys.keypair(key));
        let leaf_hash = tree.leaf_hash();
        let sig = self.schnorr_signature(cache, index, keypair.as_ref(), Some(&leaf_hash))?;
        Ok(Unlock {
            script_sig: Vec::new(),
            witness: vec![sig, tree.leaf_script.clone(), tree.control_block()],
        })
    }
}

fn push_all(stack: &[ByteString]) -> ByteString {
    stack.iter().flat_map(|item| push_data(item)).collect()
}
