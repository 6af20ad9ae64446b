//! Address decoding and encoding
//!
//! Base58Check (legacy P2PKH/P2SH) and bech32/bech32m (segwit v0 and taproot)
//! addresses, interpreted under a chain's [`ChainParams`].

use crate::config::ChainParams;
use crate::crypto::hash160;
use crate::error::{Result, SigningError};
use crate::script;
use crate::types::ByteString;
use bech32::{segwit, Hrp};

/// A decoded address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    PayToPublicKeyHash([u8; 20]),
    PayToScriptHash([u8; 20]),
    /// Witness program of any version; v0 is P2WPKH/P2WSH, v1 with 32 bytes is taproot
    Segwit { version: u8, program: ByteString },
}

impl Address {
    /// Decode `s` as an address of the chain described by `params`.
    pub fn parse(s: &str, params: &ChainParams) -> Result<Self> {
        if s.is_empty() {
            return Err(SigningError::InvalidAddress("empty address".to_string()));
        }
        if let Some(address) = Self::parse_segwit(s, params)? {
            return Ok(address);
        }
        Self::parse_base58(s, params)
    }

    fn parse_segwit(s: &str, params: &ChainParams) -> Result<Option<Self>> {
        let expected = match &params.hrp {
            Some(hrp) => hrp,
            None => return Ok(None),
        };
        let prefix = format!("{}1", expected);
        if !s.to_lowercase().starts_with(&prefix) {
            return Ok(None);
        }
        let (hrp, version, program) = segwit::decode(s)
            .map_err(|e| SigningError::InvalidAddress(format!("{}: {}", s, e)))?;
        if hrp.to_lowercase() != expected.to_lowercase() {
            return Err(SigningError::InvalidAddress(format!("{}: wrong network", s)));
        }
        let version = version.to_u8();
        match (version, program.len()) {
            (0, 20) | (0, 32) => {}
            (0, len) => {
                return Err(SigningError::InvalidAddress(format!(
                    "{}: invalid v0 program length {}",
                    s, len
                )))
            }
            (1..=16, 2..=40) => {}
            (_, len) => {
                return Err(SigningError::InvalidAddress(format!(
                    "{}: invalid witness program length {}",
                    s, len
                )))
            }
        }
        Ok(Some(Address::Segwit { version, program }))
    }

    fn parse_base58(s: &str, params: &ChainParams) -> Result<Self> {
        let decoded = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| SigningError::InvalidAddress(format!("{}: {}", s, e)))?;
        // version byte + 20-byte hash
        if decoded.len() != 21 {
            return Err(SigningError::InvalidAddress(format!(
                "{}: invalid payload length {}",
                s,
                decoded.len()
            )));
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&decoded[1..]);
        match decoded[0] {
            v if v == params.p2pkh_prefix => Ok(Address::PayToPublicKeyHash(hash)),
            v if v == params.p2sh_prefix => Ok(Address::PayToScriptHash(hash)),
            v => Err(SigningError::InvalidAddress(format!(
                "{}: unknown version byte {:#04x}",
                s, v
            ))),
        }
    }

    /// Locking script paying to this address
    pub fn script_pubkey(&self) -> ByteString {
        match self {
            Address::PayToPublicKeyHash(hash) => script::build_pay_to_public_key_hash(hash),
            Address::PayToScriptHash(hash) => script::build_pay_to_script_hash(hash),
            Address::Segwit { version, program } => script::build_witness_program(*version, program),
        }
    }

    /// Encode for the chain described by `params`.
    pub fn encode(&self, params: &ChainParams) -> Result<String> {
        match self {
            Address::PayToPublicKeyHash(hash) => Ok(base58_check(params.p2pkh_prefix, hash)),
            Address::PayToScriptHash(hash) => Ok(base58_check(params.p2sh_prefix, hash)),
            Address::Segwit { version, program } => {
                let hrp = params.hrp.as_deref().ok_or_else(|| {
                    SigningError::InvalidAddress("chain has no segwit addresses".to_string())
                })?;
                let hrp = Hrp::parse(hrp)
                    .map_err(|e| SigningError::InvalidAddress(format!("hrp {}: {}", hrp, e)))?;
                let encoded = match version {
                    0 => segwit::encode_v0(hrp, program),
                    1 => segwit::encode_v1(hrp, program),
                    v => {
                        return Err(SigningError::InvalidAddress(format!(
                            "witness version {} not supported for encoding",
                            v
                        )))
                    }
                };
                encoded.map_err(|e| SigningError::InvalidAddress(e.to_string()))
            }
        }
    }

    /// P2PKH address of a serialized public key
    pub fn p2pkh(pubkey: &[u8]) -> Self {
        Address::PayToPublicKeyHash(hash160(pubkey))
    }

    /// P2WPKH address of a compressed public key
    pub fn p2wpkh(pubkey: &[u8]) -> Self {
        Address::Segwit {
            version: 0,
            program: hash160(pubkey).to_vec(),
        }
    }

    /// Taproot address of a 32-byte output key
    pub fn p2tr(output_key: &[u8; 32]) -> Self {
        Address::Segwit {
            version: 1,
            program: output_key.to_vec(),
        }
    }
}

fn base58_check(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    bs58::encode(payload).with_check().into_string()
}

/// Locking script for an address string; fails with `InvalidAddress` when it does not decode.
pub fn lock_script_for_address(address: &str, params: &ChainParams) -> Result<ByteString> {
    Ok(Address::parse(address, params)?.script_pubkey())
}
