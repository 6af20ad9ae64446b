//! Hashing and signing primitives
//!
//! Thin layer over `sha2`, `ripemd`, `bitcoin_hashes` and `secp256k1`. The rest
//! of the crate only talks to curves and hash functions through here.

use crate::error::{Result, SigningError};
use crate::types::{ByteString, Hash};
use bitcoin_hashes::{sha256d, Hash as BitcoinHash, HashEngine};
use ripemd::Ripemd160;
use secp256k1::{All, Keypair, Message, PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};
use sha2::{Digest, Sha256};

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash {
    let result = Sha256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// SHA256(SHA256(x))
pub fn double_sha256(data: &[u8]) -> Hash {
    let mut hasher = sha256d::Hash::engine();
    hasher.input(data);
    let result = sha256d::Hash::from_engine(hasher);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// RIPEMD160(x)
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let result = Ripemd160::digest(data);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&result);
    hash
}

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&Sha256::digest(data))
}

/// BIP340 tagged hash: SHA256(SHA256(tag) || SHA256(tag) || x)
pub fn tagged_hash(tag: &str, data: &[u8]) -> Hash {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// A private key with its derived public forms.
#[derive(Debug, Clone)]
pub struct SigningKey {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl SigningKey {
    pub fn compressed(&self) -> [u8; 33] {
        self.public.serialize()
    }

    pub fn uncompressed(&self) -> [u8; 65] {
        self.public.serialize_uncompressed()
    }

    pub fn x_only(&self) -> XOnlyPublicKey {
        self.public.x_only_public_key().0
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.compressed())
    }
}

/// Unordered pool of signing keys, matched to scripts on demand.
pub struct KeyStore {
    secp: Secp256k1<All>,
    keys: Vec<SigningKey>,
}

impl KeyStore {
    pub fn new(private_keys: &[ByteString]) -> Result<Self> {
        let secp = Secp256k1::new();
        let mut keys = Vec::with_capacity(private_keys.len());
        for (i, bytes) in private_keys.iter().enumerate() {
            let secret = SecretKey::from_slice(bytes)
                .map_err(|e| SigningError::Signing(format!("private key {}: {}", i, e)))?;
            let public = PublicKey::from_secret_key(&secp, &secret);
            keys.push(SigningKey { secret, public });
        }
        Ok(Self { secp, keys })
    }

    pub fn context(&self) -> &Secp256k1<All> {
        &self.secp
    }

    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    /// Find the key whose compressed or uncompressed pubkey hashes to `hash`.
    /// Returns the key and the serialized pubkey that matched.
    pub fn find_by_pubkey_hash(&self, hash: &[u8; 20]) -> Option<(&SigningKey, ByteString)> {
        self.keys.iter().find_map(|key| {
            let compressed = key.compressed();
            if &hash160(&compressed) == hash {
                return Some((key, compressed.to_vec()));
            }
            let uncompressed = key.uncompressed();
            if &hash160(&uncompressed) == hash {
                return Some((key, uncompressed.to_vec()));
            }
            None
        })
    }

    /// Find the key matching a serialized (33 or 65 byte) public key.
    pub fn find_by_pubkey(&self, pubkey: &[u8]) -> Option<&SigningKey> {
        self.keys.iter().find(|key| {
            key.compressed().as_slice() == pubkey || key.uncompressed().as_slice() == pubkey
        })
    }

    pub fn find_by_x_only(&self, x_only: &[u8; 32]) -> Option<&SigningKey> {
        self.keys
            .iter()
            .find(|key| &key.x_only().serialize() == x_only)
    }

    /// ECDSA (RFC6979 nonce, low-S) signature over a digest, DER encoded.
    pub fn sign_ecdsa(&self, key: &SigningKey, digest: &Hash) -> ByteString {
        let msg = Message::from_digest(*digest);
        let sig = self.secp.sign_ecdsa(&msg, &key.secret);
        sig.serialize_der().to_vec()
    }

    /// BIP340 Schnorr signature with the given keypair (already tweaked when needed).
    pub fn sign_schnorr(&self, keypair: &Keypair, digest: &Hash) -> ByteString {
        let msg = Message::from_digest(*digest);
        let sig = self.secp.sign_schnorr_no_aux_rand(&msg, keypair);
        sig.as_ref().to_vec()
    }

    pub fn keypair(&self, key: &SigningKey) -> Keypair {
        Keypair::from_secret_key(&self.secp, &key.secret)
    }
}

/// Derive the compressed public key of a 32-byte secret.
pub fn public_key_from_secret(secret: &[u8]) -> Result<[u8; 33]> {
    let secp = Secp256k1::signing_only();
    let secret = SecretKey::from_slice(secret)
        .map_err(|e| SigningError::Signing(format!("private key: {}", e)))?;
    Ok(PublicKey::from_secret_key(&secp, &secret).serialize())
}
