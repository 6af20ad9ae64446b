//! Ordinals inscription envelopes (BRC20 transfers and NFTs)
//!
//! An inscription is committed to by a taproot output whose single tapscript
//! leaf is
//!
//! ```text
//! <x-only pubkey> OP_CHECKSIG
//! OP_0 OP_IF "ord" 01 <mime type> OP_0 <payload chunk>... OP_ENDIF
//! ```
//!
//! The envelope is never executed (it sits in a false branch); indexers read it
//! from the reveal transaction's witness.

use crate::constants::*;
use crate::error::{Result, SigningError};
use crate::script::{parse_instructions, push_data, Instruction};
use crate::taproot::SingleLeafTree;
use crate::types::ByteString;
use secp256k1::{Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

/// Length of a BRC20 ticker in characters
pub const BRC20_TICKER_LEN: usize = 4;

/// BRC20 JSON payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brc20Payload {
    #[serde(rename = "p")]
    pub protocol: String,
    #[serde(rename = "op")]
    pub operation: String,
    #[serde(rename = "tick")]
    pub ticker: String,
    #[serde(rename = "amt")]
    pub amount: String,
}

impl Brc20Payload {
    pub fn transfer(ticker: &str, amount: &str) -> Result<Self> {
        if ticker.chars().count() != BRC20_TICKER_LEN {
            return Err(SigningError::InvalidRedeemScript(format!(
                "BRC20 ticker must be {} characters, got {:?}",
                BRC20_TICKER_LEN, ticker
            )));
        }
        Ok(Self {
            protocol: "brc-20".to_string(),
            operation: "transfer".to_string(),
            ticker: ticker.to_string(),
            amount: amount.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<ByteString> {
        serde_json::to_vec(self).map_err(|e| SigningError::Serialization(e.to_string()))
    }
}

/// A parsed inscription leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inscription {
    pub public_key: [u8; 32],
    pub mime_type: ByteString,
    pub payload: ByteString,
}

fn x_only_bytes(pubkey: &[u8]) -> Result<[u8; 32]> {
    let bytes = match pubkey.len() {
        32 => pubkey,
        COMPRESSED_PUBKEY_LEN => &pubkey[1..],
        len => {
            return Err(SigningError::InvalidRedeemScript(format!(
                "inscription public key must be 32 or 33 bytes, got {}",
                len
            )))
        }
    };
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Leaf script for an arbitrary inscription.
pub fn build_ordinal_nft_inscription(mime_type: &[u8], payload: &[u8], pubkey: &[u8]) -> Result<ByteString> {
    let key = x_only_bytes(pubkey)?;
    let mut script = push_data(&key);
    script.push(OP_CHECKSIG);

    script.push(OP_0);
    script.push(OP_IF);
    script.extend_from_slice(&push_data(INSCRIPTION_PROTOCOL_ID));
    // Content-type tag
    script.extend_from_slice(&push_data(&[0x01]));
    script.extend_from_slice(&push_data(mime_type));
    // Body separator
    script.push(OP_0);
    for chunk in payload.chunks(MAX_SCRIPT_ELEMENT_SIZE) {
        script.extend_from_slice(&push_data(chunk));
    }
    script.push(OP_ENDIF);
    Ok(script)
}

/// Leaf script for a BRC20 `transfer` inscription.
pub fn build_brc20_inscribe_transfer(ticker: &str, amount: &str, pubkey: &[u8]) -> Result<ByteString> {
    let payload = Brc20Payload::transfer(ticker, amount)?.to_json()?;
    build_ordinal_nft_inscription(BRC20_MIME_TYPE, &payload, pubkey)
}

/// Parse an inscription leaf built by this module. `None` when the shape differs.
pub fn match_inscription(script: &[u8]) -> Option<Inscription> {
    let instructions = parse_instructions(script)?;
    let mut iter = instructions.into_iter();

    let public_key = match iter.next()? {
        Instruction::Push(key) if key.len() == 32 => {
            let mut out = [0u8; 32];
            out.copy_from_slice(&key);
            out
        }
        _ => return None,
    };
    let expect_op = |ins: Option<Instruction>, op: u8| matches!(ins, Some(Instruction::Op(o)) if o == op);
    if !expect_op(iter.next(), OP_CHECKSIG) || !expect_op(iter.next(), OP_0) || !expect_op(iter.next(), OP_IF) {
        return None;
    }
    match iter.next()? {
        Instruction::Push(tag) if tag == INSCRIPTION_PROTOCOL_ID => {}
        _ => return None,
    }
    match iter.next()? {
        Instruction::Push(tag) if tag == [0x01] => {}
        _ => return None,
    }
    let mime_type = match iter.next()? {
        Instruction::Push(mime) => mime,
        _ => return None,
    };
    if !expect_op(iter.next(), OP_0) {
        return None;
    }
    let mut payload = Vec::new();
    loop {
        match iter.next()? {
            Instruction::Push(chunk) => payload.extend_from_slice(&chunk),
            Instruction::Op(OP_ENDIF) => break,
            Instruction::Op(_) => return None,
        }
    }
    if iter.next().is_some() {
        return None;
    }
    Some(Inscription {
        public_key,
        mime_type,
        payload,
    })
}

/// Taproot commitment (output key, control block) for an inscription leaf.
pub fn inscription_commitment(leaf_script: &[u8]) -> Result<SingleLeafTree> {
    let inscription = match_inscription(leaf_script).ok_or_else(|| {
        SigningError::InvalidRedeemScript("not an inscription leaf script".to_string())
    })?;
    let internal_key = XOnlyPublicKey::from_slice(&inscription.public_key)
        .map_err(|e| SigningError::InvalidRedeemScript(format!("inscription key: {}", e)))?;
    let secp = Secp256k1::verification_only();
    SingleLeafTree::new(&secp, internal_key, leaf_script.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY: &str = "030f209b6ada5edb42c77fd2bc64ad650ae38314c8f451f3e36d80bc8e26f132cb";

    #[test]
    fn test_brc20_payload_json() {
        let json = Brc20Payload::transfer("oadf", "20").unwrap().to_json().unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"p":"brc-20","op":"transfer","tick":"oadf","amt":"20"}"#
        );
    }

    #[test]
    fn test_brc20_ticker_length() {
        assert!(Brc20Payload::transfer("toolong", "1").is_err());
        assert!(build_brc20_inscribe_transfer("abc", "1", &hex::decode(PUBKEY).unwrap()).is_err());
    }

    #[test]
    fn test_brc20_leaf_layout() {
        let pubkey = hex::decode(PUBKEY).unwrap();
        let leaf = build_brc20_inscribe_transfer("oadf", "20", &pubkey).unwrap();
        let expected = concat!(
            "200f209b6ada5edb42c77fd2bc64ad650ae38314c8f451f3e36d80bc8e26f132cbac",
            "0063036f7264010118746578742f706c61696e3b636861727365743d7574662d3800",
            "377b2270223a226272632d3230222c226f70223a227472616e73666572222c227469636b223a226f616466222c22616d74223a223230227d68"
        );
        assert_eq!(hex::encode(&leaf), expected);
        assert_eq!(leaf.len(), 125);
    }

    #[test]
    fn test_brc20_commitment() {
        let pubkey = hex::decode(PUBKEY).unwrap();
        let leaf = build_brc20_inscribe_transfer("oadf", "20", &pubkey).unwrap();
        let tree = inscription_commitment(&leaf).unwrap();
        assert_eq!(
            hex::encode(tree.output_key.serialize()),
            "2394f2bfac00888da30d2ebc96c8ded352b78a7bae820703bda2fc458124f5fc"
        );
        assert_eq!(tree.control_block()[0], 0xc1);
        assert_eq!(&tree.control_block()[1..], &pubkey[1..]);
    }

    #[test]
    fn test_nft_payload_is_chunked() {
        let pubkey = hex::decode(PUBKEY).unwrap();
        let payload = vec![0x42u8; 1200];
        let leaf = build_ordinal_nft_inscription(b"image/png", &payload, &pubkey).unwrap();

        let pushes: Vec<usize> = parse_instructions(&leaf)
            .unwrap()
            .into_iter()
            .filter_map(|ins| match ins {
                Instruction::Push(data) if data.iter().all(|b| *b == 0x42) && !data.is_empty() => Some(data.len()),
                _ => None,
            })
            .collect();
        assert_eq!(pushes, vec![520, 520, 160]);

        let parsed = match_inscription(&leaf).unwrap();
        assert_eq!(parsed.mime_type, b"image/png".to_vec());
        assert_eq!(parsed.payload, payload);
        assert_eq!(&parsed.public_key[..], &pubkey[1..]);
    }

    #[test]
    fn test_match_inscription_rejects_other_scripts() {
        assert!(match_inscription(&[]).is_none());
        assert!(match_inscription(&hex::decode("76a914769bdff96a02f9135a1d19b749db6a78fe07dc9088ac").unwrap()).is_none());
        let pubkey = hex::decode(PUBKEY).unwrap();
        let mut leaf = build_ordinal_nft_inscription(b"text/plain", b"hi", &pubkey).unwrap();
        leaf.pop();
        assert!(match_inscription(&leaf).is_none());
    }

    #[test]
    fn test_invalid_pubkey_length() {
        assert!(matches!(
            build_ordinal_nft_inscription(b"text/plain", b"x", &[2u8; 20]),
            Err(SigningError::InvalidRedeemScript(_))
        ));
    }
}
