//! Script construction and pattern matching
//!
//! Builders return canonical locking/unlocking byte layouts. Matchers inspect
//! the opcode/length structure and return the embedded data, or `None` when
//! the shape does not match. Matching never fails on malformed bytes.

use crate::constants::*;
use crate::types::ByteString;

/// Largest OP_RETURN payload relayed as standard
pub const MAX_OP_RETURN_SIZE: usize = 80;

/// Maximum number of keys in a CHECKMULTISIG script
pub const MAX_MULTISIG_KEYS: usize = 16;

/// A parsed script element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Op(u8),
    Push(ByteString),
}

/// Recognized locking script shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptClass {
    PayToPublicKey(ByteString),
    PayToPublicKeyHash([u8; 20]),
    PayToScriptHash([u8; 20]),
    PayToWitnessPublicKeyHash([u8; 20]),
    PayToWitnessScriptHash([u8; 32]),
    PayToTaproot([u8; 32]),
    Multisig { required: usize, keys: Vec<ByteString> },
    OpReturn(ByteString),
}

/// Minimal push of `data`: direct push, OP_PUSHDATA1/2/4, or OP_0 for empty data.
pub fn push_data(data: &[u8]) -> ByteString {
    let len = data.len();
    let mut out = Vec::with_capacity(len + 5);
    if len == 0 {
        out.push(OP_0);
        return out;
    }
    if len < OP_PUSHDATA1 as usize {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= 0xffff {
        out.push(OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

/// Opcode for a small integer 0..=16
pub fn small_int_opcode(n: usize) -> Option<u8> {
    match n {
        0 => Some(OP_0),
        1..=16 => Some(OP_1 + (n as u8) - 1),
        _ => None,
    }
}

fn decode_small_int(op: u8) -> Option<usize> {
    match op {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some((op - OP_1) as usize + 1),
        _ => None,
    }
}

/// Split a script into instructions. Returns `None` on a truncated push.
pub fn parse_instructions(script: &[u8]) -> Option<Vec<Instruction>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < script.len() {
        let op = script[i];
        i += 1;
        let len = match op {
            0x01..=0x4b => op as usize,
            OP_PUSHDATA1 => {
                let len = *script.get(i)? as usize;
                i += 1;
                len
            }
            OP_PUSHDATA2 => {
                let bytes = script.get(i..i + 2)?;
                i += 2;
                u16::from_le_bytes([bytes[0], bytes[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let bytes = script.get(i..i + 4)?;
                i += 4;
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
            }
            _ => {
                out.push(Instruction::Op(op));
                continue;
            }
        };
        let data = script.get(i..i.checked_add(len)?)?;
        i += len;
        out.push(Instruction::Push(data.to_vec()));
    }
    Some(out)
}

/// <pubkey> OP_CHECKSIG
pub fn build_pay_to_public_key(pubkey: &[u8]) -> ByteString {
    let mut script = push_data(pubkey);
    script.push(OP_CHECKSIG);
    script
}

/// OP_DUP OP_HASH160 <20-byte-hash> OP_EQUALVERIFY OP_CHECKSIG
pub fn build_pay_to_public_key_hash(hash: &[u8; 20]) -> ByteString {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// OP_HASH160 <20-byte-hash> OP_EQUAL
pub fn build_pay_to_script_hash(hash: &[u8; 20]) -> ByteString {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(hash);
    script.push(OP_EQUAL);
    script
}

/// OP_0 <20-byte-hash>
pub fn build_pay_to_witness_public_key_hash(hash: &[u8; 20]) -> ByteString {
    build_witness_program(0, hash)
}

/// OP_0 <32-byte-hash>
pub fn build_pay_to_witness_script_hash(hash: &[u8; 32]) -> ByteString {
    build_witness_program(0, hash)
}

/// OP_1 <32-byte-output-key>
pub fn build_pay_to_taproot(output_key: &[u8; 32]) -> ByteString {
    build_witness_program(1, output_key)
}

/// OP_n <program>
pub fn build_witness_program(version: u8, program: &[u8]) -> ByteString {
    let mut script = Vec::with_capacity(program.len() + 2);
    script.push(if version == 0 { OP_0 } else { OP_1 + version - 1 });
    script.push(program.len() as u8);
    script.extend_from_slice(program);
    script
}

/// OP_RETURN <data>. `None` when the payload exceeds the standard size.
pub fn build_op_return_script(data: &[u8]) -> Option<ByteString> {
    if data.len() > MAX_OP_RETURN_SIZE {
        return None;
    }
    let mut script = vec![OP_RETURN];
    script.extend_from_slice(&push_data(data));
    Some(script)
}

/// OP_m <pubkey>... OP_n OP_CHECKMULTISIG
pub fn build_multisig(required: usize, pubkeys: &[ByteString]) -> Option<ByteString> {
    if required == 0 || required > pubkeys.len() || pubkeys.len() > MAX_MULTISIG_KEYS {
        return None;
    }
    let mut script = vec![small_int_opcode(required)?];
    for key in pubkeys {
        script.extend_from_slice(&push_data(key));
    }
    script.push(small_int_opcode(pubkeys.len())?);
    script.push(OP_CHECKMULTISIG);
    Some(script)
}

fn is_pubkey_len(len: usize) -> bool {
    len == COMPRESSED_PUBKEY_LEN || len == UNCOMPRESSED_PUBKEY_LEN
}

pub fn match_pay_to_public_key(script: &[u8]) -> Option<ByteString> {
    let (&last, body) = script.split_last()?;
    if last != OP_CHECKSIG {
        return None;
    }
    let (&len, key) = body.split_first()?;
    if len as usize != key.len() || !is_pubkey_len(key.len()) {
        return None;
    }
    Some(key.to_vec())
}

pub fn match_pay_to_public_key_hash(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() != 25
        || script[0] != OP_DUP
        || script[1] != OP_HASH160
        || script[2] != 20
        || script[23] != OP_EQUALVERIFY
        || script[24] != OP_CHECKSIG
    {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[3..23]);
    Some(hash)
}

pub fn match_pay_to_script_hash(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() != 23 || script[0] != OP_HASH160 || script[1] != 20 || script[22] != OP_EQUAL {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[2..22]);
    Some(hash)
}

/// Witness version and program of a segwit output script
pub fn match_witness_program(script: &[u8]) -> Option<(u8, &[u8])> {
    if script.len() < 4 || script.len() > 42 {
        return None;
    }
    let version = match script[0] {
        OP_0 => 0,
        OP_1..=OP_16 => script[0] - OP_1 + 1,
        _ => return None,
    };
    if script[1] as usize != script.len() - 2 {
        return None;
    }
    Some((version, &script[2..]))
}

pub fn match_pay_to_witness_public_key_hash(script: &[u8]) -> Option<[u8; 20]> {
    match match_witness_program(script)? {
        (0, program) if program.len() == 20 => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(program);
            Some(hash)
        }
        _ => None,
    }
}

pub fn match_pay_to_witness_script_hash(script: &[u8]) -> Option<[u8; 32]> {
    match match_witness_program(script)? {
        (0, program) if program.len() == 32 => {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(program);
            Some(hash)
        }
        _ => None,
    }
}

pub fn match_pay_to_taproot(script: &[u8]) -> Option<[u8; 32]> {
    match match_witness_program(script)? {
        (1, program) if program.len() == 32 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(program);
            Some(key)
        }
        _ => None,
    }
}

/// Required signature count and public keys, in script order
pub fn match_multisig(script: &[u8]) -> Option<(usize, Vec<ByteString>)> {
    let instructions = parse_instructions(script)?;
    let (last, rest) = instructions.split_last()?;
    if *last != Instruction::Op(OP_CHECKMULTISIG) {
        return None;
    }
    let (n_op, rest) = rest.split_last()?;
    let (m_op, keys) = rest.split_first()?;
    let required = match m_op {
        Instruction::Op(op) => decode_small_int(*op)?,
        _ => return None,
    };
    let total = match n_op {
        Instruction::Op(op) => decode_small_int(*op)?,
        _ => return None,
    };
    if required == 0 || total != keys.len() || required > total {
        return None;
    }
    let mut pubkeys = Vec::with_capacity(keys.len());
    for key in keys {
        match key {
            Instruction::Push(k) if is_pubkey_len(k.len()) => pubkeys.push(k.clone()),
            _ => return None,
        }
    }
    Some((required, pubkeys))
}

/// Data carried by an OP_RETURN script
pub fn match_op_return(script: &[u8]) -> Option<ByteString> {
    let (&first, rest) = script.split_first()?;
    if first != OP_RETURN {
        return None;
    }
    if rest.is_empty() {
        return Some(Vec::new());
    }
    match parse_instructions(rest)?.as_slice() {
        [Instruction::Push(data)] => Some(data.clone()),
        [Instruction::Op(OP_0)] => Some(Vec::new()),
        _ => None,
    }
}

/// Classify a locking (or redeem) script.
pub fn classify(script: &[u8]) -> Option<ScriptClass> {
    if let Some(hash) = match_pay_to_public_key_hash(script) {
        return Some(ScriptClass::PayToPublicKeyHash(hash));
    }
    if let Some(hash) = match_pay_to_script_hash(script) {
        return Some(ScriptClass::PayToScriptHash(hash));
    }
    if let Some(hash) = match_pay_to_witness_public_key_hash(script) {
        return Some(ScriptClass::PayToWitnessPublicKeyHash(hash));
    }
    if let Some(hash) = match_pay_to_witness_script_hash(script) {
        return Some(ScriptClass::PayToWitnessScriptHash(hash));
    }
    if let Some(key) = match_pay_to_taproot(script) {
        return Some(ScriptClass::PayToTaproot(key));
    }
    if let Some(key) = match_pay_to_public_key(script) {
        return Some(ScriptClass::PayToPublicKey(key));
    }
    if let Some((required, keys)) = match_multisig(script) {
        return Some(ScriptClass::Multisig { required, keys });
    }
    if let Some(data) = match_op_return(script) {
        return Some(ScriptClass::OpReturn(data));
    }
    None
}
