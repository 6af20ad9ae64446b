//! Script, sighash and sizing constants

/// Maximum money supply: 21,000,000 BTC in satoshis
pub const MAX_MONEY: i64 = 21_000_000 * 100_000_000;

/// Maximum size of a single pushed script element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Final sequence number (no relative lock time, no RBF)
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Default dust threshold in satoshis
pub const DEFAULT_DUST_THRESHOLD: i64 = 546;

// Opcodes
pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_IF: u8 = 0x63;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

// Sighash flags
pub const SIGHASH_DEFAULT: u32 = 0x00;
pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_FORK: u32 = 0x40;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask selecting the base type (ALL/NONE/SINGLE) out of a hash type
pub const SIGHASH_BASE_MASK: u32 = 0x1f;

/// Segwit marker and flag bytes written after the version
pub const SEGWIT_MARKER: u8 = 0x00;
pub const SEGWIT_FLAG: u8 = 0x01;

/// Weight units per virtual byte
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Placeholder ECDSA signature item length used for size estimation (DER + hash type byte)
pub const ESTIMATED_ECDSA_SIGNATURE_LEN: usize = 72;

/// Placeholder Schnorr signature item length (without hash type byte)
pub const SCHNORR_SIGNATURE_LEN: usize = 64;

/// Compressed public key length
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Uncompressed public key length
pub const UNCOMPRESSED_PUBKEY_LEN: usize = 65;

/// Tapscript leaf version
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xc0;

/// Ordinals envelope protocol tag
pub const INSCRIPTION_PROTOCOL_ID: &[u8] = b"ord";

/// MIME type of BRC20 payloads
pub const BRC20_MIME_TYPE: &[u8] = b"text/plain;charset=utf-8";
