//! Transaction wire format: encoding, decoding, identifiers and sizes

use crate::constants::{SEGWIT_FLAG, SEGWIT_MARKER};
use crate::crypto::double_sha256;
use crate::error::{Result, SigningError};
use crate::segwit;
use crate::types::*;

/// Serialization layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEncoding {
    /// No marker, flag or witness section
    Legacy,
    /// Marker and flag after the version, one witness stack per input before the lock time
    Segwit,
}

/// Bitcoin compact size integer
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Length-prefixed byte string
pub fn write_var_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_varint(out, data.len() as u64);
    out.extend_from_slice(data);
}

/// 32-byte hash || 4-byte index
pub fn write_outpoint(out: &mut Vec<u8>, outpoint: &OutPoint) {
    out.extend_from_slice(&outpoint.hash);
    out.extend_from_slice(&outpoint.index.to_le_bytes());
}

/// 8-byte value || script
pub fn write_output(out: &mut Vec<u8>, output: &TransactionOutput) {
    out.extend_from_slice(&output.value.to_le_bytes());
    write_var_bytes(out, &output.script_pubkey);
}

fn write_witness(out: &mut Vec<u8>, witness: &[ByteString]) {
    write_varint(out, witness.len() as u64);
    for item in witness {
        write_var_bytes(out, item);
    }
}

/// Serialize a transaction in the requested layout.
pub fn encode(tx: &Transaction, encoding: TxEncoding) -> ByteString {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(&tx.version.to_le_bytes());
    if encoding == TxEncoding::Segwit {
        out.push(SEGWIT_MARKER);
        out.push(SEGWIT_FLAG);
    }

    write_varint(&mut out, tx.inputs.len() as u64);
    for input in &tx.inputs {
        write_outpoint(&mut out, &input.prevout);
        write_var_bytes(&mut out, &input.script_sig);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_varint(&mut out, tx.outputs.len() as u64);
    for output in &tx.outputs {
        write_output(&mut out, output);
    }

    if encoding == TxEncoding::Segwit {
        for input in &tx.inputs {
            write_witness(&mut out, &input.witness);
        }
    }

    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}

/// Segwit layout when any input carries witness data, legacy otherwise.
pub fn encode_for_broadcast(tx: &Transaction) -> ByteString {
    if segwit::has_witness(tx) {
        encode(tx, TxEncoding::Segwit)
    } else {
        encode(tx, TxEncoding::Legacy)
    }
}

/// Double SHA-256 of the legacy serialization, in serialization byte order
pub fn txid_hash(tx: &Transaction) -> Hash {
    double_sha256(&encode(tx, TxEncoding::Legacy))
}

/// Transaction id for display: byte-reversed `txid_hash`, hex encoded
pub fn txid(tx: &Transaction) -> String {
    let mut hash = txid_hash(tx);
    hash.reverse();
    hex::encode(hash)
}

/// Witness transaction id (BIP141), display order
pub fn wtxid(tx: &Transaction) -> String {
    let mut hash = double_sha256(&encode_for_broadcast(tx));
    hash.reverse();
    hex::encode(hash)
}

/// Segwit and legacy serialized sizes plus the virtual size
///
/// virtual = ⌈(3 × |legacy| + |segwit|) / 4⌉
pub fn encoded_size(tx: &Transaction) -> EncodedTxSize {
    let segwit = encode(tx, TxEncoding::Segwit).len() as u64;
    let non_segwit = encode(tx, TxEncoding::Legacy).len() as u64;
    EncodedTxSize {
        segwit,
        non_segwit,
        virtual_bytes: segwit::virtual_size(non_segwit, segwit),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                SigningError::Serialization(format!(
                    "unexpected end of data at offset {} reading {} bytes",
                    self.pos, len
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(buf))
    }

    fn varint(&mut self) -> Result<u64> {
        match self.u8()? {
            0xfd => {
                let b = self.take(2)?;
                Ok(u16::from_le_bytes([b[0], b[1]]) as u64)
            }
            0xfe => Ok(self.u32()? as u64),
            0xff => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(self.take(8)?);
                Ok(u64::from_le_bytes(buf))
            }
            n => Ok(n as u64),
        }
    }

    fn var_bytes(&mut self) -> Result<ByteString> {
        let len = self.varint()?;
        let len = usize::try_from(len)
            .map_err(|_| SigningError::Serialization("length overflow".to_string()))?;
        Ok(self.take(len)?.to_vec())
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Parse a transaction in either layout. Trailing bytes are rejected.
pub fn decode(data: &[u8]) -> Result<Transaction> {
    let mut reader = Reader::new(data);
    let version = reader.u32()? as i32;

    let segwit = reader.peek(0) == Some(SEGWIT_MARKER) && reader.peek(1) == Some(SEGWIT_FLAG);
    if segwit {
        reader.take(2)?;
    }

    let input_count = reader.varint()?;
    let mut inputs = Vec::new();
    for _ in 0..input_count {
        let hash_bytes = reader.take(32)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(hash_bytes);
        let index = reader.u32()?;
        let script_sig = reader.var_bytes()?;
        let sequence = reader.u32()?;
        inputs.push(TransactionInput {
            prevout: OutPoint {
                hash,
                index,
                sequence,
            },
            script_sig,
            sequence,
            witness: Vec::new(),
        });
    }

    let output_count = reader.varint()?;
    let mut outputs = Vec::new();
    for _ in 0..output_count {
        let value = reader.i64()?;
        let script_pubkey = reader.var_bytes()?;
        outputs.push(TransactionOutput {
            value,
            script_pubkey,
        });
    }

    if segwit {
        for input in inputs.iter_mut() {
            let items = reader.varint()?;
            for _ in 0..items {
                input.witness.push(reader.var_bytes()?);
            }
        }
    }

    let lock_time = reader.u32()?;
    if reader.remaining() != 0 {
        return Err(SigningError::Serialization(format!(
            "{} trailing bytes after transaction",
            reader.remaining()
        )));
    }

    Ok(Transaction {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint::new([0x11; 32], 1).with_sequence(0xffff_fffe),
                script_sig: vec![],
                sequence: 0xffff_fffe,
                witness: vec![vec![0xaa; 71], vec![0x02; 33]],
            }],
            outputs: vec![TransactionOutput {
                value: 5_000,
                script_pubkey: vec![0x00, 0x14, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
            }],
            lock_time: 0x11,
        }
    }

    #[test]
    fn test_varint_boundaries() {
        let mut out = Vec::new();
        write_varint(&mut out, 0xfc);
        assert_eq!(out, vec![0xfc]);
        out.clear();
        write_varint(&mut out, 0xfd);
        assert_eq!(out, vec![0xfd, 0xfd, 0x00]);
        out.clear();
        write_varint(&mut out, 0x1_0000);
        assert_eq!(out, vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        out.clear();
        write_varint(&mut out, 0x1_0000_0000);
        assert_eq!(out.len(), 9);
    }

    #[test]
    fn test_legacy_layout() {
        let tx = sample_tx();
        let bytes = encode(&tx, TxEncoding::Legacy);
        assert_eq!(&bytes[..4], &[1, 0, 0, 0]);
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[bytes.len() - 4..], &[0x11, 0, 0, 0]);
        // version + count + input(32+4+1+4) + count + output(8+1+22) + locktime
        assert_eq!(bytes.len(), 4 + 1 + 41 + 1 + 31 + 4);
    }

    #[test]
    fn test_segwit_layout_adds_marker_and_witness() {
        let tx = sample_tx();
        let legacy = encode(&tx, TxEncoding::Legacy);
        let segwit = encode(&tx, TxEncoding::Segwit);
        assert_eq!(&segwit[4..6], &[0x00, 0x01]);
        // marker/flag + item count + two length-prefixed items
        assert_eq!(segwit.len(), legacy.len() + 2 + 1 + 72 + 34);
        assert_eq!(encode_for_broadcast(&tx), segwit);
    }

    #[test]
    fn test_decode_both_layouts() {
        let tx = sample_tx();
        let segwit = encode(&tx, TxEncoding::Segwit);
        assert_eq!(decode(&segwit).unwrap(), tx);

        let legacy = encode(&tx, TxEncoding::Legacy);
        let decoded = decode(&legacy).unwrap();
        assert!(decoded.inputs[0].witness.is_empty());
        assert_eq!(encode(&decoded, TxEncoding::Legacy), legacy);
    }

    #[test]
    fn test_decode_rejects_truncated_and_trailing() {
        let bytes = encode(&sample_tx(), TxEncoding::Legacy);
        assert!(matches!(decode(&bytes[..bytes.len() - 1]), Err(SigningError::Serialization(_))));
        let mut extra = bytes.clone();
        extra.push(0);
        assert!(matches!(decode(&extra), Err(SigningError::Serialization(_))));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_txid_ignores_witness() {
        let tx = sample_tx();
        let mut stripped = tx.clone();
        stripped.inputs[0].witness.clear();
        assert_eq!(txid(&tx), txid(&stripped));
        assert_ne!(wtxid(&tx), txid(&tx));
        assert_eq!(wtxid(&stripped), txid(&stripped));
    }

    #[test]
    fn test_encoded_size() {
        let tx = sample_tx();
        let size = encoded_size(&tx);
        assert_eq!(size.non_segwit, 82);
        assert_eq!(size.segwit, 191);
        assert_eq!(size.virtual_bytes, 110);
    }
}
