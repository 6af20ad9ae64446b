//! Signature hash algorithms: legacy, BIP143 (segwit v0) and BIP341 (taproot)

use crate::constants::*;
use crate::crypto::{double_sha256, sha256, tagged_hash};
use crate::error::{Result, SigningError};
use crate::transaction::{encode, write_outpoint, write_output, write_var_bytes, TxEncoding};
use crate::types::*;
use tracing::trace;

/// Digest returned by the legacy algorithm for SIGHASH_SINGLE without a matching output
pub const UINT256_ONE: Hash = [
    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Key version committed by tapscript signatures
const KEY_VERSION_0: u8 = 0;

/// Code separator position when none was executed
const NO_CODE_SEPARATOR: u32 = 0xffff_ffff;

/// A hash type: base ALL/NONE/SINGLE plus the ANYONECANPAY and FORK flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigHashType(pub u32);

impl SigHashType {
    pub const ALL: SigHashType = SigHashType(SIGHASH_ALL);

    pub fn base(self) -> u32 {
        self.0 & SIGHASH_BASE_MASK
    }

    pub fn is_none(self) -> bool {
        self.base() == SIGHASH_NONE
    }

    pub fn is_single(self) -> bool {
        self.base() == SIGHASH_SINGLE
    }

    pub fn anyone_can_pay(self) -> bool {
        self.0 & SIGHASH_ANYONECANPAY != 0
    }

    /// Byte appended to ECDSA signatures
    pub fn as_byte(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// Taproot hash types: 0x00..=0x03 and 0x81..=0x83
    pub fn is_valid_taproot(self) -> bool {
        matches!(self.0, 0x00..=0x03 | 0x81..=0x83)
    }
}

/// Aggregate hashes over the whole transaction, computed once per request and
/// shared by every input's digest.
pub struct SighashCache<'a> {
    tx: &'a Transaction,
    spent_outputs: &'a [TransactionOutput],
    // BIP143: double SHA-256
    hash_prevouts: Hash,
    hash_sequence: Hash,
    hash_outputs: Hash,
    // BIP341: single SHA-256
    sha_prevouts: Hash,
    sha_amounts: Hash,
    sha_script_pubkeys: Hash,
    sha_sequences: Hash,
    sha_outputs: Hash,
}

impl<'a> SighashCache<'a> {
    /// `spent_outputs[i]` is the output spent by input `i`.
    pub fn new(tx: &'a Transaction, spent_outputs: &'a [TransactionOutput]) -> Result<Self> {
        if spent_outputs.len() != tx.inputs.len() {
            return Err(SigningError::Signing(format!(
                "{} spent outputs for {} inputs",
                spent_outputs.len(),
                tx.inputs.len()
            )));
        }

        let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
        let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
        for input in &tx.inputs {
            write_outpoint(&mut prevouts, &input.prevout);
            sequences.extend_from_slice(&input.sequence.to_le_bytes());
        }
        let mut outputs = Vec::new();
        for output in &tx.outputs {
            write_output(&mut outputs, output);
        }
        let mut amounts = Vec::with_capacity(spent_outputs.len() * 8);
        let mut script_pubkeys = Vec::new();
        for spent in spent_outputs {
            amounts.extend_from_slice(&spent.value.to_le_bytes());
            write_var_bytes(&mut script_pubkeys, &spent.script_pubkey);
        }

        Ok(Self {
            tx,
            spent_outputs,
            hash_prevouts: double_sha256(&prevouts),
            hash_sequence: double_sha256(&sequences),
            hash_outputs: double_sha256(&outputs),
            sha_prevouts: sha256(&prevouts),
            sha_amounts: sha256(&amounts),
            sha_script_pubkeys: sha256(&script_pubkeys),
            sha_sequences: sha256(&sequences),
            sha_outputs: sha256(&outputs),
        })
    }

    fn input(&self, input_index: usize) -> Result<&'a TransactionInput> {
        self.tx.inputs.get(input_index).ok_or_else(|| {
            SigningError::Signing(format!(
                "input index {} out of range ({} inputs)",
                input_index,
                self.tx.inputs.len()
            ))
        })
    }

    /// Legacy digest.
    ///
    /// The spent input's scriptSig is replaced by `script_code`, every other
    /// scriptSig is emptied, then inputs and outputs are filtered by the hash
    /// type before serializing with the 4-byte hash type appended.
    pub fn legacy_signature_hash(
        &self,
        input_index: usize,
        script_code: &[u8],
        hash_type: SigHashType,
    ) -> Result<Hash> {
        let this_input = self.input(input_index)?;

        // SINGLE without a corresponding output signs the constant one
        if hash_type.is_single() && input_index >= self.tx.outputs.len() {
            return Ok(UINT256_ONE);
        }

        // 1. Inputs
        let inputs: Vec<TransactionInput> = if hash_type.anyone_can_pay() {
            vec![TransactionInput {
                prevout: this_input.prevout,
                script_sig: script_code.to_vec(),
                sequence: this_input.sequence,
                witness: Vec::new(),
            }]
        } else {
            self.tx
                .inputs
                .iter()
                .enumerate()
                .map(|(i, input)| {
                    let own = i == input_index;
                    let sequence = if !own && (hash_type.is_none() || hash_type.is_single()) {
                        0
                    } else {
                        input.sequence
                    };
                    TransactionInput {
                        prevout: input.prevout,
                        script_sig: if own { script_code.to_vec() } else { Vec::new() },
                        sequence,
                        witness: Vec::new(),
                    }
                })
                .collect()
        };

        // 2. Outputs
        let outputs: Vec<TransactionOutput> = if hash_type.is_none() {
            Vec::new()
        } else if hash_type.is_single() {
            self.tx.outputs[..=input_index]
                .iter()
                .enumerate()
                .map(|(i, output)| {
                    if i == input_index {
                        output.clone()
                    } else {
                        TransactionOutput {
                            value: -1,
                            script_pubkey: Vec::new(),
                        }
                    }
                })
                .collect()
        } else {
            self.tx.outputs.clone()
        };

        // 3. Serialize and hash
        let stripped = Transaction {
            version: self.tx.version,
            inputs,
            outputs,
            lock_time: self.tx.lock_time,
        };
        let mut preimage = encode(&stripped, TxEncoding::Legacy);
        preimage.extend_from_slice(&hash_type.0.to_le_bytes());
        trace!(input_index, hash_type = hash_type.0, "legacy sighash");
        Ok(double_sha256(&preimage))
    }

    /// BIP143 digest. `fork_id` is committed in the upper bits of the hash type
    /// for replay-protected forks.
    pub fn segwit_v0_signature_hash(
        &self,
        input_index: usize,
        script_code: &[u8],
        amount: Amount,
        hash_type: SigHashType,
        fork_id: Option<u32>,
    ) -> Result<Hash> {
        let input = self.input(input_index)?;
        let zero = [0u8; 32];

        let hash_prevouts = if hash_type.anyone_can_pay() {
            zero
        } else {
            self.hash_prevouts
        };
        let hash_sequence =
            if hash_type.anyone_can_pay() || hash_type.is_single() || hash_type.is_none() {
                zero
            } else {
                self.hash_sequence
            };
        let hash_outputs = if !hash_type.is_single() && !hash_type.is_none() {
            self.hash_outputs
        } else if hash_type.is_single() && input_index < self.tx.outputs.len() {
            let mut single = Vec::new();
            write_output(&mut single, &self.tx.outputs[input_index]);
            double_sha256(&single)
        } else {
            zero
        };

        let committed_type = match fork_id {
            Some(id) => hash_type.0 | (id << 8),
            None => hash_type.0,
        };

        let mut preimage = Vec::with_capacity(156 + script_code.len());
        preimage.extend_from_slice(&self.tx.version.to_le_bytes());
        preimage.extend_from_slice(&hash_prevouts);
        preimage.extend_from_slice(&hash_sequence);
        write_outpoint(&mut preimage, &input.prevout);
        write_var_bytes(&mut preimage, script_code);
        preimage.extend_from_slice(&amount.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
        preimage.extend_from_slice(&hash_outputs);
        preimage.extend_from_slice(&self.tx.lock_time.to_le_bytes());
        preimage.extend_from_slice(&committed_type.to_le_bytes());
        trace!(input_index, hash_type = committed_type, "segwit v0 sighash");
        Ok(double_sha256(&preimage))
    }

    /// BIP341 digest. `leaf_hash` selects a script-path spend (ext_flag = 1).
    pub fn taproot_signature_hash(
        &self,
        input_index: usize,
        hash_type: SigHashType,
        leaf_hash: Option<&Hash>,
    ) -> Result<Hash> {
        let input = self.input(input_index)?;
        if !hash_type.is_valid_taproot() {
            return Err(SigningError::Signing(format!(
                "invalid taproot hash type {:#04x}",
                hash_type.0
            )));
        }

        let mut msg = Vec::with_capacity(256);
        // Epoch
        msg.push(0u8);
        // Control
        msg.push(hash_type.as_byte());
        // Transaction data
        msg.extend_from_slice(&self.tx.version.to_le_bytes());
        msg.extend_from_slice(&self.tx.lock_time.to_le_bytes());
        if !hash_type.anyone_can_pay() {
            msg.extend_from_slice(&self.sha_prevouts);
            msg.extend_from_slice(&self.sha_amounts);
            msg.extend_from_slice(&self.sha_script_pubkeys);
            msg.extend_from_slice(&self.sha_sequences);
        }
        if !hash_type.is_none() && !hash_type.is_single() {
            msg.extend_from_slice(&self.sha_outputs);
        }

        // Data about this input; no annex support
        let spend_type: u8 = if leaf_hash.is_some() { 2 } else { 0 };
        msg.push(spend_type);
        if hash_type.anyone_can_pay() {
            let spent = &self.spent_outputs[input_index];
            write_outpoint(&mut msg, &input.prevout);
            msg.extend_from_slice(&spent.value.to_le_bytes());
            write_var_bytes(&mut msg, &spent.script_pubkey);
            msg.extend_from_slice(&input.sequence.to_le_bytes());
        } else {
            msg.extend_from_slice(&(input_index as u32).to_le_bytes());
        }

        // Data about this output
        if hash_type.is_single() {
            let output = self.tx.outputs.get(input_index).ok_or_else(|| {
                SigningError::Signing(format!(
                    "SIGHASH_SINGLE for input {} without corresponding output",
                    input_index
                ))
            })?;
            let mut single = Vec::new();
            write_output(&mut single, output);
            msg.extend_from_slice(&sha256(&single));
        }

        if let Some(leaf_hash) = leaf_hash {
            msg.extend_from_slice(leaf_hash);
            msg.push(KEY_VERSION_0);
            msg.extend_from_slice(&NO_CODE_SEPARATOR.to_le_bytes());
        }

        trace!(input_index, hash_type = hash_type.0, script_path = leaf_hash.is_some(), "taproot sighash");
        Ok(tagged_hash("TapSighash", &msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taproot::tap_leaf_hash;
    use crate::transaction::decode;

    fn bytes(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    fn parse_prevouts(s: &str) -> Vec<TransactionOutput> {
        let data = bytes(s);
        let count = data[0] as usize;
        let mut pos = 1;
        let mut out = Vec::new();
        for _ in 0..count {
            let mut value = [0u8; 8];
            value.copy_from_slice(&data[pos..pos + 8]);
            let len = data[pos + 8] as usize;
            let script = data[pos + 9..pos + 9 + len].to_vec();
            pos += 9 + len;
            out.push(TransactionOutput {
                value: i64::from_le_bytes(value),
                script_pubkey: script,
            });
        }
        out
    }

    fn check_taproot(tx_hex: &str, prevouts_hex: &str, index: usize, expected: &str, hash_type: u32, leaf: Option<&str>) {
        let tx = decode(&bytes(tx_hex)).unwrap();
        let prevouts = parse_prevouts(prevouts_hex);
        let cache = SighashCache::new(&tx, &prevouts).unwrap();
        let leaf_hash = leaf.map(|script| tap_leaf_hash(&bytes(script), TAPROOT_LEAF_TAPSCRIPT));
        let hash = cache
            .taproot_signature_hash(index, SigHashType(hash_type), leaf_hash.as_ref())
            .unwrap();
        assert_eq!(hex::encode(hash), expected);
    }

    // BIP143 native P2WPKH example
    const BIP143_UNSIGNED: &str = "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000";

    fn bip143_spent() -> Vec<TransactionOutput> {
        vec![
            TransactionOutput {
                value: 625_000_000,
                script_pubkey: bytes("2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432ac"),
            },
            TransactionOutput {
                value: 600_000_000,
                script_pubkey: bytes("00141d0f172a0ecb48aee1be1f2687d2963ae33f71a1"),
            },
        ]
    }

    #[test]
    fn test_bip143_p2wpkh_digest() {
        let tx = decode(&bytes(BIP143_UNSIGNED)).unwrap();
        let spent = bip143_spent();
        let cache = SighashCache::new(&tx, &spent).unwrap();
        assert_eq!(
            hex::encode(cache.hash_prevouts),
            "96b827c8483d4e9b96712b6713a7b68d6e8003a781feba36c31143470b4efd37"
        );
        assert_eq!(
            hex::encode(cache.hash_sequence),
            "52b0a642eea2fb7ae638c36f6252b6750293dbe574a806984b8e4d8548339a3b"
        );
        assert_eq!(
            hex::encode(cache.hash_outputs),
            "863ef3e1a92afbfdb97f31ad0fc7683ee943e9abcf2501590ff8f6551f47e5e5"
        );
        let script_code = bytes("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac");
        let digest = cache
            .segwit_v0_signature_hash(1, &script_code, 600_000_000, SigHashType::ALL, None)
            .unwrap();
        assert_eq!(
            hex::encode(digest),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
    }

    #[test]
    fn test_fork_id_changes_digest() {
        let tx = decode(&bytes(BIP143_UNSIGNED)).unwrap();
        let spent = bip143_spent();
        let cache = SighashCache::new(&tx, &spent).unwrap();
        let script_code = bytes("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac");
        let forked = SigHashType(SIGHASH_ALL | SIGHASH_FORK);
        let plain = cache
            .segwit_v0_signature_hash(1, &script_code, 600_000_000, forked, None)
            .unwrap();
        let with_id = cache
            .segwit_v0_signature_hash(1, &script_code, 600_000_000, forked, Some(2))
            .unwrap();
        assert_ne!(plain, with_id);
        assert_eq!(forked.as_byte(), 0x41);
    }

    #[test]
    fn test_legacy_single_without_output_is_one() {
        let mut tx = decode(&bytes(BIP143_UNSIGNED)).unwrap();
        tx.outputs.truncate(1);
        let spent = bip143_spent();
        let cache = SighashCache::new(&tx, &spent).unwrap();
        let digest = cache
            .legacy_signature_hash(1, &[0x51], SigHashType(SIGHASH_SINGLE))
            .unwrap();
        assert_eq!(digest, UINT256_ONE);
    }

    #[test]
    fn test_legacy_anyone_can_pay_ignores_other_inputs() {
        let tx = decode(&bytes(BIP143_UNSIGNED)).unwrap();
        let spent = bip143_spent();
        let script = bytes("2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432ac");
        let acp = SigHashType(SIGHASH_ALL | SIGHASH_ANYONECANPAY);
        let before = SighashCache::new(&tx, &spent)
            .unwrap()
            .legacy_signature_hash(0, &script, acp)
            .unwrap();

        let mut changed = tx.clone();
        changed.inputs[1].prevout.index = 7;
        let after = SighashCache::new(&changed, &spent)
            .unwrap()
            .legacy_signature_hash(0, &script, acp)
            .unwrap();
        assert_eq!(before, after);

        let all_before = SighashCache::new(&tx, &spent)
            .unwrap()
            .legacy_signature_hash(0, &script, SigHashType::ALL)
            .unwrap();
        let all_after = SighashCache::new(&changed, &spent)
            .unwrap()
            .legacy_signature_hash(0, &script, SigHashType::ALL)
            .unwrap();
        assert_ne!(all_before, all_after);
    }

    #[test]
    fn test_legacy_none_ignores_outputs() {
        let tx = decode(&bytes(BIP143_UNSIGNED)).unwrap();
        let spent = bip143_spent();
        let script = bytes("2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432ac");
        let none = SigHashType(SIGHASH_NONE);
        let mut changed = tx.clone();
        changed.outputs[0].value += 1;
        let a = SighashCache::new(&tx, &spent).unwrap().legacy_signature_hash(0, &script, none).unwrap();
        let b = SighashCache::new(&changed, &spent).unwrap().legacy_signature_hash(0, &script, none).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_spent_outputs_must_match_inputs() {
        let tx = decode(&bytes(BIP143_UNSIGNED)).unwrap();
        let spent = vec![bip143_spent().remove(0)];
        assert!(SighashCache::new(&tx, &spent).is_err());
    }

    #[test]
    fn test_taproot_key_path_default() {
        check_taproot(
            "020000000164eb050a5e3da0c2a65e4786f26d753b7bc69691fabccafb11f7acef36641f1846010000003101b2b404392a22000000000017a9147f2bde86fe78bf68a0544a4f290e12f0b7e0a08c87580200000000000017a91425d11723074ecfb96a0a83c3956bfaf362ae0c908758020000000000001600147e20f938993641de67bb0cdd71682aa34c4d29ad5802000000000000160014c64984dc8761acfa99418bd6bedc79b9287d652d72000000",
            "01365724000000000023542156b39dab4f8f3508e0432cfb41fab110170acaa2d4c42539cb90a4dc7c093bc500",
            0,
            "33ca0ebfb4a945eeee9569fc0f5040221275f88690b7f8592ada88ce3bdf6703",
            SIGHASH_DEFAULT,
            None,
        );
    }

    #[test]
    fn test_taproot_key_path_all_second_input() {
        check_taproot(
            "0200000002fff49be59befe7566050737910f6ccdc5e749c7f8860ddc140386463d88c5ad0f3000000002cf68eb4a3d67f9d4c079249f7e4f27b8854815cb1ed13842d4fbf395f9e217fd605ee24090100000065235d9203f458520000000000160014b6d48333bb13b4c644e57c43a9a26df3a44b785e58020000000000001976a914eea9461a9e1e3f765d3af3e726162e0229fe3eb688ac58020000000000001976a9143a8869c9f2b5ea1d4ff3aeeb6a8fb2fffb1ad5fe88ac0ad7125c",
            "02591f220000000000225120f25ad35583ea31998d968871d7de1abd2a52f6fe4178b54ea158274806ff4ece48fb310000000000225120f25ad35583ea31998d968871d7de1abd2a52f6fe4178b54ea158274806ff4ece",
            1,
            "626ab955d58c9a8a600a0c580549d06dc7da4e802eb2a531f62a588e430967a8",
            SIGHASH_ALL,
            None,
        );
    }

    #[test]
    fn test_taproot_key_path_all_anyone_can_pay() {
        check_taproot(
            "0200000001350005f65aa830ced2079df348e2d8c2bdb4f10e2dde6a161d8a07b40d1ad87dae000000001611d0d603d9dc0e000000000017a914459b6d7d6bbb4d8837b4bf7e9a4556f952da2f5c8758020000000000001976a9141dd70e1299ffc2d5b51f6f87de9dfe9398c33cbb88ac58020000000000001976a9141dd70e1299ffc2d5b51f6f87de9dfe9398c33cbb88aca71c1f4f",
            "01c4811000000000002251201bf9297d0a2968ae6693aadd0fa514717afefd218087a239afb7418e2d22e65c",
            0,
            "dfa9437f9c9a1d1f9af271f79f2f5482f287cdb0d2e03fa92c8a9b216cc6061c",
            SIGHASH_ALL | SIGHASH_ANYONECANPAY,
            None,
        );
    }

    #[test]
    fn test_taproot_key_path_none() {
        check_taproot(
            "020000000185bed1a6da2bffbd60ec681a1bfb71c5111d6395b99b3f8b2bf90167111bcb18f5010000007c83ace802ded24a00000000001600142c4698f9f7a773866879755aa78c516fb332af8e5802000000000000160014d38639dfbac4259323b98a472405db0c461b31fa61073747",
            "0144c84d0000000000225120e3f2107989c88e67296ab2faca930efa2e3a5bd3ff0904835a11c9e807458621",
            0,
            "3129de36a5d05fff97ffca31eb75fcccbbbc27b3147a7a36a9e4b45d8b625067",
            SIGHASH_NONE,
            None,
        );
    }

    #[test]
    fn test_taproot_key_path_single() {
        check_taproot(
            "02000000017836b409a5fed32211407e44b971591f2032053f14701fb5b3a30c0ff382f2cc9c0100000061ac55f60288fb5600000000001976a9144ea02f6f182b082fb6ce47e36bbde390b6a41b5088ac58020000000000001976a9144ea02f6f182b082fb6ce47e36bbde390b6a41b5088ace4000000",
            "01efa558000000000022512007071ea3dc7e331b0687d0193d1e6d6ed10e645ef36f10ef8831d5e522ac9e80",
            0,
            "30239345177cadd0e3ea413d49803580abb6cb27971b481b7788a78d35117a88",
            SIGHASH_SINGLE,
            None,
        );
    }

    #[test]
    fn test_taproot_script_path() {
        check_taproot(
            "020000000189fc651483f9296b906455dd939813bf086b1bbe7c77635e157c8e14ae29062195010000004445b5c7044561320000000000160014331414dbdada7fb578f700f38fb69995fc9b5ab958020000000000001976a914268db0a8104cc6d8afd91233cc8b3d1ace8ac3ef88ac580200000000000017a914ec00dcb368d6a693e11986d265f659d2f59e8be2875802000000000000160014c715799a49a0bae3956df9c17cb4440a673ac0df6f010000",
            "011bec34000000000022512028055142ea437db73382e991861446040b61dd2185c4891d7daf6893d79f7182",
            0,
            "d66de5274a60400c7b08c86ba6b7f198f40660079edf53aca89d2a9501317f2e",
            SIGHASH_ALL,
            Some("20cc4e1107aea1d170c5ff5b6817e1303010049724fb3caa7941792ea9d29b3e2bacab"),
        );
    }

    #[test]
    fn test_taproot_rejects_invalid_hash_type() {
        let tx = decode(&bytes(BIP143_UNSIGNED)).unwrap();
        let spent = bip143_spent();
        let cache = SighashCache::new(&tx, &spent).unwrap();
        assert!(cache.taproot_signature_hash(0, SigHashType(0x04), None).is_err());
        assert!(cache.taproot_signature_hash(0, SigHashType(0x80), None).is_err());
        assert!(cache.taproot_signature_hash(5, SigHashType::ALL, None).is_err());
    }

    #[test]
    fn test_sighash_type_flags() {
        let t = SigHashType(SIGHASH_SINGLE | SIGHASH_ANYONECANPAY);
        assert!(t.is_single());
        assert!(t.anyone_can_pay());
        assert!(!t.is_none());
        assert_eq!(t.as_byte(), 0x83);
        assert_eq!(SigHashType(0).base(), 0);
    }
}
