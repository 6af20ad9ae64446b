//! Wire format and digest tests against transactions assembled by hand

use utxo_signer::address::lock_script_for_address;
use utxo_signer::crypto::KeyStore;
use utxo_signer::script::{build_op_return_script, build_pay_to_public_key_hash};
use utxo_signer::sighash::{SigHashType, SighashCache};
use utxo_signer::transaction::{decode, encode, encoded_size, txid, TxEncoding};
use utxo_signer::*;

fn bytes(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str).unwrap()
}

fn hash(hex_str: &str) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes(hex_str));
    out
}

fn input(prevout: OutPoint) -> TransactionInput {
    TransactionInput {
        prevout,
        script_sig: Vec::new(),
        sequence: prevout.sequence,
        witness: Vec::new(),
    }
}

fn output(value: Amount, script_pubkey: Vec<u8>) -> TransactionOutput {
    TransactionOutput { value, script_pubkey }
}

#[test]
fn test_encode_unsigned_segwit_layout() {
    let tx = Transaction {
        version: 1,
        inputs: vec![
            input(
                OutPoint::new(hash("fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f"), 0)
                    .with_sequence(0xffff_ffee),
            ),
            input(OutPoint::new(
                hash("ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a"),
                1,
            )),
        ],
        outputs: vec![
            output(112_340_000, bytes("76a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac")),
            output(223_450_000, bytes("76a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac")),
        ],
        lock_time: 0x11,
    };

    let encoded = encode(&tx, TxEncoding::Segwit);
    assert_eq!(encoded.len(), 164);
    assert_eq!(
        hex::encode(&encoded),
        concat!(
            "01000000", "0001",
            "02",
            "fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f", "00000000", "00", "eeffffff",
            "ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a", "01000000", "00", "ffffffff",
            "02",
            "202cb20600000000", "19", "76a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac",
            "9093510d00000000", "19", "76a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac",
            "00",
            "00",
            "11000000"
        )
    );
}

#[test]
fn test_encode_unsigned_legacy_layout() {
    let tx = Transaction {
        version: 1,
        inputs: vec![input(OutPoint::new(
            hash("36641869ca081e70f394c6948e8af409e18b619df2ed74aa106c1ca29787b96e"),
            1,
        ))],
        outputs: vec![
            output(0x35a4_e900, bytes("76a914389ffce9cd9ae88dcc0631e88a821ffdbe9bfe2688ac")),
            output(0x052f_83c0, bytes("76a9147480a33f950689af511e6e84c138dbbd3c3ee41588ac")),
        ],
        lock_time: 0,
    };
    assert_eq!(
        hex::encode(encode(&tx, TxEncoding::Legacy)),
        concat!(
            "01000000",
            "01",
            "36641869ca081e70f394c6948e8af409e18b619df2ed74aa106c1ca29787b96e", "01000000", "00", "ffffffff",
            "02",
            "00e9a43500000000", "19", "76a914389ffce9cd9ae88dcc0631e88a821ffdbe9bfe2688ac",
            "c0832f0500000000", "19", "76a9147480a33f950689af511e6e84c138dbbd3c3ee41588ac",
            "00000000"
        )
    );
}

#[test]
fn test_manual_bip143_signature_litecoin_9e3f() {
    let params = ChainParams::litecoin();
    let own = "ltc1qt36tu30tgk35tyzsve6jjq3dnhu2rm8l8v5q00";
    let utxo_amount: Amount = 3_851_829;

    let mut tx = Transaction {
        version: 1,
        inputs: vec![input(
            OutPoint::from_txid_hex("bbe736ada63c4678025dff0ff24d5f38970a3e4d7a2f77808689ed68004f55fe", 0)
                .unwrap(),
        )],
        outputs: vec![
            output(
                1_000_000,
                lock_script_for_address("ltc1qgknskahmm6svn42e33gum5wc4dz44wt9vc76q4", &params).unwrap(),
            ),
            output(
                2_000_000,
                lock_script_for_address("ltc1qulgtqdgxyd9nxnn5yxft6jykskz0ffl30nu32z", &params).unwrap(),
            ),
            output(
                utxo_amount - 1_000_000 - 2_000_000 - 172,
                lock_script_for_address(own, &params).unwrap(),
            ),
        ],
        lock_time: 0,
    };
    assert_eq!(encode(&tx, TxEncoding::Segwit).len(), 147);

    let own_script = lock_script_for_address(own, &params).unwrap();
    let mut key_hash = [0u8; 20];
    key_hash.copy_from_slice(&own_script[2..]);
    let script_code = build_pay_to_public_key_hash(&key_hash);
    assert_eq!(hex::encode(&script_code), "76a9145c74be45eb45a3459050667529022d9df8a1ecff88ac");

    let store = KeyStore::new(&[bytes("b820f41f96c8b7442f3260acd23b3897e1450b8c7c6580136a3c2d3a14e34674")])
        .unwrap();
    let key = &store.keys()[0];
    assert_eq!(
        hex::encode(key.compressed()),
        "036739829f2cfec79cfe6aaf1c22ecb7d4867dfd8ab4deb7121b36a00ab646caed"
    );

    let spent = vec![output(utxo_amount, own_script)];
    let digest = {
        let cache = SighashCache::new(&tx, &spent).unwrap();
        cache
            .segwit_v0_signature_hash(0, &script_code, utxo_amount, SigHashType::ALL, None)
            .unwrap()
    };
    let mut sig = store.sign_ecdsa(key, &digest);
    sig.push(SigHashType::ALL.as_byte());
    assert_eq!(
        hex::encode(&sig),
        "30450221008d88197a37ffcb51ecacc7e826aa588cb1068a107a82373c4b54ec42318a395c02204abbf5408504614d8f943d67e7873506c575e85a5e1bd92a02cd345e5192a82701"
    );

    tx.inputs[0].witness = vec![sig, key.compressed().to_vec()];
    let encoded = encode(&tx, TxEncoding::Segwit);
    assert_eq!(encoded.len(), 254);
    assert_eq!(txid(&tx), "9e3fe98565a904d2da5ec1b3ba9d2b3376dfc074f43d113ce1caac01bf51b34c");
}

#[test]
fn test_build_thorchain_swap_with_memo() {
    let params = ChainParams::bitcoin();
    let memo = b"SWAP:THOR.RUNE:thor1tpercamkkxec0q0jk6ltdnlqvsw29guap8wmcl:";
    let op_return = build_op_return_script(memo).unwrap();
    assert_eq!(
        hex::encode(&op_return),
        "6a3b535741503a54484f522e52554e453a74686f72317470657263616d6b6b7865633071306a6b366c74646e6c7176737732396775617038776d636c3a"
    );

    let mut tx = Transaction {
        version: 2,
        inputs: vec![input(
            OutPoint::from_txid_hex("30b82960291a39de3664ec4c844a815e3e680e29b4d3a919e450f0c119cf4e35", 1)
                .unwrap(),
        )],
        outputs: vec![
            output(
                300_000,
                lock_script_for_address("bc1qxu5a8gtnjxw3xwdlmr2gl9d76h9fysu3zl656e", &params).unwrap(),
            ),
            output(
                342_101 - 300_000 - 36_888,
                lock_script_for_address("bc1q7s0a2l4aguksehx8hf93hs9yggl6njxds6m02g", &params).unwrap(),
            ),
            output(0, op_return),
        ],
        lock_time: 0,
    };
    assert_eq!(encode(&tx, TxEncoding::Segwit).len(), 186);

    tx.inputs[0].witness = vec![
        bytes("3045022100876eba8f9324d3fbb00b9dad9a34a8166dd75127d4facda63484c19703e9c178022052495a6229cc465d5f0fcf3cde3b22a0f861e762d0bb10acde26a57598bfe7e701"),
        bytes("0206121b83ebfddbb1997b50cb87b968190857269333e21e295142c8b88af9312a"),
    ];
    let encoded = encode(&tx, TxEncoding::Segwit);
    assert_eq!(encoded.len(), 293);
    assert_eq!(
        hex::encode(&encoded),
        concat!(
            "02000000000101354ecf19c1f050e419a9d3b4290e683e5e814a844cec6436de391a296029b8300100000000ffffffff03e0930400000000001600143729d3a1",
            "73919d1339bfd8d48f95bed5ca9243915d14000000000000160014f41fd57ebd472d0cdcc7ba4b1bc0a4423fa9c8cd00000000000000003d6a3b535741503a54",
            "484f522e52554e453a74686f72317470657263616d6b6b7865633071306a6b366c74646e6c7176737732396775617038776d636c3a02483045022100876eba8f",
            "9324d3fbb00b9dad9a34a8166dd75127d4facda63484c19703e9c178022052495a6229cc465d5f0fcf3cde3b22a0f861e762d0bb10acde26a57598bfe7e70121",
            "0206121b83ebfddbb1997b50cb87b968190857269333e21e295142c8b88af9312a00000000"
        )
    );
    assert_eq!(txid(&tx), "eb4c1b064bfaf593d7cc6a5c73b75f932ffefe12a0478acf5a7e3145476683fc");

    // A broadcast transaction parses back to the same structure
    let decoded = decode(&encoded).unwrap();
    assert_eq!(decoded, tx);
    assert_eq!(encoded_size(&decoded), encoded_size(&tx));
}
