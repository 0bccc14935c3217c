// Rust Bitcoin client-side cryptography library
// implementing transactions, scripts, keys & PSBT
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Signature digest engine
//!
//! Two preimage constructions selected per input: the legacy algorithm
//! (clone the transaction, blank every signature script except the
//! subscript of the signed input, serialize, append the sighash) and the
//! BIP143 algorithm for segwit inputs (fixed-layout preimage over
//! prevout/sequence/output hashes and the UTXO amount). The digest that gets
//! signed is the double-SHA256 of the preimage.

use bitcoin_hashes::{sha256d, Hash};
use std::fmt::{self, Display, Formatter};

use crate::script::Script;
use crate::serialize::{self, WireEncode};
use crate::transaction::{Transaction, TxOut, Witness};

/// SIGHASH_ALL: commit to all inputs and outputs
pub const SIGHASH_ALL: u32 = 0x01;
/// SIGHASH_NONE: commit to no outputs
pub const SIGHASH_NONE: u32 = 0x02;
/// SIGHASH_SINGLE: commit to the output paired with the signed input
pub const SIGHASH_SINGLE: u32 = 0x03;
/// SIGHASH_ANYONECANPAY flag: commit to the signed input only
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Sighash type committed by a signature: the raw byte appended to every
/// ECDSA signature, exposed through boolean accessors derived on access
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SighashType(u32);

impl SighashType {
    /// The default SIGHASH_ALL
    pub fn all() -> SighashType {
        SighashType(SIGHASH_ALL)
    }

    /// Wraps a raw consensus value
    pub fn from_consensus(raw: u32) -> SighashType {
        SighashType(raw)
    }

    /// Reads the type from the byte stripped off a signature
    pub fn from_byte(byte: u8) -> SighashType {
        SighashType(byte as u32)
    }

    /// Raw consensus value
    pub fn to_u32(self) -> u32 {
        self.0
    }

    /// The byte appended to signatures
    pub fn to_byte(self) -> u8 {
        self.0 as u8
    }

    /// Base mode with the flags masked out
    pub fn base(self) -> u32 {
        self.0 & 0x1f
    }

    /// Whether outputs are not committed at all
    pub fn is_none(self) -> bool {
        self.base() == SIGHASH_NONE
    }

    /// Whether only the paired output is committed
    pub fn is_single(self) -> bool {
        self.base() == SIGHASH_SINGLE
    }

    /// Whether other inputs are left uncommitted
    pub fn is_anyone_can_pay(self) -> bool {
        self.0 & SIGHASH_ANYONECANPAY != 0
    }
}

impl Default for SighashType {
    fn default() -> Self {
        SighashType::all()
    }
}

impl Display for SighashType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let base = match self.base() {
            SIGHASH_NONE => "NONE",
            SIGHASH_SINGLE => "SINGLE",
            _ => "ALL",
        };
        write!(f, "{}", base)?;
        if self.is_anyone_can_pay() {
            write!(f, "|ANYONECANPAY")?;
        }
        Ok(())
    }
}

/// Digest construction failures
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum SighashError {
    /// SIGHASH_SINGLE signing of input {0} has no matching output
    SingleWithoutOutput(usize),

    /// input index {0} is out of range
    InputIndex(usize),

    /// {0}
    #[from]
    Serialize(serialize::Error),
}

/// Legacy signature preimage: the serialized transaction with every
/// signature script blanked except the signed input, which carries the
/// subscript, followed by the sighash type as four little-endian bytes
pub fn legacy_preimage(
    tx: &Transaction,
    input_index: usize,
    subscript: &Script,
    sighash: SighashType,
) -> Result<Vec<u8>, SighashError> {
    if input_index >= tx.inputs.len() {
        return Err(SighashError::InputIndex(input_index));
    }
    if sighash.is_single() && input_index >= tx.outputs.len() {
        // the "1" sentinel of the original client is deliberately not
        // reproduced
        return Err(SighashError::SingleWithoutOutput(input_index));
    }
    let mut tx = tx.clone();
    for input in tx.inputs.iter_mut() {
        input.script_sig = Script::new();
        input.witness = Witness::new();
    }
    tx.inputs[input_index].script_sig = subscript.clone();

    if sighash.is_none() {
        tx.outputs.clear();
    } else if sighash.is_single() {
        tx.outputs.truncate(input_index + 1);
        for output in tx.outputs.iter_mut().take(input_index) {
            *output = TxOut::new(u64::max_value(), Script::new());
        }
    }
    if sighash.is_none() || sighash.is_single() {
        for (index, input) in tx.inputs.iter_mut().enumerate() {
            if index != input_index {
                input.sequence = 0;
            }
        }
    }
    if sighash.is_anyone_can_pay() {
        tx.inputs = vec![tx.inputs[input_index].clone()];
    }

    let mut preimage = tx.serialize_unchecked()?;
    preimage.extend_from_slice(&sighash.to_u32().to_le_bytes());
    Ok(preimage)
}

/// BIP143 signature preimage for segwit inputs
pub fn segwit_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: u64,
    sighash: SighashType,
) -> Result<Vec<u8>, SighashError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(SighashError::InputIndex(input_index))?;
    let zero_hash = [0u8; 32];

    let hash_prevouts = if !sighash.is_anyone_can_pay() {
        let mut buffer = vec![];
        for input in &tx.inputs {
            input.prevout.wire_encode(&mut buffer)?;
        }
        sha256d::Hash::hash(&buffer).to_byte_array()
    } else {
        zero_hash
    };

    let hash_sequence =
        if !sighash.is_anyone_can_pay() && !sighash.is_none() && !sighash.is_single() {
            let mut buffer = vec![];
            for input in &tx.inputs {
                input.sequence.wire_encode(&mut buffer)?;
            }
            sha256d::Hash::hash(&buffer).to_byte_array()
        } else {
            zero_hash
        };

    let hash_outputs = if !sighash.is_none() && !sighash.is_single() {
        let mut buffer = vec![];
        for output in &tx.outputs {
            output.wire_encode(&mut buffer)?;
        }
        sha256d::Hash::hash(&buffer).to_byte_array()
    } else if sighash.is_single() && input_index < tx.outputs.len() {
        let mut buffer = vec![];
        tx.outputs[input_index].wire_encode(&mut buffer)?;
        sha256d::Hash::hash(&buffer).to_byte_array()
    } else {
        zero_hash
    };

    let mut preimage = vec![];
    tx.version.wire_encode(&mut preimage)?;
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    input.prevout.wire_encode(&mut preimage)?;
    script_code.wire_encode(&mut preimage)?;
    value.wire_encode(&mut preimage)?;
    input.sequence.wire_encode(&mut preimage)?;
    preimage.extend_from_slice(&hash_outputs);
    tx.locktime.wire_encode(&mut preimage)?;
    preimage.extend_from_slice(&sighash.to_u32().to_le_bytes());
    Ok(preimage)
}

/// Computes the 32-byte digest actually signed: HASH256 of the preimage
/// built by the algorithm matching the input kind
pub fn signature_digest(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    sighash: SighashType,
    value: u64,
    segwit: bool,
) -> Result<[u8; 32], SighashError> {
    let preimage = if segwit {
        segwit_preimage(tx, input_index, script_code, value, sighash)?
    } else {
        legacy_preimage(tx, input_index, script_code, sighash)?
    };
    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::serialize::WireDecode;

    // BIP143 "native P2WPKH" example, unsigned form
    const BIP143_UNSIGNED_HEX: &str = "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3\
        edf433541db4e4ad969f0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9\
        b2b55d57b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a\
        783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac\
        11000000";

    const BIP143_EXPECTED_PREIMAGE: &str = "0100000096b827c8483d4e9b96712b6713a7b68d6e8003a781\
        feba36c31143470b4efd3752b0a642eea2fb7ae638c36f6252b6750293dbe574a806984b8e4d8548339a3b\
        ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a010000001976a9141d0f17\
        2a0ecb48aee1be1f2687d2963ae33f71a188ac0046c32300000000ffffffff863ef3e1a92afbfdb97f31ad\
        0fc7683ee943e9abcf2501590ff8f6551f47e5e51100000001000000";

    fn unsigned_tx() -> Transaction {
        let bytes = hex::decode(BIP143_UNSIGNED_HEX.split_whitespace().collect::<String>()).unwrap();
        Transaction::wire_deserialize(&bytes).unwrap()
    }

    #[test]
    fn bip143_p2wpkh_vector() {
        let tx = unsigned_tx();
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash
            .copy_from_slice(&hex::decode("1d0f172a0ecb48aee1be1f2687d2963ae33f71a1").unwrap());
        let script_code = Script::new_p2pkh(&pubkey_hash);
        let preimage =
            segwit_preimage(&tx, 1, &script_code, 600_000_000, SighashType::all()).unwrap();
        assert_eq!(
            hex::encode(&preimage),
            BIP143_EXPECTED_PREIMAGE.split_whitespace().collect::<String>()
        );
        let digest =
            signature_digest(&tx, 1, &script_code, SighashType::all(), 600_000_000, true).unwrap();
        assert_eq!(
            hex::encode(digest),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
    }

    #[test]
    fn bip143_invariant_under_unrelated_script_sigs() {
        // the BIP143 digest must not change when another input's signature
        // script is populated
        let mut tx = unsigned_tx();
        let script_code = Script::new_p2pkh(&[0x1d; 20]);
        let before =
            segwit_preimage(&tx, 1, &script_code, 600_000_000, SighashType::all()).unwrap();
        tx.inputs[0].script_sig = Script::from(vec![0x51]);
        let after =
            segwit_preimage(&tx, 1, &script_code, 600_000_000, SighashType::all()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn legacy_preimage_layout() {
        let tx = unsigned_tx();
        let subscript = Script::new_p2pkh(&[0x42; 20]);
        let preimage = legacy_preimage(&tx, 0, &subscript, SighashType::all()).unwrap();
        // trailing four bytes carry the sighash type
        assert_eq!(&preimage[preimage.len() - 4..], &[0x01, 0x00, 0x00, 0x00]);
        // the signed input carries the subscript, the other input is blanked
        let expected_script = subscript.wire_serialize().unwrap();
        assert!(preimage
            .windows(expected_script.len())
            .any(|window| window == expected_script.as_slice()));
    }

    #[test]
    fn sighash_none_commits_no_outputs() {
        let tx = unsigned_tx();
        let subscript = Script::new_p2pkh(&[0x42; 20]);
        let preimage =
            legacy_preimage(&tx, 0, &subscript, SighashType::from_consensus(SIGHASH_NONE))
                .unwrap();
        let all = legacy_preimage(&tx, 0, &subscript, SighashType::all()).unwrap();
        assert!(preimage.len() < all.len());
    }

    #[test]
    fn sighash_single_without_output_unsupported() {
        let mut tx = unsigned_tx();
        tx.outputs.truncate(1);
        let subscript = Script::new_p2pkh(&[0x42; 20]);
        assert_eq!(
            legacy_preimage(&tx, 1, &subscript, SighashType::from_consensus(SIGHASH_SINGLE)),
            Err(SighashError::SingleWithoutOutput(1))
        );
    }

    #[test]
    fn anyone_can_pay_single_input() {
        let tx = unsigned_tx();
        let subscript = Script::new_p2pkh(&[0x42; 20]);
        let preimage = legacy_preimage(
            &tx,
            1,
            &subscript,
            SighashType::from_consensus(SIGHASH_ALL | SIGHASH_ANYONECANPAY),
        )
        .unwrap();
        // a single input is serialized: compactsize 0x01 after the version
        assert_eq!(preimage[4], 0x01);
    }

    #[test]
    fn type_accessors() {
        let sighash = SighashType::from_byte(0x83);
        assert!(sighash.is_single());
        assert!(sighash.is_anyone_can_pay());
        assert!(!sighash.is_none());
        assert_eq!(sighash.to_byte(), 0x83);
        assert_eq!(sighash.to_string(), "SINGLE|ANYONECANPAY");
        assert_eq!(SighashType::default().to_u32(), SIGHASH_ALL);
    }
}
