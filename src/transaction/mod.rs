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

//! Transaction model
//!
//! Inputs, outputs and witness stacks with BIP141-aware serialization,
//! txid/wtxid computation, fee and weight accounting, and end-to-end
//! verification running every input through the script interpreter bound to
//! the transaction.

pub mod sighash;
pub mod signer;

use bitcoin_hashes::{sha256, sha256d, Hash};
use std::fmt::{self, Debug, Display, Formatter};
use std::io;
use std::str::FromStr;

use crate::script::interpreter::{
    ScriptRunner, TransactionContext, LOCKTIME_THRESHOLD, SEQUENCE_FINAL,
    SEQUENCE_LOCKTIME_DISABLE, SEQUENCE_LOCKTIME_MASK, SEQUENCE_LOCKTIME_TYPE,
};
use crate::script::{Instruction, Script, ScriptError, ScriptType};
use crate::serialize::{self, VarInt, WireDecode, WireEncode};
use crate::utxo::{Block, Utxo, UtxoError, UtxoStore};

/// Transaction identifier in internal (wire) byte order. The display form is
/// byte-reversed, as everywhere in the Bitcoin ecosystem.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Txid([u8; 32]);

impl Txid {
    /// Wraps raw bytes in internal order
    pub fn from_bytes(bytes: [u8; 32]) -> Txid {
        Txid(bytes)
    }

    /// Raw bytes in internal order
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses the display form (byte-reversed hex)
    pub fn from_hex(s: &str) -> Result<Txid, serialize::Error> {
        let mut bytes = hex::decode(s)
            .map_err(|err| serialize::Error::DataIntegrityError(err.to_string()))?;
        if bytes.len() != 32 {
            return Err(serialize::Error::DataIntegrityError(format!(
                "txid must be 32 bytes, not {}",
                bytes.len()
            )));
        }
        bytes.reverse();
        let mut array = [0u8; 32];
        array.copy_from_slice(&bytes);
        Ok(Txid(array))
    }

    /// Display form: byte-reversed hex
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }
}

impl Display for Txid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for Txid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({})", self.to_hex())
    }
}

impl FromStr for Txid {
    type Err = serialize::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Txid::from_hex(s)
    }
}

impl WireEncode for Txid {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, serialize::Error> {
        e.write_all(&self.0)?;
        Ok(32)
    }
}

impl WireDecode for Txid {
    fn wire_decode<D: io::Read>(d: D) -> Result<Self, serialize::Error> {
        Ok(Txid(<[u8; 32]>::wire_decode(d)?))
    }
}

/// Reference to a transaction output: previous txid plus output index
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OutPoint {
    /// Identifier of the transaction the output was created in
    pub txid: Txid,
    /// Index of the output within that transaction
    pub vout: u32,
}

impl OutPoint {
    /// Constructs an outpoint
    pub fn new(txid: Txid, vout: u32) -> OutPoint {
        OutPoint { txid, vout }
    }
}

impl Display for OutPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl WireEncode for OutPoint {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, serialize::Error> {
        let mut len = self.txid.wire_encode(&mut e)?;
        len += self.vout.wire_encode(&mut e)?;
        Ok(len)
    }
}

impl WireDecode for OutPoint {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, serialize::Error> {
        Ok(OutPoint {
            txid: Txid::wire_decode(&mut d)?,
            vout: u32::wire_decode(&mut d)?,
        })
    }
}

/// Per-input witness stack: a sequence of byte strings carried outside the
/// signature script in segwit transactions
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Witness(Vec<Vec<u8>>);

impl Witness {
    /// Empty witness
    pub fn new() -> Witness {
        Witness(vec![])
    }

    /// Number of stack items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the witness carries no items
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends an item
    pub fn push(&mut self, item: Vec<u8>) {
        self.0.push(item);
    }

    /// Borrowed stack items, bottom first
    pub fn items(&self) -> &[Vec<u8>] {
        &self.0
    }

    /// Consumes the witness returning its items
    pub fn into_items(self) -> Vec<Vec<u8>> {
        self.0
    }
}

impl From<Vec<Vec<u8>>> for Witness {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Witness(items)
    }
}

impl WireEncode for Witness {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, serialize::Error> {
        let mut len = VarInt::from(self.0.len()).wire_encode(&mut e)?;
        for item in &self.0 {
            len += item.wire_encode(&mut e)?;
        }
        Ok(len)
    }
}

impl WireDecode for Witness {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, serialize::Error> {
        let count = VarInt::wire_decode(&mut d)?.to_usize()?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(Vec::<u8>::wire_decode(&mut d)?);
        }
        Ok(Witness(items))
    }
}

/// Transaction input
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxIn {
    /// Output being consumed
    pub prevout: OutPoint,
    /// Unlocking script (empty for segwit spends)
    pub script_sig: Script,
    /// Sequence number carrying BIP68 relative locktime semantics
    pub sequence: u32,
    /// Witness stack (empty for pre-segwit spends)
    pub witness: Witness,
}

impl TxIn {
    /// Constructs an input spending the given outpoint with final sequence
    /// and empty scripts
    pub fn new(prevout: OutPoint) -> TxIn {
        TxIn {
            prevout,
            script_sig: Script::new(),
            sequence: SEQUENCE_FINAL,
            witness: Witness::new(),
        }
    }
}

impl WireEncode for TxIn {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, serialize::Error> {
        let mut len = self.prevout.wire_encode(&mut e)?;
        len += self.script_sig.wire_encode(&mut e)?;
        len += self.sequence.wire_encode(&mut e)?;
        Ok(len)
    }
}

impl WireDecode for TxIn {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, serialize::Error> {
        Ok(TxIn {
            prevout: OutPoint::wire_decode(&mut d)?,
            script_sig: Script::wire_decode(&mut d)?,
            sequence: u32::wire_decode(&mut d)?,
            witness: Witness::new(),
        })
    }
}

/// Transaction output
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxOut {
    /// Output value in satoshi
    pub value: u64,
    /// Locking script
    pub script_pubkey: Script,
}

impl TxOut {
    /// Constructs an output
    pub fn new(value: u64, script_pubkey: Script) -> TxOut {
        TxOut {
            value,
            script_pubkey,
        }
    }

    /// Whether the locking script matches one of the standard templates
    pub fn is_standard(&self) -> bool {
        self.script_pubkey.is_standard()
    }

    /// Whether the output is a provably unspendable data carrier
    pub fn is_null_data(&self) -> bool {
        self.script_pubkey.script_type() == Some(ScriptType::NullData)
    }
}

impl WireEncode for TxOut {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, serialize::Error> {
        let mut len = self.value.wire_encode(&mut e)?;
        len += self.script_pubkey.wire_encode(&mut e)?;
        Ok(len)
    }
}

impl WireDecode for TxOut {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, serialize::Error> {
        Ok(TxOut {
            value: u64::wire_decode(&mut d)?,
            script_pubkey: Script::wire_decode(&mut d)?,
        })
    }
}

/// Transaction-level errors
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum TransactionError {
    /// transaction has no inputs
    NoInputs,

    /// transaction has no outputs
    NoOutputs,

    /// input {0} failed script validation: {1}
    Script(usize, ScriptError),

    /// input {0}: {1}
    Utxo(usize, UtxoError),

    /// input {0} does not satisfy the spending conditions of its previous
    /// output
    InvalidSpend(usize),

    /// input {0} spends a segwit output with a non-empty signature script
    SegwitSigScript(usize),

    /// input {0} witness does not match the witness program
    BadWitness(usize),

    /// transaction locktime {0} is not reached at {1}
    LocktimeNotMet(u32, u32),

    /// input {0} relative timelock is not satisfied
    SequenceNotMet(usize),

    /// input {0}: {1} spending is not supported
    NotSupported(usize, String),

    /// outputs spend {0} satoshi more than the inputs provide
    Overspend(u64),

    /// malformed transaction: {0}
    #[from]
    Serialize(serialize::Error),
}

/// Bitcoin transaction
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transaction {
    /// Version number (2 enables BIP68 relative locktimes)
    pub version: u32,
    /// Ordered input list
    pub inputs: Vec<TxIn>,
    /// Ordered output list
    pub outputs: Vec<TxOut>,
    /// Absolute locktime: block height below 500 000 000, timestamp above
    pub locktime: u32,
}

impl Transaction {
    /// Constructs an empty version-2 transaction
    pub fn new() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![],
            outputs: vec![],
            locktime: 0,
        }
    }

    /// Whether any input carries witness data
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    fn check_serializable(&self) -> Result<(), serialize::Error> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(serialize::Error::DataIntegrityError(
                "transaction without inputs or outputs cannot be serialized".to_owned(),
            ));
        }
        Ok(())
    }

    // digest construction serializes modified clones which may legitimately
    // have no outputs (SIGHASH_NONE), so the shape check lives in the public
    // entry points only
    fn encode_internal<E: io::Write>(
        &self,
        mut e: E,
        with_witness: bool,
    ) -> Result<usize, serialize::Error> {
        let witness = with_witness && self.has_witness();
        let mut len = self.version.wire_encode(&mut e)?;
        if witness {
            e.write_all(&[0x00, 0x01])?;
            len += 2;
        }
        len += VarInt::from(self.inputs.len()).wire_encode(&mut e)?;
        for input in &self.inputs {
            len += input.wire_encode(&mut e)?;
        }
        len += VarInt::from(self.outputs.len()).wire_encode(&mut e)?;
        for output in &self.outputs {
            len += output.wire_encode(&mut e)?;
        }
        if witness {
            for input in &self.inputs {
                len += input.witness.wire_encode(&mut e)?;
            }
        }
        len += self.locktime.wire_encode(&mut e)?;
        Ok(len)
    }

    /// Serializes without the witness fields, the form committed by txids
    /// and legacy signature digests
    pub fn serialize_without_witness(&self) -> Result<Vec<u8>, serialize::Error> {
        self.check_serializable()?;
        self.serialize_unchecked()
    }

    pub(crate) fn serialize_unchecked(&self) -> Result<Vec<u8>, serialize::Error> {
        let mut buffer = vec![];
        self.encode_internal(&mut buffer, false)?;
        Ok(buffer)
    }

    /// Transaction id: double-SHA256 of the non-witness serialization
    pub fn txid(&self) -> Result<Txid, serialize::Error> {
        let serialized = self.serialize_without_witness()?;
        Ok(Txid(sha256d::Hash::hash(&serialized).to_byte_array()))
    }

    /// Witness transaction id: double-SHA256 of the full serialization
    pub fn wtxid(&self) -> Result<Txid, serialize::Error> {
        let serialized = self.wire_serialize()?;
        Ok(Txid(sha256d::Hash::hash(&serialized).to_byte_array()))
    }

    /// Size of the full serialization in bytes
    pub fn size(&self) -> Result<usize, serialize::Error> {
        Ok(self.wire_serialize()?.len())
    }

    /// BIP141 transaction weight: three times the base size plus the total
    /// size
    pub fn weight(&self) -> Result<usize, serialize::Error> {
        let base = self.serialize_without_witness()?.len();
        let total = self.size()?;
        Ok(base * 3 + total)
    }

    /// Virtual size: weight divided by four, rounded up
    pub fn vsize(&self) -> Result<usize, serialize::Error> {
        Ok((self.weight()? + 3) / 4)
    }

    /// Fee paid by the transaction: input values minus output values
    pub fn fee(&self, store: &mut UtxoStore) -> Result<u64, TransactionError> {
        let mut input_sum = 0u64;
        for (index, input) in self.inputs.iter().enumerate() {
            let utxo = store
                .get(&input.prevout)
                .map_err(|err| TransactionError::Utxo(index, err))?;
            input_sum += utxo.output.value;
        }
        let output_sum: u64 = self.outputs.iter().map(|output| output.value).sum();
        input_sum
            .checked_sub(output_sum)
            .ok_or_else(|| TransactionError::Overspend(output_sum - input_sum))
    }

    /// Applies the transaction to the UTXO set: consumed outpoints are
    /// unregistered, created outputs are registered under this transaction's
    /// id (nulldata outputs excepted)
    pub fn update_utxos(&self, store: &mut UtxoStore) -> Result<(), TransactionError> {
        let txid = self.txid()?;
        for input in &self.inputs {
            store.unregister(&input.prevout);
        }
        for (vout, output) in self.outputs.iter().enumerate() {
            store.register(Utxo::new(txid, vout as u32, output.clone()));
        }
        debug!("applied transaction {} to the utxo set", txid);
        Ok(())
    }

    /// Verifies every input against its UTXO: script execution (including
    /// P2SH unwrapping and native/nested segwit paths) plus, when a block
    /// context is supplied, absolute locktime and BIP68 relative sequence
    /// checks. Fails on the first failing input.
    pub fn verify(
        &self,
        store: &mut UtxoStore,
        block: Option<&Block>,
    ) -> Result<(), TransactionError> {
        if self.inputs.is_empty() {
            return Err(TransactionError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        if let Some(block) = block {
            self.check_locktime(block)?;
        }
        for index in 0..self.inputs.len() {
            let input = &self.inputs[index];
            let utxo = store
                .get(&input.prevout)
                .map_err(|err| TransactionError::Utxo(index, err))?;
            if let Some(block) = block {
                self.check_sequence(index, &utxo, block)?;
            }
            self.verify_input(index, &utxo)?;
        }
        Ok(())
    }

    fn check_locktime(&self, block: &Block) -> Result<(), TransactionError> {
        if self.locktime == 0 {
            return Ok(());
        }
        if self
            .inputs
            .iter()
            .all(|input| input.sequence == SEQUENCE_FINAL)
        {
            return Ok(());
        }
        let locktime = self.locktime as i64;
        let reference = if locktime < LOCKTIME_THRESHOLD {
            block.height as i64
        } else {
            block.timestamp as i64
        };
        if locktime >= reference {
            return Err(TransactionError::LocktimeNotMet(
                self.locktime,
                reference as u32,
            ));
        }
        Ok(())
    }

    fn check_sequence(
        &self,
        index: usize,
        utxo: &Utxo,
        block: &Block,
    ) -> Result<(), TransactionError> {
        if self.version < 2 {
            return Ok(());
        }
        let sequence = self.inputs[index].sequence;
        if sequence & SEQUENCE_LOCKTIME_DISABLE != 0 {
            return Ok(());
        }
        let prev_block = match &utxo.block {
            Some(prev_block) => prev_block,
            None => return Ok(()),
        };
        let value = (sequence & SEQUENCE_LOCKTIME_MASK) as u64;
        let satisfied = if sequence & SEQUENCE_LOCKTIME_TYPE != 0 {
            prev_block.timestamp as u64 + value * 512 <= block.timestamp as u64
        } else {
            prev_block.height as u64 + value <= block.height as u64
        };
        if !satisfied {
            return Err(TransactionError::SequenceNotMet(index));
        }
        Ok(())
    }

    fn context<'a>(&'a self, index: usize, value: u64, segwit: bool) -> TransactionContext<'a> {
        TransactionContext {
            tx: self,
            input_index: index,
            input_value: value,
            segwit,
        }
    }

    fn verify_input(&self, index: usize, utxo: &Utxo) -> Result<(), TransactionError> {
        let input = &self.inputs[index];
        let lock = &utxo.output.script_pubkey;
        let lock_type = lock.script_type();
        let value = utxo.output.value;
        trace!(
            "verifying input {} against {} output {}",
            index,
            lock_type.map(|t| t.to_string()).unwrap_or_else(|| "non-standard".to_owned()),
            input.prevout,
        );

        match lock_type {
            Some(ScriptType::P2tr) => {
                Err(TransactionError::NotSupported(index, "taproot".to_owned()))
            }
            Some(ScriptType::P2wpkh) | Some(ScriptType::P2wsh) => {
                if !input.script_sig.is_empty() {
                    return Err(TransactionError::SegwitSigScript(index));
                }
                let program = lock
                    .recognize()
                    .and_then(|recognized| recognized.payload)
                    .ok_or(TransactionError::BadWitness(index))?;
                self.verify_witness(index, lock_type.expect("matched above"), &program, value)
            }
            Some(ScriptType::P2sh) => {
                // nested segwit takes the witness path when the signature
                // script is exactly one push of a witness program
                if let Some(program_script) = single_push(&input.script_sig) {
                    let program_type = program_script.script_type();
                    if matches!(program_type, Some(ScriptType::P2wpkh) | Some(ScriptType::P2wsh))
                    {
                        let expected =
                            bitcoin_hashes::hash160::Hash::hash(program_script.as_bytes())
                                .to_byte_array();
                        let lock_hash = lock
                            .recognize()
                            .and_then(|recognized| recognized.payload)
                            .ok_or(TransactionError::InvalidSpend(index))?;
                        if lock_hash != expected {
                            return Err(TransactionError::InvalidSpend(index));
                        }
                        let program = program_script
                            .recognize()
                            .and_then(|recognized| recognized.payload)
                            .ok_or(TransactionError::BadWitness(index))?;
                        return self.verify_witness(
                            index,
                            program_type.expect("matched above"),
                            &program,
                            value,
                        );
                    }
                }
                self.verify_legacy(index, utxo, true)
            }
            _ => self.verify_legacy(index, utxo, false),
        }
    }

    fn verify_legacy(
        &self,
        index: usize,
        utxo: &Utxo,
        p2sh: bool,
    ) -> Result<(), TransactionError> {
        let input = &self.inputs[index];
        let lock = &utxo.output.script_pubkey;
        let mut runner = ScriptRunner::new(Some(self.context(index, utxo.output.value, false)));
        runner
            .execute(&input.script_sig)
            .map_err(|err| TransactionError::Script(index, err))?;
        let sig_stack = runner.stack().to_vec();
        runner
            .execute(lock)
            .map_err(|err| TransactionError::Script(index, err))?;
        if !runner.success() {
            return Err(TransactionError::InvalidSpend(index));
        }
        if !p2sh {
            return Ok(());
        }
        // BIP16: rerun the embedded redeem script over the remaining pushes
        let mut stack = sig_stack;
        let redeem_bytes = stack.pop().ok_or(TransactionError::InvalidSpend(index))?;
        let redeem = Script::from(redeem_bytes);
        let mut runner = ScriptRunner::new(Some(self.context(index, utxo.output.value, false)));
        runner.set_stack(stack);
        runner
            .execute(&redeem)
            .map_err(|err| TransactionError::Script(index, err))?;
        if !runner.success() {
            return Err(TransactionError::InvalidSpend(index));
        }
        Ok(())
    }

    fn verify_witness(
        &self,
        index: usize,
        program_type: ScriptType,
        program: &[u8],
        value: u64,
    ) -> Result<(), TransactionError> {
        let witness = self.inputs[index].witness.items();
        match program_type {
            ScriptType::P2wpkh => {
                if witness.len() != 2 || program.len() != 20 {
                    return Err(TransactionError::BadWitness(index));
                }
                let mut hash = [0u8; 20];
                hash.copy_from_slice(program);
                let implied = Script::new_p2pkh(&hash);
                let mut runner = ScriptRunner::new(Some(self.context(index, value, true)));
                runner.set_stack(witness.to_vec());
                runner
                    .execute(&implied)
                    .map_err(|err| TransactionError::Script(index, err))?;
                if !runner.success() {
                    return Err(TransactionError::InvalidSpend(index));
                }
                Ok(())
            }
            ScriptType::P2wsh => {
                let (script_bytes, stack) = match witness.split_last() {
                    Some(split) => split,
                    None => return Err(TransactionError::BadWitness(index)),
                };
                if sha256::Hash::hash(script_bytes).to_byte_array()[..] != program[..] {
                    return Err(TransactionError::BadWitness(index));
                }
                let witness_script = Script::from(script_bytes.clone());
                let mut runner = ScriptRunner::new(Some(self.context(index, value, true)));
                runner.set_stack(stack.to_vec());
                runner
                    .execute(&witness_script)
                    .map_err(|err| TransactionError::Script(index, err))?;
                if !runner.success() {
                    return Err(TransactionError::InvalidSpend(index));
                }
                Ok(())
            }
            _ => Err(TransactionError::BadWitness(index)),
        }
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction::new()
    }
}

/// Extracts the payload of a signature script consisting of exactly one data
/// push
fn single_push(script: &Script) -> Option<Script> {
    match script.instructions().ok()?.as_slice() {
        [Instruction::PushBytes(data)] => Some(Script::from(data.clone())),
        _ => None,
    }
}

impl WireEncode for Transaction {
    fn wire_encode<E: io::Write>(&self, e: E) -> Result<usize, serialize::Error> {
        self.check_serializable()?;
        self.encode_internal(e, true)
    }
}

impl WireDecode for Transaction {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, serialize::Error> {
        let version = u32::wire_decode(&mut d)?;
        let mut input_count = VarInt::wire_decode(&mut d)?;
        let mut segwit = false;
        if input_count.0 == 0 {
            // BIP141 marker: zero inputs means "marker + flag" follow
            let flag = u8::wire_decode(&mut d)?;
            if flag != 0x01 {
                return Err(serialize::Error::DataIntegrityError(format!(
                    "invalid segwit flag byte {:#04x}",
                    flag
                )));
            }
            segwit = true;
            input_count = VarInt::wire_decode(&mut d)?;
        }
        let input_count = input_count.to_usize()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024));
        for _ in 0..input_count {
            inputs.push(TxIn::wire_decode(&mut d)?);
        }
        let output_count = VarInt::wire_decode(&mut d)?.to_usize()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024));
        for _ in 0..output_count {
            outputs.push(TxOut::wire_decode(&mut d)?);
        }
        if segwit {
            for input in inputs.iter_mut() {
                input.witness = Witness::wire_decode(&mut d)?;
            }
        }
        let locktime = u32::wire_decode(&mut d)?;
        Ok(Transaction {
            version,
            inputs,
            outputs,
            locktime,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::script::num::encode_num;
    use crate::script::{Builder, OpCode};
    use num_bigint::BigInt;

    // the first P2PK spend ever mined (block 170)
    const FIRST_SPEND_HEX: &str = "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c3524\
        23edce25857fcd3704000000004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6\
        c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901\
        ffffffff0200ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71\
        302fa28414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee00\
        00000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb\
        84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000";

    const FIRST_SPEND_PREVOUT_SCRIPT: &str = "410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1\
        482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac";

    // BIP143 P2WPKH example: one P2PK input, one native P2WPKH input
    const BIP143_SIGNED_HEX: &str = "01000000000102fff7f7881a8099afa6940d42d1e7f6362bec38171e\
        a3edf433541db4e4ad969f00000000494830450221008b9d1dc26ba6a9cb62127b02742fa9d754cd3bebf3\
        37f7a55d114c8e5cdd30be022040529b194ba3f9281a99f2b1c0a19c0489bc22ede944ccf4ecbab4cc618e\
        f3ed01eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a01000000\
        00ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac909351\
        0d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac00024730440220360\
        9e17b84f6a7d30c80bfa610b5b4542f32a8a0d5447a12fb1366d7f01cc44a0220573a954c4518331561406\
        f90300e8f3358f51928d43c212a8caed02de67eebee0121025476c2e83188368da1ff3e292e7acafcdb356\
        6bb0ad253f62fc70f07aeee635711000000";

    fn strip(hex_str: &str) -> String {
        hex_str.split_whitespace().collect()
    }

    fn parse_tx(hex_str: &str) -> Transaction {
        let bytes = hex::decode(strip(hex_str)).unwrap();
        Transaction::wire_deserialize(&bytes).unwrap()
    }

    fn register_prevout(store: &mut UtxoStore, tx: &Transaction, index: usize, script_hex: &str, value: u64) {
        let prevout = tx.inputs[index].prevout;
        let output = TxOut::new(value, Script::from_hex(&strip(script_hex)).unwrap());
        store.register(Utxo::new(prevout.txid, prevout.vout, output));
    }

    #[test]
    fn roundtrip_and_txid() {
        let bytes = hex::decode(strip(FIRST_SPEND_HEX)).unwrap();
        let tx = Transaction::wire_deserialize(&bytes).unwrap();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.version, 1);
        assert_eq!(tx.locktime, 0);
        assert_eq!(tx.outputs[0].value, 1_000_000_000);
        assert_eq!(tx.wire_serialize().unwrap(), bytes);
        assert_eq!(
            tx.txid().unwrap().to_hex(),
            "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16"
        );
    }

    #[test]
    fn segwit_roundtrip() {
        let bytes = hex::decode(strip(BIP143_SIGNED_HEX)).unwrap();
        let tx = Transaction::wire_deserialize(&bytes).unwrap();
        assert_eq!(tx.inputs.len(), 2);
        assert!(tx.inputs[0].witness.is_empty());
        assert_eq!(tx.inputs[1].witness.len(), 2);
        assert_eq!(tx.wire_serialize().unwrap(), bytes);
        // the non-witness serialization drops marker, flag and witnesses
        let base = tx.serialize_without_witness().unwrap();
        assert!(base.len() < bytes.len());
        assert_eq!(&base[..4], &bytes[..4]);
    }

    #[test]
    fn verify_first_p2pk_spend() {
        let tx = parse_tx(FIRST_SPEND_HEX);
        let mut store = UtxoStore::new();
        register_prevout(&mut store, &tx, 0, FIRST_SPEND_PREVOUT_SCRIPT, 5_000_000_000);
        tx.verify(&mut store, None).unwrap();
    }

    #[test]
    fn legacy_digest_matches_p2pk_preimage() {
        use crate::transaction::sighash::{legacy_preimage, SighashType};

        let tx = parse_tx(FIRST_SPEND_HEX);
        let subscript = Script::from_hex(&strip(FIRST_SPEND_PREVOUT_SCRIPT)).unwrap();
        let preimage = legacy_preimage(&tx, 0, &subscript, SighashType::all()).unwrap();
        // the preimage is the transaction with the signature push swapped
        // for the previous locking script, followed by the sighash type
        let signature_push = "4847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c615\
            48ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901";
        let expected = strip(FIRST_SPEND_HEX).replace(
            &strip(signature_push),
            &format!("43{}", strip(FIRST_SPEND_PREVOUT_SCRIPT)),
        ) + "01000000";
        assert_eq!(hex::encode(preimage), expected);
    }

    #[test]
    fn verify_bip143_example() {
        let tx = parse_tx(BIP143_SIGNED_HEX);
        let mut store = UtxoStore::new();
        register_prevout(
            &mut store,
            &tx,
            0,
            "2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432ac",
            625_000_000,
        );
        register_prevout(
            &mut store,
            &tx,
            1,
            "00141d0f172a0ecb48aee1be1f2687d2963ae33f71a1",
            600_000_000,
        );
        tx.verify(&mut store, None).unwrap();
    }

    #[test]
    fn tampered_witness_fails() {
        let mut tx = parse_tx(BIP143_SIGNED_HEX);
        let mut items = tx.inputs[1].witness.clone().into_items();
        items[0][10] ^= 0x01;
        tx.inputs[1].witness = Witness::from(items);

        let mut store = UtxoStore::new();
        register_prevout(
            &mut store,
            &tx,
            0,
            "2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432ac",
            625_000_000,
        );
        register_prevout(
            &mut store,
            &tx,
            1,
            "00141d0f172a0ecb48aee1be1f2687d2963ae33f71a1",
            600_000_000,
        );
        assert!(tx.verify(&mut store, None).is_err());
    }

    #[test]
    fn missing_utxo_reported() {
        let tx = parse_tx(FIRST_SPEND_HEX);
        let mut store = UtxoStore::new();
        match tx.verify(&mut store, None) {
            Err(TransactionError::Utxo(0, _)) => {}
            other => panic!("expected missing-utxo failure, got {:?}", other),
        }
    }

    fn cltv_fixture(locktime: u32) -> (Transaction, UtxoStore) {
        // locking script: push(0x5553) OP_CHECKLOCKTIMEVERIFY
        let lock = Builder::new()
            .push_data(&[0x55, 0x53])
            .push_opcode(OpCode::OP_CHECKLOCKTIMEVERIFY)
            .into_script();
        let prev_txid = Txid::from_bytes([0xab; 32]);
        let mut store = UtxoStore::new();
        store.register(Utxo::new(prev_txid, 0, TxOut::new(100_000, lock)));

        let mut tx = Transaction::new();
        tx.version = 1;
        let mut input = TxIn::new(OutPoint::new(prev_txid, 0));
        input.sequence = 0xffff_fffe;
        tx.inputs.push(input);
        tx.outputs
            .push(TxOut::new(90_000, Script::new_p2pkh(&[0x11; 20])));
        tx.locktime = locktime;
        (tx, store)
    }

    #[test]
    fn cltv_satisfied() {
        let (tx, mut store) = cltv_fixture(21333);
        tx.verify(&mut store, None).unwrap();
    }

    #[test]
    fn cltv_not_reached() {
        let (tx, mut store) = cltv_fixture(21332);
        match tx.verify(&mut store, None) {
            Err(TransactionError::Script(0, ScriptError::Runtime(name, _, _))) => {
                assert_eq!(name, "OP_CHECKLOCKTIMEVERIFY")
            }
            other => panic!("expected CLTV failure, got {:?}", other),
        }
    }

    #[test]
    fn cltv_final_sequence_rejected() {
        let (mut tx, mut store) = cltv_fixture(21333);
        tx.inputs[0].sequence = SEQUENCE_FINAL;
        assert!(tx.verify(&mut store, None).is_err());
    }

    fn csv_fixture(utxo_height: u32) -> (Transaction, UtxoStore) {
        let lock = Builder::new()
            .push_data(&encode_num(&BigInt::from(200)))
            .push_opcode(OpCode::OP_CHECKSEQUENCEVERIFY)
            .into_script();
        let prev_txid = Txid::from_bytes([0xcd; 32]);
        let mut store = UtxoStore::new();
        let mut utxo = Utxo::new(prev_txid, 0, TxOut::new(100_000, lock));
        utxo.block = Some(Block {
            height: utxo_height,
            timestamp: 1_600_000_000,
        });
        store.register(utxo);

        let mut tx = Transaction::new();
        let mut input = TxIn::new(OutPoint::new(prev_txid, 0));
        input.sequence = 200; // relative lock of 200 blocks, height-based
        tx.inputs.push(input);
        tx.outputs
            .push(TxOut::new(90_000, Script::new_p2pkh(&[0x11; 20])));
        (tx, store)
    }

    #[test]
    fn csv_satisfied() {
        let (tx, mut store) = csv_fixture(800);
        let block = Block {
            height: 1000,
            timestamp: 1_700_000_000,
        };
        tx.verify(&mut store, Some(&block)).unwrap();
    }

    #[test]
    fn csv_one_block_short() {
        let (tx, mut store) = csv_fixture(801);
        let block = Block {
            height: 1000,
            timestamp: 1_700_000_000,
        };
        match tx.verify(&mut store, Some(&block)) {
            Err(TransactionError::SequenceNotMet(0)) => {}
            other => panic!("expected sequence failure, got {:?}", other),
        }
    }

    #[test]
    fn locktime_check_against_block() {
        let (tx, mut store) = cltv_fixture(21333);
        let early = Block {
            height: 21333,
            timestamp: 0,
        };
        match tx.verify(&mut store, Some(&early)) {
            Err(TransactionError::LocktimeNotMet(21333, _)) => {}
            other => panic!("expected locktime failure, got {:?}", other),
        }
        let late = Block {
            height: 21334,
            timestamp: 0,
        };
        tx.verify(&mut store, Some(&late)).unwrap();
    }

    #[test]
    fn weight_accounting() {
        let tx = parse_tx(BIP143_SIGNED_HEX);
        let base = tx.serialize_without_witness().unwrap().len();
        let total = tx.size().unwrap();
        assert_eq!(tx.weight().unwrap(), base * 3 + total);
        assert_eq!(tx.vsize().unwrap(), (tx.weight().unwrap() + 3) / 4);
    }

    #[test]
    fn update_utxos_moves_outputs() {
        let tx = parse_tx(FIRST_SPEND_HEX);
        let mut store = UtxoStore::new();
        register_prevout(&mut store, &tx, 0, FIRST_SPEND_PREVOUT_SCRIPT, 5_000_000_000);
        assert_eq!(store.len(), 1);
        tx.update_utxos(&mut store).unwrap();
        assert_eq!(store.len(), 2);
        let txid = tx.txid().unwrap();
        assert!(store.contains(&OutPoint::new(txid, 0)));
        assert!(store.contains(&OutPoint::new(txid, 1)));
        assert!(!store.contains(&tx.inputs[0].prevout));
    }

    #[test]
    fn empty_transaction_rejected() {
        let tx = Transaction::new();
        assert!(tx.wire_serialize().is_err());
        let mut store = UtxoStore::new();
        assert_eq!(tx.verify(&mut store, None), Err(TransactionError::NoInputs));
    }
}
