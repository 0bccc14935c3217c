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

//! Per-input signing dispatch
//!
//! Looks up the UTXO consumed by an input, recognizes its locking-script
//! template and assembles either the signature script (legacy outputs) or
//! the witness stack (segwit outputs). P2SH unwraps into the redeem script
//! type and recurses, detecting nested segwit programs; P2WSH recurses into
//! its witness script. Bare and wrapped multisig preserve already-present
//! signature slots, so collaborative signing works one key at a time.

use bitcoin_hashes::{hash160, sha256, Hash};

use crate::key::{KeyError, PrivateKey};
use crate::script::{Builder, Instruction, OpCode, Script, ScriptError, ScriptType};
use crate::transaction::sighash::{signature_digest, SighashError, SighashType};
use crate::transaction::{Transaction, Witness};
use crate::utxo::{UtxoError, UtxoStore};

/// Options steering the signing of a single input
#[derive(Clone, Debug, Default)]
pub struct SignOptions {
    /// Redeem script (P2SH) or witness script (P2WSH) of the spent output
    pub redeem_script: Option<Script>,
    /// Multisig slot: (zero-based index of this signature, total number of
    /// signatures the script requires)
    pub multisig: Option<(u8, u8)>,
    /// Sighash type committed by the produced signature
    pub sighash: Option<SighashType>,
}

impl SignOptions {
    fn sighash(&self) -> SighashType {
        self.sighash.unwrap_or_default()
    }
}

/// Signing failures
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum SignError {
    /// input index {0} is out of range
    InputIndex(usize),

    /// {0}
    #[from]
    Utxo(UtxoError),

    /// cannot sign a non-standard locking script
    NonStandard,

    /// signing {0} outputs is not supported
    UnsupportedType(ScriptType),

    /// a redeem script is required to sign this input
    MissingRedeemScript,

    /// the supplied redeem script is not a standard script
    NonStandardRedeemScript,

    /// the supplied redeem script does not match the output's script hash
    RedeemMismatch,

    /// {0} cannot be nested inside {1}
    IllegalNesting(ScriptType, ScriptType),

    /// uncompressed public keys cannot be used on segwit paths
    UncompressedKey,

    /// the key does not match the public key hash of the output
    WrongKey,

    /// multisig signing requires the (index, total) slot tuple
    MissingMultisigSlot,

    /// multisig slot {0} is out of range for {1} signatures
    MultisigSlot(u8, u8),

    /// {0}
    #[from]
    Key(KeyError),

    /// {0}
    #[from]
    Sighash(SighashError),

    /// {0}
    #[from]
    Script(ScriptError),
}

/// Signs transaction input `index` with `key`, dispatching on the standard
/// type of the consumed UTXO's locking script
pub fn sign_input(
    tx: &mut Transaction,
    store: &mut UtxoStore,
    index: usize,
    key: &PrivateKey,
    options: &SignOptions,
) -> Result<(), SignError> {
    if index >= tx.inputs.len() {
        return Err(SignError::InputIndex(index));
    }
    let utxo = store.get(&tx.inputs[index].prevout)?;
    let lock = utxo.output.script_pubkey.clone();
    let value = utxo.output.value;
    let lock_type = lock.script_type().ok_or(SignError::NonStandard)?;
    debug!("signing input {} locked by a {} script", index, lock_type);

    match lock_type {
        ScriptType::P2pk => sign_p2pk(tx, index, key, &lock, value, options),
        ScriptType::P2pkh => sign_p2pkh(tx, index, key, &lock, value, options),
        ScriptType::P2ms => sign_p2ms(tx, index, key, &lock, value, options),
        ScriptType::P2sh => sign_p2sh(tx, index, key, &lock, value, options),
        ScriptType::P2wpkh => {
            let program = payload_of(&lock)?;
            sign_p2wpkh(tx, index, key, &program, value, options.sighash())
        }
        ScriptType::P2wsh => {
            let program = payload_of(&lock)?;
            let witness_script = options
                .redeem_script
                .clone()
                .ok_or(SignError::MissingRedeemScript)?;
            sign_p2wsh(tx, index, key, &witness_script, &program, value, options)
        }
        ScriptType::P2tr | ScriptType::NullData => Err(SignError::UnsupportedType(lock_type)),
    }
}

fn payload_of(script: &Script) -> Result<Vec<u8>, SignError> {
    script
        .recognize()
        .and_then(|recognized| recognized.payload)
        .ok_or(SignError::NonStandard)
}

fn make_signature(
    tx: &Transaction,
    index: usize,
    script_code: &Script,
    value: u64,
    segwit: bool,
    sighash: SighashType,
    key: &PrivateKey,
) -> Result<Vec<u8>, SignError> {
    let digest = signature_digest(tx, index, script_code, sighash, value, segwit)?;
    let mut signature = key.sign_digest(digest)?;
    signature.push(sighash.to_byte());
    Ok(signature)
}

fn sign_p2pk(
    tx: &mut Transaction,
    index: usize,
    key: &PrivateKey,
    lock: &Script,
    value: u64,
    options: &SignOptions,
) -> Result<(), SignError> {
    let signature = make_signature(tx, index, lock, value, false, options.sighash(), key)?;
    tx.inputs[index].script_sig = Builder::new().push_data(&signature).into_script();
    Ok(())
}

fn sign_p2pkh(
    tx: &mut Transaction,
    index: usize,
    key: &PrivateKey,
    lock: &Script,
    value: u64,
    options: &SignOptions,
) -> Result<(), SignError> {
    let pubkey = key.public_key();
    if payload_of(lock)? != pubkey.pubkey_hash().to_vec() {
        return Err(SignError::WrongKey);
    }
    let signature = make_signature(tx, index, lock, value, false, options.sighash(), key)?;
    tx.inputs[index].script_sig = Builder::new()
        .push_data(&signature)
        .push_data(&pubkey.serialize())
        .into_script();
    Ok(())
}

/// Reads the signature slots back from a previously built multisig
/// signature script or witness item list: empty pushes are vacant slots
fn read_slots(items: &[Vec<u8>], total: u8) -> Vec<Vec<u8>> {
    let mut slots = vec![vec![]; total as usize];
    for (position, item) in items.iter().take(total as usize).enumerate() {
        slots[position] = item.clone();
    }
    slots
}

fn multisig_slots(
    existing: &[Vec<u8>],
    slot: Option<(u8, u8)>,
    signature: Vec<u8>,
) -> Result<Vec<Vec<u8>>, SignError> {
    let (index, total) = slot.ok_or(SignError::MissingMultisigSlot)?;
    if index >= total || total == 0 || total > 16 {
        return Err(SignError::MultisigSlot(index, total));
    }
    let mut slots = read_slots(existing, total);
    slots[index as usize] = signature;
    Ok(slots)
}

/// Extracts the push items of a multisig signature script (skipping the
/// leading dummy), or nothing when the script is empty
fn sig_script_pushes(script: &Script) -> Result<Vec<Vec<u8>>, SignError> {
    if script.is_empty() {
        return Ok(vec![]);
    }
    let instructions = script.instructions()?;
    let mut items = vec![];
    for instruction in instructions.into_iter().skip(1) {
        match instruction {
            Instruction::PushBytes(data) => items.push(data),
            Instruction::Op(OpCode::OP_0) => items.push(vec![]),
            _ => return Ok(vec![]),
        }
    }
    Ok(items)
}

fn sign_p2ms(
    tx: &mut Transaction,
    index: usize,
    key: &PrivateKey,
    lock: &Script,
    value: u64,
    options: &SignOptions,
) -> Result<(), SignError> {
    let signature = make_signature(tx, index, lock, value, false, options.sighash(), key)?;
    let existing = sig_script_pushes(&tx.inputs[index].script_sig)?;
    let slots = multisig_slots(&existing, options.multisig, signature)?;
    let mut builder = Builder::new().push_data(&[]);
    for slot in &slots {
        builder = builder.push_data(slot);
    }
    tx.inputs[index].script_sig = builder.into_script();
    Ok(())
}

fn sign_p2sh(
    tx: &mut Transaction,
    index: usize,
    key: &PrivateKey,
    lock: &Script,
    value: u64,
    options: &SignOptions,
) -> Result<(), SignError> {
    let lock_hash = payload_of(lock)?;

    // nested P2WPKH: the script hash commits to the key's own witness
    // program
    if key.compressed {
        let program = key.public_key().p2wpkh_script()?;
        if hash160::Hash::hash(program.as_bytes()).to_byte_array().to_vec() == lock_hash {
            tx.inputs[index].script_sig =
                Builder::new().push_data(program.as_bytes()).into_script();
            let keyhash = key.public_key().pubkey_hash().to_vec();
            return sign_p2wpkh(tx, index, key, &keyhash, value, options.sighash());
        }
    }

    let redeem = options
        .redeem_script
        .clone()
        .ok_or(SignError::MissingRedeemScript)?;

    // nested P2WSH: the script hash commits to the P2WSH program of the
    // supplied witness script
    let wsh_program = sha256::Hash::hash(redeem.as_bytes()).to_byte_array();
    let wsh_script = Script::new_p2wsh(&wsh_program);
    if hash160::Hash::hash(wsh_script.as_bytes()).to_byte_array().to_vec() == lock_hash {
        tx.inputs[index].script_sig =
            Builder::new().push_data(wsh_script.as_bytes()).into_script();
        return sign_p2wsh(tx, index, key, &redeem, &wsh_program, value, options);
    }

    // plain P2SH: the redeem script is the actual locking condition
    if hash160::Hash::hash(redeem.as_bytes()).to_byte_array().to_vec() != lock_hash {
        return Err(SignError::RedeemMismatch);
    }
    let redeem_type = redeem
        .script_type()
        .ok_or(SignError::NonStandardRedeemScript)?;
    match redeem_type {
        ScriptType::P2sh => {
            return Err(SignError::IllegalNesting(ScriptType::P2sh, ScriptType::P2sh))
        }
        ScriptType::P2wpkh => {
            // an explicitly supplied witness program: same nested path
            tx.inputs[index].script_sig =
                Builder::new().push_data(redeem.as_bytes()).into_script();
            let program = payload_of(&redeem)?;
            return sign_p2wpkh(tx, index, key, &program, value, options.sighash());
        }
        ScriptType::P2wsh => {
            // the inner witness script itself is needed, not its program
            return Err(SignError::MissingRedeemScript);
        }
        _ => {}
    }

    // keep the prior inner pushes (multisig slots), drop the trailing
    // redeem push if one is present
    let mut existing = sig_script_pushes(&tx.inputs[index].script_sig)?;
    if existing.last().map(|item| item.as_slice()) == Some(redeem.as_bytes()) {
        existing.pop();
    }
    let inner_items = match redeem_type {
        ScriptType::P2pk => {
            let signature =
                make_signature(tx, index, &redeem, value, false, options.sighash(), key)?;
            vec![signature]
        }
        ScriptType::P2pkh => {
            let pubkey = key.public_key();
            if payload_of(&redeem)? != pubkey.pubkey_hash().to_vec() {
                return Err(SignError::WrongKey);
            }
            let signature =
                make_signature(tx, index, &redeem, value, false, options.sighash(), key)?;
            vec![signature, pubkey.serialize()]
        }
        ScriptType::P2ms => {
            let signature =
                make_signature(tx, index, &redeem, value, false, options.sighash(), key)?;
            let mut items = vec![vec![]];
            items.extend(multisig_slots(&existing, options.multisig, signature)?);
            items
        }
        other => return Err(SignError::UnsupportedType(other)),
    };
    let mut builder = Builder::new();
    for item in &inner_items {
        builder = builder.push_data(item);
    }
    builder = builder.push_data(redeem.as_bytes());
    tx.inputs[index].script_sig = builder.into_script();
    Ok(())
}

fn sign_p2wpkh(
    tx: &mut Transaction,
    index: usize,
    key: &PrivateKey,
    program: &[u8],
    value: u64,
    sighash: SighashType,
) -> Result<(), SignError> {
    if !key.compressed {
        return Err(SignError::UncompressedKey);
    }
    let pubkey = key.public_key();
    if program != pubkey.pubkey_hash() {
        return Err(SignError::WrongKey);
    }
    let mut keyhash = [0u8; 20];
    keyhash.copy_from_slice(program);
    let script_code = Script::new_p2pkh(&keyhash);
    let signature = make_signature(tx, index, &script_code, value, true, sighash, key)?;
    tx.inputs[index].witness = Witness::from(vec![signature, pubkey.serialize()]);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn sign_p2wsh(
    tx: &mut Transaction,
    index: usize,
    key: &PrivateKey,
    witness_script: &Script,
    program: &[u8],
    value: u64,
    options: &SignOptions,
) -> Result<(), SignError> {
    if !key.compressed {
        return Err(SignError::UncompressedKey);
    }
    if sha256::Hash::hash(witness_script.as_bytes()).to_byte_array() != program[..] {
        return Err(SignError::RedeemMismatch);
    }
    let inner_type = witness_script
        .script_type()
        .ok_or(SignError::NonStandardRedeemScript)?;
    let items = match inner_type {
        ScriptType::P2sh | ScriptType::P2wsh | ScriptType::P2wpkh => {
            return Err(SignError::IllegalNesting(inner_type, ScriptType::P2wsh))
        }
        ScriptType::P2pk => {
            let signature =
                make_signature(tx, index, witness_script, value, true, options.sighash(), key)?;
            vec![signature]
        }
        ScriptType::P2pkh => {
            let pubkey = key.public_key();
            if payload_of(witness_script)? != pubkey.pubkey_hash().to_vec() {
                return Err(SignError::WrongKey);
            }
            let signature =
                make_signature(tx, index, witness_script, value, true, options.sighash(), key)?;
            vec![signature, pubkey.serialize()]
        }
        ScriptType::P2ms => {
            let signature =
                make_signature(tx, index, witness_script, value, true, options.sighash(), key)?;
            let witness = tx.inputs[index].witness.items();
            let existing = if witness.len() > 2 {
                witness[1..witness.len() - 1].to_vec()
            } else {
                vec![]
            };
            let mut items = vec![vec![]];
            items.extend(multisig_slots(&existing, options.multisig, signature)?);
            items
        }
        other => return Err(SignError::UnsupportedType(other)),
    };
    let mut witness_items = items;
    witness_items.push(witness_script.as_bytes().to_vec());
    tx.inputs[index].witness = Witness::from(witness_items);
    Ok(())
}
