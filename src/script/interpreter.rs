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

//! Script interpreter
//!
//! A stack machine over two byte-string stacks. Conditional branches are
//! resolved when a script is loaded: every IF/NOTIF is annotated with the
//! absolute positions of its ELSE and ENDIF, so execution jumps over
//! non-taken branches instead of scanning them. The transaction-bound
//! opcodes (CHECKSIG, CHECKMULTISIG, CHECKLOCKTIMEVERIFY,
//! CHECKSEQUENCEVERIFY) require a [`TransactionContext`] and fail without
//! one.

use bitcoin_hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::collections::HashMap;

use crate::key::SECP256K1;
use crate::script::num::{
    decode_bool, decode_num, encode_bool, encode_num, DEFAULT_MAX_NUM_LEN, LOCKTIME_MAX_NUM_LEN,
};
use crate::script::{Instruction, OpCode, Script, ScriptError};
use crate::transaction::sighash::{signature_digest, SighashType};
use crate::transaction::Transaction;

/// Sequence number disabling both absolute and relative locktime semantics
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;
/// Bit of a sequence number disabling BIP68 relative locktime
pub const SEQUENCE_LOCKTIME_DISABLE: u32 = 1 << 31;
/// Bit of a sequence number switching its locktime to 512-second units
pub const SEQUENCE_LOCKTIME_TYPE: u32 = 1 << 22;
/// Mask extracting the relative locktime value from a sequence number
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;
/// Locktime values below the threshold are block heights, above are timestamps
pub const LOCKTIME_THRESHOLD: i64 = 500_000_000;

/// Failure of a single opcode during script execution. The runner wraps
/// these into [`ScriptError::Runtime`] together with the opcode name and its
/// position.
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ExecError {
    /// not enough elements on the stack
    StackUnderflow,

    /// not enough elements on the alt stack
    AltStackUnderflow,

    /// OP_RETURN executed
    OpReturn,

    /// verification failed on a false stack top
    VerifyFailed,

    /// reserved opcode executed
    ReservedOpcode,

    /// ELSE or ENDIF without a matching IF, or IF left open
    UnbalancedConditional,

    /// numeric stack element longer than {0} bytes
    NumberOverflow(usize),

    /// stack index operand out of range
    IndexOutOfRange,

    /// malformed public key on the stack
    BadPubkey,

    /// uncompressed public key on a segwit execution path
    UncompressedKey,

    /// extra multisig stack element must be an empty push
    DummyNotEmpty,

    /// multisig key or signature count out of range
    MultisigCount,

    /// locktime requirement not satisfied
    Locktime,

    /// relative sequence requirement not satisfied
    Sequence,

    /// opcode requires a transaction bound to the runner
    NoTransactionContext,

    /// signature digest computation failed: {0}
    Digest(String),
}

/// Binding of a script runner to the transaction input being validated
#[derive(Clone, Copy, Debug)]
pub struct TransactionContext<'a> {
    /// Transaction whose input is being validated
    pub tx: &'a Transaction,
    /// Index of the validated input
    pub input_index: usize,
    /// Value of the UTXO consumed by the input, committed by BIP143 digests
    pub input_value: u64,
    /// Whether the script executes on a segwit path: selects the BIP143
    /// digest and enforces compressed public keys
    pub segwit: bool,
}

struct Branches {
    // IF/NOTIF position → (ELSE position, ENDIF position)
    for_if: HashMap<usize, (Option<usize>, usize)>,
    // ELSE position → ENDIF position
    for_else: HashMap<usize, usize>,
}

fn resolve_branches(ops: &[(usize, Instruction)]) -> Result<Branches, ScriptError> {
    let mut open: Vec<(usize, Option<usize>)> = vec![];
    let mut branches = Branches {
        for_if: HashMap::new(),
        for_else: HashMap::new(),
    };
    for (position, (_, instruction)) in ops.iter().enumerate() {
        let op = match instruction {
            Instruction::Op(op) => *op,
            Instruction::PushBytes(_) => continue,
        };
        match op {
            OpCode::OP_IF | OpCode::OP_NOTIF => open.push((position, None)),
            OpCode::OP_ELSE => match open.last_mut() {
                Some((_, else_slot @ None)) => *else_slot = Some(position),
                _ => {
                    return Err(ScriptError::Runtime(
                        op.name().to_owned(),
                        position,
                        ExecError::UnbalancedConditional,
                    ))
                }
            },
            OpCode::OP_ENDIF => match open.pop() {
                Some((if_position, else_position)) => {
                    branches.for_if.insert(if_position, (else_position, position));
                    if let Some(else_position) = else_position {
                        branches.for_else.insert(else_position, position);
                    }
                }
                None => {
                    return Err(ScriptError::Runtime(
                        op.name().to_owned(),
                        position,
                        ExecError::UnbalancedConditional,
                    ))
                }
            },
            _ => {}
        }
    }
    if let Some((position, _)) = open.last() {
        return Err(ScriptError::Runtime(
            OpCode::OP_IF.name().to_owned(),
            *position,
            ExecError::UnbalancedConditional,
        ));
    }
    Ok(branches)
}

/// Stack machine executing scripts, optionally bound to a transaction input
pub struct ScriptRunner<'a> {
    stack: Vec<Vec<u8>>,
    alt_stack: Vec<Vec<u8>>,
    ctx: Option<TransactionContext<'a>>,
}

impl<'a> ScriptRunner<'a> {
    /// Creates a runner. Pass a [`TransactionContext`] to enable the
    /// transaction-bound opcodes.
    pub fn new(ctx: Option<TransactionContext<'a>>) -> ScriptRunner<'a> {
        ScriptRunner {
            stack: vec![],
            alt_stack: vec![],
            ctx,
        }
    }

    /// Replaces the main stack, e.g. with witness items before running a
    /// witness script
    pub fn set_stack(&mut self, stack: Vec<Vec<u8>>) {
        self.stack = stack;
    }

    /// Current main stack, bottom first
    pub fn stack(&self) -> &[Vec<u8>] {
        &self.stack
    }

    /// Removes and returns the main stack
    pub fn take_stack(&mut self) -> Vec<Vec<u8>> {
        std::mem::replace(&mut self.stack, vec![])
    }

    /// Whether the execution left a truthy top element on the stack
    pub fn success(&self) -> bool {
        self.stack.last().map(|top| decode_bool(top)).unwrap_or(false)
    }

    /// Executes a script over the current main stack. The alt stack and the
    /// codeseparator position are reset per script; the main stack carries
    /// over between consecutive executions.
    pub fn execute(&mut self, script: &Script) -> Result<(), ScriptError> {
        let ops = script.instructions_with_offsets()?;
        // OP_VERIF/OP_VERNOTIF fail the script even inside a skipped branch
        for (position, (_, instruction)) in ops.iter().enumerate() {
            if let Instruction::Op(op) = instruction {
                if *op == OpCode::OP_VERIF || *op == OpCode::OP_VERNOTIF {
                    return Err(ScriptError::Runtime(
                        op.name().to_owned(),
                        position,
                        ExecError::ReservedOpcode,
                    ));
                }
            }
        }
        let branches = resolve_branches(&ops)?;
        self.alt_stack.clear();
        let mut codesep = 0usize;
        let mut frames: Vec<usize> = vec![];
        let mut pc = 0usize;
        while pc < ops.len() {
            let (offset, instruction) = &ops[pc];
            trace!("script pc={} op={:?} stack depth={}", pc, instruction, self.stack.len());
            let fail = |err: ExecError| {
                let name = match instruction {
                    Instruction::Op(op) => op.name().to_owned(),
                    Instruction::PushBytes(_) => "push".to_owned(),
                };
                ScriptError::Runtime(name, pc, err)
            };
            match instruction {
                Instruction::Op(op) if *op == OpCode::OP_IF || *op == OpCode::OP_NOTIF => {
                    let top = self.pop().map_err(fail)?;
                    let mut condition = decode_bool(&top);
                    if *op == OpCode::OP_NOTIF {
                        condition = !condition;
                    }
                    let (else_position, endif_position) = branches.for_if[&pc];
                    frames.push(endif_position);
                    if condition {
                        pc += 1;
                    } else {
                        // jump into the ELSE branch, or straight at ENDIF
                        pc = else_position.map(|e| e + 1).unwrap_or(endif_position);
                    }
                    continue;
                }
                Instruction::Op(OpCode::OP_ELSE) => {
                    // reached from the taken branch: skip to the ENDIF
                    match branches.for_else.get(&pc) {
                        Some(endif_position) => pc = *endif_position,
                        None => return Err(fail(ExecError::UnbalancedConditional)),
                    }
                    continue;
                }
                Instruction::Op(OpCode::OP_ENDIF) => {
                    if frames.pop().is_none() {
                        return Err(fail(ExecError::UnbalancedConditional));
                    }
                    pc += 1;
                    continue;
                }
                Instruction::Op(OpCode::OP_CODESEPARATOR) => {
                    codesep = offset + 1;
                    pc += 1;
                    continue;
                }
                _ => {}
            }
            self.step(instruction, script, codesep).map_err(fail)?;
            pc += 1;
        }
        if !frames.is_empty() {
            return Err(ScriptError::Runtime(
                OpCode::OP_IF.name().to_owned(),
                ops.len(),
                ExecError::UnbalancedConditional,
            ));
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Vec<u8>, ExecError> {
        self.stack.pop().ok_or(ExecError::StackUnderflow)
    }

    fn pop_num(&mut self) -> Result<BigInt, ExecError> {
        let bytes = self.pop()?;
        decode_num(&bytes, DEFAULT_MAX_NUM_LEN)
    }

    fn push_num(&mut self, n: BigInt) {
        self.stack.push(encode_num(&n));
    }

    fn push_bool(&mut self, value: bool) {
        self.stack.push(encode_bool(value));
    }

    fn require(&self, depth: usize) -> Result<(), ExecError> {
        if self.stack.len() < depth {
            return Err(ExecError::StackUnderflow);
        }
        Ok(())
    }

    fn ctx(&self) -> Result<&TransactionContext<'a>, ExecError> {
        self.ctx.as_ref().ok_or(ExecError::NoTransactionContext)
    }

    fn step(
        &mut self,
        instruction: &Instruction,
        script: &Script,
        codesep: usize,
    ) -> Result<(), ExecError> {
        let op = match instruction {
            Instruction::PushBytes(data) => {
                self.stack.push(data.clone());
                return Ok(());
            }
            Instruction::Op(op) => *op,
        };
        if let Some(n) = op.decode_small_int() {
            self.push_num(BigInt::from(n));
            return Ok(());
        }
        match op {
            OpCode::OP_NOP
            | OpCode::OP_NOP1
            | OpCode::OP_NOP4
            | OpCode::OP_NOP5
            | OpCode::OP_NOP6
            | OpCode::OP_NOP7
            | OpCode::OP_NOP8
            | OpCode::OP_NOP9
            | OpCode::OP_NOP10 => {}

            op if op.is_reserved() => return Err(ExecError::ReservedOpcode),

            OpCode::OP_RETURN => return Err(ExecError::OpReturn),

            OpCode::OP_VERIFY => {
                let top = self.pop()?;
                if !decode_bool(&top) {
                    return Err(ExecError::VerifyFailed);
                }
            }

            OpCode::OP_TOALTSTACK => {
                let top = self.pop()?;
                self.alt_stack.push(top);
            }
            OpCode::OP_FROMALTSTACK => {
                let top = self.alt_stack.pop().ok_or(ExecError::AltStackUnderflow)?;
                self.stack.push(top);
            }

            OpCode::OP_DROP => {
                self.pop()?;
            }
            OpCode::OP_2DROP => {
                self.pop()?;
                self.pop()?;
            }
            OpCode::OP_DUP => {
                self.require(1)?;
                let top = self.stack[self.stack.len() - 1].clone();
                self.stack.push(top);
            }
            OpCode::OP_2DUP => {
                self.require(2)?;
                let len = self.stack.len();
                let pair = self.stack[len - 2..].to_vec();
                self.stack.extend(pair);
            }
            OpCode::OP_3DUP => {
                self.require(3)?;
                let len = self.stack.len();
                let triple = self.stack[len - 3..].to_vec();
                self.stack.extend(triple);
            }
            OpCode::OP_2OVER => {
                self.require(4)?;
                let len = self.stack.len();
                let pair = self.stack[len - 4..len - 2].to_vec();
                self.stack.extend(pair);
            }
            OpCode::OP_2ROT => {
                self.require(6)?;
                let len = self.stack.len();
                let first = self.stack.remove(len - 6);
                let second = self.stack.remove(len - 6);
                self.stack.push(first);
                self.stack.push(second);
            }
            OpCode::OP_2SWAP => {
                self.require(4)?;
                let len = self.stack.len();
                self.stack[len - 4..].rotate_left(2);
            }
            OpCode::OP_IFDUP => {
                self.require(1)?;
                let top = &self.stack[self.stack.len() - 1];
                if decode_bool(top) {
                    let top = top.clone();
                    self.stack.push(top);
                }
            }
            OpCode::OP_DEPTH => {
                let depth = self.stack.len();
                self.push_num(BigInt::from(depth));
            }
            OpCode::OP_NIP => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.remove(len - 2);
            }
            OpCode::OP_OVER => {
                self.require(2)?;
                let item = self.stack[self.stack.len() - 2].clone();
                self.stack.push(item);
            }
            OpCode::OP_PICK | OpCode::OP_ROLL => {
                let n = self.pop_num()?;
                let n = n.to_usize().ok_or(ExecError::IndexOutOfRange)?;
                if n >= self.stack.len() {
                    return Err(ExecError::IndexOutOfRange);
                }
                let index = self.stack.len() - 1 - n;
                let item = if op == OpCode::OP_PICK {
                    self.stack[index].clone()
                } else {
                    self.stack.remove(index)
                };
                self.stack.push(item);
            }
            OpCode::OP_ROT => {
                self.require(3)?;
                let len = self.stack.len();
                self.stack[len - 3..].rotate_left(1);
            }
            OpCode::OP_SWAP => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.swap(len - 2, len - 1);
            }
            OpCode::OP_TUCK => {
                self.require(2)?;
                let top = self.stack[self.stack.len() - 1].clone();
                let len = self.stack.len();
                self.stack.insert(len - 2, top);
            }

            OpCode::OP_SIZE => {
                self.require(1)?;
                let size = self.stack[self.stack.len() - 1].len();
                self.push_num(BigInt::from(size));
            }
            OpCode::OP_EQUAL | OpCode::OP_EQUALVERIFY => {
                let b = self.pop()?;
                let a = self.pop()?;
                let equal = a == b;
                if op == OpCode::OP_EQUALVERIFY {
                    if !equal {
                        return Err(ExecError::VerifyFailed);
                    }
                } else {
                    self.push_bool(equal);
                }
            }

            OpCode::OP_1ADD => {
                let n = self.pop_num()?;
                self.push_num(n + 1);
            }
            OpCode::OP_1SUB => {
                let n = self.pop_num()?;
                self.push_num(n - 1);
            }
            OpCode::OP_NEGATE => {
                let n = self.pop_num()?;
                self.push_num(-n);
            }
            OpCode::OP_ABS => {
                let n = self.pop_num()?;
                self.push_num(n.abs());
            }
            OpCode::OP_NOT => {
                let n = self.pop_num()?;
                self.push_bool(n.is_zero());
            }
            OpCode::OP_0NOTEQUAL => {
                let n = self.pop_num()?;
                self.push_bool(!n.is_zero());
            }
            OpCode::OP_ADD => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a + b);
            }
            OpCode::OP_SUB => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a - b);
            }
            OpCode::OP_BOOLAND => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(!a.is_zero() && !b.is_zero());
            }
            OpCode::OP_BOOLOR => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(!a.is_zero() || !b.is_zero());
            }
            OpCode::OP_NUMEQUAL | OpCode::OP_NUMEQUALVERIFY => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                let equal = a == b;
                if op == OpCode::OP_NUMEQUALVERIFY {
                    if !equal {
                        return Err(ExecError::VerifyFailed);
                    }
                } else {
                    self.push_bool(equal);
                }
            }
            OpCode::OP_NUMNOTEQUAL => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a != b);
            }
            OpCode::OP_LESSTHAN => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a < b);
            }
            OpCode::OP_GREATERTHAN => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a > b);
            }
            OpCode::OP_LESSTHANOREQUAL => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a <= b);
            }
            OpCode::OP_GREATERTHANOREQUAL => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a >= b);
            }
            OpCode::OP_MIN => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a.min(b));
            }
            OpCode::OP_MAX => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a.max(b));
            }
            OpCode::OP_WITHIN => {
                let max = self.pop_num()?;
                let min = self.pop_num()?;
                let x = self.pop_num()?;
                self.push_bool(min <= x && x < max);
            }

            OpCode::OP_RIPEMD160 => {
                let data = self.pop()?;
                self.stack
                    .push(ripemd160::Hash::hash(&data).to_byte_array().to_vec());
            }
            OpCode::OP_SHA1 => {
                let data = self.pop()?;
                self.stack
                    .push(sha1::Hash::hash(&data).to_byte_array().to_vec());
            }
            OpCode::OP_SHA256 => {
                let data = self.pop()?;
                self.stack
                    .push(sha256::Hash::hash(&data).to_byte_array().to_vec());
            }
            OpCode::OP_HASH160 => {
                let data = self.pop()?;
                self.stack
                    .push(hash160::Hash::hash(&data).to_byte_array().to_vec());
            }
            OpCode::OP_HASH256 => {
                let data = self.pop()?;
                self.stack
                    .push(sha256d::Hash::hash(&data).to_byte_array().to_vec());
            }

            OpCode::OP_CHECKSIG | OpCode::OP_CHECKSIGVERIFY => {
                let result = self.op_checksig(script, codesep)?;
                if op == OpCode::OP_CHECKSIGVERIFY {
                    if !result {
                        return Err(ExecError::VerifyFailed);
                    }
                } else {
                    self.push_bool(result);
                }
            }
            OpCode::OP_CHECKMULTISIG | OpCode::OP_CHECKMULTISIGVERIFY => {
                let result = self.op_checkmultisig(script, codesep)?;
                if op == OpCode::OP_CHECKMULTISIGVERIFY {
                    if !result {
                        return Err(ExecError::VerifyFailed);
                    }
                } else {
                    self.push_bool(result);
                }
            }

            OpCode::OP_CHECKLOCKTIMEVERIFY => self.op_cltv()?,
            OpCode::OP_CHECKSEQUENCEVERIFY => self.op_csv()?,

            // IF/ELSE/ENDIF/CODESEPARATOR are handled by the execution loop;
            // anything else missed here is a table bug
            other => {
                debug!("opcode {} reached the fallback arm", other);
                return Err(ExecError::ReservedOpcode);
            }
        }
        Ok(())
    }

    fn subscript(&self, script: &Script, codesep: usize) -> Script {
        Script::from(script.as_bytes()[codesep..].to_vec())
    }

    fn compute_digest(
        &self,
        script: &Script,
        codesep: usize,
        sighash: SighashType,
    ) -> Result<[u8; 32], ExecError> {
        let ctx = self.ctx()?;
        let subscript = self.subscript(script, codesep);
        signature_digest(
            ctx.tx,
            ctx.input_index,
            &subscript,
            sighash,
            ctx.input_value,
            ctx.segwit,
        )
        .map_err(|err| ExecError::Digest(err.to_string()))
    }

    fn op_checksig(&mut self, script: &Script, codesep: usize) -> Result<bool, ExecError> {
        let pubkey = self.pop()?;
        let signature = self.pop()?;
        let ctx = self.ctx()?;
        if ctx.segwit && pubkey.len() != 33 {
            return Err(ExecError::UncompressedKey);
        }
        if signature.is_empty() {
            return Ok(false);
        }
        let (der, sighash_byte) = signature.split_at(signature.len() - 1);
        let sighash = SighashType::from_byte(sighash_byte[0]);
        let digest = self.compute_digest(script, codesep, sighash)?;
        let point =
            secp256k1::PublicKey::from_slice(&pubkey).map_err(|_| ExecError::BadPubkey)?;
        Ok(ecdsa_verify(&point, digest, der))
    }

    fn op_checkmultisig(&mut self, script: &Script, codesep: usize) -> Result<bool, ExecError> {
        let key_count = self.pop_num()?.to_i64().ok_or(ExecError::MultisigCount)?;
        if !(0..=20).contains(&key_count) {
            return Err(ExecError::MultisigCount);
        }
        let mut pubkeys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            pubkeys.push(self.pop()?);
        }
        pubkeys.reverse();
        let sig_count = self.pop_num()?.to_i64().ok_or(ExecError::MultisigCount)?;
        if !(0..=key_count).contains(&sig_count) {
            return Err(ExecError::MultisigCount);
        }
        let mut signatures = Vec::with_capacity(sig_count as usize);
        for _ in 0..sig_count {
            signatures.push(self.pop()?);
        }
        signatures.reverse();
        let dummy = self.pop()?;
        if !dummy.is_empty() {
            return Err(ExecError::DummyNotEmpty);
        }
        let segwit = self.ctx()?.segwit;
        if segwit && pubkeys.iter().any(|pubkey| pubkey.len() != 33) {
            return Err(ExecError::UncompressedKey);
        }
        let mut key_cursor = 0usize;
        for signature in &signatures {
            if signature.is_empty() {
                return Ok(false);
            }
            let (der, sighash_byte) = signature.split_at(signature.len() - 1);
            let sighash = SighashType::from_byte(sighash_byte[0]);
            let digest = self.compute_digest(script, codesep, sighash)?;
            let mut matched = false;
            while key_cursor < pubkeys.len() {
                let candidate = &pubkeys[key_cursor];
                key_cursor += 1;
                if let Ok(point) = secp256k1::PublicKey::from_slice(candidate) {
                    if ecdsa_verify(&point, digest, der) {
                        matched = true;
                        break;
                    }
                }
            }
            if !matched {
                debug!("multisig signature found no matching key");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn op_cltv(&mut self) -> Result<(), ExecError> {
        let ctx = self.ctx()?;
        let top = self.stack.last().ok_or(ExecError::StackUnderflow)?;
        let c1 = decode_num(top, LOCKTIME_MAX_NUM_LEN)?
            .to_i64()
            .ok_or(ExecError::Locktime)?;
        if c1 < 0 {
            return Err(ExecError::Locktime);
        }
        let c2 = ctx.tx.locktime as i64;
        if (c1 < LOCKTIME_THRESHOLD) != (c2 < LOCKTIME_THRESHOLD) {
            return Err(ExecError::Locktime);
        }
        if c1 > c2 {
            return Err(ExecError::Locktime);
        }
        let input = ctx
            .tx
            .inputs
            .get(ctx.input_index)
            .ok_or(ExecError::Locktime)?;
        if input.sequence == SEQUENCE_FINAL {
            return Err(ExecError::Locktime);
        }
        Ok(())
    }

    fn op_csv(&mut self) -> Result<(), ExecError> {
        let ctx = self.ctx()?;
        let top = self.stack.last().ok_or(ExecError::StackUnderflow)?;
        let c1 = decode_num(top, LOCKTIME_MAX_NUM_LEN)?
            .to_i64()
            .ok_or(ExecError::Sequence)?;
        if c1 < 0 {
            return Err(ExecError::Sequence);
        }
        let c1 = c1 as u64;
        if c1 & (SEQUENCE_LOCKTIME_DISABLE as u64) != 0 {
            return Ok(());
        }
        if ctx.tx.version < 2 {
            return Err(ExecError::Sequence);
        }
        let input = ctx
            .tx
            .inputs
            .get(ctx.input_index)
            .ok_or(ExecError::Sequence)?;
        let c2 = input.sequence as u64;
        if c2 & (SEQUENCE_LOCKTIME_DISABLE as u64) != 0 {
            return Err(ExecError::Sequence);
        }
        if c1 & (SEQUENCE_LOCKTIME_TYPE as u64) != c2 & (SEQUENCE_LOCKTIME_TYPE as u64) {
            return Err(ExecError::Sequence);
        }
        if c1 & (SEQUENCE_LOCKTIME_MASK as u64) > c2 & (SEQUENCE_LOCKTIME_MASK as u64) {
            return Err(ExecError::Sequence);
        }
        Ok(())
    }
}

/// DER signature verification over a 32-byte digest, tolerating the high-S
/// encodings of historical transactions
pub(crate) fn ecdsa_verify(
    point: &secp256k1::PublicKey,
    digest: [u8; 32],
    der: &[u8],
) -> bool {
    let message = secp256k1::Message::from_digest(digest);
    match secp256k1::ecdsa::Signature::from_der(der) {
        Ok(mut signature) => {
            signature.normalize_s();
            SECP256K1.verify_ecdsa(&message, &signature, point).is_ok()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::script::Builder;

    fn run(script: Script) -> Result<ScriptRunner<'static>, ScriptError> {
        let mut runner = ScriptRunner::new(None);
        runner.execute(&script)?;
        Ok(runner)
    }

    #[test]
    fn arithmetic() {
        let script = Builder::new().push_int(2).push_int(3).push_opcode(OpCode::OP_ADD).into_script();
        let runner = run(script).unwrap();
        assert_eq!(runner.stack(), &[vec![5u8]]);

        let script = Builder::new()
            .push_int(5)
            .push_int(9)
            .push_opcode(OpCode::OP_SUB)
            .push_opcode(OpCode::OP_ABS)
            .into_script();
        let runner = run(script).unwrap();
        assert_eq!(runner.stack(), &[vec![4u8]]);
    }

    #[test]
    fn intermediate_overflow_allowed() {
        // adding two four-byte maximums exceeds four bytes; only decoding
        // enforces the limit
        let script = Builder::new()
            .push_data(&[0xff, 0xff, 0xff, 0x7f])
            .push_data(&[0xff, 0xff, 0xff, 0x7f])
            .push_opcode(OpCode::OP_ADD)
            .into_script();
        let runner = run(script).unwrap();
        assert_eq!(runner.stack(), &[vec![0xfe, 0xff, 0xff, 0xff, 0x00]]);

        // but feeding the five-byte result into another ADD fails
        let script = Builder::new()
            .push_data(&[0xff, 0xff, 0xff, 0x7f])
            .push_data(&[0xff, 0xff, 0xff, 0x7f])
            .push_opcode(OpCode::OP_ADD)
            .push_int(1)
            .push_opcode(OpCode::OP_ADD)
            .into_script();
        match run(script) {
            Err(ScriptError::Runtime(name, _, ExecError::NumberOverflow(4))) => {
                assert_eq!(name, "OP_ADD")
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn branch_taken_and_skipped() {
        let script = Builder::new()
            .push_int(1)
            .push_opcode(OpCode::OP_IF)
            .push_int(10)
            .push_opcode(OpCode::OP_ELSE)
            .push_int(20)
            .push_opcode(OpCode::OP_ENDIF)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![10u8]]);

        let script = Builder::new()
            .push_int(0)
            .push_opcode(OpCode::OP_IF)
            .push_int(10)
            .push_opcode(OpCode::OP_ELSE)
            .push_int(20)
            .push_opcode(OpCode::OP_ENDIF)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![20u8]]);
    }

    #[test]
    fn nested_branches() {
        // 1 IF 0 IF 1 ELSE 2 ENDIF ELSE 3 ENDIF => 2
        let script = Builder::new()
            .push_int(1)
            .push_opcode(OpCode::OP_IF)
            .push_int(0)
            .push_opcode(OpCode::OP_IF)
            .push_int(1)
            .push_opcode(OpCode::OP_ELSE)
            .push_int(2)
            .push_opcode(OpCode::OP_ENDIF)
            .push_opcode(OpCode::OP_ELSE)
            .push_int(3)
            .push_opcode(OpCode::OP_ENDIF)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![2u8]]);
    }

    #[test]
    fn skipped_branch_is_jumped_not_executed() {
        // the skipped branch contains OP_RETURN, which must not fire
        let script = Builder::new()
            .push_int(0)
            .push_opcode(OpCode::OP_IF)
            .push_opcode(OpCode::OP_RETURN)
            .push_opcode(OpCode::OP_ENDIF)
            .push_int(7)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![7u8]]);
    }

    #[test]
    fn verif_fails_even_in_skipped_branch() {
        let script = Builder::new()
            .push_int(0)
            .push_opcode(OpCode::OP_IF)
            .push_opcode(OpCode::OP_VERIF)
            .push_opcode(OpCode::OP_ENDIF)
            .into_script();
        match run(script) {
            Err(ScriptError::Runtime(name, _, ExecError::ReservedOpcode)) => {
                assert_eq!(name, "OP_VERIF")
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unbalanced_conditionals() {
        let script = Builder::new().push_int(1).push_opcode(OpCode::OP_IF).into_script();
        assert!(matches!(
            run(script),
            Err(ScriptError::Runtime(_, _, ExecError::UnbalancedConditional))
        ));

        let script = Builder::new().push_opcode(OpCode::OP_ENDIF).into_script();
        assert!(matches!(
            run(script),
            Err(ScriptError::Runtime(_, _, ExecError::UnbalancedConditional))
        ));
    }

    #[test]
    fn stack_shuffling() {
        let script = Builder::new()
            .push_int(1)
            .push_int(2)
            .push_int(3)
            .push_opcode(OpCode::OP_ROT)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![2u8], vec![3u8], vec![1u8]]);

        let script = Builder::new()
            .push_int(1)
            .push_int(2)
            .push_opcode(OpCode::OP_TUCK)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![2u8], vec![1u8], vec![2u8]]);

        let script = Builder::new()
            .push_int(5)
            .push_int(6)
            .push_int(7)
            .push_int(2)
            .push_opcode(OpCode::OP_PICK)
            .into_script();
        assert_eq!(
            run(script).unwrap().stack(),
            &[vec![5u8], vec![6u8], vec![7u8], vec![5u8]]
        );

        let script = Builder::new()
            .push_int(5)
            .push_int(6)
            .push_int(7)
            .push_int(2)
            .push_opcode(OpCode::OP_ROLL)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![6u8], vec![7u8], vec![5u8]]);
    }

    #[test]
    fn altstack_round() {
        let script = Builder::new()
            .push_int(42)
            .push_opcode(OpCode::OP_TOALTSTACK)
            .push_int(1)
            .push_opcode(OpCode::OP_FROMALTSTACK)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![1u8], vec![42u8]]);
    }

    #[test]
    fn hash_opcodes() {
        let script = Builder::new()
            .push_data(b"")
            .push_opcode(OpCode::OP_SHA256)
            .into_script();
        let runner = run(script).unwrap();
        assert_eq!(
            hex::encode(&runner.stack()[0]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let script = Builder::new()
            .push_data(b"")
            .push_opcode(OpCode::OP_HASH160)
            .into_script();
        let runner = run(script).unwrap();
        assert_eq!(
            hex::encode(&runner.stack()[0]),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn tx_bound_opcodes_need_context() {
        let script = Builder::new()
            .push_int(1)
            .push_opcode(OpCode::OP_CHECKLOCKTIMEVERIFY)
            .into_script();
        assert!(matches!(
            run(script),
            Err(ScriptError::Runtime(_, _, ExecError::NoTransactionContext))
        ));
    }

    #[test]
    fn within_and_comparison() {
        let script = Builder::new()
            .push_int(5)
            .push_int(1)
            .push_int(10)
            .push_opcode(OpCode::OP_WITHIN)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[vec![1u8]]);

        let script = Builder::new()
            .push_int(10)
            .push_int(1)
            .push_int(10)
            .push_opcode(OpCode::OP_WITHIN)
            .into_script();
        assert_eq!(run(script).unwrap().stack(), &[Vec::<u8>::new()]);
    }

    #[test]
    fn reserved_opcode_fails_only_when_executed() {
        let script = Builder::new()
            .push_int(0)
            .push_opcode(OpCode::OP_IF)
            .push_opcode(OpCode::OP_RESERVED)
            .push_opcode(OpCode::OP_ENDIF)
            .push_int(1)
            .into_script();
        assert!(run(script).unwrap().success());

        let script = Builder::new().push_opcode(OpCode::OP_RESERVED).into_script();
        assert!(matches!(
            run(script),
            Err(ScriptError::Runtime(_, _, ExecError::ReservedOpcode))
        ));
    }
}
