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

//! Bitcoin script: byte-level model, instruction parsing, builder and the
//! stack-machine interpreter executing it

pub mod address;
pub mod interpreter;
pub mod num;
pub mod op;
pub mod standard;

pub use address::{Address, AddressPayload};
pub use interpreter::{ExecError, ScriptRunner, TransactionContext};
pub use op::OpCode;
pub use standard::ScriptType;

use std::fmt::{self, Debug, Display, Formatter};
use std::io;

use crate::serialize::{self, read_bytes, VarInt, WireDecode, WireEncode};

/// Errors of script parsing and execution
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ScriptError {
    /// unknown opcode byte {0} in script
    Opcode(u8),

    /// push of {0} bytes at offset {1} overruns the script end
    Syntax(usize, usize),

    /// {0} at position {1} failed: {2}
    Runtime(String, usize, ExecError),

    /// multisig script requires 1 <= m <= n <= 16, got m={0} over {1} keys
    Multisig(usize, usize),
}

/// Single parsed script operation: either a byte-string push (direct or via
/// one of the OP_PUSHDATA prefixes) or an opcode of the fixed table.
/// Constant-pushing opcodes (OP_0, OP_1..OP_16, OP_1NEGATE) stay opcodes;
/// their stack effect is produced by the interpreter.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Instruction {
    /// Push of the contained byte string
    PushBytes(Vec<u8>),
    /// Non-push opcode
    Op(OpCode),
}

/// Script under the identity of its serialized bytes. Parsing into
/// [`Instruction`]s is done on demand and the byte form is authoritative, so
/// `parse ∘ serialize = id` holds trivially for every script accepted by the
/// parser.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Script(Vec<u8>);

impl Script {
    /// Constructs an empty script
    pub fn new() -> Script {
        Script(vec![])
    }

    /// Script length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the script contains no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized script bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the script returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Parses a hex string into a script
    pub fn from_hex(s: &str) -> Result<Script, hex::FromHexError> {
        Ok(Script(hex::decode(s)?))
    }

    /// Hex encoding of the serialized script
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Greedily parses the serialized bytes into operations. Fails when a
    /// declared push length exceeds the remaining script or a byte does not
    /// resolve in the opcode table.
    pub fn instructions(&self) -> Result<Vec<Instruction>, ScriptError> {
        Ok(self
            .instructions_with_offsets()?
            .into_iter()
            .map(|(_, instruction)| instruction)
            .collect())
    }

    /// Same as [`Script::instructions`], annotating every operation with the
    /// byte offset it starts at. The offsets delimit codeseparator
    /// subscripts in the interpreter.
    pub(crate) fn instructions_with_offsets(
        &self,
    ) -> Result<Vec<(usize, Instruction)>, ScriptError> {
        let bytes = &self.0;
        let mut instructions = vec![];
        let mut cursor = 0usize;
        while cursor < bytes.len() {
            let offset = cursor;
            let lead = bytes[cursor];
            cursor += 1;
            match lead {
                0x01..=0x4b => {
                    let len = lead as usize;
                    if cursor + len > bytes.len() {
                        return Err(ScriptError::Syntax(len, offset));
                    }
                    instructions
                        .push((offset, Instruction::PushBytes(bytes[cursor..cursor + len].to_vec())));
                    cursor += len;
                }
                0x4c | 0x4d | 0x4e => {
                    let len_width = match lead {
                        0x4c => 1,
                        0x4d => 2,
                        _ => 4,
                    };
                    if cursor + len_width > bytes.len() {
                        return Err(ScriptError::Syntax(len_width, offset));
                    }
                    let mut len = 0usize;
                    for (pos, byte) in bytes[cursor..cursor + len_width].iter().enumerate() {
                        len |= (*byte as usize) << (8 * pos);
                    }
                    cursor += len_width;
                    if cursor + len > bytes.len() {
                        return Err(ScriptError::Syntax(len, offset));
                    }
                    instructions
                        .push((offset, Instruction::PushBytes(bytes[cursor..cursor + len].to_vec())));
                    cursor += len;
                }
                byte => match OpCode::from_u8(byte) {
                    Some(op) => instructions.push((offset, Instruction::Op(op))),
                    None => return Err(ScriptError::Opcode(byte)),
                },
            }
        }
        Ok(instructions)
    }

    /// Starts building a script
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// `push(pubkey) OP_CHECKSIG`
    pub fn new_p2pk(pubkey: &[u8]) -> Script {
        Builder::new()
            .push_data(pubkey)
            .push_opcode(OpCode::OP_CHECKSIG)
            .into_script()
    }

    /// `OP_DUP OP_HASH160 push(pubkey_hash) OP_EQUALVERIFY OP_CHECKSIG`
    pub fn new_p2pkh(pubkey_hash: &[u8; 20]) -> Script {
        Builder::new()
            .push_opcode(OpCode::OP_DUP)
            .push_opcode(OpCode::OP_HASH160)
            .push_data(pubkey_hash)
            .push_opcode(OpCode::OP_EQUALVERIFY)
            .push_opcode(OpCode::OP_CHECKSIG)
            .into_script()
    }

    /// `OP_HASH160 push(script_hash) OP_EQUAL`
    pub fn new_p2sh(script_hash: &[u8; 20]) -> Script {
        Builder::new()
            .push_opcode(OpCode::OP_HASH160)
            .push_data(script_hash)
            .push_opcode(OpCode::OP_EQUAL)
            .into_script()
    }

    /// `OP_m push(key_1) … push(key_n) OP_n OP_CHECKMULTISIG`. Requires
    /// `1 <= m <= n <= 16`.
    pub fn new_p2ms(required: u8, pubkeys: &[Vec<u8>]) -> Result<Script, ScriptError> {
        if required == 0 || pubkeys.is_empty() || pubkeys.len() > 16 || required as usize > pubkeys.len()
        {
            return Err(ScriptError::Multisig(required as usize, pubkeys.len()));
        }
        let mut builder = Builder::new().push_opcode(OpCode::from_small_int(required));
        for pubkey in pubkeys {
            builder = builder.push_data(pubkey);
        }
        Ok(builder
            .push_opcode(OpCode::from_small_int(pubkeys.len() as u8))
            .push_opcode(OpCode::OP_CHECKMULTISIG)
            .into_script())
    }

    /// `OP_0 push(pubkey_hash)`: witness v0 keyhash program
    pub fn new_p2wpkh(pubkey_hash: &[u8; 20]) -> Script {
        Builder::new()
            .push_opcode(OpCode::OP_0)
            .push_data(pubkey_hash)
            .into_script()
    }

    /// `OP_0 push(script_sha256)`: witness v0 script-hash program
    pub fn new_p2wsh(script_hash: &[u8; 32]) -> Script {
        Builder::new()
            .push_opcode(OpCode::OP_0)
            .push_data(script_hash)
            .into_script()
    }

    /// `OP_1 push(output_key)`: witness v1 taproot program
    pub fn new_p2tr(output_key: &[u8; 32]) -> Script {
        Builder::new()
            .push_opcode(OpCode::OP_1)
            .push_data(output_key)
            .into_script()
    }

    /// `OP_RETURN push(data)`: provably unspendable data carrier
    pub fn new_op_return(data: &[u8]) -> Script {
        Builder::new()
            .push_opcode(OpCode::OP_RETURN)
            .push_data(data)
            .into_script()
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Script {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for Script {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl WireEncode for Script {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, serialize::Error> {
        let mut len = VarInt::from(self.0.len()).wire_encode(&mut e)?;
        e.write_all(&self.0)?;
        len += self.0.len();
        Ok(len)
    }
}

impl WireDecode for Script {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, serialize::Error> {
        let len = VarInt::wire_decode(&mut d)?.to_usize()?;
        Ok(Script(read_bytes(d, len)?))
    }
}

/// Incremental script builder choosing the shortest push encoding
#[derive(Clone, Default)]
pub struct Builder(Vec<u8>);

impl Builder {
    /// Starts an empty script
    pub fn new() -> Builder {
        Builder(vec![])
    }

    /// Appends a single opcode
    pub fn push_opcode(mut self, op: OpCode) -> Builder {
        self.0.push(op.to_u8());
        self
    }

    /// Appends a data push using the shortest encoding for the given length.
    /// The empty byte string is pushed as OP_0.
    pub fn push_data(mut self, data: &[u8]) -> Builder {
        match data.len() {
            0 => self.0.push(OpCode::OP_0.to_u8()),
            n @ 1..=75 => {
                self.0.push(n as u8);
                self.0.extend_from_slice(data);
            }
            n @ 76..=255 => {
                self.0.push(OpCode::OP_PUSHDATA1.to_u8());
                self.0.push(n as u8);
                self.0.extend_from_slice(data);
            }
            n @ 256..=65535 => {
                self.0.push(OpCode::OP_PUSHDATA2.to_u8());
                self.0.extend_from_slice(&(n as u16).to_le_bytes());
                self.0.extend_from_slice(data);
            }
            n => {
                self.0.push(OpCode::OP_PUSHDATA4.to_u8());
                self.0.extend_from_slice(&(n as u32).to_le_bytes());
                self.0.extend_from_slice(data);
            }
        }
        self
    }

    /// Appends an integer push, preferring the dedicated small-number
    /// opcodes where they exist
    pub fn push_int(self, n: i64) -> Builder {
        match n {
            -1 => self.push_opcode(OpCode::OP_1NEGATE),
            0..=16 => self.push_opcode(OpCode::from_small_int(n as u8)),
            _ => {
                let encoded = num::encode_num(&num_bigint::BigInt::from(n));
                self.push_data(&encoded)
            }
        }
    }

    /// Finishes building
    pub fn into_script(self) -> Script {
        Script(self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let script = Script::from_hex(
            "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac",
        )
        .unwrap();
        let instructions = script.instructions().unwrap();
        assert_eq!(instructions.len(), 5);
        assert_eq!(instructions[0], Instruction::Op(OpCode::OP_DUP));
        assert_eq!(instructions[1], Instruction::Op(OpCode::OP_HASH160));
        match &instructions[2] {
            Instruction::PushBytes(data) => assert_eq!(data.len(), 20),
            other => panic!("expected push, got {:?}", other),
        }
        assert_eq!(instructions[4], Instruction::Op(OpCode::OP_CHECKSIG));
    }

    #[test]
    fn builder_shortest_encoding() {
        let script = Builder::new().push_data(&[0xaa; 75]).into_script();
        assert_eq!(script.as_bytes()[0], 75);

        let script = Builder::new().push_data(&[0xaa; 76]).into_script();
        assert_eq!(script.as_bytes()[0], OpCode::OP_PUSHDATA1.to_u8());
        assert_eq!(script.as_bytes()[1], 76);

        let script = Builder::new().push_data(&[0xaa; 256]).into_script();
        assert_eq!(script.as_bytes()[0], OpCode::OP_PUSHDATA2.to_u8());
        assert_eq!(&script.as_bytes()[1..3], &[0x00, 0x01]);

        let script = Builder::new().push_data(&[]).into_script();
        assert_eq!(script.as_bytes(), &[0x00]);
    }

    #[test]
    fn pushdata_reparses() {
        for len in &[1usize, 75, 76, 255, 256, 520, 65536] {
            let data = vec![0x42u8; *len];
            let script = Builder::new().push_data(&data).into_script();
            let instructions = script.instructions().unwrap();
            assert_eq!(instructions, vec![Instruction::PushBytes(data)]);
        }
    }

    #[test]
    fn push_overrun_fails() {
        // declares a 5-byte push but only 2 bytes follow
        let script = Script::from(vec![0x05, 0xaa, 0xbb]);
        assert_eq!(script.instructions(), Err(ScriptError::Syntax(5, 0)));

        // PUSHDATA2 with a truncated length prefix
        let script = Script::from(vec![0x4d, 0x01]);
        assert_eq!(script.instructions(), Err(ScriptError::Syntax(2, 0)));
    }

    #[test]
    fn unknown_opcode_fails() {
        let script = Script::from(vec![0x76, 0x7e]); // OP_DUP OP_CAT
        assert_eq!(script.instructions(), Err(ScriptError::Opcode(0x7e)));
    }

    #[test]
    fn push_int_small_numbers() {
        let script = Builder::new()
            .push_int(0)
            .push_int(1)
            .push_int(16)
            .push_int(-1)
            .push_int(17)
            .into_script();
        assert_eq!(script.as_bytes(), &[0x00, 0x51, 0x60, 0x4f, 0x01, 0x11]);
    }

    #[test]
    fn wire_framing() {
        let script = Script::new_p2pkh(&[0x11; 20]);
        let serialized = script.wire_serialize().unwrap();
        assert_eq!(serialized[0] as usize, script.len());
        assert_eq!(Script::wire_deserialize(&serialized).unwrap(), script);
    }
}
