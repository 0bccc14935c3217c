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

//! Script opcode table
//!
//! A fixed byte → opcode mapping. Only opcodes with a resolvable runner are
//! part of the table; any other byte fails script parsing, which makes the
//! "invalid opcodes fail the script immediately" rule hold by construction.
//! The bytes 0x01–0x4e are not opcodes but push prefixes and are consumed by
//! the instruction parser directly.

use std::fmt::{self, Display, Formatter};

/// Single script opcode identified by its serialized byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OpCode(u8);

macro_rules! opcodes {
    ($($name:ident => $value:expr),* $(,)?) => {
        impl OpCode {
            $(
                #[allow(missing_docs)]
                pub const $name: OpCode = OpCode($value);
            )*

            /// Name of the opcode as used in script assembly listings
            pub fn name(self) -> &'static str {
                match self.0 {
                    $($value => stringify!($name),)*
                    _ => "OP_INVALID",
                }
            }

            /// Resolves a byte into an opcode of the fixed table. Bytes
            /// without a runner (including the disabled arithmetic and
            /// splice opcodes) resolve to `None`.
            pub fn from_u8(value: u8) -> Option<OpCode> {
                match value {
                    $($value)|* => Some(OpCode(value)),
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    OP_0 => 0x00,
    OP_PUSHDATA1 => 0x4c,
    OP_PUSHDATA2 => 0x4d,
    OP_PUSHDATA4 => 0x4e,
    OP_1NEGATE => 0x4f,
    OP_RESERVED => 0x50,
    OP_1 => 0x51,
    OP_2 => 0x52,
    OP_3 => 0x53,
    OP_4 => 0x54,
    OP_5 => 0x55,
    OP_6 => 0x56,
    OP_7 => 0x57,
    OP_8 => 0x58,
    OP_9 => 0x59,
    OP_10 => 0x5a,
    OP_11 => 0x5b,
    OP_12 => 0x5c,
    OP_13 => 0x5d,
    OP_14 => 0x5e,
    OP_15 => 0x5f,
    OP_16 => 0x60,
    OP_NOP => 0x61,
    OP_VER => 0x62,
    OP_IF => 0x63,
    OP_NOTIF => 0x64,
    OP_VERIF => 0x65,
    OP_VERNOTIF => 0x66,
    OP_ELSE => 0x67,
    OP_ENDIF => 0x68,
    OP_VERIFY => 0x69,
    OP_RETURN => 0x6a,
    OP_TOALTSTACK => 0x6b,
    OP_FROMALTSTACK => 0x6c,
    OP_2DROP => 0x6d,
    OP_2DUP => 0x6e,
    OP_3DUP => 0x6f,
    OP_2OVER => 0x70,
    OP_2ROT => 0x71,
    OP_2SWAP => 0x72,
    OP_IFDUP => 0x73,
    OP_DEPTH => 0x74,
    OP_DROP => 0x75,
    OP_DUP => 0x76,
    OP_NIP => 0x77,
    OP_OVER => 0x78,
    OP_PICK => 0x79,
    OP_ROLL => 0x7a,
    OP_ROT => 0x7b,
    OP_SWAP => 0x7c,
    OP_TUCK => 0x7d,
    OP_SIZE => 0x82,
    OP_EQUAL => 0x87,
    OP_EQUALVERIFY => 0x88,
    OP_RESERVED1 => 0x89,
    OP_RESERVED2 => 0x8a,
    OP_1ADD => 0x8b,
    OP_1SUB => 0x8c,
    OP_NEGATE => 0x8f,
    OP_ABS => 0x90,
    OP_NOT => 0x91,
    OP_0NOTEQUAL => 0x92,
    OP_ADD => 0x93,
    OP_SUB => 0x94,
    OP_BOOLAND => 0x9a,
    OP_BOOLOR => 0x9b,
    OP_NUMEQUAL => 0x9c,
    OP_NUMEQUALVERIFY => 0x9d,
    OP_NUMNOTEQUAL => 0x9e,
    OP_LESSTHAN => 0x9f,
    OP_GREATERTHAN => 0xa0,
    OP_LESSTHANOREQUAL => 0xa1,
    OP_GREATERTHANOREQUAL => 0xa2,
    OP_MIN => 0xa3,
    OP_MAX => 0xa4,
    OP_WITHIN => 0xa5,
    OP_RIPEMD160 => 0xa6,
    OP_SHA1 => 0xa7,
    OP_SHA256 => 0xa8,
    OP_HASH160 => 0xa9,
    OP_HASH256 => 0xaa,
    OP_CODESEPARATOR => 0xab,
    OP_CHECKSIG => 0xac,
    OP_CHECKSIGVERIFY => 0xad,
    OP_CHECKMULTISIG => 0xae,
    OP_CHECKMULTISIGVERIFY => 0xaf,
    OP_NOP1 => 0xb0,
    OP_CHECKLOCKTIMEVERIFY => 0xb1,
    OP_CHECKSEQUENCEVERIFY => 0xb2,
    OP_NOP4 => 0xb3,
    OP_NOP5 => 0xb4,
    OP_NOP6 => 0xb5,
    OP_NOP7 => 0xb6,
    OP_NOP8 => 0xb7,
    OP_NOP9 => 0xb8,
    OP_NOP10 => 0xb9,
}

impl OpCode {
    /// Serialized byte of the opcode
    pub fn to_u8(self) -> u8 {
        self.0
    }

    /// Constructs the small-number opcode pushing `n` for n in 0..=16
    pub fn from_small_int(n: u8) -> OpCode {
        debug_assert!(n <= 16);
        if n == 0 {
            OpCode::OP_0
        } else {
            OpCode(OpCode::OP_1.0 + n - 1)
        }
    }

    /// Decodes the numeric constant pushed by OP_0, OP_1NEGATE and
    /// OP_1..OP_16
    pub fn decode_small_int(self) -> Option<i64> {
        match self {
            OpCode::OP_0 => Some(0),
            OpCode::OP_1NEGATE => Some(-1),
            OpCode(n) if (OpCode::OP_1.0..=OpCode::OP_16.0).contains(&n) => {
                Some((n - OpCode::OP_1.0) as i64 + 1)
            }
            _ => None,
        }
    }

    /// Whether the opcode is one of OP_1..OP_16
    pub fn is_op_n(self) -> bool {
        (OpCode::OP_1.0..=OpCode::OP_16.0).contains(&self.0)
    }

    /// Reserved opcodes fail the script when executed; OP_VERIF and
    /// OP_VERNOTIF additionally fail even inside a skipped branch
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            OpCode::OP_RESERVED
                | OpCode::OP_VER
                | OpCode::OP_VERIF
                | OpCode::OP_VERNOTIF
                | OpCode::OP_RESERVED1
                | OpCode::OP_RESERVED2
        )
    }
}

impl Display for OpCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
