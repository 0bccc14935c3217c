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

//! Standard script recognition
//!
//! A rule-driven matcher walking a parsed script against a fixed list of
//! blueprints, one per standard locking-script template. Each blueprint is an
//! ordered token list: a literal opcode, a sized data push (optionally
//! captured as the address payload), a repeated data push, or a small-number
//! opcode. The first fully-matching blueprint wins; scripts matching none are
//! non-standard and refuse both address extraction and signing.

use crate::network::NetworkId;
use crate::script::address::{Address, AddressError, AddressPayload};
use crate::script::{Instruction, OpCode, Script};

/// Tags of the standard locking-script templates
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display(lowercase)]
pub enum ScriptType {
    /// `push(pubkey) OP_CHECKSIG`
    P2pk,

    /// `OP_DUP OP_HASH160 push(keyhash) OP_EQUALVERIFY OP_CHECKSIG`
    P2pkh,

    /// `OP_HASH160 push(scripthash) OP_EQUAL`
    P2sh,

    /// `OP_m push(key)… OP_n OP_CHECKMULTISIG`
    P2ms,

    /// `OP_0 push(20-byte keyhash)`
    P2wpkh,

    /// `OP_0 push(32-byte script hash)`
    P2wsh,

    /// `OP_1 push(32-byte output key)`
    P2tr,

    /// `OP_RETURN push(data)`
    NullData,
}

/// Result of standard-script recognition: the matched template plus the
/// captured address payload, where the template defines one
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Recognized {
    /// The template the script matches
    pub script_type: ScriptType,
    /// Captured payload: key hash, script hash or witness program
    pub payload: Option<Vec<u8>>,
}

enum Token {
    /// The exact opcode
    Op(OpCode),
    /// A push of one of the listed lengths
    Data {
        lens: &'static [usize],
        capture: bool,
    },
    /// A push of any length within the range
    DataRange { min: usize, max: usize },
    /// One or more pushes, each of one of the listed lengths
    DataRepeated { lens: &'static [usize] },
    /// Any of OP_1..OP_16
    OpN,
}

struct Blueprint {
    script_type: ScriptType,
    tokens: &'static [Token],
}

const KEY_LENS: &[usize] = &[33, 65];

static BLUEPRINTS: &[Blueprint] = &[
    Blueprint {
        script_type: ScriptType::P2pk,
        tokens: &[
            Token::Data {
                lens: KEY_LENS,
                capture: false,
            },
            Token::Op(OpCode::OP_CHECKSIG),
        ],
    },
    Blueprint {
        script_type: ScriptType::P2pkh,
        tokens: &[
            Token::Op(OpCode::OP_DUP),
            Token::Op(OpCode::OP_HASH160),
            Token::Data {
                lens: &[20],
                capture: true,
            },
            Token::Op(OpCode::OP_EQUALVERIFY),
            Token::Op(OpCode::OP_CHECKSIG),
        ],
    },
    Blueprint {
        script_type: ScriptType::P2sh,
        tokens: &[
            Token::Op(OpCode::OP_HASH160),
            Token::Data {
                lens: &[20],
                capture: true,
            },
            Token::Op(OpCode::OP_EQUAL),
        ],
    },
    Blueprint {
        script_type: ScriptType::P2ms,
        tokens: &[
            Token::OpN,
            Token::DataRepeated { lens: KEY_LENS },
            Token::OpN,
            Token::Op(OpCode::OP_CHECKMULTISIG),
        ],
    },
    Blueprint {
        script_type: ScriptType::P2wpkh,
        tokens: &[
            Token::Op(OpCode::OP_0),
            Token::Data {
                lens: &[20],
                capture: true,
            },
        ],
    },
    Blueprint {
        script_type: ScriptType::P2wsh,
        tokens: &[
            Token::Op(OpCode::OP_0),
            Token::Data {
                lens: &[32],
                capture: true,
            },
        ],
    },
    Blueprint {
        script_type: ScriptType::P2tr,
        tokens: &[
            Token::Op(OpCode::OP_1),
            Token::Data {
                lens: &[32],
                capture: true,
            },
        ],
    },
    // covers both the short-push and the OP_PUSHDATA1 (76..=80 bytes)
    // nulldata variants: the instruction parser erases the prefix form
    Blueprint {
        script_type: ScriptType::NullData,
        tokens: &[Token::Op(OpCode::OP_RETURN), Token::DataRange { min: 0, max: 80 }],
    },
];

fn match_blueprint(
    instructions: &[Instruction],
    blueprint: &Blueprint,
) -> Option<Option<Vec<u8>>> {
    let mut payload = None;
    let mut position = 0usize;
    for token in blueprint.tokens {
        match token {
            Token::Op(op) => {
                if instructions.get(position) != Some(&Instruction::Op(*op)) {
                    return None;
                }
                position += 1;
            }
            Token::Data { lens, capture } => match instructions.get(position) {
                Some(Instruction::PushBytes(data)) if lens.contains(&data.len()) => {
                    if *capture {
                        payload = Some(data.clone());
                    }
                    position += 1;
                }
                _ => return None,
            },
            Token::DataRange { min, max } => match instructions.get(position) {
                Some(Instruction::PushBytes(data))
                    if data.len() >= *min && data.len() <= *max =>
                {
                    position += 1;
                }
                _ => return None,
            },
            Token::DataRepeated { lens } => {
                let mut matched = 0usize;
                while let Some(Instruction::PushBytes(data)) = instructions.get(position) {
                    if !lens.contains(&data.len()) {
                        break;
                    }
                    matched += 1;
                    position += 1;
                }
                if matched == 0 {
                    return None;
                }
            }
            Token::OpN => match instructions.get(position) {
                Some(Instruction::Op(op)) if op.is_op_n() => position += 1,
                _ => return None,
            },
        }
    }
    if position == instructions.len() {
        Some(payload)
    } else {
        None
    }
}

impl Script {
    /// Recognizes the standard template the script matches, if any. The
    /// blueprint list is walked in a fixed order and the first match wins.
    pub fn recognize(&self) -> Option<Recognized> {
        let instructions = self.instructions().ok()?;
        for blueprint in BLUEPRINTS {
            if let Some(payload) = match_blueprint(&instructions, blueprint) {
                if blueprint.script_type == ScriptType::P2ms && self.parse_multisig().is_none() {
                    continue;
                }
                return Some(Recognized {
                    script_type: blueprint.script_type,
                    payload,
                });
            }
        }
        None
    }

    /// Standard type tag of the script, if it matches a blueprint
    pub fn script_type(&self) -> Option<ScriptType> {
        self.recognize().map(|recognized| recognized.script_type)
    }

    /// Whether the script matches any standard template
    pub fn is_standard(&self) -> bool {
        self.recognize().is_some()
    }

    /// Extracts the (m, pubkeys) structure of a bare multisig script,
    /// validating `1 <= m <= n <= 16` and that the trailing OP_n matches the
    /// number of keys
    pub fn parse_multisig(&self) -> Option<(u8, Vec<Vec<u8>>)> {
        let instructions = self.instructions().ok()?;
        if instructions.len() < 4 {
            return None;
        }
        let m = match instructions.first()? {
            Instruction::Op(op) => op.decode_small_int()?,
            _ => return None,
        };
        let n = match instructions.get(instructions.len() - 2)? {
            Instruction::Op(op) => op.decode_small_int()?,
            _ => return None,
        };
        if instructions.last() != Some(&Instruction::Op(OpCode::OP_CHECKMULTISIG)) {
            return None;
        }
        let keys = instructions[1..instructions.len() - 2]
            .iter()
            .map(|instruction| match instruction {
                Instruction::PushBytes(data) => Some(data.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        if m < 1 || n != keys.len() as i64 || m > n || n > 16 {
            return None;
        }
        Some((m as u8, keys))
    }

    /// Address form of the locking script for the given network. Standard
    /// scripts without an address form (P2PK, P2MS, nulldata) and
    /// non-standard scripts return `None`.
    pub fn to_address(
        &self,
        network: Option<NetworkId>,
    ) -> Result<Option<Address>, AddressError> {
        let recognized = match self.recognize() {
            Some(recognized) => recognized,
            None => return Ok(None),
        };
        let payload = match (recognized.script_type, recognized.payload) {
            (ScriptType::P2pkh, Some(data)) => {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(&data);
                AddressPayload::PubkeyHash(hash)
            }
            (ScriptType::P2sh, Some(data)) => {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(&data);
                AddressPayload::ScriptHash(hash)
            }
            (ScriptType::P2wpkh, Some(program)) | (ScriptType::P2wsh, Some(program)) => {
                AddressPayload::WitnessProgram {
                    version: 0,
                    program,
                }
            }
            (ScriptType::P2tr, Some(program)) => AddressPayload::WitnessProgram {
                version: 1,
                program,
            },
            _ => return Ok(None),
        };
        Address::new(payload, network).map(Some)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognition_is_stable() {
        let pubkey = vec![0x02; 33];
        let cases = vec![
            (Script::new_p2pk(&pubkey), ScriptType::P2pk),
            (Script::new_p2pkh(&[0x11; 20]), ScriptType::P2pkh),
            (Script::new_p2sh(&[0x22; 20]), ScriptType::P2sh),
            (
                Script::new_p2ms(2, &[vec![0x02; 33], vec![0x03; 33], vec![0x02; 65]]).unwrap(),
                ScriptType::P2ms,
            ),
            (Script::new_p2wpkh(&[0x33; 20]), ScriptType::P2wpkh),
            (Script::new_p2wsh(&[0x44; 32]), ScriptType::P2wsh),
            (Script::new_p2tr(&[0x55; 32]), ScriptType::P2tr),
            (Script::new_op_return(b"hello"), ScriptType::NullData),
        ];
        for (script, expected) in cases {
            assert_eq!(script.script_type(), Some(expected), "script {}", script);
        }
    }

    #[test]
    fn non_standard_scripts() {
        assert_eq!(Script::new().script_type(), None);
        let script = Script::builder()
            .push_opcode(OpCode::OP_DUP)
            .push_opcode(OpCode::OP_CHECKSIG)
            .into_script();
        assert_eq!(script.script_type(), None);
        // P2PKH with a 19-byte hash is no P2PKH
        let script = Script::builder()
            .push_opcode(OpCode::OP_DUP)
            .push_opcode(OpCode::OP_HASH160)
            .push_data(&[0x11; 19])
            .push_opcode(OpCode::OP_EQUALVERIFY)
            .push_opcode(OpCode::OP_CHECKSIG)
            .into_script();
        assert_eq!(script.script_type(), None);
    }

    #[test]
    fn multisig_structure() {
        let keys = vec![vec![0x02; 33], vec![0x03; 33]];
        let script = Script::new_p2ms(2, &keys).unwrap();
        let (m, parsed) = script.parse_multisig().unwrap();
        assert_eq!(m, 2);
        assert_eq!(parsed, keys);

        // trailing OP_n disagreeing with the key count is rejected
        let script = Script::builder()
            .push_opcode(OpCode::OP_1)
            .push_data(&[0x02; 33])
            .push_data(&[0x03; 33])
            .push_opcode(OpCode::OP_3)
            .push_opcode(OpCode::OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(script.parse_multisig(), None);
        assert_eq!(script.script_type(), None);
    }

    #[test]
    fn nulldata_length_bound() {
        assert_eq!(
            Script::new_op_return(&[0xaa; 80]).script_type(),
            Some(ScriptType::NullData)
        );
        assert_eq!(Script::new_op_return(&[0xaa; 81]).script_type(), None);
    }

    #[test]
    fn payload_capture() {
        let script = Script::new_p2pkh(&[0x11; 20]);
        let recognized = script.recognize().unwrap();
        assert_eq!(recognized.payload, Some(vec![0x11; 20]));

        let script = Script::new_p2pk(&[0x02; 33]);
        let recognized = script.recognize().unwrap();
        assert_eq!(recognized.payload, None);
    }

    #[test]
    fn address_extraction() {
        let script = Script::new_p2wpkh(&[0x33; 20]);
        let address = script.to_address(Some(NetworkId::Mainnet)).unwrap().unwrap();
        assert_eq!(
            address.payload,
            AddressPayload::WitnessProgram {
                version: 0,
                program: vec![0x33; 20],
            }
        );
        assert!(Script::new_p2pk(&[0x02; 33])
            .to_address(Some(NetworkId::Mainnet))
            .unwrap()
            .is_none());
    }
}
