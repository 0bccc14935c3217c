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

//! Address encoding
//!
//! Base58check for the legacy hash types, bech32 for witness v0 programs and
//! bech32m for witness v1+ per BIP-350. Addresses are validated against the
//! active network on construction: parsing a string whose version byte or
//! human-readable part belongs to a different network than the current
//! default (or the single-network pin) is an error, not a silent rebind.

use bech32::{segwit, Fe32, Hrp};
use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::network::{self, NetworkError, NetworkId};
use crate::script::Script;

/// Hash or witness program carried inside an address
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum AddressPayload {
    /// HASH160 of a public key (P2PKH)
    PubkeyHash([u8; 20]),

    /// HASH160 of a redeem script (P2SH)
    ScriptHash([u8; 20]),

    /// Segwit witness program with its version
    WitnessProgram {
        /// Witness version, 0..=16
        version: u8,
        /// Witness program, 2..=40 bytes
        program: Vec<u8>,
    },
}

/// Bitcoin address: a payload bound to a network
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Address {
    /// Network whose parameters encode the address
    pub network: NetworkId,
    /// Hash or witness program of the address
    pub payload: AddressPayload,
}

/// Address encoding and validation errors
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum AddressError {
    /// {0}
    #[from]
    Network(NetworkError),

    /// malformed base58 address: {0}
    Base58(String),

    /// malformed bech32 address: {0}
    Bech32(String),

    /// address string is in no recognized format
    Format,

    /// version byte {0} does not belong to any registered network
    UnknownVersion(u8),

    /// human-readable part `{0}` does not belong to any registered network
    UnknownHrp(String),

    /// invalid witness program: version {0} with a {1}-byte program
    Program(u8, usize),
}

impl Address {
    /// Constructs an address for the given network (default network when
    /// `None`), validating witness program constraints
    pub fn new(payload: AddressPayload, network: Option<NetworkId>) -> Result<Address, AddressError> {
        let network = network::resolve_network(network)?;
        if let AddressPayload::WitnessProgram { version, ref program } = payload {
            if !witness_program_valid(version, program.len()) {
                return Err(AddressError::Program(version, program.len()));
            }
        }
        Ok(Address { network, payload })
    }

    /// Parses an address string, requiring it to belong to the given network
    /// (default network when `None`)
    pub fn parse(s: &str, network: Option<NetworkId>) -> Result<Address, AddressError> {
        let expected = network::resolve_network(network)?;
        let address = Address::decode(s)?;
        if address.network != expected {
            return Err(NetworkError::Check(address.network, expected).into());
        }
        Ok(address)
    }

    /// Decodes an address string, recovering the network from its version
    /// byte or human-readable part without validating it against the active
    /// network
    pub fn decode(s: &str) -> Result<Address, AddressError> {
        if let Ok((hrp, version, program)) = segwit::decode(s) {
            let version = version.to_u8();
            if !witness_program_valid(version, program.len()) {
                return Err(AddressError::Program(version, program.len()));
            }
            let hrp = hrp.to_string().to_lowercase();
            let params = network::find_network(|params| params.bech32_hrp == hrp)
                .ok_or(AddressError::UnknownHrp(hrp))?;
            return Ok(Address {
                network: params.id,
                payload: AddressPayload::WitnessProgram { version, program },
            });
        }
        // not bech32; either base58check or garbage
        let payload = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|err| match err {
                bs58::decode::Error::InvalidCharacter { .. } => AddressError::Format,
                other => AddressError::Base58(other.to_string()),
            })?;
        if payload.len() != 21 {
            return Err(AddressError::Base58(format!(
                "payload of {} bytes instead of 21",
                payload.len()
            )));
        }
        let version = payload[0];
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        let params = network::find_network(|params| {
            params.b58_pubkey_version == version || params.b58_script_version == version
        })
        .ok_or(AddressError::UnknownVersion(version))?;
        let payload = if params.b58_pubkey_version == version {
            AddressPayload::PubkeyHash(hash)
        } else {
            AddressPayload::ScriptHash(hash)
        };
        Ok(Address {
            network: params.id,
            payload,
        })
    }

    /// Locking script the address stands for
    pub fn script_pubkey(&self) -> Script {
        match &self.payload {
            AddressPayload::PubkeyHash(hash) => Script::new_p2pkh(hash),
            AddressPayload::ScriptHash(hash) => Script::new_p2sh(hash),
            AddressPayload::WitnessProgram { version, program } => Script::builder()
                .push_opcode(crate::script::OpCode::from_small_int(*version))
                .push_data(program)
                .into_script(),
        }
    }

    /// Encodes the address as a string using the parameters of its network
    pub fn encode(&self) -> Result<String, AddressError> {
        let params = network::get_network(self.network)?;
        Ok(match &self.payload {
            AddressPayload::PubkeyHash(hash) => {
                let mut payload = Vec::with_capacity(21);
                payload.push(params.b58_pubkey_version);
                payload.extend_from_slice(hash);
                bs58::encode(payload).with_check().into_string()
            }
            AddressPayload::ScriptHash(hash) => {
                let mut payload = Vec::with_capacity(21);
                payload.push(params.b58_script_version);
                payload.extend_from_slice(hash);
                bs58::encode(payload).with_check().into_string()
            }
            AddressPayload::WitnessProgram { version, program } => {
                let hrp = Hrp::parse(&params.bech32_hrp)
                    .map_err(|err| AddressError::Bech32(err.to_string()))?;
                let version = Fe32::try_from(*version)
                    .map_err(|err| AddressError::Bech32(err.to_string()))?;
                segwit::encode(hrp, version, program)
                    .map_err(|err| AddressError::Bech32(err.to_string()))?
            }
        })
    }
}

fn witness_program_valid(version: u8, program_len: usize) -> bool {
    match version {
        0 => program_len == 20 || program_len == 32,
        1..=16 => (2..=40).contains(&program_len),
        _ => false,
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode().map_err(|_| fmt::Error)?)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s, None)
    }
}
