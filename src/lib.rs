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

//! Client-side Bitcoin toolkit: constructs, parses, signs and verifies
//! Bitcoin transactions, scripts and keys without talking to any node.
//!
//! The library is organized around four cores:
//! * the script engine ([`script`]): opcode table, standard-template
//!   recognition, addresses and a stack-machine interpreter covering the
//!   transaction-aware opcodes;
//! * the transaction subsystem ([`transaction`]): BIP141-aware
//!   serialization, legacy and BIP143 signature digests, per-input signing
//!   dispatch over the standard script types and end-to-end verification
//!   against a [`utxo::UtxoStore`];
//! * the PSBT container ([`psbt`]): the BIP 174/370 map and typed-field
//!   model with version-gated required fields;
//! * extended keys ([`bip32`]): BIP32 derivation, BIP44 paths, BIP39
//!   seeding and BIP85 child entropy.
//!
//! Chain parameters live in a process-wide [`network`] registry with a
//! selectable default and an optional single-network pin. Elliptic-curve
//! arithmetic, hashing and the address/mnemonic codecs are delegated to
//! `secp256k1`, `bitcoin_hashes`, `bech32`, `bs58` and `bip39`.

// Coding conventions
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
// TODO: when the API surface settles #![deny(missing_docs)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod bip32;
pub mod key;
pub mod network;
pub mod psbt;
pub mod script;
pub mod serialize;
pub mod transaction;
pub mod utxo;

pub use crate::bip32::{Bip44Path, ChildNumber, DerivationPath, ExtendedPrivKey, ExtendedPubKey};
pub use crate::key::{KeyError, PrivateKey, PublicKey, Purpose};
pub use crate::network::{Network, NetworkError, NetworkId};
pub use crate::psbt::Psbt;
pub use crate::script::{
    Address, AddressPayload, Builder, OpCode, Script, ScriptError, ScriptRunner, ScriptType,
};
pub use crate::serialize::{wire_deserialize, wire_serialize, VarInt, WireDecode, WireEncode};
pub use crate::transaction::sighash::SighashType;
pub use crate::transaction::signer::{sign_input, SignError, SignOptions};
pub use crate::transaction::{
    OutPoint, Transaction, TransactionError, TxIn, TxOut, Txid, Witness,
};
pub use crate::utxo::{Block, Utxo, UtxoError, UtxoStore};
