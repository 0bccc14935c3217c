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

//! Key model
//!
//! Private and public keys bound to a network, carrying a compression flag
//! and an optional BIP44 purpose hint. The purpose selects the address
//! encoding produced downstream (legacy base58, nested segwit, bech32,
//! bech32m) and the BIP32 version prefixes of extended keys derived from the
//! same material. All elliptic-curve arithmetic is delegated to `secp256k1`.

use bitcoin_hashes::{hash160, sha256, Hash, HashEngine};
use secp256k1::{ecdsa, All, Message, Scalar, Secp256k1, SecretKey};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::network::{self, NetworkError, NetworkId};
use crate::script::address::{Address, AddressPayload};
use crate::script::Script;

lazy_static! {
    /// Shared secp256k1 context used by all signing and verification
    /// operations within the library
    pub(crate) static ref SECP256K1: Secp256k1<All> = Secp256k1::new();
}

/// BIP44 derivation purpose. Determines the address encoding of keys and the
/// version prefix of extended-key serializations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display(lowercase)]
pub enum Purpose {
    /// BIP44: legacy P2PKH addresses
    Legacy,

    /// BIP49: P2WPKH nested in P2SH
    Compat,

    /// BIP84: native segwit P2WPKH
    Segwit,

    /// BIP86: taproot P2TR
    Taproot,
}

impl Purpose {
    /// Purpose index used as the first component of a BIP44 path
    pub fn bip44_index(self) -> u32 {
        match self {
            Purpose::Legacy => 44,
            Purpose::Compat => 49,
            Purpose::Segwit => 84,
            Purpose::Taproot => 86,
        }
    }

    /// Reverse of [`Purpose::bip44_index`]
    pub fn from_bip44_index(index: u32) -> Option<Purpose> {
        Some(match index {
            44 => Purpose::Legacy,
            49 => Purpose::Compat,
            84 => Purpose::Segwit,
            86 => Purpose::Taproot,
            _ => return None,
        })
    }
}

/// Errors coming from key creation, derivation and ECDSA delegation
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum KeyError {
    /// malformed key material: {0}
    Create(String),

    /// key derivation failure: {0}
    Derive(String),

    /// signature creation failure: {0}
    Sign(String),

    /// signature verification failure: {0}
    Verify(String),

    /// {0}
    #[from]
    Network(NetworkError),
}

/// Private key: a 32-byte scalar valid under the secp256k1 curve order,
/// together with the serialization and network context of its public
/// counterpart
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PrivateKey {
    secret: SecretKey,
    /// Whether the corresponding public key serializes in compressed form
    pub compressed: bool,
    /// Network the key belongs to
    pub network: NetworkId,
    /// BIP44 purpose hint used to pick the address encoding
    pub purpose: Option<Purpose>,
}

impl PrivateKey {
    /// Creates a key from a raw 32-byte scalar. The scalar must be non-zero
    /// and below the curve order; the key is compressed and bound to the
    /// given network (default network when `None`).
    pub fn from_bytes(data: &[u8], network: Option<NetworkId>) -> Result<PrivateKey, KeyError> {
        let network = network::resolve_network(network)?;
        let secret =
            SecretKey::from_slice(data).map_err(|err| KeyError::Create(err.to_string()))?;
        Ok(PrivateKey {
            secret,
            compressed: true,
            network,
            purpose: None,
        })
    }

    /// Generates a new random private key bound to the default network
    pub fn generate() -> Result<PrivateKey, KeyError> {
        let network = network::resolve_network(None)?;
        let secret = SecretKey::new(&mut secp256k1::rand::thread_rng());
        Ok(PrivateKey {
            secret,
            compressed: true,
            network,
            purpose: None,
        })
    }

    pub(crate) fn from_secret(
        secret: SecretKey,
        network: NetworkId,
        purpose: Option<Purpose>,
    ) -> PrivateKey {
        PrivateKey {
            secret,
            compressed: true,
            network,
            purpose,
        }
    }

    /// Raw 32-byte scalar
    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    /// Parses a WIF-encoded key. The network is recovered from the version
    /// byte and checked against the single-network pin.
    pub fn from_wif(wif: &str) -> Result<PrivateKey, KeyError> {
        let payload = bs58::decode(wif)
            .with_check(None)
            .into_vec()
            .map_err(|err| KeyError::Create(err.to_string()))?;
        let (version, rest) = payload
            .split_first()
            .ok_or_else(|| KeyError::Create("empty WIF payload".to_owned()))?;
        let network = network::find_network(|params| params.wif_version == *version)
            .ok_or_else(|| KeyError::Create(format!("unknown WIF version byte {:#04x}", version)))?;
        network::check_network(network.id)?;
        let (key_bytes, compressed) = match rest.len() {
            32 => (&rest[..32], false),
            33 if rest[32] == 0x01 => (&rest[..32], true),
            _ => return Err(KeyError::Create("invalid WIF payload length".to_owned())),
        };
        let secret =
            SecretKey::from_slice(key_bytes).map_err(|err| KeyError::Create(err.to_string()))?;
        Ok(PrivateKey {
            secret,
            compressed,
            network: network.id,
            purpose: None,
        })
    }

    /// Encodes the key in WIF: base58check over the network WIF version
    /// byte, the raw scalar, and a trailing `0x01` marker for compressed
    /// keys
    pub fn to_wif(&self) -> Result<String, KeyError> {
        let params = network::get_network(self.network)?;
        let mut payload = Vec::with_capacity(34);
        payload.push(params.wif_version);
        payload.extend_from_slice(&self.to_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        Ok(bs58::encode(payload).with_check().into_string())
    }

    /// Derives the public counterpart, inheriting compression, network and
    /// purpose
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            point: secp256k1::PublicKey::from_secret_key(&SECP256K1, &self.secret),
            compressed: self.compressed,
            network: self.network,
            purpose: self.purpose,
        }
    }

    /// Produces a DER-encoded ECDSA signature over a 32-byte digest
    pub fn sign_digest(&self, digest: [u8; 32]) -> Result<Vec<u8>, KeyError> {
        let message = Message::from_digest(digest);
        let signature = SECP256K1.sign_ecdsa(&message, &self.secret);
        Ok(signature.serialize_der().to_vec())
    }
}

/// Public key: a point on the secp256k1 curve together with its preferred
/// serialization form and network context
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey {
    point: secp256k1::PublicKey,
    /// Whether the key serializes in 33-byte compressed form
    pub compressed: bool,
    /// Network the key belongs to
    pub network: NetworkId,
    /// BIP44 purpose hint used to pick the address encoding
    pub purpose: Option<Purpose>,
}

impl PublicKey {
    /// Parses a 33-byte compressed or 65-byte uncompressed SEC1 point,
    /// preserving the compression of the source encoding
    pub fn from_bytes(data: &[u8], network: Option<NetworkId>) -> Result<PublicKey, KeyError> {
        let network = network::resolve_network(network)?;
        let point = secp256k1::PublicKey::from_slice(data)
            .map_err(|err| KeyError::Create(err.to_string()))?;
        Ok(PublicKey {
            point,
            compressed: data.len() == 33,
            network,
            purpose: None,
        })
    }

    pub(crate) fn from_point(
        point: secp256k1::PublicKey,
        network: NetworkId,
        purpose: Option<Purpose>,
    ) -> PublicKey {
        PublicKey {
            point,
            compressed: true,
            network,
            purpose,
        }
    }

    /// Serializes the point in its preferred form: 33 bytes compressed or
    /// 65 bytes uncompressed
    pub fn serialize(&self) -> Vec<u8> {
        if self.compressed {
            self.point.serialize().to_vec()
        } else {
            self.point.serialize_uncompressed().to_vec()
        }
    }

    /// Always-compressed 33-byte serialization, as required by BIP32
    /// fingerprinting and HD derivation regardless of the display form
    pub fn serialize_compressed(&self) -> [u8; 33] {
        self.point.serialize()
    }

    /// HASH160 of the serialized key
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160::Hash::hash(&self.serialize()).to_byte_array()
    }

    /// Verifies a DER-encoded ECDSA signature over a 32-byte digest.
    /// Undecodable or non-verifying signatures yield `false`; high-S
    /// signatures are normalized first since historical transactions carry
    /// them.
    pub fn verify_digest(&self, digest: [u8; 32], signature_der: &[u8]) -> bool {
        let message = Message::from_digest(digest);
        match ecdsa::Signature::from_der(signature_der) {
            Ok(mut signature) => {
                signature.normalize_s();
                SECP256K1
                    .verify_ecdsa(&message, &signature, &self.point)
                    .is_ok()
            }
            Err(_) => false,
        }
    }

    /// BIP341 output key: the x-only internal key tweaked with
    /// `tagged_hash("TapTweak", xonly)`. Used for P2TR address encoding;
    /// script-path spending is out of scope.
    pub fn taproot_output_key(&self) -> Result<[u8; 32], KeyError> {
        let (internal, _parity) = self.point.x_only_public_key();
        let tweak = tagged_hash(b"TapTweak", &internal.serialize());
        let scalar = Scalar::from_be_bytes(tweak)
            .map_err(|_| KeyError::Derive("taproot tweak exceeds the curve order".to_owned()))?;
        let (output, _parity) = internal
            .add_tweak(&SECP256K1, &scalar)
            .map_err(|err| KeyError::Derive(err.to_string()))?;
        Ok(output.serialize())
    }

    /// Locking script paying to the hash of this key (P2PKH)
    pub fn p2pkh_script(&self) -> Script {
        Script::new_p2pkh(&self.pubkey_hash())
    }

    /// Witness-v0 locking script paying to the hash of this key (P2WPKH).
    /// Only defined for compressed keys.
    pub fn p2wpkh_script(&self) -> Result<Script, KeyError> {
        if !self.compressed {
            return Err(KeyError::Create(
                "uncompressed public keys cannot be used on segwit paths".to_owned(),
            ));
        }
        Ok(Script::new_p2wpkh(&self.pubkey_hash()))
    }

    /// Address of the key under its purpose hint: P2PKH for legacy,
    /// P2SH-wrapped P2WPKH for compat, P2WPKH for segwit, P2TR for taproot.
    /// Keys without a hint encode legacy.
    pub fn address(&self) -> Result<Address, KeyError> {
        let payload = match self.purpose.unwrap_or(Purpose::Legacy) {
            Purpose::Legacy => AddressPayload::PubkeyHash(self.pubkey_hash()),
            Purpose::Compat => {
                let program = self.p2wpkh_script()?;
                AddressPayload::ScriptHash(
                    hash160::Hash::hash(program.as_bytes()).to_byte_array(),
                )
            }
            Purpose::Segwit => {
                if !self.compressed {
                    return Err(KeyError::Create(
                        "uncompressed public keys cannot be used on segwit paths".to_owned(),
                    ));
                }
                AddressPayload::WitnessProgram {
                    version: 0,
                    program: self.pubkey_hash().to_vec(),
                }
            }
            Purpose::Taproot => AddressPayload::WitnessProgram {
                version: 1,
                program: self.taproot_output_key()?.to_vec(),
            },
        };
        Ok(Address {
            network: self.network,
            payload,
        })
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.serialize()))
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data = hex::decode(s).map_err(|err| KeyError::Create(err.to_string()))?;
        PublicKey::from_bytes(&data, None)
    }
}

/// BIP340-style tagged hash: `SHA256(SHA256(tag) ‖ SHA256(tag) ‖ msg)`
pub(crate) fn tagged_hash(tag: &[u8], msg: &[u8]) -> [u8; 32] {
    let tag_hash = sha256::Hash::hash(tag).to_byte_array();
    let mut engine = sha256::Hash::engine();
    engine.input(&tag_hash);
    engine.input(&tag_hash);
    engine.input(msg);
    sha256::Hash::from_engine(engine).to_byte_array()
}

#[cfg(test)]
mod test {
    use super::*;

    fn one_key() -> PrivateKey {
        let mut scalar = [0u8; 32];
        scalar[31] = 1;
        PrivateKey::from_bytes(&scalar, Some(NetworkId::Mainnet)).unwrap()
    }

    #[test]
    fn wif_roundtrip_compressed() {
        let key = one_key();
        assert_eq!(
            key.to_wif().unwrap(),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
        let parsed =
            PrivateKey::from_wif("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn").unwrap();
        assert_eq!(parsed.to_bytes(), key.to_bytes());
        assert!(parsed.compressed);
        assert_eq!(parsed.network, NetworkId::Mainnet);
    }

    #[test]
    fn wif_roundtrip_uncompressed() {
        let mut key = one_key();
        key.compressed = false;
        assert_eq!(
            key.to_wif().unwrap(),
            "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf"
        );
        let parsed =
            PrivateKey::from_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf").unwrap();
        assert!(!parsed.compressed);
    }

    #[test]
    fn public_key_derivation() {
        let key = one_key();
        let pubkey = key.public_key();
        assert_eq!(
            pubkey.to_string(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(
            hex::encode(pubkey.pubkey_hash()),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn uncompressed_serialization() {
        let mut key = one_key();
        key.compressed = false;
        let pubkey = key.public_key();
        let serialized = pubkey.serialize();
        assert_eq!(serialized.len(), 65);
        assert_eq!(serialized[0], 0x04);
    }

    #[test]
    fn sign_verify_digest() {
        let key = one_key();
        let digest = sha256::Hash::hash(b"digest to sign").to_byte_array();
        let signature = key.sign_digest(digest).unwrap();
        let pubkey = key.public_key();
        assert!(pubkey.verify_digest(digest, &signature));

        let mut tampered = signature.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(!pubkey.verify_digest(digest, &tampered));

        let other = sha256::Hash::hash(b"another digest").to_byte_array();
        assert!(!pubkey.verify_digest(other, &signature));
    }

    #[test]
    fn rejects_invalid_scalar() {
        assert!(PrivateKey::from_bytes(&[0u8; 32], Some(NetworkId::Mainnet)).is_err());
        let order = hex::decode(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        )
        .unwrap();
        assert!(PrivateKey::from_bytes(&order, Some(NetworkId::Mainnet)).is_err());
    }
}
