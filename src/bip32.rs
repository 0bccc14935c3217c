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

//! Hierarchical deterministic keys
//!
//! BIP32 extended private and public keys with hardened and non-hardened
//! child derivation, BIP44 path construction (purpose propagating to the
//! derived keys), BIP39 mnemonic seeding and BIP85 child-entropy
//! derivation. The 78-byte serialization carries per-network,
//! per-purpose version prefixes, so `xprv`/`yprv`/`zprv` (and the testnet
//! equivalents) all round-trip through the same codec.

use bitcoin_hashes::{hash160, sha512, Hash, HashEngine, Hmac, HmacEngine};
use secp256k1::{Scalar, SecretKey};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::key::{KeyError, PrivateKey, PublicKey, Purpose, SECP256K1};
use crate::network::{self, Bip32Version, NetworkId};

/// Constant determining the BIP32 boundary for u32 values after which an
/// index is treated as hardened
pub const HARDENED_INDEX_BOUNDARY: u32 = 1 << 31;

/// BIP85 application number of the BIP39-mnemonic application
pub const BIP85_APPLICATION_BIP39: u32 = 39;

const BIP85_ROOT_INDEX: u32 = 83_696_968;

fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut engine: HmacEngine<sha512::Hash> = HmacEngine::new(key);
    engine.input(data);
    Hmac::<sha512::Hash>::from_engine(engine).to_byte_array()
}

/// Single component of a derivation path
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ChildNumber {
    /// Non-hardened derivation, index below 2^31
    Normal {
        /// Child index
        index: u32,
    },
    /// Hardened derivation, only possible from private keys
    Hardened {
        /// Child index (without the hardened bit)
        index: u32,
    },
}

impl ChildNumber {
    /// Constructs a non-hardened child number, failing on index overflow
    pub fn normal(index: u32) -> Result<ChildNumber, KeyError> {
        if index >= HARDENED_INDEX_BOUNDARY {
            return Err(KeyError::Derive(format!(
                "unhardened index {} exceeds 2^31",
                index
            )));
        }
        Ok(ChildNumber::Normal { index })
    }

    /// Constructs a hardened child number, failing on index overflow
    pub fn hardened(index: u32) -> Result<ChildNumber, KeyError> {
        if index >= HARDENED_INDEX_BOUNDARY {
            return Err(KeyError::Derive(format!(
                "hardened index {} exceeds 2^31",
                index
            )));
        }
        Ok(ChildNumber::Hardened { index })
    }

    /// Whether the component requires hardened derivation
    pub fn is_hardened(&self) -> bool {
        matches!(self, ChildNumber::Hardened { .. })
    }

    /// Raw u32 with the hardened bit folded in, as serialized on the wire
    pub fn to_u32(self) -> u32 {
        match self {
            ChildNumber::Normal { index } => index,
            ChildNumber::Hardened { index } => index | HARDENED_INDEX_BOUNDARY,
        }
    }

    /// Reverse of [`ChildNumber::to_u32`]
    pub fn from_u32(raw: u32) -> ChildNumber {
        if raw >= HARDENED_INDEX_BOUNDARY {
            ChildNumber::Hardened {
                index: raw ^ HARDENED_INDEX_BOUNDARY,
            }
        } else {
            ChildNumber::Normal { index: raw }
        }
    }
}

impl Display for ChildNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChildNumber::Normal { index } => write!(f, "{}", index),
            ChildNumber::Hardened { index } => write!(f, "{}'", index),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix(|c| c == '\'' || c == 'h' || c == 'H') {
            Some(digits) => (digits, true),
            None => (s, false),
        };
        let index: u32 = digits
            .parse()
            .map_err(|_| KeyError::Derive(format!("invalid path component `{}`", s)))?;
        if hardened {
            ChildNumber::hardened(index)
        } else {
            ChildNumber::normal(index)
        }
    }
}

/// Ordered list of derivation components
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// The empty path `m`
    pub fn master() -> DerivationPath {
        DerivationPath(vec![])
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path is the master path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Components in derivation order
    pub fn components(&self) -> &[ChildNumber] {
        &self.0
    }

    /// Appends a single component
    pub fn child(mut self, child: ChildNumber) -> DerivationPath {
        self.0.push(child);
        self
    }

    /// Concatenates two paths
    pub fn extend(mut self, other: &DerivationPath) -> DerivationPath {
        self.0.extend_from_slice(&other.0);
        self
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(components: Vec<ChildNumber>) -> Self {
        DerivationPath(components)
    }
}

impl Display for DerivationPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for component in &self.0 {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match parts.next() {
            Some("m") | Some("M") | Some("") => {}
            Some(other) => {
                return Err(KeyError::Derive(format!(
                    "derivation path must start with `m`, not `{}`",
                    other
                )))
            }
            None => unreachable!("split always yields at least one item"),
        }
        let mut components = vec![];
        for part in parts {
            components.push(part.parse()?);
        }
        Ok(DerivationPath(components))
    }
}

/// Extended private key
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExtendedPrivKey {
    /// Network the key belongs to
    pub network: NetworkId,
    /// BIP44 purpose, selecting the serialization version prefix
    pub purpose: Option<Purpose>,
    /// Derivation depth below the master key
    pub depth: u8,
    /// First four bytes of the parent key identifier
    pub parent_fingerprint: [u8; 4],
    /// Child number this key was derived under
    pub child_number: ChildNumber,
    /// Chain code extending the key material
    pub chain_code: [u8; 32],
    secret: SecretKey,
}

/// Extended public key
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExtendedPubKey {
    /// Network the key belongs to
    pub network: NetworkId,
    /// BIP44 purpose, selecting the serialization version prefix
    pub purpose: Option<Purpose>,
    /// Derivation depth below the master key
    pub depth: u8,
    /// First four bytes of the parent key identifier
    pub parent_fingerprint: [u8; 4],
    /// Child number this key was derived under
    pub child_number: ChildNumber,
    /// Chain code extending the key material
    pub chain_code: [u8; 32],
    point: secp256k1::PublicKey,
}

impl ExtendedPrivKey {
    /// Derives the master key of a seed: HMAC-SHA512 keyed with
    /// `"Bitcoin seed"`, left half the key, right half the chain code
    pub fn new_master(seed: &[u8], network: Option<NetworkId>) -> Result<ExtendedPrivKey, KeyError> {
        let network = network::resolve_network(network)?;
        let digest = hmac_sha512(b"Bitcoin seed", seed);
        let secret = SecretKey::from_slice(&digest[..32])
            .map_err(|err| KeyError::Create(format!("unusable seed: {}", err)))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(ExtendedPrivKey {
            network,
            purpose: None,
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: ChildNumber::Normal { index: 0 },
            chain_code,
            secret,
        })
    }

    /// Derives the master key from a BIP39 mnemonic sentence (English
    /// wordlist), with an optional passphrase
    pub fn from_mnemonic(
        mnemonic: &str,
        passphrase: Option<&str>,
        network: Option<NetworkId>,
    ) -> Result<ExtendedPrivKey, KeyError> {
        let mnemonic = bip39::Mnemonic::parse_in_normalized(bip39::Language::English, mnemonic)
            .map_err(|err| KeyError::Create(format!("invalid mnemonic: {}", err)))?;
        let seed = mnemonic.to_seed(passphrase.unwrap_or(""));
        ExtendedPrivKey::new_master(&seed, network)
    }

    /// Derives a single child key. Hardened components commit to the
    /// private key, non-hardened ones to the compressed public key.
    pub fn derive_child(&self, child: ChildNumber) -> Result<ExtendedPrivKey, KeyError> {
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| KeyError::Derive("derivation depth exceeds 255".to_owned()))?;
        let mut data = Vec::with_capacity(37);
        match child {
            ChildNumber::Hardened { .. } => {
                data.push(0x00);
                data.extend_from_slice(&self.secret.secret_bytes());
            }
            ChildNumber::Normal { .. } => {
                data.extend_from_slice(
                    &secp256k1::PublicKey::from_secret_key(&SECP256K1, &self.secret).serialize(),
                );
            }
        }
        data.extend_from_slice(&child.to_u32().to_be_bytes());
        let digest = hmac_sha512(&self.chain_code, &data);

        let mut tweak = [0u8; 32];
        tweak.copy_from_slice(&digest[..32]);
        let scalar = Scalar::from_be_bytes(tweak).map_err(|_| {
            KeyError::Derive(format!("child {} tweak exceeds the curve order", child))
        })?;
        let secret = self.secret.add_tweak(&scalar).map_err(|_| {
            KeyError::Derive(format!("child {} derives the zero key", child))
        })?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(ExtendedPrivKey {
            network: self.network,
            purpose: self.purpose,
            depth,
            parent_fingerprint: self.fingerprint(),
            child_number: child,
            chain_code,
            secret,
        })
    }

    /// Derives along a full path
    pub fn derive_path(&self, path: &DerivationPath) -> Result<ExtendedPrivKey, KeyError> {
        let mut key = self.clone();
        for component in path.components() {
            key = key.derive_child(*component)?;
        }
        Ok(key)
    }

    /// Derives a BIP44-style path, stamping the account purpose onto the
    /// resulting key (and thus onto every basic key obtained from it)
    pub fn derive_bip44(&self, bip44: &Bip44Path) -> Result<ExtendedPrivKey, KeyError> {
        let path = bip44.to_path(self.network)?;
        let mut key = self.derive_path(&path)?;
        key.purpose = Some(bip44.purpose);
        Ok(key)
    }

    /// The corresponding extended public key
    pub fn to_extended_pub(&self) -> ExtendedPubKey {
        ExtendedPubKey {
            network: self.network,
            purpose: self.purpose,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            point: secp256k1::PublicKey::from_secret_key(&SECP256K1, &self.secret),
        }
    }

    /// Basic private key carrying over network and purpose by value
    pub fn private_key(&self) -> PrivateKey {
        PrivateKey::from_secret(self.secret, self.network, self.purpose)
    }

    /// HASH160 of the compressed public key
    pub fn identifier(&self) -> [u8; 20] {
        self.to_extended_pub().identifier()
    }

    /// First four bytes of the identifier
    pub fn fingerprint(&self) -> [u8; 4] {
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&self.identifier()[..4]);
        fingerprint
    }

    /// 78-byte serialization: version, depth, parent fingerprint, child
    /// number, chain code, `0x00` plus the private scalar
    pub fn encode(&self) -> Result<[u8; 78], KeyError> {
        let version = bip32_version(self.network, self.purpose)?.private;
        let mut out = [0u8; 78];
        out[..4].copy_from_slice(&version.to_be_bytes());
        out[4] = self.depth;
        out[5..9].copy_from_slice(&self.parent_fingerprint);
        out[9..13].copy_from_slice(&self.child_number.to_u32().to_be_bytes());
        out[13..45].copy_from_slice(&self.chain_code);
        out[45] = 0x00;
        out[46..].copy_from_slice(&self.secret.secret_bytes());
        Ok(out)
    }

    /// Parses the 78-byte serialization, recovering network and purpose
    /// from the version prefix
    pub fn decode(data: &[u8]) -> Result<ExtendedPrivKey, KeyError> {
        let (network, purpose, is_private) = parse_version(data)?;
        if !is_private {
            return Err(KeyError::Create(
                "public extended key passed where a private one is expected".to_owned(),
            ));
        }
        if data[45] != 0x00 {
            return Err(KeyError::Create(
                "private extended key material must start with a zero byte".to_owned(),
            ));
        }
        let secret = SecretKey::from_slice(&data[46..78])
            .map_err(|err| KeyError::Create(err.to_string()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);
        let mut child_bytes = [0u8; 4];
        child_bytes.copy_from_slice(&data[9..13]);
        Ok(ExtendedPrivKey {
            network,
            purpose,
            depth: data[4],
            parent_fingerprint,
            child_number: ChildNumber::from_u32(u32::from_be_bytes(child_bytes)),
            chain_code,
            secret,
        })
    }

    /// BIP85 child entropy: HMAC-SHA512 keyed `"bip-entropy-from-k"` over
    /// the private key derived along the application path
    pub fn derive_bip85_entropy(&self, path: &DerivationPath) -> Result<[u8; 64], KeyError> {
        let derived = self.derive_path(path)?;
        Ok(hmac_sha512(
            b"bip-entropy-from-k",
            &derived.secret.secret_bytes(),
        ))
    }

    /// BIP85 BIP39 application: derives a fresh mnemonic of the given word
    /// count under `m/83696968'/39'/{language}'/{words}'/{index}'`. Only
    /// the English wordlist (language index 0) is built in.
    pub fn derive_mnemonic(
        &self,
        language: u32,
        words: usize,
        index: u32,
    ) -> Result<String, KeyError> {
        if language != 0 {
            return Err(KeyError::Derive(
                "only the English wordlist (language index 0) is available".to_owned(),
            ));
        }
        let entropy_len = match words {
            12 => 16,
            15 => 20,
            18 => 24,
            21 => 28,
            24 => 32,
            other => {
                return Err(KeyError::Derive(format!(
                    "a mnemonic of {} words is not defined",
                    other
                )))
            }
        };
        let path = DerivationPath::master()
            .child(ChildNumber::hardened(BIP85_ROOT_INDEX)?)
            .child(ChildNumber::hardened(BIP85_APPLICATION_BIP39)?)
            .child(ChildNumber::hardened(language)?)
            .child(ChildNumber::hardened(words as u32)?)
            .child(ChildNumber::hardened(index)?);
        let entropy = self.derive_bip85_entropy(&path)?;
        let mnemonic = bip39::Mnemonic::from_entropy(&entropy[..entropy_len])
            .map_err(|err| KeyError::Derive(err.to_string()))?;
        Ok(mnemonic.to_string())
    }
}

impl Display for ExtendedPrivKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let encoded = self.encode().map_err(|_| fmt::Error)?;
        f.write_str(&bs58::encode(&encoded[..]).with_check().into_string())
    }
}

impl FromStr for ExtendedPrivKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtendedPrivKey::decode(&decode_base58check(s)?)
    }
}

impl ExtendedPubKey {
    /// Derives a single non-hardened child key. Hardened derivation from a
    /// public key is impossible and fails.
    pub fn derive_child(&self, child: ChildNumber) -> Result<ExtendedPubKey, KeyError> {
        if child.is_hardened() {
            return Err(KeyError::Derive(
                "hardened derivation from a public key".to_owned(),
            ));
        }
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| KeyError::Derive("derivation depth exceeds 255".to_owned()))?;
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.point.serialize());
        data.extend_from_slice(&child.to_u32().to_be_bytes());
        let digest = hmac_sha512(&self.chain_code, &data);

        let mut tweak = [0u8; 32];
        tweak.copy_from_slice(&digest[..32]);
        let scalar = Scalar::from_be_bytes(tweak).map_err(|_| {
            KeyError::Derive(format!("child {} tweak exceeds the curve order", child))
        })?;
        let point = self.point.add_exp_tweak(&SECP256K1, &scalar).map_err(|_| {
            KeyError::Derive(format!("child {} derives the point at infinity", child))
        })?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(ExtendedPubKey {
            network: self.network,
            purpose: self.purpose,
            depth,
            parent_fingerprint: self.fingerprint(),
            child_number: child,
            chain_code,
            point,
        })
    }

    /// Derives along a full non-hardened path
    pub fn derive_path(&self, path: &DerivationPath) -> Result<ExtendedPubKey, KeyError> {
        let mut key = *self;
        for component in path.components() {
            key = key.derive_child(*component)?;
        }
        Ok(key)
    }

    /// Basic public key carrying over network and purpose by value
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(self.point, self.network, self.purpose)
    }

    /// HASH160 of the compressed public key
    pub fn identifier(&self) -> [u8; 20] {
        hash160::Hash::hash(&self.point.serialize()).to_byte_array()
    }

    /// First four bytes of the identifier
    pub fn fingerprint(&self) -> [u8; 4] {
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&self.identifier()[..4]);
        fingerprint
    }

    /// 78-byte serialization with the compressed point as key material
    pub fn encode(&self) -> Result<[u8; 78], KeyError> {
        let version = bip32_version(self.network, self.purpose)?.public;
        let mut out = [0u8; 78];
        out[..4].copy_from_slice(&version.to_be_bytes());
        out[4] = self.depth;
        out[5..9].copy_from_slice(&self.parent_fingerprint);
        out[9..13].copy_from_slice(&self.child_number.to_u32().to_be_bytes());
        out[13..45].copy_from_slice(&self.chain_code);
        out[45..].copy_from_slice(&self.point.serialize());
        Ok(out)
    }

    /// Parses the 78-byte serialization, recovering network and purpose
    /// from the version prefix
    pub fn decode(data: &[u8]) -> Result<ExtendedPubKey, KeyError> {
        let (network, purpose, is_private) = parse_version(data)?;
        if is_private {
            return Err(KeyError::Create(
                "private extended key passed where a public one is expected".to_owned(),
            ));
        }
        let point = secp256k1::PublicKey::from_slice(&data[45..78])
            .map_err(|err| KeyError::Create(err.to_string()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);
        let mut child_bytes = [0u8; 4];
        child_bytes.copy_from_slice(&data[9..13]);
        Ok(ExtendedPubKey {
            network,
            purpose,
            depth: data[4],
            parent_fingerprint,
            child_number: ChildNumber::from_u32(u32::from_be_bytes(child_bytes)),
            chain_code,
            point,
        })
    }
}

impl Display for ExtendedPubKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let encoded = self.encode().map_err(|_| fmt::Error)?;
        f.write_str(&bs58::encode(&encoded[..]).with_check().into_string())
    }
}

impl FromStr for ExtendedPubKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtendedPubKey::decode(&decode_base58check(s)?)
    }
}

fn decode_base58check(s: &str) -> Result<Vec<u8>, KeyError> {
    let data = bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|err| KeyError::Create(err.to_string()))?;
    if data.len() != 78 {
        return Err(KeyError::Create(format!(
            "extended key body must be 78 bytes, not {}",
            data.len()
        )));
    }
    Ok(data)
}

fn bip32_version(
    network: NetworkId,
    purpose: Option<Purpose>,
) -> Result<Bip32Version, KeyError> {
    let params = network::get_network(network)?;
    Ok(params.bip32_version(purpose))
}

/// Scans the registered networks for the version prefix of a serialized
/// extended key, returning (network, purpose, is-private)
fn parse_version(data: &[u8]) -> Result<(NetworkId, Option<Purpose>, bool), KeyError> {
    if data.len() != 78 {
        return Err(KeyError::Create(format!(
            "extended key body must be 78 bytes, not {}",
            data.len()
        )));
    }
    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&data[..4]);
    let version = u32::from_be_bytes(version_bytes);

    let tables = |params: &network::Network| {
        [
            (params.bip32_legacy, None),
            (params.bip32_compat, Some(Purpose::Compat)),
            (params.bip32_segwit, Some(Purpose::Segwit)),
        ]
    };
    let params = network::find_network(|params| {
        tables(params)
            .iter()
            .any(|(table, _)| table.private == version || table.public == version)
    })
    .ok_or_else(|| {
        KeyError::Create(format!("unknown extended key version {:#010x}", version))
    })?;
    network::check_network(params.id)?;
    for (table, purpose) in &tables(&params) {
        if table.private == version {
            return Ok((params.id, *purpose, true));
        }
        if table.public == version {
            return Ok((params.id, *purpose, false));
        }
    }
    unreachable!("the version prefix matched during the registry scan")
}

/// BIP44 account path `m / purpose' / coin_type' / account' / change /
/// index`. The coin type defaults to the network's registered value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Bip44Path {
    /// Derivation purpose (44, 49, 84 or 86)
    pub purpose: Purpose,
    /// Coin type override; network default when `None`
    pub coin_type: Option<u32>,
    /// Account index (hardened)
    pub account: u32,
    /// Change chain: 0 external, 1 internal
    pub change: u32,
    /// Address index
    pub index: u32,
}

impl Default for Bip44Path {
    fn default() -> Self {
        Bip44Path {
            purpose: Purpose::Legacy,
            coin_type: None,
            account: 0,
            change: 0,
            index: 0,
        }
    }
}

impl Bip44Path {
    /// Expands into a concrete derivation path for the given network
    pub fn to_path(&self, network: NetworkId) -> Result<DerivationPath, KeyError> {
        let coin_type = match self.coin_type {
            Some(coin_type) => coin_type,
            None => network::get_network(network)?.bip44_coin_type,
        };
        Ok(DerivationPath::master()
            .child(ChildNumber::hardened(self.purpose.bip44_index())?)
            .child(ChildNumber::hardened(coin_type)?)
            .child(ChildNumber::hardened(self.account)?)
            .child(ChildNumber::normal(self.change)?)
            .child(ChildNumber::normal(self.index)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // BIP32 test vector 1
    const SEED_HEX: &str = "000102030405060708090a0b0c0d0e0f";

    fn master() -> ExtendedPrivKey {
        let seed = hex::decode(SEED_HEX).unwrap();
        ExtendedPrivKey::new_master(&seed, Some(NetworkId::Mainnet)).unwrap()
    }

    #[test]
    fn vector1_master() {
        let master = master();
        assert_eq!(
            master.to_string(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            master.to_extended_pub().to_string(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn vector1_chain() {
        let cases: Vec<(&str, &str)> = vec![
            (
                "m/0'",
                "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7",
            ),
            (
                "m/0'/1",
                "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs",
            ),
            (
                "m/0'/1/2'",
                "xprv9z4pot5VBttmtdRTWfWQmoH1taj2axGVzFqSb8C9xaxKymcFzXBDptWmT7FwuEzG3ryjH4ktypQSAewRiNMjANTtpgP4mLTj34bhnZX7UiM",
            ),
            (
                "m/0'/1/2'/2",
                "xprvA2JDeKCSNNZky6uBCviVfJSKyQ1mDYahRjijr5idH2WwLsEd4Hsb2Tyh8RfQMuPh7f7RtyzTtdrbdqqsunu5Mm3wDvUAKRHSC34sJ7in334",
            ),
            (
                "m/0'/1/2'/2/1000000000",
                "xprvA41z7zogVVwxVSgdKUHDy1SKmdb533PjDz7J6N6mV6uS3ze1ai8FHa8kmHScGpWmj4WggLyQjgPie1rFSruoUihUZREPSL39UNdE3BBDu76",
            ),
        ];
        let master = master();
        for (path, expected) in cases {
            let path: DerivationPath = path.parse().unwrap();
            let derived = master.derive_path(&path).unwrap();
            assert_eq!(derived.to_string(), expected, "path {}", path);
            // round-trip through the base58check form
            let parsed: ExtendedPrivKey = expected.parse().unwrap();
            assert_eq!(parsed, derived);
        }
    }

    #[test]
    fn public_derivation_matches_private() {
        let master = master();
        let account = master
            .derive_path(&"m/0'/1".parse().unwrap())
            .unwrap();
        let from_priv = account.derive_child(ChildNumber::normal(7).unwrap()).unwrap();
        let from_pub = account
            .to_extended_pub()
            .derive_child(ChildNumber::normal(7).unwrap())
            .unwrap();
        assert_eq!(from_priv.to_extended_pub(), from_pub);
    }

    #[test]
    fn hardened_from_public_fails() {
        let xpub = master().to_extended_pub();
        assert!(matches!(
            xpub.derive_child(ChildNumber::hardened(0).unwrap()),
            Err(KeyError::Derive(_))
        ));
    }

    #[test]
    fn derivation_is_associative() {
        let master = master();
        let p1: DerivationPath = "m/1/2".parse().unwrap();
        let p2: DerivationPath = "m/3/4/5".parse().unwrap();
        let combined = p1.clone().extend(&p2);
        assert_eq!(combined.to_string(), "m/1/2/3/4/5");
        let stepwise = master.derive_path(&p1).unwrap().derive_path(&p2).unwrap();
        let direct = master.derive_path(&combined).unwrap();
        assert_eq!(stepwise, direct);
    }

    #[test]
    fn path_parsing() {
        let path: DerivationPath = "m/44'/0'/0'/0/1".parse().unwrap();
        assert_eq!(path.len(), 5);
        assert!(path.components()[0].is_hardened());
        assert!(!path.components()[3].is_hardened());
        assert_eq!(path.to_string(), "m/44'/0'/0'/0/1");

        let with_h: DerivationPath = "m/44h/0h/0h/0/1".parse().unwrap();
        assert_eq!(with_h, path);

        assert!("n/44'".parse::<DerivationPath>().is_err());
        assert!("m/44x".parse::<DerivationPath>().is_err());
        assert!("m/2147483648".parse::<DerivationPath>().is_err());
    }

    #[test]
    fn fingerprints() {
        let master = master();
        let child = master.derive_child(ChildNumber::hardened(0).unwrap()).unwrap();
        assert_eq!(child.parent_fingerprint, master.fingerprint());
        assert_eq!(child.depth, 1);
        assert_eq!(child.child_number, ChildNumber::Hardened { index: 0 });
    }

    #[test]
    fn bip39_seed_and_bip84_version() {
        let mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon \
                        abandon abandon abandon about";
        let mut master =
            ExtendedPrivKey::from_mnemonic(mnemonic, None, Some(NetworkId::Mainnet)).unwrap();
        master.purpose = Some(Purpose::Segwit);
        assert_eq!(
            master.to_string(),
            "zprvAWgYBBk7JR8Gjrh4UJQ2uJdG1r3WNRRfURiABBE3RvMXYSrRJL62XuezvGdPvG6GFBZduosCc1YP5wixPox7zhZLfiUm8aunE96BBa4Kei5"
        );
        // the version prefix recovers network and purpose on parse
        let parsed: ExtendedPrivKey = master.to_string().parse().unwrap();
        assert_eq!(parsed.purpose, Some(Purpose::Segwit));
        assert_eq!(parsed.network, NetworkId::Mainnet);
    }

    #[test]
    fn bip44_path_expansion() {
        let bip44 = Bip44Path {
            purpose: Purpose::Segwit,
            account: 1,
            index: 3,
            ..Default::default()
        };
        let path = bip44.to_path(NetworkId::Mainnet).unwrap();
        assert_eq!(path.to_string(), "m/84'/0'/1'/0/3");
        let testnet = bip44.to_path(NetworkId::Testnet).unwrap();
        assert_eq!(testnet.to_string(), "m/84'/1'/1'/0/3");

        // the purpose propagates to derived basic keys
        let account = master().derive_bip44(&bip44).unwrap();
        assert_eq!(account.purpose, Some(Purpose::Segwit));
        assert_eq!(account.private_key().purpose, Some(Purpose::Segwit));
        assert_eq!(
            account.private_key().public_key().purpose,
            Some(Purpose::Segwit)
        );
    }

    #[test]
    fn bip85_mnemonic_vector() {
        let master: ExtendedPrivKey =
            "xprv9s21ZrQH143K2LBWUUQRFXhucrQqBpKdRRxNVq2zBqsx8HVqFk2uYo8kmbaLLHRdqtQpUm98uKfu3vca1LqdGhUtyoFnCNkfmXRyPXLjbKb"
                .parse()
                .unwrap();
        let mnemonic = master.derive_mnemonic(0, 12, 0).unwrap();
        assert_eq!(
            mnemonic,
            "girl mad pet galaxy egg matter matrix prison refuse sense ordinary nose"
        );
        // other wordlists are not built in
        assert!(master.derive_mnemonic(3, 12, 0).is_err());
        assert!(master.derive_mnemonic(0, 13, 0).is_err());
    }
}
