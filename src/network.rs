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

//! Network parameter registry
//!
//! Process-wide catalog of chain parameters: P2P magic numbers, base58
//! version bytes, bech32 human-readable parts, BIP44 coin types and BIP32
//! extended-key version prefixes. A mutable *default* network selects the
//! chain for every key or address constructed without an explicit network;
//! the optional *single network* pin turns any cross-network construction
//! into an error.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::RwLock;

/// P2P network magic number: prefix identifying network on which node operates
pub type MagicNumber = u32;

/// Magic number used in P2P networking protocol by bitcoin mainnet
pub const P2P_MAGIC_MAINNET: MagicNumber = 0xD9B4BEF9;
/// Magic number used in P2P networking protocol by bitcoin testnet v3
pub const P2P_MAGIC_TESTNET: MagicNumber = 0x0709110B;
/// Magic number used in P2P networking protocol by bitcoin regtests
pub const P2P_MAGIC_REGTEST: MagicNumber = 0xDAB5BFFA;
/// Magic number used in P2P networking protocol by bitcoin signet
pub const P2P_MAGIC_SIGNET: MagicNumber = 0x40CF030A;

/// Network identifier. This enum defines the known standard networks, plus
/// adds support for arbitrary non-standard networks with the
/// [`NetworkId::Other`] variant, identified by their P2P magic number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum NetworkId {
    /// Bitcoin mainnet
    Mainnet,

    /// Bitcoin testnet v3
    Testnet,

    /// Bitcoin regtest
    Regtest,

    /// Bitcoin signet
    Signet,

    /// Other network, identified by the magic number of its P2P protocol
    Other(MagicNumber),
}

impl NetworkId {
    /// Enumerates all predefined networks
    pub fn all_known() -> Vec<NetworkId> {
        use NetworkId::*;
        vec![Mainnet, Testnet, Regtest, Signet]
    }

    /// Constructs network id matching the given P2P magic number
    pub fn from_magic(magic: MagicNumber) -> Self {
        match magic {
            m if m == NetworkId::Mainnet.as_magic() => NetworkId::Mainnet,
            m if m == NetworkId::Testnet.as_magic() => NetworkId::Testnet,
            m if m == NetworkId::Regtest.as_magic() => NetworkId::Regtest,
            m if m == NetworkId::Signet.as_magic() => NetworkId::Signet,
            m => NetworkId::Other(m),
        }
    }

    /// Returns P2P magic number of the network
    pub fn as_magic(&self) -> MagicNumber {
        match self {
            NetworkId::Mainnet => P2P_MAGIC_MAINNET,
            NetworkId::Testnet => P2P_MAGIC_TESTNET,
            NetworkId::Regtest => P2P_MAGIC_REGTEST,
            NetworkId::Signet => P2P_MAGIC_SIGNET,
            NetworkId::Other(m) => *m,
        }
    }
}

impl Display for NetworkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Mainnet => f.write_str("mainnet"),
            NetworkId::Testnet => f.write_str("testnet"),
            NetworkId::Regtest => f.write_str("regtest"),
            NetworkId::Signet => f.write_str("signet"),
            NetworkId::Other(_) => f.write_str("unknown"),
        }
    }
}

impl Debug for NetworkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x?})", self, self.as_magic())
    }
}

impl FromStr for NetworkId {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(NetworkId::Mainnet),
            "testnet" => Ok(NetworkId::Testnet),
            "regtest" => Ok(NetworkId::Regtest),
            "signet" => Ok(NetworkId::Signet),
            _ => Err(NetworkError::UnknownName(s.to_owned())),
        }
    }
}

/// BIP32 extended-key version prefixes for a single purpose (private and
/// public serialization)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Bip32Version {
    /// Version prefix of the 78-byte private serialization
    pub private: u32,
    /// Version prefix of the 78-byte public serialization
    pub public: u32,
}

/// Full parameter block of a single network
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Network {
    /// Identifier under which the parameters are registered
    pub id: NetworkId,
    /// Human-readable network name
    pub name: String,
    /// P2P protocol magic number
    pub p2p_magic: MagicNumber,
    /// Base58check version byte of P2PKH addresses
    pub b58_pubkey_version: u8,
    /// Base58check version byte of P2SH addresses
    pub b58_script_version: u8,
    /// Base58check version byte of WIF-encoded private keys
    pub wif_version: u8,
    /// Human-readable part of bech32/bech32m segwit addresses
    pub bech32_hrp: String,
    /// BIP44 coin type of the network
    pub bip44_coin_type: u32,
    /// Extended-key version prefixes for BIP44 (legacy) derivation
    pub bip32_legacy: Bip32Version,
    /// Extended-key version prefixes for BIP49 (nested segwit) derivation
    pub bip32_compat: Bip32Version,
    /// Extended-key version prefixes for BIP84 (native segwit) derivation
    pub bip32_segwit: Bip32Version,
}

impl Network {
    /// Bitcoin mainnet parameters
    pub fn mainnet() -> Network {
        Network {
            id: NetworkId::Mainnet,
            name: "Bitcoin Mainnet".to_owned(),
            p2p_magic: P2P_MAGIC_MAINNET,
            b58_pubkey_version: 0x00,
            b58_script_version: 0x05,
            wif_version: 0x80,
            bech32_hrp: "bc".to_owned(),
            bip44_coin_type: 0,
            bip32_legacy: Bip32Version {
                private: 0x0488ADE4,
                public: 0x0488B21E,
            },
            bip32_compat: Bip32Version {
                private: 0x049D7878,
                public: 0x049D7CB2,
            },
            bip32_segwit: Bip32Version {
                private: 0x04B2430C,
                public: 0x04B24746,
            },
        }
    }

    /// Bitcoin testnet v3 parameters
    pub fn testnet() -> Network {
        Network {
            id: NetworkId::Testnet,
            name: "Bitcoin Testnet".to_owned(),
            p2p_magic: P2P_MAGIC_TESTNET,
            b58_pubkey_version: 0x6f,
            b58_script_version: 0xc4,
            wif_version: 0xef,
            bech32_hrp: "tb".to_owned(),
            bip44_coin_type: 1,
            bip32_legacy: Bip32Version {
                private: 0x04358394,
                public: 0x043587CF,
            },
            bip32_compat: Bip32Version {
                private: 0x044A4E28,
                public: 0x044A5262,
            },
            bip32_segwit: Bip32Version {
                private: 0x045F18BC,
                public: 0x045F1CF6,
            },
        }
    }

    /// Bitcoin regtest parameters
    pub fn regtest() -> Network {
        let mut network = Network::testnet();
        network.id = NetworkId::Regtest;
        network.name = "Bitcoin Regtest".to_owned();
        network.p2p_magic = P2P_MAGIC_REGTEST;
        network.bech32_hrp = "bcrt".to_owned();
        network
    }

    /// Bitcoin signet parameters
    pub fn signet() -> Network {
        let mut network = Network::testnet();
        network.id = NetworkId::Signet;
        network.name = "Bitcoin Signet".to_owned();
        network.p2p_magic = P2P_MAGIC_SIGNET;
        network
    }

    /// Returns the BIP32 version prefixes matching a derivation purpose.
    /// BIP86 (taproot) reuses the BIP44 prefixes: no dedicated version bytes
    /// were ever assigned to it.
    pub fn bip32_version(&self, purpose: Option<crate::key::Purpose>) -> Bip32Version {
        use crate::key::Purpose;
        match purpose {
            Some(Purpose::Compat) => self.bip32_compat,
            Some(Purpose::Segwit) => self.bip32_segwit,
            Some(Purpose::Legacy) | Some(Purpose::Taproot) | None => self.bip32_legacy,
        }
    }
}

/// Errors coming from network parameter handling
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum NetworkError {
    /// no parameters are registered for network {0}
    Config(NetworkId),

    /// network name `{0}` is not known
    UnknownName(String),

    /// network {0} does not match the required network {1}
    Check(NetworkId, NetworkId),
}

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<NetworkId, Network>> = {
        let mut registry = HashMap::new();
        registry.insert(NetworkId::Mainnet, Network::mainnet());
        registry.insert(NetworkId::Testnet, Network::testnet());
        registry.insert(NetworkId::Regtest, Network::regtest());
        registry.insert(NetworkId::Signet, Network::signet());
        RwLock::new(registry)
    };
    static ref DEFAULT_NETWORK: RwLock<NetworkId> = RwLock::new(NetworkId::Mainnet);
    static ref SINGLE_NETWORK: RwLock<Option<NetworkId>> = RwLock::new(None);
}

/// Registers (or replaces) a parameter block in the process-wide catalog
pub fn register_network(network: Network) {
    REGISTRY
        .write()
        .expect("network registry lock poisoned")
        .insert(network.id, network);
}

/// Retrieves the parameter block of the given network
pub fn get_network(id: NetworkId) -> Result<Network, NetworkError> {
    REGISTRY
        .read()
        .expect("network registry lock poisoned")
        .get(&id)
        .cloned()
        .ok_or(NetworkError::Config(id))
}

/// Returns the currently selected default network
pub fn default_network() -> NetworkId {
    *DEFAULT_NETWORK
        .read()
        .expect("network registry lock poisoned")
}

/// Selects the default network used by all subsequently constructed keys and
/// addresses whose network is not supplied explicitly
pub fn set_default_network(id: NetworkId) -> Result<(), NetworkError> {
    get_network(id)?;
    check_network(id)?;
    *DEFAULT_NETWORK
        .write()
        .expect("network registry lock poisoned") = id;
    Ok(())
}

/// Pins the process to a single network: the default is switched to `id` and
/// any later construction against a different network fails with
/// [`NetworkError::Check`]
pub fn set_single_network(id: NetworkId) -> Result<(), NetworkError> {
    get_network(id)?;
    *SINGLE_NETWORK
        .write()
        .expect("network registry lock poisoned") = Some(id);
    *DEFAULT_NETWORK
        .write()
        .expect("network registry lock poisoned") = id;
    Ok(())
}

/// Removes the single-network pin
pub fn clear_single_network() {
    *SINGLE_NETWORK
        .write()
        .expect("network registry lock poisoned") = None;
}

/// Verifies the given network against the single-network pin, if one is set
pub fn check_network(id: NetworkId) -> Result<(), NetworkError> {
    if let Some(pinned) = *SINGLE_NETWORK
        .read()
        .expect("network registry lock poisoned")
    {
        if pinned != id {
            return Err(NetworkError::Check(id, pinned));
        }
    }
    Ok(())
}

/// Scans the registered parameter blocks for one satisfying the predicate.
/// The default network is consulted first, so version-byte collisions between
/// networks (testnet/regtest/signet share theirs) resolve in its favour.
pub fn find_network<F>(predicate: F) -> Option<Network>
where
    F: Fn(&Network) -> bool,
{
    let registry = REGISTRY.read().expect("network registry lock poisoned");
    if let Some(network) = registry.get(&default_network()) {
        if predicate(network) {
            return Some(network.clone());
        }
    }
    let mut candidates = registry
        .values()
        .filter(|network| predicate(network))
        .collect::<Vec<_>>();
    candidates.sort_by_key(|network| network.id);
    candidates.first().map(|network| (*network).clone())
}

/// Resolves an optional network argument: an explicit network is validated
/// against the single-network pin, an absent one is replaced by the default
pub fn resolve_network(id: Option<NetworkId>) -> Result<NetworkId, NetworkError> {
    match id {
        Some(id) => {
            get_network(id)?;
            check_network(id)?;
            Ok(id)
        }
        None => Ok(default_network()),
    }
}
