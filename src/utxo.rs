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

//! UTXO store
//!
//! In-memory index of unspent outputs keyed by outpoint, with a pluggable
//! loader hook consulted on misses. The store is an explicit collaborator
//! passed into `verify`, `sign` and `fee`; nothing in the library holds a
//! hidden global copy.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

use crate::serialize;
use crate::transaction::{OutPoint, Transaction, Txid, TxOut};
use crate::serialize::WireDecode;

/// Block context: the chain position a UTXO was created at, or the position
/// a transaction is validated against
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Block {
    /// Block height
    pub height: u32,
    /// Block timestamp (median-time-past semantics for locktime checks)
    pub timestamp: u32,
}

/// Unspent transaction output together with its origin
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Utxo {
    /// Outpoint the output is reachable under
    pub outpoint: OutPoint,
    /// The output itself
    pub output: TxOut,
    /// Block the creating transaction was confirmed in, if known; required
    /// for relative-locktime validation
    pub block: Option<Block>,
}

impl Utxo {
    /// Constructs a UTXO for the given creating transaction and output
    /// index
    pub fn new(txid: Txid, vout: u32, output: TxOut) -> Utxo {
        Utxo {
            outpoint: OutPoint::new(txid, vout),
            output,
            block: None,
        }
    }
}

/// UTXO retrieval errors
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum UtxoError {
    /// no UTXO is registered for outpoint {0} and the loader returned none
    Missing(OutPoint),
}

/// Callback invoked on a store miss; a returned UTXO is registered before
/// being handed out
pub type Loader = Box<dyn Fn(&OutPoint) -> Option<Utxo>>;

/// In-memory outpoint → UTXO index
#[derive(Default)]
pub struct UtxoStore {
    map: HashMap<OutPoint, Utxo>,
    loader: Option<Loader>,
}

impl UtxoStore {
    /// Creates an empty store with no loader
    pub fn new() -> UtxoStore {
        UtxoStore {
            map: HashMap::new(),
            loader: None,
        }
    }

    /// Number of registered outputs
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the store holds no outputs
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether an outpoint is currently registered
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.map.contains_key(outpoint)
    }

    /// Registers an output. Nulldata outputs are provably unspendable and
    /// are never stored; re-registration of a known outpoint replaces the
    /// previous entry.
    pub fn register(&mut self, utxo: Utxo) {
        if utxo.output.is_null_data() {
            debug!("not registering unspendable nulldata output {}", utxo.outpoint);
            return;
        }
        self.map.insert(utxo.outpoint, utxo);
    }

    /// Removes an outpoint from the store, returning the removed UTXO if it
    /// was present
    pub fn unregister(&mut self, outpoint: &OutPoint) -> Option<Utxo> {
        self.map.remove(outpoint)
    }

    /// Retrieves a UTXO. On a miss the loader, if set, is consulted; a UTXO
    /// it returns is registered first, so repeated lookups are stable.
    pub fn get(&mut self, outpoint: &OutPoint) -> Result<Utxo, UtxoError> {
        if let Some(utxo) = self.map.get(outpoint) {
            return Ok(utxo.clone());
        }
        if let Some(loader) = &self.loader {
            if let Some(utxo) = loader(outpoint) {
                debug!("loader resolved outpoint {}", outpoint);
                self.map.insert(utxo.outpoint, utxo.clone());
                return Ok(utxo);
            }
        }
        Err(UtxoError::Missing(*outpoint))
    }

    /// Installs or removes the miss loader
    pub fn set_loader(&mut self, loader: Option<Loader>) {
        self.loader = loader;
    }

    /// Parses a serialized transaction and registers all of its outputs as
    /// UTXOs keyed by the transaction's own id, returning the parsed
    /// transaction
    pub fn extract(&mut self, serialized: &[u8]) -> Result<Transaction, serialize::Error> {
        let tx = Transaction::wire_deserialize(&serialized)?;
        let txid = tx.txid()?;
        for (vout, output) in tx.outputs.iter().enumerate() {
            self.register(Utxo::new(txid, vout as u32, output.clone()));
        }
        Ok(tx)
    }
}

impl Debug for UtxoStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UtxoStore({} outputs, loader {})",
            self.map.len(),
            if self.loader.is_some() { "set" } else { "unset" }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::script::Script;

    fn sample_utxo(byte: u8, vout: u32) -> Utxo {
        Utxo::new(
            Txid::from_bytes([byte; 32]),
            vout,
            TxOut::new(10_000, Script::new_p2pkh(&[byte; 20])),
        )
    }

    #[test]
    fn register_get_unregister() {
        let mut store = UtxoStore::new();
        let utxo = sample_utxo(0x01, 0);
        store.register(utxo.clone());
        assert_eq!(store.get(&utxo.outpoint).unwrap(), utxo);
        assert_eq!(store.unregister(&utxo.outpoint), Some(utxo.clone()));
        assert_eq!(
            store.get(&utxo.outpoint),
            Err(UtxoError::Missing(utxo.outpoint))
        );
    }

    #[test]
    fn nulldata_never_stored() {
        let mut store = UtxoStore::new();
        let utxo = Utxo::new(
            Txid::from_bytes([0x02; 32]),
            0,
            TxOut::new(0, Script::new_op_return(b"burn")),
        );
        store.register(utxo.clone());
        assert!(store.is_empty());
        assert!(store.get(&utxo.outpoint).is_err());
    }

    #[test]
    fn loader_consulted_and_result_registered() {
        let mut store = UtxoStore::new();
        let utxo = sample_utxo(0x03, 7);
        let loaded = utxo.clone();
        store.set_loader(Some(Box::new(move |outpoint| {
            if *outpoint == loaded.outpoint {
                Some(loaded.clone())
            } else {
                None
            }
        })));
        assert_eq!(store.get(&utxo.outpoint).unwrap(), utxo);
        // registered now: dropping the loader must not lose it
        store.set_loader(None);
        assert_eq!(store.get(&utxo.outpoint).unwrap(), utxo);
        // unknown outpoints still miss
        let missing = OutPoint::new(Txid::from_bytes([0x04; 32]), 0);
        assert!(store.get(&missing).is_err());
    }

    #[test]
    fn extract_registers_outputs() {
        use crate::serialize::WireEncode;
        use crate::transaction::{OutPoint, TxIn};

        let mut tx = Transaction::new();
        tx.inputs
            .push(TxIn::new(OutPoint::new(Txid::from_bytes([0x05; 32]), 0)));
        tx.outputs
            .push(TxOut::new(50_000, Script::new_p2pkh(&[0x06; 20])));
        tx.outputs.push(TxOut::new(0, Script::new_op_return(b"data")));
        let serialized = tx.wire_serialize().unwrap();

        let mut store = UtxoStore::new();
        let parsed = store.extract(&serialized).unwrap();
        assert_eq!(parsed, tx);
        // the nulldata output is skipped
        assert_eq!(store.len(), 1);
        assert!(store.contains(&OutPoint::new(tx.txid().unwrap(), 0)));
    }
}
