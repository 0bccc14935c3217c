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

//! Partially Signed Bitcoin Transactions (BIP 174 / BIP 370)
//!
//! A PSBT is an ordered set of maps: one global map, one map per
//! transaction input and one per output. Maps hold typed fields identified
//! by (type code, optional key data); the wire form is a sequence of
//! length-prefixed key/value records per map, each map terminated by a zero
//! byte, the whole container prefixed with the `psbt\xff` magic. Version 0
//! derives the map layout from the embedded unsigned transaction; version 2
//! carries explicit counts and per-input/output fields instead.

pub mod fields;

pub use fields::{field_type, field_type_by_name, FieldStatus, FieldType, MapRole, ValueKind};

use std::fmt::Write as _;
use std::io;

use crate::serialize::{self, read_bytes, VarInt, WireDecode, WireEncode};
use crate::transaction::Transaction;

/// Magic prefix of every serialized PSBT
pub const PSBT_MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

/// PSBT handling errors
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum PsbtError {
    /// PSBT stream does not start with the required magic bytes
    BadMagic,

    /// unknown PSBT field type `{0}`
    UnknownFieldType(String),

    /// duplicate field {0} in the {1} map
    DuplicateField(String, MapRole),

    /// required field {0} is missing in PSBT v{1}
    MissingField(String, u32),

    /// field {0} is not defined for PSBT v{1}
    ForbiddenField(String, u32),

    /// field {0} does not belong to the {1} map
    WrongScope(String, MapRole),

    /// field {0} key data does not match its type definition
    KeyData(String),

    /// malformed value for field {0}
    FieldValue(String),

    /// map index {0} is out of range
    MapIndex(usize),

    /// unsigned transaction of a v0 PSBT must have empty signature scripts
    /// and no witness data
    DirtyUnsignedTx,

    /// {0} input maps do not match the {1} inputs of the unsigned
    /// transaction
    InputCountMismatch(usize, usize),

    /// {0} output maps do not match the {1} outputs of the unsigned
    /// transaction
    OutputCountMismatch(usize, usize),

    /// unsupported PSBT version {0}
    Version(u32),

    /// {0}
    #[from]
    Serialize(serialize::Error),
}

/// Single field: type code, optional key data, raw value. Field identity
/// within a map is the (code, key data) pair.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Field {
    /// Numeric type code
    pub code: u8,
    /// Key data (empty when the type has none)
    pub key_data: Vec<u8>,
    /// Raw serialized value
    pub value: Vec<u8>,
}

impl Field {
    /// Resolves the static type descriptor for this field within a map of
    /// the given role; unknown codes resolve to `None` and stay opaque
    pub fn field_type(&self, role: MapRole) -> Option<&'static FieldType> {
        field_type(role, self.code)
    }

    fn display_name(&self, role: MapRole) -> String {
        match self.field_type(role) {
            Some(field_type) => field_type.name.to_owned(),
            None => format!("unknown(0x{:02x})", self.code),
        }
    }
}

/// Ordered field collection of a single map
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Map {
    /// Scope of the map
    pub role: MapRole,
    fields: Vec<Field>,
}

impl Map {
    /// Creates an empty map of the given scope
    pub fn new(role: MapRole) -> Map {
        Map {
            role,
            fields: vec![],
        }
    }

    /// Fields in insertion order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Inserts a field, rejecting duplicates of the same (code, key data)
    /// identity
    pub fn insert(&mut self, field: Field) -> Result<(), PsbtError> {
        if self
            .fields
            .iter()
            .any(|present| present.code == field.code && present.key_data == field.key_data)
        {
            return Err(PsbtError::DuplicateField(
                field.display_name(self.role),
                self.role,
            ));
        }
        self.fields.push(field);
        Ok(())
    }

    /// First field of the given code, disregarding key data
    pub fn get(&self, code: u8) -> Option<&Field> {
        self.fields.iter().find(|field| field.code == code)
    }

    /// All fields of the given code
    pub fn get_all(&self, code: u8) -> Vec<&Field> {
        self.fields.iter().filter(|field| field.code == code).collect()
    }

    fn remove(&mut self, code: u8) {
        self.fields.retain(|field| field.code != code);
    }

    fn wire_encode_map<E: io::Write>(&self, mut e: E) -> Result<usize, serialize::Error> {
        let mut len = 0usize;
        for field in &self.fields {
            let mut key = Vec::with_capacity(1 + field.key_data.len());
            key.push(field.code);
            key.extend_from_slice(&field.key_data);
            len += key.wire_encode(&mut e)?;
            len += field.value.wire_encode(&mut e)?;
        }
        len += 0u8.wire_encode(&mut e)?;
        Ok(len)
    }

    fn wire_decode_map<D: io::Read>(mut d: D, role: MapRole) -> Result<Map, PsbtError> {
        let mut map = Map::new(role);
        loop {
            let key_len = VarInt::wire_decode(&mut d)?.to_usize()?;
            if key_len == 0 {
                break;
            }
            let key = read_bytes(&mut d, key_len)?;
            let value = Vec::<u8>::wire_decode(&mut d)?;
            map.insert(Field {
                code: key[0],
                key_data: key[1..].to_vec(),
                value,
            })?;
        }
        Ok(map)
    }
}

/// Partially signed Bitcoin transaction: one global map plus per-input and
/// per-output maps
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Psbt {
    /// The global map
    pub global: Map,
    /// Input maps, in transaction input order
    pub inputs: Vec<Map>,
    /// Output maps, in transaction output order
    pub outputs: Vec<Map>,
}

const VERSION_CODE: u8 = 0xfb;
const UNSIGNED_TX_CODE: u8 = 0x00;
const INPUT_COUNT_CODE: u8 = 0x04;
const OUTPUT_COUNT_CODE: u8 = 0x05;
const TX_VERSION_CODE: u8 = 0x02;

impl Psbt {
    /// Creates an empty PSBT of the given version. Version 2 containers are
    /// seeded with the version, transaction-version and count fields their
    /// format requires.
    pub fn create(version: u32) -> Result<Psbt, PsbtError> {
        let mut psbt = Psbt {
            global: Map::new(MapRole::Global),
            inputs: vec![],
            outputs: vec![],
        };
        match version {
            0 => {}
            2 => {
                psbt.global.insert(Field {
                    code: VERSION_CODE,
                    key_data: vec![],
                    value: 2u32.to_le_bytes().to_vec(),
                })?;
                psbt.global.insert(Field {
                    code: TX_VERSION_CODE,
                    key_data: vec![],
                    value: 2u32.to_le_bytes().to_vec(),
                })?;
                psbt.global.insert(Field {
                    code: INPUT_COUNT_CODE,
                    key_data: vec![],
                    value: VarInt(0).wire_serialize()?,
                })?;
                psbt.global.insert(Field {
                    code: OUTPUT_COUNT_CODE,
                    key_data: vec![],
                    value: VarInt(0).wire_serialize()?,
                })?;
            }
            other => return Err(PsbtError::Version(other)),
        }
        Ok(psbt)
    }

    /// Creates a v0 PSBT around an unsigned transaction. The transaction
    /// must carry empty signature scripts and no witness data.
    pub fn from_unsigned_tx(tx: &Transaction) -> Result<Psbt, PsbtError> {
        if tx
            .inputs
            .iter()
            .any(|input| !input.script_sig.is_empty() || !input.witness.is_empty())
        {
            return Err(PsbtError::DirtyUnsignedTx);
        }
        let mut psbt = Psbt::create(0)?;
        psbt.global.insert(Field {
            code: UNSIGNED_TX_CODE,
            key_data: vec![],
            value: tx.wire_serialize()?,
        })?;
        psbt.inputs = tx.inputs.iter().map(|_| Map::new(MapRole::Input)).collect();
        psbt.outputs = tx.outputs.iter().map(|_| Map::new(MapRole::Output)).collect();
        Ok(psbt)
    }

    /// Declared PSBT version: the value of `PSBT_GLOBAL_VERSION`, or zero
    /// when the field is absent
    pub fn version(&self) -> u32 {
        self.global
            .get(VERSION_CODE)
            .and_then(|field| {
                if field.value.len() == 4 {
                    let mut bytes = [0u8; 4];
                    bytes.copy_from_slice(&field.value);
                    Some(u32::from_le_bytes(bytes))
                } else {
                    None
                }
            })
            .unwrap_or(0)
    }

    /// Number of input maps
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output maps
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Appends an empty input map, updating the v2 count field when present
    pub fn add_input_map(&mut self) -> Result<(), PsbtError> {
        self.inputs.push(Map::new(MapRole::Input));
        self.sync_counts()
    }

    /// Appends an empty output map, updating the v2 count field when
    /// present
    pub fn add_output_map(&mut self) -> Result<(), PsbtError> {
        self.outputs.push(Map::new(MapRole::Output));
        self.sync_counts()
    }

    fn sync_counts(&mut self) -> Result<(), PsbtError> {
        if self.version() < 2 {
            return Ok(());
        }
        let input_count = VarInt::from(self.inputs.len()).wire_serialize()?;
        let output_count = VarInt::from(self.outputs.len()).wire_serialize()?;
        self.global.remove(INPUT_COUNT_CODE);
        self.global.remove(OUTPUT_COUNT_CODE);
        self.global.insert(Field {
            code: INPUT_COUNT_CODE,
            key_data: vec![],
            value: input_count,
        })?;
        self.global.insert(Field {
            code: OUTPUT_COUNT_CODE,
            key_data: vec![],
            value: output_count,
        })?;
        Ok(())
    }

    fn map_for(&self, role: MapRole, index: Option<usize>) -> Result<&Map, PsbtError> {
        match (role, index) {
            (MapRole::Global, None) => Ok(&self.global),
            (MapRole::Input, Some(index)) => {
                self.inputs.get(index).ok_or(PsbtError::MapIndex(index))
            }
            (MapRole::Output, Some(index)) => {
                self.outputs.get(index).ok_or(PsbtError::MapIndex(index))
            }
            (MapRole::Global, Some(index)) => Err(PsbtError::MapIndex(index)),
            (_, None) => Err(PsbtError::MapIndex(usize::max_value())),
        }
    }

    fn map_for_mut(&mut self, role: MapRole, index: Option<usize>) -> Result<&mut Map, PsbtError> {
        match (role, index) {
            (MapRole::Global, None) => Ok(&mut self.global),
            (MapRole::Input, Some(index)) => {
                self.inputs.get_mut(index).ok_or(PsbtError::MapIndex(index))
            }
            (MapRole::Output, Some(index)) => self
                .outputs
                .get_mut(index)
                .ok_or(PsbtError::MapIndex(index)),
            (MapRole::Global, Some(index)) => Err(PsbtError::MapIndex(index)),
            (_, None) => Err(PsbtError::MapIndex(usize::max_value())),
        }
    }

    /// Adds a field by its BIP name. Global fields take no index; input and
    /// output fields address their map by index. The field must be defined
    /// for the declared version and its value must have the catalogued
    /// shape.
    pub fn add_field(
        &mut self,
        name: &str,
        key_data: Option<Vec<u8>>,
        value: Vec<u8>,
        index: Option<usize>,
    ) -> Result<(), PsbtError> {
        let field_type = field_type_by_name(name)
            .ok_or_else(|| PsbtError::UnknownFieldType(name.to_owned()))?;
        let version = self.version();
        if field_type.status(version) == FieldStatus::Absent {
            return Err(PsbtError::ForbiddenField(name.to_owned(), version));
        }
        if field_type.has_key_data != key_data.is_some() {
            return Err(PsbtError::KeyData(name.to_owned()));
        }
        if !field_type.value_kind.validate(&value) {
            return Err(PsbtError::FieldValue(name.to_owned()));
        }
        let map = self.map_for_mut(field_type.role, index)?;
        map.insert(Field {
            code: field_type.code,
            key_data: key_data.unwrap_or_default(),
            value,
        })
    }

    /// First field of the named type, if present
    pub fn get_field(&self, name: &str, index: Option<usize>) -> Result<Option<&Field>, PsbtError> {
        let field_type = field_type_by_name(name)
            .ok_or_else(|| PsbtError::UnknownFieldType(name.to_owned()))?;
        Ok(self.map_for(field_type.role, index)?.get(field_type.code))
    }

    /// All fields of the named type (key-carrying types may repeat with
    /// distinct key data)
    pub fn get_all_fields(
        &self,
        name: &str,
        index: Option<usize>,
    ) -> Result<Vec<&Field>, PsbtError> {
        let field_type = field_type_by_name(name)
            .ok_or_else(|| PsbtError::UnknownFieldType(name.to_owned()))?;
        Ok(self.map_for(field_type.role, index)?.get_all(field_type.code))
    }

    /// The embedded unsigned transaction of a v0 PSBT
    pub fn unsigned_tx(&self) -> Result<Option<Transaction>, PsbtError> {
        match self.global.get(UNSIGNED_TX_CODE) {
            Some(field) => Ok(Some(Transaction::wire_deserialize(&field.value)?)),
            None => Ok(None),
        }
    }

    /// Validates the container: every field required for the declared
    /// version present, no field forbidden under it, map counts consistent
    /// with the unsigned transaction (v0) or the count fields (v2)
    pub fn check(&self) -> Result<(), PsbtError> {
        let version = self.version();
        if version != 0 && version != 2 {
            return Err(PsbtError::Version(version));
        }

        let maps = std::iter::once(&self.global)
            .chain(self.inputs.iter())
            .chain(self.outputs.iter());
        for map in maps {
            for field in map.fields() {
                if let Some(field_type) = field.field_type(map.role) {
                    if field_type.status(version) == FieldStatus::Absent {
                        return Err(PsbtError::ForbiddenField(
                            field_type.name.to_owned(),
                            version,
                        ));
                    }
                    if !field_type.value_kind.validate(&field.value) {
                        return Err(PsbtError::FieldValue(field_type.name.to_owned()));
                    }
                    if field_type.has_key_data != !field.key_data.is_empty() {
                        return Err(PsbtError::KeyData(field_type.name.to_owned()));
                    }
                }
            }
        }

        for field_type in fields::FIELD_TYPES {
            if field_type.status(version) != FieldStatus::Required {
                continue;
            }
            match field_type.role {
                MapRole::Global => {
                    if self.global.get(field_type.code).is_none() {
                        return Err(PsbtError::MissingField(
                            field_type.name.to_owned(),
                            version,
                        ));
                    }
                }
                MapRole::Input => {
                    for map in &self.inputs {
                        if map.get(field_type.code).is_none() {
                            return Err(PsbtError::MissingField(
                                field_type.name.to_owned(),
                                version,
                            ));
                        }
                    }
                }
                MapRole::Output => {
                    for map in &self.outputs {
                        if map.get(field_type.code).is_none() {
                            return Err(PsbtError::MissingField(
                                field_type.name.to_owned(),
                                version,
                            ));
                        }
                    }
                }
            }
        }

        if version == 0 {
            let tx = self
                .unsigned_tx()?
                .ok_or_else(|| PsbtError::MissingField("PSBT_GLOBAL_UNSIGNED_TX".to_owned(), 0))?;
            if tx
                .inputs
                .iter()
                .any(|input| !input.script_sig.is_empty() || !input.witness.is_empty())
            {
                return Err(PsbtError::DirtyUnsignedTx);
            }
            if tx.inputs.len() != self.inputs.len() {
                return Err(PsbtError::InputCountMismatch(
                    self.inputs.len(),
                    tx.inputs.len(),
                ));
            }
            if tx.outputs.len() != self.outputs.len() {
                return Err(PsbtError::OutputCountMismatch(
                    self.outputs.len(),
                    tx.outputs.len(),
                ));
            }
        } else {
            let declared_inputs = self
                .global
                .get(INPUT_COUNT_CODE)
                .map(|field| VarInt::wire_deserialize(&field.value))
                .transpose()?
                .map(|count| count.0 as usize);
            if declared_inputs != Some(self.inputs.len()) {
                return Err(PsbtError::InputCountMismatch(
                    self.inputs.len(),
                    declared_inputs.unwrap_or(0),
                ));
            }
            let declared_outputs = self
                .global
                .get(OUTPUT_COUNT_CODE)
                .map(|field| VarInt::wire_deserialize(&field.value))
                .transpose()?
                .map(|count| count.0 as usize);
            if declared_outputs != Some(self.outputs.len()) {
                return Err(PsbtError::OutputCountMismatch(
                    self.outputs.len(),
                    declared_outputs.unwrap_or(0),
                ));
            }
        }
        Ok(())
    }

    /// Serializes the container: magic, global map, input maps, output maps
    pub fn to_serialized(&self) -> Result<Vec<u8>, PsbtError> {
        let mut buffer = PSBT_MAGIC.to_vec();
        self.global.wire_encode_map(&mut buffer)?;
        for map in &self.inputs {
            map.wire_encode_map(&mut buffer)?;
        }
        for map in &self.outputs {
            map.wire_encode_map(&mut buffer)?;
        }
        Ok(buffer)
    }

    /// Parses and validates a serialized PSBT
    pub fn from_serialized(data: &[u8]) -> Result<Psbt, PsbtError> {
        let mut cursor = io::Cursor::new(data);
        let magic = read_bytes(&mut cursor, PSBT_MAGIC.len()).map_err(|_| PsbtError::BadMagic)?;
        if magic != PSBT_MAGIC {
            return Err(PsbtError::BadMagic);
        }
        let global = Map::wire_decode_map(&mut cursor, MapRole::Global)?;

        let psbt_version = global
            .get(VERSION_CODE)
            .and_then(|field| {
                if field.value.len() == 4 {
                    let mut bytes = [0u8; 4];
                    bytes.copy_from_slice(&field.value);
                    Some(u32::from_le_bytes(bytes))
                } else {
                    None
                }
            })
            .unwrap_or(0);

        let (input_count, output_count) = if psbt_version == 0 {
            let field = global.get(UNSIGNED_TX_CODE).ok_or_else(|| {
                PsbtError::MissingField("PSBT_GLOBAL_UNSIGNED_TX".to_owned(), 0)
            })?;
            let tx = Transaction::wire_deserialize(&field.value)?;
            (tx.inputs.len(), tx.outputs.len())
        } else {
            let input_count = global
                .get(INPUT_COUNT_CODE)
                .ok_or_else(|| {
                    PsbtError::MissingField("PSBT_GLOBAL_INPUT_COUNT".to_owned(), psbt_version)
                })
                .and_then(|field| Ok(VarInt::wire_deserialize(&field.value)?))?;
            let output_count = global
                .get(OUTPUT_COUNT_CODE)
                .ok_or_else(|| {
                    PsbtError::MissingField("PSBT_GLOBAL_OUTPUT_COUNT".to_owned(), psbt_version)
                })
                .and_then(|field| Ok(VarInt::wire_deserialize(&field.value)?))?;
            (input_count.to_usize()?, output_count.to_usize()?)
        };

        let mut inputs = Vec::with_capacity(input_count.min(1024));
        for _ in 0..input_count {
            inputs.push(Map::wire_decode_map(&mut cursor, MapRole::Input)?);
        }
        let mut outputs = Vec::with_capacity(output_count.min(1024));
        for _ in 0..output_count {
            outputs.push(Map::wire_decode_map(&mut cursor, MapRole::Output)?);
        }
        if cursor.position() as usize != data.len() {
            return Err(serialize::Error::DataNotEntirelyConsumed.into());
        }
        let psbt = Psbt {
            global,
            inputs,
            outputs,
        };
        psbt.check()?;
        Ok(psbt)
    }

    /// Human-readable listing of all maps and fields
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "PSBT version {}", self.version());
        let _ = writeln!(out, "global:");
        Self::dump_map(&mut out, &self.global);
        for (index, map) in self.inputs.iter().enumerate() {
            let _ = writeln!(out, "input {}:", index);
            Self::dump_map(&mut out, map);
        }
        for (index, map) in self.outputs.iter().enumerate() {
            let _ = writeln!(out, "output {}:", index);
            Self::dump_map(&mut out, map);
        }
        out
    }

    fn dump_map(out: &mut String, map: &Map) {
        for field in map.fields() {
            let rendered = match field.field_type(map.role) {
                Some(field_type) => field_type.value_kind.render(&field.value),
                None => hex::encode(&field.value),
            };
            if field.key_data.is_empty() {
                let _ = writeln!(out, "  {}: {}", field.display_name(map.role), rendered);
            } else {
                let _ = writeln!(
                    out,
                    "  {}[{}]: {}",
                    field.display_name(map.role),
                    hex::encode(&field.key_data),
                    rendered
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::script::Script;
    use crate::transaction::{OutPoint, TxIn, TxOut, Txid};
    use crate::serialize::WireEncode;

    fn unsigned_tx() -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs
            .push(TxIn::new(OutPoint::new(Txid::from_bytes([0x51; 32]), 1)));
        tx.outputs
            .push(TxOut::new(99_000_000, Script::new_p2pkh(&[0x31; 20])));
        tx.outputs
            .push(TxOut::new(100_000_000, Script::new_p2sh(&[0x32; 20])));
        tx
    }

    #[test]
    fn v0_roundtrip_byte_exact() {
        let tx = unsigned_tx();
        let mut psbt = Psbt::from_unsigned_tx(&tx).unwrap();
        let witness_utxo = TxOut::new(200_000_000, Script::new_p2wpkh(&[0x33; 20]));
        psbt.add_field(
            "PSBT_IN_WITNESS_UTXO",
            None,
            witness_utxo.wire_serialize().unwrap(),
            Some(0),
        )
        .unwrap();
        psbt.check().unwrap();

        assert_eq!(psbt.input_count(), 1);
        assert_eq!(psbt.output_count(), 2);

        let serialized = psbt.to_serialized().unwrap();
        assert_eq!(&serialized[..5], &PSBT_MAGIC);
        let parsed = Psbt::from_serialized(&serialized).unwrap();
        assert_eq!(parsed, psbt);
        assert_eq!(parsed.to_serialized().unwrap(), serialized);
        assert_eq!(parsed.unsigned_tx().unwrap().unwrap(), tx);
    }

    #[test]
    fn v2_roundtrip() {
        let mut psbt = Psbt::create(2).unwrap();
        psbt.add_input_map().unwrap();
        psbt.add_output_map().unwrap();
        psbt.add_field(
            "PSBT_IN_PREVIOUS_TXID",
            None,
            vec![0x61; 32],
            Some(0),
        )
        .unwrap();
        psbt.add_field("PSBT_IN_OUTPUT_INDEX", None, 3u32.to_le_bytes().to_vec(), Some(0))
            .unwrap();
        psbt.add_field(
            "PSBT_OUT_AMOUNT",
            None,
            50_000u64.to_le_bytes().to_vec(),
            Some(0),
        )
        .unwrap();
        psbt.add_field(
            "PSBT_OUT_SCRIPT",
            None,
            Script::new_p2pkh(&[0x62; 20]).into_bytes(),
            Some(0),
        )
        .unwrap();
        psbt.check().unwrap();

        let serialized = psbt.to_serialized().unwrap();
        let parsed = Psbt::from_serialized(&serialized).unwrap();
        assert_eq!(parsed, psbt);
        assert_eq!(parsed.version(), 2);
    }

    // builds one key/value record of a serialized map
    fn record(code: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![0x01, code];
        out.push(value.len() as u8);
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn v2_missing_input_count_fails() {
        let mut stream = PSBT_MAGIC.to_vec();
        stream.extend(record(0xfb, &2u32.to_le_bytes())); // PSBT_GLOBAL_VERSION
        stream.extend(record(0x02, &2u32.to_le_bytes())); // PSBT_GLOBAL_TX_VERSION
        stream.push(0x00); // end of global map
        match Psbt::from_serialized(&stream) {
            Err(PsbtError::MissingField(name, 2)) => {
                assert_eq!(name, "PSBT_GLOBAL_INPUT_COUNT")
            }
            other => panic!("expected missing-field failure, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_field_fails() {
        let tx = unsigned_tx();
        let tx_bytes = tx.wire_serialize().unwrap();
        let mut stream = PSBT_MAGIC.to_vec();
        // two UNSIGNED_TX records in the global map
        let mut rec = vec![0x01, 0x00];
        rec.push(tx_bytes.len() as u8);
        rec.extend_from_slice(&tx_bytes);
        stream.extend_from_slice(&rec);
        stream.extend_from_slice(&rec);
        stream.push(0x00);
        stream.push(0x00); // input map
        stream.push(0x00); // output map 0
        stream.push(0x00); // output map 1
        match Psbt::from_serialized(&stream) {
            Err(PsbtError::DuplicateField(name, MapRole::Global)) => {
                assert_eq!(name, "PSBT_GLOBAL_UNSIGNED_TX")
            }
            other => panic!("expected duplicate-field failure, got {:?}", other),
        }
    }

    #[test]
    fn dirty_unsigned_tx_rejected() {
        let mut tx = unsigned_tx();
        tx.inputs[0].script_sig = Script::from(vec![0x51]);
        assert_eq!(Psbt::from_unsigned_tx(&tx), Err(PsbtError::DirtyUnsignedTx));
    }

    #[test]
    fn forbidden_field_by_version() {
        let mut psbt = Psbt::create(2).unwrap();
        let tx = unsigned_tx();
        assert_eq!(
            psbt.add_field(
                "PSBT_GLOBAL_UNSIGNED_TX",
                None,
                tx.wire_serialize().unwrap(),
                None
            ),
            Err(PsbtError::ForbiddenField("PSBT_GLOBAL_UNSIGNED_TX".to_owned(), 2))
        );
    }

    #[test]
    fn bad_magic_rejected() {
        assert_eq!(
            Psbt::from_serialized(b"pbst\xff\x00\x00\x00"),
            Err(PsbtError::BadMagic)
        );
    }

    #[test]
    fn truncated_stream_rejected() {
        let psbt = Psbt::from_unsigned_tx(&unsigned_tx()).unwrap();
        let serialized = psbt.to_serialized().unwrap();
        assert!(Psbt::from_serialized(&serialized[..serialized.len() - 1]).is_err());

        let mut trailing = serialized;
        trailing.push(0x00);
        assert!(Psbt::from_serialized(&trailing).is_err());
    }

    #[test]
    fn key_fields_may_repeat_with_distinct_keys() {
        let tx = unsigned_tx();
        let mut psbt = Psbt::from_unsigned_tx(&tx).unwrap();
        psbt.add_field(
            "PSBT_IN_PARTIAL_SIG",
            Some(vec![0x02; 33]),
            vec![0x30, 0x45],
            Some(0),
        )
        .unwrap();
        psbt.add_field(
            "PSBT_IN_PARTIAL_SIG",
            Some(vec![0x03; 33]),
            vec![0x30, 0x44],
            Some(0),
        )
        .unwrap();
        let sigs = psbt.get_all_fields("PSBT_IN_PARTIAL_SIG", Some(0)).unwrap();
        assert_eq!(sigs.len(), 2);

        // same key data again is a duplicate
        assert!(matches!(
            psbt.add_field(
                "PSBT_IN_PARTIAL_SIG",
                Some(vec![0x02; 33]),
                vec![0x30, 0x46],
                Some(0)
            ),
            Err(PsbtError::DuplicateField(_, MapRole::Input))
        ));
    }

    #[test]
    fn dump_is_readable() {
        let psbt = Psbt::from_unsigned_tx(&unsigned_tx()).unwrap();
        let dump = psbt.dump();
        assert!(dump.contains("PSBT version 0"));
        assert!(dump.contains("PSBT_GLOBAL_UNSIGNED_TX"));
        assert!(dump.contains("input 0:"));
        assert!(dump.contains("output 1:"));
    }
}
