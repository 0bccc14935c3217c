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

//! PSBT field type table
//!
//! A static catalog describing every known field: its numeric code, the map
//! scope it lives in, whether the key carries data beyond the type code, the
//! shape of its value, and its status under each PSBT version (required,
//! available or absent). Unknown field codes still round-trip as opaque
//! records; this table governs validation and the name-keyed construction
//! API only.

use crate::serialize::{wire_deserialize, VarInt};
use crate::transaction::{Transaction, TxOut};

/// Scope a PSBT map belongs to
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display(lowercase)]
pub enum MapRole {
    /// The single global map
    Global,
    /// One map per transaction input
    Input,
    /// One map per transaction output
    Output,
}

/// Status of a field under a concrete PSBT version
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldStatus {
    /// The field must be present for the PSBT to check
    Required,
    /// The field may be present
    Available,
    /// The field must not appear under this version
    Absent,
}

/// Shape of a field value, used for validation and human-readable dumps
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueKind {
    /// Opaque byte string
    Bytes,
    /// A single byte
    Byte,
    /// Serialized transaction
    UnsignedTx,
    /// Serialized transaction output (value plus locking script)
    TxOut,
    /// 32-byte transaction id
    Txid,
    /// Four little-endian bytes
    U32,
    /// Eight little-endian bytes
    U64,
    /// Compactsize integer
    VarInt,
    /// Serialized script without a length prefix
    Script,
}

impl ValueKind {
    /// Whether a raw value has the shape this kind requires
    pub fn validate(self, value: &[u8]) -> bool {
        match self {
            ValueKind::Bytes | ValueKind::Script => true,
            ValueKind::Byte => value.len() == 1,
            ValueKind::UnsignedTx => wire_deserialize::<Transaction>(&value).is_ok(),
            ValueKind::TxOut => wire_deserialize::<TxOut>(&value).is_ok(),
            ValueKind::Txid => value.len() == 32,
            ValueKind::U32 => value.len() == 4,
            ValueKind::U64 => value.len() == 8,
            ValueKind::VarInt => wire_deserialize::<VarInt>(&value).is_ok(),
        }
    }

    /// Renders a raw value for [`crate::psbt::Psbt::dump`]
    pub fn render(self, value: &[u8]) -> String {
        match self {
            ValueKind::U32 if value.len() == 4 => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(value);
                u32::from_le_bytes(bytes).to_string()
            }
            ValueKind::U64 if value.len() == 8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(value);
                u64::from_le_bytes(bytes).to_string()
            }
            ValueKind::VarInt => match wire_deserialize::<VarInt>(&value) {
                Ok(n) => n.to_string(),
                Err(_) => hex::encode(value),
            },
            ValueKind::Txid => {
                let mut bytes = value.to_vec();
                bytes.reverse();
                hex::encode(bytes)
            }
            _ => hex::encode(value),
        }
    }
}

/// Static description of a single PSBT field type
#[derive(Debug)]
pub struct FieldType {
    /// Name of the field as used in BIP 174/370
    pub name: &'static str,
    /// Numeric type code
    pub code: u8,
    /// Map scope the field belongs to
    pub role: MapRole,
    /// Whether the key carries data beyond the type code
    pub has_key_data: bool,
    /// Shape of the value
    pub value_kind: ValueKind,
    /// Status under PSBT version 0
    pub v0: FieldStatus,
    /// Status under PSBT version 2
    pub v2: FieldStatus,
}

impl FieldType {
    /// Status of the field under the given PSBT version
    pub fn status(&self, version: u32) -> FieldStatus {
        if version >= 2 {
            self.v2
        } else {
            self.v0
        }
    }
}

use FieldStatus::{Absent, Available, Required};
use MapRole::{Global, Input, Output};

macro_rules! field_types {
    ($($name:ident, $code:expr, $role:expr, $key:expr, $kind:expr, $v0:expr, $v2:expr;)*) => {
        /// The full field catalog
        pub static FIELD_TYPES: &[FieldType] = &[
            $(FieldType {
                name: stringify!($name),
                code: $code,
                role: $role,
                has_key_data: $key,
                value_kind: $kind,
                v0: $v0,
                v2: $v2,
            },)*
        ];
    };
}

field_types! {
    PSBT_GLOBAL_UNSIGNED_TX, 0x00, Global, false, ValueKind::UnsignedTx, Required, Absent;
    PSBT_GLOBAL_XPUB, 0x01, Global, true, ValueKind::Bytes, Available, Available;
    PSBT_GLOBAL_TX_VERSION, 0x02, Global, false, ValueKind::U32, Absent, Required;
    PSBT_GLOBAL_FALLBACK_LOCKTIME, 0x03, Global, false, ValueKind::U32, Absent, Available;
    PSBT_GLOBAL_INPUT_COUNT, 0x04, Global, false, ValueKind::VarInt, Absent, Required;
    PSBT_GLOBAL_OUTPUT_COUNT, 0x05, Global, false, ValueKind::VarInt, Absent, Required;
    PSBT_GLOBAL_TX_MODIFIABLE, 0x06, Global, false, ValueKind::Byte, Absent, Available;
    PSBT_GLOBAL_VERSION, 0xfb, Global, false, ValueKind::U32, Available, Required;
    PSBT_GLOBAL_PROPRIETARY, 0xfc, Global, true, ValueKind::Bytes, Available, Available;

    PSBT_IN_NON_WITNESS_UTXO, 0x00, Input, false, ValueKind::UnsignedTx, Available, Available;
    PSBT_IN_WITNESS_UTXO, 0x01, Input, false, ValueKind::TxOut, Available, Available;
    PSBT_IN_PARTIAL_SIG, 0x02, Input, true, ValueKind::Bytes, Available, Available;
    PSBT_IN_SIGHASH_TYPE, 0x03, Input, false, ValueKind::U32, Available, Available;
    PSBT_IN_REDEEM_SCRIPT, 0x04, Input, false, ValueKind::Script, Available, Available;
    PSBT_IN_WITNESS_SCRIPT, 0x05, Input, false, ValueKind::Script, Available, Available;
    PSBT_IN_BIP32_DERIVATION, 0x06, Input, true, ValueKind::Bytes, Available, Available;
    PSBT_IN_FINAL_SCRIPTSIG, 0x07, Input, false, ValueKind::Script, Available, Available;
    PSBT_IN_FINAL_SCRIPTWITNESS, 0x08, Input, false, ValueKind::Bytes, Available, Available;
    PSBT_IN_PREVIOUS_TXID, 0x0e, Input, false, ValueKind::Txid, Absent, Required;
    PSBT_IN_OUTPUT_INDEX, 0x0f, Input, false, ValueKind::U32, Absent, Required;
    PSBT_IN_SEQUENCE, 0x10, Input, false, ValueKind::U32, Absent, Available;
    PSBT_IN_REQUIRED_TIME_LOCKTIME, 0x11, Input, false, ValueKind::U32, Absent, Available;
    PSBT_IN_REQUIRED_HEIGHT_LOCKTIME, 0x12, Input, false, ValueKind::U32, Absent, Available;
    PSBT_IN_PROPRIETARY, 0xfc, Input, true, ValueKind::Bytes, Available, Available;

    PSBT_OUT_REDEEM_SCRIPT, 0x00, Output, false, ValueKind::Script, Available, Available;
    PSBT_OUT_WITNESS_SCRIPT, 0x01, Output, false, ValueKind::Script, Available, Available;
    PSBT_OUT_BIP32_DERIVATION, 0x02, Output, true, ValueKind::Bytes, Available, Available;
    PSBT_OUT_AMOUNT, 0x03, Output, false, ValueKind::U64, Absent, Required;
    PSBT_OUT_SCRIPT, 0x04, Output, false, ValueKind::Script, Absent, Required;
    PSBT_OUT_PROPRIETARY, 0xfc, Output, true, ValueKind::Bytes, Available, Available;
}

/// Looks a field type up by scope and numeric code
pub fn field_type(role: MapRole, code: u8) -> Option<&'static FieldType> {
    FIELD_TYPES
        .iter()
        .find(|field_type| field_type.role == role && field_type.code == code)
}

/// Looks a field type up by its BIP name
pub fn field_type_by_name(name: &str) -> Option<&'static FieldType> {
    FIELD_TYPES.iter().find(|field_type| field_type.name == name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_lookup() {
        let witness_utxo = field_type(MapRole::Input, 0x01).unwrap();
        assert_eq!(witness_utxo.name, "PSBT_IN_WITNESS_UTXO");
        assert_eq!(witness_utxo.value_kind, ValueKind::TxOut);

        let by_name = field_type_by_name("PSBT_GLOBAL_UNSIGNED_TX").unwrap();
        assert_eq!(by_name.code, 0x00);
        assert_eq!(by_name.role, MapRole::Global);

        assert!(field_type(MapRole::Output, 0x42).is_none());
        assert!(field_type_by_name("PSBT_NO_SUCH_FIELD").is_none());
    }

    #[test]
    fn version_gating() {
        let unsigned_tx = field_type_by_name("PSBT_GLOBAL_UNSIGNED_TX").unwrap();
        assert_eq!(unsigned_tx.status(0), FieldStatus::Required);
        assert_eq!(unsigned_tx.status(2), FieldStatus::Absent);

        let input_count = field_type_by_name("PSBT_GLOBAL_INPUT_COUNT").unwrap();
        assert_eq!(input_count.status(0), FieldStatus::Absent);
        assert_eq!(input_count.status(2), FieldStatus::Required);
    }

    #[test]
    fn value_validation() {
        assert!(ValueKind::U32.validate(&[0, 1, 2, 3]));
        assert!(!ValueKind::U32.validate(&[0, 1, 2]));
        assert!(ValueKind::Txid.validate(&[0u8; 32]));
        assert!(!ValueKind::Txid.validate(&[0u8; 31]));
        assert!(ValueKind::VarInt.validate(&[0xfd, 0x01, 0x00]));
        assert!(!ValueKind::VarInt.validate(&[0xfd, 0x01]));
        assert_eq!(ValueKind::U32.render(&[0x2a, 0, 0, 0]), "42");
        assert_eq!(ValueKind::U64.render(&[0x01, 0, 0, 0, 0, 0, 0, 0]), "1");
    }
}
