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

//! Stack number codec
//!
//! Script integers live on the stack as little-endian sign-magnitude byte
//! strings: the most significant bit of the most significant byte carries
//! the sign, with an extra padding byte appended whenever the magnitude
//! already occupies that bit. Encoding is always minimal; decoding enforces
//! a byte-length limit (four bytes for arithmetic, five for the locktime
//! opcodes) but intermediate arithmetic is performed on arbitrary-precision
//! integers, so additions may exceed the four-byte range without failing.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

use super::interpreter::ExecError;

/// Byte-length limit applied when decoding arithmetic operands
pub const DEFAULT_MAX_NUM_LEN: usize = 4;
/// Byte-length limit applied by OP_CHECKLOCKTIMEVERIFY and
/// OP_CHECKSEQUENCEVERIFY
pub const LOCKTIME_MAX_NUM_LEN: usize = 5;

/// Encodes an integer into its minimal stack representation. Zero encodes as
/// the empty byte string; `-1` encodes as `0x81`.
pub fn encode_num(n: &BigInt) -> Vec<u8> {
    if n.is_zero() {
        return vec![];
    }
    let (sign, mut magnitude) = n.to_bytes_le();
    let negative = sign == Sign::Minus;
    let last = *magnitude.last().expect("non-zero magnitude is never empty");
    if last & 0x80 != 0 {
        magnitude.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let top = magnitude.len() - 1;
        magnitude[top] |= 0x80;
    }
    magnitude
}

/// Decodes a stack element into an integer. The empty byte string decodes to
/// zero; elements longer than `max_len` fail with
/// [`ExecError::NumberOverflow`].
pub fn decode_num(bytes: &[u8], max_len: usize) -> Result<BigInt, ExecError> {
    if bytes.len() > max_len {
        return Err(ExecError::NumberOverflow(max_len));
    }
    if bytes.is_empty() {
        return Ok(BigInt::zero());
    }
    let mut magnitude = bytes.to_vec();
    let top = magnitude.len() - 1;
    let negative = magnitude[top] & 0x80 != 0;
    magnitude[top] &= 0x7f;
    let sign = if negative { Sign::Minus } else { Sign::Plus };
    Ok(BigInt::from_bytes_le(sign, &magnitude))
}

/// Consensus truthiness of a stack element: the empty string and any
/// encoding of zero (including negative zero, a lone trailing `0x80`) are
/// false; everything else is true
pub fn decode_bool(bytes: &[u8]) -> bool {
    for (position, byte) in bytes.iter().enumerate() {
        if *byte != 0 {
            return !(position == bytes.len() - 1 && *byte == 0x80);
        }
    }
    false
}

/// Canonical boolean encoding: `0x01` for true, empty for false
pub fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        vec![]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(n: i64) {
        let big = BigInt::from(n);
        let encoded = encode_num(&big);
        assert_eq!(decode_num(&encoded, DEFAULT_MAX_NUM_LEN).unwrap(), big);
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_num(&BigInt::from(0)), Vec::<u8>::new());
        assert_eq!(encode_num(&BigInt::from(1)), vec![0x01]);
        assert_eq!(encode_num(&BigInt::from(-1)), vec![0x81]);
        assert_eq!(encode_num(&BigInt::from(127)), vec![0x7f]);
        assert_eq!(encode_num(&BigInt::from(-127)), vec![0xff]);
        assert_eq!(encode_num(&BigInt::from(128)), vec![0x80, 0x00]);
        assert_eq!(encode_num(&BigInt::from(-128)), vec![0x80, 0x80]);
        assert_eq!(encode_num(&BigInt::from(255)), vec![0xff, 0x00]);
        assert_eq!(encode_num(&BigInt::from(256)), vec![0x00, 0x01]);
        assert_eq!(encode_num(&BigInt::from(-255)), vec![0xff, 0x80]);
        assert_eq!(encode_num(&BigInt::from(0x12345678)), vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn roundtrip_range() {
        for n in -1000i64..=1000 {
            roundtrip(n);
        }
        roundtrip(i32::max_value() as i64);
        roundtrip(-(i32::max_value() as i64));
        roundtrip(0x7fff);
        roundtrip(-0x8000 + 1);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(decode_num(&[], DEFAULT_MAX_NUM_LEN).unwrap(), BigInt::zero());
    }

    #[test]
    fn length_limits() {
        assert!(decode_num(&[1, 2, 3, 4], DEFAULT_MAX_NUM_LEN).is_ok());
        assert_eq!(
            decode_num(&[1, 2, 3, 4, 5], DEFAULT_MAX_NUM_LEN),
            Err(ExecError::NumberOverflow(DEFAULT_MAX_NUM_LEN))
        );
        assert!(decode_num(&[1, 2, 3, 4, 5], LOCKTIME_MAX_NUM_LEN).is_ok());
    }

    #[test]
    fn truthiness() {
        assert!(!decode_bool(&[]));
        assert!(!decode_bool(&[0x00]));
        assert!(!decode_bool(&[0x00, 0x00]));
        assert!(!decode_bool(&[0x80]));
        assert!(!decode_bool(&[0x00, 0x80]));
        assert!(decode_bool(&[0x01]));
        assert!(decode_bool(&[0x80, 0x00]));
        assert!(decode_bool(&[0x00, 0x01]));
    }
}
