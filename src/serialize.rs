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

//! Bitcoin wire encoding
//!
//! Everything that crosses the wire in Bitcoin is an exact byte sequence:
//! little-endian integers, compactsize ("varint") length prefixes and
//! length-prefixed byte strings. The [`WireEncode`]/[`WireDecode`] trait pair
//! defines that encoding for every model type in this library, so that
//! `parse ∘ serialize = id` holds for scripts, transactions, PSBTs and
//! extended keys alike.

use amplify::IoError;
use std::io;

/// Binary encoding according to the Bitcoin wire rules. Must be used for all
/// consensus-critical data structures; the produced byte string is what gets
/// hashed for txids and signature digests, so implementations may not emit
/// any representation other than the canonical one.
pub trait WireEncode {
    /// Encode with the given [`std::io::Write`] instance; returns the number
    /// of bytes written.
    fn wire_encode<E: io::Write>(&self, e: E) -> Result<usize, Error>;

    /// Serializes data as a byte vector using [`WireEncode::wire_encode`]
    fn wire_serialize(&self) -> Result<Vec<u8>, Error> {
        let mut e = vec![];
        let _ = self.wire_encode(&mut e)?;
        Ok(e)
    }
}

/// Binary decoding according to the Bitcoin wire rules.
pub trait WireDecode: Sized {
    /// Decode with the given [`std::io::Read`] instance.
    fn wire_decode<D: io::Read>(d: D) -> Result<Self, Error>;

    /// Deserializes a byte slice into the current type using
    /// [`WireDecode::wire_decode`]. Fails with
    /// [`Error::DataNotEntirelyConsumed`] when trailing bytes remain after
    /// the value has been read.
    fn wire_deserialize(data: impl AsRef<[u8]>) -> Result<Self, Error> {
        wire_deserialize(&data)
    }
}

/// Convenience method serializing a [`WireEncode`] type into a byte vector
pub fn wire_serialize<T>(data: &T) -> Result<Vec<u8>, Error>
where
    T: WireEncode,
{
    let mut encoder = io::Cursor::new(vec![]);
    data.wire_encode(&mut encoder)?;
    Ok(encoder.into_inner())
}

/// Convenience method deserializing a [`WireDecode`] type from a byte slice.
///
/// Fails if the provided data are not consumed entirely: trailing garbage
/// after a well-formed value means a corrupted stream, not a longer value.
pub fn wire_deserialize<T>(data: &impl AsRef<[u8]>) -> Result<T, Error>
where
    T: WireDecode,
{
    let mut decoder = io::Cursor::new(data.as_ref());
    let rv = T::wire_decode(&mut decoder)?;
    let consumed = decoder.position() as usize;

    if consumed == data.as_ref().len() {
        Ok(rv)
    } else {
        Err(Error::DataNotEntirelyConsumed)
    }
}

/// Possible errors during wire encoding and decoding process
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, From, Error)]
#[display(doc_comments)]
pub enum Error {
    /// I/O error during wire encoding: {0}
    #[from(io::Error)]
    #[from(io::ErrorKind)]
    Io(IoError),

    /// The stream ended in the middle of an encoded value
    UnexpectedEof,

    /// Compactsize integer {0} exceeds the address space of this host
    OversizedVarInt(u64),

    /// Data were not consumed entirely during wire decoding
    DataNotEntirelyConsumed,

    /// Data integrity problem during wire decoding: {0}
    DataIntegrityError(String),
}

/// Reads an exact number of bytes from the stream, mapping a short read into
/// [`Error::UnexpectedEof`]
pub fn read_bytes<D: io::Read>(mut d: D, len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; len];
    d.read_exact(&mut buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
        _ => Error::Io(err.into()),
    })?;
    Ok(buf)
}

fn read_array<D: io::Read, const LEN: usize>(mut d: D) -> Result<[u8; LEN], Error> {
    let mut buf = [0u8; LEN];
    d.read_exact(&mut buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
        _ => Error::Io(err.into()),
    })?;
    Ok(buf)
}

impl WireEncode for u8 {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, Error> {
        e.write_all(&[*self])?;
        Ok(1)
    }
}

impl WireDecode for u8 {
    fn wire_decode<D: io::Read>(d: D) -> Result<Self, Error> {
        Ok(read_array::<_, 1>(d)?[0])
    }
}

impl WireEncode for u16 {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, Error> {
        e.write_all(&self.to_le_bytes())?;
        Ok(2)
    }
}

impl WireDecode for u16 {
    fn wire_decode<D: io::Read>(d: D) -> Result<Self, Error> {
        Ok(u16::from_le_bytes(read_array::<_, 2>(d)?))
    }
}

impl WireEncode for u32 {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, Error> {
        e.write_all(&self.to_le_bytes())?;
        Ok(4)
    }
}

impl WireDecode for u32 {
    fn wire_decode<D: io::Read>(d: D) -> Result<Self, Error> {
        Ok(u32::from_le_bytes(read_array::<_, 4>(d)?))
    }
}

impl WireEncode for u64 {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, Error> {
        e.write_all(&self.to_le_bytes())?;
        Ok(8)
    }
}

impl WireDecode for u64 {
    fn wire_decode<D: io::Read>(d: D) -> Result<Self, Error> {
        Ok(u64::from_le_bytes(read_array::<_, 8>(d)?))
    }
}

/// Compactsize integer: Bitcoin-specific variable-length encoding used for
/// all counts and length prefixes on the wire. One byte below 0xfd; otherwise
/// a 0xfd/0xfe/0xff marker followed by a little-endian u16/u32/u64.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Display, From)]
#[display(inner)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Number of bytes the compactsize encoding of the value occupies
    pub fn encoded_len(self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x10000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    /// Converts into a `usize`, failing on 32-bit hosts if the value does
    /// not fit
    pub fn to_usize(self) -> Result<usize, Error> {
        if self.0 > usize::max_value() as u64 {
            return Err(Error::OversizedVarInt(self.0));
        }
        Ok(self.0 as usize)
    }
}

impl From<usize> for VarInt {
    fn from(n: usize) -> Self {
        VarInt(n as u64)
    }
}

impl WireEncode for VarInt {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, Error> {
        match self.0 {
            n @ 0..=0xfc => {
                e.write_all(&[n as u8])?;
                Ok(1)
            }
            n @ 0xfd..=0xffff => {
                e.write_all(&[0xfd])?;
                e.write_all(&(n as u16).to_le_bytes())?;
                Ok(3)
            }
            n @ 0x10000..=0xffff_ffff => {
                e.write_all(&[0xfe])?;
                e.write_all(&(n as u32).to_le_bytes())?;
                Ok(5)
            }
            n => {
                e.write_all(&[0xff])?;
                e.write_all(&n.to_le_bytes())?;
                Ok(9)
            }
        }
    }
}

impl WireDecode for VarInt {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, Error> {
        let marker = u8::wire_decode(&mut d)?;
        Ok(VarInt(match marker {
            0xfd => u16::wire_decode(&mut d)? as u64,
            0xfe => u32::wire_decode(&mut d)? as u64,
            0xff => u64::wire_decode(&mut d)?,
            small => small as u64,
        }))
    }
}

impl WireEncode for Vec<u8> {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, Error> {
        let mut len = VarInt::from(self.len()).wire_encode(&mut e)?;
        e.write_all(self)?;
        len += self.len();
        Ok(len)
    }
}

impl WireDecode for Vec<u8> {
    fn wire_decode<D: io::Read>(mut d: D) -> Result<Self, Error> {
        let len = VarInt::wire_decode(&mut d)?.to_usize()?;
        read_bytes(d, len)
    }
}

impl WireEncode for [u8; 32] {
    fn wire_encode<E: io::Write>(&self, mut e: E) -> Result<usize, Error> {
        e.write_all(&self[..])?;
        Ok(32)
    }
}

impl WireDecode for [u8; 32] {
    fn wire_decode<D: io::Read>(d: D) -> Result<Self, Error> {
        read_array::<_, 32>(d)
    }
}
