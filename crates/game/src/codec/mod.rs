//! Endian-explicit binary encoding over `io::Write` sinks and `io::Read` sources.
//!
//! Every scalar is written at its natural width. Integers follow the stream's
//! current [`Endian`], `bool` is a single `0`/`1` byte, and floats are their
//! IEEE-754 bit pattern encoded like the matching unsigned integer.
//!
//! Composite wire types implement [`Encode`] and [`Decode`] by writing their
//! fields in a fixed, documented order.

mod span;

use std::io::{self, Read, Write};

use glam::Vec2;

pub use span::copy_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
    Native,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    OutputBufferTooSmall { needed: usize, available: usize },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    #[error("length {0} exceeds the addressable size")]
    LengthOverflow(u64),
    #[error("invalid utf-8 in string")]
    InvalidUtf8,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub trait Encode {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError>;
}

pub trait Decode: Sized {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError>;
}

pub struct Writer<W> {
    inner: W,
    endian: Endian,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Self::with_endian(inner, Endian::default())
    }

    pub fn with_endian(inner: W, endian: Endian) -> Self {
        Self { inner, endian }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Appends `value`, aborting if the sink refuses the bytes.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        if let Err(e) = value.encode(self) {
            panic!("codec sink rejected a write: {e}");
        }
        self
    }

    pub fn try_write<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> {
        value.encode(self)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        match self.inner.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WriteZero => Err(CodecError::OutputBufferTooSmall {
                needed: bytes.len(),
                available: 0,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

pub struct Reader<R> {
    inner: R,
    endian: Endian,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_endian(inner, Endian::default())
    }

    pub fn with_endian(inner: R, endian: Endian) -> Self {
        Self { inner, endian }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Consumes one `T`, aborting if the source runs dry.
    pub fn read<T: Decode>(&mut self) -> T {
        match T::decode(self) {
            Ok(value) => value,
            Err(e) => panic!("codec source could not supply a value: {e}"),
        }
    }

    pub fn try_read<T: Decode>(&mut self) -> Result<T, CodecError> {
        T::decode(self)
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        match self.inner.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CodecError::UnexpectedEof),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl Reader<&[u8]> {
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }
}

pub fn to_bytes<T: Encode + ?Sized>(value: &T, endian: Endian) -> Vec<u8> {
    let mut writer = Writer::with_endian(Vec::new(), endian);
    writer.write(value);
    writer.into_inner()
}

/// Decodes a `T` from the front of `bytes`, returning it with the unread tail.
pub fn from_bytes<T: Decode>(bytes: &[u8], endian: Endian) -> Result<(T, &[u8]), CodecError> {
    let mut reader = Reader::with_endian(bytes, endian);
    let value = reader.try_read()?;
    Ok((value, reader.into_inner()))
}

macro_rules! impl_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl Encode for $ty {
            fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
                let bytes = match writer.endian() {
                    Endian::Big => self.to_be_bytes(),
                    Endian::Little => self.to_le_bytes(),
                    Endian::Native => self.to_ne_bytes(),
                };
                writer.write_bytes(&bytes)
            }
        }

        impl Decode for $ty {
            fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                reader.read_bytes(&mut bytes)?;
                Ok(match reader.endian() {
                    Endian::Big => <$ty>::from_be_bytes(bytes),
                    Endian::Little => <$ty>::from_le_bytes(bytes),
                    Endian::Native => <$ty>::from_ne_bytes(bytes),
                })
            }
        }
    )*};
}

impl_integer!(u8, i8, u16, i16, u32, i32, u64, i64);

impl Encode for bool {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        (*self as u8).encode(writer)
    }
}

impl Decode for bool {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        match u8::decode(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }
}

impl Encode for f32 {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        self.to_bits().encode(writer)
    }
}

impl Decode for f32 {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        u32::decode(reader).map(f32::from_bits)
    }
}

impl Encode for f64 {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        self.to_bits().encode(writer)
    }
}

impl Decode for f64 {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        u64::decode(reader).map(f64::from_bits)
    }
}

/// `x` then `y`.
impl Encode for Vec2 {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        self.x.encode(writer)?;
        self.y.encode(writer)
    }
}

impl Decode for Vec2 {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        let x = f32::decode(reader)?;
        let y = f32::decode(reader)?;
        Ok(Vec2::new(x, y))
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        self.0.encode(writer)?;
        self.1.encode(writer)
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        let a = A::decode(reader)?;
        let b = B::decode(reader)?;
        Ok((a, b))
    }
}

/// Elements in order, no length prefix.
impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        self.iter().try_for_each(|item| item.encode(writer))
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        let items = (0..N)
            .map(|_| T::decode(reader))
            .collect::<Result<Vec<T>, _>>()?;
        match items.try_into() {
            Ok(array) => Ok(array),
            Err(_) => unreachable!("decoded exactly N items"),
        }
    }
}

/// `u64` element count, then the elements.
impl<T: Encode> Encode for [T] {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        (self.len() as u64).encode(writer)?;
        self.iter().try_for_each(|item| item.encode(writer))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        self.as_slice().encode(writer)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        let len = decode_len(reader)?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}

/// `u64` byte count, then UTF-8 bytes.
impl Encode for str {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        (self.len() as u64).encode(writer)?;
        writer.write_bytes(self.as_bytes())
    }
}

impl Encode for String {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        self.as_str().encode(writer)
    }
}

impl Decode for String {
    fn decode<R: Read>(reader: &mut Reader<R>) -> Result<Self, CodecError> {
        let len = decode_len(reader)?;
        let mut bytes = Vec::with_capacity(len.min(1024));
        let mut chunk = [0u8; 256];
        let mut left = len;
        while left > 0 {
            let take = left.min(chunk.len());
            reader.read_bytes(&mut chunk[..take])?;
            bytes.extend_from_slice(&chunk[..take]);
            left -= take;
        }
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }
}

fn decode_len<R: Read>(reader: &mut Reader<R>) -> Result<usize, CodecError> {
    let len = u64::decode(reader)?;
    usize::try_from(len).map_err(|_| CodecError::LengthOverflow(len))
}
