//! The closed set of typed value kinds (§4.8) and the `Value` tagged union
//! that carries a value's raw little-endian bytes plus its kind.

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::guid::Guid;
use crate::ntsid::Sid;
use crate::scalar;
use encoding::Encoding;

/// High bit of the on-wire type byte: "this slot holds an array of the
/// low-7-bit kind" rather than a scalar.
pub const ARRAY_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    String,
    AnsiString,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Boolean,
    Binary,
    Guid,
    Size,
    FileTime,
    SystemTime,
    Sid,
    HexInt32,
    HexInt64,
    BinXml,
}

impl ValueKind {
    /// Decodes the low 7 bits of a type byte; the `0x80` array flag is
    /// handled separately by the caller (see `TypeCode`).
    pub fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0x00 => ValueKind::Null,
            0x01 => ValueKind::String,
            0x02 => ValueKind::AnsiString,
            0x03 => ValueKind::Int8,
            0x04 => ValueKind::UInt8,
            0x05 => ValueKind::Int16,
            0x06 => ValueKind::UInt16,
            0x07 => ValueKind::Int32,
            0x08 => ValueKind::UInt32,
            0x09 => ValueKind::Int64,
            0x0A => ValueKind::UInt64,
            0x0B => ValueKind::Float32,
            0x0C => ValueKind::Float64,
            0x0D => ValueKind::Boolean,
            0x0E => ValueKind::Binary,
            0x0F => ValueKind::Guid,
            0x10 => ValueKind::Size,
            0x11 => ValueKind::FileTime,
            0x12 => ValueKind::SystemTime,
            0x13 => ValueKind::Sid,
            0x14 => ValueKind::HexInt32,
            0x15 => ValueKind::HexInt64,
            0x21 => ValueKind::BinXml,
            other => return Err(Error::unsupported(format!("unrecognized value type 0x{other:02x}"))),
        })
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ValueKind::Null => 0x00,
            ValueKind::String => 0x01,
            ValueKind::AnsiString => 0x02,
            ValueKind::Int8 => 0x03,
            ValueKind::UInt8 => 0x04,
            ValueKind::Int16 => 0x05,
            ValueKind::UInt16 => 0x06,
            ValueKind::Int32 => 0x07,
            ValueKind::UInt32 => 0x08,
            ValueKind::Int64 => 0x09,
            ValueKind::UInt64 => 0x0A,
            ValueKind::Float32 => 0x0B,
            ValueKind::Float64 => 0x0C,
            ValueKind::Boolean => 0x0D,
            ValueKind::Binary => 0x0E,
            ValueKind::Guid => 0x0F,
            ValueKind::Size => 0x10,
            ValueKind::FileTime => 0x11,
            ValueKind::SystemTime => 0x12,
            ValueKind::Sid => 0x13,
            ValueKind::HexInt32 => 0x14,
            ValueKind::HexInt64 => 0x15,
            ValueKind::BinXml => 0x21,
        }
    }
}

/// A type code as it appears on the wire: a kind plus the array flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCode {
    pub kind: ValueKind,
    pub is_array: bool,
}

impl TypeCode {
    pub fn from_byte(b: u8) -> Result<Self> {
        Ok(TypeCode {
            kind: ValueKind::from_byte(b & !ARRAY_FLAG)?,
            is_array: b & ARRAY_FLAG != 0,
        })
    }
}

/// An eagerly-decoded scalar value. Array-typed substitutions are
/// represented as `Value::Array` of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    String(String),
    /// Raw ANSI bytes (§10.3): decoded to text lazily, at render time,
    /// against the caller's configured codec rather than eagerly here, since
    /// the codec is a `RenderSettings` knob, not a decode-time fact.
    AnsiString(&'a [u8]),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Boolean(bool),
    Binary(&'a [u8]),
    Guid(Guid),
    Size(u64),
    FileTime(u64),
    SystemTime([u8; 16]),
    Sid(Sid),
    HexInt32(u32),
    HexInt64(u64),
    /// A nested Binary-XML fragment, decoded lazily by the renderer (the
    /// token tree is built from these raw bytes only if the substitution is
    /// actually reached during rendering).
    BinXml(&'a [u8]),
    Array(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::Null => ValueKind::Null,
            Value::String(_) => ValueKind::String,
            Value::AnsiString(_) => ValueKind::AnsiString,
            Value::Int8(_) => ValueKind::Int8,
            Value::UInt8(_) => ValueKind::UInt8,
            Value::Int16(_) => ValueKind::Int16,
            Value::UInt16(_) => ValueKind::UInt16,
            Value::Int32(_) => ValueKind::Int32,
            Value::UInt32(_) => ValueKind::UInt32,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Binary(_) => ValueKind::Binary,
            Value::Guid(_) => ValueKind::Guid,
            Value::Size(_) => ValueKind::Size,
            Value::FileTime(_) => ValueKind::FileTime,
            Value::SystemTime(_) => ValueKind::SystemTime,
            Value::Sid(_) => ValueKind::Sid,
            Value::HexInt32(_) => ValueKind::HexInt32,
            Value::HexInt64(_) => ValueKind::HexInt64,
            Value::BinXml(_) => ValueKind::BinXml,
            Value::Array(_) => return None,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decodes a scalar value of `kind` from `bytes` (the raw little-endian
    /// payload for this substitution slot, as carried by the Binary-XML
    /// value/substitution token).
    pub fn decode_scalar(kind: ValueKind, bytes: &'a [u8]) -> Result<Self> {
        let cur = ByteCursor::new(bytes);
        Ok(match kind {
            ValueKind::Null => Value::Null,
            ValueKind::String => {
                Value::String(crate::cursor::decode_utf16le_until_nul(bytes)?)
            }
            ValueKind::AnsiString => Value::AnsiString(bytes),
            ValueKind::Int8 => Value::Int8(cur.read_i8("Int8 value", 0)?),
            ValueKind::UInt8 => Value::UInt8(cur.read_u8("UInt8 value", 0)?),
            ValueKind::Int16 => Value::Int16(cur.read_i16("Int16 value", 0)?),
            ValueKind::UInt16 => Value::UInt16(cur.read_u16("UInt16 value", 0)?),
            ValueKind::Int32 => Value::Int32(cur.read_i32("Int32 value", 0)?),
            ValueKind::UInt32 => Value::UInt32(cur.read_u32("UInt32 value", 0)?),
            ValueKind::Int64 => Value::Int64(cur.read_i64("Int64 value", 0)?),
            ValueKind::UInt64 => Value::UInt64(cur.read_u64("UInt64 value", 0)?),
            ValueKind::Float32 => Value::Float32(cur.read_f32("Float32 value", 0)?),
            ValueKind::Float64 => Value::Float64(cur.read_f64("Float64 value", 0)?),
            ValueKind::Boolean => Value::Boolean(cur.read_u32("Boolean value", 0)? != 0),
            ValueKind::Binary => Value::Binary(bytes),
            ValueKind::Guid => Value::Guid(cur.read_guid("Guid value", 0)?),
            ValueKind::Size => {
                Value::Size(if bytes.len() == 8 {
                    cur.read_u64("Size value", 0)?
                } else {
                    cur.read_u32("Size value", 0)? as u64
                })
            }
            ValueKind::FileTime => Value::FileTime(cur.read_u64("FileTime value", 0)?),
            ValueKind::SystemTime => {
                let slice = cur.slice("SystemTime value", 0, 16)?;
                let mut arr = [0u8; 16];
                arr.copy_from_slice(slice);
                Value::SystemTime(arr)
            }
            ValueKind::Sid => Value::Sid(decode_sid(bytes)?),
            ValueKind::HexInt32 => Value::HexInt32(cur.read_u32("HexInt32 value", 0)?),
            ValueKind::HexInt64 => Value::HexInt64(cur.read_u64("HexInt64 value", 0)?),
            ValueKind::BinXml => Value::BinXml(bytes),
        })
    }

    /// Renders this value's canonical text form (without XML escaping; the
    /// renderer applies escaping once, uniformly, at the point of emission).
    ///
    /// `ansi_codec` decodes `AnsiString` bytes (§10.3); it is unused by
    /// every other variant, which is why it isn't carried on `Value` itself.
    pub fn to_display_string(&self, ansi_codec: encoding::EncodingRef) -> Result<String> {
        Ok(match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::AnsiString(bytes) => decode_ansi_string(bytes, ansi_codec)?,
            Value::Int8(v) => v.to_string(),
            Value::UInt8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::UInt16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::UInt32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            Value::Float32(v) => scalar::format_float32(v.to_bits()),
            Value::Float64(v) => scalar::format_float64(v.to_bits()),
            Value::Boolean(v) => {
                if *v {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
            Value::Binary(bytes) => hex_dump(bytes),
            Value::Guid(g) => g.to_string(),
            Value::Size(v) => scalar::format_size(*v),
            Value::FileTime(ticks) => scalar::filetime_to_iso8601(*ticks)?,
            Value::SystemTime(bytes) => scalar::systemtime_to_string(bytes),
            Value::Sid(sid) => sid.to_string(),
            Value::HexInt32(v) => scalar::format_hex(*v as u64, 32),
            Value::HexInt64(v) => scalar::format_hex(*v, 64),
            Value::BinXml(_) => {
                return Err(Error::unsupported(
                    "BinXml-typed values are expanded by the renderer, not displayed as text",
                ))
            }
            Value::Array(_) => {
                return Err(Error::unsupported(
                    "array values are expanded by the renderer, not displayed as a single string",
                ))
            }
        })
    }
}

/// An eagerly-decoded value with no borrow on the originating buffer.
///
/// `Value<'a>` is the render-time currency: it borrows its `Binary`/`BinXml`
/// payloads from whatever buffer the caller supplied. Decoded `Token` trees
/// (owned, like the rest of the descriptor graph — see `descriptors::types`)
/// cannot hold a borrow that long, so a `TemplateInstance` token's own
/// embedded substitution array is stored as `OwnedValue` instead and
/// converted to a borrowing `Value` only at render time.
#[derive(Debug, Clone)]
pub enum OwnedValue {
    Null,
    String(String),
    AnsiString(Vec<u8>),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Boolean(bool),
    Binary(Vec<u8>),
    Guid(Guid),
    Size(u64),
    FileTime(u64),
    SystemTime([u8; 16]),
    Sid(Sid),
    HexInt32(u32),
    HexInt64(u64),
    BinXml(Vec<u8>),
    Array(Vec<OwnedValue>),
}

impl OwnedValue {
    pub fn from_borrowed(value: &Value<'_>) -> Self {
        match value {
            Value::Null => OwnedValue::Null,
            Value::String(s) => OwnedValue::String(s.clone()),
            Value::AnsiString(b) => OwnedValue::AnsiString(b.to_vec()),
            Value::Int8(v) => OwnedValue::Int8(*v),
            Value::UInt8(v) => OwnedValue::UInt8(*v),
            Value::Int16(v) => OwnedValue::Int16(*v),
            Value::UInt16(v) => OwnedValue::UInt16(*v),
            Value::Int32(v) => OwnedValue::Int32(*v),
            Value::UInt32(v) => OwnedValue::UInt32(*v),
            Value::Int64(v) => OwnedValue::Int64(*v),
            Value::UInt64(v) => OwnedValue::UInt64(*v),
            Value::Float32(v) => OwnedValue::Float32(*v),
            Value::Float64(v) => OwnedValue::Float64(*v),
            Value::Boolean(v) => OwnedValue::Boolean(*v),
            Value::Binary(b) => OwnedValue::Binary(b.to_vec()),
            Value::Guid(g) => OwnedValue::Guid(*g),
            Value::Size(v) => OwnedValue::Size(*v),
            Value::FileTime(v) => OwnedValue::FileTime(*v),
            Value::SystemTime(v) => OwnedValue::SystemTime(*v),
            Value::Sid(s) => OwnedValue::Sid(s.clone()),
            Value::HexInt32(v) => OwnedValue::HexInt32(*v),
            Value::HexInt64(v) => OwnedValue::HexInt64(*v),
            Value::BinXml(b) => OwnedValue::BinXml(b.to_vec()),
            Value::Array(items) => {
                OwnedValue::Array(items.iter().map(OwnedValue::from_borrowed).collect())
            }
        }
    }

    /// Borrows this value back out as a `Value`, for reuse by the shared
    /// rendering path (which only knows how to walk `Value`s).
    pub fn as_borrowed(&self) -> Value<'_> {
        match self {
            OwnedValue::Null => Value::Null,
            OwnedValue::String(s) => Value::String(s.clone()),
            OwnedValue::AnsiString(b) => Value::AnsiString(b.as_slice()),
            OwnedValue::Int8(v) => Value::Int8(*v),
            OwnedValue::UInt8(v) => Value::UInt8(*v),
            OwnedValue::Int16(v) => Value::Int16(*v),
            OwnedValue::UInt16(v) => Value::UInt16(*v),
            OwnedValue::Int32(v) => Value::Int32(*v),
            OwnedValue::UInt32(v) => Value::UInt32(*v),
            OwnedValue::Int64(v) => Value::Int64(*v),
            OwnedValue::UInt64(v) => Value::UInt64(*v),
            OwnedValue::Float32(v) => Value::Float32(*v),
            OwnedValue::Float64(v) => Value::Float64(*v),
            OwnedValue::Boolean(v) => Value::Boolean(*v),
            OwnedValue::Binary(b) => Value::Binary(b.as_slice()),
            OwnedValue::Guid(g) => Value::Guid(*g),
            OwnedValue::Size(v) => Value::Size(*v),
            OwnedValue::FileTime(v) => Value::FileTime(*v),
            OwnedValue::SystemTime(v) => Value::SystemTime(*v),
            OwnedValue::Sid(s) => Value::Sid(s.clone()),
            OwnedValue::HexInt32(v) => Value::HexInt32(*v),
            OwnedValue::HexInt64(v) => Value::HexInt64(*v),
            OwnedValue::BinXml(b) => Value::BinXml(b.as_slice()),
            OwnedValue::Array(items) => {
                Value::Array(items.iter().map(OwnedValue::as_borrowed).collect())
            }
        }
    }
}

fn decode_ansi_string(bytes: &[u8], codec: encoding::EncodingRef) -> Result<String> {
    use encoding::DecoderTrap;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    codec
        .decode(&bytes[..end], DecoderTrap::Replace)
        .map_err(|e| Error::invalid_data(format!("invalid ANSI string: {e}"), 0))
}

fn decode_sid(bytes: &[u8]) -> Result<Sid> {
    let cur = ByteCursor::new(bytes);
    let revision = cur.read_u8("SID revision", 0)?;
    let count = cur.read_u8("SID sub-authority count", 1)? as usize;
    let authority = cur.slice("SID identifier authority", 2, 6)?;
    let mut identifier_authority = [0u8; 6];
    identifier_authority.copy_from_slice(authority);
    let mut sub_authorities = Vec::with_capacity(count);
    for i in 0..count {
        sub_authorities.push(cur.read_u32("SID sub-authority", 8 + i * 4)?);
    }
    Ok(Sid::from_bytes(revision, identifier_authority, sub_authorities))
}

/// Renders a binary blob as a space-separated uppercase hex dump, matching
/// the `Binary` value kind's canonical text form.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_code_round_trips_array_flag() {
        let code = TypeCode::from_byte(0x08 | ARRAY_FLAG).unwrap();
        assert_eq!(code.kind, ValueKind::UInt32);
        assert!(code.is_array);

        let code = TypeCode::from_byte(0x08).unwrap();
        assert!(!code.is_array);
    }

    #[test]
    fn decodes_uint32_scalar() {
        let bytes = 4624u32.to_le_bytes();
        let v = Value::decode_scalar(ValueKind::UInt32, &bytes).unwrap();
        assert_eq!(
            v.to_display_string(encoding::all::WINDOWS_1252).unwrap(),
            "4624"
        );
    }

    #[test]
    fn ansi_string_decodes_against_configured_codec() {
        let bytes = b"Security\0garbage";
        let v = Value::decode_scalar(ValueKind::AnsiString, bytes).unwrap();
        assert_eq!(
            v.to_display_string(encoding::all::WINDOWS_1252).unwrap(),
            "Security"
        );
    }

    #[test]
    fn hex_dump_is_space_separated_uppercase() {
        assert_eq!(hex_dump(&[0xDE, 0xAD, 0xBE, 0xEF]), "DE AD BE EF");
    }

    #[test]
    fn unrecognized_type_byte_is_unsupported() {
        assert!(ValueKind::from_byte(0x7F).is_err());
    }
}
