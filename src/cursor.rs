//! Bounds-checked little-endian reads and UTF-16LE -> UTF-8 XML-escaped
//! conversion over an immutable byte buffer.
//!
//! Every read asserts `offset + width <= buffer_length` before touching the
//! slice; offset arithmetic is always checked so a hostile `offset` can
//! never wrap around and defeat the bounds check.

use crate::error::{Error, Result};
use utf16_simd::Scratch;

/// A read-only view over a byte buffer with bounds-checked primitive reads.
///
/// `ByteCursor` does not carry a position of its own: every read takes an
/// explicit offset, matching the descriptor decoders' "(buffer, offset) ->
/// value" style (see `descriptors::parse`), which never share a single
/// advancing cursor across independent decode calls.
#[derive(Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteCursor { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.buf
    }

    fn check(&self, what: &str, offset: usize, width: usize) -> Result<()> {
        let end = offset
            .checked_add(width)
            .ok_or_else(|| Error::truncated(what, offset as u64, width as u64, self.buf.len() as u64))?;
        if end > self.buf.len() {
            return Err(Error::truncated(
                what,
                offset as u64,
                width as u64,
                self.buf.len() as u64,
            ));
        }
        Ok(())
    }

    /// Returns a borrowed slice `[offset, offset+len)`, bounds-checked.
    pub fn slice(&self, what: &str, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.check(what, offset, len)?;
        Ok(&self.buf[offset..offset + len])
    }

    pub fn read_u8(&self, what: &str, offset: usize) -> Result<u8> {
        self.check(what, offset, 1)?;
        Ok(self.buf[offset])
    }

    pub fn read_u16(&self, what: &str, offset: usize) -> Result<u16> {
        self.check(what, offset, 2)?;
        let b = &self.buf[offset..offset + 2];
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&self, what: &str, offset: usize) -> Result<u32> {
        self.check(what, offset, 4)?;
        let b = &self.buf[offset..offset + 4];
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&self, what: &str, offset: usize) -> Result<u64> {
        self.check(what, offset, 8)?;
        let b = &self.buf[offset..offset + 8];
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_i8(&self, what: &str, offset: usize) -> Result<i8> {
        self.read_u8(what, offset).map(|v| v as i8)
    }

    pub fn read_i16(&self, what: &str, offset: usize) -> Result<i16> {
        self.read_u16(what, offset).map(|v| v as i16)
    }

    pub fn read_i32(&self, what: &str, offset: usize) -> Result<i32> {
        self.read_u32(what, offset).map(|v| v as i32)
    }

    pub fn read_i64(&self, what: &str, offset: usize) -> Result<i64> {
        self.read_u64(what, offset).map(|v| v as i64)
    }

    pub fn read_f32(&self, what: &str, offset: usize) -> Result<f32> {
        self.read_u32(what, offset).map(f32::from_bits)
    }

    pub fn read_f64(&self, what: &str, offset: usize) -> Result<f64> {
        self.read_u64(what, offset).map(f64::from_bits)
    }

    pub fn read_sig(&self, what: &str, offset: usize, expected: &[u8; 4]) -> Result<()> {
        let found = self.slice(what, offset, 4)?;
        if found != expected {
            return Err(Error::signature_mismatch(expected, found, offset as u64));
        }
        Ok(())
    }

    /// Reads a 16-byte GUID with the Microsoft mixed-endian field layout.
    pub fn read_guid(&self, what: &str, offset: usize) -> Result<crate::guid::Guid> {
        let bytes = self.slice(what, offset, 16)?;
        Ok(crate::guid::Guid::from_le_bytes(
            bytes.try_into().expect("slice of len 16"),
        ))
    }

    /// Reads a length-prefixed UTF-16LE name record: a 4-byte field giving
    /// the size in bytes of the *whole* record (the 4-byte length field
    /// itself plus the UTF-16LE payload that follows it), then that many
    /// bytes minus 4 of raw little-endian payload.
    pub fn read_sized_utf16_string(&self, what: &str, offset: usize) -> Result<String> {
        let region_len = self.read_u32("string length prefix", offset)? as usize;
        let payload_len = region_len.checked_sub(4).ok_or_else(|| {
            Error::invalid_data(format!("{what}: length prefix {region_len} smaller than 4"), offset as u64)
        })?;
        let payload = self.slice(what, offset + 4, payload_len)?;
        decode_utf16le_until_nul(payload)
    }
}

/// Decodes a UTF-16LE byte buffer up to (not including) the first NUL code
/// unit, or the whole buffer if no NUL is present.
pub fn decode_utf16le_until_nul(bytes: &[u8]) -> Result<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16(&units)
        .map_err(|e| Error::invalid_data("invalid UTF-16 string", 0).with_source(e))
}

/// XML-escapes a UTF-16LE byte buffer into a UTF-8 `String`, stopping at the
/// first U+0000 code unit. `in_attribute` additionally escapes `"` (used for
/// attribute-value text; element text leaves it verbatim, matching Event
/// Viewer's own behavior). `'` is never escaped: `utf16_simd::Scratch`
/// escapes both quote characters when `in_attribute` is set, so its output
/// is patched to unescape `&apos;` back to a literal apostrophe, matching
/// the spec's explicit "quot only" attribute rule (§4.7, §9 (a)).
pub fn escape_xml_utf16le(bytes: &[u8], in_attribute: bool) -> String {
    let num_units = bytes.len() / 2;
    // Stop at the first embedded NUL code unit.
    let mut stop = num_units;
    for i in 0..num_units {
        let u = u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
        if u == 0 {
            stop = i;
            break;
        }
    }
    let mut scratch = Scratch::new();
    let escaped = scratch.escape_xml_utf16le(&bytes[..stop * 2], stop, in_attribute);
    let decoded = String::from_utf8_lossy(escaped).into_owned();
    if in_attribute {
        decoded.replace("&apos;", "'")
    } else {
        decoded
    }
}

/// XML-escapes a plain `&str` (used for inline/static text already decoded
/// to UTF-8, e.g. scalar-formatter output embedded into element bodies).
pub fn escape_xml_str(s: &str, in_attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_primitives() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let cur = ByteCursor::new(&buf);
        assert_eq!(cur.read_u8("x", 0).unwrap(), 0x01);
        assert_eq!(cur.read_u16("x", 0).unwrap(), 0x0201);
        assert_eq!(cur.read_u32("x", 0).unwrap(), 0x04030201);
        assert_eq!(cur.read_u64("x", 0).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn rejects_out_of_bounds_reads() {
        let buf = [0u8; 4];
        let cur = ByteCursor::new(&buf);
        assert!(cur.read_u32("x", 2).is_err());
        assert!(cur.read_u64("x", 0).is_err());
    }

    #[test]
    fn offset_overflow_is_rejected_not_wrapped() {
        let buf = [0u8; 4];
        let cur = ByteCursor::new(&buf);
        assert!(cur.read_u8("x", usize::MAX).is_err());
    }

    #[test]
    fn escapes_only_angle_and_amp_in_element_text() {
        let s = "a&b<c>d\"e'f";
        let escaped = escape_xml_str(s, false);
        assert_eq!(escaped, "a&amp;b&lt;c&gt;d\"e'f");
    }

    #[test]
    fn escapes_only_quot_in_attribute_text() {
        let s = "a\"b'c";
        let escaped = escape_xml_str(s, true);
        assert_eq!(escaped, "a&quot;b'c");
    }

    #[test]
    fn utf16_attribute_escaping_does_not_escape_apostrophe() {
        fn utf16le(s: &str) -> Vec<u8> {
            let mut out = Vec::new();
            for u in s.encode_utf16() {
                out.extend_from_slice(&u.to_le_bytes());
            }
            out
        }
        let bytes = utf16le("a\"b'c");
        let escaped = escape_xml_utf16le(&bytes, true);
        assert_eq!(escaped, "a&quot;b'c");
    }

    #[test]
    fn utf16le_escaping_stops_at_nul() {
        fn utf16le(s: &str) -> Vec<u8> {
            let mut out = Vec::new();
            for u in s.encode_utf16() {
                out.extend_from_slice(&u.to_le_bytes());
            }
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(b"garbage after nul");
            out
        }
        let bytes = utf16le("1234");
        let decoded = escape_xml_utf16le(&bytes, false);
        assert_eq!(decoded, "1234");
    }
}
