//! Streaming decoder from raw Binary-XML bytes into the `Token` tree (§4.6).
//!
//! `BinXmlReader` is a recursive-descent state machine rather than a literal
//! `{ExpectFragmentStart, InElementOpen, ...}` state enum: each grammar
//! production in §4.9 maps to one method (`read_fragment`, `read_element`,
//! `read_content`), and the call stack *is* the state stack. A name cache
//! keyed by in-buffer offset avoids re-decoding the same element/attribute
//! name every time it recurs, mirroring `binxml/name.rs`'s
//! `Context::cached_string_at_offset` in the teacher.

use std::collections::HashMap;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::value::{OwnedValue, TypeCode, Value, ValueKind};

use super::token::{
    AttributeToken, ElementToken, SubstitutionToken, TemplateDefinition, TemplateInstanceToken,
    Token,
};

/// Hard ceiling on nested element / template-instance recursion (§4.6, §9
/// open question (b)): bounds the worst case on hostile, possibly cyclic,
/// template-instance offsets.
pub const MAX_RECURSION_DEPTH: u32 = 256;

const KIND_MASK: u8 = 0x0F;
const HAS_ATTRIBUTES_FLAG: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    EndOfFragment,
    OpenStartElement,
    CloseStartElement,
    CloseEmptyElement,
    EndElement,
    Value,
    Attribute,
    CData,
    CharRef,
    EntityRef,
    PITarget,
    PIData,
    TemplateInstance,
    NormalSubstitution,
    OptionalSubstitution,
    FragmentHeader,
}

impl TokenKind {
    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b & KIND_MASK {
            0x00 => TokenKind::EndOfFragment,
            0x01 => TokenKind::OpenStartElement,
            0x02 => TokenKind::CloseStartElement,
            0x03 => TokenKind::CloseEmptyElement,
            0x04 => TokenKind::EndElement,
            0x05 => TokenKind::Value,
            0x06 => TokenKind::Attribute,
            0x07 => TokenKind::CData,
            0x08 => TokenKind::CharRef,
            0x09 => TokenKind::EntityRef,
            0x0A => TokenKind::PITarget,
            0x0B => TokenKind::PIData,
            0x0C => TokenKind::TemplateInstance,
            0x0D => TokenKind::NormalSubstitution,
            0x0E => TokenKind::OptionalSubstitution,
            0x0F => TokenKind::FragmentHeader,
            _ => unreachable!("KIND_MASK only admits 0x00..=0x0F"),
        })
    }
}

pub struct BinXmlReader<'a> {
    cur: ByteCursor<'a>,
    pos: usize,
    name_cache: HashMap<usize, String>,
    depth: u32,
}

impl<'a> BinXmlReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BinXmlReader {
            cur: ByteCursor::new(bytes),
            pos: 0,
            name_cache: HashMap::new(),
            depth: 0,
        }
    }

    fn peek_byte(&self) -> Result<u8> {
        self.cur.read_u8("token prefix", self.pos)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        let v = self.cur.read_u8(what, self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    fn read_u16(&mut self, what: &str) -> Result<u16> {
        let v = self.cur.read_u16(what, self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        let v = self.cur.read_u32(what, self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    fn read_bytes(&mut self, what: &str, len: usize) -> Result<&'a [u8]> {
        let slice = self.cur.slice(what, self.pos, len)?;
        self.pos += len;
        Ok(slice)
    }

    fn read_guid(&mut self, what: &str) -> Result<crate::guid::Guid> {
        let g = self.cur.read_guid(what, self.pos)?;
        self.pos += 16;
        Ok(g)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(Error::unsupported(format!(
                "Binary-XML nesting exceeds the {MAX_RECURSION_DEPTH}-deep recursion limit"
            )));
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    /// Reads an offset-prefixed UTF-16LE name: a `u32` offset to a `{hash:
    /// u16, char_count: u16, chars: UTF-16LE, NUL: u16}` record, optionally
    /// located elsewhere in the buffer. If the offset equals the position
    /// right after the offset field itself, the record is read inline and
    /// the cursor advances past it; otherwise the record lives elsewhere and
    /// is read without moving the main cursor. Repeated references to the
    /// same offset are served from `name_cache`.
    fn read_name(&mut self) -> Result<String> {
        let name_offset = self.read_u32("binxml name offset")? as usize;
        if let Some(cached) = self.name_cache.get(&name_offset) {
            let cached = cached.clone();
            if name_offset == self.pos {
                self.skip_name_record(name_offset)?;
            }
            return Ok(cached);
        }
        let (name, record_len) = self.decode_name_record(name_offset)?;
        if name_offset == self.pos {
            self.pos += record_len;
        }
        self.name_cache.insert(name_offset, name.clone());
        Ok(name)
    }

    fn decode_name_record(&self, offset: usize) -> Result<(String, usize)> {
        let _hash = self.cur.read_u16("binxml name hash", offset)?;
        let char_count = self.cur.read_u16("binxml name char count", offset + 2)? as usize;
        let chars = self
            .cur
            .slice("binxml name characters", offset + 4, char_count * 2)?;
        let name = crate::cursor::decode_utf16le_until_nul(chars)?;
        // hash(2) + char_count(2) + chars + trailing NUL(2)
        Ok((name, 4 + char_count * 2 + 2))
    }

    fn skip_name_record(&mut self, offset: usize) -> Result<()> {
        let char_count = self.cur.read_u16("binxml name char count", offset + 2)? as usize;
        self.pos = offset + 4 + char_count * 2 + 2;
        Ok(())
    }

    /// Parses a whole fragment: `[fragment-header | template-instance]`,
    /// exactly one root element subtree, `end-of-fragment`.
    pub fn read_fragment(&mut self) -> Result<Vec<Token>> {
        let mut out = Vec::new();
        let mut root_seen = false;
        loop {
            let kind = TokenKind::from_byte(self.peek_byte()?)?;
            match kind {
                TokenKind::FragmentHeader => {
                    if root_seen {
                        return Err(Error::invalid_data(
                            "fragment header after root element",
                            self.pos as u64,
                        ));
                    }
                    out.push(self.read_fragment_header()?);
                }
                TokenKind::TemplateInstance => {
                    out.push(self.read_template_instance()?);
                    root_seen = true;
                }
                TokenKind::OpenStartElement => {
                    if root_seen {
                        return Err(Error::invalid_data(
                            "more than one root element in fragment",
                            self.pos as u64,
                        ));
                    }
                    out.push(self.read_element()?);
                    root_seen = true;
                }
                TokenKind::EndOfFragment => {
                    self.pos += 1;
                    out.push(Token::EndOfFragment);
                    break;
                }
                other => {
                    return Err(Error::invalid_data(
                        format!("unexpected token {other:?} at fragment level"),
                        self.pos as u64,
                    ));
                }
            }
        }
        if !root_seen {
            return Err(Error::invalid_data(
                "fragment has no root element",
                self.pos as u64,
            ));
        }
        Ok(out)
    }

    fn read_fragment_header(&mut self) -> Result<Token> {
        self.pos += 1; // prefix byte
        let major_version = self.read_u8("fragment major version")?;
        let minor_version = self.read_u8("fragment minor version")?;
        let flags = self.read_u8("fragment flags")?;
        Ok(Token::FragmentHeader {
            major_version,
            minor_version,
            flags,
        })
    }

    fn read_element(&mut self) -> Result<Token> {
        self.enter()?;
        let result = self.read_element_inner();
        self.exit();
        result
    }

    fn read_element_inner(&mut self) -> Result<Token> {
        let prefix = self.read_u8("element prefix")?;
        let has_attributes = prefix & HAS_ATTRIBUTES_FLAG != 0;
        let _data_size = self.read_u32("element data size")?;
        let name = self.read_name()?;

        let mut attributes = Vec::new();
        if has_attributes {
            let _attribute_list_size = self.read_u32("attribute list size")?;
            loop {
                let kind = TokenKind::from_byte(self.peek_byte()?)?;
                match kind {
                    TokenKind::Attribute => attributes.push(self.read_attribute()?),
                    TokenKind::CloseStartElement | TokenKind::CloseEmptyElement => break,
                    other => {
                        return Err(Error::invalid_data(
                            format!("unexpected token {other:?} in attribute list"),
                            self.pos as u64,
                        ))
                    }
                }
            }
        }

        let close_kind = TokenKind::from_byte(self.peek_byte()?)?;
        match close_kind {
            TokenKind::CloseEmptyElement => {
                self.pos += 1;
                Ok(Token::OpenElement(ElementToken {
                    name,
                    attributes,
                    children: Vec::new(),
                }))
            }
            TokenKind::CloseStartElement => {
                self.pos += 1;
                let children = self.read_content()?;
                Ok(Token::OpenElement(ElementToken {
                    name,
                    attributes,
                    children,
                }))
            }
            other => Err(Error::invalid_data(
                format!("expected close-start-element or close-empty-element, found {other:?}"),
                self.pos as u64,
            )),
        }
    }

    fn read_attribute(&mut self) -> Result<AttributeToken> {
        self.pos += 1; // prefix byte
        let name = self.read_name()?;
        let mut value = Vec::new();
        loop {
            let kind = TokenKind::from_byte(self.peek_byte()?)?;
            match kind {
                TokenKind::Attribute
                | TokenKind::CloseStartElement
                | TokenKind::CloseEmptyElement => break,
                _ => value.push(self.read_content_token()?),
            }
        }
        Ok(AttributeToken { name, value })
    }

    /// Reads sibling content tokens until an `end-element` token, which is
    /// consumed but not included in the returned children.
    fn read_content(&mut self) -> Result<Vec<Token>> {
        let mut out = Vec::new();
        loop {
            let kind = TokenKind::from_byte(self.peek_byte()?)?;
            if kind == TokenKind::EndElement {
                self.pos += 1;
                break;
            }
            out.push(self.read_content_token()?);
        }
        Ok(out)
    }

    fn read_content_token(&mut self) -> Result<Token> {
        let kind = TokenKind::from_byte(self.peek_byte()?)?;
        match kind {
            TokenKind::OpenStartElement => self.read_element(),
            TokenKind::Value => self.read_value_token(),
            TokenKind::CData => self.read_cdata(),
            TokenKind::CharRef => self.read_charref(),
            TokenKind::EntityRef => self.read_entityref(),
            TokenKind::PITarget => self.read_pitarget(),
            TokenKind::PIData => self.read_pidata(),
            TokenKind::TemplateInstance => self.read_template_instance(),
            TokenKind::NormalSubstitution | TokenKind::OptionalSubstitution => {
                self.read_substitution(kind == TokenKind::OptionalSubstitution)
            }
            other => Err(Error::invalid_data(
                format!("unexpected token {other:?} in content"),
                self.pos as u64,
            )),
        }
    }

    fn read_value_token(&mut self) -> Result<Token> {
        self.pos += 1;
        let type_byte = self.read_u8("value type code")?;
        let code = TypeCode::from_byte(type_byte)?;
        let value = self.read_typed_payload(code)?;
        Ok(Token::Value(value))
    }

    fn read_cdata(&mut self) -> Result<Token> {
        self.pos += 1;
        let s = self.read_len_prefixed_utf16()?;
        Ok(Token::CData(s))
    }

    fn read_charref(&mut self) -> Result<Token> {
        self.pos += 1;
        let code = self.read_u16("char reference code")?;
        Ok(Token::CharRef(code))
    }

    fn read_entityref(&mut self) -> Result<Token> {
        self.pos += 1;
        let name = self.read_name()?;
        Ok(Token::EntityRef(name))
    }

    fn read_pitarget(&mut self) -> Result<Token> {
        self.pos += 1;
        let name = self.read_name()?;
        Ok(Token::PITarget(name))
    }

    fn read_pidata(&mut self) -> Result<Token> {
        self.pos += 1;
        let s = self.read_len_prefixed_utf16()?;
        Ok(Token::PIData(s))
    }

    fn read_substitution(&mut self, optional: bool) -> Result<Token> {
        self.pos += 1;
        let index = self.read_u16("substitution index")?;
        let type_byte = self.read_u8("substitution value type")?;
        let code = TypeCode::from_byte(type_byte)?;
        Ok(Token::Substitution(SubstitutionToken {
            index,
            value_type: code.kind,
            is_array: code.is_array,
            optional,
        }))
    }

    /// Template-instance token: `unknown(u8) | template_id(u32) |
    /// definition_offset(u32)`, followed (inline or by seeking to
    /// `definition_offset`) by `next_template_offset(u32) | guid(16) |
    /// data_size(u32) | <data_size bytes of binxml>`, then back at the
    /// original site: `substitution_count(u32)` descriptors of `size(u16) |
    /// type(u8) | pad(u8)`, then the concatenated raw value bytes.
    /// Grounded on `binxml/tokens.rs::read_template` in the teacher.
    fn read_template_instance(&mut self) -> Result<Token> {
        self.enter()?;
        let result = self.read_template_instance_inner();
        self.exit();
        result
    }

    fn read_template_instance_inner(&mut self) -> Result<Token> {
        self.pos += 1; // prefix byte
        let _unknown = self.read_u8("template instance unknown byte")?;
        let _template_id = self.read_u32("template instance id")?;
        let definition_offset = self.read_u32("template instance definition offset")? as usize;

        let definition = if definition_offset == self.pos {
            Some(self.read_template_definition()?)
        } else if definition_offset == 0 {
            None
        } else {
            let saved_pos = self.pos;
            self.pos = definition_offset;
            let def = self.read_template_definition()?;
            self.pos = saved_pos;
            Some(def)
        };

        let template_guid = definition
            .as_ref()
            .map(|d| d.guid)
            .unwrap_or(crate::guid::Guid::NIL);

        let substitution_count = self.read_u32("template instance substitution count")? as usize;
        let mut descriptors = Vec::with_capacity(substitution_count);
        for _ in 0..substitution_count {
            let size = self.read_u16("template instance value size")? as usize;
            let type_byte = self.read_u8("template instance value type")?;
            let code = TypeCode::from_byte(type_byte)?;
            let _pad = self.read_u8("template instance value pad byte")?;
            descriptors.push((size, code));
        }

        let mut values = Vec::with_capacity(descriptors.len());
        for (size, code) in descriptors {
            let bytes = self.read_bytes("template instance value bytes", size)?;
            values.push(self.decode_value_array_entry(code, bytes)?);
        }

        Ok(Token::TemplateInstance(TemplateInstanceToken {
            template_guid,
            definition,
            values,
        }))
    }

    fn read_template_definition(&mut self) -> Result<TemplateDefinition> {
        let _next_template_offset = self.read_u32("template definition next-offset")?;
        let guid = self.read_guid("template definition guid")?;
        let data_size = self.read_u32("template definition data size")? as usize;
        let bytes = self.read_bytes("template definition binxml", data_size)?;
        let tokens = BinXmlReader::new(bytes).read_fragment_with_depth(self.depth)?;
        Ok(TemplateDefinition { guid, tokens })
    }

    fn read_fragment_with_depth(&mut self, depth: u32) -> Result<Vec<Token>> {
        self.depth = depth;
        self.read_fragment()
    }

    fn decode_value_array_entry(&self, code: TypeCode, bytes: &'a [u8]) -> Result<OwnedValue> {
        if code.is_array {
            let mut items = Vec::new();
            for chunk in split_array_elements(code.kind, bytes)? {
                items.push(OwnedValue::from_borrowed(&Value::decode_scalar(
                    code.kind, chunk,
                )?));
            }
            Ok(OwnedValue::Array(items))
        } else {
            Ok(OwnedValue::from_borrowed(&Value::decode_scalar(
                code.kind, bytes,
            )?))
        }
    }

    /// Reads one typed value from the current position for a `Value`
    /// (static) token. Fixed-width kinds read their declared width directly;
    /// variable-width kinds (`String`, `AnsiString`, `Binary`, `BinXml`,
    /// `Sid`) are `u16`-length-prefixed. Arrays are a `u16` element count
    /// followed by that many elements read the same way.
    fn read_typed_payload(&mut self, code: TypeCode) -> Result<OwnedValue> {
        if code.kind == ValueKind::Null {
            return Ok(OwnedValue::Null);
        }
        if code.is_array {
            let count = self.read_u16("value array element count")? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(self.read_scalar_payload(code.kind)?);
            }
            return Ok(OwnedValue::Array(items));
        }
        self.read_scalar_payload(code.kind)
    }

    fn read_scalar_payload(&mut self, kind: ValueKind) -> Result<OwnedValue> {
        let bytes = match fixed_width(kind) {
            Some(width) => self.read_bytes("fixed-width value payload", width)?,
            None => {
                if kind == ValueKind::Sid {
                    let revision_and_count =
                        self.cur.slice("sid header", self.pos, 2)?;
                    let count = revision_and_count[1] as usize;
                    self.read_bytes("sid payload", 8 + count * 4)?
                } else {
                    let len = self.read_u16("variable-width value length")? as usize;
                    self.read_bytes("variable-width value payload", len)?
                }
            }
        };
        let value = Value::decode_scalar(kind, bytes)?;
        Ok(OwnedValue::from_borrowed(&value))
    }

    fn read_len_prefixed_utf16(&mut self) -> Result<String> {
        let len = self.read_u16("length-prefixed string length")? as usize;
        let bytes = self.read_bytes("length-prefixed string payload", len)?;
        crate::cursor::decode_utf16le_until_nul(bytes)
    }
}

/// Byte width of fixed-width value kinds; `None` marks variable-width kinds
/// (`String`, `AnsiString`, `Binary`, `BinXml`, `Sid`) that carry their own
/// length.
fn fixed_width(kind: ValueKind) -> Option<usize> {
    Some(match kind {
        ValueKind::Null => 0,
        ValueKind::Int8 | ValueKind::UInt8 => 1,
        ValueKind::Int16 | ValueKind::UInt16 => 2,
        ValueKind::Int32
        | ValueKind::UInt32
        | ValueKind::Float32
        | ValueKind::Boolean
        | ValueKind::HexInt32 => 4,
        ValueKind::Int64
        | ValueKind::UInt64
        | ValueKind::Float64
        | ValueKind::FileTime
        | ValueKind::Size
        | ValueKind::HexInt64 => 8,
        ValueKind::Guid | ValueKind::SystemTime => 16,
        ValueKind::String | ValueKind::AnsiString | ValueKind::Binary | ValueKind::BinXml => {
            return None
        }
        ValueKind::Sid => return None,
    })
}

fn split_array_elements(kind: ValueKind, bytes: &[u8]) -> Result<Vec<&[u8]>> {
    match fixed_width(kind) {
        Some(0) => Ok(Vec::new()),
        Some(width) => Ok(bytes.chunks_exact(width).collect()),
        None => Err(Error::unsupported(
            "variable-width array elements are not self-describing in the template-instance wire format",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binxml::token::Token;

    fn utf16le(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for u in s.encode_utf16() {
            out.extend_from_slice(&u.to_le_bytes());
        }
        out
    }

    fn name_record(offset_target: u32, s: &str) -> (Vec<u8>, u32) {
        // Returns (bytes for `{hash:u16, char_count:u16, chars, NUL}`, offset marker).
        let chars = utf16le(s);
        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_le_bytes()); // hash, unchecked
        out.extend_from_slice(&(s.encode_utf16().count() as u16).to_le_bytes());
        out.extend_from_slice(&chars);
        out.extend_from_slice(&0u16.to_le_bytes()); // NUL
        (out, offset_target)
    }

    /// Builds `<Event><EventID>@0</EventID></Event>` as a Binary-XML
    /// fragment with one normal `UInt32` substitution, matching scenario S6
    /// from the specification's §8.
    fn scenario_s6_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        // Fragment header.
        buf.extend_from_slice(&[0x0F, 0x01, 0x01, 0x00]);

        // <Event> open element, no attributes.
        let event_name_offset = buf.len() as u32 + 5; // prefix(1)+data_size(4)
        buf.push(0x01);
        buf.extend_from_slice(&0u32.to_le_bytes()); // data_size, unchecked
        let (rec, _) = name_record(event_name_offset, "Event");
        assert_eq!(buf.len() as u32, event_name_offset);
        buf.extend_from_slice(&event_name_offset.to_le_bytes());
        buf.extend_from_slice(&rec);
        buf.push(0x02); // close-start-element

        // <EventID> open element.
        let eventid_name_offset = buf.len() as u32 + 5;
        buf.push(0x01);
        buf.extend_from_slice(&0u32.to_le_bytes());
        let (rec2, _) = name_record(eventid_name_offset, "EventID");
        buf.extend_from_slice(&eventid_name_offset.to_le_bytes());
        buf.extend_from_slice(&rec2);
        buf.push(0x02); // close-start-element

        // Normal substitution: index 0, type UInt32 (0x08).
        buf.push(0x0D);
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.push(0x08);

        buf.push(0x04); // end EventID
        buf.push(0x04); // end Event
        buf.push(0x00); // end of fragment
        buf
    }

    #[test]
    fn parses_scenario_s6_fragment_shape() {
        let bytes = scenario_s6_bytes();
        let tokens = BinXmlReader::new(&bytes).read_fragment().unwrap();
        // [FragmentHeader, OpenElement(Event), EndOfFragment]
        assert_eq!(tokens.len(), 3);
        match &tokens[1] {
            Token::OpenElement(event) => {
                assert_eq!(event.name, "Event");
                assert_eq!(event.children.len(), 1);
                match &event.children[0] {
                    Token::OpenElement(event_id) => {
                        assert_eq!(event_id.name, "EventID");
                        assert_eq!(event_id.children.len(), 1);
                        match &event_id.children[0] {
                            Token::Substitution(sub) => {
                                assert_eq!(sub.index, 0);
                                assert_eq!(sub.value_type, ValueKind::UInt32);
                                assert!(!sub.optional);
                            }
                            other => panic!("expected substitution, got {other:?}"),
                        }
                    }
                    other => panic!("expected EventID element, got {other:?}"),
                }
            }
            other => panic!("expected Event element, got {other:?}"),
        }
    }

    #[test]
    fn recursion_depth_is_bounded() {
        // A chain of open-elements deeper than the limit, never closed,
        // must fail with a structured error rather than overflow the stack.
        let mut buf = vec![0x0F, 0x01, 0x01, 0x00];
        for i in 0..(MAX_RECURSION_DEPTH + 10) {
            let name_offset = buf.len() as u32 + 5;
            buf.push(0x01);
            buf.extend_from_slice(&0u32.to_le_bytes());
            let (rec, _) = name_record(name_offset, &format!("e{i}"));
            buf.extend_from_slice(&name_offset.to_le_bytes());
            buf.extend_from_slice(&rec);
            buf.push(0x02);
        }
        let err = BinXmlReader::new(&buf).read_fragment().unwrap_err();
        assert_eq!(
            err.kind,
            crate::error::ErrorKind::Runtime(crate::error::RuntimeError::UnsupportedValue)
        );
    }
}
