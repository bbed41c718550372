//! Walks a decoded token tree and a typed value array into XML text (§4.7).
//!
//! Generalizes `wevt_templates/render.rs`'s `build_wevt_tree` (a bumpalo-
//! arena element builder) to this crate's owned `Token` tree: instead of a
//! stack of `WevtElementBuilder` frames accumulated imperatively, each
//! element is rendered by one recursive call whose return value *is* the
//! frame — `render_element` returns zero, one, or many fully-formed strings
//! for one child slot, which folds the two special substitution rules
//! (§4.7: array-as-repeated-siblings, optional-absent-as-skip) into the
//! parent's dispatch instead of `render_element`'s own body.

use crate::binxml::{
    AttributeToken, BinXmlReader, ElementToken, SubstitutionToken, TemplateInstanceToken, Token,
};
use crate::config::RenderSettings;
use crate::cursor::escape_xml_str;
use crate::descriptors::InputDescriptor;
use crate::error::{Error, Result};
use crate::provider_store::ProviderStore;
use crate::value::{OwnedValue, Value, ValueKind};

/// Renders a decoded token tree against a value array into XML text.
///
/// `inputs` is the owning template's input-descriptor table (the same
/// `Template::inputs` a `ProviderStore::resolve_template` call returns
/// alongside `tokens`); it is consulted only to look up a substitution's
/// `value_map_id` (§10.6), so pass `&[]` when no input descriptors are
/// available (e.g. rendering a bare, standalone token tree in a test).
///
/// `store` resolves template-instance tokens that reference a sub-template
/// by GUID rather than carrying an inline definition, and resolves
/// value-map entries for enum/bitmask substitutions; pass `None` when
/// neither applies.
pub fn render(
    tokens: &[Token],
    values: &[Value<'_>],
    inputs: &[InputDescriptor],
    store: Option<&ProviderStore>,
    settings: &RenderSettings,
) -> Result<String> {
    let mut ctx = RenderContext {
        store,
        settings,
        depth: 0,
    };
    ctx.render_tokens(tokens, values, inputs)
}

/// Size-query half of the sized-buffer contract (§6): the exact number of
/// UTF-8 bytes a `render_into` call with the same arguments will write, so a
/// caller can size its buffer exactly instead of guessing and retrying.
pub fn render_required_len(
    tokens: &[Token],
    values: &[Value<'_>],
    inputs: &[InputDescriptor],
    store: Option<&ProviderStore>,
    settings: &RenderSettings,
) -> Result<usize> {
    Ok(render(tokens, values, inputs, store, settings)?.len())
}

/// Renders into a caller-supplied UTF-8 byte buffer, returning the number of
/// bytes written (§6: "the renderer returns `(bytes_written, status)`"; here
/// `status` is folded into `Result` and a successful `Ok(n)` is the
/// `bytes_written` half). If `out` is too small, returns
/// `Output::InsufficientSpace` without writing anything; call
/// `render_required_len` first to size the buffer exactly, then retry.
pub fn render_into(
    tokens: &[Token],
    values: &[Value<'_>],
    inputs: &[InputDescriptor],
    store: Option<&ProviderStore>,
    settings: &RenderSettings,
    out: &mut [u8],
) -> Result<usize> {
    let text = render(tokens, values, inputs, store, settings)?;
    let bytes = text.as_bytes();
    if out.len() < bytes.len() {
        return Err(Error::insufficient_space(bytes.len()));
    }
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

/// UTF-16 counterpart of `render_required_len`: the exact number of `u16`
/// code units a `render_into_utf16` call with the same arguments will write.
pub fn render_required_len_utf16(
    tokens: &[Token],
    values: &[Value<'_>],
    inputs: &[InputDescriptor],
    store: Option<&ProviderStore>,
    settings: &RenderSettings,
) -> Result<usize> {
    Ok(render(tokens, values, inputs, store, settings)?
        .encode_utf16()
        .count())
}

/// UTF-16 counterpart of `render_into`: `out` is measured and written in
/// `u16` code units rather than bytes.
pub fn render_into_utf16(
    tokens: &[Token],
    values: &[Value<'_>],
    inputs: &[InputDescriptor],
    store: Option<&ProviderStore>,
    settings: &RenderSettings,
    out: &mut [u16],
) -> Result<usize> {
    let units: Vec<u16> = render(tokens, values, inputs, store, settings)?
        .encode_utf16()
        .collect();
    if out.len() < units.len() {
        return Err(Error::insufficient_space(units.len()));
    }
    out[..units.len()].copy_from_slice(&units);
    Ok(units.len())
}

/// Allocating convenience wrapper returning UTF-8 text (§10.4), built
/// strictly on top of the sized primitives above rather than calling
/// `render` directly, per §10.4's description of the convenience surface.
pub fn render_to_string(
    tokens: &[Token],
    values: &[Value<'_>],
    inputs: &[InputDescriptor],
    store: Option<&ProviderStore>,
    settings: &RenderSettings,
) -> Result<String> {
    let len = render_required_len(tokens, values, inputs, store, settings)?;
    let mut buf = vec![0u8; len];
    let written = render_into(tokens, values, inputs, store, settings, &mut buf)?;
    buf.truncate(written);
    String::from_utf8(buf)
        .map_err(|_| Error::invalid_data("renderer produced non-UTF-8 output", 0))
}

/// Allocating convenience wrapper returning UTF-16 code units (§10.4), built
/// strictly on top of the sized primitives above.
pub fn render_to_utf16(
    tokens: &[Token],
    values: &[Value<'_>],
    inputs: &[InputDescriptor],
    store: Option<&ProviderStore>,
    settings: &RenderSettings,
) -> Result<Vec<u16>> {
    let len = render_required_len_utf16(tokens, values, inputs, store, settings)?;
    let mut buf = vec![0u16; len];
    let written = render_into_utf16(tokens, values, inputs, store, settings, &mut buf)?;
    buf.truncate(written);
    Ok(buf)
}

struct RenderContext<'s> {
    store: Option<&'s ProviderStore>,
    settings: &'s RenderSettings,
    depth: u32,
}

impl<'s> RenderContext<'s> {
    fn check_abort(&self) -> Result<()> {
        if self.settings.is_aborted() {
            return Err(Error::abort_requested());
        }
        Ok(())
    }

    fn enter_depth(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.settings.max_recursion_depth() {
            return Err(Error::unsupported(
                "render recursion exceeds the configured depth ceiling",
            ));
        }
        Ok(())
    }

    fn exit_depth(&mut self) {
        self.depth -= 1;
    }

    fn render_tokens(&mut self, tokens: &[Token], values: &[Value<'_>], inputs: &[InputDescriptor]) -> Result<String> {
        self.check_abort()?;
        let mut out = String::new();
        for token in tokens {
            match token {
                Token::FragmentHeader { .. } | Token::EndOfFragment => {}
                Token::OpenElement(el) => {
                    for piece in self.render_element(el, values, inputs)? {
                        out.push_str(&piece);
                    }
                }
                Token::TemplateInstance(inst) => {
                    out.push_str(&self.render_template_instance(inst)?);
                }
                other => {
                    return Err(Error::invalid_data(
                        format!("unexpected token {other:?} at fragment level"),
                        0,
                    ))
                }
            }
        }
        Ok(out)
    }

    /// Renders one `<element>`, returning zero copies (optional substitution
    /// absent), one copy (the ordinary case), or many copies (an array
    /// substitution repeated as sibling elements — §4.7).
    fn render_element(&mut self, el: &ElementToken, values: &[Value<'_>], inputs: &[InputDescriptor]) -> Result<Vec<String>> {
        self.enter_depth()?;
        let result = self.render_element_inner(el, values, inputs);
        self.exit_depth();
        result
    }

    fn render_element_inner(
        &mut self,
        el: &ElementToken,
        values: &[Value<'_>],
        inputs: &[InputDescriptor],
    ) -> Result<Vec<String>> {
        self.check_abort()?;

        if let [Token::Substitution(sub)] = el.children.as_slice() {
            let value_map_id = input_value_map_id(inputs, sub.index);
            return match self.resolve_substitution(sub, values)? {
                None => Ok(Vec::new()),
                Some(Value::Array(items)) => {
                    let mut pieces = Vec::with_capacity(items.len());
                    for item in items {
                        let text = self.format_value_text(&item, false, value_map_id)?;
                        pieces.push(self.wrap_element(&el.name, &el.attributes, &text, values, inputs)?);
                    }
                    Ok(pieces)
                }
                Some(v) => {
                    let text = self.format_value_text(&v, false, value_map_id)?;
                    Ok(vec![self.wrap_element(&el.name, &el.attributes, &text, values, inputs)?])
                }
            };
        }

        let attrs = self.render_attributes(&el.attributes, values, inputs)?;
        let name = escape_xml_str(&el.name, false);
        if el.children.is_empty() {
            return Ok(vec![format!("<{name}{attrs}/>")]);
        }
        let body = self.render_content(&el.children, values, inputs)?;
        Ok(vec![format!("<{name}{attrs}>{body}</{name}>")])
    }

    fn wrap_element(
        &mut self,
        name: &str,
        attributes: &[AttributeToken],
        text: &str,
        values: &[Value<'_>],
        inputs: &[InputDescriptor],
    ) -> Result<String> {
        let attrs = self.render_attributes(attributes, values, inputs)?;
        let name = escape_xml_str(name, false);
        Ok(format!("<{name}{attrs}>{text}</{name}>"))
    }

    fn render_attributes(
        &mut self,
        attributes: &[AttributeToken],
        values: &[Value<'_>],
        inputs: &[InputDescriptor],
    ) -> Result<String> {
        let mut out = String::new();
        for attr in attributes {
            let text = self.render_mixed_content(&attr.value, values, inputs, true)?;
            out.push(' ');
            out.push_str(&escape_xml_str(&attr.name, true));
            out.push_str("=\"");
            out.push_str(&text);
            out.push('"');
        }
        Ok(out)
    }

    fn render_content(&mut self, children: &[Token], values: &[Value<'_>], inputs: &[InputDescriptor]) -> Result<String> {
        let mut out = String::new();
        let mut i = 0;
        while i < children.len() {
            self.check_abort()?;
            match &children[i] {
                Token::OpenElement(inner) => {
                    for piece in self.render_element(inner, values, inputs)? {
                        out.push_str(&piece);
                    }
                }
                Token::PITarget(target) => {
                    out.push_str("<?");
                    out.push_str(&escape_xml_str(target, false));
                    if let Some(Token::PIData(data)) = children.get(i + 1) {
                        out.push(' ');
                        out.push_str(data);
                        i += 1;
                    }
                    out.push_str("?>");
                }
                Token::TemplateInstance(inst) => {
                    out.push_str(&self.render_template_instance(inst)?);
                }
                other => out.push_str(&self.render_content_token(other, values, inputs, false)?),
            }
            i += 1;
        }
        Ok(out)
    }

    /// Renders the handful of token kinds that can appear either inside an
    /// element body or inside an attribute value: static values,
    /// substitutions, CDATA, and the character/entity reference forms.
    fn render_mixed_content(
        &mut self,
        tokens: &[Token],
        values: &[Value<'_>],
        inputs: &[InputDescriptor],
        in_attribute: bool,
    ) -> Result<String> {
        let mut out = String::new();
        for token in tokens {
            out.push_str(&self.render_content_token(token, values, inputs, in_attribute)?);
        }
        Ok(out)
    }

    fn render_content_token(
        &mut self,
        token: &Token,
        values: &[Value<'_>],
        inputs: &[InputDescriptor],
        in_attribute: bool,
    ) -> Result<String> {
        match token {
            Token::Value(v) => self.format_value_text(&v.as_borrowed(), in_attribute, None),
            Token::CData(s) => Ok(format!("<![CDATA[{s}]]>")),
            Token::CharRef(code) => Ok(format!("&#{code};")),
            Token::EntityRef(name) => Ok(format!("&{};", escape_xml_str(name, in_attribute))),
            Token::PIData(data) => Ok(data.clone()),
            Token::Substitution(sub) => {
                let value_map_id = input_value_map_id(inputs, sub.index);
                match self.resolve_substitution(sub, values)? {
                    None => Ok(String::new()),
                    Some(Value::Array(items)) => {
                        let mut parts = Vec::with_capacity(items.len());
                        for item in items {
                            parts.push(self.format_value_text(&item, in_attribute, value_map_id)?);
                        }
                        Ok(parts.join(" "))
                    }
                    Some(v) => self.format_value_text(&v, in_attribute, value_map_id),
                }
            }
            other => Err(Error::invalid_data(
                format!("unexpected token {other:?} in mixed content"),
                0,
            )),
        }
    }

    fn resolve_substitution<'v>(
        &self,
        sub: &SubstitutionToken,
        values: &[Value<'v>],
    ) -> Result<Option<Value<'v>>> {
        let value = values.get(sub.index as usize).ok_or_else(|| {
            Error::invalid_data(
                format!(
                    "substitution index {} out of range for {} supplied values",
                    sub.index,
                    values.len()
                ),
                0,
            )
        })?;
        if sub.optional && value.is_null() {
            return Ok(None);
        }
        check_substitution_type(sub, value)?;
        Ok(Some(value.clone()))
    }

    /// Renders a single resolved value as text. `BinXml`-typed values (kind
    /// `0x21`) are expanded recursively: the value's bytes are a nested
    /// fragment, almost always a lone `TemplateInstance` carrying its own
    /// value array, so no outer value array threads through.
    ///
    /// `value_map_id`, when set, names the value-map an enum/bitmask
    /// substitution's raw numeric value should be resolved against (§10.6);
    /// a resolved entry's `message_id` is rendered as a `%%<id>` reference,
    /// the same placeholder form Windows event consumers fall back to when
    /// no message-string table is loaded. A miss (no map, no matching
    /// entry, no `message_id` on the match, or a non-numeric value) falls
    /// back to the value's own display text unchanged.
    fn format_value_text(
        &mut self,
        v: &Value<'_>,
        in_attribute: bool,
        value_map_id: Option<u32>,
    ) -> Result<String> {
        match v {
            Value::Null => Ok(String::new()),
            Value::BinXml(bytes) => self.render_nested_binxml(bytes),
            other => {
                if let (Some(id), Some(store), Some(raw)) = (value_map_id, self.store, value_as_u32(other)) {
                    if let Some(entry) = store.resolve_map_entry(id, raw) {
                        if let Some(message_id) = entry.message_id {
                            return Ok(escape_xml_str(&format!("%%{message_id}"), in_attribute));
                        }
                    }
                }
                let text = other.to_display_string(self.settings.ansi_codec())?;
                Ok(escape_xml_str(&text, in_attribute))
            }
        }
    }

    fn render_nested_binxml(&mut self, bytes: &[u8]) -> Result<String> {
        self.enter_depth()?;
        let result = (|| {
            let tokens = BinXmlReader::new(bytes).read_fragment()?;
            self.render_tokens(&tokens, &[], &[])
        })();
        self.exit_depth();
        result
    }

    fn render_template_instance(&mut self, inst: &TemplateInstanceToken) -> Result<String> {
        self.enter_depth()?;
        let result = self.render_template_instance_inner(inst);
        self.exit_depth();
        result
    }

    fn render_template_instance_inner(&mut self, inst: &TemplateInstanceToken) -> Result<String> {
        let values: Vec<Value<'_>> = inst.values.iter().map(OwnedValue::as_borrowed).collect();

        if let Some(definition) = &inst.definition {
            // Inline template definitions carry their own token tree but no
            // input-descriptor table (that only exists on a `TEMP` block
            // decoded from a provider's `TTBL`), so no value-map id can be
            // resolved for substitutions inside it.
            return self.render_tokens(&definition.tokens, &values, &[]);
        }
        if let Some(store) = self.store {
            if let Some(template) = store.find_template(inst.template_guid) {
                return self.render_tokens(&template.tokens, &values, &template.inputs);
            }
        }
        log::warn!(
            "dangling template instance reference to {}",
            inst.template_guid
        );
        Ok(String::new())
    }
}

/// Looks up the `value_map_id` an `InputDescriptor` declares for substitution
/// slot `index`, if any. `inputs` is empty wherever no input-descriptor
/// table is available for the current template (see `render_template_instance_inner`).
fn input_value_map_id(inputs: &[InputDescriptor], index: u16) -> Option<u32> {
    inputs.get(index as usize).and_then(|i| i.value_map_id)
}

/// Widens a value to `u32` for value-map lookup, matching the signed/unsigned
/// integer kinds a `VMAP`/`BMAP` substitution is declared over (§10.6); any
/// other kind (strings, GUIDs, binary, ...) has no numeric identity to map.
fn value_as_u32(v: &Value<'_>) -> Option<u32> {
    match *v {
        Value::Int8(n) => Some(n as u32),
        Value::UInt8(n) => Some(n as u32),
        Value::Int16(n) => Some(n as u32),
        Value::UInt16(n) => Some(n as u32),
        Value::Int32(n) => Some(n as u32),
        Value::UInt32(n) => Some(n),
        Value::HexInt32(n) => Some(n),
        _ => None,
    }
}

/// Verifies a substitution token's declared type against the value array's
/// actual kind (§4.7: "verifies the slot's declared type matches the
/// token's expected type (or is the wildcard `any`)"). `ValueKind::Null` as
/// a *declared* type is the wire's "any" wildcard (type byte `0x00`), not a
/// claim that the slot itself is absent — that case is `Value::Null`, an
/// actual kind, checked separately. A `null` value is never a mismatch
/// regardless of the declared type: an absent non-optional slot still
/// renders as empty text (§4.7), it just isn't type-checked. Array-typed
/// values check every element against the same declared type.
fn check_substitution_type(sub: &SubstitutionToken, value: &Value<'_>) -> Result<()> {
    if sub.value_type == ValueKind::Null || value.is_null() {
        return Ok(());
    }
    match value {
        Value::Array(items) => {
            for item in items {
                check_substitution_type(sub, item)?;
            }
            Ok(())
        }
        other => {
            let actual = other
                .kind()
                .expect("non-array, non-null values always report a kind");
            if actual != sub.value_type {
                return Err(Error::value_mismatch(
                    format!(
                        "substitution {} declares type {:?} but the supplied value has type {:?}",
                        sub.index, sub.value_type, actual
                    ),
                    0,
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::value::ValueKind;

    fn event_id_element(index: u16, optional: bool) -> Token {
        Token::OpenElement(ElementToken {
            name: "EventID".to_string(),
            attributes: Vec::new(),
            children: vec![Token::Substitution(SubstitutionToken {
                index,
                value_type: ValueKind::UInt32,
                is_array: false,
                optional,
            })],
        })
    }

    /// Scenario S6 from the specification's §8: a minimal template with one
    /// `UInt32` input renders exactly `<Event><EventID>4624</EventID></Event>`.
    #[test]
    fn scenario_s6_template_with_substitution() {
        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![event_id_element(0, false)],
        })];
        let values = vec![Value::UInt32(4624)];
        let settings = RenderSettings::new();
        let xml = render(&tokens, &values, &[], None, &settings).unwrap();
        assert_eq!(xml, "<Event><EventID>4624</EventID></Event>");
    }

    #[test]
    fn optional_absent_substitution_skips_enclosing_element() {
        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![event_id_element(0, true)],
        })];
        let values = vec![Value::Null];
        let settings = RenderSettings::new();
        let xml = render(&tokens, &values, &[], None, &settings).unwrap();
        assert_eq!(xml, "<Event></Event>");
    }

    #[test]
    fn array_substitution_repeats_as_sibling_elements() {
        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![Token::OpenElement(ElementToken {
                name: "Data".to_string(),
                attributes: Vec::new(),
                children: vec![Token::Substitution(SubstitutionToken {
                    index: 0,
                    value_type: ValueKind::UInt32,
                    is_array: true,
                    optional: false,
                })],
            })],
        })];
        let values = vec![Value::Array(vec![
            Value::UInt32(1),
            Value::UInt32(2),
            Value::UInt32(3),
        ])];
        let settings = RenderSettings::new();
        let xml = render(&tokens, &values, &[], None, &settings).unwrap();
        assert_eq!(
            xml,
            "<Event><Data>1</Data><Data>2</Data><Data>3</Data></Event>"
        );
    }

    #[test]
    fn attribute_values_escape_quotes() {
        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: vec![AttributeToken {
                name: "Name".to_string(),
                value: vec![Token::Value(OwnedValue::String("a\"b".to_string()))],
            }],
            children: Vec::new(),
        })];
        let settings = RenderSettings::new();
        let xml = render(&tokens, &[], &[], None, &settings).unwrap();
        assert_eq!(xml, r#"<Event Name="a&quot;b"/>"#);
    }

    /// §10.6: a substitution whose input descriptor names a value-map, and
    /// whose raw value matches an entry with a `message_id`, renders the
    /// `%%<id>` placeholder form instead of the raw number.
    #[test]
    fn enum_substitution_resolves_through_value_map() {
        use crate::descriptors::{Map, Provider, ProviderElements, ValueMap, ValueMapEntry};
        use crate::provider_store::map_name_hash;

        let map_name = Some("Keywords".to_string());
        let value_map_id = map_name_hash(&map_name);
        let provider = Provider {
            guid: Guid::from_le_bytes([1; 16]),
            message_id: None,
            elements: ProviderElements {
                maps: vec![Map::Value(ValueMap {
                    name: map_name,
                    entries: vec![ValueMapEntry {
                        identifier: 4624,
                        message_id: Some(9001),
                    }],
                })],
                ..Default::default()
            },
        };
        let store = ProviderStore::from_providers(vec![provider]);

        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![event_id_element(0, false)],
        })];
        let inputs = vec![InputDescriptor {
            input_type: ValueKind::UInt32.to_byte(),
            output_type: ValueKind::UInt32.to_byte(),
            value_map_id: Some(value_map_id),
        }];
        let values = vec![Value::UInt32(4624)];
        let settings = RenderSettings::new();
        let xml = render(&tokens, &values, &inputs, Some(&store), &settings).unwrap();
        assert_eq!(xml, "<Event><EventID>%%9001</EventID></Event>");
    }

    /// An unmatched raw value falls back to the plain scalar text.
    #[test]
    fn enum_substitution_without_matching_entry_falls_back_to_raw_text() {
        use crate::descriptors::{Map, Provider, ProviderElements, ValueMap};
        use crate::provider_store::map_name_hash;

        let map_name = Some("Keywords".to_string());
        let value_map_id = map_name_hash(&map_name);
        let provider = Provider {
            guid: Guid::from_le_bytes([1; 16]),
            message_id: None,
            elements: ProviderElements {
                maps: vec![Map::Value(ValueMap {
                    name: map_name,
                    entries: Vec::new(),
                })],
                ..Default::default()
            },
        };
        let store = ProviderStore::from_providers(vec![provider]);

        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![event_id_element(0, false)],
        })];
        let inputs = vec![InputDescriptor {
            input_type: ValueKind::UInt32.to_byte(),
            output_type: ValueKind::UInt32.to_byte(),
            value_map_id: Some(value_map_id),
        }];
        let values = vec![Value::UInt32(4624)];
        let settings = RenderSettings::new();
        let xml = render(&tokens, &values, &inputs, Some(&store), &settings).unwrap();
        assert_eq!(xml, "<Event><EventID>4624</EventID></Event>");
    }

    /// §4.7: a substitution's declared type must match the value array's
    /// actual kind; a `UInt32`-typed slot fed a `String` value is rejected.
    #[test]
    fn substitution_type_mismatch_is_rejected() {
        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![event_id_element(0, false)],
        })];
        let values = vec![Value::String("not a number".to_string())];
        let settings = RenderSettings::new();
        let err = render(&tokens, &values, &[], None, &settings).unwrap_err();
        assert_eq!(
            err.kind,
            crate::error::ErrorKind::Input(crate::error::InputError::ValueMismatch)
        );
    }

    /// §6: a short buffer is rejected with `Output::InsufficientSpace`
    /// rather than a truncated write; sizing with `render_required_len`
    /// first then retrying succeeds.
    #[test]
    fn render_into_reports_insufficient_space_then_succeeds_when_sized() {
        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![event_id_element(0, false)],
        })];
        let values = vec![Value::UInt32(4624)];
        let settings = RenderSettings::new();

        let mut tiny = [0u8; 1];
        let err = render_into(&tokens, &values, &[], None, &settings, &mut tiny).unwrap_err();
        assert_eq!(
            err.kind,
            crate::error::ErrorKind::Output(crate::error::OutputError::InsufficientSpace)
        );

        let len = render_required_len(&tokens, &values, &[], None, &settings).unwrap();
        let mut buf = vec![0u8; len];
        let written = render_into(&tokens, &values, &[], None, &settings, &mut buf).unwrap();
        assert_eq!(written, len);
        assert_eq!(
            std::str::from_utf8(&buf).unwrap(),
            "<Event><EventID>4624</EventID></Event>"
        );
    }

    /// A substitution token whose declared type is the wildcard `any`
    /// (wire type byte `0x00`, `ValueKind::Null`) accepts any value kind.
    #[test]
    fn wildcard_substitution_type_accepts_any_value() {
        let tokens = vec![Token::OpenElement(ElementToken {
            name: "Event".to_string(),
            attributes: Vec::new(),
            children: vec![Token::Substitution(SubstitutionToken {
                index: 0,
                value_type: ValueKind::Null,
                is_array: false,
                optional: false,
            })],
        })];
        let values = vec![Value::String("anything".to_string())];
        let settings = RenderSettings::new();
        let xml = render(&tokens, &values, &[], None, &settings).unwrap();
        assert_eq!(xml, "<Event>anything</Event>");
    }
}
