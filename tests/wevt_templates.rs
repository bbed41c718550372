//! End-to-end coverage over the public API: a synthetic `CRIM` manifest
//! built byte-by-byte (mirroring the teacher's own
//! `tests/test_wevt_templates.rs` synthetic-buffer style), decoded with
//! `parse_crim_manifest`, cross-referenced through a `ProviderStore`, and
//! rendered to XML.

use wevt_templates::{
    parse_crim_manifest, render_to_string, DecodeSettings, Guid, ProviderStore, RenderSettings,
    UnknownSignaturePolicy,
};

fn utf16le(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for u in s.encode_utf16() {
        out.extend_from_slice(&u.to_le_bytes());
    }
    out
}

fn name_record(s: &str) -> Vec<u8> {
    let chars = utf16le(s);
    let mut out = Vec::new();
    out.extend_from_slice(&0u16.to_le_bytes()); // hash, unchecked by this decoder
    out.extend_from_slice(&(s.encode_utf16().count() as u16).to_le_bytes());
    out.extend_from_slice(&chars);
    out.extend_from_slice(&0u16.to_le_bytes()); // NUL
    out
}

/// Builds `<Event><EventID>@0</EventID></Event>` as a Binary-XML fragment
/// with one normal `UInt32` substitution — scenario S6 from the
/// specification's §8, reused here as a template body.
fn event_id_fragment() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&[0x0F, 0x01, 0x01, 0x00]); // fragment header

    let event_name_offset = buf.len() as u32 + 5;
    buf.push(0x01);
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&event_name_offset.to_le_bytes());
    buf.extend_from_slice(&name_record("Event"));
    buf.push(0x02); // close-start-element

    let eventid_name_offset = buf.len() as u32 + 5;
    buf.push(0x01);
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&eventid_name_offset.to_le_bytes());
    buf.extend_from_slice(&name_record("EventID"));
    buf.push(0x02);

    buf.push(0x0D); // normal substitution, index 0, UInt32
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.push(0x08);

    buf.push(0x04); // end EventID
    buf.push(0x04); // end Event
    buf.push(0x00); // end of fragment
    buf
}

/// A full `CRIM -> WEVT -> CHAN/EVNT/TTBL -> TEMP` manifest with one
/// provider, one channel ("Security"), one event referencing both that
/// channel and a template whose body is [`event_id_fragment`].
fn synthetic_manifest() -> Vec<u8> {
    let binxml = event_id_fragment();

    let crim_header_len: u32 = 16;
    let crim_entry_len: u32 = 20;
    let provider_offset: u32 = crim_header_len + crim_entry_len;

    let wevt_header_len: u32 = 20;
    let descriptor_count: u32 = 3; // CHAN, EVNT, TTBL
    let wevt_descriptors_len: u32 = 8 * descriptor_count;
    let chan_offset: u32 = provider_offset + wevt_header_len + wevt_descriptors_len;

    let chan_table_len: u32 = 12 + 16; // header + 1 entry
    let evnt_offset: u32 = chan_offset + chan_table_len;

    let evnt_table_len: u32 = 12 + 29; // header + 1 entry
    let ttbl_offset: u32 = evnt_offset + evnt_table_len;

    let ttbl_table_len: u32 = 12 + 4; // header + 1 offset entry
    let temp_offset: u32 = ttbl_offset + ttbl_table_len;

    let temp_header_len: u32 = 32;
    let input_table_offset: u32 = temp_header_len;
    let binxml_start: u32 = input_table_offset + 1 * 8; // 1 input descriptor
    let temp_size: u32 = binxml_start + binxml.len() as u32;

    let channel_name_offset: u32 = temp_offset + temp_size;
    let channel_name = name_record_sized("Security");
    let total_len: u32 = channel_name_offset + channel_name.len() as u32;

    let provider_guid = Guid::from_le_bytes([0xAA; 16]);
    let template_guid = Guid::from_le_bytes([0x77; 16]);

    let mut blob = Vec::with_capacity(total_len as usize);

    // CRIM header.
    blob.extend_from_slice(b"CRIM");
    blob.extend_from_slice(&total_len.to_le_bytes());
    blob.extend_from_slice(&3u16.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes()); // provider_count

    // CRIM provider entry.
    blob.extend_from_slice(&provider_guid.to_le_bytes());
    blob.extend_from_slice(&provider_offset.to_le_bytes());

    // WEVT header.
    blob.extend_from_slice(b"WEVT");
    blob.extend_from_slice(&(wevt_header_len + wevt_descriptors_len).to_le_bytes());
    blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // message id
    blob.extend_from_slice(&descriptor_count.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes()); // unknown2 count

    // WEVT descriptor entries.
    for offset in [chan_offset, evnt_offset, ttbl_offset] {
        blob.extend_from_slice(&offset.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());
    }

    // CHAN table.
    blob.extend_from_slice(b"CHAN");
    blob.extend_from_slice(&chan_table_len.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes()); // identifier
    blob.extend_from_slice(&channel_name_offset.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes()); // unknown
    blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // message id (none)

    // EVNT table.
    blob.extend_from_slice(b"EVNT");
    blob.extend_from_slice(&evnt_table_len.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&100u32.to_le_bytes()); // identifier
    blob.push(0); // version
    blob.extend_from_slice(&1u32.to_le_bytes()); // channel_id
    blob.push(0); // level_id
    blob.push(0); // opcode_id
    blob.extend_from_slice(&0u16.to_le_bytes()); // task_id
    blob.extend_from_slice(&0u64.to_le_bytes()); // keyword_mask
    blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // message id (none)
    blob.extend_from_slice(&temp_offset.to_le_bytes()); // template_offset, self-relative

    // TTBL table.
    blob.extend_from_slice(b"TTBL");
    blob.extend_from_slice(&ttbl_table_len.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&temp_offset.to_le_bytes());

    // TEMP block.
    blob.extend_from_slice(b"TEMP");
    blob.extend_from_slice(&temp_size.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes()); // input_count
    blob.extend_from_slice(&input_table_offset.to_le_bytes());
    blob.extend_from_slice(&template_guid.to_le_bytes());
    // one input descriptor: type(UInt32)=0x08, out_type=0x01, value_map_id=none, pad
    blob.push(0x08);
    blob.push(0x01);
    blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes());
    blob.extend_from_slice(&binxml);

    // Channel name string.
    blob.extend_from_slice(&channel_name);

    assert_eq!(blob.len(), total_len as usize);
    blob
}

fn name_record_sized(s: &str) -> Vec<u8> {
    let payload = {
        let mut p = utf16le(s);
        p.extend_from_slice(&0u16.to_le_bytes());
        p
    };
    let region_len = 4 + payload.len() as u32;
    let mut out = Vec::with_capacity(region_len as usize);
    out.extend_from_slice(&region_len.to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

#[test]
fn parses_renders_and_cross_references_a_synthetic_manifest() {
    let blob = synthetic_manifest();
    let providers = parse_crim_manifest(&blob).expect("manifest should parse");
    assert_eq!(providers.len(), 1);

    let store = ProviderStore::from_providers(providers);
    let provider = store.providers().next().expect("one provider");
    assert_eq!(provider.elements.events.len(), 1);
    let event = &provider.elements.events[0];

    let channel = store
        .resolve_channel(provider, event)
        .expect("channel resolves");
    assert_eq!(channel.name.as_deref(), Some("Security"));

    let template = store
        .resolve_template(provider, event)
        .expect("template resolves");

    let settings = RenderSettings::new();
    let values = [wevt_templates::Value::UInt32(4624)];
    let xml = render_to_string(&template.tokens, &values, &template.inputs, Some(&store), &settings)
        .expect("render should succeed");
    assert_eq!(xml, "<Event><EventID>4624</EventID></Event>");
}

#[test]
fn truncated_manifest_fails_cleanly_instead_of_panicking() {
    let mut blob = synthetic_manifest();
    blob.truncate(blob.len() - 10);
    assert!(parse_crim_manifest(&blob).is_err());
}

#[test]
fn unknown_element_table_is_tolerated_end_to_end_under_capture_policy() {
    // Append a fourth, unrecognized element table to the WEVT block; under
    // the default `Capture` policy the whole manifest still parses, with
    // the unrecognized bytes surfaced on `ProviderElements::unknown_tables`
    // rather than failing the decode (§10.3).
    let mut blob = synthetic_manifest();

    // Patch the descriptor count from 3 to 4 and the WEVT size field, then
    // append one more descriptor entry plus a trailing "XTRA" table.
    let wevt_offset = 36usize;
    let old_descriptor_count = u32::from_le_bytes(blob[wevt_offset + 12..wevt_offset + 16].try_into().unwrap());
    let new_descriptor_count = old_descriptor_count + 1;
    blob[wevt_offset + 12..wevt_offset + 16].copy_from_slice(&new_descriptor_count.to_le_bytes());

    // Growing the descriptor table shifts every offset placed after it by
    // 8 bytes; simplest synthetic fixup is to instead place the new
    // descriptor/table at the very end of the buffer and only patch the
    // count, leaving existing offsets untouched (they all point earlier in
    // the buffer already).
    let new_table_offset = blob.len() as u32 + 8;
    blob.extend_from_slice(&new_table_offset.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(b"XTRA");
    blob.extend_from_slice(&12u32.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());

    // The CRIM size field only needs to bound the buffer, not equal it
    // exactly down to the last `parse_crim_manifest` byte; re-point it at
    // the new total length.
    let total_len = blob.len() as u32;
    blob[4..8].copy_from_slice(&total_len.to_le_bytes());

    let settings = DecodeSettings::new().with_unknown_signature_policy(UnknownSignaturePolicy::Capture);
    let providers = wevt_templates::parse_crim_manifest_with_settings(&blob, &settings)
        .expect("capture policy should tolerate the unrecognized table");
    assert_eq!(providers[0].elements.unknown_tables.len(), 1);
    assert_eq!(&providers[0].elements.unknown_tables[0].signature, b"XTRA");
}
