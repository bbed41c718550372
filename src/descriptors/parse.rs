//! Bit-exact decoders for every WEVT element table.
//!
//! Generalizes `wevt_templates/manifest/parse.rs` (the richest grounding
//! file in the pack) to this crate's scope: no PE/EVTX container is
//! involved, a caller hands this module a single in-memory blob containing
//! a `CRIM` manifest (one or more providers), or a single provider's `WEVT`
//! block directly.
//!
//! A few field widths the specification's §6 leaves unspecified (the exact
//! `EVNT`/`KEYW`/`LEVL`/`OPCO`/`TASK`/`MAPS` entry layouts, and the
//! template's input-descriptor width) are chosen here consistently with the
//! widths §3 does give for the corresponding in-memory types; see
//! DESIGN.md's "Open Question resolutions" for the reasoning.

use crate::binxml::reader::BinXmlReader;
use crate::config::{DecodeSettings, UnknownSignaturePolicy};
use crate::cursor::ByteCursor;
use crate::descriptors::types::*;
use crate::descriptors::util::{optional_message_id, optional_name};
use crate::error::{Error, Result};
use crate::guid::Guid;

const CHANNEL_ENTRY_LEN: usize = 16;
const EVENT_ENTRY_LEN: usize = 29;
const KEYWORD_ENTRY_LEN: usize = 16;
const LEVEL_ENTRY_LEN: usize = 12;
const OPCODE_ENTRY_LEN: usize = 12;
const TASK_ENTRY_LEN: usize = 28;
const INPUT_DESCRIPTOR_LEN: usize = 8;

/// Parses a `CRIM` manifest blob (header + one or more `{guid, provider
/// offset}` entries) into its providers, with the default `DecodeSettings`
/// (`UnknownSignaturePolicy::Capture`).
pub fn parse_crim_manifest(data: &[u8]) -> Result<Vec<Provider>> {
    parse_crim_manifest_with_settings(data, &DecodeSettings::default())
}

pub fn parse_crim_manifest_with_settings(
    data: &[u8],
    settings: &DecodeSettings,
) -> Result<Vec<Provider>> {
    let cur = ByteCursor::new(data);
    cur.read_sig("CRIM signature", 0, b"CRIM")?;
    let size = cur.read_u32("CRIM size", 4)? as usize;
    if size < 16 || size > data.len() {
        return Err(Error::invalid_data(
            format!("CRIM size {size} out of bounds for buffer of length {}", data.len()),
            4,
        ));
    }
    let _major_version = cur.read_u16("CRIM major version", 8)?;
    let _minor_version = cur.read_u16("CRIM minor version", 10)?;
    let provider_count = cur.read_u32("CRIM provider count", 12)? as usize;

    let mut providers = Vec::with_capacity(provider_count);
    for i in 0..provider_count {
        let entry_offset = 16 + i * 20;
        let guid = cur.read_guid("CRIM provider guid", entry_offset)?;
        let provider_offset = cur.read_u32("CRIM provider offset", entry_offset + 16)? as usize;
        providers.push(parse_provider_with_settings(data, provider_offset, guid, settings)?);
    }
    Ok(providers)
}

/// Parses a single provider's `WEVT` block at `offset` with the default
/// `DecodeSettings`. `guid` is the provider's identifying GUID, supplied by
/// the CRIM entry (or, if a caller has isolated a single provider's bytes
/// some other way, by whatever identified it there).
pub fn parse_provider(data: &[u8], offset: usize, guid: Guid) -> Result<Provider> {
    parse_provider_with_settings(data, offset, guid, &DecodeSettings::default())
}

pub fn parse_provider_with_settings(
    data: &[u8],
    offset: usize,
    guid: Guid,
    settings: &DecodeSettings,
) -> Result<Provider> {
    let cur = ByteCursor::new(data);
    cur.read_sig("WEVT signature", offset, b"WEVT")?;
    let _size = cur.read_u32("WEVT size", offset + 4)?;
    let message_identifier = cur.read_u32("WEVT message id", offset + 8)?;
    let descriptor_count = cur.read_u32("WEVT descriptor count", offset + 12)? as usize;
    let unknown2_count = cur.read_u32("WEVT unknown2 count", offset + 16)? as usize;

    let descriptors_offset = offset + 20;
    let mut elements = ProviderElements::default();
    for i in 0..descriptor_count {
        let entry_offset = descriptors_offset + i * 8;
        let element_offset = cur.read_u32("element descriptor offset", entry_offset)? as usize;
        let _unknown = cur.read_u32("element descriptor unknown", entry_offset + 4)?;
        parse_provider_element(&cur, element_offset, &mut elements, settings)?;
    }
    // Validate, but otherwise ignore, the trailing unknown2 array.
    let unknown2_offset = descriptors_offset + descriptor_count * 8;
    let _ = cur.slice("WEVT unknown2 array", unknown2_offset, unknown2_count * 4)?;

    Ok(Provider {
        guid,
        message_id: optional_message_id(message_identifier),
        elements,
    })
}

fn parse_provider_element(
    cur: &ByteCursor<'_>,
    offset: usize,
    elements: &mut ProviderElements,
    settings: &DecodeSettings,
) -> Result<()> {
    let sig = cur.slice("element table signature", offset, 4)?;
    match sig {
        b"CHAN" => elements.channels = parse_channels(cur, offset)?,
        b"EVNT" => elements.events = parse_events(cur, offset)?,
        b"KEYW" => elements.keywords = parse_keywords(cur, offset)?,
        b"LEVL" => elements.levels = parse_levels(cur, offset)?,
        b"OPCO" => elements.opcodes = parse_opcodes(cur, offset)?,
        b"TASK" => elements.tasks = parse_tasks(cur, offset)?,
        b"MAPS" => elements.maps = parse_maps(cur, offset, settings)?,
        b"TTBL" => elements.templates = parse_ttbl(cur, offset)?,
        other => match settings.unknown_signature_policy() {
            UnknownSignaturePolicy::Capture => {
                log::warn!(
                    "capturing unrecognized element table signature {:?} as an opaque blob",
                    String::from_utf8_lossy(other)
                );
                elements.unknown_tables.push(capture_unknown_table(cur, offset)?);
            }
            UnknownSignaturePolicy::Reject => {
                return Err(Error::unsupported(format!(
                    "unrecognized element table signature {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        },
    }
    Ok(())
}

/// Captures an unrecognized table as an opaque blob, trusting the generic
/// `sig(4) | size(4) | ...` convention every known table shares (§10.3).
fn capture_unknown_table(cur: &ByteCursor<'_>, offset: usize) -> Result<UnknownTable> {
    let sig = cur.slice("unknown table signature", offset, 4)?;
    let size = cur.read_u32("unknown table size", offset + 4)? as usize;
    let bytes = cur.slice("unknown table body", offset, size)?.to_vec();
    let mut signature = [0u8; 4];
    signature.copy_from_slice(sig);
    Ok(UnknownTable { signature, bytes })
}

fn table_count(cur: &ByteCursor<'_>, offset: usize, sig: &[u8; 4], what: &str) -> Result<usize> {
    cur.read_sig(what, offset, sig)?;
    let _size = cur.read_u32("table size", offset + 4)?;
    Ok(cur.read_u32("table entry count", offset + 8)? as usize)
}

fn parse_channels(cur: &ByteCursor<'_>, offset: usize) -> Result<Vec<Channel>> {
    let count = table_count(cur, offset, b"CHAN", "CHAN signature")?;
    let entries_offset = offset + 12;
    let mut out = Vec::with_capacity(count);
    let mut seen_identifiers = std::collections::HashSet::new();
    for i in 0..count {
        let e = entries_offset + i * CHANNEL_ENTRY_LEN;
        let identifier = cur.read_u32("channel identifier", e)?;
        let name_offset = cur.read_u32("channel name offset", e + 4)?;
        let _unknown = cur.read_u32("channel unknown", e + 8)?;
        let message_identifier = cur.read_u32("channel message id", e + 12)?;
        if !seen_identifiers.insert(identifier) {
            return Err(Error::invalid_data(
                format!("duplicate channel identifier {identifier}"),
                e as u64,
            ));
        }
        out.push(Channel {
            identifier,
            name: optional_name(cur, name_offset)?,
            message_id: optional_message_id(message_identifier),
        });
    }
    Ok(out)
}

fn parse_events(cur: &ByteCursor<'_>, offset: usize) -> Result<Vec<Event>> {
    let count = table_count(cur, offset, b"EVNT", "EVNT signature")?;
    let entries_offset = offset + 12;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = entries_offset + i * EVENT_ENTRY_LEN;
        let identifier = cur.read_u32("event identifier", e)?;
        let version = cur.read_u8("event version", e + 4)?;
        let channel_id = cur.read_u32("event channel id", e + 5)?;
        let level_id = cur.read_u8("event level id", e + 9)?;
        let opcode_id = cur.read_u8("event opcode id", e + 10)?;
        let task_id = cur.read_u16("event task id", e + 11)?;
        let keyword_mask = cur.read_u64("event keyword mask", e + 13)?;
        let message_id = cur.read_u32("event message id", e + 21)?;
        let template_offset_raw = cur.read_u32("event template offset", e + 25)?;
        let template_offset = if template_offset_raw == 0 {
            None
        } else {
            // §4.3: the decoder must recurse with this child-record offset,
            // the same as TEMP's own input-table offset and MAPS' VMAP/BMAP
            // string offset just below. `parse_temp` performs the bounds and
            // signature validation; its result is discarded here because
            // `parse_ttbl` is the authority for the decoded `Template` list,
            // this call exists only to reject a dangling/malformed offset at
            // decode time rather than at first render.
            parse_temp(cur, template_offset_raw as usize)?;
            Some(template_offset_raw)
        };
        out.push(Event {
            identifier,
            version,
            channel_id,
            level_id,
            opcode_id,
            task_id,
            keyword_mask,
            message_id,
            template_offset,
        });
    }
    Ok(out)
}

fn parse_keywords(cur: &ByteCursor<'_>, offset: usize) -> Result<Vec<Keyword>> {
    let count = table_count(cur, offset, b"KEYW", "KEYW signature")?;
    let entries_offset = offset + 12;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = entries_offset + i * KEYWORD_ENTRY_LEN;
        let identifier = cur.read_u64("keyword identifier", e)?;
        let message_identifier = cur.read_u32("keyword message id", e + 8)?;
        let name_offset = cur.read_u32("keyword name offset", e + 12)?;
        out.push(Keyword {
            identifier,
            name: optional_name(cur, name_offset)?,
            message_id: optional_message_id(message_identifier),
        });
    }
    Ok(out)
}

fn parse_levels(cur: &ByteCursor<'_>, offset: usize) -> Result<Vec<Level>> {
    let count = table_count(cur, offset, b"LEVL", "LEVL signature")?;
    let entries_offset = offset + 12;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = entries_offset + i * LEVEL_ENTRY_LEN;
        let identifier = cur.read_u32("level identifier", e)?;
        let message_identifier = cur.read_u32("level message id", e + 4)?;
        let name_offset = cur.read_u32("level name offset", e + 8)?;
        out.push(Level {
            identifier,
            name: optional_name(cur, name_offset)?,
            message_id: optional_message_id(message_identifier),
        });
    }
    Ok(out)
}

fn parse_opcodes(cur: &ByteCursor<'_>, offset: usize) -> Result<Vec<Opcode>> {
    let count = table_count(cur, offset, b"OPCO", "OPCO signature")?;
    let entries_offset = offset + 12;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = entries_offset + i * OPCODE_ENTRY_LEN;
        let identifier = cur.read_u32("opcode identifier", e)?;
        let message_identifier = cur.read_u32("opcode message id", e + 4)?;
        let name_offset = cur.read_u32("opcode name offset", e + 8)?;
        out.push(Opcode {
            identifier,
            name: optional_name(cur, name_offset)?,
            message_id: optional_message_id(message_identifier),
        });
    }
    Ok(out)
}

fn parse_tasks(cur: &ByteCursor<'_>, offset: usize) -> Result<Vec<Task>> {
    let count = table_count(cur, offset, b"TASK", "TASK signature")?;
    let entries_offset = offset + 12;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = entries_offset + i * TASK_ENTRY_LEN;
        let identifier = cur.read_u32("task identifier", e)?;
        let message_identifier = cur.read_u32("task message id", e + 4)?;
        let mui_identifier = cur.read_guid("task mui guid", e + 8)?;
        let name_offset = cur.read_u32("task name offset", e + 24)?;
        out.push(Task {
            identifier,
            name: optional_name(cur, name_offset)?,
            message_id: optional_message_id(message_identifier),
            mui_identifier,
        });
    }
    Ok(out)
}

fn parse_value_map_entries(cur: &ByteCursor<'_>, offset: usize, count: usize) -> Result<Vec<ValueMapEntry>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = offset + i * 8;
        let identifier = cur.read_u32("map entry identifier", e)?;
        let message_identifier = cur.read_u32("map entry message id", e + 4)?;
        out.push(ValueMapEntry {
            identifier,
            message_id: optional_message_id(message_identifier),
        });
    }
    Ok(out)
}

fn parse_maps(cur: &ByteCursor<'_>, offset: usize, settings: &DecodeSettings) -> Result<Vec<Map>> {
    let count = table_count(cur, offset, b"MAPS", "MAPS signature")?;
    let offsets_table = offset + 12;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let map_offset = cur.read_u32("map table offset", offsets_table + i * 4)? as usize;
        let sig = cur.slice("map signature", map_offset, 4)?;
        match sig {
            b"VMAP" => {
                let size = cur.read_u32("VMAP size", map_offset + 4)?;
                let map_string_offset = cur.read_u32("VMAP string offset", map_offset + 8)?;
                let entry_count = cur.read_u32("VMAP entry count", map_offset + 12)? as usize;
                let _ = size;
                let name = optional_name(cur, map_string_offset)?;
                let entries = parse_value_map_entries(cur, map_offset + 16, entry_count)?;
                out.push(Map::Value(ValueMap { name, entries }));
            }
            b"BMAP" => {
                let size = cur.read_u32("BMAP size", map_offset + 4)?;
                let map_string_offset = cur.read_u32("BMAP string offset", map_offset + 8)?;
                let entry_count = cur.read_u32("BMAP entry count", map_offset + 12)? as usize;
                let _ = size;
                let name = optional_name(cur, map_string_offset)?;
                let entries = parse_value_map_entries(cur, map_offset + 16, entry_count)?;
                out.push(Map::Bitmap(BitMap { name, entries }));
            }
            other => match settings.unknown_signature_policy() {
                UnknownSignaturePolicy::Capture => {
                    log::warn!(
                        "capturing unrecognized map signature {:?} as an opaque blob",
                        String::from_utf8_lossy(other)
                    );
                    out.push(Map::Unknown(capture_unknown_table(cur, map_offset)?));
                }
                UnknownSignaturePolicy::Reject => {
                    return Err(Error::unsupported(format!(
                        "unrecognized map signature {:?}",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
        }
    }
    Ok(out)
}

fn parse_ttbl(cur: &ByteCursor<'_>, offset: usize) -> Result<Vec<Template>> {
    let count = table_count(cur, offset, b"TTBL", "TTBL signature")?;
    let offsets_table = offset + 12;
    let mut out = Vec::with_capacity(count);
    let mut seen_guids = std::collections::HashSet::new();
    for i in 0..count {
        let temp_offset = cur.read_u32("template table offset", offsets_table + i * 4)? as usize;
        let template = parse_temp(cur, temp_offset)?;
        if !seen_guids.insert(template.guid) {
            return Err(Error::invalid_data(
                format!("duplicate template guid {}", template.guid),
                temp_offset as u64,
            ));
        }
        out.push(template);
    }
    Ok(out)
}

fn parse_temp(cur: &ByteCursor<'_>, offset: usize) -> Result<Template> {
    cur.read_sig("TEMP signature", offset, b"TEMP")?;
    let size = cur.read_u32("TEMP size", offset + 4)? as usize;
    let input_count = cur.read_u32("TEMP input count", offset + 8)? as usize;
    let input_table_offset = cur.read_u32("TEMP input table offset", offset + 12)? as usize;
    let guid = cur.read_guid("TEMP guid", offset + 16)?;

    if size < 32 {
        return Err(Error::invalid_data(
            format!("TEMP size {size} smaller than the fixed header"),
            offset as u64,
        ));
    }
    let _ = cur.slice("TEMP body", offset, size)?;

    let mut inputs = Vec::with_capacity(input_count);
    let inputs_start = offset + input_table_offset;
    for i in 0..input_count {
        let e = inputs_start + i * INPUT_DESCRIPTOR_LEN;
        let input_type = cur.read_u8("template input type", e)?;
        let output_type = cur.read_u8("template output type", e + 1)?;
        let value_map_id = cur.read_u32("template value-map id", e + 2)?;
        inputs.push(InputDescriptor {
            input_type,
            output_type,
            value_map_id: if value_map_id == u32::MAX { None } else { Some(value_map_id) },
        });
    }

    let binxml_start = input_table_offset + input_count * INPUT_DESCRIPTOR_LEN;
    let binxml_bytes = cur.slice("TEMP binxml fragment", offset + binxml_start, size - binxml_start)?;
    let tokens = BinXmlReader::new(binxml_bytes).read_fragment()?;

    Ok(Template {
        offset: offset as u32,
        guid,
        inputs,
        tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario S1 from the specification's §8: a standalone 40-byte
    /// channel-table entry (not wrapped in a CHAN header) must decode to
    /// `id = 1, name = "Security"`.
    #[test]
    fn scenario_s1_channel_decode() {
        let bytes: [u8; 40] = [
            0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0xFF, 0xFF,
            0xFF, 0xFF, 0x18, 0x00, 0x00, 0x00, 0x53, 0x00, 0x65, 0x00, 0x63, 0x00, 0x75, 0x00,
            0x72, 0x00, 0x69, 0x00, 0x74, 0x00, 0x79, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let cur = ByteCursor::new(&bytes);
        let identifier = cur.read_u32("channel identifier", 0).unwrap();
        let name_offset = cur.read_u32("channel name offset", 4).unwrap();
        let message_identifier = cur.read_u32("channel message id", 12).unwrap();
        assert_eq!(identifier, 1);
        assert_eq!(optional_message_id(message_identifier), None);
        let name = optional_name(&cur, name_offset).unwrap().unwrap();
        assert_eq!(name, "Security");
        assert_eq!(name.len() + 1, 9);
    }

    /// Testable property 6 (§8): two channels sharing an identifier within
    /// the same `CHAN` table are rejected, matching `parse_ttbl`'s
    /// analogous template-GUID uniqueness check.
    #[test]
    fn duplicate_channel_identifier_is_rejected() {
        fn channel_entry(identifier: u32) -> [u8; CHANNEL_ENTRY_LEN] {
            let mut e = [0u8; CHANNEL_ENTRY_LEN];
            e[0..4].copy_from_slice(&identifier.to_le_bytes());
            e[4..8].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // no name
            e[12..16].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // no message id
            e
        }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"CHAN");
        bytes.extend_from_slice(&(12 + 2 * CHANNEL_ENTRY_LEN as u32).to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&channel_entry(1));
        bytes.extend_from_slice(&channel_entry(1));
        let cur = ByteCursor::new(&bytes);
        assert!(parse_channels(&cur, 0).is_err());
    }

    /// An unrecognized element table signature is captured as an opaque
    /// blob under the default (`Capture`) policy rather than rejected.
    #[test]
    fn unknown_element_table_is_captured_not_rejected() {
        let mut bytes = vec![0u8; 12];
        bytes[0..4].copy_from_slice(b"XTRA");
        bytes[4..8].copy_from_slice(&12u32.to_le_bytes());
        let cur = ByteCursor::new(&bytes);
        let mut elements = ProviderElements::default();
        parse_provider_element(&cur, 0, &mut elements, &DecodeSettings::default()).unwrap();
        assert_eq!(elements.unknown_tables.len(), 1);
        assert_eq!(&elements.unknown_tables[0].signature, b"XTRA");
    }

    /// The same buffer fails outright under `Reject`.
    #[test]
    fn unknown_element_table_is_rejected_under_reject_policy() {
        let mut bytes = vec![0u8; 12];
        bytes[0..4].copy_from_slice(b"XTRA");
        bytes[4..8].copy_from_slice(&12u32.to_le_bytes());
        let cur = ByteCursor::new(&bytes);
        let mut elements = ProviderElements::default();
        let settings = DecodeSettings::new().with_unknown_signature_policy(UnknownSignaturePolicy::Reject);
        assert!(parse_provider_element(&cur, 0, &mut elements, &settings).is_err());
    }

    /// Scenario S5: a channel header declaring an out-of-bounds name_offset
    /// must fail with a truncated-data error, not panic or read OOB.
    #[test]
    fn scenario_s5_bounds_rejection() {
        let mut bytes = vec![0u8; 40];
        bytes[4..8].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
        let cur = ByteCursor::new(&bytes);
        let name_offset = cur.read_u32("channel name offset", 4).unwrap();
        let err = optional_name(&cur, name_offset).unwrap_err();
        assert_eq!(
            err.kind,
            crate::error::ErrorKind::Input(crate::error::InputError::TruncatedData)
        );
    }
}
