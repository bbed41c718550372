//! Small shared helpers used by every table decoder in `parse.rs`.

use crate::cursor::ByteCursor;
use crate::descriptors::types::NO_MESSAGE;
use crate::error::Result;

pub fn optional_message_id(raw: u32) -> Option<u32> {
    if raw == NO_MESSAGE {
        None
    } else {
        Some(raw)
    }
}

/// Reads an optional name: `0` at `name_offset` means "no name", matching
/// the convention used throughout the channel/keyword/level/opcode/task
/// tables (the field is itself an offset, not a second presence flag).
pub fn optional_name(cur: &ByteCursor<'_>, name_offset: u32) -> Result<Option<String>> {
    if name_offset == 0 {
        return Ok(None);
    }
    Ok(Some(cur.read_sized_utf16_string("element name", name_offset as usize)?))
}
