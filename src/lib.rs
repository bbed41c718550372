//! Parses Windows "WEVT" event-template manifest resources and renders
//! Binary-XML event records against their templates into XML text.
//!
//! The crate is split into a decode half (`descriptors` builds a
//! [`Provider`]'s element tables and templates from a WEVT blob; `binxml`
//! decodes a Binary-XML record into a [`Token`] tree) and a render half
//! (`render` walks a token tree and a value array into XML text, resolving
//! cross-references through a [`ProviderStore`]).
//!
//! ```no_run
//! use wevt_templates::{parse_crim_manifest, ProviderStore, RenderSettings};
//!
//! # fn run(wevt_blob: &[u8], binxml_record: &[u8]) -> wevt_templates::Result<()> {
//! let providers = parse_crim_manifest(wevt_blob)?;
//! let store = ProviderStore::from_providers(providers);
//!
//! let tokens = wevt_templates::BinXmlReader::new(binxml_record).read_fragment()?;
//! let xml = wevt_templates::render_to_string(&tokens, &[], &[], Some(&store), &RenderSettings::new())?;
//! println!("{xml}");
//! # Ok(())
//! # }
//! ```

mod binxml;
mod config;
mod cursor;
mod descriptors;
mod error;
mod guid;
mod ntsid;
mod provider_store;
mod render;
mod scalar;
mod value;

pub use binxml::{
    AttributeToken, BinXmlReader, ElementToken, SubstitutionToken, TemplateDefinition,
    TemplateInstanceToken, Token, MAX_RECURSION_DEPTH,
};
pub use config::{DecodeSettings, OutputWidth, RenderSettings, UnknownSignaturePolicy};
pub use cursor::{escape_xml_str, escape_xml_utf16le, ByteCursor};
pub use descriptors::{
    parse_crim_manifest, parse_crim_manifest_with_settings, parse_provider,
    parse_provider_with_settings, BitMap, Channel, Event, InputDescriptor, Keyword, Level, Map,
    Opcode, Provider, ProviderElements, Task, Template, UnknownTable, ValueMap, ValueMapEntry,
    NO_MESSAGE,
};
pub use error::{
    ArgumentsError, Error, ErrorKind, InputError, MemoryError, OutputError, Result, RuntimeError,
};
pub use guid::Guid;
pub use ntsid::Sid;
pub use provider_store::ProviderStore;
pub use render::{
    render, render_into, render_into_utf16, render_required_len, render_required_len_utf16,
    render_to_string, render_to_utf16,
};
pub use scalar::{
    filetime_to_iso8601, format_float32, format_float64, format_hex, format_signed_decimal,
    format_size, format_unsigned_decimal, iso8601_to_filetime, systemtime_to_string,
};
pub use value::{OwnedValue, TypeCode, Value, ValueKind, ARRAY_FLAG};

/// Synchronizes `env_logger` initialization across the test binary's threads
/// (§10.2, §10.5): `cargo test` runs test functions concurrently, and most
/// logging backends panic if installed more than once from the same process.
#[cfg(test)]
pub(crate) fn ensure_test_logger_initialized() {
    static LOGGER_INIT: std::sync::Once = std::sync::Once::new();
    LOGGER_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
