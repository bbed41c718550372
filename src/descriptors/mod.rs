pub mod parse;
pub mod types;
mod util;

pub use parse::{
    parse_crim_manifest, parse_crim_manifest_with_settings, parse_provider,
    parse_provider_with_settings,
};
pub use types::{
    BitMap, Channel, Event, InputDescriptor, Keyword, Level, Map, Opcode, Provider,
    ProviderElements, Task, Template, UnknownTable, ValueMap, ValueMapEntry, NO_MESSAGE,
};
