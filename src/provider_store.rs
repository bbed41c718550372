//! Owns decoded providers and exposes cross-reference lookups by identifier
//! (§4.5).
//!
//! A provider's own element tables are searched directly by the provider
//! decoder while it links events to their channel/level/opcode/task/keyword;
//! this store exists for the coarser-grained case — resolving a template
//! instance's GUID, or a caller looking up a whole provider by its GUID, once
//! decoding is complete and the graph is read-only (§5).

use std::collections::HashMap;

use crate::descriptors::{
    Channel, Event, Keyword, Level, Opcode, Provider, Task, Template, ValueMapEntry,
};
use crate::guid::Guid;

/// A read-only, shareable collection of decoded providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderStore {
    providers: HashMap<Guid, Provider>,
}

impl ProviderStore {
    pub fn new() -> Self {
        ProviderStore {
            providers: HashMap::new(),
        }
    }

    /// Builds a store from a list of already-decoded providers (e.g. the
    /// output of `parse_crim_manifest`). Later entries win on a duplicate
    /// provider GUID.
    pub fn from_providers(providers: Vec<Provider>) -> Self {
        let mut store = ProviderStore::new();
        for provider in providers {
            store.insert(provider);
        }
        store
    }

    pub fn insert(&mut self, provider: Provider) {
        self.providers.insert(provider.guid, provider);
    }

    pub fn get(&self, guid: Guid) -> Option<&Provider> {
        self.providers.get(&guid)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Searches every provider for a template with the given GUID. Template
    /// GUIDs are unique within a provider (`parse_ttbl` rejects duplicates at
    /// decode time) but this store does not assume uniqueness *across*
    /// providers; the first match found is returned.
    pub fn find_template(&self, guid: Guid) -> Option<&Template> {
        self.providers
            .values()
            .find_map(|p| p.elements.templates.iter().find(|t| t.guid == guid))
    }

    /// Resolves `event.channel_id` against `provider`'s channel table,
    /// tolerating a dangling reference per §4.5 (returns `None` rather than
    /// an error).
    pub fn resolve_channel<'a>(&self, provider: &'a Provider, event: &Event) -> Option<&'a Channel> {
        provider
            .elements
            .channels
            .iter()
            .find(|c| c.identifier == event.channel_id)
    }

    pub fn resolve_level<'a>(&self, provider: &'a Provider, event: &Event) -> Option<&'a Level> {
        provider
            .elements
            .levels
            .iter()
            .find(|l| l.identifier == event.level_id as u32)
    }

    pub fn resolve_opcode<'a>(&self, provider: &'a Provider, event: &Event) -> Option<&'a Opcode> {
        provider
            .elements
            .opcodes
            .iter()
            .find(|o| o.identifier == event.opcode_id as u32)
    }

    pub fn resolve_task<'a>(&self, provider: &'a Provider, event: &Event) -> Option<&'a Task> {
        provider
            .elements
            .tasks
            .iter()
            .find(|t| t.identifier == event.task_id as u32)
    }

    /// Keywords are a bitmask, not a single identifier: returns every
    /// keyword whose bit is set in `event.keyword_mask`. An unresolved bit
    /// (no matching keyword entry) is silently skipped, matching the
    /// tolerant-dangling-reference policy.
    pub fn resolve_keywords<'a>(&self, provider: &'a Provider, event: &Event) -> Vec<&'a Keyword> {
        provider
            .elements
            .keywords
            .iter()
            .filter(|k| event.keyword_mask & k.identifier != 0)
            .collect()
    }

    /// Resolves `event.template_offset` against `provider`'s template table
    /// by offset equality (`Template::offset`, matching the teacher's
    /// `Provider::template_by_offset`), not by GUID: the on-disk format
    /// cross-references a `TEMP` block by its own buffer position, not by
    /// its embedded GUID. `None` both when the event declares no template
    /// and when the reference is dangling.
    pub fn resolve_template<'a>(&self, provider: &'a Provider, event: &Event) -> Option<&'a Template> {
        let offset = event.template_offset?;
        provider.elements.templates.iter().find(|t| t.offset == offset)
    }

    /// Resolves an enum/bitmask substitution's raw numeric value to its
    /// value-map entry via the map referenced by `value_map_id` (§10.6:
    /// `InputDescriptor::value_map_id`). Searched across every stored
    /// provider, the same as `find_template`: a substitution's input
    /// descriptor carries a map reference but not that map's owning
    /// provider's GUID.
    pub fn resolve_map_entry(&self, value_map_id: u32, raw_value: u32) -> Option<&ValueMapEntry> {
        self.providers.values().find_map(|provider| {
            provider.elements.maps.iter().find_map(|m| match m {
                crate::descriptors::Map::Value(vm) if value_map_id == map_name_hash(&vm.name) => {
                    vm.entries.iter().find(|e| e.identifier == raw_value)
                }
                crate::descriptors::Map::Bitmap(bm) if value_map_id == map_name_hash(&bm.name) => {
                    bm.entries.iter().find(|e| e.identifier & raw_value != 0)
                }
                _ => None,
            })
        })
    }
}

/// Maps are referenced by name elsewhere in the format, not by a numeric id
/// of their own; `InputDescriptor::value_map_id` is matched against a stable
/// hash of the map's name so lookups stay `O(1)`-ish without re-threading a
/// name string through every input descriptor. Absent-name maps never match.
pub(crate) fn map_name_hash(name: &Option<String>) -> u32 {
    match name {
        None => 0,
        Some(s) => {
            let mut hash: u32 = 2166136261;
            for b in s.as_bytes() {
                hash ^= *b as u32;
                hash = hash.wrapping_mul(16777619);
            }
            hash
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{ProviderElements, NO_MESSAGE};

    fn sample_provider() -> Provider {
        Provider {
            guid: Guid::from_le_bytes([1; 16]),
            message_id: None,
            elements: ProviderElements {
                channels: vec![Channel {
                    identifier: 1,
                    name: Some("Security".to_string()),
                    message_id: None,
                }],
                levels: vec![Level {
                    identifier: 4,
                    name: Some("Information".to_string()),
                    message_id: None,
                }],
                ..Default::default()
            },
        }
    }

    fn sample_event(channel_id: u32, level_id: u8) -> Event {
        Event {
            identifier: 1,
            version: 0,
            channel_id,
            level_id,
            opcode_id: 0,
            task_id: 0,
            keyword_mask: 0,
            message_id: NO_MESSAGE,
            template_offset: None,
        }
    }

    #[test]
    fn resolves_known_channel() {
        let provider = sample_provider();
        let store = ProviderStore::new();
        let event = sample_event(1, 4);
        let channel = store.resolve_channel(&provider, &event).unwrap();
        assert_eq!(channel.name.as_deref(), Some("Security"));
    }

    #[test]
    fn dangling_channel_reference_is_tolerated_as_none() {
        let provider = sample_provider();
        let store = ProviderStore::new();
        let event = sample_event(99, 4);
        assert!(store.resolve_channel(&provider, &event).is_none());
    }

    #[test]
    fn event_without_template_resolves_to_none() {
        let provider = sample_provider();
        let store = ProviderStore::new();
        let event = sample_event(1, 4);
        assert!(!event.has_template());
        assert!(store.resolve_template(&provider, &event).is_none());
    }
}
