//! The Binary-XML token tree (§3 "Token", §4.6).
//!
//! Unlike the teacher's `bumpalo`-arena, `ElementId`-indexed IR
//! (`model/ir.rs`), this is a plain recursive owned-enum tree: `OpenElement`
//! carries its attributes and children inline rather than indices into an
//! arena. The specification's own data model ("Token... a child token
//! range... Parent/child relationships are a tree") does not require
//! arena-indexed storage, and an owned tree keeps every `Template` (and
//! therefore every `Provider`) free of a lifetime parameter, matching
//! `descriptors::types::Template`'s `Vec<Token>` field.

use crate::guid::Guid;
use crate::value::{OwnedValue, ValueKind};

/// One node of a decoded Binary-XML fragment.
#[derive(Debug, Clone)]
pub enum Token {
    FragmentHeader {
        major_version: u8,
        minor_version: u8,
        flags: u8,
    },
    TemplateInstance(TemplateInstanceToken),
    OpenElement(ElementToken),
    Value(OwnedValue),
    CData(String),
    CharRef(u16),
    EntityRef(String),
    PITarget(String),
    PIData(String),
    Substitution(SubstitutionToken),
    EndOfFragment,
}

#[derive(Debug, Clone)]
pub struct ElementToken {
    pub name: String,
    pub attributes: Vec<AttributeToken>,
    pub children: Vec<Token>,
}

/// An attribute's value is itself a short run of content tokens (almost
/// always a single `Value` or `Substitution`, but the grammar allows mixed
/// text/entity/char references, never a nested element).
#[derive(Debug, Clone)]
pub struct AttributeToken {
    pub name: String,
    pub value: Vec<Token>,
}

#[derive(Debug, Clone, Copy)]
pub struct SubstitutionToken {
    pub index: u16,
    pub value_type: ValueKind,
    pub is_array: bool,
    /// `0x0E` ("optional substitution"): an absent (`Null`) value means the
    /// enclosing element is skipped entirely rather than emitted empty.
    pub optional: bool,
}

/// A reference to a sub-template plus its own, self-contained substitution
/// array — either resolved later by GUID against a `ProviderStore`, or
/// carrying its definition inline (`definition.is_some()`).
#[derive(Debug, Clone)]
pub struct TemplateInstanceToken {
    pub template_guid: Guid,
    pub definition: Option<TemplateDefinition>,
    pub values: Vec<OwnedValue>,
}

#[derive(Debug, Clone)]
pub struct TemplateDefinition {
    pub guid: Guid,
    pub tokens: Vec<Token>,
}
