//! Binary-XML decoding: the on-wire token stream (§4.6) into an owned
//! `Token` tree ready for `render`.

pub mod reader;
pub mod token;

pub use reader::{BinXmlReader, MAX_RECURSION_DEPTH};
pub use token::{
    AttributeToken, ElementToken, SubstitutionToken, TemplateDefinition, TemplateInstanceToken,
    Token,
};
