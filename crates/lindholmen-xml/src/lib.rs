#![forbid(unsafe_code)]

//! XML document abstraction for the lindholmen XAdES library.
//!
//! Wraps `roxmltree` with the pieces signature validation needs on top of a
//! plain DOM: an id index that remembers every carrier of an id (so that
//! duplicates can be reported instead of silently resolved), node sets for
//! document-subset canonicalization, and same-document URI parsing.

pub mod document;
pub mod dom;
pub mod nodeset;
pub mod xpath;

pub use document::{IdIndex, IdLookup, XmlDocument};
pub use nodeset::NodeSet;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree never expands external entities, so accepting a DOCTYPE is safe.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse `text` with [`parsing_options`], mapping the error.
pub fn parse(text: &str) -> lindholmen_core::Result<roxmltree::Document<'_>> {
    roxmltree::Document::parse_with_options(text, parsing_options())
        .map_err(|e| lindholmen_core::Error::XmlParse(e.to_string()))
}
