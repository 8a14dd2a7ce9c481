#![forbid(unsafe_code)]

//! Owned XML document and id attribute index.

use lindholmen_core::{Error, Result};
use std::collections::HashMap;

/// Attribute names treated as ids on every element.
pub const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// An owned XML document.
///
/// The tree is never stored: call [`XmlDocument::parse_doc`] to obtain a
/// `roxmltree::Document` borrowing the text. Node ids are stable across
/// parses of the same text, which lets callers keep `NodeId`s around.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: String,
    extra_id_attrs: Vec<String>,
}

impl XmlDocument {
    /// Parse and validate XML from a string, taking ownership.
    pub fn parse(text: String) -> Result<Self> {
        crate::parse(&text)?;
        Ok(Self {
            text,
            extra_id_attrs: Vec::new(),
        })
    }

    /// Parse and validate XML from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?
            .to_owned();
        Self::parse(text)
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Register an additional id attribute name (beyond `Id`, `ID`, `id`).
    pub fn add_id_attr(&mut self, name: &str) {
        self.extra_id_attrs.push(name.to_owned());
    }

    /// Extra id attribute names registered on this document.
    pub fn extra_id_attrs(&self) -> &[String] {
        &self.extra_id_attrs
    }

    /// Parse the stored text into a temporary tree.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>> {
        crate::parse(&self.text)
    }

    /// Build the id index for a tree parsed from this document.
    pub fn id_index(&self, doc: &roxmltree::Document<'_>) -> IdIndex {
        IdIndex::build(doc, &self.extra_id_attrs)
    }
}

/// Outcome of an id lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdLookup {
    /// Exactly one element carries the id.
    Unique(roxmltree::NodeId),
    /// The id is carried by this many elements.
    Duplicated(usize),
    /// No element carries the id.
    Missing,
}

/// Maps id values to every element carrying them.
///
/// Keeping all carriers is what allows a signature-wrapping attempt (a
/// grafted element re-using a signed id) to be detected.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    entries: HashMap<String, Vec<roxmltree::NodeId>>,
}

impl IdIndex {
    /// Index `Id`, `ID`, `id` and any `extra_attrs` on all elements.
    pub fn build(doc: &roxmltree::Document<'_>, extra_attrs: &[String]) -> Self {
        let mut entries: HashMap<String, Vec<roxmltree::NodeId>> = HashMap::new();
        let names = DEFAULT_ID_ATTRS
            .iter()
            .copied()
            .chain(extra_attrs.iter().map(String::as_str));
        let names: Vec<&str> = names.collect();
        for node in doc.descendants().filter(|n| n.is_element()) {
            for name in &names {
                if let Some(value) = node.attribute(*name) {
                    let carriers = entries.entry(value.to_owned()).or_default();
                    if carriers.last() != Some(&node.id()) {
                        carriers.push(node.id());
                    }
                }
            }
        }
        Self { entries }
    }

    /// Look up the carriers of `id`.
    pub fn lookup(&self, id: &str) -> IdLookup {
        match self.entries.get(id).map(Vec::as_slice) {
            None | Some([]) => IdLookup::Missing,
            Some([single]) => IdLookup::Unique(*single),
            Some(many) => IdLookup::Duplicated(many.len()),
        }
    }

    /// Resolve `id` to its unique element, or `None` when missing or ambiguous.
    pub fn unique<'a, 'input>(
        &self,
        doc: &'a roxmltree::Document<'input>,
        id: &str,
    ) -> Option<roxmltree::Node<'a, 'input>> {
        match self.lookup(id) {
            IdLookup::Unique(node_id) => doc.get_node(node_id),
            _ => None,
        }
    }

    /// True when more than one element carries `id`.
    pub fn is_duplicated(&self, id: &str) -> bool {
        matches!(self.lookup(id), IdLookup::Duplicated(_))
    }

    /// All id values carried by more than one element.
    pub fn duplicated_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, carriers)| carriers.len() > 1)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(XmlDocument::parse("<a><b></a>".into()).is_err());
        assert!(XmlDocument::parse_bytes(b"<a/>").is_ok());
    }

    #[test]
    fn test_unique_lookup() {
        let xml = XmlDocument::parse(r#"<r><a Id="x"/><b ID="y"/></r>"#.into()).unwrap();
        let doc = xml.parse_doc().unwrap();
        let index = xml.id_index(&doc);
        let node = index.unique(&doc, "x").unwrap();
        assert_eq!(node.tag_name().name(), "a");
        assert!(matches!(index.lookup("y"), IdLookup::Unique(_)));
        assert_eq!(index.lookup("z"), IdLookup::Missing);
    }

    #[test]
    fn test_duplicate_detection() {
        let xml = XmlDocument::parse(r#"<r><a Id="x"/><wrap><a Id="x"/></wrap></r>"#.into())
            .unwrap();
        let doc = xml.parse_doc().unwrap();
        let index = xml.id_index(&doc);
        assert_eq!(index.lookup("x"), IdLookup::Duplicated(2));
        assert!(index.unique(&doc, "x").is_none());
        assert_eq!(index.duplicated_ids(), vec!["x"]);
    }

    #[test]
    fn test_same_element_two_id_attrs_counts_once() {
        let xml = XmlDocument::parse(r#"<r><a Id="x" id="x"/></r>"#.into()).unwrap();
        let doc = xml.parse_doc().unwrap();
        assert!(matches!(xml.id_index(&doc).lookup("x"), IdLookup::Unique(_)));
    }

    #[test]
    fn test_extra_id_attr() {
        let mut xml = XmlDocument::parse(r#"<r><a key="k1"/></r>"#.into()).unwrap();
        xml.add_id_attr("key");
        let doc = xml.parse_doc().unwrap();
        assert!(xml.id_index(&doc).unique(&doc, "k1").is_some());
    }
}
