#![forbid(unsafe_code)]

//! XML canonicalization (C14N) for the lindholmen XAdES library.
//!
//! Implements all six W3C variants over a `roxmltree` document:
//! - Canonical XML 1.0 (with and without comments)
//! - Canonical XML 1.1 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod escape;
pub mod render;
mod walker;

use lindholmen_core::{algorithm, Error, Result};
use lindholmen_xml::NodeSet;
use walker::Walker;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Canonical XML 1.1
    Inclusive11,
    /// Canonical XML 1.1 with comments
    Inclusive11WithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Inclusive11 => algorithm::C14N11,
            Self::Inclusive11WithComments => algorithm::C14N11_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::C14N11 => Some(Self::Inclusive11),
            algorithm::C14N11_WITH_COMMENTS => Some(Self::Inclusive11WithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    /// Like [`C14nMode::from_uri`], but an unknown URI is an error.
    pub fn require(uri: &str) -> Result<Self> {
        Self::from_uri(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("canonicalization: {uri}")))
    }

    pub fn with_comments(&self) -> bool {
        matches!(
            self,
            Self::InclusiveWithComments | Self::Inclusive11WithComments | Self::ExclusiveWithComments
        )
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }

    pub fn is_version_11(&self) -> bool {
        matches!(self, Self::Inclusive11 | Self::Inclusive11WithComments)
    }
}

impl Default for C14nMode {
    /// XML-DSig's default: inclusive C14N 1.0 without comments.
    fn default() -> Self {
        Self::Inclusive
    }
}

/// Parse `xml` and canonicalize it.
///
/// `inclusive_prefixes` is the exclusive C14N `PrefixList`; it is ignored by
/// the inclusive variants.
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    let doc = lindholmen_xml::parse(xml)?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Canonicalize a parsed document, or the subset of it named by `node_set`.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    Ok(Walker::new(mode, node_set, inclusive_prefixes).run(doc.root()))
}

/// Canonicalize one element and its descendants.
///
/// Comments inside the subtree are kept only by the `WithComments` modes.
pub fn canonicalize_subtree(
    node: roxmltree::Node<'_, '_>,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    if !node.is_element() {
        return Err(Error::Canonicalization(
            "subtree canonicalization requires an element".into(),
        ));
    }
    let set = NodeSet::tree(node, mode.with_comments());
    Ok(Walker::new(mode, Some(&set), inclusive_prefixes).run(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str, mode: C14nMode) -> String {
        String::from_utf8(canonicalize(xml, mode, None, &[]).unwrap()).unwrap()
    }

    fn subtree(xml: &str, name: &str, mode: C14nMode, prefixes: &[String]) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let node = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .unwrap();
        String::from_utf8(canonicalize_subtree(node, mode, prefixes).unwrap()).unwrap()
    }

    #[test]
    fn test_mode_uris_round_trip() {
        for uri in algorithm::ALLOWED_CANONICALIZATIONS {
            assert_eq!(C14nMode::from_uri(uri).unwrap().uri(), uri);
        }
        assert!(C14nMode::require("urn:unknown").is_err());
        assert_eq!(C14nMode::default(), C14nMode::Inclusive);
    }

    #[test]
    fn test_attribute_sorting() {
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#, C14nMode::Inclusive),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn test_text_and_attr_escaping() {
        assert_eq!(
            c14n("<r a=\"&quot;&#9;\">x&gt;&amp;</r>", C14nMode::Inclusive),
            "<r a=\"&quot;&#x9;\">x&gt;&amp;</r>"
        );
    }

    #[test]
    fn test_comments_at_top_level() {
        let xml = "<!--x--><r><!--y--></r>";
        assert_eq!(c14n(xml, C14nMode::InclusiveWithComments), "<!--x-->\n<r><!--y--></r>");
        assert_eq!(c14n(xml, C14nMode::Inclusive), "<r></r>");
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let xml = r#"<r xmlns="http://d"><c><e xmlns=""/></c></r>"#;
        assert_eq!(
            c14n(xml, C14nMode::Inclusive),
            r#"<r xmlns="http://d"><c><e xmlns=""></e></c></r>"#
        );
    }

    #[test]
    fn test_subtree_inclusive_vs_exclusive() {
        let xml = r#"<r xmlns:a="http://a" xmlns:b="http://b"><a:c><d/></a:c></r>"#;
        assert_eq!(
            subtree(xml, "c", C14nMode::Inclusive, &[]),
            r#"<a:c xmlns:a="http://a" xmlns:b="http://b"><d></d></a:c>"#
        );
        assert_eq!(
            subtree(xml, "c", C14nMode::Exclusive, &[]),
            r#"<a:c xmlns:a="http://a"><d></d></a:c>"#
        );
        assert_eq!(
            subtree(xml, "c", C14nMode::Exclusive, &["b".to_owned()]),
            r#"<a:c xmlns:a="http://a" xmlns:b="http://b"><d></d></a:c>"#
        );
    }

    #[test]
    fn test_exclusive_declares_on_first_use() {
        let xml = r#"<r xmlns:a="http://a"><x><a:y/><a:z/></x></r>"#;
        assert_eq!(
            subtree(xml, "x", C14nMode::Exclusive, &[]),
            r#"<x><a:y xmlns:a="http://a"></a:y><a:z xmlns:a="http://a"></a:z></x>"#
        );
    }

    #[test]
    fn test_xml_attribute_inheritance_per_version() {
        let xml = r#"<r xml:lang="en" xml:id="i"><c/></r>"#;
        assert_eq!(
            subtree(xml, "c", C14nMode::Inclusive, &[]),
            r#"<c xml:id="i" xml:lang="en"></c>"#
        );
        assert_eq!(
            subtree(xml, "c", C14nMode::Inclusive11, &[]),
            r#"<c xml:lang="en"></c>"#
        );
        assert_eq!(subtree(xml, "c", C14nMode::Exclusive, &[]), "<c></c>");
    }

    #[test]
    fn test_subtree_comments_follow_mode() {
        let xml = "<r><s><!--k-->t</s></r>";
        assert_eq!(subtree(xml, "s", C14nMode::Inclusive, &[]), "<s>t</s>");
        assert_eq!(
            subtree(xml, "s", C14nMode::InclusiveWithComments, &[]),
            "<s><!--k-->t</s>"
        );
    }

    #[test]
    fn test_document_subset_skips_removed_subtree() {
        let xml = r#"<r><keep>1</keep><drop>2</drop></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let drop = doc.descendants().find(|n| n.has_tag_name("drop")).unwrap();
        let set = NodeSet::document(&doc, false).without_subtree(drop);
        let out = canonicalize_doc(&doc, C14nMode::Inclusive, Some(&set), &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<r><keep>1</keep></r>");
    }
}
