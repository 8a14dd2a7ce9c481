#![forbid(unsafe_code)]

//! Transform trait and the data flowing between transforms.

use lindholmen_c14n::C14nMode;
use lindholmen_core::{Error, Result};
use lindholmen_xml::NodeSet;
use roxmltree::Document;

/// Data flowing through a transform chain.
///
/// Node sets always refer to the document passed to
/// [`Transform::execute`].
#[derive(Debug, Clone)]
pub enum TransformData {
    /// A subset of the owning document.
    NodeSet(NodeSet),
    /// Octets.
    Binary(Vec<u8>),
}

impl TransformData {
    /// Convert to octets, canonicalizing a node set with `mode`.
    pub fn into_bytes(self, doc: &Document<'_>, mode: C14nMode) -> Result<Vec<u8>> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::NodeSet(set) => lindholmen_c14n::canonicalize_doc(doc, mode, Some(&set), &[]),
        }
    }

    pub fn is_node_set(&self) -> bool {
        matches!(self, TransformData::NodeSet(_))
    }
}

/// A single transform.
pub trait Transform: Send + Sync {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform on data taken from `doc`.
    fn execute(&self, doc: &Document<'_>, input: TransformData) -> Result<TransformData>;
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }

    pub fn mode(&self) -> C14nMode {
        self.mode
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute(&self, doc: &Document<'_>, input: TransformData) -> Result<TransformData> {
        let bytes = match input {
            TransformData::NodeSet(set) => lindholmen_c14n::canonicalize_doc(
                doc,
                self.mode,
                Some(&set),
                &self.inclusive_prefixes,
            )?,
            TransformData::Binary(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                lindholmen_c14n::canonicalize(text, self.mode, None, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c14n_over_node_set() {
        let doc = Document::parse(r#"<r><a z="1" b="2"><!--c--></a></r>"#).unwrap();
        let a = doc.descendants().find(|n| n.has_tag_name("a")).unwrap();
        let t = C14nTransform::new(C14nMode::ExclusiveWithComments, Vec::new());
        let out = t
            .execute(&doc, TransformData::NodeSet(NodeSet::tree(a, false)))
            .unwrap()
            .into_bytes(&doc, C14nMode::Inclusive)
            .unwrap();
        assert_eq!(out, br#"<a b="2" z="1"></a>"#);
    }

    #[test]
    fn test_c14n_over_octets() {
        let doc = Document::parse("<x/>").unwrap();
        let t = C14nTransform::new(C14nMode::Inclusive, Vec::new());
        let out = t
            .execute(&doc, TransformData::Binary(b"<b  y='1' x='2'/>".to_vec()))
            .unwrap();
        match out {
            TransformData::Binary(bytes) => assert_eq!(bytes, br#"<b x="2" y="1"></b>"#),
            TransformData::NodeSet(_) => panic!("expected octets"),
        }
    }

    #[test]
    fn test_binary_into_bytes_is_identity() {
        let doc = Document::parse("<x/>").unwrap();
        let data = TransformData::Binary(vec![1, 2, 3]);
        assert!(!data.is_node_set());
        assert_eq!(data.into_bytes(&doc, C14nMode::Inclusive).unwrap(), vec![1, 2, 3]);
    }
}
