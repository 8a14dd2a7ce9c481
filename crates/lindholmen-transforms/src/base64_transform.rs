#![forbid(unsafe_code)]

//! Base64 decode transform.

use crate::pipeline::{Transform, TransformData};
use lindholmen_core::{algorithm, Error, Result};
use roxmltree::{Document, NodeType};

/// Decodes base64 content. A node set contributes the string value of its
/// text nodes, in document order.
pub struct Base64DecodeTransform;

impl Transform for Base64DecodeTransform {
    fn uri(&self) -> &str {
        algorithm::BASE64
    }

    fn execute(&self, doc: &Document<'_>, input: TransformData) -> Result<TransformData> {
        let text = match input {
            TransformData::Binary(data) => String::from_utf8(data)
                .map_err(|e| Error::Transform(format!("base64 input not UTF-8: {e}")))?,
            TransformData::NodeSet(set) => doc
                .descendants()
                .filter(|n| n.node_type() == NodeType::Text && set.contains(n))
                .filter_map(|n| n.text())
                .collect(),
        };
        let decoded = lindholmen_crypto::encoding::decode_base64_lenient(&text)?;
        Ok(TransformData::Binary(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lindholmen_xml::NodeSet;

    #[test]
    fn test_decode_node_set_text() {
        let doc = Document::parse("<r><v>aGVs\n</v><w>bG8=</w></r>").unwrap();
        let set = NodeSet::document(&doc, false);
        let out = Base64DecodeTransform
            .execute(&doc, TransformData::NodeSet(set))
            .unwrap()
            .into_bytes(&doc, lindholmen_c14n::C14nMode::Inclusive)
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_decode_octets() {
        let doc = Document::parse("<r/>").unwrap();
        let out = Base64DecodeTransform
            .execute(&doc, TransformData::Binary(b"aGk=".to_vec()))
            .unwrap();
        assert!(matches!(out, TransformData::Binary(ref b) if b == b"hi"));
        assert!(Base64DecodeTransform
            .execute(&doc, TransformData::Binary(b"!!".to_vec()))
            .is_err());
    }
}
