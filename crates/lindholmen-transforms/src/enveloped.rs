#![forbid(unsafe_code)]

//! Enveloped signature removal.
//!
//! Two spellings reach the same effect: the dedicated
//! `enveloped-signature` transform, which removes the signature that owns
//! the reference, and the XPath filter `not(ancestor-or-self::ds:Signature)`,
//! which removes every signature element of the document.

use crate::pipeline::{Transform, TransformData};
use lindholmen_core::{algorithm, ns, Error, Result};
use roxmltree::{Document, NodeId};

/// Removes the `<Signature>` element owning the reference and its
/// descendants from the node set.
pub struct EnvelopedSignatureTransform {
    signature: NodeId,
}

impl EnvelopedSignatureTransform {
    pub fn new(signature: NodeId) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute(&self, doc: &Document<'_>, input: TransformData) -> Result<TransformData> {
        match input {
            TransformData::NodeSet(set) => {
                let signature = doc.get_node(self.signature).ok_or_else(|| {
                    Error::Transform("enveloping signature not found in document".into())
                })?;
                Ok(TransformData::NodeSet(set.without_subtree(signature)))
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}

/// The XPath filter `not(ancestor-or-self::P:Signature)` with `P` bound to
/// the XML-DSig namespace.
pub struct SignatureFilterTransform;

impl SignatureFilterTransform {
    /// Recognize the filter expression; `xpath_node` supplies the prefix
    /// bindings.
    pub fn matches(expr: &str, xpath_node: &roxmltree::Node<'_, '_>) -> bool {
        let Some(inner) = expr
            .trim()
            .strip_prefix("not(ancestor-or-self::")
            .and_then(|rest| rest.strip_suffix(":Signature)"))
        else {
            return false;
        };
        xpath_node
            .namespaces()
            .any(|decl| decl.name() == Some(inner) && decl.uri() == ns::DSIG)
    }
}

impl Transform for SignatureFilterTransform {
    fn uri(&self) -> &str {
        algorithm::XPATH
    }

    fn execute(&self, doc: &Document<'_>, input: TransformData) -> Result<TransformData> {
        match input {
            TransformData::NodeSet(mut set) => {
                let signatures = doc
                    .descendants()
                    .filter(|n| lindholmen_xml::dom::is_element(n, ns::DSIG, ns::node::SIGNATURE));
                for signature in signatures {
                    set = set.without_subtree(signature);
                }
                Ok(TransformData::NodeSet(set))
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "XPath filter requires XML input".into(),
            )),
        }
    }
}
