#![forbid(unsafe_code)]

//! Building a transform chain from a `ds:Transforms` element.

use crate::base64_transform::Base64DecodeTransform;
use crate::enveloped::{EnvelopedSignatureTransform, SignatureFilterTransform};
use crate::pipeline::{C14nTransform, Transform, TransformData};
use lindholmen_c14n::C14nMode;
use lindholmen_core::{algorithm, ns, Error, Result};
use lindholmen_xml::dom;
use roxmltree::{Document, Node};

/// A sequence of transforms executed in order.
#[derive(Default)]
pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform to the end of the chain.
    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Parse the children of a `ds:Transforms` element.
    ///
    /// `signature` is the `ds:Signature` owning the reference; the
    /// enveloped-signature transform removes it. A transform whose algorithm
    /// is not implemented yields [`Error::UnsupportedAlgorithm`].
    pub fn from_element(transforms: Option<Node<'_, '_>>, signature: Node<'_, '_>) -> Result<Self> {
        let mut chain = Self::new();
        let Some(transforms) = transforms else {
            return Ok(chain);
        };
        for transform in dom::find_child_elements(transforms, ns::DSIG, ns::node::TRANSFORM) {
            let uri = transform
                .attribute(ns::attr::ALGORITHM)
                .ok_or_else(|| Error::MissingAttribute("Transform/@Algorithm".into()))?;
            chain.push(build_transform(uri, transform, signature)?);
        }
        Ok(chain)
    }

    /// Execute all transforms in order.
    pub fn execute(&self, doc: &Document<'_>, input: TransformData) -> Result<TransformData> {
        let mut data = input;
        for transform in &self.transforms {
            log::trace!("applying transform {}", transform.uri());
            data = transform.execute(doc, data)?;
        }
        Ok(data)
    }

    /// The algorithm URIs, in order.
    pub fn uris(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.uri()).collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

fn build_transform(
    uri: &str,
    transform: Node<'_, '_>,
    signature: Node<'_, '_>,
) -> Result<Box<dyn Transform>> {
    if let Some(mode) = C14nMode::from_uri(uri) {
        return Ok(Box::new(C14nTransform::new(mode, read_inclusive_prefixes(transform))));
    }
    match uri {
        algorithm::ENVELOPED_SIGNATURE => Ok(Box::new(EnvelopedSignatureTransform::new(signature.id()))),
        algorithm::BASE64 => Ok(Box::new(Base64DecodeTransform)),
        algorithm::XPATH => {
            let xpath = dom::find_child_element(transform, ns::DSIG, ns::node::XPATH)
                .ok_or_else(|| Error::MissingElement("XPath expression element".into()))?;
            let expr = xpath.text().unwrap_or("");
            if SignatureFilterTransform::matches(expr, &xpath) {
                Ok(Box::new(SignatureFilterTransform))
            } else {
                Err(Error::UnsupportedAlgorithm(format!(
                    "XPath expression not supported: {}",
                    expr.trim()
                )))
            }
        }
        _ => Err(Error::UnsupportedAlgorithm(format!("transform: {uri}"))),
    }
}

/// The exclusive C14N `PrefixList` of a transform, if any.
pub fn read_inclusive_prefixes(transform: Node<'_, '_>) -> Vec<String> {
    dom::first_child_element_any_ns(transform, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}
