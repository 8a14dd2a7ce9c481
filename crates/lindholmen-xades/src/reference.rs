#![forbid(unsafe_code)]

//! `ds:Reference` parsing and semantic classification.

use crate::document::DocumentSet;
use lindholmen_core::{ns, Error, Result};
use lindholmen_crypto::encoding::decode_base64_lenient;
use lindholmen_crypto::DigestMethod;
use lindholmen_xml::{dom, xpath, IdIndex};
use roxmltree::{Document, Node, NodeId};
use serde::Serialize;

/// What a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceKind {
    SignedProperties,
    KeyInfo,
    SignatureProperties,
    Manifest,
    Object,
    CounterSignature,
    XPointer,
    WholeDocument,
    DetachedDocument,
    SignedData,
}

impl ReferenceKind {
    /// True for references to signed content rather than to signature
    /// structure.
    pub fn is_signed_data(&self) -> bool {
        !matches!(
            self,
            Self::SignedProperties | Self::KeyInfo | Self::SignatureProperties | Self::CounterSignature
        )
    }
}

/// A parsed `ds:Reference`.
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: Option<String>,
    pub uri: Option<String>,
    pub type_hint: Option<String>,
    pub digest_method_uri: String,
    pub digest_value: Vec<u8>,
    pub transform_count: usize,
    /// The `ds:Reference` element.
    pub node: NodeId,
    /// The in-document element the URI names, when it names exactly one.
    pub target: Option<NodeId>,
    pub kind: ReferenceKind,
}

impl Reference {
    /// Parse a `ds:Reference` element of `doc`.
    pub fn parse(
        node: Node<'_, '_>,
        doc: &Document<'_>,
        ids: &IdIndex,
        documents: &DocumentSet,
    ) -> Result<Self> {
        let digest_method_uri = dom::find_child_element(node, ns::DSIG, ns::node::DIGEST_METHOD)
            .ok_or_else(|| Error::MissingElement("Reference/DigestMethod".into()))?
            .attribute(ns::attr::ALGORITHM)
            .ok_or_else(|| Error::MissingAttribute("DigestMethod/@Algorithm".into()))?
            .to_owned();
        let digest_value = dom::find_child_element(node, ns::DSIG, ns::node::DIGEST_VALUE)
            .ok_or_else(|| Error::MissingElement("Reference/DigestValue".into()))?;
        let digest_value = decode_base64_lenient(dom::element_text(digest_value))?;
        let transform_count = dom::find_child_element(node, ns::DSIG, ns::node::TRANSFORMS)
            .map(|t| dom::find_child_elements(t, ns::DSIG, ns::node::TRANSFORM).len())
            .unwrap_or(0);

        let uri = node.attribute(ns::attr::URI).map(str::to_owned);
        let type_hint = node.attribute(ns::attr::TYPE).map(str::to_owned);
        let target = uri
            .as_deref()
            .and_then(xpath::target_id)
            .and_then(|id| ids.unique(doc, id));
        let kind = Self::classify(
            uri.as_deref(),
            type_hint.as_deref(),
            target,
            !documents.is_empty(),
        );

        Ok(Self {
            id: node.attribute(ns::attr::ID).map(str::to_owned),
            uri,
            type_hint,
            digest_method_uri,
            digest_value,
            transform_count,
            node: node.id(),
            target: target.map(|t| t.id()),
            kind,
        })
    }

    /// Classify from URI shape, type hint and the element the URI names.
    pub fn classify(
        uri: Option<&str>,
        type_hint: Option<&str>,
        target: Option<Node<'_, '_>>,
        has_detached: bool,
    ) -> ReferenceKind {
        let target_is = |namespaces: &[&str], name: &str| {
            target.is_some_and(|t| dom::local_name_is(&t, namespaces, name))
        };

        if type_hint == Some(ns::reference_type::SIGNED_PROPERTIES)
            || target_is(&ns::XADES_FAMILY, ns::xades::SIGNED_PROPERTIES)
        {
            return ReferenceKind::SignedProperties;
        }
        if type_hint == Some(ns::reference_type::COUNTERSIGNED_SIGNATURE) {
            return ReferenceKind::CounterSignature;
        }
        if type_hint == Some(ns::reference_type::MANIFEST) || target_is(&[ns::DSIG], ns::node::MANIFEST) {
            return ReferenceKind::Manifest;
        }

        let uri = uri.unwrap_or("");
        if uri.is_empty() {
            return if has_detached {
                ReferenceKind::DetachedDocument
            } else {
                ReferenceKind::WholeDocument
            };
        }
        if xpath::is_xpointer(uri) {
            return ReferenceKind::XPointer;
        }
        if !uri.starts_with('#') {
            return ReferenceKind::DetachedDocument;
        }
        if target_is(&[ns::DSIG], ns::node::KEY_INFO) {
            return ReferenceKind::KeyInfo;
        }
        if type_hint == Some(ns::reference_type::SIGNATURE_PROPERTIES)
            || target_is(&[ns::DSIG], ns::node::SIGNATURE_PROPERTIES)
        {
            return ReferenceKind::SignatureProperties;
        }
        if type_hint == Some(ns::reference_type::OBJECT) || target_is(&[ns::DSIG], ns::node::OBJECT) {
            return ReferenceKind::Object;
        }
        ReferenceKind::SignedData
    }

    pub fn digest_method(&self) -> Result<DigestMethod> {
        DigestMethod::from_uri(&self.digest_method_uri)
    }

    /// The id named by the URI, bare-name or `xpointer(id(..))`.
    pub fn target_id(&self) -> Option<&str> {
        self.uri.as_deref().and_then(xpath::target_id)
    }

    /// The `ds:Transforms` child, if any.
    pub fn transforms_element<'a, 'input>(
        &self,
        doc: &'a Document<'input>,
    ) -> Option<Node<'a, 'input>> {
        doc.get_node(self.node)
            .and_then(|n| dom::find_child_element(n, ns::DSIG, ns::node::TRANSFORMS))
    }

    /// Label for logs and errors.
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.uri.as_deref())
            .unwrap_or("<anonymous>")
    }
}
