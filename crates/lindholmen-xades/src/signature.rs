#![forbid(unsafe_code)]

//! Read-only view over one `ds:Signature` and the builder that turns it into
//! a [`SignatureReport`].

use crate::certificate::CertificateSource;
use crate::context::ValidationContext;
use crate::document::DocumentSet;
use crate::level::{self, ProfileFacts, BASELINE, EXTENDED};
use crate::reference::Reference;
use crate::report::SignatureReport;
use crate::resolver::ResolveContext;
use crate::revocation::RevocationSource;
use crate::timestamp::TimestampGraphBuilder;
use crate::validation::ReferenceValidator;
use lindholmen_core::{ns, Error, Result};
use lindholmen_xml::{dom, IdIndex};
use roxmltree::{Document, Node};

/// The first child of `parent` named `local_name` in any XAdES namespace.
pub(crate) fn xades_child<'a, 'input>(parent: Node<'a, 'input>, local_name: &str) -> Option<Node<'a, 'input>> {
    parent
        .children()
        .find(|n| dom::local_name_is(n, &ns::XADES_FAMILY, local_name))
}

/// Every child of `parent` named `local_name` in any XAdES namespace.
pub(crate) fn xades_children<'a, 'input>(parent: Node<'a, 'input>, local_name: &str) -> Vec<Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| dom::local_name_is(n, &ns::XADES_FAMILY, local_name))
        .collect()
}

/// A `ds:Signature` element with the document and id index it lives in.
#[derive(Clone, Copy)]
pub struct XadesSignature<'a, 'input> {
    doc: &'a Document<'input>,
    ids: &'a IdIndex,
    node: Node<'a, 'input>,
}

impl<'a, 'input> XadesSignature<'a, 'input> {
    pub fn new(doc: &'a Document<'input>, ids: &'a IdIndex, node: Node<'a, 'input>) -> Self {
        Self { doc, ids, node }
    }

    pub fn doc(&self) -> &'a Document<'input> {
        self.doc
    }

    pub fn ids(&self) -> &'a IdIndex {
        self.ids
    }

    pub fn node(&self) -> Node<'a, 'input> {
        self.node
    }

    pub fn id(&self) -> Option<&'a str> {
        self.node.attribute(ns::attr::ID)
    }

    pub fn signed_info(&self) -> Option<Node<'a, 'input>> {
        dom::find_child_element(self.node, ns::DSIG, ns::node::SIGNED_INFO)
    }

    pub fn signature_value(&self) -> Option<Node<'a, 'input>> {
        dom::find_child_element(self.node, ns::DSIG, ns::node::SIGNATURE_VALUE)
    }

    pub fn signature_value_id(&self) -> Option<&'a str> {
        self.signature_value().and_then(|n| n.attribute(ns::attr::ID))
    }

    pub fn key_info(&self) -> Option<Node<'a, 'input>> {
        dom::find_child_element(self.node, ns::DSIG, ns::node::KEY_INFO)
    }

    pub fn key_info_count(&self) -> usize {
        dom::find_child_elements(self.node, ns::DSIG, ns::node::KEY_INFO).len()
    }

    pub fn canonicalization_method(&self) -> Option<&'a str> {
        self.signed_info()
            .and_then(|si| dom::find_child_element(si, ns::DSIG, ns::node::CANONICALIZATION_METHOD))
            .and_then(|n| n.attribute(ns::attr::ALGORITHM))
    }

    pub fn canonicalization_method_count(&self) -> usize {
        self.signed_info()
            .map(|si| dom::find_child_elements(si, ns::DSIG, ns::node::CANONICALIZATION_METHOD).len())
            .unwrap_or(0)
    }

    pub fn signature_method(&self) -> Option<&'a str> {
        self.signed_info()
            .and_then(|si| dom::find_child_element(si, ns::DSIG, ns::node::SIGNATURE_METHOD))
            .and_then(|n| n.attribute(ns::attr::ALGORITHM))
    }

    pub fn reference_nodes(&self) -> Vec<Node<'a, 'input>> {
        self.signed_info()
            .map(|si| dom::find_child_elements(si, ns::DSIG, ns::node::REFERENCE))
            .unwrap_or_default()
    }

    /// Parse every `ds:Reference` of `SignedInfo` in declaration order.
    pub fn references(&self, documents: &DocumentSet) -> Result<Vec<Reference>> {
        let signed_info = self
            .signed_info()
            .ok_or_else(|| Error::MissingElement("Signature/SignedInfo".into()))?;
        dom::find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE)
            .into_iter()
            .map(|node| Reference::parse(node, self.doc, self.ids, documents))
            .collect()
    }

    pub fn objects(&self) -> Vec<Node<'a, 'input>> {
        dom::find_child_elements(self.node, ns::DSIG, ns::node::OBJECT)
    }

    /// The `QualifyingProperties` targeting this signature, or the first one
    /// when the signature has no id.
    pub fn qualifying_properties(&self) -> Option<Node<'a, 'input>> {
        let candidates: Vec<Node<'a, 'input>> = self
            .objects()
            .into_iter()
            .flat_map(|o| xades_children(o, ns::xades::QUALIFYING_PROPERTIES))
            .collect();
        let target = self.id().map(|id| format!("#{id}"));
        candidates
            .iter()
            .copied()
            .find(|qp| target.is_some() && qp.attribute(ns::attr::TARGET) == target.as_deref())
            .or_else(|| candidates.first().copied())
    }

    /// The namespace of `QualifyingProperties`, XAdES 1.3.2 when absent.
    pub fn xades_namespace(&self) -> &'a str {
        self.qualifying_properties()
            .and_then(|qp| qp.tag_name().namespace())
            .unwrap_or(ns::XADES_132)
    }

    pub fn signed_properties(&self) -> Option<Node<'a, 'input>> {
        self.qualifying_properties()
            .and_then(|qp| xades_child(qp, ns::xades::SIGNED_PROPERTIES))
    }

    pub fn signed_signature_properties(&self) -> Option<Node<'a, 'input>> {
        self.signed_properties()
            .and_then(|sp| xades_child(sp, ns::xades::SIGNED_SIGNATURE_PROPERTIES))
    }

    pub fn signed_data_object_properties(&self) -> Option<Node<'a, 'input>> {
        self.signed_properties()
            .and_then(|sp| xades_child(sp, ns::xades::SIGNED_DATA_OBJECT_PROPERTIES))
    }

    pub fn unsigned_properties(&self) -> Option<Node<'a, 'input>> {
        self.qualifying_properties()
            .and_then(|qp| xades_child(qp, ns::xades::UNSIGNED_PROPERTIES))
    }

    pub fn unsigned_signature_properties(&self) -> Option<Node<'a, 'input>> {
        self.unsigned_properties()
            .and_then(|up| xades_child(up, ns::xades::UNSIGNED_SIGNATURE_PROPERTIES))
    }

    /// Child elements of `UnsignedSignatureProperties` in document order.
    pub fn unsigned_signature_property_elements(&self) -> Vec<Node<'a, 'input>> {
        self.unsigned_signature_properties()
            .map(|usp| dom::child_elements(usp).collect())
            .unwrap_or_default()
    }

    pub fn signing_time(&self) -> Option<&'a str> {
        self.signed_signature_properties()
            .and_then(|ssp| xades_child(ssp, ns::xades::SIGNING_TIME))
            .map(dom::element_text)
    }

    /// Embedded counter-signatures: `ds:Signature` children of every
    /// `CounterSignature` property.
    pub fn counter_signatures(&self) -> Vec<Node<'a, 'input>> {
        self.unsigned_signature_properties()
            .map(|usp| {
                xades_children(usp, ns::xades::COUNTER_SIGNATURE)
                    .into_iter()
                    .flat_map(|cs| dom::find_child_elements(cs, ns::DSIG, ns::node::SIGNATURE))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Label for logs.
    pub fn label(&self) -> &'a str {
        self.id().unwrap_or("<anonymous>")
    }
}

impl std::fmt::Debug for XadesSignature<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XadesSignature")
            .field("id", &self.id())
            .field("node", &self.node.id())
            .finish()
    }
}

/// Computes the full report of one signature, once.
pub struct SignatureReportBuilder;

impl SignatureReportBuilder {
    /// Run the validation pipeline over `signature`. `master` is the finished
    /// report of the signature this one counter-signs, if any.
    pub fn build(
        signature: &XadesSignature<'_, '_>,
        ctx: &ValidationContext,
        master: Option<&SignatureReport>,
    ) -> Result<SignatureReport> {
        let rctx = ResolveContext {
            doc: signature.doc(),
            ids: signature.ids(),
            signature: signature.node(),
            documents: &ctx.documents,
            counter_signed: ctx.counter_signed_document.as_ref(),
            master_signature_value: master.and_then(|m| m.signature_value_id.as_deref()),
        };
        let references = ReferenceValidator::new(&ctx.resolvers).validate_all(signature, &rctx)?;

        let mut errors = Vec::new();
        let certificates = CertificateSource::from_signature(signature, &mut errors);
        let revocations = RevocationSource::from_signature(signature, &mut errors);

        let timestamps = TimestampGraphBuilder::new(*signature, &references, &certificates, &revocations)
            .with_default_canonicalization(ctx.default_canonicalization)
            .with_archive_objects(ctx.archive_objects)
            .build(&mut errors);

        let facts = ProfileFacts::collect(
            signature,
            ctx,
            &references,
            &certificates,
            &revocations,
            &timestamps,
        );
        let level = level::classify(&facts);
        log::info!("signature {}: {level}", signature.label());

        Ok(SignatureReport {
            id: signature.id().map(str::to_owned),
            master_id: master.and_then(|m| m.id.clone()),
            signature_value_id: signature.signature_value_id().map(str::to_owned),
            xades_namespace: signature
                .qualifying_properties()
                .map(|_| signature.xades_namespace().to_owned()),
            signing_time: signature.signing_time().map(str::to_owned),
            signature_method: signature.signature_method().map(str::to_owned),
            canonicalization_method: signature.canonicalization_method().map(str::to_owned),
            reference_data_found: references.all_found(),
            reference_data_intact: references.all_intact(),
            references: references.validations,
            certificates,
            revocations,
            timestamps,
            level,
            baseline_predicates: BASELINE.evaluate(&facts),
            extended_predicates: EXTENDED.evaluate(&facts),
            errors,
        })
    }
}
