#![forbid(unsafe_code)]

//! Reference dereferencing.
//!
//! A [`ResolverChain`] holds resolvers in priority order; the first one that
//! handles a reference and finds (or finds ambiguous) content wins. The
//! standard order is:
//!
//! 1. empty URI with a single detached document
//! 2. detached document by name
//! 3. same-document element by id
//! 4. XPointer
//! 5. counter-signed `SignatureValue`

use crate::document::{DocumentSet, DocumentSource};
use crate::reference::Reference;
use lindholmen_c14n::C14nMode;
use lindholmen_core::{ns, Result};
use lindholmen_crypto::DigestMethod;
use lindholmen_xml::xpath::{self, XPointer};
use lindholmen_xml::{dom, IdIndex, IdLookup, NodeSet, XmlDocument};
use roxmltree::{Document, Node, NodeId};

/// Dereferenced content.
#[derive(Debug, Clone)]
pub enum ResolvedContent {
    /// Octets of a detached document.
    Document { bytes: Vec<u8> },
    /// A precomputed digest of a digest-only document.
    Digest { method: DigestMethod, value: Vec<u8> },
    /// A node subset of the owning document.
    NodeSet(NodeSet),
    /// One element of the owning document; comments excluded.
    Element(NodeId),
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(ResolvedContent),
    NotFound,
    /// The id is carried by this many elements.
    Ambiguous(usize),
}

/// What a resolver may look at.
pub struct ResolveContext<'a, 'input> {
    pub doc: &'a Document<'input>,
    pub ids: &'a IdIndex,
    /// The `ds:Signature` owning the reference.
    pub signature: Node<'a, 'input>,
    pub documents: &'a DocumentSet,
    pub counter_signed: Option<&'a XmlDocument>,
    /// Id of the master's `SignatureValue`, for counter-signatures.
    pub master_signature_value: Option<&'a str>,
}

/// A single dereferencing strategy.
pub trait ReferenceResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> bool;

    fn resolve(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> Result<Resolution>;
}

/// Resolvers in priority order.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ReferenceResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Box<dyn ReferenceResolver>>) -> Self {
        Self { resolvers }
    }

    /// The five standard resolvers in their standard order.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(EmptyUriResolver),
            Box::new(DetachedResolver),
            Box::new(SameDocumentResolver),
            Box::new(XPointerResolver),
            Box::new(CounterSignatureResolver),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Try every resolver that handles `reference` until one finds content.
    pub fn resolve(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> Result<Resolution> {
        for resolver in &self.resolvers {
            if !resolver.can_handle(reference, ctx) {
                continue;
            }
            match resolver.resolve(reference, ctx)? {
                Resolution::NotFound => {
                    log::trace!("{} could not resolve {}", resolver.name(), reference.label());
                }
                found => {
                    log::debug!("{} resolved {}", resolver.name(), reference.label());
                    return Ok(found);
                }
            }
        }
        Ok(Resolution::NotFound)
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn uri_of(reference: &Reference) -> &str {
    reference.uri.as_deref().unwrap_or("")
}

/// Bytes when the source has them, else its digest under the reference's
/// method.
fn detached_content(source: &dyn DocumentSource, reference: &Reference) -> Resolution {
    if let Some(bytes) = source.bytes() {
        return Resolution::Found(ResolvedContent::Document {
            bytes: bytes.to_vec(),
        });
    }
    let Ok(method) = reference.digest_method() else {
        return Resolution::NotFound;
    };
    match source.digest(method) {
        Some(value) => Resolution::Found(ResolvedContent::Digest { method, value }),
        None => Resolution::NotFound,
    }
}

fn lookup(ctx: &ResolveContext<'_, '_>, id: &str) -> Resolution {
    match ctx.ids.lookup(id) {
        IdLookup::Unique(node) => Resolution::Found(ResolvedContent::Element(node)),
        IdLookup::Duplicated(count) => {
            log::warn!("id {id} is carried by {count} elements");
            Resolution::Ambiguous(count)
        }
        IdLookup::Missing => Resolution::NotFound,
    }
}

/// `URI=""`: the single detached document, or the owning document without
/// comments when nothing is detached.
pub struct EmptyUriResolver;

impl ReferenceResolver for EmptyUriResolver {
    fn name(&self) -> &'static str {
        "empty-uri"
    }

    fn can_handle(&self, reference: &Reference, _ctx: &ResolveContext<'_, '_>) -> bool {
        uri_of(reference).is_empty()
    }

    fn resolve(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> Result<Resolution> {
        if ctx.documents.is_empty() {
            return Ok(Resolution::Found(ResolvedContent::NodeSet(NodeSet::document(
                ctx.doc, false,
            ))));
        }
        Ok(match ctx.documents.single() {
            Some(source) => detached_content(source, reference),
            None => Resolution::NotFound,
        })
    }
}

/// A detached document named by the URI.
pub struct DetachedResolver;

impl ReferenceResolver for DetachedResolver {
    fn name(&self) -> &'static str {
        "detached"
    }

    fn can_handle(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> bool {
        let uri = uri_of(reference);
        !uri.is_empty() && !uri.starts_with('#') && !ctx.documents.is_empty()
    }

    fn resolve(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> Result<Resolution> {
        Ok(match ctx.documents.find_by_name(uri_of(reference)) {
            Some(source) => detached_content(source, reference),
            None => Resolution::NotFound,
        })
    }
}

/// `#id`: the element carrying the id in the owning document.
pub struct SameDocumentResolver;

impl ReferenceResolver for SameDocumentResolver {
    fn name(&self) -> &'static str {
        "same-document"
    }

    fn can_handle(&self, reference: &Reference, _ctx: &ResolveContext<'_, '_>) -> bool {
        xpath::parse_same_document_ref(uri_of(reference)).is_some()
            && reference.type_hint.as_deref() != Some(ns::reference_type::COUNTERSIGNED_SIGNATURE)
    }

    fn resolve(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> Result<Resolution> {
        Ok(match xpath::parse_same_document_ref(uri_of(reference)) {
            Some(id) => lookup(ctx, id),
            None => Resolution::NotFound,
        })
    }
}

/// `#xpointer(/)` and `#xpointer(id('x'))`; comments are kept.
pub struct XPointerResolver;

impl ReferenceResolver for XPointerResolver {
    fn name(&self) -> &'static str {
        "xpointer"
    }

    fn can_handle(&self, reference: &Reference, _ctx: &ResolveContext<'_, '_>) -> bool {
        xpath::is_xpointer(uri_of(reference))
    }

    fn resolve(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> Result<Resolution> {
        let resolution = match xpath::parse_xpointer(uri_of(reference)) {
            Some(XPointer::Root) => {
                Resolution::Found(ResolvedContent::NodeSet(NodeSet::document(ctx.doc, true)))
            }
            Some(XPointer::Id(id)) => match lookup(ctx, id) {
                Resolution::Found(ResolvedContent::Element(node_id)) => match ctx.doc.get_node(node_id) {
                    Some(node) => Resolution::Found(ResolvedContent::NodeSet(NodeSet::tree(node, true))),
                    None => Resolution::NotFound,
                },
                other => other,
            },
            None => {
                log::warn!("unsupported XPointer expression {}", uri_of(reference));
                Resolution::NotFound
            }
        };
        Ok(resolution)
    }
}

/// The master `SignatureValue` a counter-signature signs, in the owning
/// document or in a separately supplied counter-signed document.
pub struct CounterSignatureResolver;

impl ReferenceResolver for CounterSignatureResolver {
    fn name(&self) -> &'static str {
        "counter-signature"
    }

    fn can_handle(&self, reference: &Reference, _ctx: &ResolveContext<'_, '_>) -> bool {
        reference.type_hint.as_deref() == Some(ns::reference_type::COUNTERSIGNED_SIGNATURE)
            && reference.target_id().is_some()
    }

    fn resolve(&self, reference: &Reference, ctx: &ResolveContext<'_, '_>) -> Result<Resolution> {
        let Some(id) = reference.target_id() else {
            return Ok(Resolution::NotFound);
        };
        if ctx.master_signature_value.is_some_and(|master| master != id) {
            log::warn!("counter-signature reference {id} does not name its master's SignatureValue");
            return Ok(Resolution::NotFound);
        }
        match ctx.ids.lookup(id) {
            IdLookup::Unique(node_id) => {
                let is_signature_value = ctx
                    .doc
                    .get_node(node_id)
                    .is_some_and(|n| dom::is_element(&n, ns::DSIG, ns::node::SIGNATURE_VALUE));
                if is_signature_value {
                    return Ok(Resolution::Found(ResolvedContent::Element(node_id)));
                }
            }
            IdLookup::Duplicated(count) => return Ok(Resolution::Ambiguous(count)),
            IdLookup::Missing => {}
        }

        let Some(counter_signed) = ctx.counter_signed else {
            return Ok(Resolution::NotFound);
        };
        let doc = counter_signed.parse_doc()?;
        let index = counter_signed.id_index(&doc);
        match index.lookup(id) {
            IdLookup::Unique(node_id) => match doc.get_node(node_id) {
                Some(node) if dom::is_element(&node, ns::DSIG, ns::node::SIGNATURE_VALUE) => {
                    let bytes = lindholmen_c14n::canonicalize_subtree(node, C14nMode::Inclusive, &[])?;
                    Ok(Resolution::Found(ResolvedContent::Document { bytes }))
                }
                _ => Ok(Resolution::NotFound),
            },
            IdLookup::Duplicated(count) => Ok(Resolution::Ambiguous(count)),
            IdLookup::Missing => Ok(Resolution::NotFound),
        }
    }
}
