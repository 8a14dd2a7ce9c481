#![forbid(unsafe_code)]

//! Adding timestamps to an existing signature.
//!
//! The extender never touches a parsed tree: it builds the data for the new
//! token from a fresh parse, asks a [`TokenSigner`] for the token and splices
//! the new property element into the source text.

use crate::context::ValidationContext;
use crate::resolver::ResolveContext;
use crate::signature::XadesSignature;
use crate::timestamp::{ArchiveRevision, TimestampDataBuilder, TimestampType};
use crate::validation::ReferenceValidator;
use lindholmen_c14n::C14nMode;
use lindholmen_core::{ns, Error, Result};
use lindholmen_crypto::encoding::encode_base64;
use lindholmen_crypto::DigestMethod;
use lindholmen_xml::{dom, IdIndex};
use roxmltree::{Document, Node};

/// A time-stamping authority.
pub trait TokenSigner {
    /// A DER `ContentInfo` holding a timestamp token over `digest`.
    fn timestamp(&self, digest_method: DigestMethod, digest: &[u8]) -> Result<Vec<u8>>;
}

/// Adds timestamps to one signature of a document.
pub struct SignatureExtender<'s> {
    signer: &'s dyn TokenSigner,
    ctx: &'s ValidationContext,
    digest_method: DigestMethod,
    canonicalization: C14nMode,
    signature_id: Option<String>,
}

impl<'s> SignatureExtender<'s> {
    /// Extends the first signature of a document, digesting with SHA-256
    /// over exclusive C14N.
    pub fn new(signer: &'s dyn TokenSigner, ctx: &'s ValidationContext) -> Self {
        Self {
            signer,
            ctx,
            digest_method: DigestMethod::Sha256,
            canonicalization: C14nMode::Exclusive,
            signature_id: None,
        }
    }

    pub fn with_digest_method(mut self, digest_method: DigestMethod) -> Self {
        self.digest_method = digest_method;
        self
    }

    pub fn with_canonicalization(mut self, mode: C14nMode) -> Self {
        self.canonicalization = mode;
        self
    }

    /// Extend the signature with this `Id` instead of the first one.
    pub fn for_signature(mut self, id: impl Into<String>) -> Self {
        self.signature_id = Some(id.into());
        self
    }

    fn find_signature<'a, 'input>(&self, doc: &'a Document<'input>) -> Result<Node<'a, 'input>> {
        dom::find_elements(doc, ns::DSIG, ns::node::SIGNATURE)
            .into_iter()
            .find(|n| match &self.signature_id {
                Some(id) => n.attribute(ns::attr::ID) == Some(id.as_str()),
                None => true,
            })
            .ok_or_else(|| match &self.signature_id {
                Some(id) => Error::MissingElement(format!("Signature with Id {id}")),
                None => Error::MissingElement("Signature".into()),
            })
    }

    fn data_in(&self, signature: &XadesSignature<'_, '_>, timestamp_type: TimestampType) -> Result<Vec<u8>> {
        let rctx = ResolveContext {
            doc: signature.doc(),
            ids: signature.ids(),
            signature: signature.node(),
            documents: &self.ctx.documents,
            counter_signed: self.ctx.counter_signed_document.as_ref(),
            master_signature_value: None,
        };
        let references = ReferenceValidator::new(&self.ctx.resolvers).validate_all(signature, &rctx)?;
        let builder = TimestampDataBuilder::new(*signature, &references, self.ctx.archive_objects);
        let mode = self.canonicalization;
        match timestamp_type {
            TimestampType::Signature => builder.signature_data(mode),
            TimestampType::SigAndRefs => builder.sig_and_refs(None, false, mode),
            TimestampType::RefsOnly => builder.refs_only(None, false, mode),
            TimestampType::Archive => builder.archive(None, ArchiveRevision::Xades141, mode),
            TimestampType::AllDataObjects | TimestampType::IndividualDataObjects => Err(Error::TimestampData(
                "content timestamps are signed properties and cannot be added afterwards".into(),
            )),
        }
    }

    /// The octets a new timestamp of `timestamp_type` would cover.
    pub fn data_for_new_timestamp(&self, xml: &str, timestamp_type: TimestampType) -> Result<Vec<u8>> {
        let doc = lindholmen_xml::parse(xml)?;
        let ids = IdIndex::build(&doc, &self.ctx.id_attrs);
        let signature = XadesSignature::new(&doc, &ids, self.find_signature(&doc)?);
        self.data_in(&signature, timestamp_type)
    }

    pub fn add_signature_timestamp(&self, xml: &str) -> Result<String> {
        self.add(xml, TimestampType::Signature)
    }

    pub fn add_sig_and_refs_timestamp(&self, xml: &str) -> Result<String> {
        self.add(xml, TimestampType::SigAndRefs)
    }

    pub fn add_refs_only_timestamp(&self, xml: &str) -> Result<String> {
        self.add(xml, TimestampType::RefsOnly)
    }

    pub fn add_archive_timestamp(&self, xml: &str) -> Result<String> {
        self.add(xml, TimestampType::Archive)
    }

    fn add(&self, xml: &str, timestamp_type: TimestampType) -> Result<String> {
        let doc = lindholmen_xml::parse(xml)?;
        let ids = IdIndex::build(&doc, &self.ctx.id_attrs);
        let signature = XadesSignature::new(&doc, &ids, self.find_signature(&doc)?);
        let qualifying_properties = signature
            .qualifying_properties()
            .ok_or_else(|| Error::MissingElement("QualifyingProperties".into()))?;

        let data = self.data_in(&signature, timestamp_type)?;
        let digest = self.digest_method.digest(&data)?;
        let token = self.signer.timestamp(self.digest_method, &digest)?;
        let element = self.property_element(qualifying_properties, timestamp_type, &token)?;

        let prefix = name_prefix(qualifying_properties);
        let out = match (signature.unsigned_properties(), signature.unsigned_signature_properties()) {
            (_, Some(usp)) => insert_child(xml, usp, &element, false)?,
            (Some(up), None) => {
                let usp = wrap(&prefix, ns::xades::UNSIGNED_SIGNATURE_PROPERTIES, &element);
                insert_child(xml, up, &usp, true)?
            }
            (None, None) => {
                let usp = wrap(&prefix, ns::xades::UNSIGNED_SIGNATURE_PROPERTIES, &element);
                let up = wrap(&prefix, ns::xades::UNSIGNED_PROPERTIES, &usp);
                insert_child(xml, qualifying_properties, &up, false)?
            }
        };
        lindholmen_xml::parse(&out)?;
        log::info!(
            "added {timestamp_type:?} timestamp to signature {} over {} octets",
            signature.label(),
            data.len()
        );
        Ok(out)
    }

    fn property_element(
        &self,
        qualifying_properties: Node<'_, '_>,
        timestamp_type: TimestampType,
        token: &[u8],
    ) -> Result<String> {
        let prefix = name_prefix(qualifying_properties);
        let (name, declaration) = match timestamp_type {
            TimestampType::Signature => (format!("{prefix}{}", ns::xades::SIGNATURE_TIMESTAMP), String::new()),
            TimestampType::SigAndRefs => (format!("{prefix}{}", ns::xades::SIG_AND_REFS_TIMESTAMP), String::new()),
            TimestampType::RefsOnly => (format!("{prefix}{}", ns::xades::REFS_ONLY_TIMESTAMP), String::new()),
            TimestampType::Archive => (
                format!("xades141:{}", ns::xades::ARCHIVE_TIMESTAMP),
                format!(r#" xmlns:xades141="{}""#, ns::XADES_141),
            ),
            TimestampType::AllDataObjects | TimestampType::IndividualDataObjects => {
                return Err(Error::TimestampData("not an unsigned timestamp".into()))
            }
        };
        let id = hex::encode(DigestMethod::Sha256.digest(token)?);
        Ok(format!(
            r#"<{name}{declaration} Id="TS-{id}"><ds:CanonicalizationMethod xmlns:ds="{ds}" Algorithm="{algorithm}"/><{prefix}{encapsulated}>{token}</{prefix}{encapsulated}></{name}>"#,
            id = &id[..16],
            ds = ns::DSIG,
            algorithm = self.canonicalization.uri(),
            encapsulated = ns::xades::ENCAPSULATED_TIMESTAMP,
            token = encode_base64(token),
        ))
    }
}

/// `prefix:` as written on `node`, empty when it has none.
fn name_prefix(node: Node<'_, '_>) -> String {
    match dom::element_prefix(node) {
        "" => String::new(),
        p => format!("{p}:"),
    }
}

fn wrap(prefix: &str, local_name: &str, content: &str) -> String {
    format!("<{prefix}{local_name}>{content}</{prefix}{local_name}>")
}

/// Insert `child` into `parent` as its first or last child, expanding a
/// self-closing parent.
fn insert_child(text: &str, parent: Node<'_, '_>, child: &str, first: bool) -> Result<String> {
    let range = parent.range();
    let source = text
        .get(range.clone())
        .ok_or_else(|| Error::XmlStructure("element range outside the document".into()))?;
    let mut out = String::with_capacity(text.len() + child.len() + 64);

    if !parent.has_children() && source.ends_with("/>") {
        out.push_str(&text[..range.start]);
        out.push_str(source[..source.len() - 2].trim_end());
        out.push('>');
        out.push_str(child);
        out.push_str("</");
        out.push_str(dom::qualified_name(parent));
        out.push('>');
        out.push_str(&text[range.end..]);
        return Ok(out);
    }

    let first_child = if first { parent.first_child().map(|c| c.range().start) } else { None };
    let at = first_child
        .or_else(|| source.rfind("</").map(|p| range.start + p))
        .ok_or_else(|| Error::XmlStructure(format!("no end tag for {}", parent.tag_name().name())))?;
    out.push_str(&text[..at]);
    out.push_str(child);
    out.push_str(&text[at..]);
    Ok(out)
}
