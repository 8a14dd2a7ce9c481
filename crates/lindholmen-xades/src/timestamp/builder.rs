#![forbid(unsafe_code)]

//! Reconstruction of the octets each class of timestamp covers.
//!
//! Every method works in two modes. With an existing token it rebuilds the
//! data that token was computed over, stopping the walk over unsigned
//! properties at the token's own element. With `None` it builds the data
//! for a token about to be added, covering every unsigned property present.

use super::{structural_hash, ArchiveRevision, Include, TimestampToken, TimestampType};
use crate::context::ArchiveObjectPolicy;
use crate::reference::ReferenceKind;
use crate::signature::{xades_child, XadesSignature};
use crate::validation::ReferenceValidations;
use lindholmen_c14n::C14nMode;
use lindholmen_core::{ns, Error, Result};
use lindholmen_xml::{dom, xpath};
use roxmltree::Node;

const SIG_AND_REFS_V1: [&str; 5] = [
    ns::xades::SIGNATURE_TIMESTAMP,
    ns::xades::COMPLETE_CERTIFICATE_REFS,
    ns::xades::COMPLETE_REVOCATION_REFS,
    ns::xades::ATTRIBUTE_CERTIFICATE_REFS,
    ns::xades::ATTRIBUTE_REVOCATION_REFS,
];

const SIG_AND_REFS_V2: [&str; 5] = [
    ns::xades::SIGNATURE_TIMESTAMP,
    ns::xades::COMPLETE_CERTIFICATE_REFS_V2,
    ns::xades::COMPLETE_REVOCATION_REFS,
    ns::xades::ATTRIBUTE_CERTIFICATE_REFS_V2,
    ns::xades::ATTRIBUTE_REVOCATION_REFS,
];

/// Builds timestamp data for one signature.
pub struct TimestampDataBuilder<'a, 'input> {
    signature: XadesSignature<'a, 'input>,
    references: &'a ReferenceValidations,
    archive_objects: ArchiveObjectPolicy,
}

impl<'a, 'input> TimestampDataBuilder<'a, 'input> {
    pub fn new(
        signature: XadesSignature<'a, 'input>,
        references: &'a ReferenceValidations,
        archive_objects: ArchiveObjectPolicy,
    ) -> Self {
        Self {
            signature,
            references,
            archive_objects,
        }
    }

    /// The data `token` covers, per its class.
    pub fn data_for(&self, token: &TimestampToken) -> Result<Vec<u8>> {
        let mode = token.c14n_mode()?;
        match token.timestamp_type {
            TimestampType::AllDataObjects => self.content_all(mode),
            TimestampType::IndividualDataObjects => self.content_individual(&token.includes, mode),
            TimestampType::Signature => self.signature_data(mode),
            TimestampType::SigAndRefs => self.sig_and_refs(Some(token), token.is_v2(), mode),
            TimestampType::RefsOnly => self.refs_only(Some(token), token.is_v2(), mode),
            TimestampType::Archive => self.archive(
                Some(token),
                token.archive_revision.unwrap_or(ArchiveRevision::Xades141),
                mode,
            ),
        }
    }

    /// Every reference except the one to `SignedProperties`, in reference
    /// order.
    pub fn content_all(&self, mode: C14nMode) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        for (index, reference) in self.references.references.iter().enumerate() {
            if reference.kind == ReferenceKind::SignedProperties {
                continue;
            }
            data.extend(self.references.bytes_for(index, self.signature.doc(), mode)?);
        }
        Ok(data)
    }

    /// The references named by `includes`, in reference order, each at most
    /// once. An include flagged as not referenced data, or naming no signed
    /// reference, fails the whole computation.
    pub fn content_individual(&self, includes: &[Include], mode: C14nMode) -> Result<Vec<u8>> {
        let mut included = Vec::with_capacity(includes.len());
        for include in includes {
            if !include.referenced_data {
                return Err(Error::TimestampData(format!(
                    "include {} is not marked as referenced data",
                    include.uri
                )));
            }
            let index = xpath::parse_same_document_ref(&include.uri)
                .and_then(|id| self.references.position_of(id))
                .ok_or_else(|| {
                    Error::TimestampData(format!("include {} names no signed reference", include.uri))
                })?;
            included.push(index);
        }
        let mut data = Vec::new();
        for index in 0..self.references.references.len() {
            if included.contains(&index) {
                data.extend(self.references.bytes_for(index, self.signature.doc(), mode)?);
            }
        }
        Ok(data)
    }

    /// The canonicalized `ds:SignatureValue`.
    pub fn signature_data(&self, mode: C14nMode) -> Result<Vec<u8>> {
        let value = self
            .signature
            .signature_value()
            .ok_or_else(|| Error::MissingElement("Signature/SignatureValue".into()))?;
        lindholmen_c14n::canonicalize_subtree(value, mode, &[])
    }

    /// `SignatureValue`, then the signature timestamps and refs properties
    /// preceding `token`, in document order.
    pub fn sig_and_refs(&self, token: Option<&TimestampToken>, v2: bool, mode: C14nMode) -> Result<Vec<u8>> {
        let names = if v2 { &SIG_AND_REFS_V2 } else { &SIG_AND_REFS_V1 };
        let mut data = self.signature_data(mode)?;
        data.extend(self.preceding_properties(token, mode, |n| is_one_of(n, names))?);
        Ok(data)
    }

    /// The refs properties preceding `token`, in document order.
    pub fn refs_only(&self, token: Option<&TimestampToken>, v2: bool, mode: C14nMode) -> Result<Vec<u8>> {
        let names = if v2 { &SIG_AND_REFS_V2[1..] } else { &SIG_AND_REFS_V1[1..] };
        self.preceding_properties(token, mode, |n| is_one_of(n, names))
    }

    /// References, `SignedInfo`, `SignatureValue`, `KeyInfo`, every unsigned
    /// property preceding `token`, then the unreferenced `ds:Object`s when
    /// `revision` covers them.
    pub fn archive(
        &self,
        token: Option<&TimestampToken>,
        revision: ArchiveRevision,
        mode: C14nMode,
    ) -> Result<Vec<u8>> {
        let doc = self.signature.doc();
        let mut data = Vec::new();
        for index in 0..self.references.references.len() {
            data.extend(self.references.bytes_for(index, doc, mode)?);
        }

        let signed_info = self
            .signature
            .signed_info()
            .ok_or_else(|| Error::MissingElement("Signature/SignedInfo".into()))?;
        data.extend(lindholmen_c14n::canonicalize_subtree(signed_info, mode, &[])?);
        data.extend(self.signature_data(mode)?);
        if let Some(key_info) = self.signature.key_info() {
            data.extend(lindholmen_c14n::canonicalize_subtree(key_info, mode, &[])?);
        }

        data.extend(self.preceding_properties(token, mode, |_| true)?);

        if self.archive_objects.includes_objects(revision) {
            for object in self.unreferenced_objects() {
                data.extend(lindholmen_c14n::canonicalize_subtree(object, mode, &[])?);
            }
        }
        Ok(data)
    }

    /// Canonicalized `UnsignedSignatureProperties` children accepted by
    /// `select`, stopping at the element of `token`.
    fn preceding_properties(
        &self,
        token: Option<&TimestampToken>,
        mode: C14nMode,
        select: impl Fn(&Node<'_, '_>) -> bool,
    ) -> Result<Vec<u8>> {
        let usp = self
            .signature
            .unsigned_signature_properties()
            .ok_or_else(|| Error::MissingElement("UnsignedSignatureProperties".into()))?;
        let mut data = Vec::new();
        for property in dom::child_elements(usp) {
            if let Some(token) = token {
                if structural_hash(property)? == token.structural_hash {
                    break;
                }
            }
            if select(&property) {
                data.extend(lindholmen_c14n::canonicalize_subtree(property, mode, &[])?);
            }
        }
        Ok(data)
    }

    /// `ds:Object`s that neither hold `QualifyingProperties` nor are the
    /// target of a reference.
    fn unreferenced_objects(&self) -> Vec<Node<'a, 'input>> {
        self.signature
            .objects()
            .into_iter()
            .filter(|object| xades_child(*object, ns::xades::QUALIFYING_PROPERTIES).is_none())
            .filter(|object| {
                let id = object.attribute(ns::attr::ID);
                !self
                    .references
                    .references
                    .iter()
                    .any(|r| r.target == Some(object.id()) || (id.is_some() && r.target_id() == id))
            })
            .collect()
    }
}

fn is_one_of(node: &Node<'_, '_>, names: &[&str]) -> bool {
    names
        .iter()
        .any(|name| dom::local_name_is(node, &ns::XADES_FAMILY, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentSet, InMemoryDocument};
    use crate::resolver::{ResolveContext, ResolverChain};
    use crate::testutil::{sha256_b64, timestamp_token};
    use crate::validation::ReferenceValidator;
    use lindholmen_crypto::encoding::encode_base64;
    use lindholmen_crypto::DigestMethod;
    use lindholmen_xml::IdIndex;
    use roxmltree::Document;

    const VALUE: &str = r#"<ds:SignatureValue xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="sv">AAAA</ds:SignatureValue>"#;

    fn encapsulated(tag: &str) -> String {
        let token = timestamp_token(DigestMethod::Sha256, &[0; 32], "20260101000000Z");
        format!(
            "<x:{tag}><x:EncapsulatedTimeStamp>{}</x:EncapsulatedTimeStamp></x:{tag}>",
            encode_base64(&token)
        )
    }

    fn signature(unsigned: &str, extra_objects: &str) -> String {
        format!(
            r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="s"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
<ds:Reference Id="r-doc" URI="a.txt"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>{doc}</ds:DigestValue></ds:Reference>
<ds:Reference Id="r-sp" URI="#sp" Type="http://uri.etsi.org/01903#SignedProperties"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>AA==</ds:DigestValue></ds:Reference>
</ds:SignedInfo><ds:SignatureValue Id="sv">AAAA</ds:SignatureValue>{extra_objects}<ds:Object><x:QualifyingProperties xmlns:x="http://uri.etsi.org/01903/v1.3.2#" Target="#s"><x:SignedProperties Id="sp"/>{unsigned}</x:QualifyingProperties></ds:Object></ds:Signature>"##,
            doc = sha256_b64(b"hello")
        )
    }

    fn with_builder(xml: &str, policy: ArchiveObjectPolicy, check: impl FnOnce(&Document<'_>, &TimestampDataBuilder<'_, '_>)) {
        let doc = Document::parse(xml).unwrap();
        let ids = IdIndex::build(&doc, &[]);
        let node = doc.root_element();
        let signature = XadesSignature::new(&doc, &ids, node);
        let documents = DocumentSet::new().with(InMemoryDocument::new("a.txt", b"hello".to_vec()));
        let rctx = ResolveContext {
            doc: &doc,
            ids: &ids,
            signature: node,
            documents: &documents,
            counter_signed: None,
            master_signature_value: None,
        };
        let chain = ResolverChain::standard();
        let references = ReferenceValidator::new(&chain).validate_all(&signature, &rctx).unwrap();
        let builder = TimestampDataBuilder::new(signature, &references, policy);
        check(&doc, &builder);
    }

    fn token_at(doc: &Document<'_>, local: &str) -> TimestampToken {
        let node = doc.descendants().find(|n| n.has_tag_name((ns::XADES_132, local))).unwrap();
        TimestampToken::from_element(node, C14nMode::Inclusive).unwrap()
    }

    #[test]
    fn test_content_and_signature_data() {
        let xml = signature("", "");
        with_builder(&xml, ArchiveObjectPolicy::default(), |_, builder| {
            assert_eq!(builder.content_all(C14nMode::Inclusive).unwrap(), b"hello");
            assert_eq!(builder.signature_data(C14nMode::Inclusive).unwrap(), VALUE.as_bytes());

            let include = |uri: &str, referenced_data| Include {
                uri: uri.into(),
                referenced_data,
            };
            assert_eq!(
                builder
                    .content_individual(&[include("#r-doc", true)], C14nMode::Inclusive)
                    .unwrap(),
                b"hello"
            );
            assert!(builder
                .content_individual(&[include("#r-doc", false)], C14nMode::Inclusive)
                .is_err());
            assert!(builder
                .content_individual(&[include("#unknown", true)], C14nMode::Inclusive)
                .is_err());
        });
    }

    #[test]
    fn test_content_individual_follows_reference_order() {
        let xml = signature("", "");
        with_builder(&xml, ArchiveObjectPolicy::default(), |_, builder| {
            let include = |uri: &str| Include {
                uri: uri.into(),
                referenced_data: true,
            };
            let in_order = builder
                .content_individual(&[include("#r-doc"), include("#r-sp")], C14nMode::Inclusive)
                .unwrap();
            let reversed = builder
                .content_individual(&[include("#r-sp"), include("#r-doc")], C14nMode::Inclusive)
                .unwrap();
            assert_eq!(in_order, reversed);
            assert!(in_order.starts_with(b"hello"));
            assert!(in_order.len() > b"hello".len());

            let repeated = builder
                .content_individual(&[include("#r-doc"), include("#r-doc")], C14nMode::Inclusive)
                .unwrap();
            assert_eq!(repeated, b"hello");
        });
    }

    #[test]
    fn test_missing_unsigned_properties_is_fatal() {
        let xml = signature("", "");
        with_builder(&xml, ArchiveObjectPolicy::default(), |_, builder| {
            assert!(matches!(
                builder.refs_only(None, false, C14nMode::Inclusive),
                Err(Error::MissingElement(_))
            ));
        });
    }

    #[test]
    fn test_sig_and_refs_stops_at_token() {
        let unsigned = format!(
            "<x:UnsignedProperties><x:UnsignedSignatureProperties>{}<x:CompleteRevocationRefs/>{}<x:CompleteCertificateRefs/></x:UnsignedSignatureProperties></x:UnsignedProperties>",
            encapsulated("SignatureTimeStamp"),
            encapsulated("SigAndRefsTimeStamp"),
        );
        let xml = signature(&unsigned, "");
        with_builder(&xml, ArchiveObjectPolicy::default(), |doc, builder| {
            let token = token_at(doc, "SigAndRefsTimeStamp");
            let verified = builder.sig_and_refs(Some(&token), false, C14nMode::Inclusive).unwrap();
            let text = String::from_utf8(verified).unwrap();
            assert!(text.starts_with(VALUE));
            assert!(text.contains("SignatureTimeStamp"));
            assert!(text.contains("CompleteRevocationRefs"));
            assert!(!text.contains("CompleteCertificateRefs"));

            let creation = builder.sig_and_refs(None, false, C14nMode::Inclusive).unwrap();
            assert!(String::from_utf8(creation).unwrap().contains("CompleteCertificateRefs"));

            let refs_only = builder.refs_only(Some(&token), false, C14nMode::Inclusive).unwrap();
            let text = String::from_utf8(refs_only).unwrap();
            assert!(text.starts_with("<x:CompleteRevocationRefs"));
        });
    }

    #[test]
    fn test_archive_objects_per_revision() {
        let unsigned = format!(
            "<x:UnsignedProperties><x:UnsignedSignatureProperties>{}</x:UnsignedSignatureProperties></x:UnsignedProperties>",
            encapsulated("SignatureTimeStamp"),
        );
        let extra = r#"<ds:Object Id="loose">extra</ds:Object>"#;
        let xml = signature(&unsigned, extra);
        with_builder(&xml, ArchiveObjectPolicy::default(), |_, builder| {
            let v132 = builder.archive(None, ArchiveRevision::Xades132, C14nMode::Inclusive).unwrap();
            let v141 = builder.archive(None, ArchiveRevision::Xades141, C14nMode::Inclusive).unwrap();
            let v132 = String::from_utf8(v132).unwrap();
            let v141 = String::from_utf8(v141).unwrap();
            assert!(v132.starts_with("hello<x:SignedProperties"));
            assert!(v132.contains("<ds:SignedInfo"));
            assert!(v132.contains("SignatureTimeStamp"));
            assert!(!v132.contains("extra"));
            assert!(v141.ends_with(r#"Id="loose">extra</ds:Object>"#));
        });
        with_builder(&xml, ArchiveObjectPolicy::NeverInclude, |_, builder| {
            let data = builder.archive(None, ArchiveRevision::Xades141, C14nMode::Inclusive).unwrap();
            assert!(!String::from_utf8(data).unwrap().contains("extra"));
        });
    }
}
