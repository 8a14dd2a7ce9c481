#![forbid(unsafe_code)]

//! Links every embedded timestamp to the objects it covers.
//!
//! Unsigned properties are walked once in document order. Certificates and
//! revocation data seen so far accumulate, so a later archive timestamp
//! covers everything before it, earlier timestamps included.

use super::{
    classify_element, TimestampDataBuilder, TimestampToken, TimestampType, TimestampedObjectKind,
    TimestampedReference,
};
use crate::certificate::{self, CertificateOrigin, CertificateRefOrigin, CertificateSource};
use crate::context::ArchiveObjectPolicy;
use crate::revocation::{self, RevocationRefOrigin, RevocationSource};
use crate::signature::XadesSignature;
use crate::validation::ReferenceValidations;
use lindholmen_c14n::C14nMode;
use lindholmen_core::ns;
use lindholmen_xml::{dom, xpath};
use roxmltree::Node;

/// Append the members of `items` not yet in `into`, keeping first-seen order.
fn extend_unique(into: &mut Vec<TimestampedReference>, items: impl IntoIterator<Item = TimestampedReference>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

pub struct TimestampGraphBuilder<'a, 'input> {
    signature: XadesSignature<'a, 'input>,
    references: &'a ReferenceValidations,
    certificates: &'a CertificateSource,
    revocations: &'a RevocationSource,
    default_c14n: C14nMode,
    archive_objects: ArchiveObjectPolicy,
}

impl<'a, 'input> TimestampGraphBuilder<'a, 'input> {
    pub fn new(
        signature: XadesSignature<'a, 'input>,
        references: &'a ReferenceValidations,
        certificates: &'a CertificateSource,
        revocations: &'a RevocationSource,
    ) -> Self {
        Self {
            signature,
            references,
            certificates,
            revocations,
            default_c14n: C14nMode::Inclusive,
            archive_objects: ArchiveObjectPolicy::default(),
        }
    }

    pub fn with_default_canonicalization(mut self, mode: C14nMode) -> Self {
        self.default_c14n = mode;
        self
    }

    pub fn with_archive_objects(mut self, policy: ArchiveObjectPolicy) -> Self {
        self.archive_objects = policy;
        self
    }

    /// Content timestamps first, then unsigned ones in document order, each
    /// with its coverage and imprint verdict. Unreadable timestamp elements
    /// are reported in `errors` and skipped.
    pub fn build(&self, errors: &mut Vec<String>) -> Vec<TimestampToken> {
        let data = TimestampDataBuilder::new(self.signature, self.references, self.archive_objects);
        let mut tokens = Vec::new();

        if let Some(sdop) = self.signature.signed_data_object_properties() {
            for element in dom::child_elements(sdop) {
                if !classify_element(&element).is_some_and(|(ty, _)| ty.is_content()) {
                    continue;
                }
                if let Some(mut token) = self.read(element, errors) {
                    token.covered = self.content_coverage(&token);
                    self.verify(&mut token, &data);
                    tokens.push(token);
                }
            }
        }

        let signature_coverage = self.signature_coverage();
        let key_info_certificates: Vec<TimestampedReference> = self
            .certificates
            .by_origin(CertificateOrigin::KeyInfo)
            .map(|c| TimestampedReference::new(c.id.clone(), TimestampedObjectKind::Certificate))
            .collect();
        let mut seen_refs: Vec<TimestampedReference> = Vec::new();
        let mut seen_values: Vec<TimestampedReference> = Vec::new();

        for element in self.signature.unsigned_signature_property_elements() {
            match classify_element(&element) {
                Some((ty, _)) if !ty.is_content() => {
                    let Some(mut token) = self.read(element, errors) else {
                        continue;
                    };
                    let mut covered = Vec::new();
                    match ty {
                        TimestampType::Signature => extend_unique(&mut covered, signature_coverage.clone()),
                        TimestampType::RefsOnly => extend_unique(&mut covered, seen_refs.clone()),
                        TimestampType::SigAndRefs => {
                            extend_unique(&mut covered, signature_coverage.clone());
                            for prior in tokens.iter().filter(|t: &&TimestampToken| {
                                t.timestamp_type == TimestampType::Signature
                            }) {
                                covered.push(TimestampedReference::new(
                                    prior.id.clone(),
                                    TimestampedObjectKind::Timestamp,
                                ));
                            }
                            extend_unique(&mut covered, seen_refs.clone());
                        }
                        TimestampType::Archive => {
                            extend_unique(&mut covered, signature_coverage.clone());
                            extend_unique(&mut covered, key_info_certificates.clone());
                            for prior in &tokens {
                                extend_unique(
                                    &mut covered,
                                    [TimestampedReference::new(prior.id.clone(), TimestampedObjectKind::Timestamp)],
                                );
                                extend_unique(&mut covered, prior.covered.clone());
                            }
                            extend_unique(&mut covered, seen_refs.clone());
                            extend_unique(&mut covered, seen_values.clone());
                        }
                        TimestampType::AllDataObjects | TimestampType::IndividualDataObjects => {}
                    }
                    token.covered = covered;
                    self.verify(&mut token, &data);
                    tokens.push(token);
                }
                Some(_) => {}
                None => {
                    extend_unique(&mut seen_refs, self.refs_of(element));
                    extend_unique(&mut seen_values, self.values_of(element));
                }
            }
        }
        tokens
    }

    fn read(&self, element: Node<'_, '_>, errors: &mut Vec<String>) -> Option<TimestampToken> {
        match TimestampToken::from_element(element, self.default_c14n) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("skipping {}: {e}", element.tag_name().name());
                errors.push(format!("{}: {e}", element.tag_name().name()));
                None
            }
        }
    }

    fn verify(&self, token: &mut TimestampToken, data: &TimestampDataBuilder<'_, '_>) {
        match data.data_for(token) {
            Ok(bytes) => token.check_imprint(bytes),
            Err(e) => {
                log::warn!("{} {}: cannot rebuild data: {e}", token.element, token.id);
                token.message_imprint_intact = false;
                token.errors.push(e.to_string());
            }
        }
        log::debug!(
            "{} {}: intact={} covering {} objects",
            token.element,
            token.id,
            token.message_imprint_intact,
            token.covered.len()
        );
    }

    /// Signed data: every reference to content rather than structure.
    fn signature_coverage(&self) -> Vec<TimestampedReference> {
        let mut covered: Vec<TimestampedReference> = self
            .references
            .references
            .iter()
            .filter(|r| r.kind.is_signed_data())
            .map(|r| TimestampedReference::new(r.label(), TimestampedObjectKind::SignedData))
            .collect();
        let key_info_intact = self
            .references
            .key_info()
            .is_some_and(|v| v.found && v.intact);
        if key_info_intact {
            extend_unique(
                &mut covered,
                self.certificates
                    .by_origin(CertificateOrigin::KeyInfo)
                    .map(|c| TimestampedReference::new(c.id.clone(), TimestampedObjectKind::Certificate)),
            );
        }
        covered
    }

    fn content_coverage(&self, token: &TimestampToken) -> Vec<TimestampedReference> {
        let references = &self.references.references;
        match token.timestamp_type {
            TimestampType::IndividualDataObjects => token
                .includes
                .iter()
                .filter_map(|include| xpath::parse_same_document_ref(&include.uri))
                .filter_map(|id| references.iter().find(|r| r.id.as_deref() == Some(id)))
                .map(|r| TimestampedReference::new(r.label(), TimestampedObjectKind::SignedData))
                .collect(),
            _ => references
                .iter()
                .filter(|r| r.kind.is_signed_data())
                .map(|r| TimestampedReference::new(r.label(), TimestampedObjectKind::SignedData))
                .collect(),
        }
    }

    /// Certificates and revocation data named by a refs property.
    fn refs_of(&self, element: Node<'_, '_>) -> Vec<TimestampedReference> {
        let mut out = Vec::new();
        if let Some(origin) = CertificateRefOrigin::of_property(&element) {
            out.extend(certificate::refs_in(element, origin).iter().map(|r| {
                TimestampedReference::new(self.certificates.identifier_for(r), TimestampedObjectKind::Certificate)
            }));
        }
        if let Some(origin) = RevocationRefOrigin::of_property(&element) {
            out.extend(
                revocation::refs_in(element, origin)
                    .iter()
                    .filter_map(|r| self.revocations.identifier_for(r))
                    .map(|id| TimestampedReference::new(id, TimestampedObjectKind::Revocation)),
            );
        }
        out
    }

    /// Certificates and revocation data embedded in a values property.
    fn values_of(&self, element: Node<'_, '_>) -> Vec<TimestampedReference> {
        let is = |name: &str| dom::local_name_is(&element, &ns::XADES_FAMILY, name);
        let holds_values = is(ns::xades::CERTIFICATE_VALUES)
            || is(ns::xades::ATTR_AUTHORITIES_CERT_VALUES)
            || is(ns::xades::REVOCATION_VALUES)
            || is(ns::xades::ATTRIBUTE_REVOCATION_VALUES)
            || is(ns::xades::TIMESTAMP_VALIDATION_DATA);
        if !holds_values {
            return Vec::new();
        }
        let certificates = certificate::ids_in(element)
            .into_iter()
            .map(|id| TimestampedReference::new(id, TimestampedObjectKind::Certificate));
        let revocations = revocation::ids_in(element)
            .into_iter()
            .map(|id| TimestampedReference::new(id, TimestampedObjectKind::Revocation));
        certificates.chain(revocations).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentSet, InMemoryDocument};
    use crate::resolver::{ResolveContext, ResolverChain};
    use crate::testutil::{certificate as test_certificate, sha256_b64, timestamp_token};
    use crate::validation::ReferenceValidator;
    use lindholmen_crypto::encoding::encode_base64;
    use lindholmen_crypto::DigestMethod;
    use lindholmen_xml::IdIndex;
    use roxmltree::Document;

    const HEAD: &str = r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="s"><ds:SignedInfo>
<ds:Reference Id="r-doc" URI="a.txt"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>DOC</ds:DigestValue></ds:Reference>
</ds:SignedInfo><ds:SignatureValue>AAAA</ds:SignatureValue>"##;

    fn stamp(tag: &str, imprint: &[u8]) -> String {
        let token = timestamp_token(DigestMethod::Sha256, imprint, "20260101000000Z");
        format!(
            "<x:{tag}><x:EncapsulatedTimeStamp>{}</x:EncapsulatedTimeStamp></x:{tag}>",
            encode_base64(&token)
        )
    }

    fn document(signed: &str, unsigned: &str) -> String {
        format!(
            r##"{head}<ds:Object><x:QualifyingProperties xmlns:x="http://uri.etsi.org/01903/v1.3.2#" Target="#s"><x:SignedProperties><x:SignedDataObjectProperties>{signed}</x:SignedDataObjectProperties></x:SignedProperties><x:UnsignedProperties><x:UnsignedSignatureProperties>{unsigned}</x:UnsignedSignatureProperties></x:UnsignedProperties></x:QualifyingProperties></ds:Object></ds:Signature>"##,
            head = HEAD.replace("DOC", &sha256_b64(b"hello")),
        )
    }

    fn build(xml: &str) -> (Vec<TimestampToken>, Vec<String>) {
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
        let mut errors = Vec::new();
        let certificates = CertificateSource::from_signature(&signature, &mut errors);
        let revocations = RevocationSource::from_signature(&signature, &mut errors);
        let tokens = TimestampGraphBuilder::new(signature, &references, &certificates, &revocations)
            .build(&mut errors);
        (tokens, errors)
    }

    fn sha256(data: &[u8]) -> Vec<u8> {
        DigestMethod::Sha256.digest(data).unwrap()
    }

    const VALUE: &[u8] = br#"<ds:SignatureValue xmlns:ds="http://www.w3.org/2000/09/xmldsig#">AAAA</ds:SignatureValue>"#;

    #[test]
    fn test_content_and_signature_timestamps() {
        let signed = stamp("AllDataObjectsTimeStamp", &sha256(b"hello"));
        let unsigned = stamp("SignatureTimeStamp", &sha256(VALUE));
        let (tokens, errors) = build(&document(&signed, &unsigned));
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(tokens.len(), 2);

        assert_eq!(tokens[0].timestamp_type, TimestampType::AllDataObjects);
        assert!(tokens[0].message_imprint_intact, "{:?}", tokens[0].errors);
        assert!(tokens[0].covers("r-doc"));

        assert_eq!(tokens[1].timestamp_type, TimestampType::Signature);
        assert!(tokens[1].message_imprint_intact, "{:?}", tokens[1].errors);
        assert_eq!(
            tokens[1].covered,
            vec![TimestampedReference::new("r-doc", TimestampedObjectKind::SignedData)]
        );
    }

    #[test]
    fn test_tampered_imprint() {
        let unsigned = stamp("SignatureTimeStamp", &sha256(b"something else"));
        let (tokens, _) = build(&document("", &unsigned));
        assert!(!tokens[0].message_imprint_intact);
        assert!(tokens[0].data.is_some());
    }

    #[test]
    fn test_archive_coverage_accumulates() {
        let cert = test_certificate("Signer", "Signer", "491231235959Z", 1);
        let values = format!(
            "<x:CertificateValues><x:EncapsulatedX509Certificate>{}</x:EncapsulatedX509Certificate></x:CertificateValues>",
            encode_base64(&cert)
        );
        let unsigned = format!(
            "{}{}{}{}",
            stamp("SignatureTimeStamp", &sha256(VALUE)),
            stamp("ArchiveTimeStamp", &[1; 32]),
            values,
            stamp("ArchiveTimeStamp", &[2; 32]),
        );
        let (tokens, _) = build(&document("", &unsigned));
        assert_eq!(tokens.len(), 3);
        let (first, second) = (&tokens[1], &tokens[2]);
        assert!(first.covers(&tokens[0].id));
        assert!(!first.covers(&certificate::token_id(&cert)));
        assert!(second.covers(&first.id));
        assert!(second.covers(&certificate::token_id(&cert)));
        for covered in &first.covered {
            assert!(second.covered.contains(covered));
        }
    }

    #[test]
    fn test_unreadable_timestamp_reported() {
        let (tokens, errors) = build(&document("", "<x:SignatureTimeStamp/>"));
        assert!(tokens.is_empty());
        assert_eq!(errors.len(), 1);
    }
}
