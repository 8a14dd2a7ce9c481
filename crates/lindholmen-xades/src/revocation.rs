#![forbid(unsafe_code)]

//! Revocation data embedded in a signature and the references to it.

use crate::certificate::{digest_alg_and_value, token_id};
use crate::report::{hex_bytes, hex_opt};
use crate::signature::{xades_child, xades_children, XadesSignature};
use der::Decode;
use lindholmen_core::{ns, Error, Result};
use lindholmen_crypto::encoding::decode_base64_lenient;
use lindholmen_crypto::DigestMethod;
use lindholmen_xml::dom;
use roxmltree::Node;
use serde::Serialize;
use x509_cert::crl::CertificateList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RevocationKind {
    Crl,
    Ocsp,
}

/// Where a revocation value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RevocationOrigin {
    RevocationValues,
    AttributeRevocationValues,
    TimestampValidationData,
}

/// An embedded CRL or OCSP response.
#[derive(Debug, Clone, Serialize)]
pub struct RevocationToken {
    pub kind: RevocationKind,
    /// Hex SHA-256 of the DER encoding.
    pub id: String,
    #[serde(serialize_with = "hex_bytes")]
    pub der: Vec<u8>,
    /// CRL issuer, when the CRL decodes.
    pub issuer: Option<String>,
    pub origins: Vec<RevocationOrigin>,
}

impl RevocationToken {
    /// Wrap `der`, checking only its outer structure.
    pub fn from_der(kind: RevocationKind, der: &[u8]) -> Result<Self> {
        let issuer = match kind {
            RevocationKind::Crl => {
                let crl = CertificateList::from_der(der)
                    .map_err(|e| Error::Certificate(format!("failed to parse CRL: {e}")))?;
                Some(crl.tbs_cert_list.issuer.to_string())
            }
            RevocationKind::Ocsp => {
                check_ocsp_response(der)?;
                None
            }
        };
        Ok(Self {
            kind,
            id: token_id(der),
            der: der.to_vec(),
            issuer,
            origins: Vec::new(),
        })
    }

    pub fn digest(&self, method: DigestMethod) -> Result<Vec<u8>> {
        method.digest(&self.der)
    }
}

/// `OCSPResponse ::= SEQUENCE { responseStatus ENUMERATED, responseBytes [0] EXPLICIT ... OPTIONAL }`
fn check_ocsp_response(der: &[u8]) -> Result<()> {
    yasna::parse_ber(der, |r| {
        r.read_sequence(|r| {
            let _status = r.next().read_enum()?;
            r.read_optional(|r| r.read_der())?;
            Ok(())
        })
    })
    .map_err(|e| Error::Asn1(format!("failed to parse OCSP response: {e}")))
}

/// The property a revocation reference was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RevocationRefOrigin {
    CompleteRevocationRefs,
    AttributeRevocationRefs,
}

impl RevocationRefOrigin {
    pub fn of_property(node: &Node<'_, '_>) -> Option<Self> {
        if dom::local_name_is(node, &ns::XADES_FAMILY, ns::xades::COMPLETE_REVOCATION_REFS) {
            Some(Self::CompleteRevocationRefs)
        } else if dom::local_name_is(node, &ns::XADES_FAMILY, ns::xades::ATTRIBUTE_REVOCATION_REFS) {
            Some(Self::AttributeRevocationRefs)
        } else {
            None
        }
    }
}

/// A `CRLRef` or `OCSPRef`. The digest is optional for OCSP.
#[derive(Debug, Clone, Serialize)]
pub struct RevocationRef {
    pub kind: RevocationKind,
    pub origin: RevocationRefOrigin,
    pub digest_method: Option<String>,
    #[serde(serialize_with = "hex_opt")]
    pub digest_value: Option<Vec<u8>>,
}

impl RevocationRef {
    fn parse(node: Node<'_, '_>, kind: RevocationKind, origin: RevocationRefOrigin) -> Result<Self> {
        let digest = match xades_child(node, ns::xades::DIGEST_ALG_AND_VALUE) {
            Some(d) => Some(digest_alg_and_value(d)?),
            None if kind == RevocationKind::Crl => {
                return Err(Error::MissingElement("CRLRef/DigestAlgAndValue".into()));
            }
            None => None,
        };
        let (digest_method, digest_value) = digest.unzip();
        Ok(Self {
            kind,
            origin,
            digest_method,
            digest_value,
        })
    }

    pub fn matches(&self, token: &RevocationToken) -> bool {
        let (Some(method), Some(value)) = (&self.digest_method, &self.digest_value) else {
            return false;
        };
        self.kind == token.kind
            && DigestMethod::from_uri(method)
                .and_then(|m| token.digest(m))
                .is_ok_and(|digest| &digest == value)
    }
}

/// Every `CRLRef` and `OCSPRef` of a revocation refs property.
pub fn refs_in(property: Node<'_, '_>, origin: RevocationRefOrigin) -> Vec<RevocationRef> {
    let groups = [
        (ns::xades::CRL_REFS, ns::xades::CRL_REF, RevocationKind::Crl),
        (ns::xades::OCSP_REFS, ns::xades::OCSP_REF, RevocationKind::Ocsp),
    ];
    let mut refs = Vec::new();
    for (group, entry, kind) in groups {
        for container in xades_children(property, group) {
            for node in xades_children(container, entry) {
                match RevocationRef::parse(node, kind, origin) {
                    Ok(r) => refs.push(r),
                    Err(e) => log::warn!("skipping revocation reference: {e}"),
                }
            }
        }
    }
    refs
}

fn encapsulated_values<'a, 'input>(node: Node<'a, 'input>) -> Vec<(Node<'a, 'input>, RevocationKind)> {
    node.descendants()
        .filter_map(|n| {
            if dom::local_name_is(&n, &ns::XADES_FAMILY, ns::xades::ENCAPSULATED_CRL_VALUE) {
                Some((n, RevocationKind::Crl))
            } else if dom::local_name_is(&n, &ns::XADES_FAMILY, ns::xades::ENCAPSULATED_OCSP_VALUE) {
                Some((n, RevocationKind::Ocsp))
            } else {
                None
            }
        })
        .collect()
}

/// Identifiers of every revocation value encapsulated below `node`.
pub fn ids_in(node: Node<'_, '_>) -> Vec<String> {
    encapsulated_values(node)
        .into_iter()
        .filter_map(|(n, _)| decode_base64_lenient(dom::element_text(n)).ok())
        .map(|der| token_id(&der))
        .collect()
}

/// Revocation values and references of one signature.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevocationSource {
    revocations: Vec<RevocationToken>,
    refs: Vec<RevocationRef>,
}

impl RevocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut token: RevocationToken, origin: RevocationOrigin) {
        match self.revocations.iter_mut().find(|r| r.id == token.id) {
            Some(existing) => {
                if !existing.origins.contains(&origin) {
                    existing.origins.push(origin);
                }
            }
            None => {
                token.origins = vec![origin];
                self.revocations.push(token);
            }
        }
    }

    pub fn revocations(&self) -> &[RevocationToken] {
        &self.revocations
    }

    pub fn refs(&self) -> &[RevocationRef] {
        &self.refs
    }

    pub fn is_empty(&self) -> bool {
        self.revocations.is_empty()
    }

    pub fn matching(&self, reference: &RevocationRef) -> Option<&RevocationToken> {
        self.revocations.iter().find(|r| reference.matches(r))
    }

    /// The matched token's id, else the hex digest, else nothing for a
    /// digest-less OCSP reference.
    pub fn identifier_for(&self, reference: &RevocationRef) -> Option<String> {
        self.matching(reference)
            .map(|r| r.id.clone())
            .or_else(|| reference.digest_value.as_ref().map(hex::encode))
    }

    pub fn from_signature(signature: &XadesSignature<'_, '_>, errors: &mut Vec<String>) -> Self {
        let mut source = Self::new();
        for property in signature.unsigned_signature_property_elements() {
            let origin = if dom::local_name_is(&property, &ns::XADES_FAMILY, ns::xades::REVOCATION_VALUES) {
                Some(RevocationOrigin::RevocationValues)
            } else if dom::local_name_is(&property, &ns::XADES_FAMILY, ns::xades::ATTRIBUTE_REVOCATION_VALUES) {
                Some(RevocationOrigin::AttributeRevocationValues)
            } else if dom::local_name_is(&property, &ns::XADES_FAMILY, ns::xades::TIMESTAMP_VALIDATION_DATA) {
                Some(RevocationOrigin::TimestampValidationData)
            } else {
                None
            };
            if let Some(origin) = origin {
                for (node, kind) in encapsulated_values(property) {
                    let token = decode_base64_lenient(dom::element_text(node))
                        .and_then(|der| RevocationToken::from_der(kind, &der));
                    match token {
                        Ok(token) => source.add(token, origin),
                        Err(e) => {
                            log::warn!("skipping {origin:?} {kind:?} value: {e}");
                            errors.push(format!("{origin:?} {kind:?} value: {e}"));
                        }
                    }
                }
            }
            if let Some(ref_origin) = RevocationRefOrigin::of_property(&property) {
                source.refs.extend(refs_in(property, ref_origin));
            }
        }
        log::debug!(
            "signature {}: {} revocation values, {} revocation refs",
            signature.label(),
            source.revocations.len(),
            source.refs.len()
        );
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{oid, seq, tlv};
    use lindholmen_crypto::encoding::encode_base64;
    use lindholmen_xml::IdIndex;
    use roxmltree::Document;

    fn crl() -> Vec<u8> {
        let alg = seq(&[oid(&[1, 2, 840, 113549, 1, 1, 11]), vec![0x05, 0x00]]);
        let issuer = seq(&[tlv(0x31, &seq(&[oid(&[2, 5, 4, 3]), tlv(0x0c, b"CA")]))]);
        let tbs = seq(&[
            tlv(0x02, &[1]),
            alg.clone(),
            issuer,
            tlv(0x17, b"260101000000Z"),
            tlv(0x17, b"260201000000Z"),
        ]);
        seq(&[tbs, alg, tlv(0x03, &[0x00, 0xaa])])
    }

    fn ocsp() -> Vec<u8> {
        seq(&[tlv(0x0a, &[0])])
    }

    #[test]
    fn test_tokens() {
        let crl = RevocationToken::from_der(RevocationKind::Crl, &crl()).unwrap();
        assert!(crl.issuer.unwrap().ends_with("=CA"));
        let ocsp = RevocationToken::from_der(RevocationKind::Ocsp, &ocsp()).unwrap();
        assert!(ocsp.issuer.is_none());
        assert!(RevocationToken::from_der(RevocationKind::Ocsp, b"\x04\x00").is_err());
    }

    #[test]
    fn test_extraction_and_refs() {
        let crl_der = crl();
        let digest = encode_base64(&DigestMethod::Sha256.digest(&crl_der).unwrap());
        let xml = format!(
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:Object><x:QualifyingProperties xmlns:x="http://uri.etsi.org/01903/v1.3.2#"><x:UnsignedProperties><x:UnsignedSignatureProperties>
<x:CompleteRevocationRefs>
<x:CRLRefs><x:CRLRef><x:DigestAlgAndValue><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>{digest}</ds:DigestValue></x:DigestAlgAndValue></x:CRLRef></x:CRLRefs>
<x:OCSPRefs><x:OCSPRef><x:OCSPIdentifier/></x:OCSPRef></x:OCSPRefs>
</x:CompleteRevocationRefs>
<x:RevocationValues><x:CRLValues><x:EncapsulatedCRLValue>{crl}</x:EncapsulatedCRLValue></x:CRLValues><x:OCSPValues><x:EncapsulatedOCSPValue>{ocsp}</x:EncapsulatedOCSPValue></x:OCSPValues></x:RevocationValues>
</x:UnsignedSignatureProperties></x:UnsignedProperties></x:QualifyingProperties></ds:Object></ds:Signature>"#,
            crl = encode_base64(&crl_der),
            ocsp = encode_base64(&ocsp()),
        );
        let doc = Document::parse(&xml).unwrap();
        let ids = IdIndex::default();
        let signature = XadesSignature::new(&doc, &ids, doc.root_element());
        let mut errors = Vec::new();
        let source = RevocationSource::from_signature(&signature, &mut errors);

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(source.revocations().len(), 2);
        assert_eq!(source.refs().len(), 2);
        let crl_ref = &source.refs()[0];
        assert_eq!(crl_ref.kind, RevocationKind::Crl);
        assert_eq!(source.identifier_for(crl_ref), Some(token_id(&crl_der)));
        let ocsp_ref = &source.refs()[1];
        assert!(source.matching(ocsp_ref).is_none());
        assert_eq!(source.identifier_for(ocsp_ref), None);
        assert_eq!(ids_in(doc.root_element()).len(), 2);
    }
}
