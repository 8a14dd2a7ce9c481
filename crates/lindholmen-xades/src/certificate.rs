#![forbid(unsafe_code)]

//! Certificates embedded in a signature and the references that name them.
//!
//! Nothing here builds or checks a chain: tokens are extracted and hashed
//! so that references can be matched against them by digest.

use crate::report::{display_opt, hex_bytes};
use crate::signature::{xades_child, xades_children, XadesSignature};
use crate::timestamp::tst::tlv_content;
use der::{Decode, Encode};
use lindholmen_core::{ns, Error, Result};
use lindholmen_crypto::encoding::decode_base64_lenient;
use lindholmen_crypto::DigestMethod;
use lindholmen_xml::dom;
use roxmltree::Node;
use serde::Serialize;
use x509_cert::name::Name;
use x509_cert::Certificate;
use yasna::Tag;

/// Where a certificate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CertificateOrigin {
    KeyInfo,
    CertificateValues,
    AttrAuthoritiesCertValues,
    TimestampValidationData,
}

/// An embedded X.509 certificate.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateToken {
    /// Hex SHA-256 of the DER encoding.
    pub id: String,
    #[serde(serialize_with = "hex_bytes")]
    pub der: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    /// Hex of the serial number's content octets.
    pub serial_number: String,
    #[serde(serialize_with = "display_opt")]
    pub not_after: Option<der::DateTime>,
    pub self_signed: bool,
    pub origins: Vec<CertificateOrigin>,
}

impl CertificateToken {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;
        let subject_der = tbs
            .subject
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode subject: {e}")))?;
        let issuer_der = tbs
            .issuer
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode issuer: {e}")))?;
        Ok(Self {
            id: token_id(der),
            der: der.to_vec(),
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            serial_number: hex::encode(tbs.serial_number.as_bytes()),
            not_after: Some(tbs.validity.not_after.to_date_time()),
            self_signed: subject_der == issuer_der,
            origins: Vec::new(),
        })
    }

    pub fn digest(&self, method: DigestMethod) -> Result<Vec<u8>> {
        method.digest(&self.der)
    }
}

/// Hex SHA-256 of `der`, the identifier of a certificate or revocation token.
pub(crate) fn token_id(der: &[u8]) -> String {
    DigestMethod::Sha256
        .digest(der)
        .map(hex::encode)
        .unwrap_or_default()
}

/// The property a certificate reference was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CertificateRefOrigin {
    SigningCertificate,
    SigningCertificateV2,
    CompleteCertificateRefs,
    CompleteCertificateRefsV2,
    AttributeCertificateRefs,
    AttributeCertificateRefsV2,
}

impl CertificateRefOrigin {
    pub fn is_signing_certificate(&self) -> bool {
        matches!(self, Self::SigningCertificate | Self::SigningCertificateV2)
    }

    /// The origin of refs held by an unsigned property element.
    pub fn of_property(node: &Node<'_, '_>) -> Option<Self> {
        if !node.tag_name().namespace().is_some_and(ns::is_xades) {
            return None;
        }
        match node.tag_name().name() {
            ns::xades::COMPLETE_CERTIFICATE_REFS => Some(Self::CompleteCertificateRefs),
            ns::xades::COMPLETE_CERTIFICATE_REFS_V2 => Some(Self::CompleteCertificateRefsV2),
            ns::xades::ATTRIBUTE_CERTIFICATE_REFS => Some(Self::AttributeCertificateRefs),
            ns::xades::ATTRIBUTE_CERTIFICATE_REFS_V2 => Some(Self::AttributeCertificateRefsV2),
            _ => None,
        }
    }
}

/// A `Cert` element: a digest plus optional issuer and serial.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateRef {
    pub origin: CertificateRefOrigin,
    pub digest_method: String,
    #[serde(serialize_with = "hex_bytes")]
    pub digest_value: Vec<u8>,
    pub issuer_name: Option<String>,
    /// Decimal for `IssuerSerial`, hex for `IssuerSerialV2`.
    pub serial_number: Option<String>,
    pub uri: Option<String>,
}

impl CertificateRef {
    /// Parse one `Cert` element.
    pub fn parse(cert: Node<'_, '_>, origin: CertificateRefOrigin) -> Result<Self> {
        let digest = xades_child(cert, ns::xades::CERT_DIGEST)
            .ok_or_else(|| Error::MissingElement("Cert/CertDigest".into()))?;
        let (digest_method, digest_value) = digest_alg_and_value(digest)?;

        let (issuer_name, serial_number) = if let Some(issuer_serial) = xades_child(cert, ns::xades::ISSUER_SERIAL) {
            (
                dom::find_child_element(issuer_serial, ns::DSIG, ns::node::X509_ISSUER_NAME)
                    .map(|n| dom::element_text(n).to_owned()),
                dom::find_child_element(issuer_serial, ns::DSIG, ns::node::X509_SERIAL_NUMBER)
                    .map(|n| dom::element_text(n).to_owned()),
            )
        } else if let Some(v2) = xades_child(cert, ns::xades::ISSUER_SERIAL_V2) {
            match decode_base64_lenient(dom::element_text(v2)).and_then(|der| parse_issuer_serial_v2(&der)) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("unreadable IssuerSerialV2: {e}");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            origin,
            digest_method,
            digest_value,
            issuer_name,
            serial_number,
            uri: cert.attribute(ns::attr::URI).map(str::to_owned),
        })
    }

    /// True when `token` hashes to this reference's digest.
    pub fn matches(&self, token: &CertificateToken) -> bool {
        DigestMethod::from_uri(&self.digest_method)
            .and_then(|method| token.digest(method))
            .is_ok_and(|digest| digest == self.digest_value)
    }
}

/// `ds:DigestMethod/@Algorithm` and the decoded `ds:DigestValue` under
/// `parent`.
pub(crate) fn digest_alg_and_value(parent: Node<'_, '_>) -> Result<(String, Vec<u8>)> {
    let method = dom::find_child_element(parent, ns::DSIG, ns::node::DIGEST_METHOD)
        .and_then(|n| n.attribute(ns::attr::ALGORITHM))
        .ok_or_else(|| Error::MissingElement("DigestMethod".into()))?;
    let value = dom::find_child_element(parent, ns::DSIG, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement("DigestValue".into()))?;
    Ok((method.to_owned(), decode_base64_lenient(dom::element_text(value))?))
}

/// `IssuerSerial ::= SEQUENCE { issuer GeneralNames, serialNumber INTEGER }`.
///
/// Only a `directoryName` issuer is rendered.
fn parse_issuer_serial_v2(der: &[u8]) -> Result<(Option<String>, Option<String>)> {
    let (issuer, serial) = yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let issuer = r.next().read_der()?;
            let serial = r.next().read_der()?;
            Ok((issuer, serial))
        })
    })
    .map_err(|e| Error::Asn1(format!("failed to parse IssuerSerial: {e}")))?;

    let directory_name = yasna::parse_der(&issuer, |r| {
        r.read_sequence(|r| r.next().read_tagged(Tag::context(4), |r| r.read_der()))
    })
    .ok();
    let issuer_name = directory_name
        .and_then(|name| Name::from_der(&name).ok())
        .map(|name| name.to_string());
    Ok((issuer_name, Some(hex::encode(tlv_content(&serial)?))))
}

/// Every `Cert` of a refs property, whether wrapped in `CertRefs` or not.
pub fn refs_in(property: Node<'_, '_>, origin: CertificateRefOrigin) -> Vec<CertificateRef> {
    let certs = match xades_child(property, ns::xades::CERT_REFS) {
        Some(cert_refs) => xades_children(cert_refs, ns::xades::CERT),
        None => xades_children(property, ns::xades::CERT),
    };
    certs
        .into_iter()
        .filter_map(|cert| match CertificateRef::parse(cert, origin) {
            Ok(r) => Some(r),
            Err(e) => {
                log::warn!("skipping certificate reference: {e}");
                None
            }
        })
        .collect()
}

/// Identifiers of every certificate encapsulated below `node`.
pub fn ids_in(node: Node<'_, '_>) -> Vec<String> {
    encapsulated_certificates(node)
        .into_iter()
        .filter_map(|n| decode_base64_lenient(dom::element_text(n)).ok())
        .map(|der| token_id(&der))
        .collect()
}

fn encapsulated_certificates<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    node.descendants()
        .filter(|n| dom::local_name_is(n, &ns::XADES_FAMILY, ns::xades::ENCAPSULATED_X509_CERTIFICATE))
        .collect()
}

/// Certificates and certificate references of one signature.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CertificateSource {
    certificates: Vec<CertificateToken>,
    refs: Vec<CertificateRef>,
}

impl CertificateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `token`, merging origins when the same DER was already seen.
    pub fn add(&mut self, mut token: CertificateToken, origin: CertificateOrigin) {
        match self.certificates.iter_mut().find(|c| c.id == token.id) {
            Some(existing) => {
                if !existing.origins.contains(&origin) {
                    existing.origins.push(origin);
                }
            }
            None => {
                token.origins = vec![origin];
                self.certificates.push(token);
            }
        }
    }

    pub fn add_ref(&mut self, reference: CertificateRef) {
        self.refs.push(reference);
    }

    pub fn certificates(&self) -> &[CertificateToken] {
        &self.certificates
    }

    pub fn refs(&self) -> &[CertificateRef] {
        &self.refs
    }

    pub fn by_origin(&self, origin: CertificateOrigin) -> impl Iterator<Item = &CertificateToken> {
        self.certificates
            .iter()
            .filter(move |c| c.origins.contains(&origin))
    }

    pub fn refs_of(&self, origin: CertificateRefOrigin) -> impl Iterator<Item = &CertificateRef> {
        self.refs.iter().filter(move |r| r.origin == origin)
    }

    /// The embedded certificate `reference` names, by digest.
    pub fn matching(&self, reference: &CertificateRef) -> Option<&CertificateToken> {
        self.certificates.iter().find(|c| reference.matches(c))
    }

    /// Identifier for `reference`: the matched certificate's id, or the hex
    /// digest when nothing embedded matches.
    pub fn identifier_for(&self, reference: &CertificateRef) -> String {
        self.matching(reference)
            .map(|c| c.id.clone())
            .unwrap_or_else(|| hex::encode(&reference.digest_value))
    }

    /// The certificate named by the first signing certificate reference that
    /// matches one.
    pub fn signing_certificate(&self) -> Option<&CertificateToken> {
        self.refs
            .iter()
            .filter(|r| r.origin.is_signing_certificate())
            .find_map(|r| self.matching(r))
    }

    /// True when at least one certificate is present and every one is
    /// self-signed.
    pub fn all_self_signed(&self) -> bool {
        !self.certificates.is_empty() && self.certificates.iter().all(|c| c.self_signed)
    }

    /// Extract certificates from `KeyInfo` and the unsigned value
    /// properties, and references from the signing certificate and refs
    /// properties. Unreadable entries are reported in `errors` and skipped.
    pub fn from_signature(signature: &XadesSignature<'_, '_>, errors: &mut Vec<String>) -> Self {
        let mut source = Self::new();

        if let Some(key_info) = signature.key_info() {
            for data in dom::find_child_elements(key_info, ns::DSIG, ns::node::X509_DATA) {
                for cert in dom::find_child_elements(data, ns::DSIG, ns::node::X509_CERTIFICATE) {
                    source.add_encoded(cert, CertificateOrigin::KeyInfo, errors);
                }
            }
        }

        for property in signature.unsigned_signature_property_elements() {
            let origin = if dom::local_name_is(&property, &ns::XADES_FAMILY, ns::xades::CERTIFICATE_VALUES) {
                Some(CertificateOrigin::CertificateValues)
            } else if dom::local_name_is(&property, &ns::XADES_FAMILY, ns::xades::ATTR_AUTHORITIES_CERT_VALUES) {
                Some(CertificateOrigin::AttrAuthoritiesCertValues)
            } else if dom::local_name_is(&property, &ns::XADES_FAMILY, ns::xades::TIMESTAMP_VALIDATION_DATA) {
                Some(CertificateOrigin::TimestampValidationData)
            } else {
                None
            };
            if let Some(origin) = origin {
                for cert in encapsulated_certificates(property) {
                    source.add_encoded(cert, origin, errors);
                }
            }
            if let Some(ref_origin) = CertificateRefOrigin::of_property(&property) {
                source.refs.extend(refs_in(property, ref_origin));
            }
        }

        if let Some(ssp) = signature.signed_signature_properties() {
            let signing = [
                (ns::xades::SIGNING_CERTIFICATE, CertificateRefOrigin::SigningCertificate),
                (ns::xades::SIGNING_CERTIFICATE_V2, CertificateRefOrigin::SigningCertificateV2),
            ];
            for (name, origin) in signing {
                for property in xades_children(ssp, name) {
                    source.refs.extend(refs_in(property, origin));
                }
            }
        }

        log::debug!(
            "signature {}: {} certificates, {} certificate refs",
            signature.label(),
            source.certificates.len(),
            source.refs.len()
        );
        source
    }

    fn add_encoded(&mut self, node: Node<'_, '_>, origin: CertificateOrigin, errors: &mut Vec<String>) {
        match decode_base64_lenient(dom::element_text(node)).and_then(|der| CertificateToken::from_der(&der)) {
            Ok(token) => self.add(token, origin),
            Err(e) => {
                log::warn!("skipping {origin:?} certificate: {e}");
                errors.push(format!("{origin:?} certificate: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{certificate, oid, seq, tlv};
    use lindholmen_crypto::encoding::encode_base64;
    use lindholmen_xml::IdIndex;
    use roxmltree::Document;

    fn signature_xml(cert: &[u8], other: &[u8]) -> String {
        let digest = encode_base64(&DigestMethod::Sha256.digest(cert).unwrap());
        let other_digest = encode_base64(&DigestMethod::Sha1.digest(other).unwrap());
        format!(
            r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="s">
<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
<ds:Object><xades:QualifyingProperties xmlns:xades="http://uri.etsi.org/01903/v1.3.2#" xmlns:xades141="http://uri.etsi.org/01903/v1.4.1#" Target="#s">
<xades:SignedProperties><xades:SignedSignatureProperties>
<xades:SigningCertificateV2><xades:Cert><xades:CertDigest><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>{digest}</ds:DigestValue></xades:CertDigest></xades:Cert></xades:SigningCertificateV2>
</xades:SignedSignatureProperties></xades:SignedProperties>
<xades:UnsignedProperties><xades:UnsignedSignatureProperties>
<xades:CompleteCertificateRefs><xades:CertRefs><xades:Cert><xades:CertDigest><ds:DigestMethod Algorithm="http://www.w3.org/2000/09/xmldsig#sha1"/><ds:DigestValue>{other_digest}</ds:DigestValue></xades:CertDigest><xades:IssuerSerial><ds:X509IssuerName>CN=CA</ds:X509IssuerName><ds:X509SerialNumber>7</ds:X509SerialNumber></xades:IssuerSerial></xades:Cert></xades:CertRefs></xades:CompleteCertificateRefs>
<xades:CertificateValues><xades:EncapsulatedX509Certificate>{cert}</xades:EncapsulatedX509Certificate><xades:EncapsulatedX509Certificate>bm90IGEgY2VydA==</xades:EncapsulatedX509Certificate></xades:CertificateValues>
<xades141:TimeStampValidationData><xades:CertificateValues><xades:EncapsulatedX509Certificate>{other}</xades:EncapsulatedX509Certificate></xades:CertificateValues></xades141:TimeStampValidationData>
</xades:UnsignedSignatureProperties></xades:UnsignedProperties>
</xades:QualifyingProperties></ds:Object></ds:Signature>"##,
            cert = encode_base64(cert),
            other = encode_base64(other),
        )
    }

    #[test]
    fn test_token_from_der() {
        let der = certificate("Signer", "Signer", "491231235959Z", 5);
        let token = CertificateToken::from_der(&der).unwrap();
        assert!(token.self_signed);
        assert!(token.subject.ends_with("=Signer"), "{}", token.subject);
        assert_eq!(token.serial_number, "05");
        assert_eq!(token.not_after, Some(der::DateTime::new(2049, 12, 31, 23, 59, 59).unwrap()));
        assert_eq!(token.id.len(), 64);

        let issued = CertificateToken::from_der(&certificate("Leaf", "CA", "491231235959Z", 6)).unwrap();
        assert!(!issued.self_signed);
        assert!(CertificateToken::from_der(b"junk").is_err());
    }

    #[test]
    fn test_self_signed_compares_encoded_names() {
        let differs_in_case = CertificateToken::from_der(&certificate("Signer", "signer", "491231235959Z", 3)).unwrap();
        assert!(!differs_in_case.self_signed);
        assert_ne!(differs_in_case.subject, differs_in_case.issuer);

        let reissued = CertificateToken::from_der(&certificate("Signer", "Signer", "491231235959Z", 9)).unwrap();
        assert!(reissued.self_signed);
        assert_eq!(reissued.subject, reissued.issuer);
    }

    #[test]
    fn test_extraction_and_matching() {
        let cert = certificate("Signer", "Signer", "491231235959Z", 1);
        let other = certificate("TSA", "CA", "491231235959Z", 2);
        let xml = signature_xml(&cert, &other);
        let doc = Document::parse(&xml).unwrap();
        let ids = IdIndex::build(&doc, &[]);
        let signature = XadesSignature::new(&doc, &ids, doc.root_element());
        let mut errors = Vec::new();
        let source = CertificateSource::from_signature(&signature, &mut errors);

        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(source.certificates().len(), 2);
        let signer = source.signing_certificate().unwrap();
        assert_eq!(
            signer.origins,
            vec![CertificateOrigin::KeyInfo, CertificateOrigin::CertificateValues]
        );
        assert_eq!(source.by_origin(CertificateOrigin::TimestampValidationData).count(), 1);
        assert!(!source.all_self_signed());

        let complete: Vec<_> = source.refs_of(CertificateRefOrigin::CompleteCertificateRefs).collect();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].issuer_name.as_deref(), Some("CN=CA"));
        assert_eq!(complete[0].serial_number.as_deref(), Some("7"));
        let tsa = source.matching(complete[0]).unwrap();
        assert!(tsa.subject.ends_with("=TSA"));
        assert_eq!(source.identifier_for(complete[0]), tsa.id);
    }

    #[test]
    fn test_issuer_serial_v2() {
        let name = seq(&[tlv(0x31, &seq(&[oid(&[2, 5, 4, 3]), tlv(0x0c, b"Root")]))]);
        let general_names = seq(&[tlv(0xa4, &name)]);
        let der = seq(&[general_names, tlv(0x02, &[0x01, 0x00])]);
        let (issuer, serial) = parse_issuer_serial_v2(&der).unwrap();
        assert!(issuer.unwrap().ends_with("=Root"));
        assert_eq!(serial.as_deref(), Some("0100"));
    }

    #[test]
    fn test_ids_in() {
        let cert = certificate("A", "A", "491231235959Z", 1);
        let xml = format!(
            r#"<x:CertificateValues xmlns:x="http://uri.etsi.org/01903/v1.3.2#"><x:EncapsulatedX509Certificate>{}</x:EncapsulatedX509Certificate></x:CertificateValues>"#,
            encode_base64(&cert)
        );
        let doc = Document::parse(&xml).unwrap();
        assert_eq!(ids_in(doc.root_element()), vec![token_id(&cert)]);
    }
}
