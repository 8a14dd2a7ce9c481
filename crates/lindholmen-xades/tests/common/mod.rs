#![forbid(unsafe_code)]

//! Fixtures shared by the integration tests: hand-assembled DER, a test
//! time-stamping authority and a baseline-B signature over a detached file.

use lindholmen_c14n::{canonicalize_doc, C14nMode};
use lindholmen_core::Result;
use lindholmen_crypto::encoding::encode_base64;
use lindholmen_crypto::DigestMethod;
use lindholmen_xades::container::SignatureOutcome;
use lindholmen_xades::{validate_document, InMemoryDocument, SignatureReport, TokenSigner, ValidationContext};
use lindholmen_xml::{dom, NodeSet, XmlDocument};

pub const DOCUMENT: &[u8] = b"Minutes of the annual meeting.\n";
pub const GEN_TIME: &str = "20260101000000Z";

pub fn sha256(data: &[u8]) -> Vec<u8> {
    DigestMethod::Sha256.digest(data).unwrap()
}

pub fn sha256_b64(data: &[u8]) -> String {
    encode_base64(&sha256(data))
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if content.len() < 0x80 {
        out.push(content.len() as u8);
    } else {
        let len: Vec<u8> = content.len().to_be_bytes().into_iter().skip_while(|b| *b == 0).collect();
        out.push(0x80 | len.len() as u8);
        out.extend(len);
    }
    out.extend_from_slice(content);
    out
}

fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

fn set(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x31, &parts.concat())
}

fn oid(arcs: &[u64]) -> Vec<u8> {
    let mut body = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        let mut chunk = vec![(arc & 0x7f) as u8];
        let mut rest = arc >> 7;
        while rest > 0 {
            chunk.push(0x80 | (rest & 0x7f) as u8);
            rest >>= 7;
        }
        chunk.reverse();
        body.extend(chunk);
    }
    tlv(0x06, &body)
}

fn sha256_with_rsa() -> Vec<u8> {
    seq(&[oid(&[1, 2, 840, 113549, 1, 1, 11]), vec![0x05, 0x00]])
}

fn common_name(cn: &str) -> Vec<u8> {
    seq(&[set(&[seq(&[oid(&[2, 5, 4, 3]), tlv(0x0c, cn.as_bytes())])])])
}

/// A self-signed certificate valid until the end of 2049.
pub fn signer_certificate() -> Vec<u8> {
    let tbs = seq(&[
        tlv(0xa0, &tlv(0x02, &[2])),
        tlv(0x02, &[0x2a]),
        sha256_with_rsa(),
        common_name("Board Secretary"),
        seq(&[tlv(0x17, b"250101000000Z"), tlv(0x17, b"491231235959Z")]),
        common_name("Board Secretary"),
        seq(&[
            seq(&[oid(&[1, 2, 840, 113549, 1, 1, 1]), vec![0x05, 0x00]]),
            tlv(0x03, &[0x00, 0x30, 0x03, 0x02, 0x01, 0x03]),
        ]),
    ]);
    seq(&[tbs, sha256_with_rsa(), tlv(0x03, &[0x00, 0x01, 0x02, 0x03])])
}

/// An empty v1 CRL issued by the signer.
pub fn crl() -> Vec<u8> {
    let tbs = seq(&[
        tlv(0x02, &[1]),
        sha256_with_rsa(),
        common_name("Board Secretary"),
        tlv(0x17, b"260101000000Z"),
        tlv(0x17, b"260201000000Z"),
    ]);
    seq(&[tbs, sha256_with_rsa(), tlv(0x03, &[0x00, 0xaa])])
}

/// A CMS timestamp token whose TSTInfo imprints `digest`.
pub fn timestamp_token(method: DigestMethod, digest: &[u8]) -> Vec<u8> {
    let tst_info = seq(&[
        tlv(0x02, &[1]),
        oid(&[1, 2, 3, 4]),
        seq(&[seq(&[oid(method.oid()), vec![0x05, 0x00]]), tlv(0x04, digest)]),
        tlv(0x02, &[0x07]),
        tlv(0x18, GEN_TIME.as_bytes()),
    ]);
    let signed_data = seq(&[
        tlv(0x02, &[3]),
        set(&[seq(&[oid(method.oid())])]),
        seq(&[oid(&[1, 2, 840, 113549, 1, 9, 16, 1, 4]), tlv(0xa0, &tlv(0x04, &tst_info))]),
        set(&[]),
    ]);
    seq(&[oid(&[1, 2, 840, 113549, 1, 7, 2]), tlv(0xa0, &signed_data)])
}

/// Stamps whatever digest it is given.
pub struct TestAuthority;

impl TokenSigner for TestAuthority {
    fn timestamp(&self, digest_method: DigestMethod, digest: &[u8]) -> Result<Vec<u8>> {
        Ok(timestamp_token(digest_method, digest))
    }
}

/// Ignores the digest it is given and stamps a fixed one instead.
pub struct MisdirectedAuthority {
    pub digest: Vec<u8>,
}

impl TokenSigner for MisdirectedAuthority {
    fn timestamp(&self, digest_method: DigestMethod, _digest: &[u8]) -> Result<Vec<u8>> {
        Ok(timestamp_token(digest_method, &self.digest))
    }
}

pub fn context() -> ValidationContext {
    ValidationContext::new().with_document(InMemoryDocument::new("document.txt", DOCUMENT.to_vec()))
}

const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// A baseline-B signature over `document.txt`. `references` and `objects`
/// are appended to `SignedInfo` and to the signature; a `DigestValue` of
/// `@id@` is replaced with the digest of the element carrying that id.
pub fn signature_with(references: &str, objects: &str) -> String {
    let cert = signer_certificate();
    let template = format!(
        r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="sig"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{EXC_C14N}"/><ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/><ds:Reference Id="r-doc" URI="document.txt"><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>{doc_digest}</ds:DigestValue></ds:Reference><ds:Reference Type="http://uri.etsi.org/01903#SignedProperties" URI="#sp"><ds:Transforms><ds:Transform Algorithm="{EXC_C14N}"/></ds:Transforms><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>@sp@</ds:DigestValue></ds:Reference>{references}</ds:SignedInfo><ds:SignatureValue Id="sig-value">c2lnbmF0dXJl</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert_b64}</ds:X509Certificate></ds:X509Data></ds:KeyInfo><ds:Object><xades:QualifyingProperties xmlns:xades="http://uri.etsi.org/01903/v1.3.2#" Target="#sig"><xades:SignedProperties Id="sp"><xades:SignedSignatureProperties><xades:SigningTime>2025-12-31T23:00:00Z</xades:SigningTime><xades:SigningCertificateV2><xades:Cert><xades:CertDigest><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>{cert_digest}</ds:DigestValue></xades:CertDigest></xades:Cert></xades:SigningCertificateV2></xades:SignedSignatureProperties><xades:SignedDataObjectProperties><xades:DataObjectFormat ObjectReference="#r-doc"><xades:MimeType>text/plain</xades:MimeType></xades:DataObjectFormat></xades:SignedDataObjectProperties></xades:SignedProperties></xades:QualifyingProperties></ds:Object>{objects}</ds:Signature>"##,
        doc_digest = sha256_b64(DOCUMENT),
        cert_b64 = encode_base64(&cert),
        cert_digest = sha256_b64(&cert),
    );
    seal(template)
}

pub fn baseline_b_signature() -> String {
    signature_with("", "")
}

/// Replace every `@id@` digest placeholder. The placeholders live in
/// `SignedInfo`, outside the elements they digest.
fn seal(template: String) -> String {
    let mut sealed = template.clone();
    let doc = lindholmen_xml::parse(&template).unwrap();
    for value in dom::find_elements(&doc, lindholmen_core::ns::DSIG, "DigestValue") {
        let text = dom::element_text(value);
        let Some(id) = text.strip_prefix('@').and_then(|t| t.strip_suffix('@')) else {
            continue;
        };
        let target = doc
            .descendants()
            .find(|n| n.attribute("Id") == Some(id))
            .unwrap();
        let transformed = value
            .parent()
            .and_then(|r| dom::find_child_element(r, lindholmen_core::ns::DSIG, "Transforms"))
            .is_some();
        let mode = if transformed { C14nMode::Exclusive } else { C14nMode::Inclusive };
        let bytes = canonicalize_doc(&doc, mode, Some(&NodeSet::tree(target, false)), &[]).unwrap();
        sealed = sealed.replace(text, &sha256_b64(&bytes));
    }
    sealed
}

/// Insert `properties` at the end of `UnsignedSignatureProperties`.
pub fn append_unsigned(xml: &str, properties: &str) -> String {
    let end = "</xades:UnsignedSignatureProperties>";
    assert!(xml.contains(end), "no unsigned signature properties");
    xml.replacen(end, &format!("{properties}{end}"), 1)
}

/// Complete refs and values naming the signer certificate and its CRL.
pub fn validation_data() -> String {
    let cert = signer_certificate();
    let crl = crl();
    format!(
        r#"<xades:CompleteCertificateRefs><xades:CertRefs><xades:Cert><xades:CertDigest><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>{cert_digest}</ds:DigestValue></xades:CertDigest></xades:Cert></xades:CertRefs></xades:CompleteCertificateRefs><xades:CompleteRevocationRefs><xades:CRLRefs><xades:CRLRef><xades:DigestAlgAndValue><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>{crl_digest}</ds:DigestValue></xades:DigestAlgAndValue></xades:CRLRef></xades:CRLRefs></xades:CompleteRevocationRefs>{values}"#,
        cert_digest = sha256_b64(&cert),
        crl_digest = sha256_b64(&crl),
        values = certificate_values() + &format!(
            "<xades:RevocationValues><xades:CRLValues><xades:EncapsulatedCRLValue>{}</xades:EncapsulatedCRLValue></xades:CRLValues></xades:RevocationValues>",
            encode_base64(&crl)
        ),
    )
}

pub fn certificate_values() -> String {
    format!(
        "<xades:CertificateValues><xades:EncapsulatedX509Certificate>{}</xades:EncapsulatedX509Certificate></xades:CertificateValues>",
        encode_base64(&signer_certificate())
    )
}

/// Validate the document and return the report of signature `sig`.
pub fn report(xml: &str, ctx: &ValidationContext) -> SignatureReport {
    let container = validate_document(&XmlDocument::parse(xml.to_owned()).unwrap(), ctx).unwrap();
    match container.find("sig") {
        Some(SignatureOutcome::Validated(report)) => (**report).clone(),
        other => panic!("signature not validated: {other:?}"),
    }
}
