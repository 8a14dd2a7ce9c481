#![forbid(unsafe_code)]

//! XML namespace, element and attribute name constants.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XAdES 1.1.1 namespace (legacy)
pub const XADES_111: &str = "http://uri.etsi.org/01903/v1.1.1#";

/// XAdES 1.2.2 namespace (legacy)
pub const XADES_122: &str = "http://uri.etsi.org/01903/v1.2.2#";

/// XAdES 1.3.2 namespace, also used by the EN 319 132 `V2` properties
pub const XADES_132: &str = "http://uri.etsi.org/01903/v1.3.2#";

/// XAdES 1.4.1 namespace (archive timestamps, timestamp validation data)
pub const XADES_141: &str = "http://uri.etsi.org/01903/v1.4.1#";

/// ETSI EN 319 132 evidence record namespace
pub const XADES_EN: &str = "http://uri.etsi.org/19132/v1.1.1#";

/// Every namespace a XAdES qualifying property may live in.
pub const XADES_FAMILY: [&str; 5] = [XADES_132, XADES_141, XADES_122, XADES_111, XADES_EN];

/// Returns true if `uri` is one of the XAdES namespaces.
pub fn is_xades(uri: &str) -> bool {
    XADES_FAMILY.contains(&uri)
}

// ── Reference type URIs ──────────────────────────────────────────────

pub mod reference_type {
    pub const SIGNED_PROPERTIES: &str = "http://uri.etsi.org/01903#SignedProperties";
    pub const COUNTERSIGNED_SIGNATURE: &str = "http://uri.etsi.org/01903#CountersignedSignature";
    pub const MANIFEST: &str = "http://www.w3.org/2000/09/xmldsig#Manifest";
    pub const OBJECT: &str = "http://www.w3.org/2000/09/xmldsig#Object";
    pub const SIGNATURE_PROPERTIES: &str = "http://www.w3.org/2000/09/xmldsig#SignatureProperties";
}

// ── XML-DSig element names ───────────────────────────────────────────

pub mod node {
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const OBJECT: &str = "Object";
    pub const MANIFEST: &str = "Manifest";
    pub const SIGNATURE_PROPERTIES: &str = "SignatureProperties";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
    pub const X509_ISSUER_NAME: &str = "X509IssuerName";
    pub const X509_SERIAL_NUMBER: &str = "X509SerialNumber";
    pub const XPATH: &str = "XPath";
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";
}

// ── XAdES element names ──────────────────────────────────────────────

pub mod xades {
    pub const QUALIFYING_PROPERTIES: &str = "QualifyingProperties";
    pub const SIGNED_PROPERTIES: &str = "SignedProperties";
    pub const SIGNED_SIGNATURE_PROPERTIES: &str = "SignedSignatureProperties";
    pub const SIGNED_DATA_OBJECT_PROPERTIES: &str = "SignedDataObjectProperties";
    pub const UNSIGNED_PROPERTIES: &str = "UnsignedProperties";
    pub const UNSIGNED_SIGNATURE_PROPERTIES: &str = "UnsignedSignatureProperties";

    // Signed signature properties
    pub const SIGNING_TIME: &str = "SigningTime";
    pub const SIGNING_CERTIFICATE: &str = "SigningCertificate";
    pub const SIGNING_CERTIFICATE_V2: &str = "SigningCertificateV2";
    pub const CERT: &str = "Cert";
    pub const CERT_DIGEST: &str = "CertDigest";
    pub const ISSUER_SERIAL: &str = "IssuerSerial";
    pub const ISSUER_SERIAL_V2: &str = "IssuerSerialV2";
    pub const SIGNATURE_POLICY_IDENTIFIER: &str = "SignaturePolicyIdentifier";
    pub const SIGNATURE_POLICY_ID: &str = "SignaturePolicyId";
    pub const SIG_POLICY_HASH: &str = "SigPolicyHash";
    pub const SIGNATURE_POLICY_STORE: &str = "SignaturePolicyStore";
    pub const SIGNATURE_PRODUCTION_PLACE: &str = "SignatureProductionPlace";
    pub const SIGNATURE_PRODUCTION_PLACE_V2: &str = "SignatureProductionPlaceV2";
    pub const SIGNER_ROLE: &str = "SignerRole";
    pub const SIGNER_ROLE_V2: &str = "SignerRoleV2";

    // Signed data object properties
    pub const DATA_OBJECT_FORMAT: &str = "DataObjectFormat";
    pub const DESCRIPTION: &str = "Description";
    pub const OBJECT_IDENTIFIER: &str = "ObjectIdentifier";
    pub const MIME_TYPE: &str = "MimeType";
    pub const ENCODING: &str = "Encoding";
    pub const ALL_DATA_OBJECTS_TIMESTAMP: &str = "AllDataObjectsTimeStamp";
    pub const INDIVIDUAL_DATA_OBJECTS_TIMESTAMP: &str = "IndividualDataObjectsTimeStamp";
    pub const INCLUDE: &str = "Include";

    // Timestamps
    pub const ENCAPSULATED_TIMESTAMP: &str = "EncapsulatedTimeStamp";
    pub const SIGNATURE_TIMESTAMP: &str = "SignatureTimeStamp";
    pub const SIG_AND_REFS_TIMESTAMP: &str = "SigAndRefsTimeStamp";
    pub const SIG_AND_REFS_TIMESTAMP_V2: &str = "SigAndRefsTimeStampV2";
    pub const REFS_ONLY_TIMESTAMP: &str = "RefsOnlyTimeStamp";
    pub const REFS_ONLY_TIMESTAMP_V2: &str = "RefsOnlyTimeStampV2";
    pub const ARCHIVE_TIMESTAMP: &str = "ArchiveTimeStamp";
    pub const ARCHIVE_TIMESTAMP_V2: &str = "ArchiveTimeStampV2";

    // Unsigned signature properties
    pub const COUNTER_SIGNATURE: &str = "CounterSignature";
    pub const COMPLETE_CERTIFICATE_REFS: &str = "CompleteCertificateRefs";
    pub const COMPLETE_CERTIFICATE_REFS_V2: &str = "CompleteCertificateRefsV2";
    pub const COMPLETE_REVOCATION_REFS: &str = "CompleteRevocationRefs";
    pub const ATTRIBUTE_CERTIFICATE_REFS: &str = "AttributeCertificateRefs";
    pub const ATTRIBUTE_CERTIFICATE_REFS_V2: &str = "AttributeCertificateRefsV2";
    pub const ATTRIBUTE_REVOCATION_REFS: &str = "AttributeRevocationRefs";
    pub const CERTIFICATE_VALUES: &str = "CertificateValues";
    pub const ATTR_AUTHORITIES_CERT_VALUES: &str = "AttrAuthoritiesCertValues";
    pub const ENCAPSULATED_X509_CERTIFICATE: &str = "EncapsulatedX509Certificate";
    pub const REVOCATION_VALUES: &str = "RevocationValues";
    pub const ATTRIBUTE_REVOCATION_VALUES: &str = "AttributeRevocationValues";
    pub const CRL_VALUES: &str = "CRLValues";
    pub const OCSP_VALUES: &str = "OCSPValues";
    pub const ENCAPSULATED_CRL_VALUE: &str = "EncapsulatedCRLValue";
    pub const ENCAPSULATED_OCSP_VALUE: &str = "EncapsulatedOCSPValue";
    pub const CERT_REFS: &str = "CertRefs";
    pub const CRL_REFS: &str = "CRLRefs";
    pub const CRL_REF: &str = "CRLRef";
    pub const OCSP_REFS: &str = "OCSPRefs";
    pub const OCSP_REF: &str = "OCSPRef";
    pub const DIGEST_ALG_AND_VALUE: &str = "DigestAlgAndValue";
    pub const TIMESTAMP_VALIDATION_DATA: &str = "TimeStampValidationData";
    pub const SEALING_EVIDENCE_RECORDS: &str = "SealingEvidenceRecords";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const TYPE: &str = "Type";
    pub const ALGORITHM: &str = "Algorithm";
    pub const PREFIX_LIST: &str = "PrefixList";
    pub const TARGET: &str = "Target";
    pub const OBJECT_REFERENCE: &str = "ObjectReference";
    pub const REFERENCED_DATA: &str = "referencedData";
}
