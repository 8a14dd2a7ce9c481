#![forbid(unsafe_code)]

/// Errors produced by the lindholmen XAdES library.
///
/// Recoverable validation outcomes (a reference that cannot be found, an
/// ambiguous id, an unsupported transform) are not errors: they are
/// recorded in the validation report. These variants abort the single
/// computation that raised them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("ASN.1 decoding error: {0}")]
    Asn1(String),

    #[error("timestamp data error: {0}")]
    TimestampData(String),

    #[error("{0}")]
    Other(String),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
