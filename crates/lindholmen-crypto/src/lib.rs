#![forbid(unsafe_code)]

//! Digest algorithms and encoding helpers for the lindholmen XAdES library.
//!
//! Digests are identified either by their XML-DSig URI (references, XAdES
//! `DigestAlgAndValue`) or by their ASN.1 OID (timestamp message imprints).

pub mod digest;
pub mod encoding;

pub use digest::{DigestAlgorithm, DigestMethod};
