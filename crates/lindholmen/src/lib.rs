#![forbid(unsafe_code)]

//! Lindholmen: validation and extension of XAdES long-term signatures.
//!
//! [`xades::validate_document`] checks every signature of a document and
//! classifies its level. [`xades::SignatureExtender`] adds timestamps.

pub use lindholmen_core as core;
pub use lindholmen_xml as xml;
pub use lindholmen_c14n as c14n;
pub use lindholmen_crypto as crypto;
pub use lindholmen_transforms as transforms;
pub use lindholmen_xades as xades;

pub use lindholmen_core::{Error, Result};
pub use lindholmen_xades::{validate_document, SignatureExtender, SignatureLevel, ValidationContext};
