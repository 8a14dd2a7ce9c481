#![forbid(unsafe_code)]

//! XAdES long-term signature validation and extension.
//!
//! The pipeline for one signature is strictly sequential:
//!
//! 1. resolve and digest every `ds:Reference` ([`validation`])
//! 2. extract embedded certificate and revocation material
//!    ([`certificate`], [`revocation`])
//! 3. rebuild the data covered by every embedded timestamp and link each
//!    token to the objects it covers ([`timestamp`])
//! 4. classify the signature against the baseline and extended profiles
//!    ([`level`])
//!
//! [`container::validate_document`] runs that pipeline for every signature
//! of a document, masters before their counter-signatures.
//! [`extension::SignatureExtender`] adds new timestamps.

pub mod certificate;
pub mod container;
pub mod context;
pub mod document;
pub mod extension;
pub mod level;
pub mod manifest;
pub mod reference;
pub mod report;
pub mod resolver;
pub mod revocation;
pub mod signature;
pub mod timestamp;
pub mod validation;

#[cfg(test)]
pub(crate) mod testutil;

pub use container::{validate_document, ContainerReport, SignatureOutcome};
pub use context::{ArchiveObjectPolicy, ValidationContext};
pub use document::{DigestDocument, DocumentSet, DocumentSource, InMemoryDocument};
pub use extension::{SignatureExtender, TokenSigner};
pub use level::SignatureLevel;
pub use report::SignatureReport;
pub use signature::{SignatureReportBuilder, XadesSignature};
