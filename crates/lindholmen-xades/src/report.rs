#![forbid(unsafe_code)]

//! The immutable per-signature validation report.

use crate::certificate::CertificateSource;
use crate::level::{PredicateOutcome, SignatureLevel};
use crate::revocation::RevocationSource;
use crate::timestamp::{TimestampToken, TimestampType};
use crate::validation::ReferenceValidation;
use serde::{Serialize, Serializer};
use std::fmt::Display;

/// Everything computed for one signature.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureReport {
    pub id: Option<String>,
    /// Id of the signature this one counter-signs.
    pub master_id: Option<String>,
    pub signature_value_id: Option<String>,
    pub xades_namespace: Option<String>,
    pub signing_time: Option<String>,
    pub signature_method: Option<String>,
    pub canonicalization_method: Option<String>,
    pub references: Vec<ReferenceValidation>,
    pub reference_data_found: bool,
    pub reference_data_intact: bool,
    pub certificates: CertificateSource,
    pub revocations: RevocationSource,
    /// Content timestamps first, then unsigned ones in document order.
    pub timestamps: Vec<TimestampToken>,
    pub level: SignatureLevel,
    pub baseline_predicates: Vec<PredicateOutcome>,
    pub extended_predicates: Vec<PredicateOutcome>,
    /// Recoverable problems met while building the report.
    pub errors: Vec<String>,
}

impl SignatureReport {
    pub fn timestamps_of(&self, timestamp_type: TimestampType) -> impl Iterator<Item = &TimestampToken> {
        self.timestamps
            .iter()
            .filter(move |t| t.timestamp_type == timestamp_type)
    }
}

pub(crate) fn hex_bytes<T: AsRef<[u8]>, S: Serializer>(bytes: &T, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

pub(crate) fn hex_opt<T: AsRef<[u8]>, S: Serializer>(
    bytes: &Option<T>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(b) => s.serialize_some(&hex::encode(b)),
        None => s.serialize_none(),
    }
}

pub(crate) fn display<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

pub(crate) fn display_opt<T: Display, S: Serializer>(
    value: &Option<T>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.serialize_some(&v.to_string()),
        None => s.serialize_none(),
    }
}
