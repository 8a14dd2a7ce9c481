#![forbid(unsafe_code)]

//! Signature level classification.
//!
//! Structural facts are collected once into [`ProfileFacts`]. Two predicate
//! tables, one per profile family, then decide which rungs hold, and
//! [`classify`] folds both ladders into a single [`SignatureLevel`].

use crate::certificate::{CertificateOrigin, CertificateSource};
use crate::context::ValidationContext;
use crate::revocation::RevocationSource;
use crate::signature::{xades_children, XadesSignature};
use crate::timestamp::{ArchiveRevision, TimestampToken, TimestampType};
use crate::validation::ReferenceValidations;
use lindholmen_core::ns;
use lindholmen_xml::{dom, xpath};
use roxmltree::Node;
use serde::Serialize;
use std::fmt;

/// Conformance levels, in lattice order within each family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SignatureLevel {
    XmlNotEtsi,
    XadesBes,
    XadesEpes,
    XadesT,
    XadesC,
    XadesX,
    XadesXl,
    XadesA,
    XadesBaselineB,
    XadesBaselineT,
    XadesBaselineLt,
    XadesBaselineLta,
    /// Preserved by an embedded evidence record.
    XadesErs,
}

impl SignatureLevel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::XmlNotEtsi => "XML-NOT-ETSI",
            Self::XadesBes => "XAdES-BES",
            Self::XadesEpes => "XAdES-EPES",
            Self::XadesT => "XAdES-T",
            Self::XadesC => "XAdES-C",
            Self::XadesX => "XAdES-X",
            Self::XadesXl => "XAdES-XL",
            Self::XadesA => "XAdES-A",
            Self::XadesBaselineB => "XAdES-BASELINE-B",
            Self::XadesBaselineT => "XAdES-BASELINE-T",
            Self::XadesBaselineLt => "XAdES-BASELINE-LT",
            Self::XadesBaselineLta => "XAdES-BASELINE-LTA",
            Self::XadesErs => "XAdES-ERS",
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(
            self,
            Self::XadesBaselineB | Self::XadesBaselineT | Self::XadesBaselineLt | Self::XadesBaselineLta
        )
    }
}

impl fmt::Display for SignatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counted structural facts of one signature plus the reference and
/// timestamp outcomes the predicates need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFacts {
    pub evidence_records: bool,

    pub key_info_count: usize,
    pub canonicalization_count: usize,
    pub canonicalization_allowed: bool,
    pub reference_count: usize,
    pub max_transforms: usize,

    pub signing_time_count: usize,
    /// `SigningCertificate` plus `SigningCertificateV2`.
    pub signing_certificate_count: usize,
    /// Some `Cert` of a signing certificate property carries a `URI`.
    pub signing_certificate_uri: bool,
    /// The signing certificate reference matches a `KeyInfo` certificate.
    pub signing_certificate_in_key_info: bool,
    pub signing_certificate_refs: usize,
    pub key_info_reference_intact: bool,
    pub data_object_formats_valid: bool,
    pub signer_role_count: usize,
    pub production_place_count: usize,
    pub policy_identifier_count: usize,
    pub policy_store_count: usize,
    pub policy_hash_present: bool,

    pub signature_timestamps: usize,
    pub intact_signature_timestamps: usize,
    /// Every signature timestamp holds exactly one encapsulated token.
    pub signature_timestamps_single: bool,
    /// Every signature timestamp was generated before the signing
    /// certificate expired.
    pub signature_timestamps_before_expiry: bool,
    pub intact_validation_data_timestamps: usize,
    pub intact_archive_timestamps: usize,
    pub xades132_archive_timestamps: usize,

    pub certificate_values_count: usize,
    pub attr_authorities_cert_values_count: usize,
    pub revocation_values_count: usize,
    pub attribute_revocation_values_count: usize,
    /// `CompleteCertificateRefs` plus `CompleteCertificateRefsV2`.
    pub complete_certificate_refs_count: usize,
    pub complete_revocation_refs_count: usize,
    pub sig_and_refs_timestamps: usize,
    pub refs_only_timestamps: usize,

    pub all_self_signed: bool,
    /// Long-term validation material is embedded.
    pub lt_data: bool,
}

fn count(parent: Option<Node<'_, '_>>, names: &[&str]) -> usize {
    parent
        .map(|p| names.iter().map(|n| xades_children(p, n).len()).sum())
        .unwrap_or(0)
}

impl ProfileFacts {
    pub fn collect(
        signature: &XadesSignature<'_, '_>,
        ctx: &ValidationContext,
        references: &ReferenceValidations,
        certificates: &CertificateSource,
        revocations: &RevocationSource,
        timestamps: &[TimestampToken],
    ) -> Self {
        let ssp = signature.signed_signature_properties();
        let usp = signature.unsigned_signature_properties();

        let signing_properties: Vec<Node<'_, '_>> = ssp
            .map(|p| {
                let mut v = xades_children(p, ns::xades::SIGNING_CERTIFICATE);
                v.extend(xades_children(p, ns::xades::SIGNING_CERTIFICATE_V2));
                v
            })
            .unwrap_or_default();
        let signing_certificate_uri = signing_properties.iter().any(|p| {
            xades_children(*p, ns::xades::CERT)
                .iter()
                .any(|c| c.attribute(ns::attr::URI).is_some())
        });
        let signing_certificate_in_key_info = certificates
            .signing_certificate()
            .is_some_and(|c| c.origins.contains(&CertificateOrigin::KeyInfo));
        let signing_certificate_refs = certificates
            .refs()
            .iter()
            .filter(|r| r.origin.is_signing_certificate())
            .count();

        let policy = ssp.and_then(|p| xades_children(p, ns::xades::SIGNATURE_POLICY_IDENTIFIER).into_iter().next());
        let policy_hash_present = policy.is_some_and(|p| {
            p.descendants()
                .any(|n| dom::local_name_is(&n, &ns::XADES_FAMILY, ns::xades::SIG_POLICY_HASH))
        });

        let signing_certificate = certificates.signing_certificate();
        let signature_tokens: Vec<&TimestampToken> = timestamps
            .iter()
            .filter(|t| t.timestamp_type == TimestampType::Signature)
            .collect();
        let signature_timestamps_before_expiry = signature_tokens.iter().all(|t| {
            match (t.gen_time(), signing_certificate.and_then(|c| c.not_after)) {
                (Some(gen_time), Some(not_after)) => gen_time < not_after,
                (Some(_), None) => true,
                (None, _) => false,
            }
        });
        let intact = |ty: TimestampType| {
            timestamps
                .iter()
                .filter(|t| t.timestamp_type == ty && t.message_imprint_intact)
                .count()
        };
        let of_type = |ty: TimestampType| timestamps.iter().filter(|t| t.timestamp_type == ty).count();

        let lt_certificates = certificates.by_origin(CertificateOrigin::CertificateValues).next().is_some()
            || certificates
                .by_origin(CertificateOrigin::TimestampValidationData)
                .next()
                .is_some();
        let all_self_signed = certificates.all_self_signed();

        Self {
            evidence_records: count(usp, &[ns::xades::SEALING_EVIDENCE_RECORDS]) > 0,

            key_info_count: signature.key_info_count(),
            canonicalization_count: signature.canonicalization_method_count(),
            canonicalization_allowed: signature
                .canonicalization_method()
                .is_some_and(|uri| ctx.is_allowed_canonicalization(uri)),
            reference_count: references.references.len(),
            max_transforms: references
                .references
                .iter()
                .map(|r| r.transform_count)
                .max()
                .unwrap_or(0),

            signing_time_count: count(ssp, &[ns::xades::SIGNING_TIME]),
            signing_certificate_count: signing_properties.len(),
            signing_certificate_uri,
            signing_certificate_in_key_info,
            signing_certificate_refs,
            key_info_reference_intact: references.key_info().is_some_and(|v| v.found && v.intact),
            data_object_formats_valid: data_object_formats_valid(signature, references),
            signer_role_count: count(ssp, &[ns::xades::SIGNER_ROLE, ns::xades::SIGNER_ROLE_V2]),
            production_place_count: count(
                ssp,
                &[ns::xades::SIGNATURE_PRODUCTION_PLACE, ns::xades::SIGNATURE_PRODUCTION_PLACE_V2],
            ),
            policy_identifier_count: count(ssp, &[ns::xades::SIGNATURE_POLICY_IDENTIFIER]),
            policy_store_count: count(usp, &[ns::xades::SIGNATURE_POLICY_STORE])
                + count(ssp, &[ns::xades::SIGNATURE_POLICY_STORE]),
            policy_hash_present,

            signature_timestamps: signature_tokens.len(),
            intact_signature_timestamps: intact(TimestampType::Signature),
            signature_timestamps_single: signature_tokens.iter().all(|t| t.encapsulated_count == 1),
            signature_timestamps_before_expiry,
            intact_validation_data_timestamps: intact(TimestampType::SigAndRefs) + intact(TimestampType::RefsOnly),
            intact_archive_timestamps: intact(TimestampType::Archive),
            xades132_archive_timestamps: timestamps
                .iter()
                .filter(|t| t.archive_revision == Some(ArchiveRevision::Xades132))
                .count(),

            certificate_values_count: count(usp, &[ns::xades::CERTIFICATE_VALUES]),
            attr_authorities_cert_values_count: count(usp, &[ns::xades::ATTR_AUTHORITIES_CERT_VALUES]),
            revocation_values_count: count(usp, &[ns::xades::REVOCATION_VALUES]),
            attribute_revocation_values_count: count(usp, &[ns::xades::ATTRIBUTE_REVOCATION_VALUES]),
            complete_certificate_refs_count: count(
                usp,
                &[ns::xades::COMPLETE_CERTIFICATE_REFS, ns::xades::COMPLETE_CERTIFICATE_REFS_V2],
            ),
            complete_revocation_refs_count: count(usp, &[ns::xades::COMPLETE_REVOCATION_REFS]),
            sig_and_refs_timestamps: of_type(TimestampType::SigAndRefs),
            refs_only_timestamps: of_type(TimestampType::RefsOnly),

            all_self_signed,
            lt_data: lt_certificates && (!revocations.is_empty() || all_self_signed),
        }
    }
}

/// Every `DataObjectFormat` has a `MimeType` and names an existing
/// reference, and every signed-data reference with an id has a format.
fn data_object_formats_valid(signature: &XadesSignature<'_, '_>, references: &ReferenceValidations) -> bool {
    let formats = signature
        .signed_data_object_properties()
        .map(|p| xades_children(p, ns::xades::DATA_OBJECT_FORMAT))
        .unwrap_or_default();
    let mut described: Vec<&str> = Vec::new();
    for format in &formats {
        if xades_children(*format, ns::xades::MIME_TYPE).is_empty() {
            return false;
        }
        let Some(id) = format
            .attribute(ns::attr::OBJECT_REFERENCE)
            .and_then(xpath::parse_same_document_ref)
        else {
            return false;
        };
        if references.position_of(id).is_none() {
            return false;
        }
        described.push(id);
    }
    references
        .references
        .iter()
        .filter(|r| r.kind.is_signed_data())
        .filter_map(|r| r.id.as_deref())
        .all(|id| described.contains(&id))
}

/// One rung of a profile ladder.
pub struct Rung {
    pub level: SignatureLevel,
    /// The rung below, which must hold as well.
    pub requires: Option<SignatureLevel>,
    pub predicate: fn(&ProfileFacts) -> bool,
}

/// The outcome of one rung for one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredicateOutcome {
    pub level: SignatureLevel,
    /// The rung's own predicate.
    pub predicate: bool,
    /// The predicate and every rung it requires.
    pub holds: bool,
}

/// Rungs of one profile family in lattice order.
pub struct PredicateTable {
    pub name: &'static str,
    pub rungs: &'static [Rung],
}

impl PredicateTable {
    fn rung(&self, level: SignatureLevel) -> Option<&Rung> {
        self.rungs.iter().find(|r| r.level == level)
    }

    /// True when the rung for `level` and the chain below it hold. Levels
    /// outside this table never hold.
    pub fn holds(&self, level: SignatureLevel, facts: &ProfileFacts) -> bool {
        let mut next = Some(level);
        while let Some(level) = next {
            let Some(rung) = self.rung(level) else {
                return false;
            };
            if !(rung.predicate)(facts) {
                return false;
            }
            next = rung.requires;
        }
        true
    }

    pub fn evaluate(&self, facts: &ProfileFacts) -> Vec<PredicateOutcome> {
        self.rungs
            .iter()
            .map(|r| PredicateOutcome {
                level: r.level,
                predicate: (r.predicate)(facts),
                holds: self.holds(r.level, facts),
            })
            .collect()
    }
}

fn baseline_b(f: &ProfileFacts) -> bool {
    f.key_info_count == 1
        && f.canonicalization_count == 1
        && f.canonicalization_allowed
        && f.reference_count >= 2
        && f.max_transforms <= 1
        && f.signing_time_count == 1
        && f.signing_certificate_count == 1
        && !f.signing_certificate_uri
        && f.data_object_formats_valid
        && f.signer_role_count <= 1
        && f.production_place_count <= 1
        && f.policy_identifier_count <= 1
        && f.policy_store_count <= 1
        && f.xades132_archive_timestamps == 0
        && f.signing_certificate_in_key_info
}

fn baseline_t(f: &ProfileFacts) -> bool {
    f.intact_signature_timestamps >= 1 && f.signature_timestamps_single && f.signature_timestamps_before_expiry
}

fn baseline_lt(f: &ProfileFacts) -> bool {
    f.certificate_values_count <= 1
        && f.attr_authorities_cert_values_count <= 1
        && f.revocation_values_count <= 1
        && f.attribute_revocation_values_count <= 1
        && f.complete_certificate_refs_count == 0
        && f.complete_revocation_refs_count == 0
        && f.sig_and_refs_timestamps == 0
        && f.refs_only_timestamps == 0
        && f.lt_data
}

fn archived(f: &ProfileFacts) -> bool {
    f.intact_archive_timestamps >= 1
}

fn bes(f: &ProfileFacts) -> bool {
    f.signing_time_count <= 1
        && f.signing_certificate_count <= 1
        && f.production_place_count <= 1
        && f.signer_role_count <= 1
        && (f.signing_certificate_refs > 0 || f.key_info_reference_intact)
}

fn epes(f: &ProfileFacts) -> bool {
    f.policy_identifier_count == 1 && f.policy_store_count <= 1 && (f.policy_store_count == 0 || f.policy_hash_present)
}

fn extended_t(f: &ProfileFacts) -> bool {
    f.intact_signature_timestamps >= 1
}

fn extended_c(f: &ProfileFacts) -> bool {
    let certificate_refs =
        f.complete_certificate_refs_count == 1 || (f.complete_certificate_refs_count == 0 && f.all_self_signed);
    certificate_refs && f.complete_revocation_refs_count == 1
}

fn extended_x(f: &ProfileFacts) -> bool {
    f.intact_validation_data_timestamps >= 1
}

fn extended_xl(f: &ProfileFacts) -> bool {
    f.lt_data
}

pub const BASELINE: PredicateTable = PredicateTable {
    name: "baseline",
    rungs: &[
        Rung { level: SignatureLevel::XadesBaselineB, requires: None, predicate: baseline_b },
        Rung {
            level: SignatureLevel::XadesBaselineT,
            requires: Some(SignatureLevel::XadesBaselineB),
            predicate: baseline_t,
        },
        Rung {
            level: SignatureLevel::XadesBaselineLt,
            requires: Some(SignatureLevel::XadesBaselineT),
            predicate: baseline_lt,
        },
        Rung {
            level: SignatureLevel::XadesBaselineLta,
            requires: Some(SignatureLevel::XadesBaselineLt),
            predicate: archived,
        },
    ],
};

pub const EXTENDED: PredicateTable = PredicateTable {
    name: "extended",
    rungs: &[
        Rung { level: SignatureLevel::XadesBes, requires: None, predicate: bes },
        Rung { level: SignatureLevel::XadesEpes, requires: Some(SignatureLevel::XadesBes), predicate: epes },
        Rung { level: SignatureLevel::XadesT, requires: Some(SignatureLevel::XadesBes), predicate: extended_t },
        Rung { level: SignatureLevel::XadesC, requires: Some(SignatureLevel::XadesT), predicate: extended_c },
        Rung { level: SignatureLevel::XadesX, requires: Some(SignatureLevel::XadesC), predicate: extended_x },
        Rung { level: SignatureLevel::XadesXl, requires: Some(SignatureLevel::XadesX), predicate: extended_xl },
        Rung { level: SignatureLevel::XadesA, requires: Some(SignatureLevel::XadesXl), predicate: archived },
    ],
};

/// The level of a signature. Defined for every set of facts.
pub fn classify(facts: &ProfileFacts) -> SignatureLevel {
    use SignatureLevel::*;

    let baseline = |level| BASELINE.holds(level, facts);
    let extended = |level| EXTENDED.holds(level, facts);

    if facts.evidence_records {
        return XadesErs;
    }
    if !extended(XadesBes) {
        return XmlNotEtsi;
    }
    if !extended(XadesT) {
        return if baseline(XadesBaselineB) {
            XadesBaselineB
        } else if extended(XadesEpes) {
            XadesEpes
        } else {
            XadesBes
        };
    }
    if baseline(XadesBaselineLt) {
        return if baseline(XadesBaselineLta) { XadesBaselineLta } else { XadesBaselineLt };
    }
    if extended(XadesC) {
        return [XadesA, XadesXl, XadesX]
            .into_iter()
            .find(|level| extended(*level))
            .unwrap_or(XadesC);
    }
    if baseline(XadesBaselineT) {
        XadesBaselineT
    } else {
        XadesT
    }
}
