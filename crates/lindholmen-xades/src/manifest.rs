#![forbid(unsafe_code)]

//! `ds:Manifest` entries against the detached document set.
//!
//! Entries carry no transforms: one that does is reported unvalidated
//! instead of being digested without them. Manifests do not nest.

use crate::document::DocumentSet;
use crate::reference::{Reference, ReferenceKind};
use crate::validation::{ReferenceValidation, ValidationStatus};
use lindholmen_core::{ns, Error};
use lindholmen_xml::{dom, IdIndex};
use roxmltree::Node;

pub struct ManifestValidator;

impl ManifestValidator {
    /// Validate each `ds:Reference` of `manifest`, matching documents by
    /// exact name.
    pub fn validate(manifest: Node<'_, '_>, documents: &DocumentSet) -> Vec<ReferenceValidation> {
        let doc = manifest.document();
        let ids = IdIndex::default();
        dom::find_child_elements(manifest, ns::DSIG, ns::node::REFERENCE)
            .into_iter()
            .map(|entry| match Reference::parse(entry, doc, &ids, documents) {
                Ok(reference) => Self::validate_entry(&reference, doc, documents),
                Err(e) => unparseable_entry(entry, e),
            })
            .collect()
    }

    fn validate_entry(
        reference: &Reference,
        doc: &roxmltree::Document<'_>,
        documents: &DocumentSet,
    ) -> ReferenceValidation {
        let mut validation = ReferenceValidation::pending(reference, doc);
        if reference.kind == ReferenceKind::Manifest {
            validation.status = ValidationStatus::Failed("nested manifest".into());
            return validation;
        }
        if reference.transform_count > 0 {
            validation.status = ValidationStatus::UnsupportedTransform;
            return validation;
        }
        let Some(source) = documents.find_exact(reference.uri.as_deref().unwrap_or("")) else {
            return validation;
        };
        validation.found = true;

        let method = match reference.digest_method() {
            Ok(method) => method,
            Err(e) => {
                validation.status = ValidationStatus::Failed(e.to_string());
                return validation;
            }
        };
        // Digest-only sources answer from their stored values.
        match source.digest(method) {
            Some(computed) => {
                validation.intact = computed == reference.digest_value;
                validation.status = if validation.intact {
                    ValidationStatus::Validated
                } else {
                    ValidationStatus::Failed("digest mismatch".into())
                };
                validation.computed_digest = Some(computed);
            }
            None => {
                validation.status =
                    ValidationStatus::Failed(format!("no {} digest available", method.name()));
            }
        }
        validation
    }
}

fn unparseable_entry(entry: Node<'_, '_>, error: Error) -> ReferenceValidation {
    ReferenceValidation {
        kind: ReferenceKind::DetachedDocument,
        id: entry.attribute(ns::attr::ID).map(str::to_owned),
        uri: entry.attribute(ns::attr::URI).map(str::to_owned),
        found: false,
        intact: false,
        duplicated: false,
        status: ValidationStatus::Failed(error.to_string()),
        digest_method: String::new(),
        expected_digest: Vec::new(),
        computed_digest: None,
        transforms: Vec::new(),
        nested: Vec::new(),
    }
}
