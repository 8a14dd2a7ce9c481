#![forbid(unsafe_code)]

//! Reference validation engine.
//!
//! Every `ds:Reference` of a signature is resolved, run through its transform
//! chain and digested. The outcome records whether the content was found,
//! whether the digest matched and whether the id it names is carried by more
//! than one element. A duplicated id is never intact, whatever the digest
//! says: accepting it would let a grafted element with the same id stand in
//! for the signed one.

use crate::manifest::ManifestValidator;
use crate::reference::{Reference, ReferenceKind};
use crate::report::{hex_bytes, hex_opt};
use crate::resolver::{Resolution, ResolveContext, ResolvedContent, ResolverChain};
use crate::signature::XadesSignature;
use lindholmen_c14n::C14nMode;
use lindholmen_core::{ns, Error, Result};
use lindholmen_transforms::{TransformChain, TransformData};
use lindholmen_xml::{dom, NodeSet};
use roxmltree::Document;
use serde::Serialize;

/// Why a reference is or is not intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationStatus {
    Validated,
    NotFound,
    Ambiguous,
    UnsupportedTransform,
    Failed(String),
}

/// The outcome for one reference.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceValidation {
    pub kind: ReferenceKind,
    pub id: Option<String>,
    pub uri: Option<String>,
    pub found: bool,
    pub intact: bool,
    pub duplicated: bool,
    pub status: ValidationStatus,
    pub digest_method: String,
    #[serde(serialize_with = "hex_bytes")]
    pub expected_digest: Vec<u8>,
    #[serde(serialize_with = "hex_opt")]
    pub computed_digest: Option<Vec<u8>>,
    pub transforms: Vec<String>,
    /// Manifest entries, one level deep.
    pub nested: Vec<ReferenceValidation>,
}

impl ReferenceValidation {
    /// A not-yet-resolved outcome for `reference`.
    pub fn pending(reference: &Reference, doc: &Document<'_>) -> Self {
        let transforms = reference
            .transforms_element(doc)
            .map(|t| {
                dom::find_child_elements(t, ns::DSIG, ns::node::TRANSFORM)
                    .into_iter()
                    .filter_map(|n| n.attribute(ns::attr::ALGORITHM))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            kind: reference.kind,
            id: reference.id.clone(),
            uri: reference.uri.clone(),
            found: false,
            intact: false,
            duplicated: false,
            status: ValidationStatus::NotFound,
            digest_method: reference.digest_method_uri.clone(),
            expected_digest: reference.digest_value.clone(),
            computed_digest: None,
            transforms,
            nested: Vec::new(),
        }
    }

    fn fail(&mut self, status: ValidationStatus) {
        self.intact = false;
        self.status = status;
    }
}

/// All reference outcomes of one signature, with the transformed content
/// each reference produced.
#[derive(Debug, Clone, Default)]
pub struct ReferenceValidations {
    pub references: Vec<Reference>,
    pub validations: Vec<ReferenceValidation>,
    outputs: Vec<Option<TransformData>>,
}

impl ReferenceValidations {
    /// True when every reference resolved.
    pub fn all_found(&self) -> bool {
        self.validations.iter().all(|v| v.found)
    }

    /// True when every reference resolved, matched its digest and named a
    /// unique element.
    pub fn all_intact(&self) -> bool {
        self.validations.iter().all(|v| v.found && v.intact && !v.duplicated)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Reference, &ReferenceValidation)> {
        self.references.iter().zip(self.validations.iter())
    }

    fn first_of(&self, kind: ReferenceKind) -> Option<&ReferenceValidation> {
        self.validations.iter().find(|v| v.kind == kind)
    }

    pub fn signed_properties(&self) -> Option<&ReferenceValidation> {
        self.first_of(ReferenceKind::SignedProperties)
    }

    pub fn key_info(&self) -> Option<&ReferenceValidation> {
        self.first_of(ReferenceKind::KeyInfo)
    }

    /// Position of the reference whose `Id` is `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.references.iter().position(|r| r.id.as_deref() == Some(id))
    }

    /// The transformed content of reference `index` as octets; a node set is
    /// canonicalized with `mode`.
    pub fn bytes_for(&self, index: usize, doc: &Document<'_>, mode: C14nMode) -> Result<Vec<u8>> {
        let label = self
            .references
            .get(index)
            .map(|r| r.label().to_owned())
            .unwrap_or_else(|| index.to_string());
        match self.outputs.get(index) {
            Some(Some(TransformData::Binary(bytes))) => Ok(bytes.clone()),
            Some(Some(TransformData::NodeSet(set))) => {
                lindholmen_c14n::canonicalize_doc(doc, mode, Some(set), &[])
            }
            _ => Err(Error::TimestampData(format!(
                "no content available for reference {label}"
            ))),
        }
    }
}

/// Drives the resolver chain over a signature's references.
pub struct ReferenceValidator<'r> {
    resolvers: &'r ResolverChain,
}

impl<'r> ReferenceValidator<'r> {
    pub fn new(resolvers: &'r ResolverChain) -> Self {
        Self { resolvers }
    }

    /// Validate every reference of `signature` in declaration order.
    pub fn validate_all(
        &self,
        signature: &XadesSignature<'_, '_>,
        rctx: &ResolveContext<'_, '_>,
    ) -> Result<ReferenceValidations> {
        let mut result = ReferenceValidations::default();
        for reference in signature.references(rctx.documents)? {
            let (validation, output) = self.validate_one(&reference, rctx);
            log::debug!(
                "reference {}: found={} intact={} duplicated={}",
                reference.label(),
                validation.found,
                validation.intact,
                validation.duplicated
            );
            result.references.push(reference);
            result.validations.push(validation);
            result.outputs.push(output);
        }
        Ok(result)
    }

    fn validate_one(
        &self,
        reference: &Reference,
        rctx: &ResolveContext<'_, '_>,
    ) -> (ReferenceValidation, Option<TransformData>) {
        let doc = rctx.doc;
        let mut validation = ReferenceValidation::pending(reference, doc);
        validation.duplicated = reference
            .target_id()
            .is_some_and(|id| rctx.ids.is_duplicated(id));

        let content = match self.resolvers.resolve(reference, rctx) {
            Ok(Resolution::Found(content)) => content,
            Ok(Resolution::NotFound) => return (validation, None),
            Ok(Resolution::Ambiguous(_)) => {
                validation.found = true;
                validation.duplicated = true;
                validation.fail(ValidationStatus::Ambiguous);
                return (validation, None);
            }
            Err(e) => {
                validation.fail(ValidationStatus::Failed(e.to_string()));
                return (validation, None);
            }
        };
        validation.found = true;

        if reference.kind == ReferenceKind::Manifest {
            if let Some(manifest) = reference.target.and_then(|id| doc.get_node(id)) {
                validation.nested = ManifestValidator::validate(manifest, rctx.documents);
            }
        }

        let method = match reference.digest_method() {
            Ok(method) => method,
            Err(e) => {
                validation.fail(ValidationStatus::Failed(e.to_string()));
                return (validation, None);
            }
        };

        let input = match content {
            ResolvedContent::Digest { method: stored, value } => {
                if reference.transform_count > 0 {
                    validation.fail(ValidationStatus::UnsupportedTransform);
                } else if stored != method {
                    validation.fail(ValidationStatus::Failed(format!(
                        "no {} digest available",
                        method.name()
                    )));
                } else {
                    validation.intact = value == reference.digest_value && !validation.duplicated;
                    validation.computed_digest = Some(value);
                    validation.status = status_of(&validation);
                }
                return (validation, None);
            }
            ResolvedContent::Document { bytes } => TransformData::Binary(bytes),
            ResolvedContent::NodeSet(set) => TransformData::NodeSet(set),
            ResolvedContent::Element(id) => match doc.get_node(id) {
                Some(node) => TransformData::NodeSet(NodeSet::tree(node, false)),
                None => {
                    validation.fail(ValidationStatus::Failed("element vanished".into()));
                    return (validation, None);
                }
            },
        };

        let output = match TransformChain::from_element(reference.transforms_element(doc), rctx.signature)
            .and_then(|chain| chain.execute(doc, input))
        {
            Ok(output) => output,
            Err(Error::UnsupportedAlgorithm(what)) => {
                log::warn!("reference {}: unsupported transform {what}", reference.label());
                validation.fail(ValidationStatus::UnsupportedTransform);
                return (validation, None);
            }
            Err(e) => {
                validation.fail(ValidationStatus::Failed(e.to_string()));
                return (validation, None);
            }
        };

        let digest = output
            .clone()
            .into_bytes(doc, C14nMode::Inclusive)
            .and_then(|bytes| {
                log::trace!(
                    "pre-digest data of reference {}: {}",
                    reference.label(),
                    String::from_utf8_lossy(&bytes)
                );
                method.digest(&bytes)
            });
        match digest {
            Ok(computed) => {
                validation.intact = computed == reference.digest_value && !validation.duplicated;
                validation.computed_digest = Some(computed);
                validation.status = status_of(&validation);
            }
            Err(e) => validation.fail(ValidationStatus::Failed(e.to_string())),
        }
        (validation, Some(output))
    }
}

fn status_of(validation: &ReferenceValidation) -> ValidationStatus {
    if validation.intact {
        ValidationStatus::Validated
    } else if validation.duplicated {
        ValidationStatus::Ambiguous
    } else {
        ValidationStatus::Failed("digest mismatch".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DigestDocument, DocumentSet, InMemoryDocument};
    use crate::testutil::sha256_b64;
    use lindholmen_crypto::DigestMethod;
    use lindholmen_xml::IdIndex;

    fn run(xml: &str, documents: &DocumentSet) -> ReferenceValidations {
        let doc = Document::parse(xml).unwrap();
        let ids = IdIndex::build(&doc, &[]);
        let node = dom::find_element(&doc, ns::DSIG, ns::node::SIGNATURE).unwrap();
        let signature = XadesSignature::new(&doc, &ids, node);
        let rctx = ResolveContext {
            doc: &doc,
            ids: &ids,
            signature: node,
            documents,
            counter_signed: None,
            master_signature_value: None,
        };
        let chain = ResolverChain::standard();
        ReferenceValidator::new(&chain).validate_all(&signature, &rctx).unwrap()
    }

    fn reference(uri: &str, digest: &str, extra: &str) -> String {
        format!(
            r#"<ds:Reference URI="{uri}">{extra}<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>{digest}</ds:DigestValue></ds:Reference>"#
        )
    }

    fn signature(references: &str, tail: &str) -> String {
        format!(
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo>{references}</ds:SignedInfo><ds:SignatureValue>AA==</ds:SignatureValue>{tail}</ds:Signature>"#
        )
    }

    #[test]
    fn test_detached_digest_match_and_mismatch() {
        let good = reference("a.txt", &sha256_b64(b"hello"), "");
        let bad = reference("b.txt", &sha256_b64(b"other"), "");
        let xml = signature(&format!("{good}{bad}"), "");
        let documents = DocumentSet::new()
            .with(InMemoryDocument::new("a.txt", b"hello".to_vec()))
            .with(InMemoryDocument::new("b.txt", b"hello".to_vec()));
        let result = run(&xml, &documents);
        assert!(result.validations[0].intact);
        assert_eq!(result.validations[0].status, ValidationStatus::Validated);
        assert!(result.validations[1].found);
        assert!(!result.validations[1].intact);
        assert!(result.all_found());
        assert!(!result.all_intact());
    }

    #[test]
    fn test_digest_only_document() {
        let xml = signature(&reference("a.txt", &sha256_b64(b"hello"), ""), "");
        let value = DigestMethod::Sha256.digest(b"hello").unwrap();
        let documents = DocumentSet::new()
            .with(DigestDocument::new("a.txt").with_digest(DigestMethod::Sha256, value));
        let result = run(&xml, &documents);
        assert!(result.all_intact());
    }

    #[test]
    fn test_missing_reference_not_found() {
        let xml = signature(&reference("#nothing", "AA==", ""), "");
        let result = run(&xml, &DocumentSet::new());
        assert!(!result.validations[0].found);
        assert_eq!(result.validations[0].status, ValidationStatus::NotFound);
        assert!(!result.all_found());
    }

    #[test]
    fn test_duplicate_id_never_intact() {
        let object = r#"<ds:Object Id="o">data</ds:Object>"#;
        let digest = sha256_b64(
            br#"<ds:Object xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="o">data</ds:Object>"#,
        );
        let xml = signature(&reference("#o", &digest, ""), object);
        let result = run(&xml, &DocumentSet::new());
        assert!(result.all_intact(), "{:?}", result.validations[0]);

        let wrapped = signature(&reference("#o", &digest, ""), &format!("{object}{object}"));
        let result = run(&wrapped, &DocumentSet::new());
        let v = &result.validations[0];
        assert!(v.found);
        assert!(v.duplicated);
        assert!(!v.intact);
        assert_eq!(v.status, ValidationStatus::Ambiguous);
    }

    #[test]
    fn test_unsupported_transform_marks_unvalidated() {
        let transforms = r#"<ds:Transforms><ds:Transform Algorithm="http://www.w3.org/TR/1999/REC-xslt-19991116"/></ds:Transforms>"#;
        let xml = signature(&reference("#o", "AA==", transforms), r#"<ds:Object Id="o"/>"#);
        let result = run(&xml, &DocumentSet::new());
        assert!(result.validations[0].found);
        assert_eq!(result.validations[0].status, ValidationStatus::UnsupportedTransform);
        assert_eq!(result.validations[0].transforms.len(), 1);
    }

    #[test]
    fn test_bytes_for_canonicalizes_node_sets() {
        let digest = sha256_b64(
            br#"<ds:Object xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="o">data</ds:Object>"#,
        );
        let xml = signature(&reference("#o", &digest, ""), r#"<ds:Object Id="o">data</ds:Object>"#);
        let doc = Document::parse(&xml).unwrap();
        let result = run(&xml, &DocumentSet::new());
        let bytes = result.bytes_for(0, &doc, C14nMode::Exclusive).unwrap();
        assert_eq!(
            bytes,
            br#"<ds:Object xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="o">data</ds:Object>"#
        );
        assert!(result.bytes_for(3, &doc, C14nMode::Inclusive).is_err());
    }
}
