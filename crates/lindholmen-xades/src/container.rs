#![forbid(unsafe_code)]

//! Validation of every signature in one document.
//!
//! Counter-signatures need their master's finished report, so signatures are
//! grouped by their depth in the master chain and each depth is validated
//! after the one above it. Signatures of the same depth are independent.

use crate::context::ValidationContext;
use crate::report::SignatureReport;
use crate::signature::{SignatureReportBuilder, XadesSignature};
use lindholmen_core::{ns, Result};
use lindholmen_xml::{dom, xpath, IdIndex, XmlDocument};
use roxmltree::Document;
use serde::Serialize;
use std::thread;

/// The outcome of one signature. A failure never affects its siblings.
#[derive(Debug, Clone, Serialize)]
pub enum SignatureOutcome {
    Validated(Box<SignatureReport>),
    Failed { id: Option<String>, error: String },
}

impl SignatureOutcome {
    pub fn report(&self) -> Option<&SignatureReport> {
        match self {
            Self::Validated(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Validated(report) => report.id.as_deref(),
            Self::Failed { id, .. } => id.as_deref(),
        }
    }
}

/// Outcomes of every `ds:Signature` of a document, in document order.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub signatures: Vec<SignatureOutcome>,
    /// Id values carried by more than one element.
    pub duplicated_ids: Vec<String>,
}

impl ContainerReport {
    pub fn reports(&self) -> impl Iterator<Item = &SignatureReport> {
        self.signatures.iter().filter_map(SignatureOutcome::report)
    }

    pub fn find(&self, id: &str) -> Option<&SignatureOutcome> {
        self.signatures.iter().find(|s| s.id() == Some(id))
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Every signature of a document with index links to its master.
pub struct SignatureRegistry<'a, 'input> {
    signatures: Vec<XadesSignature<'a, 'input>>,
    masters: Vec<Option<usize>>,
}

impl<'a, 'input> SignatureRegistry<'a, 'input> {
    pub fn build(doc: &'a Document<'input>, ids: &'a IdIndex) -> Self {
        let signatures: Vec<XadesSignature<'a, 'input>> = dom::find_elements(doc, ns::DSIG, ns::node::SIGNATURE)
            .into_iter()
            .map(|node| XadesSignature::new(doc, ids, node))
            .collect();
        let masters = (0..signatures.len())
            .map(|i| Self::find_master(&signatures, i))
            .collect();
        let mut registry = Self { signatures, masters };
        registry.break_cycles();
        registry
    }

    /// The nearest enclosing signature, else the signature whose
    /// `SignatureValue` a `CountersignedSignature` reference names.
    fn find_master(signatures: &[XadesSignature<'a, 'input>], index: usize) -> Option<usize> {
        let node = signatures[index].node();
        let enclosing = node
            .ancestors()
            .skip(1)
            .find(|a| dom::is_element(a, ns::DSIG, ns::node::SIGNATURE))
            .and_then(|a| signatures.iter().position(|s| s.node() == a));
        if enclosing.is_some() {
            return enclosing;
        }
        signatures[index]
            .reference_nodes()
            .into_iter()
            .filter(|r| r.attribute(ns::attr::TYPE) == Some(ns::reference_type::COUNTERSIGNED_SIGNATURE))
            .filter_map(|r| r.attribute(ns::attr::URI).and_then(xpath::parse_same_document_ref))
            .find_map(|id| {
                signatures
                    .iter()
                    .enumerate()
                    .find(|(j, s)| *j != index && s.signature_value_id() == Some(id))
                    .map(|(j, _)| j)
            })
    }

    fn break_cycles(&mut self) {
        let n = self.masters.len();
        for i in 0..n {
            let mut current = self.masters[i];
            for _ in 0..n {
                match current {
                    Some(m) if m == i => {
                        log::warn!("signature {} counter-signs itself through a cycle", self.signatures[i].label());
                        self.masters[i] = None;
                        break;
                    }
                    Some(m) => current = self.masters[m],
                    None => break,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn signature(&self, index: usize) -> Option<&XadesSignature<'a, 'input>> {
        self.signatures.get(index)
    }

    pub fn master_of(&self, index: usize) -> Option<usize> {
        self.masters.get(index).copied().flatten()
    }

    /// Number of masters above `index`.
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.master_of(index);
        while let Some(m) = current {
            depth += 1;
            if depth > self.masters.len() {
                break;
            }
            current = self.master_of(m);
        }
        depth
    }

    /// Signature indices grouped by depth, shallowest first.
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let mut levels: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.signatures.len() {
            let depth = self.depth(i);
            if levels.len() <= depth {
                levels.resize_with(depth + 1, Vec::new);
            }
            levels[depth].push(i);
        }
        levels.retain(|l| !l.is_empty());
        levels
    }
}

fn validate_one(
    registry: &SignatureRegistry<'_, '_>,
    index: usize,
    ctx: &ValidationContext,
    finished: &[Option<SignatureOutcome>],
) -> SignatureOutcome {
    let Some(signature) = registry.signature(index) else {
        return SignatureOutcome::Failed {
            id: None,
            error: format!("no signature at index {index}"),
        };
    };
    let master = registry
        .master_of(index)
        .and_then(|m| finished.get(m))
        .and_then(|o| o.as_ref())
        .and_then(SignatureOutcome::report);
    match SignatureReportBuilder::build(signature, ctx, master) {
        Ok(report) => SignatureOutcome::Validated(Box::new(report)),
        Err(e) => {
            log::warn!("signature {} failed: {e}", signature.label());
            SignatureOutcome::Failed {
                id: signature.id().map(str::to_owned),
                error: e.to_string(),
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "validation panicked".to_owned())
}

/// Validate every `ds:Signature` of `xml`, masters before the signatures
/// that counter-sign them.
pub fn validate_document(xml: &XmlDocument, ctx: &ValidationContext) -> Result<ContainerReport> {
    let doc = xml.parse_doc()?;
    let mut id_attrs = xml.extra_id_attrs().to_vec();
    id_attrs.extend(ctx.id_attrs.iter().cloned());
    let ids = IdIndex::build(&doc, &id_attrs);
    let registry = SignatureRegistry::build(&doc, &ids);
    log::info!("validating {} signatures", registry.len());

    let mut finished: Vec<Option<SignatureOutcome>> = (0..registry.len()).map(|_| None).collect();
    for level in registry.levels() {
        log::debug!("validating {} signatures at one depth", level.len());
        let results: Vec<(usize, SignatureOutcome)> = if ctx.parallel && level.len() > 1 {
            let finished = &finished;
            let registry = &registry;
            thread::scope(|scope| {
                let handles: Vec<_> = level
                    .iter()
                    .map(|&i| (i, scope.spawn(move || validate_one(registry, i, ctx, finished))))
                    .collect();
                handles
                    .into_iter()
                    .map(|(i, handle)| {
                        let outcome = handle.join().unwrap_or_else(|payload| SignatureOutcome::Failed {
                            id: registry.signature(i).and_then(|s| s.id()).map(str::to_owned),
                            error: panic_message(payload.as_ref()),
                        });
                        (i, outcome)
                    })
                    .collect()
            })
        } else {
            level
                .iter()
                .map(|&i| (i, validate_one(&registry, i, ctx, &finished)))
                .collect()
        };
        for (i, outcome) in results {
            finished[i] = Some(outcome);
        }
    }

    Ok(ContainerReport {
        signatures: finished.into_iter().flatten().collect(),
        duplicated_ids: ids.duplicated_ids().into_iter().map(str::to_owned).collect(),
    })
}
