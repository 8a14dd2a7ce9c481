#![forbid(unsafe_code)]

//! Embedded timestamps: token model, data reconstruction and coverage.

pub mod builder;
pub mod graph;
pub mod tst;

pub use builder::TimestampDataBuilder;
pub use graph::TimestampGraphBuilder;
pub use tst::{parse_timestamp_token, TstInfo};

use crate::report::{hex_bytes, hex_opt};
use crate::signature::xades_children;
use lindholmen_c14n::C14nMode;
use lindholmen_core::{ns, Error, Result};
use lindholmen_crypto::encoding::decode_base64_lenient;
use lindholmen_crypto::DigestMethod;
use lindholmen_xml::dom;
use roxmltree::{Node, NodeId};
use serde::Serialize;

/// The class of a timestamp, fixing which data it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimestampType {
    AllDataObjects,
    IndividualDataObjects,
    Signature,
    SigAndRefs,
    RefsOnly,
    Archive,
}

impl TimestampType {
    /// Content timestamps are signed properties; the rest are unsigned.
    pub fn is_content(&self) -> bool {
        matches!(self, Self::AllDataObjects | Self::IndividualDataObjects)
    }
}

/// Which archive timestamp element a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArchiveRevision {
    /// `ArchiveTimeStamp` in the 1.3.2 namespace.
    Xades132,
    /// `ArchiveTimeStamp` in the 1.4.1 namespace.
    Xades141,
    /// EN 319 132 `ArchiveTimeStampV2`.
    Xades141V2,
}

/// The class and archive revision of a timestamp element, from its name and
/// namespace alone.
pub fn classify_element(node: &Node<'_, '_>) -> Option<(TimestampType, Option<ArchiveRevision>)> {
    let namespace = node.tag_name().namespace()?;
    if !node.is_element() || !ns::is_xades(namespace) {
        return None;
    }
    let classified = match node.tag_name().name() {
        ns::xades::ALL_DATA_OBJECTS_TIMESTAMP => (TimestampType::AllDataObjects, None),
        ns::xades::INDIVIDUAL_DATA_OBJECTS_TIMESTAMP => (TimestampType::IndividualDataObjects, None),
        ns::xades::SIGNATURE_TIMESTAMP => (TimestampType::Signature, None),
        ns::xades::SIG_AND_REFS_TIMESTAMP | ns::xades::SIG_AND_REFS_TIMESTAMP_V2 => {
            (TimestampType::SigAndRefs, None)
        }
        ns::xades::REFS_ONLY_TIMESTAMP | ns::xades::REFS_ONLY_TIMESTAMP_V2 => (TimestampType::RefsOnly, None),
        ns::xades::ARCHIVE_TIMESTAMP if namespace == ns::XADES_141 => {
            (TimestampType::Archive, Some(ArchiveRevision::Xades141))
        }
        ns::xades::ARCHIVE_TIMESTAMP => (TimestampType::Archive, Some(ArchiveRevision::Xades132)),
        ns::xades::ARCHIVE_TIMESTAMP_V2 => (TimestampType::Archive, Some(ArchiveRevision::Xades141V2)),
        _ => return None,
    };
    Some(classified)
}

/// An `Include` of an individual data objects timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Include {
    pub uri: String,
    pub referenced_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimestampedObjectKind {
    Certificate,
    Revocation,
    SignedData,
    Timestamp,
}

/// One object a timestamp covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimestampedReference {
    pub id: String,
    pub kind: TimestampedObjectKind,
}

impl TimestampedReference {
    pub fn new(id: impl Into<String>, kind: TimestampedObjectKind) -> Self {
        Self { id: id.into(), kind }
    }
}

/// A timestamp embedded in a signature.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampToken {
    /// Hex SHA-256 of the token bytes.
    pub id: String,
    /// The `Id` attribute of the timestamp element.
    pub element_id: Option<String>,
    pub timestamp_type: TimestampType,
    /// Local name of the timestamp element.
    pub element: String,
    pub archive_revision: Option<ArchiveRevision>,
    /// Effective canonicalization algorithm URI.
    pub canonicalization: String,
    #[serde(serialize_with = "hex_bytes")]
    pub token: Vec<u8>,
    /// SHA-256 of the element under inclusive C14N; identifies the element
    /// across parses.
    #[serde(serialize_with = "hex_bytes")]
    pub structural_hash: Vec<u8>,
    pub includes: Vec<Include>,
    pub encapsulated_count: usize,
    pub tst_info: Option<TstInfo>,
    pub covered: Vec<TimestampedReference>,
    /// The rebuilt data the imprint was checked against.
    #[serde(serialize_with = "hex_opt")]
    pub data: Option<Vec<u8>>,
    pub message_imprint_intact: bool,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub node: NodeId,
}

impl TimestampToken {
    /// Read a timestamp element. `default_c14n` applies when the element has
    /// no `ds:CanonicalizationMethod`.
    pub fn from_element(node: Node<'_, '_>, default_c14n: C14nMode) -> Result<Self> {
        let (timestamp_type, archive_revision) = classify_element(&node).ok_or_else(|| {
            Error::XmlStructure(format!("{} is not a timestamp element", node.tag_name().name()))
        })?;

        let canonicalization = dom::find_child_element(node, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
            .and_then(|n| n.attribute(ns::attr::ALGORITHM))
            .unwrap_or(default_c14n.uri())
            .to_owned();

        let encapsulated = xades_children(node, ns::xades::ENCAPSULATED_TIMESTAMP);
        let first = encapsulated
            .first()
            .ok_or_else(|| Error::MissingElement(format!("{}/EncapsulatedTimeStamp", node.tag_name().name())))?;
        if encapsulated.len() > 1 {
            log::warn!(
                "{} carries {} EncapsulatedTimeStamp elements; only the first is used",
                node.tag_name().name(),
                encapsulated.len()
            );
        }
        let token = decode_base64_lenient(dom::element_text(*first))?;

        let includes = xades_children(node, ns::xades::INCLUDE)
            .into_iter()
            .filter_map(|include| {
                let uri = include.attribute(ns::attr::URI)?;
                Some(Include {
                    uri: uri.to_owned(),
                    referenced_data: include.attribute(ns::attr::REFERENCED_DATA) != Some("false"),
                })
            })
            .collect();

        let mut errors = Vec::new();
        let tst_info = match parse_timestamp_token(&token) {
            Ok(info) => Some(info),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };

        Ok(Self {
            id: hex::encode(DigestMethod::Sha256.digest(&token)?),
            element_id: node.attribute(ns::attr::ID).map(str::to_owned),
            timestamp_type,
            element: node.tag_name().name().to_owned(),
            archive_revision,
            canonicalization,
            token,
            structural_hash: structural_hash(node)?,
            includes,
            encapsulated_count: encapsulated.len(),
            tst_info,
            covered: Vec::new(),
            data: None,
            message_imprint_intact: false,
            errors,
            node: node.id(),
        })
    }

    pub fn c14n_mode(&self) -> Result<C14nMode> {
        C14nMode::require(&self.canonicalization)
    }

    /// True for the `V2` variants of sig-and-refs and refs-only.
    pub fn is_v2(&self) -> bool {
        self.element.ends_with("V2")
    }

    pub fn covers(&self, id: &str) -> bool {
        self.covered.iter().any(|r| r.id == id)
    }

    pub fn gen_time(&self) -> Option<der::DateTime> {
        self.tst_info.as_ref().map(|info| info.gen_time)
    }

    /// Compare the imprint with the digest of `data` and keep the data.
    pub(crate) fn check_imprint(&mut self, data: Vec<u8>) {
        self.message_imprint_intact = false;
        match &self.tst_info {
            Some(info) => match info.digest_method.map(|m| m.digest(&data)) {
                Some(Ok(digest)) => self.message_imprint_intact = digest == info.message_imprint,
                Some(Err(e)) => self.errors.push(e.to_string()),
                None => self
                    .errors
                    .push(format!("unsupported message imprint algorithm {}", info.digest_oid)),
            },
            None => self.errors.push("no TSTInfo to check the imprint against".into()),
        }
        if !self.message_imprint_intact {
            log::warn!("{} {}: message imprint does not match", self.element, self.id);
        }
        self.data = Some(data);
    }
}

/// SHA-256 of `node` under inclusive C14N.
pub fn structural_hash(node: Node<'_, '_>) -> Result<Vec<u8>> {
    let bytes = lindholmen_c14n::canonicalize_subtree(node, C14nMode::Inclusive, &[])?;
    DigestMethod::Sha256.digest(&bytes)
}
