#![forbid(unsafe_code)]

//! Validation context: inputs and configuration for signature validation.

use crate::document::{DocumentSet, DocumentSource};
use crate::resolver::ResolverChain;
use crate::timestamp::ArchiveRevision;
use lindholmen_c14n::C14nMode;
use lindholmen_core::algorithm;
use lindholmen_xml::XmlDocument;

/// Which revisions of the archive timestamp cover unreferenced `ds:Object`
/// elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveObjectPolicy {
    /// XAdES 1.3.2 archive timestamps skip them, 1.4.1 ones include them.
    #[default]
    PerRevision,
    /// Every archive timestamp includes them.
    AlwaysInclude,
    /// No archive timestamp includes them.
    NeverInclude,
}

impl ArchiveObjectPolicy {
    pub fn includes_objects(&self, revision: ArchiveRevision) -> bool {
        match self {
            Self::PerRevision => revision != ArchiveRevision::Xades132,
            Self::AlwaysInclude => true,
            Self::NeverInclude => false,
        }
    }
}

/// Context for XAdES validation.
pub struct ValidationContext {
    /// Additional ID attribute names to index.
    pub id_attrs: Vec<String>,
    /// Detached documents the references may point at.
    pub documents: DocumentSet,
    /// The document holding a master signature, when a detached
    /// counter-signature is validated on its own.
    pub counter_signed_document: Option<XmlDocument>,
    /// Resolvers tried in order for every reference.
    pub resolvers: ResolverChain,
    /// Canonicalization used by timestamps that do not name one.
    pub default_canonicalization: C14nMode,
    /// Canonicalization algorithms a baseline signature may declare.
    pub allowed_canonicalizations: Vec<String>,
    /// Archive timestamp coverage of unreferenced objects.
    pub archive_objects: ArchiveObjectPolicy,
    /// Validate independent signatures of one document on worker threads.
    pub parallel: bool,
}

impl ValidationContext {
    /// A context with the standard resolver chain and no detached documents.
    pub fn new() -> Self {
        Self {
            id_attrs: Vec::new(),
            documents: DocumentSet::new(),
            counter_signed_document: None,
            resolvers: ResolverChain::standard(),
            default_canonicalization: C14nMode::Inclusive,
            allowed_canonicalizations: algorithm::ALLOWED_CANONICALIZATIONS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            archive_objects: ArchiveObjectPolicy::default(),
            parallel: false,
        }
    }

    /// Add an ID attribute name to index during processing.
    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    pub fn with_document(mut self, document: impl DocumentSource + 'static) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_documents(mut self, documents: DocumentSet) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_counter_signed_document(mut self, document: XmlDocument) -> Self {
        self.counter_signed_document = Some(document);
        self
    }

    pub fn with_resolvers(mut self, resolvers: ResolverChain) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn with_default_canonicalization(mut self, mode: C14nMode) -> Self {
        self.default_canonicalization = mode;
        self
    }

    pub fn with_allowed_canonicalizations(mut self, uris: Vec<String>) -> Self {
        self.allowed_canonicalizations = uris;
        self
    }

    pub fn with_archive_objects(mut self, policy: ArchiveObjectPolicy) -> Self {
        self.archive_objects = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn is_allowed_canonicalization(&self, uri: &str) -> bool {
        self.allowed_canonicalizations.iter().any(|u| u == uri)
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}
