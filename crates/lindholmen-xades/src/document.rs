#![forbid(unsafe_code)]

//! Detached content supplied alongside a signature.
//!
//! A source either carries its bytes or only precomputed digests. Digest-only
//! sources are never re-hashed: the resolver hands their stored value to the
//! validation engine as-is.

use lindholmen_crypto::DigestMethod;
use std::collections::BTreeMap;

/// A named piece of detached content.
pub trait DocumentSource: Send + Sync {
    /// The document name, `""` for an anonymous document.
    fn name(&self) -> &str;

    /// The raw bytes, `None` for a digest-only source.
    fn bytes(&self) -> Option<&[u8]>;

    /// The digest of the content under `method`, when it can be produced.
    fn digest(&self, method: DigestMethod) -> Option<Vec<u8>>;
}

/// A document held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    name: String,
    bytes: Vec<u8>,
}

impl InMemoryDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl DocumentSource for InMemoryDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes(&self) -> Option<&[u8]> {
        Some(&self.bytes)
    }

    fn digest(&self, method: DigestMethod) -> Option<Vec<u8>> {
        method.digest(&self.bytes).ok()
    }
}

/// A document known only by its digests.
#[derive(Debug, Clone, Default)]
pub struct DigestDocument {
    name: String,
    digests: BTreeMap<DigestMethod, Vec<u8>>,
}

impl DigestDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            digests: BTreeMap::new(),
        }
    }

    /// Record the digest value for `method`.
    pub fn with_digest(mut self, method: DigestMethod, value: Vec<u8>) -> Self {
        self.digests.insert(method, value);
        self
    }
}

impl DocumentSource for DigestDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes(&self) -> Option<&[u8]> {
        None
    }

    fn digest(&self, method: DigestMethod) -> Option<Vec<u8>> {
        self.digests.get(&method).cloned()
    }
}

/// The ordered set of detached documents of one validation.
#[derive(Default)]
pub struct DocumentSet {
    documents: Vec<Box<dyn DocumentSource>>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, document: impl DocumentSource + 'static) {
        self.documents.push(Box::new(document));
    }

    pub fn with(mut self, document: impl DocumentSource + 'static) -> Self {
        self.push(document);
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn DocumentSource> {
        self.documents.iter().map(|d| d.as_ref())
    }

    /// The only document, when exactly one is present.
    pub fn single(&self) -> Option<&dyn DocumentSource> {
        match self.documents.as_slice() {
            [only] => Some(only.as_ref()),
            _ => None,
        }
    }

    /// Exact name match only.
    pub fn find_exact(&self, name: &str) -> Option<&dyn DocumentSource> {
        self.iter().find(|d| d.name() == name)
    }

    /// Exact name match, then a match ignoring a leading `/` or `./` on
    /// either side.
    pub fn find_by_name(&self, name: &str) -> Option<&dyn DocumentSource> {
        self.find_exact(name).or_else(|| {
            let wanted = strip_relative(name);
            self.iter().find(|d| strip_relative(d.name()) == wanted)
        })
    }
}

impl std::fmt::Debug for DocumentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.documents.iter().map(|d| d.name()))
            .finish()
    }
}

fn strip_relative(name: &str) -> &str {
    name.strip_prefix("./")
        .or_else(|| name.strip_prefix('/'))
        .unwrap_or(name)
}
