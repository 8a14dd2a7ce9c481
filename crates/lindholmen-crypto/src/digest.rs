#![forbid(unsafe_code)]

//! Digest (hash) algorithm implementations.

use digest::Digest;
use lindholmen_core::{algorithm, Error, Result};

/// Streaming digest computation.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// Algorithm URI.
    fn uri(&self) -> &'static str;
}

/// A digest algorithm known to the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestMethod {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Md5,
    Ripemd160,
}

const ALL: [DigestMethod; 11] = [
    DigestMethod::Sha1,
    DigestMethod::Sha224,
    DigestMethod::Sha256,
    DigestMethod::Sha384,
    DigestMethod::Sha512,
    DigestMethod::Sha3_224,
    DigestMethod::Sha3_256,
    DigestMethod::Sha3_384,
    DigestMethod::Sha3_512,
    DigestMethod::Md5,
    DigestMethod::Ripemd160,
];

impl DigestMethod {
    /// The XML-DSig algorithm URI.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha224 => algorithm::SHA224,
            Self::Sha256 => algorithm::SHA256,
            Self::Sha384 => algorithm::SHA384,
            Self::Sha512 => algorithm::SHA512,
            Self::Sha3_224 => algorithm::SHA3_224,
            Self::Sha3_256 => algorithm::SHA3_256,
            Self::Sha3_384 => algorithm::SHA3_384,
            Self::Sha3_512 => algorithm::SHA3_512,
            Self::Md5 => algorithm::MD5,
            Self::Ripemd160 => algorithm::RIPEMD160,
        }
    }

    /// The ASN.1 object identifier arcs.
    pub fn oid(&self) -> &'static [u64] {
        match self {
            Self::Sha1 => &[1, 3, 14, 3, 2, 26],
            Self::Sha224 => &[2, 16, 840, 1, 101, 3, 4, 2, 4],
            Self::Sha256 => &[2, 16, 840, 1, 101, 3, 4, 2, 1],
            Self::Sha384 => &[2, 16, 840, 1, 101, 3, 4, 2, 2],
            Self::Sha512 => &[2, 16, 840, 1, 101, 3, 4, 2, 3],
            Self::Sha3_224 => &[2, 16, 840, 1, 101, 3, 4, 2, 7],
            Self::Sha3_256 => &[2, 16, 840, 1, 101, 3, 4, 2, 8],
            Self::Sha3_384 => &[2, 16, 840, 1, 101, 3, 4, 2, 9],
            Self::Sha3_512 => &[2, 16, 840, 1, 101, 3, 4, 2, 10],
            Self::Md5 => &[1, 2, 840, 113549, 2, 5],
            Self::Ripemd160 => &[1, 3, 36, 3, 2, 1],
        }
    }

    /// Short display name, e.g. `SHA256`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha224 => "SHA224",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Sha3_224 => "SHA3-224",
            Self::Sha3_256 => "SHA3-256",
            Self::Sha3_384 => "SHA3-384",
            Self::Sha3_512 => "SHA3-512",
            Self::Md5 => "MD5",
            Self::Ripemd160 => "RIPEMD160",
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self> {
        ALL.iter()
            .copied()
            .find(|m| m.uri() == uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}")))
    }

    pub fn from_oid(arcs: &[u64]) -> Result<Self> {
        ALL.iter().copied().find(|m| m.oid() == arcs).ok_or_else(|| {
            let dotted: Vec<String> = arcs.iter().map(u64::to_string).collect();
            Error::UnsupportedAlgorithm(format!("digest OID: {}", dotted.join(".")))
        })
    }

    /// A fresh streaming hasher.
    pub fn hasher(&self) -> Result<Box<dyn DigestAlgorithm>> {
        match self {
            Self::Sha1 => Ok(Box::new(Sha1Digest::new())),
            Self::Sha224 => Ok(Box::new(Sha224Digest::new())),
            Self::Sha256 => Ok(Box::new(Sha256Digest::new())),
            Self::Sha384 => Ok(Box::new(Sha384Digest::new())),
            Self::Sha512 => Ok(Box::new(Sha512Digest::new())),
            Self::Sha3_224 => Ok(Box::new(Sha3_224Digest::new())),
            Self::Sha3_256 => Ok(Box::new(Sha3_256Digest::new())),
            Self::Sha3_384 => Ok(Box::new(Sha3_384Digest::new())),
            Self::Sha3_512 => Ok(Box::new(Sha3_512Digest::new())),
            #[cfg(feature = "legacy-algorithms")]
            Self::Md5 => Ok(Box::new(Md5Digest::new())),
            #[cfg(feature = "legacy-algorithms")]
            Self::Ripemd160 => Ok(Box::new(Ripemd160Digest::new())),
            #[cfg(not(feature = "legacy-algorithms"))]
            Self::Md5 | Self::Ripemd160 => Err(Error::UnsupportedAlgorithm(format!(
                "digest algorithm {} requires the legacy-algorithms feature",
                self.name()
            ))),
        }
    }

    /// Compute a digest in one shot.
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.hasher()?;
        hasher.update(data);
        Ok(hasher.finalize())
    }
}

/// Create a streaming digest from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn DigestAlgorithm>> {
    DigestMethod::from_uri(uri)?.hasher()
}

/// Compute a digest identified by URI in one shot.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>> {
    DigestMethod::from_uri(uri)?.digest(data)
}

// ── Concrete implementations ─────────────────────────────────────────

macro_rules! impl_digest {
    ($name:ident, $hasher:ty, $uri:expr) => {
        struct $name {
            inner: $hasher,
        }

        impl $name {
            fn new() -> Self {
                Self {
                    inner: <$hasher>::new(),
                }
            }
        }

        impl DigestAlgorithm for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                Digest::finalize(self.inner).to_vec()
            }

            fn uri(&self) -> &'static str {
                $uri
            }
        }
    };
}

impl_digest!(Sha1Digest, sha1::Sha1, algorithm::SHA1);
impl_digest!(Sha224Digest, sha2::Sha224, algorithm::SHA224);
impl_digest!(Sha256Digest, sha2::Sha256, algorithm::SHA256);
impl_digest!(Sha384Digest, sha2::Sha384, algorithm::SHA384);
impl_digest!(Sha512Digest, sha2::Sha512, algorithm::SHA512);
impl_digest!(Sha3_224Digest, sha3::Sha3_224, algorithm::SHA3_224);
impl_digest!(Sha3_256Digest, sha3::Sha3_256, algorithm::SHA3_256);
impl_digest!(Sha3_384Digest, sha3::Sha3_384, algorithm::SHA3_384);
impl_digest!(Sha3_512Digest, sha3::Sha3_512, algorithm::SHA3_512);

#[cfg(feature = "legacy-algorithms")]
impl_digest!(Md5Digest, md5::Md5, algorithm::MD5);

#[cfg(feature = "legacy-algorithms")]
impl_digest!(Ripemd160Digest, ripemd::Ripemd160, algorithm::RIPEMD160);
