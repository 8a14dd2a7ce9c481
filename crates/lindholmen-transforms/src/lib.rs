#![forbid(unsafe_code)]

//! Transform chains for the lindholmen XAdES library.
//!
//! Implements the transform chain model from XML-DSig: each reference
//! carries a sequence of transforms applied in order to the dereferenced
//! content before it is digested.

pub mod base64_transform;
pub mod chain;
pub mod enveloped;
pub mod pipeline;

pub use chain::TransformChain;
pub use pipeline::{C14nTransform, Transform, TransformData};
