#![forbid(unsafe_code)]

//! Core types for the lindholmen XAdES validation library.
//!
//! Holds the shared [`Error`] type together with the algorithm and
//! namespace constants every other crate in the workspace matches against.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
