//! Core pipeline orchestration for orderpack.
//!
//! Ties scan code generation, cover composition, document fetching, and
//! the merge engine into one end-to-end workflow ([`pipeline::generate`]).

pub mod pipeline;

pub use orderpack_merge::{DocumentOutcome, DocumentReport};
pub use pipeline::{ARTIFACT_MIME, MergedArtifact, generate};
