//! bvi-signals library interface
//!
//! Incremental filing classification: company identity resolution, lifecycle
//! signals and refile counts over a chronologically ordered stream of label
//! approvals.

pub mod classifier;
pub mod db;
pub mod error;
pub mod ingest;
pub mod normalizer;
pub mod pipeline;
pub mod refile;
pub mod renormalize;
pub mod similarity;
pub mod store;

pub use crate::classifier::{ClassifiedFiling, SignalClassifier};
pub use crate::error::{ClassifyError, ClassifyResult};
pub use crate::normalizer::{IdentityNormalizer, MatchMethod, Resolution};
pub use crate::pipeline::{Pipeline, RunSummary};
pub use crate::refile::RefileCounter;
pub use crate::store::{MemoryStore, ProductKey, SignalStore};
