//! Cloud Resource Inventory
//!
//! Discovers resources exposed by heterogeneous cloud service APIs and turns
//! them into one canonical, deduplicated record set.
//!
//! ## Pipeline
//!
//! - **Service Registry**: data-driven table of per-service query patterns
//! - **Field Extractor**: raw API item -> canonical resource candidate
//! - **Managed Filter**: drops resources the provider created on its own
//! - **Confidence Scorer**: weighted completeness score in `[0, 1]`
//! - **Orchestrator**: one task per service on a bounded worker pool
//! - **Merger**: groups candidates by dedup key and merges each group
//!
//! Credentials and transport belong to the [`ClientProvider`] the caller
//! hands in; this module only reads.

mod types;
mod path;
mod registry;
mod extractor;
mod managed;
mod confidence;
mod client;
mod fixture;
mod orchestrator;
mod merge;
mod summary;

pub use types::*;
pub use path::{collect_items, lookup, singularize};
pub use registry::*;
pub use extractor::*;
pub use managed::*;
pub use confidence::*;
pub use client::*;
pub use fixture::*;
pub use orchestrator::*;
pub use merge::*;
pub use summary::*;
