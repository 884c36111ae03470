//! Inventory Engine Library
//!
//! Discovers resources across cloud service APIs, normalizes them into
//! canonical records, drops provider-managed resources, deduplicates and
//! scores each record by how complete its extracted data is.

pub mod config;
pub mod inventory;

pub use config::DiscoveryConfig;
pub use inventory::{CanonicalResource, DiscoveryOrchestrator, DiscoveryRun, ServiceRegistry};
