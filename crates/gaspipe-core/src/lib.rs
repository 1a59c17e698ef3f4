//! gaspipe-core
//!
//! The ingestion engine: a registry-driven orchestration pipeline that takes
//! a dataset id, dispatches to its adapter, and drives a strictly ordered,
//! recoverable lifecycle (run bookkeeping → fetch with retry → raw
//! persistence → parse → normalize → validate → delete policy → series
//! registration → observation upsert → finalize → metrics).

pub mod orchestrator;
pub mod registry;
pub mod runner;
pub mod validation;

pub use orchestrator::{DatasetConfig, Orchestrator, RunOutcome};
pub use registry::{default_registry, AdapterFactory, AdapterRegistry};
pub use runner::IngestPool;
pub use validation::{validate, ValidationError};
