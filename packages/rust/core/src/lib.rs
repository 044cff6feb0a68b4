//! Workflow orchestration for lexcrawl.
//!
//! Ties the crawler, discovery and storage crates together: the persistence
//! coordinator, the four workflows, job status tracking and the workflow
//! manifest.

pub mod jobs;
pub mod manifest;
pub mod persistence;
pub mod pipeline;
pub mod sweep;

#[cfg(test)]
mod testing;

pub use jobs::{JobSink, PendingJob, StorageJobSink, run_interruptible};
pub use manifest::{WorkflowManifest, manifest, manifest_json};
pub use persistence::{AppendOutcome, ChunkConflict, PersistenceCoordinator, UpsertReport};
pub use pipeline::{
    DocumentFailure, OutcomeTally, ProgressReporter, SilentProgress, Workflow, WorkflowContext,
    WorkflowReport, discover_sources, extract_url, retry_extraction,
};
pub use sweep::process_unchunked;
