//! Jobs
//!
//! Job identifiers, records and lifecycle, the in-memory registry and the
//! pipeline coordinator that drives a job from document to audiobook.

mod coordinator;
mod id;
mod registry;
mod types;

pub use coordinator::{AudioArtifact, CoordinatorSettings, PipelineCoordinator};
pub use id::{InvalidJobId, JobId};
pub use registry::{ActivityGuard, JobRegistry};
pub use types::{FailureReason, Job, JobState, PipelineError, Progress, TextPreview};
