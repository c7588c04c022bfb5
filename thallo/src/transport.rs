//! Abstract contract of the simulation backend.

use std::future::Future;

use crate::model::{
    JobStatusResponse, LeverSet, Project, ProjectCreate, ProjectId, RecommendationSet,
    SimulationResult,
};
use crate::Result;

/// Operations the client consumes from the backend.
///
/// Implementations must return validated payloads; anything that does not
/// match its schema is reported as [`crate::Error::Malformed`]. Futures are
/// `Send` so a session can run each call as its own task.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Creates a project and returns its stored metadata.
    fn create_project(&self, body: &ProjectCreate) -> impl Future<Output = Result<Project>> + Send;

    /// Triggers the baseline simulation; the job becomes pollable.
    fn start_simulation(&self, id: ProjectId) -> impl Future<Output = Result<()>> + Send;

    /// Current status of the baseline job.
    fn job_status(&self, id: ProjectId) -> impl Future<Output = Result<JobStatusResponse>> + Send;

    /// Re-runs the simulation for an adjusted lever set.
    fn recompute(
        &self,
        id: ProjectId,
        levers: &LeverSet,
    ) -> impl Future<Output = Result<SimulationResult>> + Send;

    /// Ranked interventions for a failing project.
    fn recommendations(
        &self,
        id: ProjectId,
    ) -> impl Future<Output = Result<RecommendationSet>> + Send;

    /// Project metadata.
    fn project(&self, id: ProjectId) -> impl Future<Output = Result<Project>> + Send;
}
