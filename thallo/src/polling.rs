//! Fixed-interval polling of the baseline simulation job.
//!
//! The controller is a plain state machine: it is told the current time and
//! the responses it asked for, and answers with the next request to send.
//! The next request is only armed after the previous one resolved, so there
//! is never more than one status request in flight.

use std::time::{Duration, Instant};

use crate::model::{JobStatus, JobStatusResponse, ProjectId, SimulationResult};
use crate::Error;

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
    Complete,
    /// The backend reported the job as failed.
    Failed,
    /// The transport failed or returned something unusable.
    Unreachable,
}

impl PollPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollPhase::Complete | PollPhase::Failed | PollPhase::Unreachable
        )
    }
}

/// A status request the caller must send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRequest {
    pub token: u64,
    pub project_id: ProjectId,
}

/// What a resolved status request changed.
#[derive(Debug, PartialEq)]
pub enum PollEvent {
    /// The response was stale (stopped or superseded) and was dropped.
    Ignored,
    /// Still pending or running; the next poll is armed for `next_at`.
    Waiting { status: JobStatus, next_at: Instant },
    Complete,
    Failed,
    Unreachable,
}

/// Drives the status loop for one job.
#[derive(Debug)]
pub struct PollingController {
    interval: Duration,
    phase: PollPhase,
    project_id: Option<ProjectId>,
    last_status: Option<JobStatus>,
    next_token: u64,
    in_flight: Option<u64>,
    next_at: Option<Instant>,
    result: Option<SimulationResult>,
    error: Option<Error>,
}

impl PollingController {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            phase: PollPhase::Idle,
            project_id: None,
            last_status: None,
            next_token: 0,
            in_flight: None,
            next_at: None,
            result: None,
            error: None,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Last non-terminal status reported by the backend.
    pub fn last_status(&self) -> Option<JobStatus> {
        self.last_status
    }

    pub fn result(&self) -> Option<&SimulationResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns `true` while a status request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Time at which the next request becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_at
    }

    /// Starts polling `project_id`, discarding any previous job, and returns
    /// the immediate first request.
    pub fn start(&mut self, project_id: ProjectId) -> StatusRequest {
        log::info!("polling job status for project {project_id}");
        self.phase = PollPhase::Polling;
        self.project_id = Some(project_id);
        self.last_status = None;
        self.result = None;
        self.error = None;
        self.next_at = None;
        self.issue(project_id)
    }

    /// Returns the next request if the interval elapsed and nothing is in flight.
    pub fn poll_due(&mut self, now: Instant) -> Option<StatusRequest> {
        if self.phase != PollPhase::Polling || self.in_flight.is_some() {
            return None;
        }
        match (self.next_at, self.project_id) {
            (Some(at), Some(id)) if at <= now => {
                self.next_at = None;
                Some(self.issue(id))
            }
            _ => None,
        }
    }

    /// Feeds the outcome of request `token`.
    pub fn on_response(
        &mut self,
        token: u64,
        response: crate::Result<JobStatusResponse>,
        now: Instant,
    ) -> PollEvent {
        if self.in_flight != Some(token) {
            log::debug!("discarding stale status response {token}");
            return PollEvent::Ignored;
        }
        self.in_flight = None;

        match response {
            Ok(JobStatusResponse {
                status: JobStatus::Complete,
                results: Some(result),
            }) => {
                log::info!("simulation complete: {}", result.verdict);
                self.phase = PollPhase::Complete;
                self.result = Some(result);
                PollEvent::Complete
            }
            Ok(JobStatusResponse {
                status: JobStatus::Complete,
                results: None,
            }) => self.unreachable(Error::Malformed(
                "job is complete but carries no result".into(),
            )),
            Ok(JobStatusResponse {
                status: JobStatus::Failed,
                ..
            }) => {
                log::error!("simulation job failed");
                self.phase = PollPhase::Failed;
                self.error = Some(Error::JobFailed);
                PollEvent::Failed
            }
            Ok(JobStatusResponse { status, .. }) => {
                let next_at = now + self.interval;
                self.last_status = Some(status);
                self.next_at = Some(next_at);
                PollEvent::Waiting { status, next_at }
            }
            Err(err) => self.unreachable(err),
        }
    }

    /// Cancels polling. Safe at any time; later responses are ignored.
    pub fn stop(&mut self) {
        if self.in_flight.take().is_some() {
            log::debug!("polling stopped with a request in flight");
        }
        self.next_at = None;
        if self.phase == PollPhase::Polling {
            self.phase = PollPhase::Idle;
        }
    }

    fn issue(&mut self, project_id: ProjectId) -> StatusRequest {
        self.next_token += 1;
        self.in_flight = Some(self.next_token);
        StatusRequest {
            token: self.next_token,
            project_id,
        }
    }

    fn unreachable(&mut self, err: Error) -> PollEvent {
        log::error!("status polling aborted: {err}");
        self.phase = PollPhase::Unreachable;
        self.error = Some(err);
        PollEvent::Unreachable
    }
}
