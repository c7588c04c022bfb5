//! Debounced, superseding re-simulation of lever edits.
//!
//! [`WhatIfSyncEngine`] owns the lever set and both result slots. Edits start
//! a quiet window; when it elapses one recompute is issued, tagged with a
//! sequence number. Only the response carrying the latest issued number, and
//! computed for the levers currently set, is merged, so a slow answer for an
//! old lever combination can never replace a newer one.

use std::time::{Duration, Instant};

use crate::model::{LeverSet, ProjectId, SimulationResult, Validate};
use crate::{Error, Result};

/// A recompute the caller must send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecomputeRequest {
    pub seq: u64,
    pub project_id: ProjectId,
    pub levers: LeverSet,
}

/// Effect of a lever edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeverEdit {
    /// The levers match the submitted project; the baseline is shown again.
    Reverted,
    /// A recompute is scheduled for `fire_at` unless another edit arrives.
    Scheduled { fire_at: Instant },
    /// The live result was already computed for these levers.
    Current,
}

/// What happened to a recompute response.
#[derive(Debug)]
pub enum RecomputeOutcome {
    Accepted,
    /// A newer request was issued, the levers moved on, or the engine was
    /// reverted or torn down.
    Superseded,
    /// The latest request failed; the previous result stays on screen.
    Failed(Error),
}

/// Result of a what-if run together with the levers it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveResult {
    pub levers: LeverSet,
    pub result: SimulationResult,
}

#[derive(Debug)]
pub struct WhatIfSyncEngine {
    project_id: ProjectId,
    debounce: Duration,
    reference: LeverSet,
    levers: LeverSet,
    baseline: SimulationResult,
    live: Option<LiveResult>,
    fire_at: Option<Instant>,
    next_seq: u64,
    awaiting: Option<RecomputeRequest>,
    last_error: Option<String>,
    torn_down: bool,
}

impl WhatIfSyncEngine {
    /// Seeds the engine with the completed baseline.
    ///
    /// `reference` is the lever set the baseline was computed for; it is also
    /// the initial lever state.
    pub fn new(
        project_id: ProjectId,
        baseline: SimulationResult,
        reference: LeverSet,
        debounce: Duration,
    ) -> Self {
        Self {
            project_id,
            debounce,
            reference,
            levers: reference,
            baseline,
            live: None,
            fire_at: None,
            next_seq: 0,
            awaiting: None,
            last_error: None,
            torn_down: false,
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn levers(&self) -> &LeverSet {
        &self.levers
    }

    pub fn reference(&self) -> &LeverSet {
        &self.reference
    }

    pub fn baseline(&self) -> &SimulationResult {
        &self.baseline
    }

    pub fn live(&self) -> Option<&LiveResult> {
        self.live.as_ref()
    }

    /// The live result if there is one, otherwise the baseline.
    pub fn displayed(&self) -> &SimulationResult {
        self.live
            .as_ref()
            .map(|l| &l.result)
            .unwrap_or(&self.baseline)
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Returns `true` while the latest issued recompute has not resolved.
    pub fn is_loading(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Message of the last failed recompute, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Time at which the pending debounce window closes.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.fire_at
    }

    /// Returns `true` while an edit waits for its debounce window to close.
    pub fn is_pending(&self) -> bool {
        self.fire_at.is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Replaces the lever set. The only way levers change.
    pub fn set_levers(&mut self, levers: LeverSet, now: Instant) -> Result<LeverEdit> {
        if self.torn_down {
            return Err(Error::SessionClosed);
        }
        levers.validate()?;
        self.levers = levers;
        if self.levers == self.reference {
            self.revert();
            return Ok(LeverEdit::Reverted);
        }
        if self.live.as_ref().is_some_and(|l| l.levers == levers) {
            self.fire_at = None;
            if let Some(req) = self.awaiting.take() {
                log::debug!("recompute {} dropped, live result covers the levers", req.seq);
            }
            self.last_error = None;
            return Ok(LeverEdit::Current);
        }
        let fire_at = now + self.debounce;
        if self.fire_at.is_some() {
            log::debug!("debounce restarted");
        }
        self.fire_at = Some(fire_at);
        Ok(LeverEdit::Scheduled { fire_at })
    }

    /// Changes the no-op reference once project metadata is known.
    ///
    /// Levers still at the old reference follow it.
    pub fn set_reference(&mut self, reference: LeverSet) {
        let untouched = self.levers == self.reference;
        self.reference = reference;
        if untouched {
            self.levers = reference;
        }
        if self.levers == self.reference {
            self.revert();
        }
    }

    /// Issues the recompute once the debounce window has elapsed.
    pub fn poll_due(&mut self, now: Instant) -> Option<RecomputeRequest> {
        match self.fire_at {
            Some(at) if at <= now && !self.torn_down => {
                self.fire_at = None;
                self.next_seq += 1;
                let request = RecomputeRequest {
                    seq: self.next_seq,
                    project_id: self.project_id,
                    levers: self.levers,
                };
                if let Some(old) = self.awaiting.replace(request) {
                    log::debug!("recompute {} superseded by {}", old.seq, request.seq);
                }
                Some(request)
            }
            _ => None,
        }
    }

    /// Feeds the response of recompute `seq`.
    pub fn on_response(&mut self, seq: u64, response: Result<SimulationResult>) -> RecomputeOutcome {
        let request = match self.awaiting {
            Some(req) if req.seq == seq && !self.torn_down => req,
            _ => {
                log::debug!("discarding superseded recompute {seq}");
                return RecomputeOutcome::Superseded;
            }
        };
        self.awaiting = None;
        if request.levers != self.levers {
            log::debug!("discarding recompute {seq}, levers changed since it was issued");
            return RecomputeOutcome::Superseded;
        }
        match response {
            Ok(result) => {
                log::debug!(
                    "recompute {seq} accepted: {} ({:.3})",
                    result.verdict,
                    result.p_failure_by_end_year
                );
                self.live = Some(LiveResult {
                    levers: request.levers,
                    result,
                });
                // an edit that came back to these levers needs no second run
                self.fire_at = None;
                self.last_error = None;
                RecomputeOutcome::Accepted
            }
            Err(err) => {
                log::warn!("recompute {seq} failed, keeping last result: {err}");
                self.last_error = Some(err.to_string());
                RecomputeOutcome::Failed(err)
            }
        }
    }

    /// Cancels the debounce window and invalidates every outstanding request.
    pub fn teardown(&mut self) {
        self.fire_at = None;
        self.awaiting = None;
        self.torn_down = true;
    }

    fn revert(&mut self) {
        self.live = None;
        self.fire_at = None;
        if let Some(req) = self.awaiting.take() {
            log::debug!("recompute {} dropped, levers back at reference", req.seq);
        }
        self.last_error = None;
    }
}
