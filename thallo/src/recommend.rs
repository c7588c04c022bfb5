//! On-demand recommendations for a failing project.

use crate::model::{ProjectId, RecommendationSet, SimulationResult};
use crate::Result;

/// What the presentation layer shows in the recommendations panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RecommendationState {
    /// Nothing fetched yet, or the last set was discarded with a refresh.
    #[default]
    Idle,
    Loading {
        previous: Option<RecommendationSet>,
    },
    Ready(RecommendationSet),
    Failed {
        message: String,
        previous: Option<RecommendationSet>,
    },
}

impl RecommendationState {
    pub fn is_loading(&self) -> bool {
        matches!(self, RecommendationState::Loading { .. })
    }

    /// The set to display, including one kept from before a failed re-fetch.
    pub fn current(&self) -> Option<&RecommendationSet> {
        match self {
            RecommendationState::Idle => None,
            RecommendationState::Ready(set) => Some(set),
            RecommendationState::Loading { previous } => previous.as_ref(),
            RecommendationState::Failed { previous, .. } => previous.as_ref(),
        }
    }
}

/// A recommendation request the caller must send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub ticket: u64,
    pub project_id: ProjectId,
}

/// Answer to [`RecommendationSession::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    Start(RecommendationRequest),
    /// A request is already in flight; nothing new was sent.
    AlreadyInProgress,
    /// Recommendations are only offered while the displayed verdict is FAIL.
    NotOffered,
}

/// Guards the recommendation request so that at most one runs at a time.
#[derive(Debug)]
pub struct RecommendationSession {
    project_id: ProjectId,
    state: RecommendationState,
    next_ticket: u64,
    in_flight: Option<u64>,
}

impl RecommendationSession {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            state: RecommendationState::Idle,
            next_ticket: 0,
            in_flight: None,
        }
    }

    pub fn state(&self) -> &RecommendationState {
        &self.state
    }

    /// Returns `true` if recommendations can be requested for `displayed`.
    pub fn is_offered(displayed: &SimulationResult) -> bool {
        displayed.is_fail()
    }

    /// Starts a request unless one is already running.
    pub fn fetch(&mut self, displayed: &SimulationResult) -> FetchDecision {
        if self.in_flight.is_some() {
            log::debug!("recommendations already in progress");
            return FetchDecision::AlreadyInProgress;
        }
        if !Self::is_offered(displayed) {
            return FetchDecision::NotOffered;
        }
        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        let previous = self.state.current().cloned();
        self.state = RecommendationState::Loading { previous };
        log::info!("requesting recommendations for project {}", self.project_id);
        FetchDecision::Start(RecommendationRequest {
            ticket: self.next_ticket,
            project_id: self.project_id,
        })
    }

    /// Discards the stored set so the user can fetch again.
    ///
    /// Ignored while a request is in flight.
    pub fn refresh(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.state = RecommendationState::Idle;
        true
    }

    /// Abandons the running request; its response will be dropped.
    pub fn cancel(&mut self) {
        if self.in_flight.take().is_some() {
            self.state = match std::mem::take(&mut self.state) {
                RecommendationState::Loading {
                    previous: Some(set),
                } => RecommendationState::Ready(set),
                _ => RecommendationState::Idle,
            };
        }
    }

    /// Feeds the response for `ticket`. Returns `false` if it was dropped.
    pub fn on_response(&mut self, ticket: u64, response: Result<RecommendationSet>) -> bool {
        if self.in_flight != Some(ticket) {
            log::debug!("discarding recommendation response {ticket}");
            return false;
        }
        self.in_flight = None;
        let previous = self.state.current().cloned();
        self.state = match response {
            Ok(mut set) => {
                set.sort_by_rank();
                RecommendationState::Ready(set)
            }
            Err(err) => {
                log::warn!("recommendations failed: {err}");
                RecommendationState::Failed {
                    message: err.to_string(),
                    previous,
                }
            }
        };
        true
    }

    /// Drops any in-flight request; a set shown before it stays.
    pub fn teardown(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Recommendation, RecommendedLevers, Verdict};
    use crate::testing::sample_result;
    use crate::Error;

    fn set(ranks: &[u32]) -> RecommendationSet {
        RecommendationSet {
            items: ranks
                .iter()
                .map(|&rank| Recommendation {
                    rank,
                    levers: RecommendedLevers {
                        pipeline_added: Some(true),
                        ..Default::default()
                    },
                    projected_verdict: Verdict::Pass,
                    projected_p_failure: 0.1,
                    explanation: format!("option {rank}"),
                })
                .collect(),
            unfixable: false,
            unfixable_reason: None,
        }
    }

    fn started(d: FetchDecision) -> RecommendationRequest {
        match d {
            FetchDecision::Start(req) => req,
            other => panic!("expected a request, got {other:?}"),
        }
    }

    #[test]
    fn second_fetch_is_rejected_while_pending() {
        let fail = sample_result(0.4);
        let mut s = RecommendationSession::new(3);
        let req = started(s.fetch(&fail));
        assert_eq!(req.project_id, 3);
        assert_eq!(s.fetch(&fail), FetchDecision::AlreadyInProgress);
        assert!(s.state().is_loading());
        assert!(s.on_response(req.ticket, Ok(set(&[2, 1]))));
        match s.state() {
            RecommendationState::Ready(set) => assert_eq!(set.items[0].rank, 1),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn only_offered_on_fail() {
        let mut s = RecommendationSession::new(1);
        assert_eq!(s.fetch(&sample_result(0.05)), FetchDecision::NotOffered);
        assert_eq!(s.state(), &RecommendationState::Idle);
    }

    #[test]
    fn refresh_clears_and_failure_leaves_nothing() {
        let fail = sample_result(0.4);
        let mut s = RecommendationSession::new(1);
        let req = started(s.fetch(&fail));
        s.on_response(req.ticket, Ok(set(&[1])));
        assert!(s.refresh());
        assert_eq!(s.state(), &RecommendationState::Idle);

        let req = started(s.fetch(&fail));
        s.on_response(req.ticket, Err(Error::Http { status: 500, detail: "agent down".into() }));
        match s.state() {
            RecommendationState::Failed { message, previous } => {
                assert!(message.contains("agent down"));
                assert!(previous.is_none());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn failed_refetch_keeps_previous_set() {
        let fail = sample_result(0.4);
        let mut s = RecommendationSession::new(1);
        let req = started(s.fetch(&fail));
        s.on_response(req.ticket, Ok(set(&[1, 2])));
        let req = started(s.fetch(&fail));
        assert_eq!(s.state().current().unwrap().items.len(), 2);
        s.on_response(req.ticket, Err(Error::Unreachable("offline".into())));
        assert!(matches!(s.state(), RecommendationState::Failed { previous: Some(_), .. }));
        assert_eq!(s.state().current().unwrap().items.len(), 2);
    }

    #[test]
    fn refresh_ignored_while_loading() {
        let mut s = RecommendationSession::new(1);
        started(s.fetch(&sample_result(0.4)));
        assert!(!s.refresh());
        assert!(s.state().is_loading());
    }

    #[test]
    fn cancel_and_teardown_drop_responses() {
        let fail = sample_result(0.4);
        let mut s = RecommendationSession::new(1);
        let req = started(s.fetch(&fail));
        s.cancel();
        assert_eq!(s.state(), &RecommendationState::Idle);
        assert!(!s.on_response(req.ticket, Ok(set(&[1]))));

        let req = started(s.fetch(&fail));
        s.teardown();
        assert!(!s.state().is_loading());
        assert!(!s.on_response(req.ticket, Ok(set(&[1]))));
    }

    #[test]
    fn teardown_during_refetch_keeps_shown_set() {
        let fail = sample_result(0.4);
        let mut s = RecommendationSession::new(1);
        let req = started(s.fetch(&fail));
        s.on_response(req.ticket, Ok(set(&[1, 2])));
        started(s.fetch(&fail));
        assert!(s.state().is_loading());
        s.teardown();
        match s.state() {
            RecommendationState::Ready(set) => assert_eq!(set.items.len(), 2),
            other => panic!("unexpected state {other:?}"),
        }
    }
}
