//! The results session: polling, what-if and recommendations on one timeline.
//!
//! A [`ResultsSession`] is a single task that owns every state machine of a
//! project view. Network calls run as spawned tasks and report back through
//! an event channel; timers are derived from the state machines' deadlines.
//! Nothing else mutates the lever set or the result slots, and every change
//! is published as a fresh [`ResultsView`].

use std::collections::HashMap;
use std::time::Instant;

use smol::channel::{self, Receiver, Sender};
use smol::future;
use smol::{Task, Timer};

use crate::config::ClientConfig;
use crate::model::{
    JobStatus, JobStatusResponse, LeverSet, Project, ProjectId, RecommendationSet,
    SimulationResult, Validate,
};
use crate::polling::{PollEvent, PollPhase, PollingController, StatusRequest};
use crate::recommend::{
    FetchDecision, RecommendationRequest, RecommendationSession, RecommendationState,
};
use crate::transport::Backend;
use crate::whatif::{RecomputeOutcome, RecomputeRequest, WhatIfSyncEngine};
use crate::{Error, Result};

/// Coarse state of the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the baseline; carries the last reported job status.
    Polling(Option<JobStatus>),
    /// Baseline available; what-if edits are accepted.
    Ready,
    /// Unrecoverable error; the only way forward is a new project.
    Failed(String),
    /// The session was torn down.
    Closed,
}

/// Read model consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub phase: SessionPhase,
    /// Live result if present, else the baseline.
    pub displayed_result: Option<SimulationResult>,
    pub is_live: bool,
    /// Levers the live result was computed for.
    pub live_levers: Option<LeverSet>,
    /// An edit is waiting for its debounce window to close.
    pub is_pending: bool,
    /// A recompute for the current levers is in flight.
    pub is_loading: bool,
    pub levers: Option<LeverSet>,
    pub project: Option<Project>,
    pub recommendations: RecommendationState,
    /// Recommendations can be requested for the displayed result.
    pub recommendations_offered: bool,
    /// Last recompute failure; the displayed result is the last good one.
    pub last_error: Option<String>,
}

#[derive(Debug)]
enum Command {
    SetLevers(LeverSet),
    ApplyRecommendation(u32),
    FetchRecommendations,
    RefreshRecommendations,
    CancelRecommendations,
    Shutdown,
}

enum Event {
    JobStatus(u64, Result<JobStatusResponse>),
    Recompute(u64, Result<SimulationResult>),
    Recommendations(u64, Result<RecommendationSet>),
    Project(Result<Project>),
}

enum Wakeup {
    Command(Option<Command>),
    Event(Event),
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TaskKey {
    Status(u64),
    Recompute(u64),
    Recommend(u64),
    Project,
}

/// Cloneable handle used by the presentation layer to drive a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: Sender<Command>,
}

impl SessionHandle {
    /// Replaces the lever set. Invalid levers are rejected here.
    pub async fn set_levers(&self, levers: LeverSet) -> Result<()> {
        levers.validate()?;
        self.send(Command::SetLevers(levers)).await
    }

    /// Pushes the levers of recommendation `rank` through [`Self::set_levers`] semantics.
    pub async fn apply_recommendation(&self, rank: u32) -> Result<()> {
        self.send(Command::ApplyRecommendation(rank)).await
    }

    pub async fn fetch_recommendations(&self) -> Result<()> {
        self.send(Command::FetchRecommendations).await
    }

    /// Discards the stored recommendations.
    pub async fn refresh_recommendations(&self) -> Result<()> {
        self.send(Command::RefreshRecommendations).await
    }

    pub async fn cancel_recommendations(&self) -> Result<()> {
        self.send(Command::CancelRecommendations).await
    }

    /// Tears the session down: timers cleared, in-flight requests cancelled.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }
}

/// Owns the whole results view of one project.
pub struct ResultsSession<B: Backend> {
    backend: B,
    project_id: ProjectId,
    config: ClientConfig,
    poller: PollingController,
    engine: Option<WhatIfSyncEngine>,
    recommendations: RecommendationSession,
    project: Option<Project>,
    tasks: HashMap<TaskKey, Task<()>>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    commands: Receiver<Command>,
    views: Sender<ResultsView>,
    last_view: Option<ResultsView>,
    closed: bool,
}

impl<B: Backend> ResultsSession<B> {
    /// Creates a session together with its command handle and view stream.
    pub fn open(
        backend: B,
        project_id: ProjectId,
        config: &ClientConfig,
    ) -> (Self, SessionHandle, Receiver<ResultsView>) {
        let (commands_tx, commands_rx) = channel::unbounded();
        let (events_tx, events_rx) = channel::unbounded();
        let (views_tx, views_rx) = channel::unbounded();
        let session = Self {
            backend,
            project_id,
            config: config.clone(),
            poller: PollingController::new(config.poll_interval()),
            engine: None,
            recommendations: RecommendationSession::new(project_id),
            project: None,
            tasks: HashMap::new(),
            events_tx,
            events_rx,
            commands: commands_rx,
            views: views_tx,
            last_view: None,
            closed: false,
        };
        let handle = SessionHandle {
            commands: commands_tx,
        };
        (session, handle, views_rx)
    }

    /// Runs until shutdown, until every handle is dropped, or until the
    /// baseline job ends in an unrecoverable error.
    pub async fn run(mut self) -> Result<()> {
        let first = self.poller.start(self.project_id);
        self.spawn_status(first);
        self.spawn_project();
        let outcome = self.event_loop().await;
        self.teardown();
        self.publish();
        outcome
    }

    /// Current read model.
    pub fn view(&self) -> ResultsView {
        let phase = match self.poller.phase() {
            PollPhase::Failed | PollPhase::Unreachable => SessionPhase::Failed(
                self.poller
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| Error::JobFailed.to_string()),
            ),
            _ if self.closed => SessionPhase::Closed,
            PollPhase::Complete => SessionPhase::Ready,
            PollPhase::Idle | PollPhase::Polling => {
                SessionPhase::Polling(self.poller.last_status())
            }
        };
        let engine = self.engine.as_ref();
        ResultsView {
            phase,
            displayed_result: engine.map(|e| e.displayed().clone()),
            is_live: engine.is_some_and(|e| e.is_live()),
            live_levers: engine.and_then(|e| e.live()).map(|l| l.levers),
            is_pending: engine.is_some_and(|e| e.is_pending()),
            is_loading: engine.is_some_and(|e| e.is_loading()),
            levers: engine.map(|e| *e.levers()),
            project: self.project.clone(),
            recommendations: self.recommendations.state().clone(),
            recommendations_offered: engine
                .is_some_and(|e| RecommendationSession::is_offered(e.displayed())),
            last_error: engine.and_then(|e| e.last_error()).map(str::to_string),
        }
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            self.publish();
            match self.next_wakeup().await {
                Wakeup::Command(Some(Command::Shutdown)) => {
                    log::info!("session for project {} shutting down", self.project_id);
                    return Ok(());
                }
                Wakeup::Command(Some(command)) => self.handle_command(command),
                Wakeup::Command(None) => {
                    log::debug!("all session handles dropped");
                    return Ok(());
                }
                Wakeup::Event(event) => self.handle_event(event)?,
                Wakeup::Timer => self.fire_timers(),
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let poll = self.poller.next_deadline();
        let debounce = self.engine.as_ref().and_then(|e| e.next_deadline());
        match (poll, debounce) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn next_wakeup(&self) -> Wakeup {
        let deadline = self.next_deadline();
        let commands = async { Wakeup::Command(self.commands.recv().await.ok()) };
        let events = async {
            match self.events_rx.recv().await {
                Ok(event) => Wakeup::Event(event),
                Err(_) => future::pending().await,
            }
        };
        let timer = async move {
            match deadline {
                Some(at) => {
                    Timer::at(at).await;
                }
                None => future::pending::<()>().await,
            }
            Wakeup::Timer
        };
        future::or(commands, future::or(events, timer)).await
    }

    fn handle_command(&mut self, command: Command) {
        let now = Instant::now();
        let Some(engine) = self.engine.as_mut() else {
            log::warn!("ignoring {command:?} before the baseline is available");
            return;
        };
        match command {
            Command::SetLevers(levers) => {
                if let Err(err) = engine.set_levers(levers, now) {
                    log::warn!("lever edit rejected: {err}");
                }
            }
            Command::ApplyRecommendation(rank) => {
                let levers = self
                    .recommendations
                    .state()
                    .current()
                    .and_then(|set| set.by_rank(rank))
                    .map(|rec| rec.levers.apply_to(engine.levers()));
                match levers {
                    Some(levers) => {
                        if let Err(err) = engine.set_levers(levers, now) {
                            log::warn!("recommendation {rank} not applicable: {err}");
                        }
                    }
                    None => log::warn!("no recommendation with rank {rank}"),
                }
            }
            Command::FetchRecommendations => {
                match self.recommendations.fetch(engine.displayed()) {
                    FetchDecision::Start(request) => self.spawn_recommendations(request),
                    FetchDecision::AlreadyInProgress => {}
                    FetchDecision::NotOffered => {
                        log::debug!("recommendations not offered for a passing result")
                    }
                }
            }
            Command::RefreshRecommendations => {
                self.recommendations.refresh();
            }
            Command::CancelRecommendations => {
                self.recommendations.cancel();
                self.tasks
                    .retain(|key, _| !matches!(key, TaskKey::Recommend(_)));
            }
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        let now = Instant::now();
        match event {
            Event::JobStatus(token, response) => {
                self.tasks.remove(&TaskKey::Status(token));
                match self.poller.on_response(token, response, now) {
                    PollEvent::Complete => {
                        if let Some(baseline) = self.poller.result().cloned() {
                            self.start_what_if(baseline);
                        }
                    }
                    PollEvent::Failed | PollEvent::Unreachable => {
                        return Err(self.poller.error().cloned().unwrap_or(Error::JobFailed));
                    }
                    PollEvent::Waiting { status, .. } => {
                        log::debug!("job for project {} is {status:?}", self.project_id)
                    }
                    PollEvent::Ignored => {}
                }
            }
            Event::Recompute(seq, response) => {
                self.tasks.remove(&TaskKey::Recompute(seq));
                if let Some(engine) = self.engine.as_mut() {
                    if let RecomputeOutcome::Accepted = engine.on_response(seq, response) {
                        log::info!(
                            "live verdict {} for levers {:?}",
                            engine.displayed().verdict,
                            engine.levers()
                        );
                    }
                }
            }
            Event::Recommendations(ticket, response) => {
                self.tasks.remove(&TaskKey::Recommend(ticket));
                self.recommendations.on_response(ticket, response);
            }
            Event::Project(response) => {
                self.tasks.remove(&TaskKey::Project);
                match response {
                    Ok(project) => {
                        if let Some(engine) = self.engine.as_mut() {
                            engine.set_reference(project.reference_levers());
                        }
                        self.project = Some(project);
                    }
                    Err(err) => log::warn!("project metadata unavailable: {err}"),
                }
            }
        }
        Ok(())
    }

    fn fire_timers(&mut self) {
        let now = Instant::now();
        if let Some(request) = self.poller.poll_due(now) {
            self.spawn_status(request);
        }
        if let Some(request) = self.engine.as_mut().and_then(|e| e.poll_due(now)) {
            self.spawn_recompute(request);
        }
    }

    fn start_what_if(&mut self, baseline: SimulationResult) {
        let reference = self
            .project
            .as_ref()
            .map(Project::reference_levers)
            .unwrap_or_default();
        self.engine = Some(WhatIfSyncEngine::new(
            self.project_id,
            baseline,
            reference,
            self.config.debounce(),
        ));
    }

    fn spawn_status(&mut self, request: StatusRequest) {
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        let task = smol::spawn(async move {
            let response = backend.job_status(request.project_id).await;
            let _ = tx.send(Event::JobStatus(request.token, response)).await;
        });
        self.tasks.insert(TaskKey::Status(request.token), task);
    }

    fn spawn_recompute(&mut self, request: RecomputeRequest) {
        log::debug!("recompute {} for {:?}", request.seq, request.levers);
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        let task = smol::spawn(async move {
            let response = backend.recompute(request.project_id, &request.levers).await;
            let _ = tx.send(Event::Recompute(request.seq, response)).await;
        });
        self.tasks.insert(TaskKey::Recompute(request.seq), task);
    }

    fn spawn_recommendations(&mut self, request: RecommendationRequest) {
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        let task = smol::spawn(async move {
            let response = backend.recommendations(request.project_id).await;
            let _ = tx
                .send(Event::Recommendations(request.ticket, response))
                .await;
        });
        self.tasks.insert(TaskKey::Recommend(request.ticket), task);
    }

    fn spawn_project(&mut self) {
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        let id = self.project_id;
        let task = smol::spawn(async move {
            let response = backend.project(id).await;
            let _ = tx.send(Event::Project(response)).await;
        });
        self.tasks.insert(TaskKey::Project, task);
    }

    fn teardown(&mut self) {
        self.poller.stop();
        if let Some(engine) = self.engine.as_mut() {
            engine.teardown();
        }
        self.recommendations.teardown();
        // dropping a task cancels it
        self.tasks.clear();
        self.closed = true;
    }

    fn publish(&mut self) {
        let view = self.view();
        if self.last_view.as_ref() == Some(&view) {
            return;
        }
        // a closed receiver only means nobody is watching
        let _ = self.views.try_send(view.clone());
        self.last_view = Some(view);
    }
}
