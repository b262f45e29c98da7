//! Orchestration graph
//!
//! Drives the Router <-> Agent cycle to completion: ROUTING selects a
//! specialist or terminates, EXECUTING runs the ReAct loop, and a
//! checkpoint is persisted after every node execution. Each step mutates
//! a working clone committed together with its checkpoint, so a reader of
//! the checkpoint store always observes a consistent prior step.

use crate::agents;
use crate::backend::ReasoningBackend;
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::config::RuntimeConfig;
use crate::error::OrchestrationError;
use crate::models::{RouteDecision, RoutingRecord, SessionStatus};
use crate::react::ReactExecutor;
use crate::router::{RouterVerdict, SupervisorRouter};
use crate::state::SessionState;
use crate::tools::ToolRegistry;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Cooperative whole-session cancellation. Observed between steps; the
/// last checkpoint remains the resumable point.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The state machine wiring Router -> Agent -> Router -> ... -> Terminate.
pub struct OrchestrationGraph {
    router: SupervisorRouter,
    executor: ReactExecutor,
    checkpoints: Arc<dyn CheckpointStore>,
    config: RuntimeConfig,
    cancel: CancelToken,
}

impl OrchestrationGraph {
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        registry: Arc<ToolRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            router: SupervisorRouter::new(backend.clone()),
            executor: ReactExecutor::new(backend, registry, config.max_agent_iterations),
            checkpoints,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Handle for whole-session cancellation from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute a fresh session for `query` and return its terminal state.
    pub async fn run(&self, query: &str) -> Result<SessionState> {
        let state = SessionState::new(query);
        info!(
            session_id = %state.session_id,
            query = %query,
            "Orchestration starting"
        );

        if let Err(e) = self.checkpoint(&state).await {
            return Ok(self.fail(state, e));
        }

        self.drive(state).await
    }

    /// Re-enter a previously checkpointed session at its last committed
    /// transition. A crash mid-agent-execution resumes as if that agent
    /// had not yet run; only finalized findings were persisted.
    pub async fn resume(&self, session_id: Uuid) -> Result<SessionState> {
        let record = self
            .checkpoints
            .load(session_id)
            .await?
            .ok_or(OrchestrationError::SessionNotFound(session_id))?;

        if !record.verify_integrity() {
            return Err(OrchestrationError::Checkpoint(format!(
                "integrity check failed for session {}",
                session_id
            )));
        }

        let state = record.state;
        if state.status.is_terminal() {
            info!(
                session_id = %session_id,
                status = %state.status,
                "Session already terminal, nothing to resume"
            );
            return Ok(state);
        }

        info!(
            session_id = %session_id,
            step_count = state.global_step_count,
            pending = ?state.pending_role,
            "Resuming session from checkpoint"
        );
        self.drive(state).await
    }

    async fn drive(&self, mut state: SessionState) -> Result<SessionState> {
        // Re-enter mid-EXECUTING when the last checkpoint recorded a
        // routing decision whose agent never completed.
        if state.pending_role.is_some() {
            state = self.execute_pending(state).await?;
            if state.status.is_terminal() {
                return Ok(state);
            }
        }

        loop {
            if self.cancel.is_cancelled() {
                info!(session_id = %state.session_id, "Session cancelled");
                state.set_status(SessionStatus::AbortedLimit)?;
                if let Err(e) = self.checkpoint(&state).await {
                    warn!(error = %e, "Failed to checkpoint cancelled session");
                }
                return Ok(state);
            }

            // === ROUTING ===
            let verdict = match self.router.decide(&state, &self.config).await {
                Ok(verdict) => verdict,
                Err(e) => return Ok(self.fail(state, e)),
            };

            match verdict {
                RouterVerdict::Run { role, rationale } => {
                    let mut working = state.clone();
                    working.record_routing(RoutingRecord::new(
                        RouteDecision::Run(role),
                        rationale,
                        working.global_step_count,
                    ))?;
                    if let Err(e) = self.checkpoint(&working).await {
                        return Ok(self.fail(state, e));
                    }
                    state = working;

                    // === EXECUTING(role) ===
                    state = self.execute_pending(state).await?;
                    if state.status.is_terminal() {
                        return Ok(state);
                    }
                }
                RouterVerdict::Terminate { rationale } => {
                    return self
                        .terminate(state, SessionStatus::Complete, rationale)
                        .await;
                }
                RouterVerdict::Abort { rationale } => {
                    return self
                        .terminate(state, SessionStatus::AbortedLimit, rationale)
                        .await;
                }
            }
        }
    }

    /// Run the pending role's ReAct loop on a working clone and commit it
    /// together with its checkpoint.
    async fn execute_pending(&self, state: SessionState) -> Result<SessionState> {
        let role = state.pending_role.ok_or_else(|| {
            OrchestrationError::State("execute called without a pending role".to_string())
        })?;

        let mut working = state.clone();
        let step = working.begin_invocation(role)?;
        info!(
            session_id = %working.session_id,
            role = %role,
            step,
            "Executing specialist"
        );

        let spec = agents::spec_for(role);
        match self.executor.run(&spec, &mut working).await {
            Ok(finding) => {
                working.complete_invocation(finding)?;
                if let Err(e) = self.checkpoint(&working).await {
                    return Ok(self.fail(state, e));
                }
                Ok(working)
            }
            // Mid-agent failure: the working clone (with its partial
            // scratch) is dropped; the pre-invocation checkpoint stands.
            Err(e) => Ok(self.fail(state, e)),
        }
    }

    async fn terminate(
        &self,
        state: SessionState,
        status: SessionStatus,
        rationale: String,
    ) -> Result<SessionState> {
        let mut working = state.clone();
        working.record_routing(RoutingRecord::new(
            RouteDecision::Terminate,
            rationale,
            working.global_step_count,
        ))?;
        working.set_status(status)?;
        if let Err(e) = self.checkpoint(&working).await {
            return Ok(self.fail(state, e));
        }

        info!(
            session_id = %working.session_id,
            status = %working.status,
            steps = working.global_step_count,
            roles_completed = working.completed_roles.len(),
            "Orchestration terminated"
        );
        Ok(working)
    }

    async fn checkpoint(&self, state: &SessionState) -> Result<()> {
        self.checkpoints
            .save(CheckpointRecord::snapshot(state))
            .await
    }

    /// Mark the session failed in memory. The failed status is not
    /// checkpointed: the last good snapshot stays resumable once the
    /// backend recovers, and the returned state still reports every
    /// completed role and partial finding.
    fn fail(&self, mut state: SessionState, error: OrchestrationError) -> SessionState {
        warn!(
            session_id = %state.session_id,
            error = %error,
            roles_completed = state.completed_roles.len(),
            "Session failed"
        );
        if !state.status.is_terminal() {
            let _ = state.set_status(SessionStatus::Failed);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AgentTurn, CompletionRequest, RouteRequest, ScriptedBackend};
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::models::{RawRouteDecision, SpecialistRole};
    use std::sync::atomic::AtomicUsize;

    fn graph_with(
        backend: Arc<dyn ReasoningBackend>,
        store: Arc<InMemoryCheckpointStore>,
        config: RuntimeConfig,
    ) -> OrchestrationGraph {
        OrchestrationGraph::new(backend, Arc::new(ToolRegistry::new()), store, config)
    }

    #[tokio::test]
    async fn test_scripted_pipeline_completes() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_route("geopolitical_analyst", "establish macro context");
        backend.push_route("credit_evaluator", "now the fundamentals");
        backend.push_route("TERMINATE", "both analyses are sufficient");
        backend.push_turn(AgentTurn::Final {
            text: "Risk Level: MODERATE\nRegional exposure is contained.".to_string(),
        });
        backend.push_turn(AgentTurn::Final {
            text: "Internal Credit Rating: BBB / Stable".to_string(),
        });

        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = graph_with(backend, store.clone(), RuntimeConfig::default());

        let state = graph.run("Assess risk for Company X").await.unwrap();

        assert_eq!(state.status, SessionStatus::Complete);
        assert_eq!(state.global_step_count, 2);
        assert_eq!(state.routing_history.len(), 3);
        assert_eq!(state.agent_outputs.len(), 2);
        assert!(state.agent_outputs.contains_key(&SpecialistRole::Geopolitical));
        assert!(state.agent_outputs.contains_key(&SpecialistRole::Credit));

        // terminal snapshot persisted
        let record = store.load(state.session_id).await.unwrap().unwrap();
        assert_eq!(record.state.status, SessionStatus::Complete);
    }

    #[tokio::test]
    async fn test_never_terminating_backend_hits_budget() {
        let backend = Arc::new(ScriptedBackend::new());
        // rotate roles so no loop-prevention override fires first
        for _ in 0..3 {
            backend.push_route("geopolitical_analyst", "more");
            backend.push_route("credit_evaluator", "more");
            backend.push_route("market_synthesizer", "more");
        }
        for i in 0..9 {
            backend.push_turn(AgentTurn::Final {
                text: format!("analysis pass {}", i),
            });
        }

        let config = RuntimeConfig {
            global_step_budget: 3,
            max_role_invocations: 10,
            ..RuntimeConfig::default()
        };
        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = graph_with(backend, store, config);

        let state = graph.run("q").await.unwrap();

        assert_eq!(state.status, SessionStatus::AbortedLimit);
        assert_eq!(state.global_step_count, 3);
        // findings completed before the limit are retained
        assert_eq!(state.agent_outputs.len(), 3);
    }

    #[tokio::test]
    async fn test_budget_boundary_retains_prior_findings() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_route("geopolitical_analyst", "first");
        backend.push_route("credit_evaluator", "second");
        backend.push_route("market_synthesizer", "would be third");
        backend.push_turn(AgentTurn::Final {
            text: "geo findings".to_string(),
        });
        backend.push_turn(AgentTurn::Final {
            text: "credit findings".to_string(),
        });

        let config = RuntimeConfig {
            global_step_budget: 2,
            ..RuntimeConfig::default()
        };
        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = graph_with(backend, store, config);

        let state = graph.run("q").await.unwrap();

        assert_eq!(state.status, SessionStatus::AbortedLimit);
        assert_eq!(state.agent_outputs.len(), 2);
        assert_eq!(
            state.agent_outputs[&SpecialistRole::Geopolitical].analysis,
            "geo findings"
        );
    }

    /// Delegates to a script until `fail_after` routing calls have been
    /// served, then reports the backend unreachable.
    struct FailAfterBackend {
        inner: ScriptedBackend,
        fail_after: usize,
        served: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ReasoningBackend for FailAfterBackend {
        async fn complete(&self, request: CompletionRequest<'_>) -> crate::Result<AgentTurn> {
            self.inner.complete(request).await
        }

        async fn route(
            &self,
            request: RouteRequest<'_>,
        ) -> crate::Result<RawRouteDecision> {
            if self.served.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                return Err(OrchestrationError::BackendUnavailable(
                    "inference service unreachable".to_string(),
                ));
            }
            self.inner.route(request).await
        }
    }

    #[tokio::test]
    async fn test_backend_failure_reports_partials_and_stays_resumable() {
        let inner = ScriptedBackend::new();
        inner.push_route("geopolitical_analyst", "start");
        inner.push_turn(AgentTurn::Final {
            text: "geo findings".to_string(),
        });
        let backend = Arc::new(FailAfterBackend {
            inner,
            fail_after: 1,
            served: AtomicUsize::new(0),
        });

        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = graph_with(backend, store.clone(), RuntimeConfig::default());

        let state = graph.run("q").await.unwrap();

        // caller sees the failure together with the partial findings
        assert_eq!(state.status, SessionStatus::Failed);
        assert!(state.agent_outputs.contains_key(&SpecialistRole::Geopolitical));

        // the persisted snapshot is the last good one, still in progress
        let record = store.load(state.session_id).await.unwrap().unwrap();
        assert_eq!(record.state.status, SessionStatus::InProgress);
        assert_eq!(record.state.agent_outputs.len(), 1);
    }

    #[tokio::test]
    async fn test_resume_after_routing_transition_is_idempotent() {
        // Checkpoint taken immediately after a ROUTING -> EXECUTING
        // transition: the decision is recorded, the agent has not run.
        let mut state = SessionState::new("Assess risk for Company X");
        state
            .record_routing(RoutingRecord::new(
                RouteDecision::Run(SpecialistRole::Geopolitical),
                "establish macro context",
                0,
            ))
            .unwrap();
        let session_id = state.session_id;

        let store = Arc::new(InMemoryCheckpointStore::new());
        store.save(CheckpointRecord::snapshot(&state)).await.unwrap();

        let backend = Arc::new(ScriptedBackend::new());
        backend.push_turn(AgentTurn::Final {
            text: "geo findings".to_string(),
        });
        backend.push_route("TERMINATE", "sufficient");

        let graph = graph_with(backend, store, RuntimeConfig::default());
        let resumed = graph.resume(session_id).await.unwrap();

        assert_eq!(resumed.status, SessionStatus::Complete);
        // the recorded decision was applied exactly once
        assert_eq!(resumed.global_step_count, 1);
        assert_eq!(resumed.routing_history.len(), 2);
        assert_eq!(resumed.agent_outputs.len(), 1);
    }

    #[tokio::test]
    async fn test_resume_unknown_session_errors() {
        let backend = Arc::new(ScriptedBackend::new());
        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = graph_with(backend, store, RuntimeConfig::default());

        let err = graph.resume(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_resume_terminal_session_is_a_no_op() {
        let mut state = SessionState::new("q");
        state.set_status(SessionStatus::Complete).unwrap();
        let session_id = state.session_id;

        let store = Arc::new(InMemoryCheckpointStore::new());
        store.save(CheckpointRecord::snapshot(&state)).await.unwrap();

        let backend = Arc::new(ScriptedBackend::new());
        let graph = graph_with(backend, store, RuntimeConfig::default());

        let resumed = graph.resume(session_id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Complete);
        assert_eq!(resumed.routing_history.len(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_step() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_route("geopolitical_analyst", "would run");

        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = graph_with(backend, store, RuntimeConfig::default());

        graph.cancel_token().cancel();
        let state = graph.run("q").await.unwrap();

        assert_eq!(state.status, SessionStatus::AbortedLimit);
        assert_eq!(state.global_step_count, 0);
        assert!(state.routing_history.is_empty());
    }
}
