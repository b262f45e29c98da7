//! Supervisor router
//!
//! Decides, after each agent completes, which specialist runs next or
//! whether to terminate. The decision itself comes from a constrained
//! reasoning-backend call; deterministic overrides guard against a model
//! that loops or never signals completion.

use crate::agents::prompts::SUPERVISOR_PROMPT;
use crate::backend::{ReasoningBackend, RouteRequest};
use crate::config::RuntimeConfig;
use crate::error::OrchestrationError;
use crate::models::{RouteDecision, SpecialistRole};
use crate::state::SessionState;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Routing decisions get one retry when the backend's structured output
/// fails to decode into the closed role set.
const DECISION_ATTEMPTS: u32 = 2;

/// Outcome of one routing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterVerdict {
    Run {
        role: SpecialistRole,
        rationale: String,
    },
    /// Normal completion: the backend (or a fatal finding) ended the run.
    Terminate { rationale: String },
    /// Budget exhaustion: the session ends with `AbortedLimit`.
    Abort { rationale: String },
}

pub struct SupervisorRouter {
    backend: Arc<dyn ReasoningBackend>,
}

impl SupervisorRouter {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    /// Produce the next routing verdict for the session.
    pub async fn decide(
        &self,
        state: &SessionState,
        config: &RuntimeConfig,
    ) -> Result<RouterVerdict> {
        // Budget override comes first: a pathological model must not be
        // able to spend past the global step budget.
        if state.global_step_count >= config.global_step_budget {
            warn!(
                step_count = state.global_step_count,
                budget = config.global_step_budget,
                "Global step budget exhausted, forcing termination"
            );
            return Ok(RouterVerdict::Abort {
                rationale: format!(
                    "global step budget of {} exhausted",
                    config.global_step_budget
                ),
            });
        }

        if let Some(fatal) = state.fatal_finding() {
            info!(role = %fatal.role, "Fatal finding reported, terminating");
            return Ok(RouterVerdict::Terminate {
                rationale: format!("{} reported a fatal finding", fatal.role),
            });
        }

        let (decision, rationale) = self.constrained_decision(state).await?;

        match decision {
            RouteDecision::Terminate => Ok(RouterVerdict::Terminate { rationale }),
            RouteDecision::Run(role) => Ok(self.apply_overrides(state, config, role, rationale)),
        }
    }

    /// Loop-prevention policy applied on top of the backend's suggestion.
    fn apply_overrides(
        &self,
        state: &SessionState,
        config: &RuntimeConfig,
        role: SpecialistRole,
        rationale: String,
    ) -> RouterVerdict {
        if state.completed_roles.contains(&role) && !state.has_new_information_for(role) {
            warn!(
                role = %role,
                "Role re-selected with no new information, forcing termination"
            );
            return RouterVerdict::Terminate {
                rationale: format!(
                    "{} re-selected with no new information since its last pass",
                    role
                ),
            };
        }

        if state.invocation_count(role) >= config.max_role_invocations {
            warn!(
                role = %role,
                limit = config.max_role_invocations,
                "Role re-invocation limit reached, forcing termination"
            );
            return RouterVerdict::Terminate {
                rationale: format!(
                    "{} already invoked {} time(s)",
                    role, config.max_role_invocations
                ),
            };
        }

        RouterVerdict::Run { role, rationale }
    }

    /// Ask the backend for a decision constrained to the enumerated role
    /// identifiers plus TERMINATE, retrying once on an out-of-set value,
    /// then degrading to TERMINATE rather than trusting free text.
    async fn constrained_decision(
        &self,
        state: &SessionState,
    ) -> Result<(RouteDecision, String)> {
        let mut options: Vec<String> = SpecialistRole::ALL
            .iter()
            .map(|r| r.ident().to_string())
            .collect();
        options.push("TERMINATE".to_string());

        let system_prompt = self.build_prompt(state);

        for attempt in 1..=DECISION_ATTEMPTS {
            let raw = match self
                .backend
                .route(RouteRequest {
                    system_prompt: &system_prompt,
                    history: state.message_log(),
                    options: &options,
                })
                .await
            {
                Ok(raw) => raw,
                Err(OrchestrationError::InvalidDecision(msg)) if attempt < DECISION_ATTEMPTS => {
                    warn!(attempt, "Undecodable routing decision, retrying: {}", msg);
                    continue;
                }
                Err(OrchestrationError::InvalidDecision(msg)) => {
                    // Degrade gracefully: an unparseable supervisor is
                    // treated as a completion signal, not a crash.
                    warn!("Routing decision still undecodable, terminating: {}", msg);
                    return Ok((
                        RouteDecision::Terminate,
                        "routing decision undecodable after retry".to_string(),
                    ));
                }
                Err(e) => return Err(e),
            };

            let trimmed = raw.next.trim();
            if trimmed.eq_ignore_ascii_case("TERMINATE") || trimmed.eq_ignore_ascii_case("FINISH") {
                debug!("Supervisor decision: TERMINATE");
                return Ok((RouteDecision::Terminate, raw.rationale));
            }
            if let Some(role) = SpecialistRole::parse(trimmed) {
                debug!(role = %role, "Supervisor decision");
                return Ok((RouteDecision::Run(role), raw.rationale));
            }

            warn!(
                attempt,
                value = %raw.next,
                "Routing decision outside the allowed set"
            );
        }

        Ok((
            RouteDecision::Terminate,
            "routing decision outside the allowed set after retry".to_string(),
        ))
    }

    fn build_prompt(&self, state: &SessionState) -> String {
        let completed: Vec<&str> = state.completed_roles.iter().map(|r| r.ident()).collect();

        format!(
            "{}\n\nCurrent step: {}.\nSpecialists that have already reported: {}.",
            SUPERVISOR_PROMPT,
            state.global_step_count,
            if completed.is_empty() {
                "none".to_string()
            } else {
                completed.join(", ")
            }
        )
    }
}
