//! ReAct loop executor
//!
//! Runs the bounded think -> act -> observe cycle for one agent invocation.
//! Tool and validation failures become observations the reasoning step can
//! react to; only a failing reasoning backend escapes this loop.

use crate::agents::RoleSpec;
use crate::backend::{AgentTurn, CompletionRequest, ReasoningBackend};
use crate::error::OrchestrationError;
use crate::models::{
    AgentFinding, MessageEntry, Observation, ObservationKind, ToolInput,
};
use crate::state::SessionState;
use crate::tools::ToolRegistry;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cap on how much of an observation is echoed into a best-effort summary.
const SUMMARY_SNIPPET_LEN: usize = 400;

/// Ephemeral per-invocation record: one thought/action/observation triple
/// per loop iteration. Discarded after the finding is finalized.
#[derive(Debug, Default)]
pub struct ScratchStep {
    pub thought: Option<String>,
    pub action: Option<ToolInput>,
    pub observation: Option<Observation>,
}

/// Created per ReAct run; never persisted beyond the final summary.
#[derive(Debug)]
pub struct InvocationDescriptor {
    pub iteration: u32,
    pub scratch: Vec<ScratchStep>,
}

impl InvocationDescriptor {
    fn new() -> Self {
        Self {
            iteration: 0,
            scratch: Vec::new(),
        }
    }
}

/// Executes the reason-act-observe cycle for one specialist invocation.
pub struct ReactExecutor {
    backend: Arc<dyn ReasoningBackend>,
    registry: Arc<ToolRegistry>,
    /// Global clamp on per-role iteration caps.
    max_iterations: u32,
}

impl ReactExecutor {
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        registry: Arc<ToolRegistry>,
        max_iterations: u32,
    ) -> Self {
        Self {
            backend,
            registry,
            max_iterations,
        }
    }

    /// Run the loop for `spec`, appending thoughts, tool calls, and tool
    /// results to the session log, and produce the finalized finding.
    pub async fn run(&self, spec: &RoleSpec, state: &mut SessionState) -> Result<AgentFinding> {
        let role = spec.role;
        let system_prompt = spec.system_prompt();
        let tool_specs = self.registry.specs_for(spec.allowed_tools);
        let iteration_cap = spec.max_iterations.min(self.max_iterations);

        let mut descriptor = InvocationDescriptor::new();
        let started = Instant::now();

        info!(role = %role, iteration_cap, "ReAct loop starting");

        while descriptor.iteration < iteration_cap {
            descriptor.iteration += 1;

            let turn = self
                .backend
                .complete(CompletionRequest {
                    system_prompt: &system_prompt,
                    history: state.message_log(),
                    tools: &tool_specs,
                    temperature: spec.temperature,
                })
                .await?;

            match turn {
                AgentTurn::Final { text } => {
                    info!(
                        role = %role,
                        iterations = descriptor.iteration,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "ReAct loop finished with a final answer"
                    );
                    return Ok(AgentFinding::from_analysis(role, text, false));
                }
                AgentTurn::ToolRequest {
                    thought,
                    tool_name,
                    arguments,
                } => {
                    let mut step = ScratchStep::default();

                    if let Some(thought) = thought {
                        state.append_entry(MessageEntry::thought(role, thought.clone()))?;
                        step.thought = Some(thought);
                    }

                    state.append_entry(MessageEntry::tool_call(role, &tool_name, &arguments))?;
                    let input = ToolInput {
                        tool_name: tool_name.clone(),
                        arguments,
                    };

                    let observation = self.observe(spec, &input).await?;
                    state.append_entry(MessageEntry::tool_result(
                        role,
                        &tool_name,
                        observation.content.clone(),
                    ))?;

                    debug!(
                        role = %role,
                        tool = %tool_name,
                        kind = ?observation.kind,
                        iteration = descriptor.iteration,
                        "Observation recorded"
                    );

                    step.action = Some(input);
                    step.observation = Some(observation);
                    descriptor.scratch.push(step);
                }
            }
        }

        // Iteration cap reached without a final-answer signal: partial
        // information is preferable to no output.
        warn!(
            role = %role,
            iteration_cap,
            "ReAct loop hit iteration cap, force-finalizing"
        );
        let text = best_effort_summary(&descriptor);
        Ok(AgentFinding::from_analysis(role, text, true))
    }

    /// Resolve one tool request into an observation. Disallowed tools are
    /// never invoked; tool failures are downgraded to observations.
    async fn observe(&self, spec: &RoleSpec, input: &ToolInput) -> Result<Observation> {
        if !spec.allowed_tools.contains(&input.tool_name.as_str()) {
            return Ok(Observation::new(
                ObservationKind::ValidationError,
                &input.tool_name,
                format!(
                    "VALIDATION_ERROR: tool `{}` is not permitted for {}; allowed: {}",
                    input.tool_name,
                    spec.role,
                    spec.allowed_tools.join(", ")
                ),
            ));
        }

        let Some(tool) = self.registry.get(&input.tool_name) else {
            return Ok(Observation::new(
                ObservationKind::ToolError,
                &input.tool_name,
                format!("TOOL_ERROR(NOT_FOUND): tool `{}` is not registered", input.tool_name),
            ));
        };

        let started = Instant::now();
        match tool.invoke(input).await {
            Ok(output) => {
                debug!(
                    tool = %input.tool_name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool invocation succeeded"
                );
                Ok(Observation::new(
                    ObservationKind::ToolSuccess,
                    &input.tool_name,
                    output.data.to_string(),
                ))
            }
            Err(OrchestrationError::Tool { kind, message }) => Ok(Observation::new(
                ObservationKind::ToolError,
                &input.tool_name,
                format!("TOOL_ERROR({}): {}", kind, message),
            )),
            Err(OrchestrationError::Validation(message)) => Ok(Observation::new(
                ObservationKind::ValidationError,
                &input.tool_name,
                format!("VALIDATION_ERROR: {}", message),
            )),
            Err(other) => Err(other),
        }
    }
}

/// Synthesize a finding from whatever observations were gathered before
/// the cap hit.
fn best_effort_summary(descriptor: &InvocationDescriptor) -> String {
    let successes: Vec<&Observation> = descriptor
        .scratch
        .iter()
        .filter_map(|s| s.observation.as_ref())
        .filter(|o| o.kind == ObservationKind::ToolSuccess)
        .collect();

    if successes.is_empty() {
        return "Best-effort assessment: the iteration limit was reached before any \
                usable observations could be gathered. No conclusions can be drawn."
            .to_string();
    }

    let mut out = format!(
        "Best-effort assessment based on {} gathered observation(s):\n",
        successes.len()
    );
    for obs in successes {
        let snippet: String = obs.content.chars().take(SUMMARY_SNIPPET_LEN).collect();
        out.push_str(&format!("- [{}] {}\n", obs.tool_name, snippet));
    }
    out.push_str("\nThe reasoning loop was terminated at its iteration cap before a final synthesis.");
    out
}
