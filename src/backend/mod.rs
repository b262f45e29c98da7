//! Reasoning backend interface
//!
//! The orchestration core drives an inherently non-deterministic
//! decision-maker through this narrow boundary: free-form agent turns for
//! the ReAct loop, and constrained structured decisions for the supervisor.

use crate::models::{MessageEntry, RawRouteDecision};
use crate::Result;
use async_trait::async_trait;

pub mod gemini;
pub use gemini::GeminiBackend;

/// Declaration of a tool the backend may request during an agent turn.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments.
    pub parameters: serde_json::Value,
}

/// One agent-turn completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub history: &'a [MessageEntry],
    pub tools: &'a [ToolSpec],
    pub temperature: f32,
}

/// One constrained routing request: the reply must be one of `options`.
#[derive(Debug, Clone)]
pub struct RouteRequest<'a> {
    pub system_prompt: &'a str,
    pub history: &'a [MessageEntry],
    pub options: &'a [String],
}

/// What the backend produced for an agent turn.
#[derive(Debug, Clone)]
pub enum AgentTurn {
    /// The model wants an observation from a tool before continuing.
    ToolRequest {
        thought: Option<String>,
        tool_name: String,
        arguments: serde_json::Value,
    },
    /// The model signalled its final answer for this invocation.
    Final { text: String },
}

/// Trait for the language-model inference service.
///
/// Implementations fail with `BackendUnavailable` / `BackendTimeout` only;
/// everything else is expressed in the returned turn or decision.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AgentTurn>;
    async fn route(&self, request: RouteRequest<'_>) -> Result<RawRouteDecision>;
}

/// Scripted backend for development & testing.
/// Keeps the orchestration runnable without a live LLM: turns and routing
/// decisions are served from queues, with graceful defaults once drained.
pub struct ScriptedBackend {
    turns: std::sync::Mutex<std::collections::VecDeque<AgentTurn>>,
    routes: std::sync::Mutex<std::collections::VecDeque<RawRouteDecision>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            turns: std::sync::Mutex::new(std::collections::VecDeque::new()),
            routes: std::sync::Mutex::new(std::collections::VecDeque::new()),
        }
    }

    pub fn push_turn(&self, turn: AgentTurn) {
        self.turns.lock().unwrap().push_back(turn);
    }

    pub fn push_route(&self, next: &str, rationale: &str) {
        self.routes.lock().unwrap().push_back(RawRouteDecision {
            next: next.to_string(),
            rationale: rationale.to_string(),
        });
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn complete(&self, _request: CompletionRequest<'_>) -> Result<AgentTurn> {
        let turn = self.turns.lock().unwrap().pop_front();
        Ok(turn.unwrap_or(AgentTurn::Final {
            text: "No further analysis available.".to_string(),
        }))
    }

    async fn route(&self, _request: RouteRequest<'_>) -> Result<RawRouteDecision> {
        let decision = self.routes.lock().unwrap().pop_front();
        Ok(decision.unwrap_or(RawRouteDecision {
            next: "TERMINATE".to_string(),
            rationale: "script exhausted".to_string(),
        }))
    }
}
