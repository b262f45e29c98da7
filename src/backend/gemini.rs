//! Gemini API client implementing the reasoning backend
//!
//! Uses a long-lived reqwest::Client for connection pooling, function
//! declarations for tool use, and a JSON-constrained response mode for
//! supervisor routing decisions. Rate limits are retried with exponential
//! backoff; everything else fails the call.

use crate::backend::{AgentTurn, CompletionRequest, ReasoningBackend, RouteRequest};
use crate::error::OrchestrationError;
use crate::models::{MessageEntry, MessageRole, RawRouteDecision};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

/// Reusable Gemini client (connection-pooled)
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl GeminiBackend {
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                OrchestrationError::BackendUnavailable(format!(
                    "Failed to build HTTP client: {}",
                    e
                ))
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 5,
            retry_base_delay: Duration::from_secs(15),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Issue the request, retrying on rate limits with exponential backoff.
    async fn send(&self, request: &GeminiRequest) -> Result<GeminiResponse> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::BackendUnavailable(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        for attempt in 0..=self.max_retries {
            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    error!("Gemini API request failed: {}", e);
                    if e.is_timeout() {
                        OrchestrationError::BackendTimeout(format!("Gemini API timeout: {}", e))
                    } else {
                        OrchestrationError::BackendUnavailable(format!("Gemini API error: {}", e))
                    }
                })?;

            let status = response.status();
            if status.as_u16() == 429 {
                if attempt >= self.max_retries {
                    return Err(OrchestrationError::BackendUnavailable(
                        "Gemini API rate limit: retries exhausted".to_string(),
                    ));
                }
                let delay = std::cmp::min(
                    self.retry_base_delay * 2u32.saturating_pow(attempt),
                    MAX_RETRY_DELAY,
                );
                warn!(
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    "Gemini rate limit hit, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                error!("Gemini API error response: {}", error_text);
                return Err(OrchestrationError::BackendUnavailable(format!(
                    "Gemini API returned {}: {}",
                    status, error_text
                )));
            }

            return response.json::<GeminiResponse>().await.map_err(|e| {
                error!("Failed to parse Gemini response: {}", e);
                OrchestrationError::BackendUnavailable(format!("Gemini parse error: {}", e))
            });
        }

        Err(OrchestrationError::BackendUnavailable(
            "Gemini API rate limit: retries exhausted".to_string(),
        ))
    }
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AgentTurn> {
        let gemini_request = GeminiRequest {
            contents: build_contents(request.history),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(vec![ToolDeclarations {
                    function_declarations: request
                        .tools
                        .iter()
                        .map(|t| FunctionDeclaration {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        })
                        .collect(),
                }])
            },
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 8192,
                response_mime_type: None,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part::text(request.system_prompt)],
            },
        };

        info!("Calling Gemini API for agent turn");
        let response = self.send(&gemini_request).await?;
        let content = first_candidate_content(&response)?;

        // A functionCall part wins over any accompanying text; the text
        // becomes the visible thought for the transcript.
        let mut thought_parts: Vec<&str> = Vec::new();
        for part in &content.parts {
            if let Some(call) = &part.function_call {
                let thought = if thought_parts.is_empty() {
                    None
                } else {
                    Some(thought_parts.join("\n"))
                };
                debug!(tool = %call.name, "Gemini requested tool invocation");
                return Ok(AgentTurn::ToolRequest {
                    thought,
                    tool_name: call.name.clone(),
                    arguments: call.args.clone(),
                });
            }
            if let Some(text) = part.text.as_deref() {
                if !text.trim().is_empty() {
                    thought_parts.push(text);
                }
            }
        }

        let text = thought_parts.join("\n");
        if text.trim().is_empty() {
            return Ok(AgentTurn::Final {
                text: "Analysis could not be completed.".to_string(),
            });
        }
        Ok(AgentTurn::Final { text })
    }

    async fn route(&self, request: RouteRequest<'_>) -> Result<RawRouteDecision> {
        let mut contents = build_contents(request.history);
        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part::text(&format!(
                "Decide which specialist should act next.\n\
                 Choose \"next\" from exactly this set: {:?}\n\
                 Respond with a JSON object: {{\"next\": \"<option>\", \"rationale\": \"<why>\"}}",
                request.options
            ))],
        });

        let gemini_request = GeminiRequest {
            contents,
            tools: None,
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 512,
                response_mime_type: Some("application/json".to_string()),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part::text(request.system_prompt)],
            },
        };

        info!("Calling Gemini API for routing decision");
        let response = self.send(&gemini_request).await?;
        let content = first_candidate_content(&response)?;

        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        parse_route_decision(&text)
    }
}

/// Map the role-tagged message log onto Gemini chat contents.
/// Tool interactions are rendered as labelled text turns so the full audit
/// trail stays visible to the model.
fn build_contents(history: &[MessageEntry]) -> Vec<Content> {
    history
        .iter()
        .map(|entry| match entry.role {
            MessageRole::User => Content {
                role: "user".to_string(),
                parts: vec![Part::text(&entry.content)],
            },
            MessageRole::AgentThought => Content {
                role: "model".to_string(),
                parts: vec![Part::text(&entry.content)],
            },
            MessageRole::ToolCall => Content {
                role: "model".to_string(),
                parts: vec![Part::text(&format!(
                    "Requested tool `{}` with arguments: {}",
                    entry.tool.as_deref().unwrap_or("unknown"),
                    entry.content
                ))],
            },
            MessageRole::ToolResult => Content {
                role: "user".to_string(),
                parts: vec![Part::text(&format!(
                    "OBSERVATION from `{}`:\n{}",
                    entry.tool.as_deref().unwrap_or("unknown"),
                    entry.content
                ))],
            },
            MessageRole::AgentSummary => Content {
                role: "model".to_string(),
                parts: vec![Part::text(&format!(
                    "[{}]\n\n{}",
                    entry
                        .agent
                        .map(|r| r.ident().to_uppercase())
                        .unwrap_or_default(),
                    entry.content
                ))],
            },
        })
        .collect()
}

fn first_candidate_content(response: &GeminiResponse) -> Result<&Content> {
    response
        .candidates
        .first()
        .map(|c| &c.content)
        .ok_or_else(|| {
            OrchestrationError::BackendUnavailable("No response from Gemini API".to_string())
        })
}

/// Parse the constrained routing reply, tolerating markdown fences.
fn parse_route_decision(raw: &str) -> Result<RawRouteDecision> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str::<RawRouteDecision>(cleaned).map_err(|e| {
        OrchestrationError::InvalidDecision(format!(
            "Failed to parse routing decision: {} | raw={}",
            e, raw
        ))
    })
}

//
// ================= Wire types =================
//

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclarations>>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

impl Part {
    fn text(value: &str) -> Self {
        Self {
            text: Some(value.to_string()),
            function_call: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::text("Assess risk for Company X")],
            }],
            tools: None,
            generation_config: GenerationConfig {
                temperature: 0.1,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 8192,
                response_mime_type: None,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part::text("You are a credit risk analyst")],
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Assess risk for Company X"));
        assert!(!json.contains("tools"));
    }

    #[test]
    fn test_function_call_response_parsing() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "I need current market data."},
                        {"functionCall": {"name": "get_market_data", "args": {"ticker": "ACME"}}}
                    ]
                }
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        let part = &response.candidates[0].content.parts[1];
        let call = part.function_call.as_ref().unwrap();
        assert_eq!(call.name, "get_market_data");
        assert_eq!(call.args["ticker"], "ACME");
    }

    #[test]
    fn test_parse_route_decision_with_fences() {
        let raw = "```json\n{\"next\": \"credit_evaluator\", \"rationale\": \"credit next\"}\n```";
        let decision = parse_route_decision(raw).unwrap();
        assert_eq!(decision.next, "credit_evaluator");
        assert_eq!(decision.rationale, "credit next");
    }

    #[test]
    fn test_parse_route_decision_rejects_free_text() {
        assert!(parse_route_decision("let's do credit next").is_err());
    }
}
