//! Tool trait and registry
//!
//! The uniform capability interface specialists call into. Tools are thin
//! HTTP adapters over external providers (market data, search, document
//! retrieval); failures are typed so the ReAct loop can surface them as
//! observations instead of crashing the session.

use crate::backend::ToolSpec;
use crate::error::{OrchestrationError, ToolErrorKind};
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the accepted arguments, declared to the backend.
    fn parameters(&self) -> Value;
    async fn invoke(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and invoking tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Declarations for the subset of tools a role is allowed to use.
    pub fn specs_for(&self, allowed: &[&str]) -> Vec<ToolSpec> {
        allowed
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Provider plumbing =================
//

#[derive(Clone)]
struct ProviderClient {
    client: Client,
    base_url: String,
}

impl ProviderClient {
    fn from_env(var: &str) -> Option<Self> {
        let base_url = env::var(var).ok()?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    ToolErrorKind::Timeout
                } else {
                    ToolErrorKind::Unavailable
                };
                OrchestrationError::tool(kind, format!("request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        match status.as_u16() {
            404 => {
                return Err(OrchestrationError::tool(
                    ToolErrorKind::NotFound,
                    format!("provider returned 404 for {}", path),
                ))
            }
            429 => {
                return Err(OrchestrationError::tool(
                    ToolErrorKind::RateLimited,
                    format!("provider rate limit for {}", path),
                ))
            }
            _ => {}
        }

        if !status.is_success() {
            return Err(OrchestrationError::tool(
                ToolErrorKind::Unavailable,
                format!("provider returned {} for {}", status, path),
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            OrchestrationError::tool(
                ToolErrorKind::MalformedResponse,
                format!("invalid JSON response from {}: {}", path, e),
            )
        })
    }
}

fn require_api(api: &Option<ProviderClient>, var: &str) -> Result<ProviderClient> {
    api.clone().ok_or_else(|| {
        OrchestrationError::tool(
            ToolErrorKind::Unavailable,
            format!("{} is not configured", var),
        )
    })
}

fn require_str(input: &ToolInput, key: &str) -> Result<String> {
    input
        .arguments
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            OrchestrationError::Validation(format!(
                "{}: expected string argument '{}'",
                input.tool_name, key
            ))
        })
}

fn optional_u64(input: &ToolInput, key: &str, default: u64) -> u64 {
    input
        .arguments
        .get(key)
        .and_then(Value::as_u64)
        .unwrap_or(default)
}

//
// ================= Tools =================
//

/// Real-time market snapshot: price, ratios, credit signals, recent
/// history, fetched from the market-data provider service.
pub struct MarketDataTool {
    api: Option<ProviderClient>,
}

#[async_trait::async_trait]
impl Tool for MarketDataTool {
    fn name(&self) -> &'static str {
        "get_market_data"
    }

    fn description(&self) -> &'static str {
        "Fetch real-time market data, price history, and key financial ratios for a stock ticker"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {
                    "type": "string",
                    "description": "Stock ticker symbol, e.g. 'AAPL', 'MSFT', 'LVMH.PA'"
                },
                "period": {
                    "type": "string",
                    "description": "Historical price period: '1d','5d','1mo','3mo','6mo','1y'"
                },
                "include_financials": {
                    "type": "boolean",
                    "description": "Include balance-sheet ratios and credit signals"
                }
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, input: &ToolInput) -> Result<ToolOutput> {
        let api = require_api(&self.api, "MARKET_DATA_API_BASE_URL")?;
        let ticker = require_str(input, "ticker")?;

        let body = json!({
            "ticker": ticker,
            "period": input
                .arguments
                .get("period")
                .and_then(Value::as_str)
                .unwrap_or("1mo"),
            "include_financials": input
                .arguments
                .get("include_financials")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        });

        let data = api.post_json("/api/v1/market/snapshot", &body).await?;
        Ok(ToolOutput { data })
    }
}

/// Recent geopolitical and macro-economic news from the search provider.
pub struct GeopoliticalNewsTool {
    api: Option<ProviderClient>,
}

#[async_trait::async_trait]
impl Tool for GeopoliticalNewsTool {
    fn name(&self) -> &'static str {
        "search_geopolitical_news"
    }

    fn description(&self) -> &'static str {
        "Search for recent geopolitical and macro-economic news articles"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query, e.g. 'US China trade tensions tech sector'"
                },
                "region": {
                    "type": "string",
                    "description": "Region code ('wt-wt' = worldwide, 'us-en', 'fr-fr')"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of articles (1-15)"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: &ToolInput) -> Result<ToolOutput> {
        let api = require_api(&self.api, "SEARCH_API_BASE_URL")?;
        let query = require_str(input, "query")?;

        let body = json!({
            "query": query,
            "region": input
                .arguments
                .get("region")
                .and_then(Value::as_str)
                .unwrap_or("wt-wt"),
            "max_results": optional_u64(input, "max_results", 8).min(15),
        });

        let data = api.post_json("/api/v1/search/news", &body).await?;
        Ok(ToolOutput { data })
    }
}

/// General web search for background research and context.
pub struct WebSearchTool {
    api: Option<ProviderClient>,
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "search_web_general"
    }

    fn description(&self) -> &'static str {
        "Perform a general web search for background research and context"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query string" },
                "max_results": { "type": "integer", "description": "Maximum number of results" }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: &ToolInput) -> Result<ToolOutput> {
        let api = require_api(&self.api, "SEARCH_API_BASE_URL")?;
        let query = require_str(input, "query")?;

        let body = json!({
            "query": query,
            "max_results": optional_u64(input, "max_results", 5).min(10),
        });

        let data = api.post_json("/api/v1/search/web", &body).await?;
        Ok(ToolOutput { data })
    }
}

/// Semantic search over the corporate-disclosure document store
/// (annual reports, credit assessments, macro risk outlooks).
pub struct DisclosureSearchTool {
    api: Option<ProviderClient>,
}

#[async_trait::async_trait]
impl Tool for DisclosureSearchTool {
    fn name(&self) -> &'static str {
        "search_corporate_disclosures"
    }

    fn description(&self) -> &'static str {
        "Search the risk disclosure database for semantically relevant documents: \
         corporate filings plus broad macro-economic and geopolitical risk reports"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Semantic search query describing the information needed"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of relevant documents to retrieve (1-10)"
                },
                "company_filter": {
                    "type": "string",
                    "description": "Optional company name to prioritize, still including global outlooks"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: &ToolInput) -> Result<ToolOutput> {
        let api = require_api(&self.api, "RETRIEVAL_API_BASE_URL")?;
        let query = require_str(input, "query")?;

        let body = json!({
            "query": query,
            "num_results": optional_u64(input, "num_results", 5).min(10),
            "company_filter": input.arguments.get("company_filter").cloned().unwrap_or(Value::Null),
        });

        let data = api.post_json("/api/v1/retrieval/query", &body).await?;
        Ok(ToolOutput { data })
    }
}

/// Create the default registry with all provider-backed tools.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let market_api = ProviderClient::from_env("MARKET_DATA_API_BASE_URL");
    let search_api = ProviderClient::from_env("SEARCH_API_BASE_URL");
    let retrieval_api = ProviderClient::from_env("RETRIEVAL_API_BASE_URL");

    registry.register(Arc::new(MarketDataTool { api: market_api }));
    registry.register(Arc::new(GeopoliticalNewsTool {
        api: search_api.clone(),
    }));
    registry.register(Arc::new(WebSearchTool { api: search_api }));
    registry.register(Arc::new(DisclosureSearchTool { api: retrieval_api }));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_and_listing() {
        let registry = create_default_registry();
        assert!(registry.get("get_market_data").is_some());
        assert!(registry.get("search_corporate_disclosures").is_some());
        assert!(registry.get("launch_missiles").is_none());
        assert_eq!(registry.list().len(), 4);
    }

    #[test]
    fn test_specs_for_filters_by_allowed_set() {
        let registry = create_default_registry();
        let specs = registry.specs_for(&["get_market_data", "search_web_general", "nonexistent"]);
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"get_market_data"));
        assert!(names.contains(&"search_web_general"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_validation_error() {
        let tool = MarketDataTool {
            api: ProviderClient::from_env("MARKET_DATA_API_BASE_URL"),
        };
        let input = ToolInput {
            tool_name: "get_market_data".to_string(),
            arguments: serde_json::json!({ "period": "1mo" }),
        };
        // With no provider configured the error is Unavailable; with one
        // configured the missing ticker surfaces as Validation. Either way
        // the call must not panic and must return a recoverable error.
        let err = tool.invoke(&input).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::Tool { .. } | OrchestrationError::Validation(_)
        ));
    }
}
