//! Runtime configuration
//!
//! Budgets, timeouts, and credentials, loaded from the environment with
//! conservative defaults. Binaries call `dotenv` before `from_env`.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Hard bound on total agent invocations per session.
    pub global_step_budget: u32,
    /// Global clamp on the per-role ReAct iteration caps.
    pub max_agent_iterations: u32,
    /// How often the supervisor may re-route to the same role.
    pub max_role_invocations: u32,
    /// Individual timeout for each reasoning-backend call.
    pub backend_timeout: Duration,
    /// Retry attempts for rate-limited backend calls.
    pub backend_max_retries: u32,
    pub gemini_api_key: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            global_step_budget: 10,
            max_agent_iterations: 6,
            max_role_invocations: 2,
            backend_timeout: Duration::from_secs(60),
            backend_max_retries: 5,
            gemini_api_key: String::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            global_step_budget: env_u32("GLOBAL_STEP_BUDGET", defaults.global_step_budget),
            max_agent_iterations: env_u32("MAX_AGENT_ITERATIONS", defaults.max_agent_iterations),
            max_role_invocations: env_u32("MAX_ROLE_INVOCATIONS", defaults.max_role_invocations),
            backend_timeout: Duration::from_secs(u64::from(env_u32(
                "BACKEND_TIMEOUT_SECS",
                defaults.backend_timeout.as_secs() as u32,
            ))),
            backend_max_retries: env_u32("BACKEND_MAX_RETRIES", defaults.backend_max_retries),
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
        }
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
