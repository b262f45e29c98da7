//! Specialist agent definitions
//!
//! Each role is a configuration: a system prompt, an allowed tool set,
//! a sampling temperature, and a stop criterion (iteration cap). The
//! ReAct executor turns a role spec into a finding.

use crate::models::SpecialistRole;
use chrono::Utc;

pub mod prompts;

/// Configuration of one specialist persona.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub role: SpecialistRole,
    pub allowed_tools: &'static [&'static str],
    pub temperature: f32,
    pub max_iterations: u32,
}

const GEOPOLITICAL_TOOLS: &[&str] = &[
    "search_geopolitical_news",
    "search_web_general",
    "search_corporate_disclosures",
];

const CREDIT_TOOLS: &[&str] = &[
    "get_market_data",
    "search_corporate_disclosures",
    "search_web_general",
];

const SYNTHESIS_TOOLS: &[&str] = &["search_corporate_disclosures", "search_web_general"];

pub fn spec_for(role: SpecialistRole) -> RoleSpec {
    match role {
        SpecialistRole::Geopolitical => RoleSpec {
            role,
            allowed_tools: GEOPOLITICAL_TOOLS,
            temperature: 0.2,
            max_iterations: 6,
        },
        SpecialistRole::Credit => RoleSpec {
            role,
            allowed_tools: CREDIT_TOOLS,
            temperature: 0.1,
            max_iterations: 6,
        },
        // The synthesizer works from already-gathered findings and needs
        // fewer tool rounds.
        SpecialistRole::Synthesis => RoleSpec {
            role,
            allowed_tools: SYNTHESIS_TOOLS,
            temperature: 0.15,
            max_iterations: 4,
        },
    }
}

impl RoleSpec {
    /// System prompt for this persona. The synthesizer prompt embeds
    /// today's date so the report header is self-consistent.
    pub fn system_prompt(&self) -> String {
        match self.role {
            SpecialistRole::Geopolitical => prompts::GEOPOLITICAL_ANALYST_PROMPT.to_string(),
            SpecialistRole::Credit => prompts::CREDIT_RISK_EVALUATOR_PROMPT.to_string(),
            SpecialistRole::Synthesis => {
                let today = Utc::now().format("%Y-%m-%d").to_string();
                prompts::market_synthesizer_prompt(&today)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_a_spec() {
        for role in SpecialistRole::ALL {
            let spec = spec_for(role);
            assert_eq!(spec.role, role);
            assert!(!spec.allowed_tools.is_empty());
            assert!(spec.max_iterations > 0);
            assert!(!spec.system_prompt().is_empty());
        }
    }

    #[test]
    fn test_credit_evaluator_gets_market_data() {
        let spec = spec_for(SpecialistRole::Credit);
        assert!(spec.allowed_tools.contains(&"get_market_data"));
        // geopolitical analyst must not touch market data directly
        let geo = spec_for(SpecialistRole::Geopolitical);
        assert!(!geo.allowed_tools.contains(&"get_market_data"));
    }

    #[test]
    fn test_synthesizer_prompt_carries_today() {
        let spec = spec_for(SpecialistRole::Synthesis);
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        assert!(spec.system_prompt().contains(&today));
    }
}
