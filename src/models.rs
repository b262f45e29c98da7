//! Core data models for the risk assessment orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Roles =================
//

/// The fixed roster of specialist analysts the supervisor can route to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecialistRole {
    #[serde(rename = "geopolitical_analyst")]
    Geopolitical,
    #[serde(rename = "credit_evaluator")]
    Credit,
    #[serde(rename = "market_synthesizer")]
    Synthesis,
}

impl SpecialistRole {
    /// Roster in the recommended pipeline order.
    pub const ALL: [SpecialistRole; 3] = [
        SpecialistRole::Geopolitical,
        SpecialistRole::Credit,
        SpecialistRole::Synthesis,
    ];

    /// Stable wire identifier, used in prompts and routing decisions.
    pub fn ident(&self) -> &'static str {
        match self {
            SpecialistRole::Geopolitical => "geopolitical_analyst",
            SpecialistRole::Credit => "credit_evaluator",
            SpecialistRole::Synthesis => "market_synthesizer",
        }
    }

    /// Decode a wire identifier back into the closed role set.
    pub fn parse(value: &str) -> Option<SpecialistRole> {
        match value.trim() {
            "geopolitical_analyst" => Some(SpecialistRole::Geopolitical),
            "credit_evaluator" => Some(SpecialistRole::Credit),
            "market_synthesizer" => Some(SpecialistRole::Synthesis),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ident())
    }
}

//
// ================= Routing =================
//

/// A validated supervisor decision: run one more specialist, or stop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RouteDecision {
    Run(SpecialistRole),
    Terminate,
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDecision::Run(role) => write!(f, "{}", role),
            RouteDecision::Terminate => write!(f, "TERMINATE"),
        }
    }
}

/// The backend's raw structured routing output, before validation against
/// the closed role set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRouteDecision {
    pub next: String,
    #[serde(default)]
    pub rationale: String,
}

/// One entry of the supervisor audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRecord {
    pub decision: RouteDecision,
    pub rationale: String,
    /// Value of `global_step_count` at decision time.
    pub step_index: u32,
    pub decided_at: DateTime<Utc>,
}

impl RoutingRecord {
    pub fn new(decision: RouteDecision, rationale: impl Into<String>, step_index: u32) -> Self {
        Self {
            decision,
            rationale: rationale.into(),
            step_index,
            decided_at: Utc::now(),
        }
    }
}

//
// ================= Message Log =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    AgentThought,
    ToolCall,
    ToolResult,
    AgentSummary,
}

/// A single role-tagged entry of the append-only message log.
///
/// The log doubles as LLM context and audit trail; it is never truncated
/// or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    pub entry_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    /// Specialist that produced the entry, if any.
    pub agent: Option<SpecialistRole>,
    /// Tool involved, for `ToolCall` / `ToolResult` entries.
    pub tool: Option<String>,
    pub content: String,
}

impl MessageEntry {
    fn new(
        role: MessageRole,
        agent: Option<SpecialistRole>,
        tool: Option<String>,
        content: String,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            agent,
            tool,
            content,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, None, None, content.into())
    }

    pub fn thought(agent: SpecialistRole, content: impl Into<String>) -> Self {
        Self::new(MessageRole::AgentThought, Some(agent), None, content.into())
    }

    pub fn tool_call(agent: SpecialistRole, tool: &str, arguments: &serde_json::Value) -> Self {
        Self::new(
            MessageRole::ToolCall,
            Some(agent),
            Some(tool.to_string()),
            arguments.to_string(),
        )
    }

    pub fn tool_result(agent: SpecialistRole, tool: &str, content: impl Into<String>) -> Self {
        Self::new(
            MessageRole::ToolResult,
            Some(agent),
            Some(tool.to_string()),
            content.into(),
        )
    }

    pub fn summary(agent: SpecialistRole, content: impl Into<String>) -> Self {
        Self::new(MessageRole::AgentSummary, Some(agent), None, content.into())
    }
}

//
// ================= Findings =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn parse(value: &str) -> Option<RiskLevel> {
        match value.trim().to_uppercase().as_str() {
            "LOW" => Some(RiskLevel::Low),
            "MODERATE" | "MEDIUM" => Some(RiskLevel::Moderate),
            "HIGH" => Some(RiskLevel::High),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// Finalized output of one specialist pass: free-form analysis text plus
/// whatever structured scores could be extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFinding {
    pub role: SpecialistRole,
    pub analysis: String,
    /// Overall 0-100 risk score, when the analysis states one.
    pub risk_score: Option<u8>,
    pub risk_level: Option<RiskLevel>,
    /// True when the finding was force-finalized at the iteration cap
    /// rather than signalled by the model.
    pub forced: bool,
    pub completed_at: DateTime<Utc>,
}

impl AgentFinding {
    pub fn from_analysis(role: SpecialistRole, analysis: impl Into<String>, forced: bool) -> Self {
        let analysis = analysis.into();
        Self {
            role,
            risk_score: extract_risk_score(&analysis),
            risk_level: extract_risk_level(&analysis),
            analysis,
            forced,
            completed_at: Utc::now(),
        }
    }

    /// A fatal finding makes further analysis meaningless and forces the
    /// supervisor to terminate (e.g. the entity under analysis does not
    /// exist).
    pub fn is_fatal(&self) -> bool {
        const FATAL_MARKERS: &[&str] = &[
            "subject not found",
            "entity not found",
            "company not found",
            "no such entity",
        ];
        let lowered = self.analysis.to_lowercase();
        FATAL_MARKERS.iter().any(|m| lowered.contains(m))
    }
}

/// Scan the analysis text for an overall risk score of the form
/// `... RISK SCORE: 72/100`.
pub fn extract_risk_score(text: &str) -> Option<u8> {
    for line in text.lines() {
        let upper = line.to_uppercase();
        let Some(idx) = upper.find("RISK SCORE") else {
            continue;
        };
        let tail = &upper[idx..];
        let digits: String = tail
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(score) = digits.parse::<u16>() {
            if score <= 100 {
                return Some(score as u8);
            }
        }
    }
    None
}

/// Scan the analysis text for a `Risk Level: HIGH`-style declaration.
pub fn extract_risk_level(text: &str) -> Option<RiskLevel> {
    for line in text.lines() {
        let upper = line.to_uppercase();
        if let Some(idx) = upper.find("RISK LEVEL") {
            let tail = &upper[idx + "RISK LEVEL".len()..];
            let value = tail.trim_start_matches(&[':', '*', ' '][..]);
            let word: String = value
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .collect();
            if let Some(level) = RiskLevel::parse(&word) {
                return Some(level);
            }
        }
    }
    None
}

//
// ================= Session Status =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Complete,
    Failed,
    AbortedLimit,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
            SessionStatus::AbortedLimit => "aborted_limit",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub data: serde_json::Value,
}

/// Kind tag for observations recorded in the ReAct scratch buffer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationKind {
    ToolSuccess,
    ToolError,
    ValidationError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub kind: ObservationKind,
    pub tool_name: String,
    pub content: String,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(kind: ObservationKind, tool_name: &str, content: impl Into<String>) -> Self {
        Self {
            kind,
            tool_name: tool_name.to_string(),
            content: content.into(),
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ident_round_trip() {
        for role in SpecialistRole::ALL {
            assert_eq!(SpecialistRole::parse(role.ident()), Some(role));
        }
        assert_eq!(SpecialistRole::parse("portfolio_wizard"), None);
    }

    #[test]
    fn test_extract_risk_score() {
        let report = "ENTITY: Acme Corp\nOVERALL RISK SCORE: 72/100\nDATE: 2026-08-07";
        assert_eq!(extract_risk_score(report), Some(72));
        assert_eq!(extract_risk_score("no score here"), None);
        assert_eq!(extract_risk_score("RISK SCORE: 250/100"), None);
    }

    #[test]
    fn test_extract_risk_level() {
        assert_eq!(
            extract_risk_level("- **Risk Level**: HIGH\nmore text"),
            Some(RiskLevel::High)
        );
        assert_eq!(extract_risk_level("Risk Level: medium"), Some(RiskLevel::Moderate));
        assert_eq!(extract_risk_level("nothing declared"), None);
    }

    #[test]
    fn test_fatal_finding_detection() {
        let fatal = AgentFinding::from_analysis(
            SpecialistRole::Credit,
            "Subject not found in any market data source.",
            false,
        );
        assert!(fatal.is_fatal());

        let ok = AgentFinding::from_analysis(
            SpecialistRole::Credit,
            "Leverage is elevated but serviceable.",
            false,
        );
        assert!(!ok.is_fatal());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!SessionStatus::InProgress.is_terminal());
        assert!(SessionStatus::Complete.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::AbortedLimit.is_terminal());
    }
}
