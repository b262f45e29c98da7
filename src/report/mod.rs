//! Report rendering
//!
//! Turns a terminal session state into the user-facing markdown risk
//! report. Plain data handoff: the orchestration core produced the
//! findings, this module only formats them.

use crate::models::{MessageRole, SessionStatus, SpecialistRole};
use crate::state::SessionState;
use serde_json::Value;

/// Render the final report for a terminal session.
pub fn render(state: &SessionState) -> String {
    let mut out = String::new();

    out.push_str("# Integrated Risk Assessment Report\n\n");
    out.push_str(&format!("**Session**: {}\n", state.session_id));
    out.push_str(&format!("**Status**: {}\n", state.status));
    out.push_str(&format!("**Query**: {}\n\n", state.query));

    if state.status == SessionStatus::Failed {
        out.push_str(
            "> This run failed before completion; the findings below are partial.\n\n",
        );
    } else if state.status == SessionStatus::AbortedLimit {
        out.push_str(
            "> This run stopped at its step budget; the findings below are partial.\n\n",
        );
    }

    // The synthesizer's integrated report, when present, is the headline.
    if let Some(synthesis) = state.agent_outputs.get(&SpecialistRole::Synthesis) {
        out.push_str("---\n\n");
        out.push_str(&synthesis.analysis);
        out.push_str("\n\n");
    }

    out.push_str("---\n\n## Specialist Findings\n\n");
    for role in SpecialistRole::ALL {
        let Some(finding) = state.agent_outputs.get(&role) else {
            continue;
        };
        if role == SpecialistRole::Synthesis {
            continue;
        }

        out.push_str(&format!("### {}\n\n", role.ident()));
        if let Some(score) = finding.risk_score {
            out.push_str(&format!("Risk score: {}/100\n\n", score));
        }
        if let Some(level) = finding.risk_level {
            out.push_str(&format!("Risk level: {}\n\n", level));
        }
        if finding.forced {
            out.push_str("_Finalized at the iteration limit (best-effort)._\n\n");
        }
        out.push_str(&finding.analysis);
        out.push_str("\n\n");
    }

    let sources = collect_sources(state);
    if !sources.is_empty() {
        out.push_str("---\n\n## Sources\n\n");
        for source in sources {
            out.push_str(&format!("- {}\n", source));
        }
    }

    out
}

/// Collect source attributions from tool results recorded in the log:
/// news articles, web results, retrieved documents, market snapshots.
fn collect_sources(state: &SessionState) -> Vec<String> {
    let mut sources = Vec::new();

    for entry in state.message_log() {
        if entry.role != MessageRole::ToolResult {
            continue;
        }
        let Ok(data) = serde_json::from_str::<Value>(&entry.content) else {
            continue;
        };

        if let Some(articles) = data.get("articles").and_then(Value::as_array) {
            for article in articles {
                let title = article.get("title").and_then(Value::as_str).unwrap_or("");
                let origin = article.get("source").and_then(Value::as_str).unwrap_or("");
                if !title.is_empty() {
                    push_unique(&mut sources, format!("{} ({})", title, origin));
                }
            }
        } else if let Some(results) = data.get("results").and_then(Value::as_array) {
            for result in results {
                let title = result.get("title").and_then(Value::as_str).unwrap_or("");
                if !title.is_empty() {
                    push_unique(&mut sources, format!("{} (web)", title));
                }
            }
        } else if let Some(documents) = data.get("documents").and_then(Value::as_array) {
            for doc in documents {
                let name = doc.get("source").and_then(Value::as_str).unwrap_or("");
                if !name.is_empty() {
                    push_unique(&mut sources, format!("{} (disclosure database)", name));
                }
            }
        } else if let Some(ticker) = data.get("ticker").and_then(Value::as_str) {
            push_unique(&mut sources, format!("{} (market data)", ticker));
        }
    }

    sources
}

fn push_unique(sources: &mut Vec<String>, source: String) {
    if !sources.contains(&source) {
        sources.push(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentFinding, MessageEntry, RouteDecision, RoutingRecord};

    fn state_with_findings() -> SessionState {
        let mut state = SessionState::new("Assess risk for Company X");
        for (role, analysis) in [
            (
                SpecialistRole::Geopolitical,
                "Risk Level: HIGH\nSupply chain concentration in one region.",
            ),
            (
                SpecialistRole::Synthesis,
                "ENTITY: Company X\nOVERALL RISK SCORE: 64/100\nElevated but manageable.",
            ),
        ] {
            state
                .record_routing(RoutingRecord::new(
                    RouteDecision::Run(role),
                    "test",
                    state.global_step_count,
                ))
                .unwrap();
            state.begin_invocation(role).unwrap();
            state
                .complete_invocation(AgentFinding::from_analysis(role, analysis, false))
                .unwrap();
        }
        state
    }

    #[test]
    fn test_render_leads_with_synthesis() {
        let mut state = state_with_findings();
        state.set_status(SessionStatus::Complete).unwrap();

        let report = render(&state);
        let synthesis_pos = report.find("OVERALL RISK SCORE").unwrap();
        let findings_pos = report.find("## Specialist Findings").unwrap();
        assert!(synthesis_pos < findings_pos);
        assert!(report.contains("Risk level: HIGH"));
    }

    #[test]
    fn test_render_flags_partial_runs() {
        let mut state = state_with_findings();
        state.set_status(SessionStatus::AbortedLimit).unwrap();
        let report = render(&state);
        assert!(report.contains("step budget"));
    }

    #[test]
    fn test_sources_deduplicated_from_tool_results() {
        let mut state = SessionState::new("q");
        let payload = r#"{"articles":[{"title":"Sanctions widen","source":"Newswire"}]}"#;
        state
            .append_entry(MessageEntry::tool_result(
                SpecialistRole::Geopolitical,
                "search_geopolitical_news",
                payload,
            ))
            .unwrap();
        state
            .append_entry(MessageEntry::tool_result(
                SpecialistRole::Geopolitical,
                "search_geopolitical_news",
                payload,
            ))
            .unwrap();

        let sources = collect_sources(&state);
        assert_eq!(sources, vec!["Sanctions widen (Newswire)".to_string()]);
    }
}
