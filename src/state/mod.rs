//! Shared session state
//!
//! The single mutable record threaded through every orchestration step.
//! Append-oriented: the message log is never truncated or reordered, and
//! terminal statuses are sticky.

use crate::models::{
    AgentFinding, MessageEntry, RouteDecision, RoutingRecord, SessionStatus, SpecialistRole,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Session state for one risk assessment run.
///
/// Ownership contract: components receive the slice they need (read-only
/// history, append-only log); the orchestration graph is the sole writer
/// of `status` and the sole committer of checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    /// Original user request, immutable after creation.
    pub query: String,
    message_log: Vec<MessageEntry>,
    pub completed_roles: BTreeSet<SpecialistRole>,
    pub agent_outputs: BTreeMap<SpecialistRole, AgentFinding>,
    pub routing_history: Vec<RoutingRecord>,
    /// Role selected by the last ROUTING transition and not yet completed.
    /// Persisted so a resumed session re-enters mid-EXECUTING.
    pub pending_role: Option<SpecialistRole>,
    /// Incremented exactly once per agent invocation; bounds total work.
    pub global_step_count: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            message_log: vec![MessageEntry::user(query.clone())],
            query,
            completed_roles: BTreeSet::new(),
            agent_outputs: BTreeMap::new(),
            routing_history: Vec::new(),
            pending_role: None,
            global_step_count: 0,
            status: SessionStatus::InProgress,
            created_at: now,
            updated_at: now,
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(crate::error::OrchestrationError::State(format!(
                "session {} is terminal ({})",
                self.session_id, self.status
            )));
        }
        Ok(())
    }

    /// Append-only access to the conversational audit trail.
    pub fn message_log(&self) -> &[MessageEntry] {
        &self.message_log
    }

    pub fn append_entry(&mut self, entry: MessageEntry) -> Result<()> {
        self.ensure_mutable()?;
        self.message_log.push(entry);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a supervisor decision in the routing audit trail.
    pub fn record_routing(&mut self, record: RoutingRecord) -> Result<()> {
        self.ensure_mutable()?;
        if let RouteDecision::Run(role) = record.decision {
            self.pending_role = Some(role);
        }
        self.routing_history.push(record);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the start of an agent invocation. Returns the new step index.
    pub fn begin_invocation(&mut self, role: SpecialistRole) -> Result<u32> {
        self.ensure_mutable()?;
        if self.pending_role != Some(role) {
            return Err(crate::error::OrchestrationError::State(format!(
                "invocation of {} without a matching routing decision",
                role
            )));
        }
        self.global_step_count += 1;
        self.updated_at = Utc::now();
        Ok(self.global_step_count)
    }

    /// Record the finalized finding for the pending role and release it.
    pub fn complete_invocation(&mut self, finding: AgentFinding) -> Result<()> {
        self.ensure_mutable()?;
        let role = finding.role;
        self.message_log
            .push(MessageEntry::summary(role, finding.analysis.clone()));
        self.agent_outputs.insert(role, finding);
        self.completed_roles.insert(role);
        self.pending_role = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Terminal transition. `InProgress` is the only state this can leave;
    /// once terminal, the session refuses all further mutation.
    pub fn set_status(&mut self, status: SessionStatus) -> Result<()> {
        self.ensure_mutable()?;
        if status == SessionStatus::InProgress {
            return Err(crate::error::OrchestrationError::State(
                "cannot transition back to in_progress".to_string(),
            ));
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Number of times the supervisor has routed to `role`.
    pub fn invocation_count(&self, role: SpecialistRole) -> u32 {
        self.routing_history
            .iter()
            .filter(|r| r.decision == RouteDecision::Run(role))
            .count() as u32
    }

    /// True when another specialist has run since `role` last completed,
    /// i.e. re-invoking `role` would see new information.
    pub fn has_new_information_for(&self, role: SpecialistRole) -> bool {
        let last_selected = self
            .routing_history
            .iter()
            .rposition(|r| r.decision == RouteDecision::Run(role));

        match last_selected {
            None => true,
            Some(idx) => self.routing_history[idx + 1..]
                .iter()
                .any(|r| matches!(r.decision, RouteDecision::Run(other) if other != role)),
        }
    }

    /// A finding that makes further analysis meaningless, if any role
    /// reported one.
    pub fn fatal_finding(&self) -> Option<&AgentFinding> {
        self.agent_outputs.values().find(|f| f.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteDecision;

    fn run_record(role: SpecialistRole, step: u32) -> RoutingRecord {
        RoutingRecord::new(RouteDecision::Run(role), "test", step)
    }

    #[test]
    fn test_new_session_seeds_message_log() {
        let state = SessionState::new("Assess risk for Company X");
        assert_eq!(state.message_log().len(), 1);
        assert_eq!(state.status, SessionStatus::InProgress);
        assert_eq!(state.global_step_count, 0);
        assert!(state.pending_role.is_none());
    }

    #[test]
    fn test_step_count_increments_once_per_invocation() {
        let mut state = SessionState::new("q");
        state
            .record_routing(run_record(SpecialistRole::Geopolitical, 0))
            .unwrap();
        assert_eq!(state.begin_invocation(SpecialistRole::Geopolitical).unwrap(), 1);
        state
            .complete_invocation(AgentFinding::from_analysis(
                SpecialistRole::Geopolitical,
                "findings",
                false,
            ))
            .unwrap();

        state
            .record_routing(run_record(SpecialistRole::Credit, 1))
            .unwrap();
        assert_eq!(state.begin_invocation(SpecialistRole::Credit).unwrap(), 2);
        assert_eq!(state.global_step_count, 2);
    }

    #[test]
    fn test_invocation_requires_routing_decision() {
        let mut state = SessionState::new("q");
        assert!(state.begin_invocation(SpecialistRole::Credit).is_err());
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut state = SessionState::new("q");
        state.set_status(SessionStatus::Complete).unwrap();

        assert!(state.set_status(SessionStatus::Failed).is_err());
        assert!(state
            .append_entry(MessageEntry::user("late entry"))
            .is_err());
        assert!(state
            .record_routing(run_record(SpecialistRole::Credit, 0))
            .is_err());
        assert_eq!(state.status, SessionStatus::Complete);
    }

    #[test]
    fn test_completion_populates_outputs_and_log() {
        let mut state = SessionState::new("q");
        state
            .record_routing(run_record(SpecialistRole::Geopolitical, 0))
            .unwrap();
        state.begin_invocation(SpecialistRole::Geopolitical).unwrap();
        state
            .complete_invocation(AgentFinding::from_analysis(
                SpecialistRole::Geopolitical,
                "Risk Level: HIGH",
                false,
            ))
            .unwrap();

        assert!(state.completed_roles.contains(&SpecialistRole::Geopolitical));
        assert!(state.pending_role.is_none());
        let finding = &state.agent_outputs[&SpecialistRole::Geopolitical];
        assert_eq!(finding.risk_level, Some(crate::models::RiskLevel::High));
        // summary entry appended after the seed user entry
        assert_eq!(state.message_log().len(), 2);
    }

    #[test]
    fn test_new_information_tracking() {
        let mut state = SessionState::new("q");
        state
            .record_routing(run_record(SpecialistRole::Geopolitical, 0))
            .unwrap();
        // nothing ran after geopolitical — re-selecting it sees nothing new
        assert!(!state.has_new_information_for(SpecialistRole::Geopolitical));

        state
            .record_routing(run_record(SpecialistRole::Credit, 1))
            .unwrap();
        assert!(state.has_new_information_for(SpecialistRole::Geopolitical));
        assert!(!state.has_new_information_for(SpecialistRole::Credit));
    }
}
