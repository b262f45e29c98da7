//! Checkpoint persistence
//!
//! A checkpoint is a durable, versioned snapshot of session state taken
//! after every orchestration transition. The graph exclusively writes
//! checkpoints; the resume path only reads the latest record for a key.
//! Last write wins per session key.

use crate::state::SessionState;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod postgres;
pub use postgres::PostgresCheckpointStore;

/// Bump when the serialized shape of [`SessionState`] changes.
pub const CHECKPOINT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub version: u16,
    pub session_id: Uuid,
    pub state: SessionState,
    /// SHA-256 over the serialized state, for integrity verification.
    pub state_hash: String,
    pub saved_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn snapshot(state: &SessionState) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            session_id: state.session_id,
            state_hash: compute_state_hash(state),
            state: state.clone(),
            saved_at: Utc::now(),
        }
    }

    pub fn verify_integrity(&self) -> bool {
        self.version == CHECKPOINT_VERSION && compute_state_hash(&self.state) == self.state_hash
    }
}

/// Compute SHA256 hash of a session snapshot.
/// Uses zero-copy streaming serialization into the hasher.
pub fn compute_state_hash(state: &SessionState) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), state).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Trait for checkpoint persistence
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, record: CheckpointRecord) -> Result<()>;
    async fn load(&self, session_id: Uuid) -> Result<Option<CheckpointRecord>>;
}

/// In-memory checkpoint store for development and tests
pub struct InMemoryCheckpointStore {
    records: Arc<RwLock<HashMap<Uuid, CheckpointRecord>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, record: CheckpointRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.session_id, record);
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<CheckpointRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&session_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentFinding, RouteDecision, RoutingRecord, SessionStatus, SpecialistRole};

    fn populated_state() -> SessionState {
        let mut state = SessionState::new("Assess risk for Company X");
        state
            .record_routing(RoutingRecord::new(
                RouteDecision::Run(SpecialistRole::Geopolitical),
                "establish the macro picture first",
                0,
            ))
            .unwrap();
        state.begin_invocation(SpecialistRole::Geopolitical).unwrap();
        state
            .complete_invocation(AgentFinding::from_analysis(
                SpecialistRole::Geopolitical,
                "Risk Level: MODERATE\nExposure concentrated in one region.",
                false,
            ))
            .unwrap();
        state
    }

    #[test]
    fn test_checkpoint_round_trip_preserves_state() {
        tokio_test::block_on(async {
            let store = InMemoryCheckpointStore::new();
            let state = populated_state();
            let session_id = state.session_id;

            store.save(CheckpointRecord::snapshot(&state)).await.unwrap();
            let loaded = store.load(session_id).await.unwrap().unwrap();

            assert!(loaded.verify_integrity());
            assert_eq!(loaded.state.message_log().len(), state.message_log().len());
            assert_eq!(
                loaded.state.agent_outputs[&SpecialistRole::Geopolitical].analysis,
                state.agent_outputs[&SpecialistRole::Geopolitical].analysis
            );
            assert_eq!(loaded.state.status, state.status);
            assert_eq!(loaded.state.global_step_count, state.global_step_count);
        });
    }

    #[test]
    fn test_last_write_wins() {
        tokio_test::block_on(async {
            let store = InMemoryCheckpointStore::new();
            let mut state = populated_state();
            let session_id = state.session_id;

            store.save(CheckpointRecord::snapshot(&state)).await.unwrap();
            state.set_status(SessionStatus::Complete).unwrap();
            store.save(CheckpointRecord::snapshot(&state)).await.unwrap();

            let loaded = store.load(session_id).await.unwrap().unwrap();
            assert_eq!(loaded.state.status, SessionStatus::Complete);
        });
    }

    #[test]
    fn test_tampered_snapshot_fails_integrity() {
        let state = populated_state();
        let mut record = CheckpointRecord::snapshot(&state);
        record.state_hash = "deadbeef".to_string();
        assert!(!record.verify_integrity());
    }

    #[test]
    fn test_unknown_session_loads_nothing() {
        tokio_test::block_on(async {
            let store = InMemoryCheckpointStore::new();
            assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
        });
    }
}
