//! Postgres-backed checkpoint store
//!
//! Durable at-least-once writes with last-write-wins upsert semantics.
//! The pool connects lazily; the schema is bootstrapped on first use.

use super::{CheckpointRecord, CheckpointStore};
use crate::error::OrchestrationError;
use crate::Result;
use sqlx::{PgPool, Row};
use std::env;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

pub struct PostgresCheckpointStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Build a store from `POSTGRES_URL` / `DATABASE_URL`, if configured.
    pub fn from_env() -> Option<Self> {
        let database_url = env::var("POSTGRES_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()?;

        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&database_url)
        {
            Ok(pool) => {
                info!("Checkpoint store backend: postgres");
                Some(Self::new(pool))
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres checkpoint store: {}",
                    error
                );
                None
            }
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS session_checkpoints (
                      session_id UUID PRIMARY KEY,
                      version INTEGER NOT NULL,
                      state TEXT NOT NULL,
                      state_hash TEXT NOT NULL,
                      saved_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                OrchestrationError::Database(format!(
                    "Failed to initialize checkpoint schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn save(&self, record: CheckpointRecord) -> Result<()> {
        self.ensure_schema().await?;

        let state_json = serde_json::to_string(&record.state)?;

        sqlx::query(
            r#"
            INSERT INTO session_checkpoints (session_id, version, state, state_hash, saved_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (session_id) DO UPDATE
            SET version = EXCLUDED.version,
                state = EXCLUDED.state,
                state_hash = EXCLUDED.state_hash,
                saved_at = EXCLUDED.saved_at
            "#,
        )
        .bind(record.session_id)
        .bind(i32::from(record.version))
        .bind(state_json)
        .bind(&record.state_hash)
        .bind(record.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::Database(format!("Failed to save checkpoint: {}", e))
        })?;

        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<CheckpointRecord>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT version, state, state_hash, saved_at
            FROM session_checkpoints
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::Database(format!("Failed to load checkpoint: {}", e))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let version: i32 = row.try_get("version").map_err(|e| {
            OrchestrationError::Database(format!("Malformed checkpoint row: {}", e))
        })?;
        let state_json: String = row.try_get("state").map_err(|e| {
            OrchestrationError::Database(format!("Malformed checkpoint row: {}", e))
        })?;
        let state_hash: String = row.try_get("state_hash").map_err(|e| {
            OrchestrationError::Database(format!("Malformed checkpoint row: {}", e))
        })?;
        let saved_at = row.try_get("saved_at").map_err(|e| {
            OrchestrationError::Database(format!("Malformed checkpoint row: {}", e))
        })?;

        Ok(Some(CheckpointRecord {
            version: version.clamp(0, u16::MAX as i32) as u16,
            session_id,
            state: serde_json::from_str(&state_json)?,
            state_hash,
            saved_at,
        }))
    }
}
