//! Risk Agent Orchestrator
//!
//! A multi-agent risk assessment engine that:
//! - Routes work between specialist analysts via a supervisor decision
//! - Runs a bounded reason-act-observe cycle per agent against external tools
//! - Guarantees termination despite a non-deterministic decision-maker
//! - Checkpoints session state after every transition for idempotent resume
//! - Keeps an append-only, auditable message and routing trail
//!
//! CONTROL LOOP:
//! QUERY → ROUTE → EXECUTE(role) → ROUTE → … → TERMINATE

pub mod agents;
pub mod api;
pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod react;
pub mod report;
pub mod router;
pub mod state;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use config::RuntimeConfig;
pub use graph::OrchestrationGraph;
pub use models::*;
pub use state::SessionState;
