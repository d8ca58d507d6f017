//! Finance Assistant Orchestrator
//!
//! Routes a free-text request through a topic guardrail, an intent
//! classifier and then one downstream capability:
//! - Financial education Q&A
//! - Bank statement analysis (PDF attachment)
//! - Shopping advice
//!
//! FLOW:
//! QUESTION → GUARDRAIL → (STOP → FALLBACK) | (CONTINUE → INTENT → DISPATCH) → ANSWER

pub mod agent;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod models;
pub mod oracle;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::Orchestrator;
pub use config::OrchestratorConfig;
