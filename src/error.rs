//! Error types for the finance assistant orchestrator

use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Workflow Errors
    // =============================

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("State conflict: {0}")]
    StateConflict(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("Oracle call timed out after {0:?}")]
    OracleTimeout(Duration),

    /// Never leaves the dispatcher; resolved to the fallback answer there.
    #[error("Dispatch error: {0}")]
    DispatchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Graph wiring problems. All but `UnmappedRouteKey` are reported by
/// `StateGraph::compile`; that one can also surface while running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{0}' registered twice")]
    DuplicateNode(String),

    #[error("edge references undeclared node '{0}'")]
    UnknownNode(String),

    #[error("no entry point set")]
    MissingEntryPoint,

    #[error("multiple entry points set: {0:?}")]
    MultipleEntryPoints(Vec<String>),

    #[error("node '{0}' has more than one outgoing transition")]
    AmbiguousEdges(String),

    #[error("node '{0}' is not reachable from the entry point")]
    UnreachableNode(String),

    #[error("decision from '{from}' returned '{key}', which has no mapped target")]
    UnmappedRouteKey { from: String, key: String },
}
