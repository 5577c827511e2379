use thiserror::Error;

/// Unified error type for WorldRAG pipeline operations.
#[derive(Debug, Error)]
pub enum WorldRagError {
    /// Graph-store operation failed (connection, query, MERGE/CREATE).
    #[error("Graph error: {0}")]
    Graph(String),

    /// Requested entity was not found.
    #[error("Not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },

    /// Input validation failed. Carries every collected violation.
    #[error("Validation error: {0:?}")]
    Validation(Vec<String>),

    /// Status precondition violated (e.g. extract requested before ingest).
    #[error("Status conflict: expected one of {expected:?}, got '{actual}'")]
    StatusConflict { expected: Vec<String>, actual: String },

    /// Transient upstream failure (LLM timeout/connection, graph transient error).
    /// Callers retry this via [`crate::resilience::retry`].
    #[error("Transient error: {0}")]
    Transient(String),

    /// The circuit breaker for a provider is open; the call was rejected without
    /// invoking the wrapped function.
    #[error("Circuit open for provider '{provider}'")]
    CircuitOpen { provider: String },

    /// A cost ceiling was reached before the call was made.
    #[error("Cost ceiling exceeded for book '{book_id}' chapter {chapter:?}")]
    CostCeilingExceeded {
        book_id: String,
        chapter: Option<i64>,
    },

    /// The configured LLM client failed in a way that isn't a timeout/connection
    /// error (bad response shape, provider-side rejection, etc).
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding or reranker model failed to load or run.
    #[error("Embedding error: {0}")]
    Embedding(String),
}

impl From<surrealdb::Error> for WorldRagError {
    fn from(err: surrealdb::Error) -> Self {
        WorldRagError::Graph(err.to_string())
    }
}

impl From<serde_json::Error> for WorldRagError {
    fn from(err: serde_json::Error) -> Self {
        WorldRagError::Graph(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for WorldRagError {
    fn from(err: std::io::Error) -> Self {
        WorldRagError::Config(format!("I/O error: {}", err))
    }
}
