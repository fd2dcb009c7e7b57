use thiserror::Error;

/// Errors that end a search.
///
/// Per-rollout failures (generation, execution, reflection) are absorbed by
/// the engine and never surface here.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("tree invariant violated: {0}")]
    InvariantViolation(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("search exhausted: no node besides the root was evaluated successfully")]
    SearchExhausted,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors raised by a tree store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("no persisted tree for run {0:?}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt tree snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Written by an incompatible version of this crate.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The snapshot parsed but does not describe a valid tree.
    #[error("malformed tree snapshot: {0}")]
    Invariant(String),
}

impl PersistenceError {
    /// Whether a resume should abort instead of starting from a fresh root.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PersistenceError::Invariant(_))
    }
}

/// Convenience Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;
