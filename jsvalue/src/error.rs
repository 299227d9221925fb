use crate::{CallShape, Tag};

/// Failures of the value layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Tag, found: Tag },
    #[error("invalid tag code {0}")]
    InvalidTag(u8),
    #[error("word {0:#018x} is not a valid encoding")]
    MalformedWord(u64),
    #[error("handle {0} is not registered in this handle table")]
    StaleHandle(u32),
    #[error("handle table is full")]
    PayloadOverflow,
}

/// Failures surfaced by an activation to the compiled-code layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("ReferenceError: '{name}' is not defined")]
    UnresolvedReference { name: String },
    #[error("scope chain exceeds the limit of {limit} entries")]
    ScopeDepthExceeded { limit: usize },
    #[error("function '{function}' has no {expected:?} entry point")]
    ShapeMismatch {
        function: String,
        expected: CallShape,
    },
    #[error("value of kind {0} is not callable")]
    NotCallable(Tag),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("{message}")]
    Host { message: String },
}

impl ExecutionError {
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }
}
