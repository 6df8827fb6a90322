//! Error types for the question answering system.

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while indexing, retrieving or answering.
#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid argument provided (empty question, malformed date).
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A retrieval engine could not be opened or reached.
    #[error("{engine} engine unavailable: {message}")]
    EngineUnavailable { engine: String, message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Embedding backend error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Generative model error.
    #[error("Generation error: {message}")]
    Generation { message: String },

    /// Chunking error.
    #[error("Chunking error: {message}")]
    Chunking { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an engine-unavailable error for the named engine.
    pub fn engine_unavailable(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a chunking error.
    pub fn chunking(message: impl Into<String>) -> Self {
        Self::Chunking {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller supplied bad input, as opposed to a backend failure.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Get the stable error code reported to callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::EngineUnavailable { .. } => "ENGINE_UNAVAILABLE",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Generation { .. } => "GENERATION_ERROR",
            Self::Chunking { .. } => "CHUNKING_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::engine_unavailable("keyword", "no such table: chunks_fts");
        let text = err.to_string();
        assert!(text.starts_with("keyword engine unavailable"));
        assert!(text.contains("chunks_fts"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RagError::invalid_argument("bad date").error_code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(RagError::database("test").error_code(), "DATABASE_ERROR");
        assert_eq!(
            RagError::generation("timeout").error_code(),
            "GENERATION_ERROR"
        );
    }

    #[test]
    fn test_input_error_classification() {
        assert!(RagError::invalid_argument("empty question").is_input_error());
        assert!(!RagError::engine_unavailable("semantic", "down").is_input_error());
    }
}
