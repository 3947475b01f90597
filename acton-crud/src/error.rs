//! Error types for CRUD operations
//!
//! [`Error`] is the single error type surfaced by services, the query engine,
//! the bulk engine and the pipeline layers. Backend failures keep their
//! structured [`RepositoryError`] context.

use std::fmt;

use thiserror::Error;

use crate::repository::{RepositoryError, RepositoryErrorKind};

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Bulk operation being performed when a batch was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOperation {
    /// Inserting new entities
    Insert,
    /// Merging existing entities
    Update,
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "bulk_insert"),
            Self::Update => write!(f, "bulk_update"),
        }
    }
}

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// A filter references a field or operator the entity does not support
    #[error("Invalid filter field `{field}` on {entity}: {reason}")]
    InvalidFilterField {
        /// Entity the filter was built for
        entity: String,
        /// Offending field path
        field: String,
        /// Why the field was rejected
        reason: String,
    },

    /// Entity not found
    #[error("Not found: {entity} with id {id}")]
    NotFound {
        /// Entity type name
        entity: String,
        /// Requested identifier
        id: String,
    },

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A bulk call was aborted; nothing from the batch was committed
    #[error("{operation} aborted at item {index}: {source}")]
    BulkPersistence {
        /// The bulk operation that failed
        operation: BulkOperation,
        /// Zero-based position of the failing item, or the item count when
        /// the failure happened while flushing or committing
        index: usize,
        /// The backend failure
        #[source]
        source: RepositoryError,
    },

    /// Structured backend error
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Cache store error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid filter field error
    pub fn invalid_filter_field(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidFilterField {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Whether the error was caused by the caller's input
    ///
    /// Client errors are never worth retrying.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidFilterField { .. } | Self::NotFound { .. } | Self::BadRequest(_) => true,
            Self::Repository(e) => matches!(
                e.kind,
                RepositoryErrorKind::NotFound
                    | RepositoryErrorKind::AlreadyExists
                    | RepositoryErrorKind::ValidationFailed
            ),
            _ => false,
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Repository(e) => e.is_retriable(),
            Self::BulkPersistence { source, .. } => source.is_retriable(),
            _ => false,
        }
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> String {
        match self {
            Self::Config(_) => "CONFIG_ERROR".to_string(),
            Self::InvalidFilterField { .. } => "INVALID_FILTER_FIELD".to_string(),
            Self::NotFound { .. } => "NOT_FOUND".to_string(),
            Self::BadRequest(_) => "BAD_REQUEST".to_string(),
            Self::BulkPersistence { .. } => "BULK_PERSISTENCE_FAILURE".to_string(),
            Self::Repository(e) => format!("REPOSITORY_{}", e.kind.to_string().to_uppercase()),
            Self::Cache(_) => "CACHE_ERROR".to_string(),
            Self::Serialization(_) => "SERIALIZATION_ERROR".to_string(),
            Self::Internal(_) => "INTERNAL_ERROR".to_string(),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "cache")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Cache(err.to_string())
    }
}
