//! Repository error types
//!
//! Structured errors reported by persistence backends. Every error names the
//! backend operation that failed so callers can tell a failed id query apart
//! from a failed flush.
//!
//! # Example
//!
//! ```rust
//! use acton_crud::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("company", "42");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.entity_id.is_some());
//! ```

use std::fmt;

/// Backend operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Finding a single entity by ID
    FindById,
    /// Resolving the ordered id page of a query
    FindIds,
    /// Eagerly fetching entities and their relationships by id
    FetchByIds,
    /// Single-phase paginated read
    FindPage,
    /// Counting entities matching a predicate
    Count,
    /// Checking if an entity exists
    Exists,
    /// Opening a unit of work
    Begin,
    /// Registering a new entity
    Insert,
    /// Merging the state of an existing entity
    Merge,
    /// Writing pending changes to the backend
    Flush,
    /// Detaching every entity tracked by a unit of work
    Clear,
    /// Committing a unit of work
    Commit,
    /// Deleting entities
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FindById => write!(f, "find_by_id"),
            Self::FindIds => write!(f, "find_ids"),
            Self::FetchByIds => write!(f, "fetch_by_ids"),
            Self::FindPage => write!(f, "find_page"),
            Self::Count => write!(f, "count"),
            Self::Exists => write!(f, "exists"),
            Self::Begin => write!(f, "begin"),
            Self::Insert => write!(f, "insert"),
            Self::Merge => write!(f, "merge"),
            Self::Flush => write!(f, "flush"),
            Self::Clear => write!(f, "clear"),
            Self::Commit => write!(f, "commit"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Entity was not found
    NotFound,
    /// Entity already exists (duplicate key)
    AlreadyExists,
    /// Database constraint violation
    ConstraintViolation,
    /// Validation failed before database operation
    ValidationFailed,
    /// Failed to connect to database
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Underlying database error
    DatabaseError,
    /// Serialization or deserialization error
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use acton_crud::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::already_exists("company", "7")
///     .with_operation(RepositoryOperation::Insert);
/// assert_eq!(
///     error.to_string(),
///     "Repository already_exists error during insert: Entity already exists [company: 7]"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::FindById,
            kind: RepositoryErrorKind::NotFound,
            message: "Entity not found".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id.into()),
        }
    }

    /// Create an "already exists" error with entity context
    pub fn already_exists(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::Insert,
            kind: RepositoryErrorKind::AlreadyExists,
            message: "Entity already exists".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(identifier.into()),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a constraint violation error
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(RepositoryOperation::FindIds.to_string(), "find_ids");
        assert_eq!(RepositoryOperation::FetchByIds.to_string(), "fetch_by_ids");
        assert_eq!(RepositoryOperation::FindPage.to_string(), "find_page");
        assert_eq!(RepositoryOperation::Merge.to_string(), "merge");
        assert_eq!(RepositoryOperation::Flush.to_string(), "flush");
        assert_eq!(RepositoryOperation::Commit.to_string(), "commit");
    }

    #[test]
    fn test_not_found_convenience() {
        let error = RepositoryError::not_found("company", "c_1");
        assert_eq!(error.operation, RepositoryOperation::FindById);
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.entity_type.as_deref(), Some("company"));
        assert_eq!(error.entity_id.as_deref(), Some("c_1"));
    }

    #[test]
    fn test_with_operation_and_entity() {
        let error = RepositoryError::new(
            RepositoryOperation::Flush,
            RepositoryErrorKind::DatabaseError,
            "disk full",
        )
        .with_entity("employee", "12")
        .with_operation(RepositoryOperation::Commit);
        assert_eq!(error.operation, RepositoryOperation::Commit);
        assert!(error.to_string().ends_with("[employee: 12]"));
    }

    #[test]
    fn test_display_without_entity() {
        let error = RepositoryError::timeout(RepositoryOperation::Count, "took too long");
        let display = error.to_string();
        assert_eq!(display, "Repository timeout error during count: took too long");
        assert!(!display.contains('['));
    }

    #[test]
    fn test_is_retriable() {
        let refused = RepositoryError::new(
            RepositoryOperation::Begin,
            RepositoryErrorKind::ConnectionFailed,
            "refused",
        );
        assert!(refused.is_retriable());
        assert!(RepositoryError::timeout(RepositoryOperation::FindIds, "slow").is_retriable());
        assert!(!RepositoryError::not_found("company", "1").is_retriable());
        assert!(!RepositoryError::already_exists("company", "1").is_retriable());
        assert!(
            !RepositoryError::constraint_violation(RepositoryOperation::Merge, "fk").is_retriable()
        );
    }
}
