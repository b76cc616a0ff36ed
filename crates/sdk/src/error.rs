use serde::Serialize;
use thiserror::Error;

/// Error returned by every fallible engine operation.
///
/// Carries a declared [`ErrorKind`], a human-readable message and an
/// optional machine-readable code such as `"field.not_found"`.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct DomainError {
    /// The error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Classification of domain errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced table, field, view or record does not exist.
    #[error("not_found")]
    NotFound,

    /// The command input was malformed or violates an invariant.
    /// Example: "Field name already exists"
    #[error("validation")]
    Validation,

    /// A lower layer failed.
    /// Example: the persistence adapter lost its connection
    #[error("unexpected")]
    Unexpected,
}

impl DomainError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an unexpected error, usually wrapping a lower-layer failure.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn table_not_found(table_id: impl std::fmt::Display) -> Self {
        Self::not_found(format!("Table {table_id} not found")).with_code(codes::TABLE_NOT_FOUND)
    }

    pub fn field_not_found(field_id: impl std::fmt::Display) -> Self {
        Self::not_found(format!("Field {field_id} not found")).with_code(codes::FIELD_NOT_FOUND)
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl From<SerializationError> for DomainError {
    fn from(err: SerializationError) -> Self {
        DomainError::unexpected(err.message).with_code(codes::SERIALIZATION)
    }
}

/// Well-known error codes.
pub mod codes {
    pub const TABLE_NOT_FOUND: &str = "table.not_found";
    pub const FIELD_NOT_FOUND: &str = "field.not_found";
    pub const VIEW_NOT_FOUND: &str = "view.not_found";
    pub const RECORD_NOT_FOUND: &str = "record.not_found";
    pub const FIELD_INVALID: &str = "field.invalid";
    pub const FIELD_DUPLICATE_NAME: &str = "field.duplicate_name";
    pub const TABLE_INVALID: &str = "table.invalid";
    pub const RECORD_INVALID_VALUE: &str = "record.invalid_value";
    pub const DOTTEA_NO_TABLES: &str = "dottea.no_tables";
    pub const DOTTEA_INVALID: &str = "dottea.invalid";
    pub const SERIALIZATION: &str = "serialization";
    pub const HANDLER_NOT_REGISTERED: &str = "command.handler_not_registered";
}

/// Error during event serialization/deserialization.
#[derive(Clone, Debug, Error)]
#[error("(de)serialization error: {message}")]
pub struct SerializationError {
    pub message: String,
}

impl SerializationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = DomainError::field_not_found("F9");
        assert_eq!(err.to_string(), "not_found: Field F9 not found");
        assert_eq!(err.code(), Some("field.not_found"));
    }

    #[test]
    fn serialization_errors_become_unexpected() {
        let err: DomainError = SerializationError::new("bad json").into();
        assert!(err.is_kind(ErrorKind::Unexpected));
        assert_eq!(err.message, "bad json");
    }
}
