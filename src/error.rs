use crate::dsl::TokenKind;
use crate::index::Op;
use crate::value::Value;

/// Every failure the crate can produce.
///
/// Errors propagate unchanged to the nearest API entry point; query
/// connectives never swallow or rewrite them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// No index is registered under this field name.
    #[error("no index registered for field: {name}")]
    UnknownField { name: String },

    /// The index exists but cannot serve the requested operator.
    #[error("index does not support the operation: {op}")]
    UnsupportedOperation { op: Op },

    /// The query value does not match the index key type.
    #[error("invalid value type: expected {expected}, got {got}")]
    InvalidValueType {
        expected: &'static str,
        got: &'static str,
    },

    /// A primary key was looked up but is not present.
    #[error("value not found: {value}")]
    ValueNotFound { value: Value },

    /// The operation requires a primary-key index (`with_id`).
    #[error("no primary-key index defined")]
    NoPrimaryKey,

    /// A multi-value operation received the wrong number of arguments.
    #[error("expected {expected} values, got {got}")]
    InvalidArgCount { expected: usize, got: usize },

    /// Syntax failure in the query string, with byte offsets into the source.
    #[error("unexpected token: {actual}, expected: {expected} [{}:{}]", .span.0, .span.1)]
    UnexpectedToken {
        actual: TokenKind,
        expected: TokenKind,
        span: (usize, usize),
    },

    /// A numeric literal does not fit the requested cast type.
    #[error("cannot cast to {type_name}: {reason}")]
    Cast {
        type_name: String,
        reason: String,
    },

    /// `create_index` with a name that is already registered.
    #[error("index name already exists: {name}")]
    DuplicateIndex { name: String },

    /// `create_index` with the reserved primary-key name.
    #[error("{name} is a reserved index name")]
    ReservedName { name: String },

    /// `create_index` with an empty name.
    #[error("empty index name is not allowed")]
    EmptyName,
}
