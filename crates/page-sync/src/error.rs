use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity attached to errors reported back to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Structural problems that prevent a tree from being sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Component IDs must be non-empty strings.")]
    EmptyId,
    #[error("Cannot render a form inside another form")]
    NestedForm { id: String },
    #[error(
        "Invalid input: {id}.\n\nInputs inside forms cannot have onEnter hooks since pressing enter will submit the form.\n\nPlace the input outside the form to use the onEnter hook."
    )]
    OnEnterInsideForm { id: String },
    #[error("Maximum component tree depth of {max} exceeded.")]
    MaxDepthExceeded { max: usize },
    #[error("Duplicate component ID found: '{id}'. All component IDs must be unique.")]
    DuplicateId { id: String },
}

/// Inbound events that reference state the session does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("The render container was not found")]
    RenderNotFound { render_id: String },
    #[error("The component was not found")]
    NodeNotFound { node_id: String },
    #[error("The component is not an input")]
    NotAnInput { node_id: String },
    #[error("The component is not a table")]
    NotATable { node_id: String },
    #[error("The row action was not found")]
    RowActionNotFound { index: usize },
    #[error("The table state was not found")]
    TableStateNotFound { table_id: String },
    #[error("The table does not have a page change handler function.")]
    NoPageChangeHandler { table_id: String },
    #[error("The confirmation dialog was not found")]
    DialogNotFound { dialog_id: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("outbound channel closed")]
    Closed,
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditLogError {
    #[error("Audit log contained no message.")]
    EmptyMessage,
    #[error("Audit log message exceeds the maximum length of {max} characters.")]
    MessageTooLong { max: usize },
    #[error("Audit log data exceeds the maximum size of {max} bytes.")]
    DataTooLarge { max: usize },
    #[error("Audit log data could not be serialized.")]
    DataNotSerializable,
    #[error("Invalid audit log severity: '{0}'.")]
    InvalidSeverity(String),
    #[error("Audit log rate limit exceeded. Logs are hard capped at {limit} per minute.")]
    RateLimited { limit: u32 },
}
