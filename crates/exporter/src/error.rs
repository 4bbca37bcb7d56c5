//! Error types for the ONNX exporter

use std::io;
use thiserror::Error;

use crate::source::ValueId;

/// Result type for exporter operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that abort a conversion run
///
/// Nothing here is retried: the first error ends the conversion and no partial
/// model is returned.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid trace: {0}")]
    InvalidTrace(String),

    #[error("Value id {0} is not part of the trace")]
    UnknownValue(ValueId),

    #[error("Tuple value {0} contains itself")]
    CyclicTuple(ValueId),

    #[error("Tensor already declared: {0}")]
    DuplicateTensor(String),

    #[error("Name '{0}' is assigned to more than one value or node")]
    DuplicateName(String),

    #[error("Tensor not declared: {0}")]
    MissingTensor(String),

    #[error("Malformed operator {op_type}: {reason}")]
    MalformedOperator { op_type: String, reason: String },

    #[error("Operator {op_type} references undeclared name '{name}'")]
    UnresolvedName { op_type: String, name: String },

    #[error("Invalid argument for {rule}: {reason}")]
    InvalidNodeArgument { rule: String, reason: String },

    #[error("Array shape {shape:?} does not match {len} elements")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Protobuf decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Trace deserialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ExportError {
    pub(crate) fn invalid_argument(rule: &str, reason: impl Into<String>) -> Self {
        ExportError::InvalidNodeArgument {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}
