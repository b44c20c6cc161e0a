//! Error types for building, encoding, decoding and resolving object graphs.

use graft_buffers::BufferError;
use thiserror::Error;

use crate::node::NodeId;

/// Top-level error for every batch-level operation.
///
/// None of these are recoverable at the point of occurrence: a field that
/// fails to decode leaves the rest of the stream misaligned, so the whole
/// encode/decode/diff/clone call is failed.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cannot build type `{type_name}`: {reason}")]
    Build { type_name: String, reason: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("unresolved identifier `{0}`")]
    Resolution(String),
    #[error("field `{field}` expects `{expected}` but was applied to another node type")]
    TypeMismatch { field: String, expected: String },
    #[error("no live node at {0}")]
    MissingNode(NodeId),
    #[error("print failed")]
    Format(#[from] std::fmt::Error),
}

impl CodecError {
    pub(crate) fn build(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::Build {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<BufferError> for CodecError {
    fn from(e: BufferError) -> Self {
        CodecError::Decode(DecodeError::Stream(e))
    }
}

/// Wire-level decode failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("field `{field}`: unsupported wire type 0x{code:02x}")]
    UnknownWireType { field: String, code: u8 },
    #[error("field `{field}`: expected wire type 0x{expected:02x}, found 0x{found:02x}")]
    UnexpectedWireType {
        field: String,
        expected: u8,
        found: u8,
    },
    #[error("truncated or malformed stream: {0}")]
    Stream(#[from] BufferError),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown frame keyword 0x{0:02x}")]
    UnknownKeyword(u8),
    #[error("type `{type_name}` has no field with code {code}")]
    UnknownFieldCode { type_name: String, code: i32 },
    #[error("field `{field}`: null element in a non-nullable sequence")]
    NullElement { field: String },
    #[error("field `{field}`: length {length} exceeds limit {limit}")]
    LengthLimit {
        field: String,
        length: i32,
        limit: usize,
    },
    #[error("field `{field}`: invalid length {length}")]
    InvalidLength { field: String, length: i32 },
    #[error("field `{field}`: value {value} does not fit the field")]
    Overflow { field: String, value: i64 },
    #[error("identifier `{0}` is already bound")]
    DuplicateId(String),
    #[error("cannot remove `{key}`: still referenced by {holder}")]
    RemovedWhileReferenced { key: String, holder: NodeId },
    #[error("{0} trailing bytes after the last frame")]
    TrailingBytes(usize),
    #[error("field `{field}`: blob payload rejected: {reason}")]
    Blob { field: String, reason: String },
}

/// Failures raised while selecting or driving a composer.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("field `{field}`: no composer for flow `{flow}`")]
    UnknownFlow { field: String, flow: String },
    #[error("field `{field}`: value {value} does not fit `{encoding}`")]
    ValueOutOfRange {
        field: String,
        value: i64,
        encoding: &'static str,
    },
    #[error("field `{field}`: delta does not belong to this composer")]
    DeltaMismatch { field: String },
    #[error("field `{field}`: blob serialization failed: {reason}")]
    Blob { field: String, reason: String },
}

pub type Result<T, E = CodecError> = std::result::Result<T, E>;
