//! graft-buffers - ordered byte stream cursors.
//!
//! [`Writer`] appends big-endian scalars, `uint7x` variable-length integers
//! and length-prefixed UTF-8 strings to a growing buffer. [`Reader`] walks a
//! byte slice with the same vocabulary; every read is bounds-checked and
//! reports a [`BufferError`] instead of panicking.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

/// Length value that marks a null string or a null array on the wire.
pub const NULL_LENGTH: i32 = -1;

/// Errors raised while reading from a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("variable-length integer overflows 32 bits")]
    VarIntOverflow,
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),
}
