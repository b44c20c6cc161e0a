//! Decoder limits and writer sizing.

use serde::Deserialize;

use crate::error::{CodecError, Result};

/// Options for batch decoding and encoding.
///
/// Every key is optional; missing keys take the [`Default`] value.
///
/// ```
/// use graft_core::CodecOptions;
///
/// let options = CodecOptions::from_toml_str("max_array_length = 1024").unwrap();
/// assert_eq!(options.max_array_length, 1024);
/// assert!(options.reject_trailing_bytes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Longest array (or string array) a decoder accepts.
    pub max_array_length: usize,
    /// Fail a batch that leaves unread bytes after its last frame.
    pub reject_trailing_bytes: bool,
    /// Initial and incremental allocation of batch writers.
    pub writer_alloc_size: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_array_length: 16 * 1024 * 1024,
            reject_trailing_bytes: true,
            writer_alloc_size: 4096,
        }
    }
}

impl CodecOptions {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CodecError::build("CodecOptions", e.to_string()))
    }
}
