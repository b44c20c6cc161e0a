//! Opaque self-describing values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use graft_buffers::{Reader, Writer};

use crate::error::{CodecError, Result};
use crate::node::AsAny;

/// A host value that knows how to serialize, measure and copy itself.
pub trait Blob: AsAny + fmt::Debug + Send + Sync {
    /// Name of the codec able to read this blob back.
    fn serial_name(&self) -> &str;

    fn serialize(&self, writer: &mut Writer) -> std::result::Result<(), String>;

    /// Estimated heap bytes owned by the blob.
    fn footprint(&self) -> usize;

    fn clone_blob(&self) -> Box<dyn Blob>;
}

impl Clone for Box<dyn Blob> {
    fn clone(&self) -> Self {
        self.clone_blob()
    }
}

/// Serialized bytes of a blob, or `None` when it refuses to serialize.
pub(crate) fn blob_bytes(blob: &dyn Blob) -> Option<Vec<u8>> {
    let mut writer = Writer::with_alloc_size(64);
    blob.serialize(&mut writer).ok()?;
    Some(writer.flush())
}

/// Reads blobs of one serial name.
pub trait BlobCodec: Send + Sync {
    fn serial_name(&self) -> &str;

    /// Reads a blob from its own payload; the reader is bounded to exactly
    /// the bytes the blob wrote.
    fn deserialize(&self, reader: &mut Reader<'_>) -> std::result::Result<Box<dyn Blob>, String>;
}

impl fmt::Debug for dyn BlobCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobCodec({})", self.serial_name())
    }
}

/// Codecs available when declaring blob fields.
#[derive(Default)]
pub struct BlobRegistry {
    codecs: HashMap<String, Arc<dyn BlobCodec>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Arc<dyn BlobCodec>) -> Result<()> {
        let name = codec.serial_name().to_owned();
        if self.codecs.contains_key(&name) {
            return Err(CodecError::build(name, "blob codec registered twice"));
        }
        self.codecs.insert(name, codec);
        Ok(())
    }

    pub fn codec(&self, serial_name: &str) -> Result<Arc<dyn BlobCodec>> {
        self.codecs
            .get(serial_name)
            .cloned()
            .ok_or_else(|| CodecError::build(serial_name, "no blob codec registered"))
    }
}

impl fmt::Debug for BlobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}
