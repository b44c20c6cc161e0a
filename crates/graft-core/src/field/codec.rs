//! Wire encodings of field values and the parser/composer pair bound to one.

use std::sync::Arc;

use graft_buffers::{Reader, Writer};
use tracing::trace;

use super::{array, scalar, DeltaValue, Field, FieldDelta, FieldKind};
use crate::blob::{Blob, BlobCodec};
use crate::config::CodecOptions;
use crate::error::{CodecError, DecodeError, EncodeError, Result};
use crate::reference::{read_ref, write_ref};
use crate::wire::{props, WireType, DEFAULT_FLOW_TAG};

/// A concrete on-wire representation a field value can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Bool8,
    UInt8,
    UInt16,
    UInt32,
    Int8,
    Int16,
    Int32,
    Float32,
    Float64,
    Bool8Array,
    UInt8Array,
    Int8Array,
    Int16Array,
    Float32Array,
    Float64Array,
    StringArray,
    Object,
    ObjectArray,
    WeakRef,
    Serial,
}

impl Encoding {
    /// Flow tag selecting this encoding.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Bool8 => "bool8",
            Encoding::UInt8 => "uint8",
            Encoding::UInt16 => "uint16",
            Encoding::UInt32 => "uint32",
            Encoding::Int8 => "int8",
            Encoding::Int16 => "int16",
            Encoding::Int32 => "int32",
            Encoding::Float32 => "float32",
            Encoding::Float64 => "float64",
            Encoding::Bool8Array => "bool8[]",
            Encoding::UInt8Array => "uint8[]",
            Encoding::Int8Array => "int8[]",
            Encoding::Int16Array => "int16[]",
            Encoding::Float32Array => "float32[]",
            Encoding::Float64Array => "float64[]",
            Encoding::StringArray => "string_UTF8[]",
            Encoding::Object => "obj",
            Encoding::ObjectArray => "obj[]",
            Encoding::WeakRef => "ref",
            Encoding::Serial => "serial",
        }
    }

    /// Leading tag, and the element tag for arrays.
    pub fn header(self) -> (WireType, Option<WireType>) {
        let array = |element| (WireType::Array, Some(element));
        match self {
            Encoding::Bool8 => (WireType::Bool8, None),
            Encoding::UInt8 => (WireType::UInt8, None),
            Encoding::UInt16 => (WireType::UInt16, None),
            Encoding::UInt32 => (WireType::UInt32, None),
            Encoding::Int8 => (WireType::Int8, None),
            Encoding::Int16 => (WireType::Int16, None),
            Encoding::Int32 => (WireType::Int32, None),
            Encoding::Float32 => (WireType::Float32, None),
            Encoding::Float64 => (WireType::Float64, None),
            Encoding::Bool8Array => array(WireType::Bool8),
            Encoding::UInt8Array => array(WireType::UInt8),
            Encoding::Int8Array => array(WireType::Int8),
            Encoding::Int16Array => array(WireType::Int16),
            Encoding::Float32Array => array(WireType::Float32),
            Encoding::Float64Array => array(WireType::Float64),
            Encoding::StringArray => array(WireType::StringUtf8),
            Encoding::Object => (WireType::Object, None),
            Encoding::ObjectArray => array(WireType::Object),
            Encoding::WeakRef => (WireType::WeakRef, None),
            Encoding::Serial => (WireType::Serial, None),
        }
    }

    /// Encodings a kind accepts; the first one is canonical.
    pub fn accepted(kind: &FieldKind) -> &'static [Encoding] {
        use Encoding::*;
        match kind {
            FieldKind::Boolean(_) => &[Bool8],
            FieldKind::Integer(_) => &[Int32, UInt8, UInt16, UInt32, Int8, Int16],
            FieldKind::Double(_) => &[Float64, Float32],
            FieldKind::BooleanArray(_) => &[Bool8Array],
            FieldKind::ShortArray(_) => &[Int16Array, UInt8Array, Int8Array],
            FieldKind::DoubleArray(_) => &[Float64Array, Float32Array],
            FieldKind::StringArray(_) => &[StringArray],
            FieldKind::Object { .. } | FieldKind::Interface(_) => &[Object],
            FieldKind::ObjectList(_) => &[ObjectArray],
            FieldKind::WeakRef(_) => &[WeakRef],
            FieldKind::Blob { .. } => &[Serial],
        }
    }

    pub fn for_flow(kind: &FieldKind, flow: &str) -> Option<Encoding> {
        let accepted = Self::accepted(kind);
        if flow == DEFAULT_FLOW_TAG {
            return accepted.first().copied();
        }
        accepted.iter().copied().find(|e| e.name() == flow)
    }

    pub(super) fn from_header(
        kind: &FieldKind,
        field: &str,
        reader: &mut Reader<'_>,
    ) -> Result<Encoding> {
        let accepted = Self::accepted(kind);
        let is_array = matches!(accepted.first().map(|e| e.header()), Some((WireType::Array, _)));
        let first = reader.try_u8()?;
        let unknown = |code| DecodeError::UnknownWireType {
            field: field.to_owned(),
            code,
        };
        if !is_array {
            return accepted
                .iter()
                .copied()
                .find(|e| e.header().0.code() == first)
                .ok_or_else(|| unknown(first).into());
        }
        if first != WireType::Array.code() {
            return Err(DecodeError::UnexpectedWireType {
                field: field.to_owned(),
                expected: WireType::Array.code(),
                found: first,
            }
            .into());
        }
        let element = reader.try_u8()?;
        accepted
            .iter()
            .copied()
            .find(|e| e.header().1.map(WireType::code) == Some(element))
            .ok_or_else(|| unknown(element).into())
    }

    fn is_integer(self) -> bool {
        matches!(
            self,
            Encoding::UInt8
                | Encoding::UInt16
                | Encoding::UInt32
                | Encoding::Int8
                | Encoding::Int16
                | Encoding::Int32
        )
    }
}

/// Reads values of one field in the encoding announced by its header.
#[derive(Debug)]
pub struct FieldParser {
    field: Arc<Field>,
    encoding: Encoding,
}

impl FieldParser {
    pub(super) fn new(field: Arc<Field>, encoding: Encoding) -> Self {
        Self { field, encoding }
    }

    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn parse_value(
        &self,
        reader: &mut Reader<'_>,
        options: &CodecOptions,
    ) -> Result<FieldDelta> {
        let name = self.field.name();
        let value = match self.encoding {
            Encoding::Bool8 => DeltaValue::Boolean(reader.try_bool8()?),
            e if e.is_integer() => DeltaValue::Integer(scalar::read_int(reader, e, name)?),
            e @ (Encoding::Float32 | Encoding::Float64) => {
                DeltaValue::Double(scalar::read_double(reader, e)?)
            }
            Encoding::Bool8Array => {
                DeltaValue::BooleanArray(array::read_bools(reader, name, options)?)
            }
            e @ (Encoding::UInt8Array | Encoding::Int8Array | Encoding::Int16Array) => {
                DeltaValue::ShortArray(array::read_shorts(reader, e, name, options)?)
            }
            e @ (Encoding::Float32Array | Encoding::Float64Array) => {
                DeltaValue::DoubleArray(array::read_doubles(reader, e, name, options)?)
            }
            Encoding::StringArray => {
                DeltaValue::StringArray(array::read_strings(reader, name, options)?)
            }
            Encoding::Object => DeltaValue::Object(array::read_id(reader)?),
            Encoding::ObjectArray => {
                DeltaValue::ObjectList(array::read_ids(reader, name, options)?)
            }
            Encoding::WeakRef => DeltaValue::WeakRef(read_ref(reader, name)?),
            Encoding::Serial => match self.field.kind() {
                FieldKind::Blob { codec, .. } => {
                    DeltaValue::Blob(read_blob(reader, codec.as_ref(), name)?)
                }
                _ => return Err(mismatch(&self.field)),
            },
            _ => return Err(mismatch(&self.field)),
        };
        trace!(field = name, encoding = self.encoding.name(), "parsed field");
        Ok(FieldDelta::new(Arc::clone(&self.field), value))
    }
}

/// Writes values of one field in the encoding selected by its flow.
#[derive(Debug)]
pub struct FieldComposer {
    field: Arc<Field>,
    encoding: Encoding,
    code: i32,
}

impl FieldComposer {
    pub(super) fn new(field: Arc<Field>, code: i32) -> Result<Self> {
        let encoding = Encoding::for_flow(field.kind(), field.flow()).ok_or_else(|| {
            EncodeError::UnknownFlow {
                field: field.name().to_owned(),
                flow: field.flow().to_owned(),
            }
        })?;
        Ok(Self {
            field,
            encoding,
            code,
        })
    }

    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Field code written ahead of the header in update frames.
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn publish_flow_encoding(&self, writer: &mut Writer) {
        let (tag, element) = self.encoding.header();
        writer.u8(tag.code());
        if let Some(element) = element {
            writer.u8(element.code());
        }
    }

    pub fn compose_value(&self, delta: &FieldDelta, writer: &mut Writer) -> Result<()> {
        let name = self.field.name();
        let mismatch = || EncodeError::DeltaMismatch {
            field: name.to_owned(),
        };
        if !Arc::ptr_eq(delta.field(), &self.field) {
            return Err(mismatch().into());
        }
        match (self.encoding, delta.value()) {
            (Encoding::Bool8, DeltaValue::Boolean(v)) => writer.bool8(*v),
            (e, DeltaValue::Integer(v)) if e.is_integer() => {
                scalar::write_int(writer, e, *v, name)?
            }
            (e @ (Encoding::Float32 | Encoding::Float64), DeltaValue::Double(v)) => {
                scalar::write_double(writer, e, *v)
            }
            (Encoding::Bool8Array, DeltaValue::BooleanArray(v)) => {
                array::write_bools(writer, v.as_deref(), name)?
            }
            (
                e @ (Encoding::UInt8Array | Encoding::Int8Array | Encoding::Int16Array),
                DeltaValue::ShortArray(v),
            ) => array::write_shorts(writer, e, v.as_deref(), name)?,
            (e @ (Encoding::Float32Array | Encoding::Float64Array), DeltaValue::DoubleArray(v)) => {
                array::write_doubles(writer, e, v.as_deref(), name)?
            }
            (Encoding::StringArray, DeltaValue::StringArray(v)) => {
                array::write_strings(writer, v.as_deref(), name)?
            }
            (Encoding::Object, DeltaValue::Object(v)) => {
                writer.string_utf8(v.as_deref());
            }
            (Encoding::ObjectArray, DeltaValue::ObjectList(v)) => {
                array::write_ids(writer, v.as_deref(), name)?
            }
            (Encoding::WeakRef, DeltaValue::WeakRef(v)) => write_ref(writer, v.as_ref()),
            (Encoding::Serial, DeltaValue::Blob(v)) => write_blob(writer, v.as_deref(), name)?,
            _ => return Err(mismatch().into()),
        }
        trace!(field = name, encoding = self.encoding.name(), "composed field");
        Ok(())
    }
}

fn mismatch(field: &Field) -> CodecError {
    CodecError::TypeMismatch {
        field: field.name().to_owned(),
        expected: field.print_type(),
    }
}

/// Properties byte, then the blob's own bytes behind a length prefix.
fn write_blob(writer: &mut Writer, blob: Option<&dyn Blob>, field: &str) -> Result<()> {
    let Some(blob) = blob else {
        writer.u8(props::NULL);
        return Ok(());
    };
    let rejected = |reason: String| EncodeError::Blob {
        field: field.to_owned(),
        reason,
    };
    let mut payload = Writer::with_alloc_size(64);
    blob.serialize(&mut payload).map_err(rejected)?;
    let bytes = payload.flush();
    let len = i32::try_from(bytes.len()).map_err(|_| rejected("payload too large".into()))?;
    writer.u8(props::IS_NON_NULL_PROPERTIES_BIT);
    writer.uint7x(len);
    writer.buf(&bytes);
    Ok(())
}

fn read_blob(
    reader: &mut Reader<'_>,
    codec: &dyn BlobCodec,
    field: &str,
) -> Result<Option<Box<dyn Blob>>> {
    if !props::is_non_null(reader.try_u8()?) {
        return Ok(None);
    }
    let len = reader.try_uint7x()?;
    if len < 0 {
        return Err(DecodeError::InvalidLength {
            field: field.to_owned(),
            length: len,
        }
        .into());
    }
    let mut payload = Reader::new(reader.try_buf(len as usize)?);
    let rejected = |reason: String| DecodeError::Blob {
        field: field.to_owned(),
        reason,
    };
    let blob = codec.deserialize(&mut payload).map_err(rejected)?;
    if !payload.is_eof() {
        return Err(rejected(format!("{} unread payload bytes", payload.size())).into());
    }
    Ok(Some(blob))
}
