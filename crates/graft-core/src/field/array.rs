//! Length-prefixed sequences. A length of `-1` stands for a null array.

use graft_buffers::{Reader, Writer, NULL_LENGTH};

use super::scalar;
use super::Encoding;
use crate::config::CodecOptions;
use crate::wire::uint7x_count;
use crate::error::{DecodeError, EncodeError, Result};

fn write_len(writer: &mut Writer, len: Option<usize>, field: &str) -> Result<()> {
    match len {
        Some(n) => {
            writer.uint7x(uint7x_count(n, field)?);
        }
        None => writer.uint7x(NULL_LENGTH),
    }
    Ok(())
}

fn read_len(reader: &mut Reader<'_>, field: &str, options: &CodecOptions) -> Result<Option<usize>> {
    let length = reader.try_uint7x()?;
    if length == NULL_LENGTH {
        return Ok(None);
    }
    if length < 0 {
        return Err(DecodeError::InvalidLength {
            field: field.to_owned(),
            length,
        }
        .into());
    }
    if length as usize > options.max_array_length {
        return Err(DecodeError::LengthLimit {
            field: field.to_owned(),
            length,
            limit: options.max_array_length,
        }
        .into());
    }
    Ok(Some(length as usize))
}

/// Reads `len` elements, or nothing for a null array.
fn read_seq<T>(
    reader: &mut Reader<'_>,
    field: &str,
    options: &CodecOptions,
    mut element: impl FnMut(&mut Reader<'_>) -> Result<T>,
) -> Result<Option<Vec<T>>> {
    let Some(len) = read_len(reader, field, options)? else {
        return Ok(None);
    };
    // Every element takes at least one byte.
    let mut out = Vec::with_capacity(len.min(reader.size()));
    for _ in 0..len {
        out.push(element(reader)?);
    }
    Ok(Some(out))
}

pub(super) fn write_bools(writer: &mut Writer, items: Option<&[bool]>, field: &str) -> Result<()> {
    write_len(writer, items.map(<[bool]>::len), field)?;
    for b in items.unwrap_or_default() {
        writer.bool8(*b);
    }
    Ok(())
}

pub(super) fn read_bools(
    reader: &mut Reader<'_>,
    field: &str,
    options: &CodecOptions,
) -> Result<Option<Vec<bool>>> {
    read_seq(reader, field, options, |r| Ok(r.try_bool8()?))
}

pub(super) fn write_shorts(
    writer: &mut Writer,
    encoding: Encoding,
    items: Option<&[i16]>,
    field: &str,
) -> Result<()> {
    write_len(writer, items.map(<[i16]>::len), field)?;
    for &v in items.unwrap_or_default() {
        let out_of_range = || EncodeError::ValueOutOfRange {
            field: field.to_owned(),
            value: i64::from(v),
            encoding: encoding.name(),
        };
        match encoding {
            Encoding::UInt8Array => writer.u8(u8::try_from(v).map_err(|_| out_of_range())?),
            Encoding::Int8Array => writer.i8(i8::try_from(v).map_err(|_| out_of_range())?),
            _ => writer.i16(v),
        }
    }
    Ok(())
}

pub(super) fn read_shorts(
    reader: &mut Reader<'_>,
    encoding: Encoding,
    field: &str,
    options: &CodecOptions,
) -> Result<Option<Vec<i16>>> {
    read_seq(reader, field, options, |r| {
        Ok(match encoding {
            Encoding::UInt8Array => i16::from(r.try_u8()?),
            Encoding::Int8Array => i16::from(r.try_i8()?),
            _ => r.try_i16()?,
        })
    })
}

pub(super) fn write_doubles(
    writer: &mut Writer,
    encoding: Encoding,
    items: Option<&[f64]>,
    field: &str,
) -> Result<()> {
    write_len(writer, items.map(<[f64]>::len), field)?;
    for &v in items.unwrap_or_default() {
        scalar::write_double(writer, encoding, v);
    }
    Ok(())
}

pub(super) fn read_doubles(
    reader: &mut Reader<'_>,
    encoding: Encoding,
    field: &str,
    options: &CodecOptions,
) -> Result<Option<Vec<f64>>> {
    read_seq(reader, field, options, |r| scalar::read_double(r, encoding))
}

pub(super) fn write_strings(
    writer: &mut Writer,
    items: Option<&[String]>,
    field: &str,
) -> Result<()> {
    write_len(writer, items.map(<[String]>::len), field)?;
    for s in items.unwrap_or_default() {
        writer.string_utf8(Some(s));
    }
    Ok(())
}

pub(super) fn read_strings(
    reader: &mut Reader<'_>,
    field: &str,
    options: &CodecOptions,
) -> Result<Option<Vec<String>>> {
    read_seq(reader, field, options, |r| match r.try_string_utf8()? {
        Some(s) => Ok(s.to_owned()),
        None => Err(DecodeError::NullElement {
            field: field.to_owned(),
        }
        .into()),
    })
}

/// Object identifiers; a null or empty element is a null reference.
pub(super) fn write_ids(
    writer: &mut Writer,
    items: Option<&[Option<String>]>,
    field: &str,
) -> Result<()> {
    write_len(writer, items.map(<[Option<String>]>::len), field)?;
    for id in items.unwrap_or_default() {
        writer.string_utf8(id.as_deref());
    }
    Ok(())
}

pub(super) fn read_ids(
    reader: &mut Reader<'_>,
    field: &str,
    options: &CodecOptions,
) -> Result<Option<Vec<Option<String>>>> {
    read_seq(reader, field, options, |r| Ok(read_id(r)?))
}

pub(super) fn read_id(
    reader: &mut Reader<'_>,
) -> Result<Option<String>, graft_buffers::BufferError> {
    Ok(reader
        .try_string_utf8()?
        .filter(|s| !s.is_empty())
        .map(str::to_owned))
}
