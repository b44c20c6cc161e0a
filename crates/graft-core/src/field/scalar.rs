//! Integer and floating point values in their selectable widths.

use graft_buffers::{Reader, Writer};

use super::Encoding;
use crate::error::{DecodeError, EncodeError, Result};

pub(super) fn write_int(
    writer: &mut Writer,
    encoding: Encoding,
    value: i32,
    field: &str,
) -> Result<()> {
    let out_of_range = || EncodeError::ValueOutOfRange {
        field: field.to_owned(),
        value: i64::from(value),
        encoding: encoding.name(),
    };
    match encoding {
        Encoding::UInt8 => writer.u8(u8::try_from(value).map_err(|_| out_of_range())?),
        Encoding::UInt16 => writer.u16(u16::try_from(value).map_err(|_| out_of_range())?),
        Encoding::UInt32 => writer.u32(u32::try_from(value).map_err(|_| out_of_range())?),
        Encoding::Int8 => writer.i8(i8::try_from(value).map_err(|_| out_of_range())?),
        Encoding::Int16 => writer.i16(i16::try_from(value).map_err(|_| out_of_range())?),
        _ => writer.i32(value),
    }
    Ok(())
}

pub(super) fn read_int(reader: &mut Reader<'_>, encoding: Encoding, field: &str) -> Result<i32> {
    Ok(match encoding {
        Encoding::UInt8 => i32::from(reader.try_u8()?),
        Encoding::UInt16 => i32::from(reader.try_u16()?),
        Encoding::UInt32 => {
            let v = reader.try_u32()?;
            i32::try_from(v).map_err(|_| DecodeError::Overflow {
                field: field.to_owned(),
                value: i64::from(v),
            })?
        }
        Encoding::Int8 => i32::from(reader.try_i8()?),
        Encoding::Int16 => i32::from(reader.try_i16()?),
        _ => reader.try_i32()?,
    })
}

/// `float32` narrows by rounding; it never fails.
pub(super) fn write_double(writer: &mut Writer, encoding: Encoding, value: f64) {
    match encoding {
        Encoding::Float32 | Encoding::Float32Array => writer.f32(value as f32),
        _ => writer.f64(value),
    }
}

pub(super) fn read_double(reader: &mut Reader<'_>, encoding: Encoding) -> Result<f64> {
    Ok(match encoding {
        Encoding::Float32 | Encoding::Float32Array => f64::from(reader.try_f32()?),
        _ => reader.try_f64()?,
    })
}
