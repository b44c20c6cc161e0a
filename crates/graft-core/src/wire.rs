//! One-byte wire type tags and related constants.

use crate::error::{EncodeError, Result};

/// Physical encoding of a value on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Bool8 = 0x10,
    UInt8 = 0x20,
    UInt16 = 0x21,
    UInt32 = 0x22,
    Int8 = 0x24,
    Int16 = 0x25,
    Int32 = 0x26,
    Float32 = 0x32,
    Float64 = 0x33,
    StringUtf8 = 0x42,
    Array = 0x80,
    Object = 0xa0,
    WeakRef = 0xa4,
    Serial = 0xb0,
}

impl WireType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x10 => Some(Self::Bool8),
            0x20 => Some(Self::UInt8),
            0x21 => Some(Self::UInt16),
            0x22 => Some(Self::UInt32),
            0x24 => Some(Self::Int8),
            0x25 => Some(Self::Int16),
            0x26 => Some(Self::Int32),
            0x32 => Some(Self::Float32),
            0x33 => Some(Self::Float64),
            0x42 => Some(Self::StringUtf8),
            0x80 => Some(Self::Array),
            0xa0 => Some(Self::Object),
            0xa4 => Some(Self::WeakRef),
            0xb0 => Some(Self::Serial),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Properties byte written ahead of nullable structured payloads.
pub mod props {
    /// Null value, no payload follows.
    pub const NULL: u8 = 0x00;
    /// Set when a payload follows.
    pub const IS_NON_NULL_PROPERTIES_BIT: u8 = 0x01;

    #[inline]
    pub fn is_non_null(props: u8) -> bool {
        props & IS_NON_NULL_PROPERTIES_BIT == IS_NON_NULL_PROPERTIES_BIT
    }
}

/// Frame keywords used by the batch layer.
pub mod keyword {
    pub const NODE: u8 = 0x01;
    pub const UPDATE: u8 = 0x02;
    pub const REMOVE: u8 = 0x03;
}

/// Flow tag selecting the canonical encoding of a field.
pub const DEFAULT_FLOW_TAG: &str = "(default)";

/// A length, count or field code as written by `uint7x`.
pub(crate) fn uint7x_count(n: usize, field: &str) -> Result<i32> {
    i32::try_from(n).map_err(|_| {
        EncodeError::ValueOutOfRange {
            field: field.to_owned(),
            value: i64::try_from(n).unwrap_or(i64::MAX),
            encoding: "uint7x",
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_roundtrips_every_tag() {
        let all = [
            WireType::Bool8,
            WireType::UInt8,
            WireType::UInt16,
            WireType::UInt32,
            WireType::Int8,
            WireType::Int16,
            WireType::Int32,
            WireType::Float32,
            WireType::Float64,
            WireType::StringUtf8,
            WireType::Array,
            WireType::Object,
            WireType::WeakRef,
            WireType::Serial,
        ];
        for t in all {
            assert_eq!(WireType::from_u8(t.code()), Some(t));
        }
        assert_eq!(WireType::from_u8(0x00), None);
        assert_eq!(WireType::from_u8(0xff), None);
    }

    #[test]
    fn non_null_bit() {
        assert!(!props::is_non_null(props::NULL));
        assert!(props::is_non_null(0x01));
        assert!(props::is_non_null(0x03));
        assert!(!props::is_non_null(0x02));
    }

    #[test]
    fn counts_beyond_uint7x_are_refused() {
        assert_eq!(uint7x_count(300, "tags").unwrap(), 300);
        assert_eq!(uint7x_count(i32::MAX as usize, "tags").unwrap(), i32::MAX);
        assert!(matches!(
            uint7x_count(i32::MAX as usize + 1, "frames"),
            Err(crate::error::CodecError::Encode(EncodeError::ValueOutOfRange { ref field, .. }))
                if field == "frames"
        ));
    }
}
