//! Binary buffer reader with cursor tracking.

use std::str;

use crate::{BufferError, NULL_LENGTH};

/// A binary buffer reader over a byte slice.
///
/// Every read is bounds-checked: on failure the cursor does not move and a
/// [`BufferError`] is returned.
///
/// # Example
///
/// ```
/// use graft_buffers::Reader;
///
/// let data = [0x01, 0x02, 0x03];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_u8(), Ok(0x01));
/// assert_eq!(reader.try_u16(), Ok(0x0203));
/// assert!(reader.try_u8().is_err());
/// ```
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }

    /// Returns `true` when every byte has been consumed.
    pub fn is_eof(&self) -> bool {
        self.x >= self.uint8.len()
    }

    /// Checks that `n` more bytes are available from the current cursor.
    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        match self.x.checked_add(n) {
            Some(end) if end <= self.uint8.len() => Ok(()),
            _ => Err(BufferError::EndOfBuffer),
        }
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.uint8[self.x..self.x + N]);
        self.x += N;
        Ok(out)
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.take::<1>()?[0])
    }

    /// Reads a signed 8-bit integer.
    #[inline]
    pub fn try_i8(&mut self) -> Result<i8, BufferError> {
        Ok(self.take::<1>()?[0] as i8)
    }

    /// Reads a one-byte boolean; any non-zero byte is `true`.
    #[inline]
    pub fn try_bool8(&mut self) -> Result<bool, BufferError> {
        Ok(self.take::<1>()?[0] != 0)
    }

    /// Reads an unsigned 16-bit big-endian integer.
    #[inline]
    pub fn try_u16(&mut self) -> Result<u16, BufferError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    /// Reads a signed 16-bit big-endian integer.
    #[inline]
    pub fn try_i16(&mut self) -> Result<i16, BufferError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    /// Reads an unsigned 32-bit big-endian integer.
    #[inline]
    pub fn try_u32(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    /// Reads a signed 32-bit big-endian integer.
    #[inline]
    pub fn try_i32(&mut self) -> Result<i32, BufferError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    /// Reads a 32-bit big-endian float.
    #[inline]
    pub fn try_f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_be_bytes(self.take()?))
    }

    /// Reads a 64-bit big-endian float.
    #[inline]
    pub fn try_f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    /// Reads `size` raw bytes and advances the cursor.
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let x = self.x;
        let end = x + size;
        let bin = &self.uint8[x..end];
        self.x = end;
        Ok(bin)
    }

    /// Reads a UTF-8 string of `size` bytes.
    pub fn try_utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        self.check(size)?;
        let start = self.x;
        let s = str::from_utf8(&self.uint8[start..start + size])
            .map_err(|_| BufferError::InvalidUtf8)?;
        self.x += size;
        Ok(s)
    }

    /// Reads a `uint7x` variable-length integer (see
    /// [`Writer::uint7x`](crate::Writer::uint7x)).
    pub fn try_uint7x(&mut self) -> Result<i32, BufferError> {
        let start = self.x;
        let mut result: u32 = 0;
        for i in 0..5 {
            let b = match self.try_u8() {
                Ok(b) => b,
                Err(e) => {
                    self.x = start;
                    return Err(e);
                }
            };
            if i == 4 && b > 0x0f {
                self.x = start;
                return Err(BufferError::VarIntOverflow);
            }
            result |= ((b & 0x7f) as u32) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(result as i32);
            }
        }
        self.x = start;
        Err(BufferError::VarIntOverflow)
    }

    /// Reads a length-prefixed UTF-8 string; the null sentinel yields `None`.
    pub fn try_string_utf8(&mut self) -> Result<Option<&'a str>, BufferError> {
        let start = self.x;
        let length = self.try_uint7x()?;
        if length == NULL_LENGTH {
            return Ok(None);
        }
        if length < 0 {
            self.x = start;
            return Err(BufferError::InvalidLength(length));
        }
        match self.try_utf8(length as usize) {
            Ok(s) => Ok(Some(s)),
            Err(e) => {
                self.x = start;
                Err(e)
            }
        }
    }
}
