//! Binary buffer writer with auto-growing capacity.

use crate::NULL_LENGTH;

/// A binary buffer writer that grows automatically as needed.
///
/// # Example
///
/// ```
/// use graft_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(0x01);
/// writer.u16(0x0203);
/// let data = writer.flush();
/// assert_eq!(data, [0x01, 0x02, 0x03]);
/// ```
pub struct Writer {
    /// The underlying byte buffer.
    pub uint8: Vec<u8>,
    /// Position where last flush happened.
    pub x0: usize,
    /// Current cursor position.
    pub x: usize,
    /// Allocation size when buffer needs to grow.
    alloc_size: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a new writer with default allocation size (4KB).
    pub fn new() -> Self {
        Self::with_alloc_size(4 * 1024)
    }

    /// Creates a new writer with custom allocation size.
    pub fn with_alloc_size(alloc_size: usize) -> Self {
        let alloc_size = alloc_size.max(16);
        Self {
            uint8: vec![0u8; alloc_size],
            x0: 0,
            x: 0,
            alloc_size,
        }
    }

    /// Ensures the buffer has at least `capacity` bytes available.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let remaining = self.uint8.len() - self.x;
        if remaining < capacity {
            let total = self.uint8.len() - self.x0;
            let required = capacity - remaining;
            let total_required = total + required;
            let new_size = if total_required <= self.alloc_size {
                self.alloc_size
            } else {
                total_required * 2
            };
            self.grow(new_size);
        }
    }

    fn grow(&mut self, new_size: usize) {
        let x0 = self.x0;
        let x = self.x;
        let mut new_buf = vec![0u8; new_size];
        new_buf[..x - x0].copy_from_slice(&self.uint8[x0..x]);
        self.uint8 = new_buf;
        self.x = x - x0;
        self.x0 = 0;
    }

    /// Number of bytes written since the last flush.
    pub fn len(&self) -> usize {
        self.x - self.x0
    }

    /// Returns `true` when nothing was written since the last flush.
    pub fn is_empty(&self) -> bool {
        self.x == self.x0
    }

    /// Bytes written since the last flush, without advancing the flush
    /// position.
    pub fn as_slice(&self) -> &[u8] {
        &self.uint8[self.x0..self.x]
    }

    /// Returns the written data and advances the flush position.
    pub fn flush(&mut self) -> Vec<u8> {
        let result = self.uint8[self.x0..self.x].to_vec();
        self.x0 = self.x;
        result
    }

    /// Writes an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.ensure_capacity(1);
        self.uint8[self.x] = val;
        self.x += 1;
    }

    /// Writes a signed 8-bit integer.
    #[inline]
    pub fn i8(&mut self, val: i8) {
        self.u8(val as u8);
    }

    /// Writes a boolean as a single byte (`0x00` / `0x01`).
    #[inline]
    pub fn bool8(&mut self, val: bool) {
        self.u8(u8::from(val));
    }

    /// Writes an unsigned 16-bit integer (big-endian).
    #[inline]
    pub fn u16(&mut self, val: u16) {
        self.put(&val.to_be_bytes());
    }

    /// Writes a signed 16-bit integer (big-endian).
    #[inline]
    pub fn i16(&mut self, val: i16) {
        self.put(&val.to_be_bytes());
    }

    /// Writes an unsigned 32-bit integer (big-endian).
    #[inline]
    pub fn u32(&mut self, val: u32) {
        self.put(&val.to_be_bytes());
    }

    /// Writes a signed 32-bit integer (big-endian).
    #[inline]
    pub fn i32(&mut self, val: i32) {
        self.put(&val.to_be_bytes());
    }

    /// Writes a 32-bit floating point number (big-endian).
    #[inline]
    pub fn f32(&mut self, val: f32) {
        self.put(&val.to_be_bytes());
    }

    /// Writes a 64-bit floating point number (big-endian).
    #[inline]
    pub fn f64(&mut self, val: f64) {
        self.put(&val.to_be_bytes());
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        let length = bytes.len();
        self.ensure_capacity(length);
        self.uint8[self.x..self.x + length].copy_from_slice(bytes);
        self.x += length;
    }

    /// Writes a byte slice.
    pub fn buf(&mut self, buf: &[u8]) {
        self.put(buf);
    }

    /// Writes a `uint7x` variable-length integer.
    ///
    /// The 32-bit two's complement pattern of `val` is emitted in 7-bit
    /// groups, least significant first, with the high bit of each byte
    /// flagging a continuation. Non-negative values below 128 take one byte;
    /// the null sentinel `-1` takes five.
    pub fn uint7x(&mut self, val: i32) {
        let mut rest = val as u32;
        loop {
            let b = (rest & 0x7f) as u8;
            rest >>= 7;
            if rest == 0 {
                self.u8(b);
                return;
            }
            self.u8(b | 0x80);
        }
    }

    /// Writes a length-prefixed UTF-8 string; `None` is written as the
    /// [`NULL_LENGTH`] sentinel with no payload.
    ///
    /// Returns the number of payload bytes written.
    pub fn string_utf8(&mut self, s: Option<&str>) -> usize {
        match s {
            Some(s) => {
                let bytes = s.as_bytes();
                self.uint7x(bytes.len() as i32);
                self.put(bytes);
                bytes.len()
            }
            None => {
                self.uint7x(NULL_LENGTH);
                0
            }
        }
    }
}
