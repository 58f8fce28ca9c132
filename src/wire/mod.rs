//! Byte-level encoding primitives for the record wire format.
//!
//! Chronostore owns its on-disk representation: a hand-written,
//! deterministic, little-endian byte format. Because no external
//! serialization library is involved, the stored layout never changes
//! due to a dependency upgrade.
//!
//! Writers are free functions appending to a `Vec<u8>`; reads go through
//! the bounds-checked [`Reader`] cursor. All variable-length payloads are
//! `[u32 len][bytes]`.
//!
//! # Safety limits
//!
//! Decoders enforce upper bounds so that a corrupted or crafted buffer
//! cannot trigger multi-gigabyte allocations:
//!
//! - [`MAX_BYTE_LEN`] — maximum length of a single byte/string payload.
//! - [`MAX_FIELD_COUNT`] — maximum field or element count in a container.
//! - [`MAX_NEST_DEPTH`] — maximum container nesting depth.
//!
//! # Zero-panic guarantee
//!
//! Nothing in this module indexes without a prior bounds check; all
//! failures are reported via [`WireError`].

#[cfg(test)]
mod tests;

use thiserror::Error;

/// Maximum length in bytes of a single string or byte payload (64 MiB).
pub const MAX_BYTE_LEN: u32 = 64 * 1024 * 1024;

/// Maximum field or element count of a single container (1 M).
pub const MAX_FIELD_COUNT: u32 = 1024 * 1024;

/// Maximum nesting depth of container decoding.
pub const MAX_NEST_DEPTH: u32 = 64;

/// Errors produced while encoding or decoding wire data.
///
/// This is the crate's serialization error: any stored bucket or record
/// that fails to decode surfaces one of these variants.
#[derive(Debug, Error)]
pub enum WireError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A type tag was not recognised.
    #[error("invalid tag {tag} for {type_name}")]
    InvalidTag {
        /// The tag byte that was read.
        tag: u8,
        /// The type being decoded.
        type_name: &'static str,
    },

    /// A byte sequence decoded as a string was not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A length or count exceeded its safety limit.
    #[error("length overflow: {0}")]
    LengthOverflow(String),

    /// Nested containers exceeded [`MAX_NEST_DEPTH`].
    #[error("container nesting exceeds depth limit ({0})")]
    DepthExceeded(u32),

    /// A checksum trailer did not match the payload.
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch {
        /// Checksum read from the buffer.
        stored: u32,
        /// Checksum computed over the payload.
        computed: u32,
    },

    /// Decoding finished but bytes remained in the buffer.
    #[error("{0} trailing bytes after decode")]
    TrailingBytes(usize),

    /// A container decoded cleanly but violated its required shape.
    #[error("malformed container: {0}")]
    Malformed(&'static str),
}

// ------------------------------------------------------------------------------------------------
// Writers
// ------------------------------------------------------------------------------------------------

/// Append a single byte.
#[inline]
pub fn put_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

/// Append a `u32`, little-endian.
#[inline]
pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Append an `i64`, little-endian.
#[inline]
pub fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Append an `f64` as its IEEE-754 bit pattern, little-endian.
#[inline]
pub fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Append a length-prefixed byte payload: `[u32 len][bytes]`.
pub fn put_bytes(buf: &mut Vec<u8>, v: &[u8]) -> Result<(), WireError> {
    let len = u32::try_from(v.len())
        .map_err(|_| WireError::LengthOverflow(format!("payload of {} bytes", v.len())))?;
    put_u32(buf, len);
    buf.extend_from_slice(v);
    Ok(())
}

/// Append a length-prefixed UTF-8 string: `[u32 len][bytes]`.
#[inline]
pub fn put_str(buf: &mut Vec<u8>, v: &str) -> Result<(), WireError> {
    put_bytes(buf, v.as_bytes())
}

// ------------------------------------------------------------------------------------------------
// Reader
// ------------------------------------------------------------------------------------------------

/// Bounds-checked cursor over an encoded buffer.
///
/// Every `read_*` method verifies the remaining length first and returns
/// [`WireError::UnexpectedEof`] on truncation, so a corrupted buffer can
/// never cause a panic.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take the next `n` bytes as a slice, advancing the cursor.
    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEof {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.take(4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(arr))
    }

    /// Read a little-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(arr))
    }

    /// Read a little-endian IEEE-754 `f64`.
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(arr))
    }

    /// Read a `[u32 len][bytes]` payload, enforcing [`MAX_BYTE_LEN`].
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.read_u32()?;
        if len > MAX_BYTE_LEN {
            return Err(WireError::LengthOverflow(format!(
                "payload length {len} exceeds MAX_BYTE_LEN ({MAX_BYTE_LEN})"
            )));
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    /// Read a `[u32 len][bytes]` payload and validate it as UTF-8.
    pub fn read_str(&mut self) -> Result<String, WireError> {
        let raw = self.read_bytes()?;
        Ok(String::from_utf8(raw)?)
    }

    /// Read a `u32` element count, enforcing [`MAX_FIELD_COUNT`].
    pub fn read_count(&mut self) -> Result<usize, WireError> {
        let count = self.read_u32()?;
        if count > MAX_FIELD_COUNT {
            return Err(WireError::LengthOverflow(format!(
                "element count {count} exceeds MAX_FIELD_COUNT ({MAX_FIELD_COUNT})"
            )));
        }
        Ok(count as usize)
    }

    /// Fail with [`WireError::TrailingBytes`] unless the buffer is exhausted.
    pub fn expect_end(&self) -> Result<(), WireError> {
        if self.remaining() != 0 {
            return Err(WireError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}
