//! Binary encoding primitives shared by the DHCP and TFTP encoders.
//!
//! Fixed-size packets are written with [`copy_into`], which chains by
//! accumulating the returned byte counts into an offset. Variable-size
//! option blocks grow a `Vec<u8>` through the `put_*` appenders, where
//! [`put_bounded`] carries the truncation rules of the vendor options.

use crate::error::BoundsError;

/// Copies `length` bytes from `src[src_offset..]` into `dst[dst_offset..]`.
///
/// Returns `length` on success so that sequential writes can be chained:
///
/// ```
/// use pxe_server::codec::copy_into;
///
/// let mut buf = [0u8; 4];
/// let mut offset = 0;
/// offset += copy_into(&[1, 2], 0, &mut buf, offset, 2)?;
/// offset += copy_into(&[3, 4], 0, &mut buf, offset, 2)?;
/// assert_eq!((offset, buf), (4, [1, 2, 3, 4]));
/// # Ok::<(), pxe_server::BoundsError>(())
/// ```
///
/// # Errors
///
/// Returns [`BoundsError`] when either range runs past the end of its buffer.
/// Nothing is written in that case.
pub fn copy_into(
    src: &[u8],
    src_offset: usize,
    dst: &mut [u8],
    dst_offset: usize,
    length: usize,
) -> Result<usize, BoundsError> {
    let out_of_bounds = || BoundsError {
        src_offset,
        src_len: src.len(),
        dst_offset,
        dst_len: dst.len(),
        length,
    };

    let src_end = src_offset.checked_add(length).ok_or_else(out_of_bounds)?;
    let dst_end = dst_offset.checked_add(length).ok_or_else(out_of_bounds)?;
    if src_end > src.len() || dst_end > dst.len() {
        return Err(out_of_bounds());
    }

    dst[dst_offset..dst_end].copy_from_slice(&src[src_offset..src_end]);
    Ok(length)
}

/// Appends at most `max` bytes of `src` to `dst` and returns how many were written.
pub fn put_bounded(dst: &mut Vec<u8>, src: &[u8], max: usize) -> usize {
    let n = src.len().min(max);
    dst.extend_from_slice(&src[..n]);
    n
}

pub fn put_u16_le(dst: &mut Vec<u8>, value: u16) -> usize {
    dst.extend_from_slice(&value.to_le_bytes());
    2
}

pub fn put_u32_le(dst: &mut Vec<u8>, value: u32) -> usize {
    dst.extend_from_slice(&value.to_le_bytes());
    4
}

/// Lossy ASCII encoding; anything outside 7-bit ASCII becomes `?`.
#[must_use]
pub fn ascii_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_into_chains_offsets() {
        let mut dst = [0u8; 6];
        let mut offset = 0;
        offset += copy_into(b"abc", 0, &mut dst, offset, 3).unwrap();
        offset += copy_into(b"xyz", 1, &mut dst, offset, 2).unwrap();
        assert_eq!(offset, 5);
        assert_eq!(&dst, b"abcyz\0");
    }

    #[test]
    fn test_copy_into_rejects_source_overrun() {
        let mut dst = [0u8; 8];
        let err = copy_into(b"abc", 2, &mut dst, 0, 2).unwrap_err();
        assert_eq!(err.src_len, 3);
        assert_eq!(dst, [0u8; 8], "Nothing should be written on failure");
    }

    #[test]
    fn test_copy_into_rejects_destination_overrun() {
        let mut dst = [0u8; 2];
        assert!(copy_into(b"abc", 0, &mut dst, 0, 3).is_err());
        assert!(copy_into(b"a", 0, &mut dst, usize::MAX, 1).is_err());
    }

    #[test]
    fn test_copy_into_zero_length_at_end() {
        let mut dst = [0u8; 2];
        assert_eq!(copy_into(b"", 0, &mut dst, 2, 0).unwrap(), 0);
    }

    #[test]
    fn test_put_bounded_truncates() {
        let mut buf = vec![9];
        assert_eq!(put_bounded(&mut buf, b"hello", 3), 3);
        assert_eq!(put_bounded(&mut buf, b"ok", 10), 2);
        assert_eq!(buf, b"\x09helok");
    }

    #[test]
    fn test_little_endian_appenders() {
        let mut buf = Vec::new();
        put_u16_le(&mut buf, 0x0102);
        put_u32_le(&mut buf, 7);
        assert_eq!(buf, [0x02, 0x01, 7, 0, 0, 0]);
    }

    #[test]
    fn test_ascii_bytes_replaces_non_ascii() {
        assert_eq!(ascii_bytes("Ab-é"), b"Ab-?");
    }
}
