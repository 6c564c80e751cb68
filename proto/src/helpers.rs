//! Shared field encoding helpers

use crate::ProtoError;

/// Encode a length-prefixed (u8) string into the provided buffer
pub(crate) fn put_str(buff: &mut [u8], s: &str) -> Result<usize, ProtoError> {
    let b = s.as_bytes();

    if b.len() > u8::MAX as usize {
        return Err(ProtoError::InvalidLength);
    }
    if buff.len() < 1 + b.len() {
        return Err(ProtoError::InvalidLength);
    }

    buff[0] = b.len() as u8;
    buff[1..][..b.len()].copy_from_slice(b);

    Ok(1 + b.len())
}

/// Decode a length-prefixed (u8) string from the provided buffer
pub(crate) fn get_str(buff: &[u8]) -> Result<(&str, usize), ProtoError> {
    if buff.is_empty() {
        return Err(ProtoError::InvalidLength);
    }

    let n = buff[0] as usize;
    if buff.len() < 1 + n {
        return Err(ProtoError::InvalidLength);
    }

    let s = core::str::from_utf8(&buff[1..][..n]).map_err(|_| ProtoError::Utf8)?;

    Ok((s, 1 + n))
}

/// Encoded length of a length-prefixed string
pub(crate) fn str_len(s: &str) -> usize {
    1 + s.len()
}

/// Encode a little-endian u32 into the provided buffer
pub(crate) fn put_u32(buff: &mut [u8], v: u32) -> Result<usize, ProtoError> {
    if buff.len() < 4 {
        return Err(ProtoError::InvalidLength);
    }

    buff[..4].copy_from_slice(&v.to_le_bytes());

    Ok(4)
}

/// Decode a little-endian u32 from the provided buffer
pub(crate) fn get_u32(buff: &[u8]) -> Result<(u32, usize), ProtoError> {
    if buff.len() < 4 {
        return Err(ProtoError::InvalidLength);
    }

    let v = u32::from_le_bytes([buff[0], buff[1], buff[2], buff[3]]);

    Ok((v, 4))
}
