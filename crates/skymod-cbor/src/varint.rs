//! Unsigned LEB128 varints as used by multiformats.

/// Multiformats caps varints at 9 bytes (63 bits of payload).
pub const MAX_VARINT_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VarintError {
    #[error("varint truncated after {0} byte(s)")]
    Truncated(usize),
    #[error("varint longer than {MAX_VARINT_LEN} bytes")]
    Overflow,
    #[error("varint is not minimally encoded")]
    NotMinimal,
}

/// Read one varint from the front of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn read_uvarint(bytes: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().copied().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(VarintError::Overflow);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if byte == 0 && i > 0 {
                return Err(VarintError::NotMinimal);
            }
            return Ok((value, i + 1));
        }
    }
    Err(VarintError::Truncated(bytes.len()))
}

pub fn write_uvarint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}
