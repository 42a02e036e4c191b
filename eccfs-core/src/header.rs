//! Fixed 64-byte chunk header carried at the front of every fragment.
//!
//! Layout (all single bytes or raw digests, so no byte-order concerns):
//!
//! | offset | len | field                                    |
//! |--------|-----|------------------------------------------|
//! | 0      | 1   | version (always 1)                       |
//! | 1      | 1   | under_size                               |
//! | 2      | 1   | `(n << 3) \| ((m >> 2) & 0x7)`           |
//! | 3      | 1   | `((m & 0x3) << 6) \| chunk_index`        |
//! | 4      | 20  | file hash                                |
//! | 24     | 20  | cross-chunk hash                         |
//! | 44     | 20  | chunk hash                               |

use crate::error::{EccError, Result};

pub const HEADER_SIZE: usize = 64;
pub const HEADER_VERSION: u8 = 1;
pub const DIGEST_LEN: usize = 20;

/// Largest `n` or `m` representable in the 5-bit packed fields.
pub const MAX_FRAGMENTS: u32 = 31;

/// Bytes covered by the cross-chunk hash (everything through the file hash).
pub const CROSS_PREFIX_LEN: usize = 4 + DIGEST_LEN;
/// Bytes covered by the chunk hash (everything through the cross-chunk hash).
pub const CHUNK_PREFIX_LEN: usize = 4 + 2 * DIGEST_LEN;

pub type Digest = [u8; DIGEST_LEN];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub under_size: u8,
    pub n: u32,
    pub m: u32,
    pub chunk_index: u32,
    pub file_hash: Digest,
    pub cross_chunk_hash: Digest,
    pub chunk_hash: Digest,
}

/// Pack `(n, m, chunk_index)` into the two header bytes.
///
/// Out-of-range values are rejected rather than truncated.
pub fn pack_fields(n: u32, m: u32, chunk_index: u32) -> Result<[u8; 2]> {
    if n == 0 || n > MAX_FRAGMENTS || m > MAX_FRAGMENTS {
        return Err(EccError::InvalidArgument(format!(
            "n={n} m={m}: need 1 <= n <= {MAX_FRAGMENTS} and m <= {MAX_FRAGMENTS}"
        )));
    }
    if chunk_index >= n + m {
        return Err(EccError::InvalidArgument(format!(
            "chunk index {chunk_index} out of range for n={n} m={m}"
        )));
    }
    let a = ((n << 3) | ((m >> 2) & 0x7)) as u8;
    let b = (((m & 0x3) << 6) | chunk_index) as u8;
    let packed = [a, b];
    // A mismatch here is a bug in the bit layout, not bad input.
    assert_eq!(unpack_fields(packed), (n, m, chunk_index), "packed header fields do not round-trip");
    Ok(packed)
}

/// Inverse of [`pack_fields`]; returns `(n, m, chunk_index)`.
pub fn unpack_fields(packed: [u8; 2]) -> (u32, u32, u32) {
    let [a, b] = packed;
    let n = ((a >> 3) & 0x1F) as u32;
    let m = (((a & 0x07) << 2) | ((b >> 6) & 0x03)) as u32;
    let chunk_index = (b & 0x3F) as u32;
    (n, m, chunk_index)
}

impl ChunkHeader {
    pub fn new(n: u32, m: u32, chunk_index: u32, under_size: u8) -> Result<Self> {
        pack_fields(n, m, chunk_index)?;
        Ok(Self {
            under_size,
            n,
            m,
            chunk_index,
            file_hash: [0u8; DIGEST_LEN],
            cross_chunk_hash: [0u8; DIGEST_LEN],
            chunk_hash: [0u8; DIGEST_LEN],
        })
    }

    /// Data fragments are served directly; parity fragments only feed reconstruction.
    pub fn is_data(&self) -> bool {
        self.chunk_index < self.n
    }

    pub fn rows(&self) -> u32 {
        self.n + self.m
    }

    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let packed = pack_fields(self.n, self.m, self.chunk_index)?;
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = HEADER_VERSION;
        buf[1] = self.under_size;
        buf[2..4].copy_from_slice(&packed);
        buf[4..24].copy_from_slice(&self.file_hash);
        buf[24..44].copy_from_slice(&self.cross_chunk_hash);
        buf[44..64].copy_from_slice(&self.chunk_hash);
        Ok(buf)
    }

    /// Parse a header. Anything other than version 1, or packed fields that
    /// cannot describe a fragment, means "not an ecc fragment".
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(EccError::InvalidArgument(format!("short header: {} bytes", buf.len())));
        }
        if buf[0] != HEADER_VERSION {
            return Err(EccError::InvalidArgument(format!("unsupported header version {}", buf[0])));
        }
        let (n, m, chunk_index) = unpack_fields([buf[2], buf[3]]);
        if n == 0 {
            return Err(EccError::InvalidArgument("header declares n=0".to_string()));
        }
        if chunk_index >= n + m {
            return Err(EccError::InvalidArgument(format!(
                "chunk index {chunk_index} out of range for n={n} m={m}"
            )));
        }
        let mut file_hash = [0u8; DIGEST_LEN];
        file_hash.copy_from_slice(&buf[4..24]);
        let mut cross_chunk_hash = [0u8; DIGEST_LEN];
        cross_chunk_hash.copy_from_slice(&buf[24..44]);
        let mut chunk_hash = [0u8; DIGEST_LEN];
        chunk_hash.copy_from_slice(&buf[44..64]);
        Ok(Self { under_size: buf[1], n, m, chunk_index, file_hash, cross_chunk_hash, chunk_hash })
    }
}
