//! SHA-1 hash chain binding fragments together.
//!
//! - data digest: `H(block)`
//! - cross-chunk hash: `H(header_i[..24] || data_digest_i ...)` over every row
//! - chunk hash: `H(header[..44] || data_digest)`

use sha1::{Digest as _, Sha1};

use crate::error::Result;
use crate::header::{ChunkHeader, Digest, CHUNK_PREFIX_LEN, CROSS_PREFIX_LEN, DIGEST_LEN};

pub fn sha1(data: &[u8]) -> Digest {
    let mut h = Sha1::new();
    h.update(data);
    finish(h)
}

pub(crate) fn finish(h: Sha1) -> Digest {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&h.finalize());
    out
}

/// Final chunk hash of a header given the digest of its block.
pub fn chunk_hash(header: &ChunkHeader, data_digest: &Digest) -> Result<Digest> {
    let bytes = header.to_bytes()?;
    let mut h = Sha1::new();
    h.update(&bytes[..CHUNK_PREFIX_LEN]);
    h.update(data_digest);
    Ok(finish(h))
}

/// Cross-chunk hash over `(header, data digest)` pairs in row order.
pub fn cross_chunk_hash<'a, I>(rows: I) -> Result<Digest>
where
    I: IntoIterator<Item = (&'a ChunkHeader, &'a Digest)>,
{
    let mut h = Sha1::new();
    for (header, data_digest) in rows {
        let bytes = header.to_bytes()?;
        h.update(&bytes[..CROSS_PREFIX_LEN]);
        h.update(data_digest);
    }
    Ok(finish(h))
}

pub fn to_hex(digest: &Digest) -> String {
    const_hex::encode(digest)
}
