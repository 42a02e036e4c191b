use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sha1::{Digest as _, Sha1};
use tracing::{debug, warn};

use crate::cache::VerificationCache;
use crate::digest;
use crate::error::{EccError, Result};
use crate::header::{ChunkHeader, Digest};

const READ_BUF: usize = 1 << 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifyStats {
    pub chunks_hashed: u64,
    pub cache_hits: u64,
    pub failures: u64,
}

/// Checks a fragment's chunk hash, remembering successes for one
/// re-verification interval.
#[derive(Debug)]
pub struct ChunkVerifier {
    cache: VerificationCache,
    chunks_hashed: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
}

impl ChunkVerifier {
    pub fn new(reverify_interval: Duration) -> Self {
        Self {
            cache: VerificationCache::new(reverify_interval),
            chunks_hashed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    pub fn stats(&self) -> VerifyStats {
        VerifyStats {
            chunks_hashed: self.chunks_hashed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// `reader` must be positioned at the first byte after the header.
    pub fn verify<R: Read>(
        &self,
        reader: &mut R,
        header: &ChunkHeader,
        blocksize: u64,
        cache_key: &Path,
    ) -> bool {
        if self.cache.is_fresh(cache_key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(fragment = %cache_key.display(), "chunk verified recently, skipping hash");
            return true;
        }
        self.chunks_hashed.fetch_add(1, Ordering::Relaxed);
        match check_chunk(reader, header, blocksize, cache_key) {
            Ok(()) => {
                self.cache.record(cache_key);
                true
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(fragment = %cache_key.display(), error = %e, "chunk verification failed");
                false
            }
        }
    }
}

impl Default for ChunkVerifier {
    fn default() -> Self {
        Self::new(crate::cache::DEFAULT_REVERIFY_INTERVAL)
    }
}

/// Stream exactly `blocksize` bytes, confirm EOF, and return their SHA-1.
pub fn digest_block<R: Read>(reader: &mut R, blocksize: u64, path: &Path) -> Result<Digest> {
    let mut h = Sha1::new();
    let mut buf = vec![0u8; READ_BUF.min(blocksize.max(1) as usize)];
    let mut remaining = blocksize;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        reader
            .read_exact(&mut buf[..want])
            .map_err(|e| EccError::corrupt(path, format!("short read of block: {e}")))?;
        h.update(&buf[..want]);
        remaining -= want as u64;
    }
    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        return Err(EccError::corrupt(path, "unexpected bytes after block"));
    }
    Ok(digest::finish(h))
}

/// Full chunk-hash check without consulting any cache.
pub fn check_chunk<R: Read>(
    reader: &mut R,
    header: &ChunkHeader,
    blocksize: u64,
    path: &Path,
) -> Result<()> {
    let data_digest = digest_block(reader, blocksize, path)?;
    let expected = digest::chunk_hash(header, &data_digest)?;
    if expected != header.chunk_hash {
        return Err(EccError::corrupt(path, "chunk hash mismatch"));
    }
    Ok(())
}
