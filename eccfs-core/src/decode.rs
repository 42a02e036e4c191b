use std::io::Write;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::digest;
use crate::error::{EccError, Result};
use crate::fragment::{fragment_path, FragmentGeometry, OpenFragment, MAX_FRAGMENT_ROW};
use crate::galois;
use crate::header::{ChunkHeader, Digest};
use crate::matrix::{condense, dispersal_matrix, invert};
use crate::report::DecodeSummary;

/// A fully verified reconstruction, held in memory until the caller emits it.
pub struct Decoded {
    pub data: Vec<u8>,
    pub summary: DecodeSummary,
}

struct ValidRow {
    header: ChunkHeader,
    geometry: FragmentGeometry,
    data_digest: Digest,
    block: Vec<u8>,
}

/// What a fragment claims about the encoding it belongs to.
#[derive(Clone, Copy, PartialEq, Eq)]
struct EncodingKey {
    file_hash: Digest,
    cross_chunk_hash: Digest,
    n: u32,
    m: u32,
    geometry: FragmentGeometry,
}

impl ValidRow {
    fn key(&self) -> EncodingKey {
        EncodingKey {
            file_hash: self.header.file_hash,
            cross_chunk_hash: self.header.cross_chunk_hash,
            n: self.header.n,
            m: self.header.m,
            geometry: self.geometry,
        }
    }
}

pub struct Decoder;

impl Decoder {
    /// Reconstruct the original file from the fragments under `stem`.
    ///
    /// Nothing is returned unless the output matches the file hash, so a
    /// failed decode never yields partial data.
    pub fn decode(stem: &Path) -> Result<Decoded> {
        // Load every row that passes its own checks, whatever encoding it claims.
        let mut loaded: Vec<Option<ValidRow>> = Vec::new();
        let mut present = false;
        let mut needed_hint = None;
        for row in 0..=MAX_FRAGMENT_ROW {
            let path = fragment_path(stem, row);
            let frag = match OpenFragment::open(&path) {
                Ok(f) => f,
                Err(EccError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    loaded.push(None);
                    continue;
                }
                Err(e) => {
                    present = true;
                    warn!(fragment = %path.display(), error = %e, "unusable header");
                    loaded.push(None);
                    continue;
                }
            };
            present = true;
            needed_hint.get_or_insert(frag.header.n as usize);
            match load_row(frag, row) {
                Ok(v) => loaded.push(Some(v)),
                Err(e) => {
                    warn!(fragment = %path.display(), error = %e, "ignoring fragment");
                    loaded.push(None);
                }
            }
        }
        if !present {
            return Err(EccError::NotFound(format!("{}-NNNN.rs", stem.display())));
        }

        // The encoding with the most verified rows wins; ties go to the lowest row.
        let mut groups: Vec<(EncodingKey, Vec<usize>)> = Vec::new();
        for (row, v) in loaded.iter().enumerate() {
            let Some(v) = v else { continue };
            let key = v.key();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(row),
                None => groups.push((key, vec![row])),
            }
        }
        let mut best: Option<(EncodingKey, Vec<usize>)> = None;
        for g in groups {
            if best.as_ref().map_or(true, |b| g.1.len() > b.1.len()) {
                best = Some(g);
            }
        }
        let Some((key, members)) = best else {
            return Err(EccError::InsufficientFragments { found: 0, needed: needed_hint.unwrap_or(1) });
        };

        let (n, m) = (key.n as usize, key.m as usize);
        let rows = n + m;
        let geometry = key.geometry;
        info!(stem = %stem.display(), orig_size = geometry.orig_size, n, m, "decoding");

        let mut valid: Vec<Option<ValidRow>> = Vec::with_capacity(rows);
        for (row, v) in loaded.into_iter().enumerate() {
            match v {
                Some(v) if members.contains(&row) => valid.push(Some(v)),
                Some(_) => {
                    let path = fragment_path(stem, row);
                    warn!(fragment = %path.display(), "fragment belongs to a different encoding, ignoring");
                    if row < rows {
                        valid.push(None);
                    }
                }
                None if row < rows => {
                    debug!(fragment = %fragment_path(stem, row).display(), "no usable fragment for row");
                    valid.push(None);
                }
                None => {}
            }
        }

        let found = members.len();
        if found < n {
            return Err(EccError::InsufficientFragments { found, needed: n });
        }
        let valid_rows: Vec<u32> =
            (0..rows).filter(|&r| valid[r].is_some()).map(|r| r as u32).collect();

        let cross_chunk_verified = if found == rows {
            let rows_iter = valid.iter().flatten().map(|v| (&v.header, &v.data_digest));
            if digest::cross_chunk_hash(rows_iter)? != key.cross_chunk_hash {
                return Err(EccError::corrupt(stem, "cross-chunk hash mismatch across fragments"));
            }
            true
        } else {
            false
        };
        let file_hash = key.file_hash;

        // Only the first n valid rows take part in reconstruction.
        let mut exists = vec![false; rows];
        let mut taken = 0;
        for (r, v) in valid.iter().enumerate() {
            if v.is_some() && taken < n {
                exists[r] = true;
                taken += 1;
            }
        }
        let missing: Vec<u32> = (0..n).filter(|&r| !exists[r]).map(|r| r as u32).collect();

        let by_row: Vec<Option<Vec<u8>>> = valid
            .into_iter()
            .zip(&exists)
            .map(|(v, &e)| if e { v.map(|v| v.block) } else { None })
            .collect();

        let data = if missing.is_empty() {
            concat_blocks(by_row.into_iter().take(n).flatten(), geometry.orig_size)
        } else {
            info!(missing = ?missing, "reconstructing data fragments from parity");
            reconstruct(by_row, &exists, n, &geometry)?
        };

        if digest::sha1(&data) != file_hash {
            return Err(EccError::FileHashMismatch { expected: digest::to_hex(&file_hash) });
        }

        Ok(Decoded {
            data,
            summary: DecodeSummary {
                n: n as u32,
                m: m as u32,
                orig_size: geometry.orig_size,
                blocksize: geometry.blocksize,
                valid_rows,
                reconstructed_rows: missing,
                cross_chunk_verified,
                file_hash_hex: digest::to_hex(&file_hash),
            },
        })
    }

    /// Decode and write the verified bytes to `out`.
    pub fn decode_to<W: Write>(stem: &Path, out: &mut W) -> Result<DecodeSummary> {
        let decoded = Self::decode(stem)?;
        out.write_all(&decoded.data)?;
        out.flush()?;
        Ok(decoded.summary)
    }
}

fn load_row(mut frag: OpenFragment, row: usize) -> Result<ValidRow> {
    let h = frag.header;
    if h.chunk_index as usize != row {
        return Err(EccError::corrupt(
            &frag.path,
            format!("header chunk={} does not match row {row}", h.chunk_index),
        ));
    }
    let block = frag.read_block()?;
    let data_digest = digest::sha1(&block);
    if digest::chunk_hash(&h, &data_digest)? != h.chunk_hash {
        return Err(EccError::corrupt(&frag.path, "chunk hash mismatch"));
    }
    Ok(ValidRow { header: h, geometry: frag.geometry, data_digest, block })
}

fn concat_blocks<I: IntoIterator<Item = Vec<u8>>>(blocks: I, orig_size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(orig_size as usize);
    for b in blocks {
        let take = (orig_size as usize - out.len()).min(b.len());
        out.extend_from_slice(&b[..take]);
    }
    out
}

/// Rebuild missing data blocks from the condensed, inverted dispersal matrix.
///
/// `by_row[r]` holds the block of original row `r` for every row marked in
/// `exists`. Blocks are rearranged into condensed-row order and scaled in
/// place; `factors[i]` remembers the scale currently applied to `blocks[i]`
/// so successive coefficients only cost one rescale each.
fn reconstruct(
    mut by_row: Vec<Option<Vec<u8>>>,
    exists: &[bool],
    n: usize,
    geometry: &FragmentGeometry,
) -> Result<Vec<u8>> {
    let vdm = dispersal_matrix(exists.len(), n)?;
    let cm = condense(&vdm, exists)?;
    let inv = invert(&cm.matrix)?;

    let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(n);
    for &r in &cm.row_identities {
        let block = by_row[r].take().ok_or(EccError::InsufficientFragments {
            found: blocks.len(),
            needed: n,
        })?;
        blocks.push(block);
    }

    let blocksize = geometry.blocksize as usize;
    let mut factors = vec![1u8; n];
    let mut out = Vec::with_capacity(geometry.orig_size as usize);
    let mut acc = vec![0u8; blocksize];
    for i in 0..n {
        let remaining = geometry.orig_size as usize - out.len();
        if remaining == 0 {
            break;
        }
        let take = remaining.min(blocksize);
        if cm.row_identities[i] < n {
            if factors[i] != 1 {
                let undo = galois::inv(factors[i])?;
                galois::mul_region(&mut blocks[i], undo);
                factors[i] = 1;
            }
            out.extend_from_slice(&blocks[i][..take]);
        } else {
            acc.fill(0);
            for j in 0..n {
                let coef = inv.get(i, j);
                if coef == 0 {
                    continue;
                }
                let factor = galois::div(coef, factors[j])?;
                factors[j] = coef;
                galois::mul_region(&mut blocks[j], factor);
                galois::add_region(&blocks[j], &mut acc);
            }
            debug!(row = i, "data block reconstructed");
            out.extend_from_slice(&acc[..take]);
        }
    }
    Ok(out)
}
