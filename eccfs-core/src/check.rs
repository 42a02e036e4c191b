//! Offline consistency check of the ecc directory trees.
//!
//! Every logical file is expected to have one fragment per ecc directory,
//! all from the same encoding. The check reads every byte, so it is meant
//! for scheduled maintenance rather than the read path.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sha1::{Digest as _, Sha1};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::digest;
use crate::error::{EccError, Result};
use crate::fragment::OpenFragment;
use crate::header::{ChunkHeader, Digest};
use crate::path_safety::resolve;
use crate::report::{CheckReport, FileCheck};
use crate::verify::digest_block;

struct Checked {
    path: PathBuf,
    header: ChunkHeader,
    blocksize: u64,
    orig_size: u64,
    data_digest: Digest,
}

/// Check one logical file (e.g. `docs/a.txt`) across `ecc_dirs`.
pub fn check_path(ecc_dirs: &[PathBuf], logical: &str) -> FileCheck {
    let mut fc = FileCheck { path: logical.to_string(), ..Default::default() };
    let mut good: Vec<Checked> = Vec::new();

    for dir in ecc_dirs {
        let p = match resolve(dir, logical) {
            Ok(p) => p,
            Err(e) => {
                fc.problems.push(e.to_string());
                return fc;
            }
        };
        match check_fragment(&p) {
            Ok(c) => {
                fc.fragments += 1;
                good.push(c);
            }
            Err(EccError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                fc.fragments += 1;
                fc.problems.push(e.to_string());
            }
        }
    }

    let Some(first) = good.first() else {
        if fc.fragments == 0 {
            fc.problems.push("no fragments found".to_string());
        }
        return fc;
    };
    let reference = first.header;
    fc.n = reference.n;
    fc.m = reference.m;

    let mut consistent = true;
    let mut indices = HashSet::new();
    for c in &good {
        let h = &c.header;
        if h.n != reference.n
            || h.m != reference.m
            || h.under_size != reference.under_size
            || c.blocksize != first.blocksize
        {
            fc.problems.push(format!("{}: geometry differs from {}", c.path.display(), first.path.display()));
            consistent = false;
        }
        if h.file_hash != reference.file_hash || h.cross_chunk_hash != reference.cross_chunk_hash {
            fc.problems.push(format!("{}: belongs to a different encoding", c.path.display()));
            consistent = false;
        }
        if !indices.insert(h.chunk_index) {
            fc.problems.push(format!("{}: duplicate chunk index {}", c.path.display(), h.chunk_index));
            consistent = false;
        }
    }
    if !consistent {
        return fc;
    }

    let rows = reference.rows();
    fc.missing_rows = (0..rows).filter(|r| !indices.contains(r)).collect();
    if (good.len() as u32) < reference.n {
        fc.problems.push(format!(
            "only {} of {} needed fragments are valid; file is not recoverable",
            good.len(),
            reference.n
        ));
        return fc;
    }

    good.sort_by_key(|c| c.header.chunk_index);
    if good.len() as u32 == rows {
        match digest::cross_chunk_hash(good.iter().map(|c| (&c.header, &c.data_digest))) {
            Ok(cross) if cross == reference.cross_chunk_hash => fc.cross_chunk_verified = true,
            Ok(_) => fc.problems.push("cross-chunk hash mismatch".to_string()),
            Err(e) => fc.problems.push(e.to_string()),
        }
    }

    let data: Vec<&Checked> = good.iter().filter(|c| c.header.is_data()).collect();
    if data.len() as u32 == reference.n {
        match file_digest(&data) {
            Ok(d) if d == reference.file_hash => fc.file_hash_verified = true,
            Ok(_) => fc.problems.push("file hash mismatch over data fragments".to_string()),
            Err(e) => fc.problems.push(e.to_string()),
        }
    }
    fc
}

fn check_fragment(path: &Path) -> Result<Checked> {
    let mut frag = OpenFragment::open(path)?;
    let g = frag.geometry;
    let data_digest = digest_block(&mut frag.file, g.blocksize, path)?;
    if digest::chunk_hash(&frag.header, &data_digest)? != frag.header.chunk_hash {
        return Err(EccError::corrupt(path, "chunk hash mismatch"));
    }
    debug!(fragment = %path.display(), chunk = frag.header.chunk_index, "fragment ok");
    Ok(Checked {
        path: path.to_path_buf(),
        header: frag.header,
        blocksize: g.blocksize,
        orig_size: g.orig_size,
        data_digest,
    })
}

// `data` is sorted by chunk index and holds exactly the n data rows.
fn file_digest(data: &[&Checked]) -> Result<Digest> {
    let mut h = Sha1::new();
    let mut remaining = data.first().map_or(0, |c| c.orig_size);
    for c in data {
        let block = OpenFragment::open(&c.path)?.read_block()?;
        let take = remaining.min(block.len() as u64) as usize;
        h.update(&block[..take]);
        remaining -= take as u64;
    }
    Ok(digest::finish(h))
}

/// Walk the union of the ecc trees and check every logical file in parallel.
pub fn check_tree(ecc_dirs: &[PathBuf]) -> Result<CheckReport> {
    if ecc_dirs.is_empty() {
        return Err(EccError::InvalidArgument("at least one eccdir is required".to_string()));
    }
    let mut tree_problems = Vec::new();
    let mut dirs: BTreeMap<PathBuf, BTreeSet<usize>> = BTreeMap::new();
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    for (i, root) in ecc_dirs.iter().enumerate() {
        if !root.is_dir() {
            tree_problems.push(format!("ecc dir {} is missing", root.display()));
            continue;
        }
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                EccError::Io(e.into_io_error().unwrap_or_else(|| ErrorKind::Other.into()))
            })?;
            let Some(rel) = pathdiff::diff_paths(entry.path(), root) else {
                continue;
            };
            if entry.file_type().is_dir() {
                dirs.entry(rel).or_default().insert(i);
            } else if entry.file_type().is_file() {
                files.insert(rel);
            }
        }
    }

    for (rel, present) in &dirs {
        for (i, root) in ecc_dirs.iter().enumerate() {
            if !present.contains(&i) && root.is_dir() {
                tree_problems.push(format!(
                    "hierarchy not parallel: {} missing from {}",
                    rel.display(),
                    root.display()
                ));
            }
        }
    }

    let logical: Vec<String> = files.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    info!(files = logical.len(), ecc_dirs = ecc_dirs.len(), "checking ecc trees");
    let results: Vec<FileCheck> = logical.par_iter().map(|l| check_path(ecc_dirs, l)).collect();

    let files_bad = results.iter().filter(|f| !f.ok()).count();
    for f in results.iter().filter(|f| !f.ok()) {
        warn!(path = %f.path, problems = ?f.problems, "file failed check");
    }
    Ok(CheckReport {
        checked_utc: chrono::Utc::now().to_rfc3339(),
        ecc_dirs: ecc_dirs.iter().map(|d| d.to_string_lossy().into_owned()).collect(),
        files_ok: results.len() - files_bad,
        files_bad,
        tree_problems,
        files: results,
    })
}
