use std::collections::HashSet;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::CrossHashCache;
use crate::config::OverlayConfig;
use crate::error::{EccError, Result};
use crate::fragment::OpenFragment;
use crate::path_safety::{logical_key, resolve};
use crate::verify::{ChunkVerifier, VerifyStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl FileKind {
    fn of(ft: fs::FileType) -> Self {
        if ft.is_file() {
            FileKind::File
        } else if ft.is_dir() {
            FileKind::Directory
        } else if ft.is_symlink() {
            FileKind::Symlink
        } else {
            FileKind::Other
        }
    }
}

/// Which underlying directory answered a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Source {
    Import,
    Ecc { dir_index: usize },
}

#[derive(Clone, Debug, Serialize)]
pub struct FileAttr {
    pub kind: FileKind,
    /// Logical size: for ecc-backed files, the reconstructed size.
    pub size: u64,
    pub mode: u32,
    pub modified: Option<SystemTime>,
    pub source: Source,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// Open flags as delivered by the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenFlags(pub u32);

#[cfg(unix)]
mod oflag {
    pub const ACCMODE: u32 = libc::O_ACCMODE as u32;
    pub const RDONLY: u32 = libc::O_RDONLY as u32;
    pub const WRONLY: u32 = libc::O_WRONLY as u32;
    pub const RDWR: u32 = libc::O_RDWR as u32;
    pub const MODIFYING: u32 = (libc::O_CREAT | libc::O_TRUNC | libc::O_APPEND) as u32;
}

#[cfg(not(unix))]
mod oflag {
    pub const ACCMODE: u32 = 0o3;
    pub const RDONLY: u32 = 0;
    pub const WRONLY: u32 = 0o1;
    pub const RDWR: u32 = 0o2;
    pub const MODIFYING: u32 = 0o2000 | 0o1000 | 0o100;
}

impl OpenFlags {
    pub const ACCMODE: u32 = oflag::ACCMODE;
    pub const RDONLY: OpenFlags = OpenFlags(oflag::RDONLY);
    pub const WRONLY: OpenFlags = OpenFlags(oflag::WRONLY);
    pub const RDWR: OpenFlags = OpenFlags(oflag::RDWR);
    /// Creation, truncation and append bits.
    pub const MODIFYING: u32 = oflag::MODIFYING;

    pub fn with(self, bits: u32) -> Self {
        OpenFlags(self.0 | bits)
    }

    /// Read-only access mode with no bit that would create or change the file.
    /// Status bits such as large-file or close-on-exec are ignored.
    pub fn is_read_only(&self) -> bool {
        self.0 & Self::ACCMODE == oflag::RDONLY && self.0 & Self::MODIFYING == 0
    }

    fn options(&self) -> OpenOptions {
        let mut o = OpenOptions::new();
        match self.0 & Self::ACCMODE {
            oflag::RDONLY => o.read(true),
            oflag::WRONLY => o.write(true),
            _ => o.read(true).write(true),
        };
        o
    }
}

#[cfg(unix)]
fn mode_of(md: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    md.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(md: &Metadata) -> u32 {
    let base = if md.is_dir() { 0o755 } else { 0o644 };
    if md.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

fn attr(md: &Metadata, size: u64, source: Source) -> FileAttr {
    FileAttr {
        kind: FileKind::of(md.file_type()),
        size,
        mode: mode_of(md),
        modified: md.modified().ok(),
        source,
    }
}

/// Serves getattr/open/read/readdir over the import dir and the ecc dirs.
///
/// Holds no file handles between calls; each operation opens what it needs
/// and drops it before returning.
pub struct OverlayReadEngine {
    config: OverlayConfig,
    verifier: ChunkVerifier,
    cross: CrossHashCache,
}

impl OverlayReadEngine {
    pub fn new(config: OverlayConfig) -> Result<Self> {
        config.validate()?;
        let verifier = ChunkVerifier::new(config.reverify_interval());
        Ok(Self { config, verifier, cross: CrossHashCache::new() })
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn stats(&self) -> VerifyStats {
        self.verifier.stats()
    }

    fn import_path(&self, path: &str) -> Result<PathBuf> {
        resolve(&self.config.import_dir, path)
    }

    fn ecc_paths(&self, path: &str) -> Result<Vec<PathBuf>> {
        self.config.ecc_dirs.iter().map(|d| resolve(d, path)).collect()
    }

    pub fn getattr(&self, path: &str) -> Result<FileAttr> {
        match fs::symlink_metadata(self.import_path(path)?) {
            Ok(md) => return Ok(attr(&md, md.len(), Source::Import)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let key = logical_key(path);
        let mut unverified = None;
        for (dir_index, p) in self.ecc_paths(path)?.into_iter().enumerate() {
            let md = match fs::symlink_metadata(&p) {
                Ok(md) => md,
                Err(e) => {
                    if e.kind() != ErrorKind::NotFound {
                        warn!(path = %p.display(), error = %e, "stat failed in ecc dir");
                    }
                    continue;
                }
            };
            let source = Source::Ecc { dir_index };
            if md.is_dir() {
                return Ok(attr(&md, md.len(), source));
            }
            if !md.is_file() {
                continue;
            }
            let mut frag = match OpenFragment::open(&p) {
                Ok(f) => f,
                Err(e) => {
                    debug!(path = %p.display(), error = %e, "not a usable fragment");
                    continue;
                }
            };
            let mut a = attr(&md, frag.geometry.orig_size, source);
            a.mode &= !0o222;
            if self.admit(&key, &p, &mut frag) {
                return Ok(a);
            }
            unverified.get_or_insert(a);
        }
        match unverified {
            Some(a) => {
                warn!(path, "no fragment verified; size taken from an unverified header");
                Ok(a)
            }
            None => Err(EccError::NotFound(path.to_string())),
        }
    }

    /// Existence probe. Ecc-backed paths only accept plain read-only access.
    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<Source> {
        let import = self.import_path(path)?;
        match fs::symlink_metadata(&import) {
            Ok(_) => {
                drop(flags.options().open(&import)?);
                return Ok(Source::Import);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        for (dir_index, p) in self.ecc_paths(path)?.into_iter().enumerate() {
            match File::open(&p) {
                Ok(_) if !flags.is_read_only() => {
                    return Err(EccError::InvalidArgument(format!(
                        "{path}: ecc-backed files only open read-only (flags {:#o})",
                        flags.0
                    )));
                }
                Ok(_) => return Ok(Source::Ecc { dir_index }),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => debug!(path = %p.display(), error = %e, "open failed in ecc dir"),
            }
        }
        Err(EccError::NotFound(path.to_string()))
    }

    /// Read up to `buf.len()` bytes at `offset`; returns the count, 0 at EOF.
    ///
    /// The import dir always wins. Otherwise each step serves bytes from the
    /// one data fragment covering `offset`; parity never supplies bytes.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        match File::open(self.import_path(path)?) {
            Ok(mut f) => {
                debug!(path, offset, size = buf.len(), "read from import dir");
                return read_full_at(&mut f, offset, buf);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.read_ecc(path, buf, offset)
    }

    fn read_ecc(&self, path: &str, buf: &mut [u8], start: u64) -> Result<usize> {
        let key = logical_key(path);
        let candidates = self.ecc_paths(path)?;
        let mut copied = 0usize;
        let mut offset = start;
        let mut seen_any = false;

        while copied < buf.len() {
            let mut progressed = false;
            let mut at_eof = false;
            for p in &candidates {
                let mut frag = match OpenFragment::open(p) {
                    Ok(f) => f,
                    Err(EccError::Io(e)) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => {
                        seen_any = true;
                        debug!(path = %p.display(), error = %e, "skipping fragment");
                        continue;
                    }
                };
                seen_any = true;
                let g = frag.geometry;
                let h = frag.header;
                // only a verified header may end the file
                let past_end = offset >= g.orig_size;
                if !past_end && (!h.is_data() || h.chunk_index as u64 != offset / g.blocksize) {
                    continue;
                }
                if !self.admit(&key, p, &mut frag) {
                    continue;
                }
                if past_end {
                    at_eof = true;
                    break;
                }

                let within = offset - g.chunk_start(h.chunk_index);
                let avail = (g.blocksize - within).min(g.orig_size - offset);
                let amt = ((buf.len() - copied) as u64).min(avail) as usize;
                if let Err(e) = frag.read_block_at(within, &mut buf[copied..copied + amt]) {
                    debug!(path = %p.display(), error = %e, "fragment read failed");
                    continue;
                }
                copied += amt;
                offset += amt as u64;
                progressed = true;
                break;
            }
            if at_eof {
                break;
            }
            if !progressed {
                if !seen_any {
                    return Err(EccError::NotFound(path.to_string()));
                }
                return Err(EccError::ReadFailed { path: path.to_string(), offset });
            }
        }
        Ok(copied)
    }

    /// Chunk hash checked (or recently checked) and cross-chunk hash bound for `key`.
    fn admit(&self, key: &str, p: &Path, frag: &mut OpenFragment) -> bool {
        let h = frag.header;
        if self.cross.expected(key).is_some_and(|e| e != h.cross_chunk_hash) {
            warn!(path = %p.display(), "cross-chunk hash differs from earlier fragments");
            return false;
        }
        if !self.verifier.verify(&mut frag.file, &h, frag.geometry.blocksize, p) {
            return false;
        }
        if !self.cross.bind(key, &h.cross_chunk_hash) {
            warn!(path = %p.display(), "cross-chunk hash changed during read");
            return false;
        }
        true
    }

    /// Merge listings by name: import dir first, then ecc dirs in order.
    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let mut roots = vec![self.import_path(path)?];
        roots.extend(self.ecc_paths(path)?);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut listed_any = false;
        for dir in roots {
            let rd = match fs::read_dir(&dir) {
                Ok(rd) => rd,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            listed_any = true;
            for ent in rd {
                let ent = ent?;
                let name = ent.file_name().to_string_lossy().into_owned();
                if seen.insert(name.clone()) {
                    out.push(DirEntry { name, kind: FileKind::of(ent.file_type()?) });
                }
            }
        }
        if !listed_any {
            return Err(EccError::NotFound(path.to_string()));
        }
        Ok(out)
    }

    /// Forget cached verification state for `path`, e.g. after a fresh import.
    pub fn invalidate(&self, path: &str) -> Result<()> {
        for p in self.ecc_paths(path)? {
            self.verifier.cache().invalidate(&p);
        }
        self.cross.invalidate(&logical_key(path));
        Ok(())
    }

    pub fn invalidate_all(&self) {
        self.verifier.cache().clear();
        self.cross.clear();
    }
}

fn read_full_at(f: &mut File, offset: u64, buf: &mut [u8]) -> Result<usize> {
    f.seek(SeekFrom::Start(offset))?;
    let mut total = 0;
    while total < buf.len() {
        match f.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(k) => total += k,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}
