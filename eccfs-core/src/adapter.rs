//! Request-level binding of the overlay engine.
//!
//! A filesystem front end hands every request to [`ReadOnlyAdapter`] and
//! replies with the errno from [`to_errno`]. Only the four read operations
//! reach the engine; everything that would mutate state is refused.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{EccError, Result};
use crate::overlay::{DirEntry, FileAttr, OpenFlags, OverlayReadEngine, Source};

/// Collapse an engine result into the errno-style reply a kernel expects.
pub fn to_errno<T>(r: Result<T>) -> std::result::Result<T, i32> {
    r.map_err(|e| {
        debug!(error = %e, errno = e.errno(), "request failed");
        e.errno()
    })
}

fn refuse<T>(op: &'static str, path: &str) -> Result<T> {
    debug!(op, path, "mutating request refused");
    Err(EccError::UnsupportedOperation(op))
}

#[derive(Clone)]
pub struct ReadOnlyAdapter {
    engine: Arc<OverlayReadEngine>,
}

impl ReadOnlyAdapter {
    pub fn new(engine: Arc<OverlayReadEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &OverlayReadEngine {
        &self.engine
    }

    pub fn getattr(&self, path: &str) -> Result<FileAttr> {
        self.engine.getattr(path)
    }

    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<Source> {
        self.engine.open(path, flags)
    }

    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.engine.read(path, buf, offset)
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.engine.readdir(path)
    }

    pub fn write(&self, path: &str, _data: &[u8], _offset: u64) -> Result<usize> {
        refuse("write", path)
    }

    pub fn mknod(&self, path: &str, _mode: u32) -> Result<()> {
        refuse("mknod", path)
    }

    pub fn mkdir(&self, path: &str, _mode: u32) -> Result<()> {
        refuse("mkdir", path)
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        refuse("unlink", path)
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        refuse("rmdir", path)
    }

    pub fn symlink(&self, _target: &Path, link: &str) -> Result<()> {
        refuse("symlink", link)
    }

    pub fn rename(&self, from: &str, _to: &str) -> Result<()> {
        refuse("rename", from)
    }

    pub fn link(&self, from: &str, _to: &str) -> Result<()> {
        refuse("link", from)
    }

    pub fn chmod(&self, path: &str, _mode: u32) -> Result<()> {
        refuse("chmod", path)
    }

    pub fn chown(&self, path: &str, _uid: u32, _gid: u32) -> Result<()> {
        refuse("chown", path)
    }

    pub fn truncate(&self, path: &str, _size: u64) -> Result<()> {
        refuse("truncate", path)
    }

    pub fn utime(&self, path: &str, _atime: u64, _mtime: u64) -> Result<()> {
        refuse("utime", path)
    }
}
