use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{EccError, Result};
use crate::header::{ChunkHeader, HEADER_SIZE};

/// Highest fragment row the naming scheme (and the decoder's scan) allows.
pub const MAX_FRAGMENT_ROW: usize = 254;

/// Standard fragment filename for `row`: `<stem>-NNNN.rs`.
pub fn fragment_path(stem: &Path, row: usize) -> PathBuf {
    let mut s = OsString::from(stem.as_os_str());
    s.push(format!("-{:04}.rs", row));
    PathBuf::from(s)
}

/// Sizes derived from a fragment's on-disk length and header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentGeometry {
    /// Payload bytes following the header.
    pub blocksize: u64,
    /// Length of the original (reconstructed) file.
    pub orig_size: u64,
}

impl FragmentGeometry {
    /// Geometry the encoder uses for a file of `orig_size` bytes split `n` ways.
    pub fn for_original(orig_size: u64, n: u32) -> (Self, u8) {
        let n = n as u64;
        let padded = orig_size.div_ceil(n) * n;
        let under = (padded - orig_size) as u8;
        (Self { blocksize: padded / n, orig_size }, under)
    }

    /// Recompute the geometry from a fragment file of `file_size` bytes and
    /// reject it unless the encoder's arithmetic reproduces that size.
    pub fn derive(path: &Path, file_size: u64, header: &ChunkHeader) -> Result<Self> {
        let total = file_size
            .checked_sub(HEADER_SIZE as u64)
            .ok_or_else(|| EccError::corrupt(path, format!("{file_size} bytes is shorter than a header")))?;
        let n = header.n as u64;
        let orig_size = (total * n).checked_sub(header.under_size as u64).ok_or_else(|| {
            EccError::corrupt(path, format!("under_size {} exceeds encoded size", header.under_size))
        })?;
        let (geometry, _) = Self::for_original(orig_size, header.n);
        if geometry.blocksize != total {
            return Err(EccError::corrupt(
                path,
                format!("blocksize {} disagrees with on-disk block of {total} bytes", geometry.blocksize),
            ));
        }
        Ok(geometry)
    }

    /// Offset of the first original byte held by data fragment `chunk_index`.
    pub fn chunk_start(&self, chunk_index: u32) -> u64 {
        chunk_index as u64 * self.blocksize
    }
}

/// An opened fragment with a parsed header and consistent geometry.
///
/// The file is positioned right after the header.
pub struct OpenFragment {
    pub path: PathBuf,
    pub file: File,
    pub header: ChunkHeader,
    pub geometry: FragmentGeometry,
}

impl OpenFragment {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(path, file)
    }

    pub fn from_file(path: &Path, mut file: File) -> Result<Self> {
        let file_size = file.metadata()?.len();
        let mut buf = [0u8; HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => EccError::corrupt(path, "short header"),
            _ => EccError::Io(e),
        })?;
        let header =
            ChunkHeader::from_bytes(&buf).map_err(|e| EccError::corrupt(path, e.to_string()))?;
        let geometry = FragmentGeometry::derive(path, file_size, &header)?;
        Ok(Self { path: path.to_path_buf(), file, header, geometry })
    }

    /// Read the whole block that follows the header.
    pub fn read_block(&mut self) -> Result<Vec<u8>> {
        let mut block = vec![0u8; self.geometry.blocksize as usize];
        self.file.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        self.file
            .read_exact(&mut block)
            .map_err(|_| EccError::corrupt(&self.path, "short read of fragment block"))?;
        Ok(block)
    }

    /// Positioned read of `buf.len()` bytes at `offset` within the block.
    pub fn read_block_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(HEADER_SIZE as u64 + offset))?;
        self.file
            .read_exact(buf)
            .map_err(|_| EccError::corrupt(&self.path, "short read of fragment block"))?;
        Ok(())
    }
}
