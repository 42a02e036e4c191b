use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EccError>;

/// Errors surfaced by the fragment codec, the verifier and the overlay engine.
#[derive(Error, Debug)]
pub enum EccError {
    /// No copy of the path exists in the import dir or any ecc dir.
    #[error("{0}: not found in import or ecc directories")]
    NotFound(String),

    #[error("corrupt fragment {}: {reason}", path.display())]
    CorruptFragment { path: PathBuf, reason: String },

    #[error("only {found} valid fragments, need {needed}")]
    InsufficientFragments { found: usize, needed: usize },

    #[error("condensed dispersal matrix is not invertible")]
    Uninvertible,

    #[error("reconstructed data does not match file hash {expected}")]
    FileHashMismatch { expected: String },

    #[error("{0} is not supported on a read-only overlay")]
    UnsupportedOperation(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("division by zero in GF(2^8)")]
    DivisionByZero,

    /// A read that made no forward progress over one full pass of the ecc dirs.
    #[error("read of {path} stalled at offset {offset}: no ecc directory could serve it")]
    ReadFailed { path: String, offset: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub const ENOENT: i32 = libc::ENOENT;
pub const EIO: i32 = libc::EIO;
pub const EINVAL: i32 = libc::EINVAL;

impl EccError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EccError::CorruptFragment { path: path.into(), reason: reason.into() }
    }

    /// Errno value a filesystem adapter should hand back to the kernel.
    pub fn errno(&self) -> i32 {
        match self {
            EccError::NotFound(_) => ENOENT,
            EccError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ENOENT,
            EccError::UnsupportedOperation(_) | EccError::InvalidArgument(_) => EINVAL,
            _ => EIO,
        }
    }
}
