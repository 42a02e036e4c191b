use serde::{Deserialize, Serialize};

/// What an encode run produced.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EncodeSummary {
    pub created_utc: String,
    pub source: String,
    pub n: u32,
    pub m: u32,
    pub orig_size: u64,
    pub blocksize: u64,
    pub under_size: u8,
    pub file_hash_hex: String,
    pub cross_chunk_hash_hex: String,
    pub fragments: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DecodeSummary {
    pub n: u32,
    pub m: u32,
    pub orig_size: u64,
    pub blocksize: u64,
    /// Rows that passed every check, in row order.
    pub valid_rows: Vec<u32>,
    /// Data rows rebuilt from parity.
    pub reconstructed_rows: Vec<u32>,
    pub cross_chunk_verified: bool,
    pub file_hash_hex: String,
}

/// Outcome of checking one logical file across the ecc directories.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FileCheck {
    pub path: String,
    pub fragments: usize,
    pub n: u32,
    pub m: u32,
    pub missing_rows: Vec<u32>,
    pub cross_chunk_verified: bool,
    pub file_hash_verified: bool,
    pub problems: Vec<String>,
}

impl FileCheck {
    pub fn ok(&self) -> bool {
        self.problems.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CheckReport {
    pub checked_utc: String,
    pub ecc_dirs: Vec<String>,
    pub files_ok: usize,
    pub files_bad: usize,
    /// Directory-level problems such as non-parallel hierarchies.
    pub tree_problems: Vec<String>,
    pub files: Vec<FileCheck>,
}

impl CheckReport {
    pub fn ok(&self) -> bool {
        self.files_bad == 0 && self.tree_problems.is_empty()
    }
}
