use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use sha1::{Digest as _, Sha1};
use tracing::{debug, info};

use crate::digest;
use crate::error::Result;
use crate::fragment::{fragment_path, FragmentGeometry};
use crate::galois;
use crate::header::{pack_fields, ChunkHeader, Digest};
use crate::matrix::dispersal_matrix;
use crate::report::EncodeSummary;

#[derive(Clone, Copy, Debug)]
pub struct EncoderConfig {
    /// Data fragments.
    pub n: u32,
    /// Parity fragments.
    pub m: u32,
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        pack_fields(self.n, self.m, 0).map(|_| ())
    }
}

pub struct Encoder;

impl Encoder {
    /// Split `input` into `n` data and `m` parity fragments named
    /// `<stem>-NNNN.rs`.
    pub fn encode(input: &Path, stem: &Path, cfg: &EncoderConfig) -> Result<EncodeSummary> {
        cfg.validate()?;
        let (n, m) = (cfg.n as usize, cfg.m as usize);
        let rows = n + m;

        // 1) Read the source into n zero-padded blocks, hashing the unpadded stream
        let mut src = File::open(input)?;
        let orig_size = src.metadata()?.len();
        let (geometry, under_size) = FragmentGeometry::for_original(orig_size, cfg.n);
        let blocksize = geometry.blocksize as usize;
        info!(input = %input.display(), orig_size, blocksize, n, m, "encoding");

        let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(n);
        let mut remaining = orig_size;
        let mut file_hasher = Sha1::new();
        for _ in 0..n {
            let mut buf = vec![0u8; blocksize];
            let take = remaining.min(blocksize as u64) as usize;
            src.read_exact(&mut buf[..take])?;
            file_hasher.update(&buf[..take]);
            remaining -= take as u64;
            blocks.push(buf);
        }
        let file_hash = digest::finish(file_hasher);

        let mut headers = Vec::with_capacity(rows);
        for i in 0..rows {
            let mut h = ChunkHeader::new(cfg.n, cfg.m, i as u32, under_size)?;
            h.file_hash = file_hash;
            headers.push(h);
        }

        if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // 2) Data fragments go out verbatim before parity math scales the buffers
        let mut outputs: Vec<File> = Vec::with_capacity(rows);
        let mut data_digests: Vec<Digest> = Vec::with_capacity(rows);
        for (i, block) in blocks.iter().enumerate() {
            let d = digest::sha1(block);
            outputs.push(write_fragment(stem, i, &mut headers[i], &d, block)?);
            data_digests.push(d);
        }

        // 3) Parity: each row is a field-weighted XOR-sum of the data blocks.
        // `factors[j]` tracks the scale currently applied to data block j.
        let vdm = dispersal_matrix(rows, n)?;
        let mut factors = vec![1u8; n];
        let mut parity = vec![0u8; blocksize];
        for i in n..rows {
            parity.fill(0);
            for j in 0..n {
                let coef = vdm.get(i, j);
                if coef == 0 {
                    continue;
                }
                let factor = galois::div(coef, factors[j])?;
                factors[j] = coef;
                galois::mul_region(&mut blocks[j], factor);
                galois::add_region(&blocks[j], &mut parity);
            }
            let d = digest::sha1(&parity);
            outputs.push(write_fragment(stem, i, &mut headers[i], &d, &parity)?);
            data_digests.push(d);
            debug!(row = i, "parity fragment written");
        }

        // 4) Bind every row together, then finalize each chunk hash over the full header
        let cross = digest::cross_chunk_hash(headers.iter().zip(data_digests.iter()))?;
        for (i, f) in outputs.iter_mut().enumerate() {
            headers[i].cross_chunk_hash = cross;
            headers[i].chunk_hash = digest::chunk_hash(&headers[i], &data_digests[i])?;
            f.seek(SeekFrom::Start(0))?;
            f.write_all(&headers[i].to_bytes()?)?;
            f.sync_all()?;
        }

        let fragments =
            (0..rows).map(|i| fragment_path(stem, i).to_string_lossy().to_string()).collect();
        info!(rows, cross = %digest::to_hex(&cross), "encode complete");
        Ok(EncodeSummary {
            created_utc: chrono::Utc::now().to_rfc3339(),
            source: input.to_string_lossy().to_string(),
            n: cfg.n,
            m: cfg.m,
            orig_size,
            blocksize: geometry.blocksize,
            under_size,
            file_hash_hex: digest::to_hex(&file_hash),
            cross_chunk_hash_hex: digest::to_hex(&cross),
            fragments,
        })
    }
}

// The placeholder header carries the block digest in the chunk-hash slot;
// it is replaced once the cross-chunk hash is known.
fn write_fragment(
    stem: &Path,
    row: usize,
    header: &mut ChunkHeader,
    data_digest: &Digest,
    block: &[u8],
) -> Result<File> {
    let path = fragment_path(stem, row);
    header.chunk_hash = *data_digest;
    let mut f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(&path)?;
    f.write_all(&header.to_bytes()?)?;
    f.write_all(block)?;
    debug!(fragment = %path.display(), "fragment body written");
    Ok(f)
}
