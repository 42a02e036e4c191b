use eccfs_core::cache::{CrossHashCache, VerificationCache, DEFAULT_REVERIFY_INTERVAL};
use eccfs_core::encode::{Encoder, EncoderConfig};
use eccfs_core::fragment::{fragment_path, OpenFragment};
use eccfs_core::header::HEADER_SIZE;
use eccfs_core::verify::{check_chunk, ChunkVerifier};
use eccfs_core::EccError;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn encoded(dir: &Path) -> PathBuf {
    let input = dir.join("input.bin");
    let data: Vec<u8> = (0..4_000u32).map(|i| (i * 7 % 251) as u8).collect();
    fs::write(&input, data).unwrap();
    let stem = dir.join("file");
    Encoder::encode(&input, &stem, &EncoderConfig { n: 2, m: 1 }).unwrap();
    stem
}

fn verify_once(v: &ChunkVerifier, path: &Path) -> bool {
    let mut frag = OpenFragment::open(path).unwrap();
    v.verify(&mut frag.file, &frag.header, frag.geometry.blocksize, path)
}

#[test]
fn fresh_entries_skip_rehashing() {
    let td = tempfile::tempdir().unwrap();
    let path = fragment_path(&encoded(td.path()), 0);
    let v = ChunkVerifier::default();
    assert_eq!(v.cache().interval(), DEFAULT_REVERIFY_INTERVAL);

    assert!(verify_once(&v, &path));
    assert!(verify_once(&v, &path));
    assert!(verify_once(&v, &path));
    let stats = v.stats();
    assert_eq!(stats.chunks_hashed, 1);
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.failures, 0);
}

#[test]
fn zero_interval_always_rehashes() {
    let td = tempfile::tempdir().unwrap();
    let path = fragment_path(&encoded(td.path()), 1);
    let v = ChunkVerifier::new(Duration::ZERO);
    for _ in 0..3 {
        assert!(verify_once(&v, &path));
    }
    assert_eq!(v.stats().chunks_hashed, 3);
    assert_eq!(v.stats().cache_hits, 0);
}

#[test]
fn corrupt_chunk_fails_and_is_not_cached() {
    let td = tempfile::tempdir().unwrap();
    let path = fragment_path(&encoded(td.path()), 2);
    let mut f = OpenOptions::new().write(true).open(&path).unwrap();
    f.seek(SeekFrom::Start(HEADER_SIZE as u64 + 10)).unwrap();
    f.write_all(&[0xEE, 0xEE]).unwrap();
    drop(f);

    let v = ChunkVerifier::default();
    assert!(!verify_once(&v, &path));
    assert!(!verify_once(&v, &path));
    assert_eq!(v.stats().failures, 2);
    assert!(v.cache().is_empty());
}

#[test]
fn trailing_bytes_fail_the_exact_length_check() {
    let td = tempfile::tempdir().unwrap();
    let path = fragment_path(&encoded(td.path()), 0);
    let mut frag = OpenFragment::open(&path).unwrap();
    let (header, blocksize) = (frag.header, frag.geometry.blocksize);

    // reading one byte less than the real block leaves a byte behind
    let err = check_chunk(&mut frag.file, &header, blocksize - 1, &path).unwrap_err();
    assert!(matches!(err, EccError::CorruptFragment { .. }));

    let mut frag = OpenFragment::open(&path).unwrap();
    check_chunk(&mut frag.file, &header, blocksize, &path).unwrap();
}

#[test]
fn entries_expire_after_the_interval() {
    let cache = VerificationCache::new(Duration::from_secs(60));
    let key = Path::new("/ecc0/a");
    let start = Instant::now();
    cache.record_at(key, start);
    assert!(cache.is_fresh_at(key, start + Duration::from_secs(59)));
    assert!(!cache.is_fresh_at(key, start + Duration::from_secs(60)));
    assert!(!cache.is_fresh_at(Path::new("/ecc0/b"), start));
}

#[test]
fn invalidate_removes_single_entries() {
    let cache = VerificationCache::default();
    cache.record(Path::new("/ecc0/a"));
    cache.record(Path::new("/ecc1/a"));
    assert_eq!(cache.len(), 2);
    assert!(cache.invalidate(Path::new("/ecc0/a")));
    assert!(!cache.invalidate(Path::new("/ecc0/a")));
    assert!(!cache.is_fresh(Path::new("/ecc0/a")));
    assert!(cache.is_fresh(Path::new("/ecc1/a")));
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn first_cross_hash_wins() {
    let cache = CrossHashCache::new();
    let a = [1u8; 20];
    let b = [2u8; 20];
    assert_eq!(cache.expected("docs/x"), None);
    assert!(cache.bind("docs/x", &a));
    assert!(cache.bind("docs/x", &a));
    assert!(!cache.bind("docs/x", &b));
    assert_eq!(cache.expected("docs/x"), Some(a));
    assert!(cache.invalidate("docs/x"));
    assert!(cache.bind("docs/x", &b));
    assert_eq!(cache.expected("docs/x"), Some(b));
}
