//! Process-lifetime caches shared by concurrent reads.
//!
//! Both maps sit behind a single coarse mutex each. Two readers racing on the
//! same key can at worst both re-hash a chunk, which costs time but never
//! correctness.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::header::Digest;

pub const DEFAULT_REVERIFY_INTERVAL: Duration = Duration::from_secs(24 * 3600);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking reader cannot leave a half-written timestamp behind.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fragment path -> time its chunk hash last verified.
#[derive(Debug)]
pub struct VerificationCache {
    interval: Duration,
    entries: Mutex<HashMap<PathBuf, Instant>>,
}

impl VerificationCache {
    pub fn new(interval: Duration) -> Self {
        Self { interval, entries: Mutex::new(HashMap::new()) }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_fresh(&self, key: &Path) -> bool {
        self.is_fresh_at(key, Instant::now())
    }

    /// True if `key` verified less than one interval before `now`.
    pub fn is_fresh_at(&self, key: &Path, now: Instant) -> bool {
        match lock(&self.entries).get(key) {
            Some(&at) => now.saturating_duration_since(at) < self.interval,
            None => false,
        }
    }

    pub fn record(&self, key: &Path) {
        self.record_at(key, Instant::now());
    }

    pub fn record_at(&self, key: &Path, at: Instant) {
        lock(&self.entries).insert(key.to_path_buf(), at);
    }

    pub fn invalidate(&self, key: &Path) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VerificationCache {
    fn default() -> Self {
        Self::new(DEFAULT_REVERIFY_INTERVAL)
    }
}

/// Logical path -> cross-chunk hash seen on the first verified fragment.
#[derive(Debug, Default)]
pub struct CrossHashCache {
    expected: Mutex<HashMap<String, Digest>>,
}

impl CrossHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected(&self, logical: &str) -> Option<Digest> {
        lock(&self.expected).get(logical).copied()
    }

    /// Remember `hash` for `logical` unless something is already bound.
    /// Returns whether `hash` agrees with the (possibly new) binding.
    pub fn bind(&self, logical: &str, hash: &Digest) -> bool {
        let mut map = lock(&self.expected);
        let bound = map.entry(logical.to_string()).or_insert(*hash);
        bound == hash
    }

    pub fn invalidate(&self, logical: &str) -> bool {
        lock(&self.expected).remove(logical).is_some()
    }

    pub fn clear(&self) {
        lock(&self.expected).clear();
    }
}
