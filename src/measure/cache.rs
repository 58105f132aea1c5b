use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{LengthOracle, MeasureRequest};
use crate::error::Error;

const CACHE_VERSION: &str = "v1";

#[derive(Clone, Copy, Debug)]
struct CachedLength {
    mtime: i64,
    length: f64,
}

/// Remembers oracle answers keyed by (identity, width, prior splits).
/// Entries are tied to the source's modification time and persisted as a
/// tab-separated file between runs. Requests without a modification time
/// are never cached.
pub struct CachingOracle<O> {
    inner: O,
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, CachedLength>>,
    dirty: AtomicBool,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

fn cache_key(req: &MeasureRequest<'_>) -> String {
    let splits: Vec<String> = req.prior_splits.iter().map(|s| format!("{s:.4}")).collect();
    format!("{}\t{:.4}\t{}", req.key, req.width, splits.join(","))
}

fn mtime_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn file_mtime(path: &Path) -> Option<i64> {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .map(mtime_secs)
}

impl<O: LengthOracle> CachingOracle<O> {
    /// In-memory only.
    pub fn new(inner: O) -> Self {
        CachingOracle {
            inner,
            path: None,
            entries: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Load `path` if it exists. Unreadable or stale files just start empty.
    pub fn open(inner: O, path: PathBuf) -> Self {
        let entries = load_cache(&path);
        log::debug!("Length cache {}: {} entries", path.display(), entries.len());
        CachingOracle {
            inner,
            path: Some(path),
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache back if anything changed.
    pub fn save(&self) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty.load(Ordering::Relaxed) {
            return Ok(());
        }
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        let mut out = String::from(CACHE_VERSION);
        out.push('\n');
        for key in keys {
            let e = entries[key];
            out.push_str(&format!("{key}\t{}\t{}\n", e.mtime, e.length));
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }
        std::fs::write(path, out).map_err(Error::Io)?;
        log::debug!("Saved {} cached lengths to {}", entries.len(), path.display());
        Ok(())
    }
}

impl<O: LengthOracle> LengthOracle for CachingOracle<O> {
    fn measure(&self, req: &MeasureRequest<'_>) -> Result<f64, Error> {
        let Some(mtime) = req.modified.map(mtime_secs) else {
            return self.inner.measure(req);
        };
        let key = cache_key(req);
        {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = entries.get(&key)
                && hit.mtime == mtime
            {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(hit.length);
            }
        }
        // measure without holding the lock; the pre-pass calls in parallel
        let length = self.inner.measure(req)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, CachedLength { mtime, length });
        self.dirty.store(true, Ordering::Relaxed);
        Ok(length)
    }
}

fn load_cache(path: &Path) -> HashMap<String, CachedLength> {
    let mut entries = HashMap::new();
    let Ok(content) = std::fs::read_to_string(path) else {
        return entries;
    };
    let mut lines = content.lines();
    if lines.next() != Some(CACHE_VERSION) {
        log::warn!("Ignoring length cache {} with unknown version", path.display());
        return entries;
    }
    let mut stale = 0usize;
    for line in lines {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 5 {
            continue;
        }
        let (Ok(mtime), Ok(length)) = (parts[3].parse::<i64>(), parts[4].parse::<f64>()) else {
            continue;
        };
        // drop entries whose source changed since they were measured
        if file_mtime(Path::new(parts[0])).is_some_and(|m| m != mtime) {
            stale += 1;
            continue;
        }
        let key = format!("{}\t{}\t{}", parts[0], parts[1], parts[2]);
        entries.insert(key, CachedLength { mtime, length });
    }
    if stale > 0 {
        log::debug!("Dropped {stale} stale cached lengths");
    }
    entries
}
