use crate::{Error, Result, ServiceDescriptor, ServiceDomain};

use serde::{Deserialize, Serialize};

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

const CACHE_VERSION: u32 = 2;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Last known list for one domain.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct CachedServices {
    pub services: Vec<ServiceDescriptor>,
    pub last_refresh: Option<SystemTime>,
}

impl CachedServices {
    pub fn new(services: Vec<ServiceDescriptor>, last_refresh: Option<SystemTime>) -> Self {
        Self {
            services,
            last_refresh,
        }
    }
}

/// Persisted service lists, keyed by domain.
///
/// `load` is best-effort: any read or decode problem is a miss.
pub trait ServiceListCache: fmt::Debug + Send + Sync {
    fn load(&self, domain: ServiceDomain) -> Option<CachedServices>;
    fn save(&self, domain: ServiceDomain, cached: &CachedServices) -> Result<()>;
}

/// JSON files named `services-cache-v2-<domain>.json` under one directory.
#[derive(Clone, Debug)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, domain: ServiceDomain) -> PathBuf {
        self.dir
            .join(format!("services-cache-v{CACHE_VERSION}-{domain}.json"))
    }
}

impl ServiceListCache for DiskCache {
    fn load(&self, domain: ServiceDomain) -> Option<CachedServices> {
        let bytes = fs::read(self.path_for(domain)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn save(&self, domain: ServiceDomain, cached: &CachedServices) -> Result<()> {
        let path = self.path_for(domain);
        let bytes = serde_json::to_vec(cached)
            .map_err(|e| Error::io(format!("encode services cache: {e}")))?;
        fs::create_dir_all(&self.dir).map_err(|e| map_cache_io("create cache directory", &self.dir, e))?;
        atomic_write(&path, &bytes).map_err(|e| map_cache_io("write services cache", &path, e))
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;

    let tmp_path = loop {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = dir.join(format!(
            ".{}.tmp-{}-{}",
            path.file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("services-cache.json"),
            std::process::id(),
            n
        ));
        if !candidate.exists() {
            break candidate;
        }
    };

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fsync_dir(dir)
}

fn map_cache_io(context: &'static str, path: &Path, e: io::Error) -> Error {
    Error::io(format!("{context} {}: {e}", path.to_string_lossy()))
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    let f = fs::File::open(dir)?;
    f.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::ServiceStatus;

    static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir(name: &str) -> PathBuf {
        let n = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut dir = std::env::temp_dir();
        dir.push(format!("brewservices-{name}-{}-{n}", std::process::id()));
        dir
    }

    #[test]
    fn save_then_load_per_domain() {
        let dir = temp_dir("cache");
        let cache = DiskCache::new(&dir);
        let at = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let cached = CachedServices::new(
            vec![ServiceDescriptor::new("redis", ServiceStatus::Started)],
            Some(at),
        );

        cache.save(ServiceDomain::User, &cached).expect("save");
        assert_eq!(cache.load(ServiceDomain::User), Some(cached));
        assert_eq!(cache.load(ServiceDomain::System), None);
        assert!(
            cache
                .path_for(ServiceDomain::User)
                .ends_with("services-cache-v2-user.json")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let dir = temp_dir("cache-overwrite");
        let cache = DiskCache::new(&dir);
        for status in [ServiceStatus::Started, ServiceStatus::Stopped] {
            let cached =
                CachedServices::new(vec![ServiceDescriptor::new("redis", status)], None);
            cache.save(ServiceDomain::System, &cached).expect("save");
        }
        let loaded = cache.load(ServiceDomain::System).expect("load");
        assert_eq!(loaded.services[0].status, ServiceStatus::Stopped);

        let names: Vec<_> = std::fs::read_dir(&dir)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let dir = temp_dir("cache-corrupt");
        let cache = DiskCache::new(&dir);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(cache.path_for(ServiceDomain::User), b"{not json").expect("write");
        assert_eq!(cache.load(ServiceDomain::User), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
