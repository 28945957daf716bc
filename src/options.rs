use std::path::PathBuf;
use std::time::Duration;

/// Default `PATH` injected into elevated commands (which otherwise run with a minimal environment).
pub const DEFAULT_PATH: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

/// Configuration options for `BrewServices`.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct BrewServicesOptions {
    /// Timeout for read-only brew calls (`services list`, `services info`).
    pub query_timeout: Duration,

    /// Timeout for mutating brew calls (actions, bulk actions, cleanup).
    pub mutate_timeout: Duration,

    /// Timeout for validating a brew candidate with `--version`.
    pub validate_timeout: Duration,

    /// Explicit brew executable. When set, it is the only candidate tried.
    pub brew_path: Option<PathBuf>,

    /// Well-known brew locations, tried in order.
    ///
    /// Default: `$HOMEBREW_PREFIX/bin/brew` (when set), `/opt/homebrew/bin/brew`,
    /// `/usr/local/bin/brew`, `/home/linuxbrew/.linuxbrew/bin/brew`.
    pub brew_candidates: Vec<PathBuf>,

    /// `which` used as the last-resort brew lookup.
    pub which_path: PathBuf,

    /// `osascript` used for the administrator prompt.
    pub osascript_path: PathBuf,

    /// `PATH` merged into elevated commands when the caller did not provide one.
    pub default_path: String,

    /// Minimum interval between two non-forced refreshes of the same domain.
    pub min_refresh_interval: Duration,

    /// `lsof` used by port detection.
    pub lsof_path: PathBuf,

    /// `pgrep` used by port detection.
    pub pgrep_path: PathBuf,

    /// Timeout for a single `lsof` call.
    pub lsof_timeout: Duration,

    /// Timeout for a single `pgrep` call.
    pub pgrep_timeout: Duration,

    /// Directory for the on-disk list cache (feature=`disk-cache`).
    ///
    /// Default: `<platform cache dir>/brewservices`.
    pub cache_dir: Option<PathBuf>,
}

impl Default for BrewServicesOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            mutate_timeout: Duration::from_secs(90),
            validate_timeout: Duration::from_secs(10),
            brew_path: None,
            brew_candidates: default_brew_candidates(),
            which_path: PathBuf::from("/usr/bin/which"),
            osascript_path: PathBuf::from("/usr/bin/osascript"),
            default_path: DEFAULT_PATH.to_string(),
            min_refresh_interval: Duration::from_secs(10),
            lsof_path: PathBuf::from("/usr/sbin/lsof"),
            pgrep_path: PathBuf::from("/usr/bin/pgrep"),
            lsof_timeout: Duration::from_secs(5),
            pgrep_timeout: Duration::from_secs(2),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_brew_candidates() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(prefix) = std::env::var("HOMEBREW_PREFIX")
        && !prefix.trim().is_empty()
    {
        out.push(PathBuf::from(prefix.trim()).join("bin").join("brew"));
    }
    for p in [
        "/opt/homebrew/bin/brew",
        "/usr/local/bin/brew",
        "/home/linuxbrew/.linuxbrew/bin/brew",
    ] {
        let p = PathBuf::from(p);
        if !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

#[cfg(feature = "disk-cache")]
fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|base| base.join("brewservices"))
}

#[cfg(not(feature = "disk-cache"))]
fn default_cache_dir() -> Option<PathBuf> {
    None
}
