use crate::exec::CommandRunner;
use crate::{BrewServicesOptions, CommandSpec, Error, Result};

use tokio_util::sync::CancellationToken;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Finds and validates the `brew` executable.
///
/// Order: the explicit override (exclusive when set), then the configured candidates, then
/// `which brew` with the default `PATH`. A candidate is accepted only when `brew --version`
/// succeeds and prints `Homebrew`.
#[derive(Clone, Debug)]
pub struct BrewLocator {
    runner: Arc<dyn CommandRunner>,
    override_path: Option<PathBuf>,
    candidates: Vec<PathBuf>,
    which_path: PathBuf,
    default_path: String,
    validate_timeout: Duration,
}

impl BrewLocator {
    pub fn new(runner: Arc<dyn CommandRunner>, opts: &BrewServicesOptions) -> Self {
        Self {
            runner,
            override_path: opts.brew_path.clone(),
            candidates: opts.brew_candidates.clone(),
            which_path: opts.which_path.clone(),
            default_path: opts.default_path.clone(),
            validate_timeout: opts.validate_timeout,
        }
    }

    /// Locate brew or fail with `Error::ExecutableNotFound`.
    pub async fn locate(&self, cancel: &CancellationToken) -> Result<PathBuf> {
        if let Some(path) = &self.override_path {
            if is_executable_file(path) && self.validate(path, cancel).await? {
                return Ok(path.clone());
            }
            return Err(Error::executable_not_found(format!(
                "configured brew path {} is not a working Homebrew executable",
                path.display()
            )));
        }

        for path in &self.candidates {
            if !is_executable_file(path) {
                continue;
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(path = %path.display(), "brew candidate");
            if self.validate(path, cancel).await? {
                return Ok(path.clone());
            }
        }

        if let Some(path) = self.which(cancel).await?
            && self.validate(&path, cancel).await?
        {
            return Ok(path);
        }

        #[cfg(feature = "tracing")]
        tracing::error!("Homebrew not found on this system");

        Err(Error::executable_not_found(
            "Homebrew is not installed or could not be found; install it from https://brew.sh",
        ))
    }

    async fn validate(&self, path: &Path, cancel: &CancellationToken) -> Result<bool> {
        let spec = CommandSpec::new(path)
            .args(["--version"])
            .timeout(self.validate_timeout);
        match self.runner.execute(&spec, cancel).await {
            Ok(r) if r.cancelled => Err(Error::Cancelled),
            Ok(r) => {
                let valid = r.is_success() && r.stdout.contains("Homebrew");
                #[cfg(feature = "tracing")]
                if valid {
                    tracing::info!(path = %path.display(), "validated brew");
                }
                Ok(valid)
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(path = %path.display(), error = %_e, "brew validation failed");
                Ok(false)
            }
        }
    }

    async fn which(&self, cancel: &CancellationToken) -> Result<Option<PathBuf>> {
        if !is_executable_file(&self.which_path) {
            return Ok(None);
        }
        let spec = CommandSpec::new(self.which_path.clone())
            .args(["brew"])
            .env("PATH", self.default_path.clone())
            .timeout(self.validate_timeout);
        let r = match self.runner.execute(&spec, cancel).await {
            Ok(r) => r,
            Err(_) => return Ok(None),
        };
        if r.cancelled {
            return Err(Error::Cancelled);
        }
        if !r.is_success() {
            return Ok(None);
        }
        let found = r.stdout.trim();
        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(found)))
    }
}

#[cfg(unix)]
pub(crate) fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
pub(crate) fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
