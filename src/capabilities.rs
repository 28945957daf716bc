use crate::client::ServiceClient;
use crate::locate::is_executable_file;
use crate::{CommandContext, ServiceDomain};

use tokio_util::sync::CancellationToken;

use std::path::{Path, PathBuf};

/// Probe capabilities conservatively (never guess true).
pub(crate) async fn probe(services: &crate::BrewServices) -> Capabilities {
    let cancel = CancellationToken::new();
    let client = services.client();
    let opts = services.options();

    let brew_path = client.brew_path(&cancel).await.ok();

    let can_list_user_services = match &brew_path {
        Some(_) => client
            .list_services(&CommandContext::new(ServiceDomain::User), &cancel)
            .await
            .is_ok(),
        None => false,
    };

    let can_elevate = is_executable_file(&opts.osascript_path);
    let can_detect_ports =
        is_executable_file(&opts.lsof_path) && is_executable_file(&opts.pgrep_path);
    let can_persist_cache = opts.cache_dir.as_deref().is_some_and(probe_cache_dir);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        brew = brew_path.is_some(),
        can_list_user_services,
        can_elevate,
        can_detect_ports,
        can_persist_cache,
        "probed capabilities"
    );

    Capabilities {
        brew_path,
        can_list_user_services,
        can_elevate,
        can_detect_ports,
        can_persist_cache,
    }
}

/// The cache directory either exists as a writable directory or can be created under one.
fn probe_cache_dir(dir: &Path) -> bool {
    let mut current = Some(dir);
    while let Some(path) = current {
        match std::fs::metadata(path) {
            Ok(meta) => return meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => current = path.parent(),
        }
    }
    false
}

/// Runtime capabilities derived from conservative probing.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct Capabilities {
    /// Validated brew executable, when one was found.
    pub brew_path: Option<PathBuf>,
    /// Whether `brew services list` works in the user domain.
    pub can_list_user_services: bool,
    /// Whether the administrator prompt (`osascript`) is available for the system domain.
    pub can_elevate: bool,
    /// Whether `lsof` and `pgrep` are present for port detection.
    pub can_detect_ports: bool,
    /// Whether the list cache directory is likely writable.
    pub can_persist_cache: bool,
}
