//! brewservices is a Rust SDK for Homebrew services: list, inspect and control the launchd-backed
//! services managed by `brew services`, in the user domain or (through the administrator prompt)
//! in the system domain.
//!
//! Three layers:
//! - [`BrewServicesClient`] shells out to `brew` and decodes its JSON output.
//! - [`ServicesStore`] keeps an observable, reconciled view of the service list: single-flight
//!   refreshes, per-domain throttling, optimistic status updates, bulk actions with progress,
//!   and a per-domain disk cache for instant startup.
//! - [`PortDetector`] finds the TCP ports a running service listens on.
//!
//! ## Quick start
//! ```no_run
//! use brewservices::{BrewServices, CancellationToken, CommandContext, ServiceAction, ServiceDomain};
//!
//! async fn restart_redis() {
//!     let services = BrewServices::new();
//!     let store = services.store();
//!     let ctx = CommandContext::new(ServiceDomain::User);
//!     let cancel = CancellationToken::new();
//!
//!     store.refresh(&ctx, true, &cancel).await;
//!     store.perform_action(ServiceAction::Restart, "redis", &ctx, &cancel).await;
//!     println!("{:?}", store.snapshot().state);
//! }
//! ```
//!
//! ## Service name rules
//! - Names must be non-empty and free of surrounding whitespace.
//! - Names starting with `-`, containing path separators or control characters are rejected as
//!   `Error::InvalidInput`.
//!
//! ## System domain
//! System-domain commands run through `osascript` with administrator privileges. Declining the
//! prompt surfaces as `Error::Cancelled`, which the store treats as silent.
//!
//! Runtime is macOS (Homebrew on Linux works for the user domain). The public API compiles on
//! every platform; without `brew` the store reports `Error::ExecutableNotFound`.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::dbg_macro)]

#[cfg(all(feature = "rt-async-io", feature = "rt-tokio"))]
compile_error!("features `rt-async-io` and `rt-tokio` are mutually exclusive; enable exactly one.");

#[cfg(not(any(feature = "rt-async-io", feature = "rt-tokio")))]
compile_error!(
    "missing runtime feature: enable one of `rt-async-io` or `rt-tokio` (default enables `rt-async-io`)."
);

mod args;
#[cfg(feature = "blocking")]
mod blocking_api;
mod cache;
mod capabilities;
mod client;
mod elevate;
mod error;
mod exec;
mod locate;
mod options;
mod ports;
mod runtime;
mod store;
mod types;
mod util;

pub use crate::types::action::{ServiceAction, StopWait};
pub use crate::types::command::{CommandContext, CommandResult, CommandSpec};
pub use crate::types::domain::ServiceDomain;
pub use crate::types::operation::{
    GlobalOperation, GlobalOperationStatus, OperationStatus, ServiceOperation,
};
pub use crate::types::port::{ListeningPort, PortProtocol};
pub use crate::types::service::{ServiceDescriptor, ServiceDetail, ServiceStatus};
pub use crate::types::state::ServicesState;

pub use crate::cache::{CachedServices, DiskCache, ServiceListCache};
pub use crate::capabilities::Capabilities;
pub use crate::client::{BrewServicesClient, ServiceClient};
pub use crate::elevate::Elevator;
pub use crate::error::{Error, Result};
pub use crate::exec::{CommandRunner, ProcessRunner};
pub use crate::locate::BrewLocator;
pub use crate::options::{BrewServicesOptions, DEFAULT_PATH};
pub use crate::ports::{PortDetectionError, PortDetector, PortProbe};
pub use crate::store::{ServicesStore, ServicesStoreBuilder, StoreSnapshot};

pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "blocking")]
pub use crate::blocking_api::{BlockingBrewServices, BlockingServicesStore};

use std::sync::Arc;

/// Primary entrypoint: one client, one port detector and one shared store.
#[derive(Clone, Debug)]
pub struct BrewServices {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    opts: BrewServicesOptions,
    client: Arc<BrewServicesClient>,
    ports: Arc<PortDetector>,
    store: ServicesStore,
}

impl BrewServices {
    /// Default options, real subprocesses.
    pub fn new() -> Self {
        Self::with_options(BrewServicesOptions::default())
    }

    /// Custom options (timeouts, tool paths, cache directory).
    pub fn with_options(opts: BrewServicesOptions) -> Self {
        Self::with_runner(opts, Arc::new(ProcessRunner::new()))
    }

    /// Custom options and a custom subprocess runner.
    pub fn with_runner(opts: BrewServicesOptions, runner: Arc<dyn CommandRunner>) -> Self {
        let client = Arc::new(BrewServicesClient::new(runner.clone(), &opts));
        let ports = Arc::new(PortDetector::new(runner, &opts));

        let mut builder = ServicesStore::builder(client.clone())
            .port_probe(ports.clone())
            .min_refresh_interval(opts.min_refresh_interval);
        if let Some(dir) = &opts.cache_dir {
            builder = builder.cache(Arc::new(DiskCache::new(dir.clone())));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(cache_dir = ?opts.cache_dir, "brew services initialized");

        Self {
            inner: Arc::new(Inner {
                store: builder.build(),
                opts,
                client,
                ports,
            }),
        }
    }

    pub fn options(&self) -> &BrewServicesOptions {
        &self.inner.opts
    }

    /// Probe environment capabilities conservatively.
    pub async fn capabilities(&self) -> Capabilities {
        capabilities::probe(self).await
    }

    /// Access the raw `brew services` client.
    pub fn client(&self) -> Arc<BrewServicesClient> {
        self.inner.client.clone()
    }

    /// Access the shared reconciliation store.
    pub fn store(&self) -> ServicesStore {
        self.inner.store.clone()
    }

    /// Access listening-port detection.
    pub fn ports(&self) -> Arc<PortDetector> {
        self.inner.ports.clone()
    }
}

impl Default for BrewServices {
    fn default() -> Self {
        Self::new()
    }
}
