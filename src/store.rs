//! Reconciliation store: the observable state of the service list and the rules that keep it
//! consistent with `brew services`.
//!
//! All mutation happens inside short critical sections on a `std::sync::Mutex`; the lock is never
//! held across an await. Every change bumps a revision on a `tokio::sync::watch` channel so
//! observers can re-read [`ServicesStore::snapshot`].
//!
//! Refreshes are single-flight: while one is running, further requests are coalesced into one
//! pending slot (last writer wins) that the running refresh drains before returning.

use crate::cache::{CachedServices, ServiceListCache};
use crate::client::ServiceClient;
use crate::ports::PortProbe;
use crate::runtime;
use crate::{
    CommandContext, Error, GlobalOperation, GlobalOperationStatus, ServiceAction,
    ServiceDescriptor, ServiceDetail, ServiceDomain, ServiceOperation, ServiceStatus,
    ServicesState,
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Everything an observer can see, copied out of the store.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct StoreSnapshot {
    pub state: ServicesState,
    /// Last action per service name.
    pub operations: BTreeMap<String, ServiceOperation>,
    pub global_operation: Option<GlobalOperation>,
    /// Error that did not invalidate the visible list.
    pub non_fatal_error: Option<Error>,
    pub last_diagnostics: Option<String>,
    pub selected_detail: Option<ServiceDetail>,
    /// Domain of the most recent refresh request.
    pub domain: Option<ServiceDomain>,
    /// When the visible list was last loaded (live or from cache).
    pub last_refresh: Option<SystemTime>,
    /// Whether a refresh is physically running.
    pub refreshing: bool,
}

impl StoreSnapshot {
    /// The visible list, empty when nothing is loaded.
    pub fn services(&self) -> &[ServiceDescriptor] {
        self.state.services().unwrap_or_default()
    }

    /// Operation record for `name`, if any.
    pub fn operation(&self, name: &str) -> Option<&ServiceOperation> {
        self.operations.get(name)
    }

    /// `false` only when the last fatal error says Homebrew is missing.
    pub fn is_brew_available(&self) -> bool {
        !self
            .state
            .error()
            .is_some_and(Error::is_executable_not_found)
    }
}

/// Status and exit code an entry showed before an optimistic update.
type Projected = (ServiceStatus, Option<i32>);

#[derive(Clone, Debug)]
struct RefreshRequest {
    ctx: CommandContext,
    force: bool,
    quiet: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    view: StoreSnapshot,
    in_flight: bool,
    pending: Option<RefreshRequest>,
    last_refresh_by_domain: HashMap<ServiceDomain, SystemTime>,
    restored_domains: HashSet<ServiceDomain>,
    /// Lists of the domains not currently selected, shown again when switching back.
    parked: HashMap<ServiceDomain, (Vec<ServiceDescriptor>, Option<SystemTime>)>,
}

impl StoreState {
    fn is_selected(&self, domain: ServiceDomain) -> bool {
        self.view.domain == Some(domain)
    }

    fn handle_error(&mut self, error: Error) {
        #[cfg(feature = "tracing")]
        tracing::error!(error = %error, "services store error");

        self.view.last_diagnostics = Some(error.diagnostics());
        self.view.state = ServicesState::Error(error);
    }

    fn record_non_fatal(&mut self, error: Error) {
        self.view.last_diagnostics = Some(error.diagnostics());
        self.view.non_fatal_error = Some(error);
    }

    fn record_failure(&mut self, name: &str, action: ServiceAction, error: Error) {
        #[cfg(feature = "tracing")]
        tracing::error!(
            service = name,
            action = action.subcommand(),
            error = %error,
            "service operation failed"
        );

        self.record_non_fatal(error.clone());
        self.view
            .operations
            .insert(name.to_string(), ServiceOperation::failed(action, error));
    }

    fn set_idle(&mut self, name: &str) {
        self.view
            .operations
            .insert(name.to_string(), ServiceOperation::default());
    }

    /// Show the status the action is expected to produce before brew confirms it.
    ///
    /// Returns what the entry showed before.
    fn project(&mut self, name: &str, action: ServiceAction) -> Option<Projected> {
        let entry = self
            .view
            .state
            .services_mut()?
            .iter_mut()
            .find(|s| s.name == name)?;
        let before = (entry.status, entry.exit_code);
        entry.status = action.expected_status();
        entry.exit_code = None;
        Some(before)
    }

    /// Undo [`Self::project`] unless the entry has been reloaded since.
    fn unproject(
        &mut self,
        name: &str,
        action: ServiceAction,
        before: Option<Projected>,
    ) {
        let Some((status, exit_code)) = before else {
            return;
        };
        let Some(entry) = self
            .view
            .state
            .services_mut()
            .and_then(|list| list.iter_mut().find(|s| s.name == name))
        else {
            return;
        };
        if entry.status == action.expected_status() && entry.exit_code.is_none() {
            entry.status = status;
            entry.exit_code = exit_code;
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    client: Arc<dyn ServiceClient>,
    ports: Option<Arc<dyn PortProbe>>,
    cache: Option<Arc<dyn ServiceListCache>>,
    min_refresh_interval: Duration,
    state: Mutex<StoreState>,
    changes: watch::Sender<u64>,
}

impl StoreInner {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        self.changes.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

/// Builder for [`ServicesStore`].
#[derive(Debug)]
pub struct ServicesStoreBuilder {
    client: Arc<dyn ServiceClient>,
    ports: Option<Arc<dyn PortProbe>>,
    cache: Option<Arc<dyn ServiceListCache>>,
    min_refresh_interval: Duration,
}

impl ServicesStoreBuilder {
    /// Port enrichment used by [`ServicesStore::fetch_service_info_with_ports`].
    pub fn port_probe(mut self, ports: Arc<dyn PortProbe>) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Persisted list cache, read once per domain and written after every live refresh.
    pub fn cache(mut self, cache: Arc<dyn ServiceListCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Minimum interval between non-forced refreshes of one domain (default: 10s).
    pub fn min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn build(self) -> ServicesStore {
        let (changes, _) = watch::channel(0);
        ServicesStore {
            inner: Arc::new(StoreInner {
                client: self.client,
                ports: self.ports,
                cache: self.cache,
                min_refresh_interval: self.min_refresh_interval,
                state: Mutex::new(StoreState::default()),
                changes,
            }),
        }
    }
}

/// Observable, reconciled view of brew services.
///
/// Cloning is cheap; clones share state.
#[derive(Clone, Debug)]
pub struct ServicesStore {
    inner: Arc<StoreInner>,
}

impl ServicesStore {
    pub fn builder(client: Arc<dyn ServiceClient>) -> ServicesStoreBuilder {
        ServicesStoreBuilder {
            client,
            ports: None,
            cache: None,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    pub fn new(client: Arc<dyn ServiceClient>) -> Self {
        Self::builder(client).build()
    }

    /// Copy of the current observable state.
    pub fn snapshot(&self) -> StoreSnapshot {
        let st = self.inner.lock();
        let mut view = st.view.clone();
        view.refreshing = st.in_flight;
        view
    }

    /// Revision counter bumped on every state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// The visible list, empty when nothing is loaded.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.read(|st| st.view.state.services().map(<[_]>::to_vec))
            .unwrap_or_default()
    }

    /// Diagnostics of the last error.
    pub fn diagnostics(&self) -> Option<String> {
        self.read(|st| st.view.last_diagnostics.clone())
    }

    /// Diagnostics of the last failed action on `name`, falling back to [`Self::diagnostics`].
    pub fn diagnostics_for(&self, name: &str) -> Option<String> {
        self.read(|st| {
            st.view
                .operations
                .get(name)
                .and_then(|op| op.diagnostics.clone())
                .or_else(|| st.view.last_diagnostics.clone())
        })
    }

    /// Reload the list for `ctx.domain`.
    ///
    /// Non-forced refreshes within the minimum interval of the last successful one are skipped.
    /// When a refresh is already running, this request replaces any queued one and returns
    /// immediately; the running refresh services it.
    pub async fn refresh(&self, ctx: &CommandContext, force: bool, cancel: &CancellationToken) {
        self.request_refresh(
            RefreshRequest {
                ctx: ctx.clone(),
                force,
                quiet: false,
            },
            cancel,
        )
        .await;
    }

    /// Refresh once, then every `interval` until `cancel` fires. A zero interval refreshes once.
    pub async fn run_auto_refresh(
        &self,
        ctx: &CommandContext,
        interval: Duration,
        cancel: &CancellationToken,
    ) {
        self.refresh(ctx, false, cancel).await;
        if interval.is_zero() {
            return;
        }
        while !cancel.is_cancelled() {
            if !runtime::sleep_unless_cancelled(interval, cancel).await {
                return;
            }
            self.refresh(ctx, false, cancel).await;
        }
    }

    /// Run `action` on `name` with an optimistic status update.
    pub async fn perform_action(
        &self,
        action: ServiceAction,
        name: &str,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) {
        #[cfg(feature = "tracing")]
        tracing::info!(service = name, action = action.subcommand(), domain = %ctx.domain, "perform action");

        let before = self.start_operation(name, action);

        match self
            .inner
            .client
            .perform_action(&action, name, ctx, cancel)
            .await
        {
            Ok(_) => {
                self.update(|st| st.set_idle(name));
                self.refresh_quietly(ctx, cancel).await;
            }
            Err(e) if e.is_cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(service = name, "action cancelled");
                self.update(|st| {
                    st.set_idle(name);
                    st.unproject(name, action, before);
                });
            }
            Err(e) if e.is_executable_not_found() => {
                self.update(|st| {
                    st.set_idle(name);
                    st.handle_error(e);
                });
            }
            Err(e) => {
                self.refresh(ctx, true, cancel).await;
                self.update(|st| st.record_failure(name, action, e));
            }
        }
    }

    /// Run `action` on every visible service, one at a time, in list order.
    ///
    /// A failing service is recorded and the batch continues. Cancellation stops the batch;
    /// a missing Homebrew aborts it with a fatal error. One forced refresh follows.
    pub async fn perform_action_on_all(
        &self,
        action: ServiceAction,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) {
        let targets = self.services();
        if targets.is_empty() {
            return;
        }
        let total = targets.len();

        #[cfg(feature = "tracing")]
        tracing::info!(action = action.subcommand(), total, domain = %ctx.domain, "perform action on all");

        self.update(|st| {
            st.view.global_operation = Some(GlobalOperation::start(
                action.bulk_title(),
                action.bulk_icon(),
                total,
            ));
        });

        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut cancelled = false;

        for service in &targets {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let name = service.name.as_str();
            let before = self.start_operation(name, action);

            match self
                .inner
                .client
                .perform_action(&action, name, ctx, cancel)
                .await
            {
                Ok(_) => self.update(|st| st.set_idle(name)),
                Err(e) if e.is_cancelled() => {
                    self.update(|st| {
                        st.set_idle(name);
                        st.unproject(name, action, before);
                    });
                    cancelled = true;
                    break;
                }
                Err(e) if e.is_executable_not_found() => {
                    self.update(|st| {
                        st.set_idle(name);
                        st.handle_error(e);
                    });
                    break;
                }
                Err(e) => {
                    failed += 1;
                    self.update(|st| st.record_failure(name, action, e));
                }
            }

            completed += 1;
            self.update(|st| {
                if let Some(op) = st.view.global_operation.as_mut() {
                    op.completed = completed;
                    op.failed = failed;
                }
            });
        }

        self.update(|st| {
            if let Some(op) = st.view.global_operation.as_mut() {
                op.status = GlobalOperationStatus::Completed;
                op.completed = completed;
                op.failed = failed;
            }
        });

        if cancelled && completed == 0 {
            return;
        }
        self.refresh(ctx, true, cancel).await;
    }

    /// `brew services cleanup`, tracked as a one-step global operation.
    pub async fn cleanup(&self, ctx: &CommandContext, cancel: &CancellationToken) {
        const TITLE: &str = "Cleaning up";
        const ICON: &str = "trash";

        #[cfg(feature = "tracing")]
        tracing::info!(domain = %ctx.domain, "cleanup");

        self.update(|st| st.view.global_operation = Some(GlobalOperation::start(TITLE, ICON, 1)));

        match self.inner.client.cleanup(ctx, cancel).await {
            Ok(_) => {
                self.update(|st| {
                    let mut op = GlobalOperation::start(TITLE, ICON, 1);
                    op.status = GlobalOperationStatus::Completed;
                    op.completed = 1;
                    st.view.global_operation = Some(op);
                });
                self.refresh(ctx, true, cancel).await;
            }
            Err(e) if e.is_cancelled() => {
                self.update(|st| st.view.global_operation = None);
            }
            Err(e) if e.is_executable_not_found() => {
                self.update(|st| {
                    st.view.global_operation = None;
                    st.handle_error(e);
                });
            }
            Err(e) => {
                self.update(|st| {
                    let mut op = GlobalOperation::start(TITLE, ICON, 1);
                    op.status = GlobalOperationStatus::Completed;
                    op.completed = 1;
                    op.failed = 1;
                    st.view.global_operation = Some(op);
                    st.record_non_fatal(e);
                });
            }
        }
    }

    /// Load `brew services info` for `name` into `selected_detail`.
    pub async fn fetch_service_info(
        &self,
        name: &str,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) {
        match self.inner.client.service_info(name, ctx, cancel).await {
            Ok(detail) => self.update(|st| st.view.selected_detail = Some(detail)),
            Err(e) if e.is_cancelled() => {}
            Err(e) if e.is_executable_not_found() => self.update(|st| st.handle_error(e)),
            Err(e) => self.update(|st| st.record_non_fatal(e)),
        }
    }

    /// [`Self::fetch_service_info`], then attach listening ports when the service has a pid.
    ///
    /// Port detection failures are logged and otherwise ignored.
    pub async fn fetch_service_info_with_ports(
        &self,
        name: &str,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) {
        self.fetch_service_info(name, ctx, cancel).await;

        let Some(ports) = self.inner.ports.clone() else {
            return;
        };
        let Some(pid) = self.read(|st| {
            st.view
                .selected_detail
                .as_ref()
                .filter(|d| d.name == name)
                .and_then(|d| d.pid)
        }) else {
            return;
        };

        match ports.detect_ports(pid, cancel).await {
            Ok(found) => {
                #[cfg(feature = "tracing")]
                tracing::info!(service = name, ports = found.len(), "detected ports");
                self.update(|st| {
                    if let Some(d) = st.view.selected_detail.take() {
                        st.view.selected_detail = Some(if d.name == name {
                            d.with_detected_ports(found)
                        } else {
                            d
                        });
                    }
                });
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(service = name, error = %_e, "port detection failed");
            }
        }
    }

    pub fn clear_service_info(&self) {
        self.update(|st| st.view.selected_detail = None);
    }

    /// Clear the non-fatal error banner.
    pub fn dismiss_error(&self) {
        self.update(|st| st.view.non_fatal_error = None);
    }

    /// Reset the operation record of `name` to idle.
    pub fn dismiss_operation(&self, name: &str) {
        self.update(|st| {
            if st.view.operations.contains_key(name) {
                st.set_idle(name);
            }
        });
    }

    pub fn dismiss_global_operation(&self) {
        self.update(|st| st.view.global_operation = None);
    }

    fn start_operation(&self, name: &str, action: ServiceAction) -> Option<Projected> {
        self.update(|st| {
            st.view
                .operations
                .insert(name.to_string(), ServiceOperation::running(action));
            st.project(name, action)
        })
    }

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let st = self.inner.lock();
        f(&st)
    }

    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let out = {
            let mut st = self.inner.lock();
            f(&mut st)
        };
        self.inner.publish();
        out
    }

    async fn refresh_quietly(&self, ctx: &CommandContext, cancel: &CancellationToken) {
        self.request_refresh(
            RefreshRequest {
                ctx: ctx.clone(),
                force: true,
                quiet: true,
            },
            cancel,
        )
        .await;
    }

    async fn request_refresh(&self, req: RefreshRequest, cancel: &CancellationToken) {
        let domain = req.ctx.domain;
        self.select_domain(domain);
        self.restore_cache(domain).await;

        let drive = self.update(|st| {
            if st.in_flight {
                // A queued quiet request would hide a real failure; queue it as visible.
                st.pending = Some(RefreshRequest {
                    quiet: false,
                    ..req.clone()
                });
                false
            } else {
                st.in_flight = true;
                true
            }
        });
        if !drive {
            #[cfg(feature = "tracing")]
            tracing::debug!(%domain, "refresh already in progress, queued");
            return;
        }

        let mut flight = InFlight {
            inner: self.inner.clone(),
            armed: true,
        };

        let mut next = Some(req);
        while let Some(current) = next {
            self.refresh_once(&current, cancel).await;
            next = self.update(|st| match st.pending.take() {
                Some(r) => Some(r),
                None => {
                    st.in_flight = false;
                    None
                }
            });
        }
        flight.armed = false;
    }

    fn select_domain(&self, domain: ServiceDomain) {
        self.update(|st| {
            if st.view.domain == Some(domain) {
                return;
            }
            if let Some(outgoing) = st.view.domain {
                if let Some(list) = st.view.state.services() {
                    let parked = (list.to_vec(), st.view.last_refresh);
                    st.parked.insert(outgoing, parked);
                }
                match st.parked.remove(&domain) {
                    Some((list, at)) => {
                        st.view.state = ServicesState::Loaded(list);
                        st.view.last_refresh = at;
                    }
                    None => {
                        st.view.state = ServicesState::Idle;
                        st.view.last_refresh = None;
                    }
                }
            }
            st.view.domain = Some(domain);
        });
    }

    async fn restore_cache(&self, domain: ServiceDomain) {
        let Some(cache) = self.inner.cache.clone() else {
            return;
        };
        if self.read(|st| st.restored_domains.contains(&domain)) {
            return;
        }
        if !self.update(|st| st.restored_domains.insert(domain)) {
            return;
        }

        let Some(cached) = blocking::unblock(move || cache.load(domain)).await else {
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(%domain, services = cached.services.len(), "restored cached services");

        self.update(|st| {
            if let Some(at) = cached.last_refresh {
                st.last_refresh_by_domain.insert(domain, at);
            }
            if st.is_selected(domain) && !st.view.state.is_busy() {
                st.view.state = ServicesState::Loaded(cached.services);
                st.view.last_refresh = cached.last_refresh;
            }
        });
    }

    fn persist(&self, domain: ServiceDomain, services: Vec<ServiceDescriptor>, at: SystemTime) {
        let Some(cache) = self.inner.cache.clone() else {
            return;
        };
        blocking::unblock(move || {
            let cached = CachedServices::new(services, Some(at));
            if let Err(_e) = cache.save(domain, &cached) {
                #[cfg(feature = "tracing")]
                tracing::debug!(%domain, error = %_e, "failed to persist services cache");
            }
        })
        .detach();
    }

    fn is_throttled(&self, domain: ServiceDomain) -> bool {
        let min = self.inner.min_refresh_interval;
        self.read(|st| {
            // Nothing on screen for the selected domain: always go live.
            if st.is_selected(domain) && matches!(st.view.state, ServicesState::Idle) {
                return false;
            }
            st.last_refresh_by_domain.get(&domain).is_some_and(|at| {
                SystemTime::now()
                    .duration_since(*at)
                    .is_ok_and(|elapsed| elapsed < min)
            })
        })
    }

    async fn refresh_once(&self, req: &RefreshRequest, cancel: &CancellationToken) {
        let domain = req.ctx.domain;
        self.restore_cache(domain).await;

        if !req.force && self.is_throttled(domain) {
            #[cfg(feature = "tracing")]
            tracing::debug!(%domain, "refresh throttled");
            return;
        }

        let (previous, existing) = self.update(|st| {
            let previous = st.view.state.clone();
            let existing = previous.services().map(<[_]>::to_vec);
            if !req.quiet && st.is_selected(domain) {
                st.view.state = match &existing {
                    Some(list) => ServicesState::Refreshing(list.clone()),
                    None => ServicesState::Loading,
                };
            }
            (previous, existing)
        });

        let mut restore = RestoreOnDrop {
            inner: self.inner.clone(),
            domain,
            previous: Some(previous),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(%domain, force = req.force, quiet = req.quiet, "refreshing services");

        let result = self.inner.client.list_services(&req.ctx, cancel).await;
        let previous = restore.disarm();

        match result {
            Ok(services) => {
                let now = SystemTime::now();
                let _applied = self.update(|st| {
                    st.last_refresh_by_domain.insert(domain, now);
                    if !st.is_selected(domain) {
                        st.parked.insert(domain, (services.clone(), Some(now)));
                        return false;
                    }
                    st.view.state = ServicesState::Loaded(services.clone());
                    st.view.last_refresh = Some(now);
                    true
                });

                #[cfg(feature = "tracing")]
                if _applied {
                    tracing::info!(%domain, services = services.len(), "loaded services");
                } else {
                    tracing::debug!(%domain, "discarding refresh result for non-selected domain");
                }

                self.persist(domain, services, now);
            }
            Err(e) if e.is_cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%domain, "refresh cancelled");
                self.update(|st| {
                    if st.is_selected(domain) {
                        st.view.state = previous;
                    }
                });
            }
            Err(_e) if req.quiet => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%domain, error = %_e, "quiet refresh failed");
            }
            Err(e) => self.update(|st| {
                if !st.is_selected(domain) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(%domain, "discarding refresh failure for non-selected domain");
                    return;
                }
                if e.is_executable_not_found() {
                    st.handle_error(e);
                    return;
                }
                let stale = st.view.state.services().map(<[_]>::to_vec).or(existing);
                match stale {
                    Some(list) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!(%domain, error = %e, "refresh failed; keeping stale list");
                        st.view.state = ServicesState::Loaded(list);
                        st.record_non_fatal(e);
                    }
                    None => st.handle_error(e),
                }
            }),
        }
    }
}

/// Clears the single-flight flag if the driving refresh future is dropped mid-flight.
struct InFlight {
    inner: Arc<StoreInner>,
    armed: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut st = self.inner.lock();
            st.in_flight = false;
            st.pending = None;
        }
        self.inner.publish();
    }
}

/// Puts the pre-refresh state back if the refresh future is dropped before the list arrives.
struct RestoreOnDrop {
    inner: Arc<StoreInner>,
    domain: ServiceDomain,
    previous: Option<ServicesState>,
}

impl RestoreOnDrop {
    fn disarm(&mut self) -> ServicesState {
        self.previous.take().unwrap_or_default()
    }
}

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        {
            let mut st = self.inner.lock();
            if st.is_selected(self.domain) && st.view.state.is_busy() {
                st.view.state = previous;
            }
        }
        self.inner.publish();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{CommandResult, Result};

    use async_trait::async_trait;
    use futures_lite::future::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct ListOnly {
        list: Mutex<Vec<Result<Vec<ServiceDescriptor>>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ServiceClient for ListOnly {
        async fn list_services(
            &self,
            _ctx: &CommandContext,
            _cancel: &CancellationToken,
        ) -> Result<Vec<ServiceDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut q = self.list.lock().unwrap();
            if q.len() > 1 {
                q.remove(0)
            } else {
                q[0].clone()
            }
        }

        async fn service_info(
            &self,
            name: &str,
            _ctx: &CommandContext,
            _cancel: &CancellationToken,
        ) -> Result<ServiceDetail> {
            Err(Error::invalid_input(format!("no info for {name}")))
        }

        async fn perform_action(
            &self,
            _action: &ServiceAction,
            _name: &str,
            _ctx: &CommandContext,
            _cancel: &CancellationToken,
        ) -> Result<CommandResult> {
            Err(Error::Cancelled)
        }

        async fn cleanup(
            &self,
            _ctx: &CommandContext,
            _cancel: &CancellationToken,
        ) -> Result<CommandResult> {
            Err(Error::Cancelled)
        }
    }

    fn redis(status: ServiceStatus) -> ServiceDescriptor {
        ServiceDescriptor::new("redis", status)
    }

    #[test]
    fn non_forced_refresh_within_interval_is_throttled() {
        let client = Arc::new(ListOnly::default());
        client
            .list
            .lock()
            .unwrap()
            .push(Ok(vec![redis(ServiceStatus::Started)]));
        let store = ServicesStore::new(client.clone());
        let ctx = CommandContext::default();
        let cancel = CancellationToken::new();

        block_on(store.refresh(&ctx, false, &cancel));
        block_on(store.refresh(&ctx, false, &cancel));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        block_on(store.refresh(&ctx, true, &cancel));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_interval_disables_throttle() {
        let client = Arc::new(ListOnly::default());
        client.list.lock().unwrap().push(Ok(Vec::new()));
        let store = ServicesStore::builder(client.clone())
            .min_refresh_interval(Duration::ZERO)
            .build();
        let ctx = CommandContext::default();
        let cancel = CancellationToken::new();

        block_on(store.refresh(&ctx, false, &cancel));
        block_on(store.refresh(&ctx, false, &cancel));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn first_load_failure_is_fatal() {
        let client = Arc::new(ListOnly::default());
        client
            .list
            .lock()
            .unwrap()
            .push(Err(Error::command_failed("brew services list", 1, "boom")));
        let store = ServicesStore::new(client);

        block_on(store.refresh(&CommandContext::default(), true, &CancellationToken::new()));
        let snap = store.snapshot();
        let Some(Error::CommandFailed { .. }) = snap.state.error() else {
            panic!("unexpected state: {:?}", snap.state);
        };
        assert_eq!(
            snap.last_diagnostics.as_deref(),
            Some("Exit code: 1\n\nboom")
        );
        assert!(snap.non_fatal_error.is_none());
    }

    #[test]
    fn failure_with_known_list_is_non_fatal() {
        let client = Arc::new(ListOnly::default());
        client.list.lock().unwrap().extend([
            Ok(vec![redis(ServiceStatus::Started)]),
            Err(Error::decode_failed("brew services list", "eof", "[")),
        ]);
        let store = ServicesStore::new(client);
        let ctx = CommandContext::default();
        let cancel = CancellationToken::new();

        block_on(store.refresh(&ctx, true, &cancel));
        block_on(store.refresh(&ctx, true, &cancel));

        let snap = store.snapshot();
        assert!(matches!(snap.state, ServicesState::Loaded(_)));
        assert_eq!(snap.services(), &[redis(ServiceStatus::Started)]);
        assert!(snap.non_fatal_error.is_some());
        assert_eq!(snap.last_diagnostics.as_deref(), Some("["));
    }

    #[test]
    fn missing_brew_is_fatal_even_with_known_list() {
        let client = Arc::new(ListOnly::default());
        client.list.lock().unwrap().extend([
            Ok(vec![redis(ServiceStatus::Started)]),
            Err(Error::executable_not_found("gone")),
        ]);
        let store = ServicesStore::new(client);
        let ctx = CommandContext::default();
        let cancel = CancellationToken::new();

        block_on(store.refresh(&ctx, true, &cancel));
        block_on(store.refresh(&ctx, true, &cancel));

        let snap = store.snapshot();
        assert!(!snap.is_brew_available());
        assert!(snap.services().is_empty());
    }

    #[test]
    fn cancelled_refresh_restores_previous_state() {
        let client = Arc::new(ListOnly::default());
        client.list.lock().unwrap().extend([
            Ok(vec![redis(ServiceStatus::Stopped)]),
            Err(Error::Cancelled),
        ]);
        let store = ServicesStore::new(client);
        let ctx = CommandContext::default();
        let cancel = CancellationToken::new();

        block_on(store.refresh(&ctx, true, &cancel));
        block_on(store.refresh(&ctx, true, &cancel));

        let snap = store.snapshot();
        assert!(matches!(snap.state, ServicesState::Loaded(_)));
        assert!(snap.non_fatal_error.is_none());
        assert!(!snap.refreshing);
    }

    #[test]
    fn projection_clears_exit_code() {
        let mut st = StoreState::default();
        let mut svc = redis(ServiceStatus::Error);
        svc.exit_code = Some(78);
        st.view.state = ServicesState::Loaded(vec![svc]);

        let before = st.project("redis", ServiceAction::Restart);
        assert_eq!(before, Some((ServiceStatus::Error, Some(78))));
        let list = st.view.state.services().unwrap();
        assert_eq!(list[0].status, ServiceStatus::Started);
        assert_eq!(list[0].exit_code, None);

        assert_eq!(st.project("absent", ServiceAction::Kill), None);
        assert_eq!(st.view.state.services().unwrap().len(), 1);

        st.unproject("redis", ServiceAction::Restart, before);
        let list = st.view.state.services().unwrap();
        assert_eq!(list[0].status, ServiceStatus::Error);
        assert_eq!(list[0].exit_code, Some(78));
    }

    #[test]
    fn every_change_bumps_revision() {
        let client = Arc::new(ListOnly::default());
        client.list.lock().unwrap().push(Ok(Vec::new()));
        let store = ServicesStore::new(client);
        let rx = store.changes();
        let before = *rx.borrow();

        store.dismiss_error();
        assert_eq!(*rx.borrow(), before.wrapping_add(1));
    }
}
