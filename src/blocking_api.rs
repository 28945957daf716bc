use crate::client::ServiceClient;
use crate::{
    BrewServices, BrewServicesOptions, Capabilities, CommandContext, CommandResult, Result,
    ServiceAction, ServiceDescriptor, ServiceDetail, ServicesStore, StoreSnapshot,
};

use tokio_util::sync::CancellationToken;

/// Blocking wrapper for `BrewServices` (feature=`blocking`).
///
/// This is a convenience API for environments where a synchronous interface is preferred.
/// Internally it uses the selected runtime (`rt-async-io` or `rt-tokio`) to drive the async
/// implementation. Calls cannot be cancelled.
#[derive(Clone, Debug, Default)]
pub struct BlockingBrewServices {
    inner: BrewServices,
}

impl BlockingBrewServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(opts: BrewServicesOptions) -> Self {
        Self {
            inner: BrewServices::with_options(opts),
        }
    }

    /// Probe environment capabilities conservatively (blocking).
    pub fn capabilities(&self) -> Result<Capabilities> {
        crate::runtime::block_on_result(async { Ok(self.inner.capabilities().await) })
    }

    pub fn list_services(&self, ctx: &CommandContext) -> Result<Vec<ServiceDescriptor>> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(self.inner.client().list_services(ctx, &cancel))
    }

    pub fn service_info(&self, name: &str, ctx: &CommandContext) -> Result<ServiceDetail> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(self.inner.client().service_info(name, ctx, &cancel))
    }

    pub fn perform_action(
        &self,
        action: ServiceAction,
        name: &str,
        ctx: &CommandContext,
    ) -> Result<CommandResult> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(
            self.inner
                .client()
                .perform_action(&action, name, ctx, &cancel),
        )
    }

    pub fn cleanup(&self, ctx: &CommandContext) -> Result<CommandResult> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(self.inner.client().cleanup(ctx, &cancel))
    }

    /// Access the reconciliation store (blocking wrappers).
    pub fn store(&self) -> BlockingServicesStore {
        BlockingServicesStore {
            inner: self.inner.store(),
        }
    }
}

/// Blocking wrapper for `ServicesStore`. Every call returns the snapshot it left behind.
#[derive(Clone, Debug)]
pub struct BlockingServicesStore {
    inner: ServicesStore,
}

impl BlockingServicesStore {
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    pub fn refresh(&self, ctx: &CommandContext, force: bool) -> Result<StoreSnapshot> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(async {
            self.inner.refresh(ctx, force, &cancel).await;
            Ok(self.inner.snapshot())
        })
    }

    pub fn perform_action(
        &self,
        action: ServiceAction,
        name: &str,
        ctx: &CommandContext,
    ) -> Result<StoreSnapshot> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(async {
            self.inner.perform_action(action, name, ctx, &cancel).await;
            Ok(self.inner.snapshot())
        })
    }

    pub fn perform_action_on_all(
        &self,
        action: ServiceAction,
        ctx: &CommandContext,
    ) -> Result<StoreSnapshot> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(async {
            self.inner.perform_action_on_all(action, ctx, &cancel).await;
            Ok(self.inner.snapshot())
        })
    }

    pub fn cleanup(&self, ctx: &CommandContext) -> Result<StoreSnapshot> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(async {
            self.inner.cleanup(ctx, &cancel).await;
            Ok(self.inner.snapshot())
        })
    }

    pub fn fetch_service_info_with_ports(
        &self,
        name: &str,
        ctx: &CommandContext,
    ) -> Result<StoreSnapshot> {
        let cancel = CancellationToken::new();
        crate::runtime::block_on_result(async {
            self.inner
                .fetch_service_info_with_ports(name, ctx, &cancel)
                .await;
            Ok(self.inner.snapshot())
        })
    }
}
