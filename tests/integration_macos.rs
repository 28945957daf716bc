#![cfg(target_os = "macos")]

// Homebrew integration tests.
//
// These are ignored by default and are intended to be run on a Mac with Homebrew installed:
// - `BREWSERVICES_ITEST_SERVICE`: a safe user-domain service to restart (e.g. "redis")

use std::future::Future;
use std::time::Duration;

use brewservices::{
    BrewServices, BrewServicesOptions, CancellationToken, CommandContext, PortProbe,
    ServiceAction, ServiceClient, ServiceDomain, ServicesState,
};

fn block_on<T>(fut: impl Future<Output = T>) -> T {
    #[cfg(feature = "rt-async-io")]
    {
        smol::block_on(fut)
    }

    #[cfg(feature = "rt-tokio")]
    {
        let rt = tokio::runtime::Runtime::new().expect("init tokio runtime");
        rt.block_on(fut)
    }
}

fn env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn services() -> BrewServices {
    let mut opts = BrewServicesOptions::default();
    opts.cache_dir = None;
    BrewServices::with_options(opts)
}

#[test]
#[ignore]
fn capabilities_find_brew() {
    let caps = block_on(services().capabilities());
    eprintln!("capabilities={caps:?}");
    if caps.brew_path.is_none() {
        eprintln!("brew not installed; skipping");
        return;
    }
    assert!(caps.can_list_user_services);
}

#[test]
#[ignore]
fn list_and_info_read_only() {
    block_on(async {
        let client = services().client();
        let cancel = CancellationToken::new();
        let ctx = CommandContext::new(ServiceDomain::User);

        let list = match client.list_services(&ctx, &cancel).await {
            Ok(v) => v,
            Err(e) if e.is_executable_not_found() => {
                eprintln!("brew not installed; skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for svc in list.iter().take(5) {
            assert!(!svc.name.trim().is_empty(), "service name must not be empty");
            let detail = client.service_info(&svc.name, &ctx, &cancel).await?;
            assert_eq!(detail.name, svc.name);
        }
        Ok::<(), brewservices::Error>(())
    })
    .unwrap();
}

#[test]
#[ignore]
fn store_loads_user_domain() {
    let store = services().store();
    block_on(store.refresh(
        &CommandContext::new(ServiceDomain::User),
        true,
        &CancellationToken::new(),
    ));

    match store.snapshot().state {
        ServicesState::Loaded(list) => eprintln!("services={}", list.len()),
        ServicesState::Error(e) if e.is_executable_not_found() => {
            eprintln!("brew not installed; skipping");
        }
        other => panic!("unexpected state: {other:?}"),
    }
}

#[test]
#[ignore]
fn restart_and_detect_ports() {
    let service = match env("BREWSERVICES_ITEST_SERVICE") {
        Some(s) => s,
        None => {
            eprintln!("set BREWSERVICES_ITEST_SERVICE to a safe brew service to restart");
            return;
        }
    };

    let root = services();
    let store = root.store();
    let ctx = CommandContext::new(ServiceDomain::User);
    let cancel = CancellationToken::new();

    block_on(async {
        store.refresh(&ctx, true, &cancel).await;
        store
            .perform_action(ServiceAction::Restart, &service, &ctx, &cancel)
            .await;

        let snap = store.snapshot();
        assert!(
            snap.non_fatal_error.is_none(),
            "restart failed: {:?}",
            store.diagnostics_for(&service)
        );

        std::thread::sleep(Duration::from_secs(2));
        let detail = root.client().service_info(&service, &ctx, &cancel).await?;
        if let Some(pid) = detail.pid {
            let ports = root.ports().detect_ports(pid, &cancel).await;
            eprintln!("ports={ports:?}");
        }
        Ok::<(), brewservices::Error>(())
    })
    .unwrap();
}
