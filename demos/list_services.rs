use brewservices::{BrewServices, CancellationToken, CommandContext, ServiceClient, ServiceDomain};

#[cfg(feature = "rt-async-io")]
fn main() {
    if let Err(e) = smol::block_on(run()) {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}

#[cfg(feature = "rt-tokio")]
fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("init tokio runtime failed: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run()) {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}

// Pass `--system` to include system services (shows the administrator prompt).
async fn run() -> Result<(), brewservices::Error> {
    let with_system = std::env::args().any(|a| a == "--system");
    let client = BrewServices::new().client();
    let cancel = CancellationToken::new();

    for domain in ServiceDomain::ALL {
        if domain.requires_elevation() && !with_system {
            continue;
        }
        let services = client
            .list_services(&CommandContext::new(domain), &cancel)
            .await?;

        println!("{} ({})", domain.label(), services.len());
        for svc in services {
            println!("  {:<24} {}", svc.name, svc.status.display_name());
        }
    }
    Ok(())
}
