#[cfg(feature = "blocking")]
use brewservices::{BlockingBrewServices, CommandContext, ServiceAction, ServiceDomain};

#[cfg(not(feature = "blocking"))]
fn main() {
    eprintln!("This example requires `--features blocking`.");
}

#[cfg(feature = "blocking")]
fn main() {
    let service = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "redis".to_string());

    let services = BlockingBrewServices::new();
    let ctx = CommandContext::new(ServiceDomain::User);

    let result = match services.perform_action(ServiceAction::Restart, &service, &ctx) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e.diagnostics());
            std::process::exit(1);
        }
    };
    println!("{} ({:?})", result.command_line(), result.duration);

    let snapshot = match services.store().refresh(&ctx, true) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    };
    match snapshot.services().iter().find(|s| s.name == service) {
        Some(svc) => println!("{}: {}", svc.name, svc.status.display_name()),
        None => println!("{service}: not listed"),
    }
}
