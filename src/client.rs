use crate::elevate::Elevator;
use crate::exec::CommandRunner;
use crate::locate::BrewLocator;
use crate::{
    BrewServicesOptions, CommandContext, CommandResult, CommandSpec, Error, Result,
    ServiceAction, ServiceDescriptor, ServiceDetail, args, util,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// The `brew services` operations the reconciliation store depends on.
///
/// Every call carries a [`CommandContext`]; its domain selects plain execution (`user`) or the
/// administrator prompt (`system`).
#[async_trait]
pub trait ServiceClient: fmt::Debug + Send + Sync {
    async fn list_services(
        &self,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServiceDescriptor>>;

    async fn service_info(
        &self,
        name: &str,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<ServiceDetail>;

    async fn perform_action(
        &self,
        action: &ServiceAction,
        name: &str,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<CommandResult>;

    async fn cleanup(&self, ctx: &CommandContext, cancel: &CancellationToken)
    -> Result<CommandResult>;
}

/// `ServiceClient` that shells out to `brew`.
#[derive(Debug)]
pub struct BrewServicesClient {
    runner: Arc<dyn CommandRunner>,
    elevator: Elevator,
    locator: BrewLocator,
    brew: Mutex<Option<PathBuf>>,
    query_timeout: Duration,
    mutate_timeout: Duration,
}

impl BrewServicesClient {
    pub fn new(runner: Arc<dyn CommandRunner>, opts: &BrewServicesOptions) -> Self {
        Self {
            elevator: Elevator::new(
                runner.clone(),
                opts.osascript_path.clone(),
                opts.default_path.clone(),
            ),
            locator: BrewLocator::new(runner.clone(), opts),
            runner,
            brew: Mutex::new(None),
            query_timeout: opts.query_timeout,
            mutate_timeout: opts.mutate_timeout,
        }
    }

    /// Use `brew` as the executable without running discovery.
    pub fn with_brew_executable(
        runner: Arc<dyn CommandRunner>,
        opts: &BrewServicesOptions,
        brew: impl Into<PathBuf>,
    ) -> Self {
        let client = Self::new(runner, opts);
        *client.brew.lock().unwrap_or_else(PoisonError::into_inner) = Some(brew.into());
        client
    }

    /// The validated brew path, located on first use and cached afterwards.
    pub async fn brew_path(&self, cancel: &CancellationToken) -> Result<PathBuf> {
        if let Some(p) = self.cached_brew() {
            return Ok(p);
        }
        let found = self.locator.locate(cancel).await?;
        *self.brew.lock().unwrap_or_else(PoisonError::into_inner) = Some(found.clone());
        Ok(found)
    }

    /// Apply `action` to every service with brew's own `--all` flag.
    ///
    /// The store does not use this; it walks services one by one to isolate failures.
    pub async fn perform_action_on_all_native(
        &self,
        action: &ServiceAction,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<CommandResult> {
        self.run(args::action_all(action, ctx.debug), ctx, self.mutate_timeout, cancel)
            .await
    }

    fn cached_brew(&self) -> Option<PathBuf> {
        self.brew
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn forget_brew(&self) {
        *self.brew.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn run(
        &self,
        args: Vec<String>,
        ctx: &CommandContext,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CommandResult> {
        let elevated = ctx.domain.requires_elevation();
        let acting_user = if elevated {
            util::normalize_sudo_user(ctx.sudo_service_user.as_deref())?
        } else {
            None
        };
        let brew = self.brew_path(cancel).await?;

        let spec = CommandSpec::new(brew)
            .args(args)
            .env("HOMEBREW_NO_AUTO_UPDATE", "1")
            .timeout(timeout);

        #[cfg(feature = "tracing")]
        tracing::info!(domain = %ctx.domain, command = %spec.display_line(), "brew services request");

        let result = if elevated {
            self.elevator
                .execute(&spec, acting_user.as_deref(), cancel)
                .await
        } else {
            self.runner.execute(&spec, cancel).await
        };

        let result = match result {
            Ok(r) => r,
            Err(Error::LaunchFailed {
                missing: true,
                detail,
                ..
            }) if !elevated => {
                self.forget_brew();
                return Err(Error::executable_not_found(detail));
            }
            Err(e) => return Err(e),
        };

        if result.cancelled {
            return Err(Error::Cancelled);
        }
        if !result.is_success() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                command = %spec.display_line(),
                exit_code = result.exit_code,
                "brew services command failed"
            );
            return Err(Error::command_failed(
                spec.display_line(),
                result.exit_code,
                &result.stderr,
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            command = %result.command_line(),
            elapsed_ms = result.duration.as_millis() as u64,
            "brew services command finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl ServiceClient for BrewServicesClient {
    async fn list_services(
        &self,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServiceDescriptor>> {
        let r = self
            .run(args::list(ctx.debug), ctx, self.query_timeout, cancel)
            .await?;
        decode::<Vec<ServiceDescriptor>>("brew services list", &r.stdout)
    }

    async fn service_info(
        &self,
        name: &str,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<ServiceDetail> {
        util::validate_service_name(name)?;
        let r = self
            .run(args::info(name, ctx.debug), ctx, self.query_timeout, cancel)
            .await?;
        first_info_entry(&r.stdout)
    }

    async fn perform_action(
        &self,
        action: &ServiceAction,
        name: &str,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<CommandResult> {
        util::validate_service_name(name)?;
        self.run(
            args::action(action, name, ctx.debug),
            ctx,
            self.mutate_timeout,
            cancel,
        )
        .await
    }

    async fn cleanup(
        &self,
        ctx: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<CommandResult> {
        self.run(args::cleanup(ctx.debug), ctx, self.mutate_timeout, cancel)
            .await
    }
}

fn decode<T: DeserializeOwned>(context: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::decode_failed(context, e.to_string(), raw))
}

/// `services info --json` returns an array; only the first element is meaningful.
fn first_info_entry(raw: &str) -> Result<ServiceDetail> {
    decode::<Vec<ServiceDetail>>("brew services info", raw)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::decode_failed("brew services info", "Empty info response", raw))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{ServiceDomain, ServiceStatus};

    use futures_lite::future::block_on;

    const BREW: &str = "/opt/homebrew/bin/brew";
    const LIST_JSON: &str = r#"[{"name":"redis","status":"started","user":"alice","file":"/Users/alice/Library/LaunchAgents/homebrew.mxcl.redis.plist","exit_code":0},{"name":"dnsmasq","status":"none","user":null,"file":null,"exit_code":null}]"#;

    #[derive(Debug)]
    struct CannedRunner {
        exit_code: i32,
        stdout: String,
        stderr: String,
        seen: Mutex<Vec<CommandSpec>>,
    }

    impl CannedRunner {
        fn new(exit_code: i32, stdout: &str, stderr: &str) -> Arc<Self> {
            Arc::new(Self {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> CommandSpec {
            self.seen.lock().unwrap().last().cloned().expect("a call")
        }
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn execute(
            &self,
            spec: &CommandSpec,
            _cancel: &CancellationToken,
        ) -> Result<CommandResult> {
            self.seen.lock().unwrap().push(spec.clone());
            Ok(CommandResult::completed(
                spec,
                self.exit_code,
                self.stdout.clone(),
                self.stderr.clone(),
            ))
        }
    }

    fn client(runner: Arc<CannedRunner>) -> BrewServicesClient {
        BrewServicesClient::with_brew_executable(runner, &BrewServicesOptions::default(), BREW)
    }

    #[test]
    fn user_domain_runs_brew_directly() {
        let runner = CannedRunner::new(0, LIST_JSON, "");
        let c = client(runner.clone());
        let ctx = CommandContext::new(ServiceDomain::User).with_sudo_service_user("ignored");

        let list = block_on(c.list_services(&ctx, &CancellationToken::new())).expect("list");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].status, ServiceStatus::NotLoaded);

        let spec = runner.last();
        assert_eq!(spec.program, PathBuf::from(BREW));
        assert_eq!(spec.args, ["services", "list", "--json"]);
        assert_eq!(
            spec.env.get("HOMEBREW_NO_AUTO_UPDATE").map(String::as_str),
            Some("1")
        );
        assert_eq!(spec.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn system_domain_goes_through_osascript() {
        let runner = CannedRunner::new(0, "", "");
        let c = client(runner.clone());
        let ctx = CommandContext::new(ServiceDomain::System)
            .with_sudo_service_user("alice")
            .with_debug(true);

        block_on(c.perform_action(
            &ServiceAction::Restart,
            "nginx",
            &ctx,
            &CancellationToken::new(),
        ))
        .expect("action");

        let spec = runner.last();
        assert_eq!(spec.program, PathBuf::from("/usr/bin/osascript"));
        assert_eq!(spec.timeout, Some(Duration::from_secs(90)));
        let script = &spec.args[1];
        assert!(
            script.contains("/opt/homebrew/bin/brew services restart nginx --debug --sudo-service-user alice"),
            "{script}"
        );
    }

    #[test]
    fn non_zero_exit_is_command_failed() {
        let runner = CannedRunner::new(1, "", "Error: Formula `nope` is not installed.");
        let c = client(runner);
        let err = block_on(c.perform_action(
            &ServiceAction::Start,
            "nope",
            &CommandContext::default(),
            &CancellationToken::new(),
        ))
        .expect_err("must fail");
        let Error::CommandFailed { exit_code, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(*exit_code, 1);
        assert!(err.diagnostics().starts_with("Exit code: 1\n\n"));
    }

    #[test]
    fn malformed_list_keeps_raw_output() {
        let runner = CannedRunner::new(0, "Warning: something\n[", "");
        let c = client(runner);
        let err = block_on(c.list_services(&CommandContext::default(), &CancellationToken::new()))
            .expect_err("must fail");
        let Error::DecodeFailed { raw_output, .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(raw_output, "Warning: something\n[");
    }

    #[test]
    fn empty_info_array_is_decode_failure() {
        let runner = CannedRunner::new(0, "[]", "");
        let c = client(runner);
        let err = block_on(c.service_info(
            "redis",
            &CommandContext::default(),
            &CancellationToken::new(),
        ))
        .expect_err("must fail");
        let Error::DecodeFailed { reason, .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(reason, "Empty info response");
    }

    #[test]
    fn info_returns_first_entry() {
        let json = r#"[{"name":"redis","service_name":"homebrew.mxcl.redis","status":"started","running":true,"pid":4242},{"name":"other","status":"stopped"}]"#;
        let runner = CannedRunner::new(0, json, "");
        let c = client(runner);
        let info = block_on(c.service_info(
            "redis",
            &CommandContext::default(),
            &CancellationToken::new(),
        ))
        .expect("info");
        assert_eq!(info.name, "redis");
        assert_eq!(info.pid, Some(4242));
    }

    #[test]
    fn invalid_name_is_rejected_before_spawning() {
        let runner = CannedRunner::new(0, "", "");
        let c = client(runner.clone());
        let err = block_on(c.perform_action(
            &ServiceAction::Kill,
            "--all",
            &CommandContext::default(),
            &CancellationToken::new(),
        ))
        .expect_err("must fail");
        let Error::InvalidInput { .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(runner.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn native_bulk_uses_all_flag() {
        let runner = CannedRunner::new(0, "", "");
        let c = client(runner.clone());
        block_on(c.perform_action_on_all_native(
            &ServiceAction::stop(),
            &CommandContext::default(),
            &CancellationToken::new(),
        ))
        .expect("bulk");
        assert_eq!(
            runner.last().args,
            ["services", "stop", "--all", "--max-wait=60"]
        );
    }
}
