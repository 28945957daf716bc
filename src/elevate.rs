//! Administrator-prompt execution through `osascript`.
//!
//! The whole command line (environment assignments, executable, arguments) is flattened into a
//! single shell string, embedded into an AppleScript `do shell script ... with administrator
//! privileges` statement and handed to `osascript -e`.

use crate::exec::CommandRunner;
use crate::{CommandResult, CommandSpec, Error, Result};

use tokio_util::sync::CancellationToken;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

const SHELL_SPECIAL_CHARS: &str = " \t\n\"'\\$`!*?[]{}()<>|&;";

/// Runs commands as root behind the system administrator prompt.
#[derive(Clone, Debug)]
pub struct Elevator {
    runner: Arc<dyn CommandRunner>,
    osascript: PathBuf,
    default_path: String,
}

impl Elevator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        osascript: impl Into<PathBuf>,
        default_path: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            osascript: osascript.into(),
            default_path: default_path.into(),
        }
    }

    /// Run `spec` with administrator privileges.
    ///
    /// `acting_user` is appended as `--sudo-service-user <user>`. A declined prompt maps to
    /// `Error::Cancelled`; any other non-zero exit maps to `Error::CommandFailed`. A result
    /// cancelled through `cancel` is returned as-is.
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        acting_user: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<CommandResult> {
        let line = self.shell_command_line(spec, acting_user);

        #[cfg(feature = "tracing")]
        tracing::info!(
            command = %spec.display_line(),
            acting_user = acting_user.unwrap_or(""),
            "running with administrator privileges"
        );

        let mut osascript = CommandSpec::new(self.osascript.clone())
            .args(["-e".to_string(), administrator_script(&line)]);
        osascript.timeout = spec.timeout;

        let result = self.runner.execute(&osascript, cancel).await?;
        if result.cancelled || result.exit_code == 0 {
            return Ok(result);
        }

        if is_prompt_declined(&result.stderr) {
            #[cfg(feature = "tracing")]
            tracing::info!(command = %spec.display_line(), "administrator prompt declined");
            return Err(Error::Cancelled);
        }

        #[cfg(feature = "tracing")]
        tracing::error!(
            command = %spec.display_line(),
            exit_code = result.exit_code,
            stderr = %result.stderr,
            "privileged command failed"
        );

        Err(Error::command_failed(
            spec.display_line(),
            result.exit_code,
            &result.stderr,
        ))
    }

    /// The flattened shell line: sorted `KEY=value` assignments, executable, arguments, and the
    /// optional `--sudo-service-user <user>` pair, each token shell-escaped.
    pub fn shell_command_line(&self, spec: &CommandSpec, acting_user: Option<&str>) -> String {
        let env = self.effective_env(&spec.env);

        let mut parts = Vec::with_capacity(env.len() + spec.args.len() + 3);
        for (k, v) in &env {
            parts.push(format!("{k}={}", escape_for_shell(v)));
        }
        parts.push(escape_for_shell(&spec.program.to_string_lossy()));
        parts.extend(spec.args.iter().map(|a| escape_for_shell(a)));
        if let Some(user) = acting_user
            && !user.is_empty()
        {
            parts.push(escape_for_shell("--sudo-service-user"));
            parts.push(escape_for_shell(user));
        }
        parts.join(" ")
    }

    fn effective_env(&self, env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut out = env.clone();
        out.entry("PATH".to_string())
            .or_insert_with(|| self.default_path.clone());
        out.entry("HOMEBREW_NO_AUTO_UPDATE".to_string())
            .or_insert_with(|| "1".to_string());
        out
    }
}

/// Single-quote `input` when it contains a shell metacharacter. Embedded `'` becomes `'\''`.
pub(crate) fn escape_for_shell(input: &str) -> String {
    if input.is_empty() {
        return "''".to_string();
    }
    if !input.chars().any(|c| SHELL_SPECIAL_CHARS.contains(c)) {
        return input.to_string();
    }
    format!("'{}'", input.replace('\'', "'\\''"))
}

pub(crate) fn escape_for_apple_script(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

pub(crate) fn administrator_script(command_line: &str) -> String {
    format!(
        "do shell script \"{}\" with administrator privileges",
        escape_for_apple_script(command_line)
    )
}

fn is_prompt_declined(stderr: &str) -> bool {
    stderr.contains("User canceled") || stderr.contains("(-128)")
}
