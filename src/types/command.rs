use crate::ServiceDomain;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A subprocess invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Merged over the inherited environment.
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `program arg1 arg2` for logs and error messages (no environment).
    pub fn display_line(&self) -> String {
        let mut out = self.program.to_string_lossy().into_owned();
        for a in &self.args {
            out.push(' ');
            out.push_str(a);
        }
        out
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

/// Outcome of a subprocess that ran to exit or was cancelled.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct CommandResult {
    pub executable_path: PathBuf,
    pub arguments: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub cancelled: bool,
    pub duration: Duration,
}

impl CommandResult {
    /// Exit code zero and not cancelled.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.cancelled
    }

    /// Build a result by hand (fakes and tests).
    pub fn completed(
        spec: &CommandSpec,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            executable_path: spec.program.clone(),
            arguments: spec.args.clone(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    /// Executable and arguments as they were run, space-joined.
    pub fn command_line(&self) -> String {
        let mut out = self.executable_path.to_string_lossy().into_owned();
        for a in &self.arguments {
            out.push(' ');
            out.push_str(a);
        }
        out
    }
}

/// Per-call context for brew service commands.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct CommandContext {
    pub domain: ServiceDomain,
    /// Forwarded as `--sudo-service-user` for system-domain calls.
    pub sudo_service_user: Option<String>,
    /// Appends `--debug` to brew calls.
    pub debug: bool,
}

impl CommandContext {
    pub fn new(domain: ServiceDomain) -> Self {
        Self {
            domain,
            sudo_service_user: None,
            debug: false,
        }
    }

    pub fn with_sudo_service_user(mut self, user: impl Into<String>) -> Self {
        self.sudo_service_user = Some(user.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
