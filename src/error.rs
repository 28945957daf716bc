use std::time::Duration;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

const STDERR_MAX_BYTES: usize = 64 * 1024;
const RAW_OUTPUT_MAX_BYTES: usize = 256 * 1024;

/// Error returned by brewservices APIs.
///
/// This error model is designed to be:
/// - **Classifiable** (callers can branch on variants; the store treats
///   `ExecutableNotFound` as fatal and `Cancelled` as silent),
/// - **Diagnosable** (keeps the command, exit code, stderr and raw output),
/// - **Bounded** (stderr and raw output are truncated to avoid unbounded memory growth).
///
/// `Error` is `Clone` because the reconciliation store keeps the last error in its state.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Input validation failure (e.g. invalid service name, invalid user name).
    #[error("invalid input: {context}")]
    InvalidInput { context: String },

    /// The Homebrew executable could not be located or validated.
    #[error("Homebrew executable not found: {detail}")]
    ExecutableNotFound { detail: String },

    /// A subprocess could not be started at all.
    #[error("failed to launch {program}: {detail}")]
    LaunchFailed {
        program: String,
        detail: String,
        /// Whether the executable itself was missing.
        missing: bool,
    },

    /// A subprocess exited with a non-zero status.
    ///
    /// `stderr` is truncated to avoid unbounded output.
    #[error("command failed: {command} (exit={exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A subprocess produced output that could not be decoded.
    ///
    /// `raw_output` is truncated to avoid unbounded output.
    #[error("failed to decode {context}: {reason}")]
    DecodeFailed {
        context: String,
        reason: String,
        raw_output: String,
    },

    /// A subprocess did not finish within its timeout and was terminated.
    #[error("command timed out after {timeout:?}: {command}")]
    CommandTimedOut { command: String, timeout: Duration },

    /// The operation was cancelled (by the caller or by declining the elevation prompt).
    #[error("operation cancelled")]
    Cancelled,

    /// Generic I/O or runtime error with context.
    #[error("io error: {context}")]
    IoError { context: String },
}

impl Error {
    pub(crate) fn invalid_input(context: impl Into<String>) -> Self {
        Self::InvalidInput {
            context: context.into(),
        }
    }

    pub(crate) fn executable_not_found(detail: impl Into<String>) -> Self {
        Self::ExecutableNotFound {
            detail: detail.into(),
        }
    }

    pub(crate) fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl AsRef<str>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: truncate_for_error(stderr.as_ref(), STDERR_MAX_BYTES).into_owned(),
        }
    }

    pub(crate) fn decode_failed(
        context: impl Into<String>,
        reason: impl Into<String>,
        raw_output: impl AsRef<str>,
    ) -> Self {
        Self::DecodeFailed {
            context: context.into(),
            reason: reason.into(),
            raw_output: truncate_for_error(raw_output.as_ref(), RAW_OUTPUT_MAX_BYTES).into_owned(),
        }
    }

    pub(crate) fn io(context: impl Into<String>) -> Self {
        Self::IoError {
            context: context.into(),
        }
    }

    /// Whether this error represents a cancellation (never surfaced as a failure).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error means Homebrew is missing (always fatal for the store).
    pub fn is_executable_not_found(&self) -> bool {
        matches!(self, Self::ExecutableNotFound { .. })
    }

    /// Human-oriented diagnostic text for this error.
    ///
    /// Decode failures expose the raw output, command failures expose the exit code and stderr,
    /// everything else falls back to the display text.
    pub fn diagnostics(&self) -> String {
        match self {
            Self::DecodeFailed { raw_output, .. } => raw_output.clone(),
            Self::CommandFailed {
                exit_code, stderr, ..
            } => format!("Exit code: {exit_code}\n\n{stderr}"),
            other => other.to_string(),
        }
    }
}

pub(crate) fn truncate_for_error(input: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if input.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(input);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(input[..end].to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn diagnostics_for_decode_failure_is_raw_output() {
        let err = Error::decode_failed("services list", "expected value", "not json");
        assert_eq!(err.diagnostics(), "not json");
    }

    #[test]
    fn diagnostics_for_command_failure_has_exit_code_and_stderr() {
        let err = Error::command_failed("brew services start redis", 1, "Error: boom");
        assert_eq!(err.diagnostics(), "Exit code: 1\n\nError: boom");
    }

    #[test]
    fn diagnostics_falls_back_to_display() {
        let err = Error::executable_not_found("no candidate validated");
        assert_eq!(
            err.diagnostics(),
            "Homebrew executable not found: no candidate validated"
        );
    }

    #[test]
    fn command_failure_stderr_is_bounded() {
        let long = "é".repeat(STDERR_MAX_BYTES);
        let Error::CommandFailed { stderr, .. } = Error::command_failed("brew", 1, &long) else {
            panic!("unexpected variant");
        };
        assert!(stderr.len() <= STDERR_MAX_BYTES);
        assert!(long.starts_with(&stderr));
    }

    #[test]
    fn classification_helpers() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Cancelled.is_executable_not_found());
        assert!(Error::executable_not_found("x").is_executable_not_found());
    }
}
