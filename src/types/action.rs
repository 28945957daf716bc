use crate::ServiceStatus;

/// How `brew services stop` waits for the service to exit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopWait {
    /// `--no-wait`.
    NoWait,
    /// `--max-wait=<seconds>`.
    MaxWait { seconds: u32 },
}

impl Default for StopWait {
    fn default() -> Self {
        StopWait::MaxWait { seconds: 60 }
    }
}

impl StopWait {
    fn argument(&self) -> String {
        match self {
            StopWait::NoWait => "--no-wait".to_string(),
            StopWait::MaxWait { seconds } => format!("--max-wait={seconds}"),
        }
    }
}

/// A mutating `brew services` subcommand.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ServiceAction {
    /// Run once without registering.
    Run,
    /// Start and register to run at login/boot.
    Start,
    Stop { keep_registered: bool, wait: StopWait },
    Restart,
    /// Kill immediately but keep registered.
    Kill,
}

impl ServiceAction {
    /// `Stop` with the default wait policy.
    pub fn stop() -> Self {
        ServiceAction::Stop {
            keep_registered: false,
            wait: StopWait::default(),
        }
    }

    pub fn subcommand(&self) -> &'static str {
        match self {
            ServiceAction::Run => "run",
            ServiceAction::Start => "start",
            ServiceAction::Stop { .. } => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Kill => "kill",
        }
    }

    /// Flags following the service name (or `--all`).
    pub fn additional_arguments(&self) -> Vec<String> {
        match self {
            ServiceAction::Stop {
                keep_registered,
                wait,
            } => {
                let mut args = Vec::with_capacity(2);
                if *keep_registered {
                    args.push("--keep".to_string());
                }
                args.push(wait.argument());
                args
            }
            _ => Vec::new(),
        }
    }

    /// Status projected into the visible list while the action runs.
    pub fn expected_status(&self) -> ServiceStatus {
        match self {
            ServiceAction::Run | ServiceAction::Start | ServiceAction::Restart => {
                ServiceStatus::Started
            }
            ServiceAction::Stop { .. } | ServiceAction::Kill => ServiceStatus::Stopped,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceAction::Run => "Run (one-shot)",
            ServiceAction::Start => "Start at Login",
            ServiceAction::Stop {
                keep_registered: true,
                ..
            } => "Stop (keep registered)",
            ServiceAction::Stop { .. } => "Stop",
            ServiceAction::Restart => "Restart",
            ServiceAction::Kill => "Kill",
        }
    }

    /// Title of the bulk operation for this action.
    pub fn bulk_title(&self) -> &'static str {
        match self {
            ServiceAction::Run => "Running all",
            ServiceAction::Start => "Starting all",
            ServiceAction::Stop { .. } => "Stopping all",
            ServiceAction::Restart => "Restarting all",
            ServiceAction::Kill => "Killing all",
        }
    }

    /// Symbol name of the bulk operation for this action.
    pub fn bulk_icon(&self) -> &'static str {
        match self {
            ServiceAction::Run => "play",
            ServiceAction::Start => "play.fill",
            ServiceAction::Stop { .. } => "stop.fill",
            ServiceAction::Restart => "arrow.clockwise",
            ServiceAction::Kill => "xmark.octagon.fill",
        }
    }
}
