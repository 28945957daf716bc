use crate::{Error, ServiceAction};

/// Lifecycle of a per-service action.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OperationStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Record of the last action attempted on one service.
///
/// Set to `Running` when an action starts, reset to `Idle` on success or cancellation, and kept
/// as `Failed` (with error and diagnostics) until superseded or dismissed.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct ServiceOperation {
    pub status: OperationStatus,
    pub action: Option<ServiceAction>,
    pub error: Option<Error>,
    pub diagnostics: Option<String>,
}

impl ServiceOperation {
    pub(crate) fn running(action: ServiceAction) -> Self {
        Self {
            status: OperationStatus::Running,
            action: Some(action),
            error: None,
            diagnostics: None,
        }
    }

    pub(crate) fn failed(action: ServiceAction, error: Error) -> Self {
        let diagnostics = Some(error.diagnostics());
        Self {
            status: OperationStatus::Failed,
            action: Some(action),
            error: Some(error),
            diagnostics,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == OperationStatus::Running
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GlobalOperationStatus {
    Running,
    Completed,
}

/// Progress of a bulk action or cleanup.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct GlobalOperation {
    pub title: String,
    pub icon: String,
    pub status: GlobalOperationStatus,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

impl GlobalOperation {
    pub(crate) fn start(title: &str, icon: &str, total: usize) -> Self {
        Self {
            title: title.to_string(),
            icon: icon.to_string(),
            status: GlobalOperationStatus::Running,
            completed: 0,
            total,
            failed: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == GlobalOperationStatus::Running
    }

    /// Completion ratio in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}
